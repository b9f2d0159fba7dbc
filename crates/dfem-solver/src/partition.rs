//! Free/constrained DOF partitioning.
//!
//! With the DOFs split into free (f) and constrained (c) sets, one Newton
//! step solves
//! ```text
//! K_ff Δu_f = R_f − K_fc Δu_c
//! ```
//! where `Δu_c` is the known increment of the prescribed displacements.
//! Reactions on constrained DOFs are recovered afterwards:
//! ```text
//! r_c = K_cf Δu_f + K_cc Δu_c − R_c
//! ```

use crate::boundary_conditions::Constraints;
use crate::error::{FemError, Result};
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free(usize),
    Constrained(usize),
}

/// Reduced free-DOF system of one Newton step
#[derive(Debug, Clone)]
pub struct ReducedSystem {
    /// `K_ff`
    pub stiffness: CsrMatrix<f64>,
    /// `R_f − K_fc Δu_c`
    pub rhs: DVector<f64>,
}

/// DOF partition derived from a constraint mask
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    free: Vec<usize>,
    constrained: Vec<usize>,
    slots: Vec<Slot>,
}

impl Partition {
    pub fn new(constraints: &Constraints) -> Self {
        let mut free = Vec::new();
        let mut constrained = Vec::new();
        let slots = constraints
            .mask()
            .iter()
            .enumerate()
            .map(|(dof, &fixed)| {
                if fixed {
                    constrained.push(dof);
                    Slot::Constrained(constrained.len() - 1)
                } else {
                    free.push(dof);
                    Slot::Free(free.len() - 1)
                }
            })
            .collect();
        Self {
            free,
            constrained,
            slots,
        }
    }

    /// Free DOFs in ascending order
    pub fn free(&self) -> &[usize] {
        &self.free
    }

    /// Constrained DOFs in ascending order
    pub fn constrained(&self) -> &[usize] {
        &self.constrained
    }

    pub fn num_dofs(&self) -> usize {
        self.slots.len()
    }

    /// Position of a DOF in the free set
    pub fn free_index(&self, dof: usize) -> Option<usize> {
        match self.slots.get(dof) {
            Some(Slot::Free(i)) => Some(*i),
            _ => None,
        }
    }

    /// Free entries of a full vector
    pub fn restrict_free(&self, v: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.free.len(), self.free.iter().map(|&i| v[i]))
    }

    /// Constrained entries of a full vector
    pub fn restrict_constrained(&self, v: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.constrained.len(), self.constrained.iter().map(|&i| v[i]))
    }

    /// Euclidean norm over the free entries of a full vector
    pub fn free_norm(&self, v: &DVector<f64>) -> f64 {
        self.free.iter().map(|&i| v[i] * v[i]).sum::<f64>().sqrt()
    }

    /// Extract `K_ff` and the adjusted free residual
    pub fn reduce(&self, k: &CsrMatrix<f64>, r: &DVector<f64>, du_c: &DVector<f64>) -> Result<ReducedSystem> {
        let n = self.num_dofs();
        if k.nrows() != n || k.ncols() != n || r.len() != n || du_c.len() != self.constrained.len() {
            return Err(FemError::config(format!(
                "partition of {n} DOFs cannot reduce a {}×{} system",
                k.nrows(),
                k.ncols()
            )));
        }

        let n_free = self.free.len();
        let mut offsets = Vec::with_capacity(n_free + 1);
        let mut indices = Vec::new();
        let mut values = Vec::new();
        let mut rhs = self.restrict_free(r);
        offsets.push(0);
        for (i, row) in k.row_iter().enumerate() {
            let Slot::Free(fi) = self.slots[i] else {
                continue;
            };
            for (&j, &v) in row.col_indices().iter().zip(row.values()) {
                match self.slots[j] {
                    Slot::Free(fj) => {
                        indices.push(fj);
                        values.push(v);
                    }
                    Slot::Constrained(cj) => rhs[fi] -= v * du_c[cj],
                }
            }
            offsets.push(indices.len());
        }

        let stiffness = CsrMatrix::try_from_csr_data(n_free, n_free, offsets, indices, values)
            .map_err(|e| FemError::config(format!("failed to build reduced matrix: {e}")))?;
        Ok(ReducedSystem { stiffness, rhs })
    }

    /// Full increment from its free and constrained parts
    pub fn expand(&self, du_f: &DVector<f64>, du_c: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.num_dofs(),
            self.slots.iter().map(|slot| match *slot {
                Slot::Free(i) => du_f[i],
                Slot::Constrained(i) => du_c[i],
            }),
        )
    }

    /// Reactions `K_c· Δu − R_c` on constrained DOFs, zero on free DOFs
    pub fn reactions(&self, k: &CsrMatrix<f64>, du: &DVector<f64>, r: &DVector<f64>) -> DVector<f64> {
        let mut reactions = DVector::zeros(self.num_dofs());
        for (i, row) in k.row_iter().enumerate() {
            if let Slot::Constrained(_) = self.slots[i] {
                let k_du: f64 = row
                    .col_indices()
                    .iter()
                    .zip(row.values())
                    .map(|(&j, &v)| v * du[j])
                    .sum();
                reactions[i] = k_du - r[i];
            }
        }
        reactions
    }
}
