//! Global assembly of tangent stiffness and internal force.
//!
//! ## Assembly Process
//!
//! 1. Kinematics (`B`, `dV`) of every quadrature point are evaluated once per
//!    model and design; a degenerate element fails here with its index.
//! 2. Elements are split into fixed-size chunks and integrated in parallel.
//!    Each chunk fills its own triplet arena, so no two threads write to
//!    shared storage:
//!    ```text
//!    Δε = B Δu_e − Δε₀
//!    k_e = Σ_q Bᵀ C_t B dV,   f_e = Σ_q Bᵀ σ dV
//!    ```
//! 3. Arenas are concatenated in element order and converted COO → CSR,
//!    which sums duplicates. Chunk boundaries do not depend on the number of
//!    worker threads, so the assembled matrix is bit-identical for any pool.

use crate::design::DesignState;
use crate::elements::{PointKinematics, evaluate_point};
use crate::error::{FemError, Result};
use crate::materials::{Material, ScaledMaterial};
use crate::model::Model;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use rayon::prelude::*;
use tracing::trace;

/// Elements per parallel work unit
const CHUNK_SIZE: usize = 64;

/// Converged or trial state of one quadrature point
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPoint {
    /// Mechanical strain (Voigt, engineering shear)
    pub strain: DVector<f64>,
    /// Stress
    pub stress: DVector<f64>,
    /// History variables
    pub state: DVector<f64>,
}

impl MaterialPoint {
    /// Unstrained point
    pub fn zeros(n_strains: usize, n_state: usize) -> Self {
        Self {
            strain: DVector::zeros(n_strains),
            stress: DVector::zeros(n_strains),
            state: DVector::zeros(n_state),
        }
    }
}

/// Material points of all elements, `[element][quadrature point]`
pub type History = Vec<Vec<MaterialPoint>>;

/// Result of one global assembly
#[derive(Debug, Clone)]
pub struct AssembledSystem {
    /// Tangent stiffness over all DOFs
    pub stiffness: CsrMatrix<f64>,
    /// Internal force over all DOFs
    pub internal_force: DVector<f64>,
    /// Trial material points
    pub points: History,
}

/// Quadrature point kinematics of every point of `element`
pub fn element_kinematics(model: &Model, element: usize) -> Result<Vec<PointKinematics>> {
    let mesh = model.mesh();
    let element_type = mesh.elements[element].element_type;
    let coords = mesh.element_coords(element);
    let section = model.section(element);
    element_type
        .quadrature()
        .iter()
        .enumerate()
        .map(|(q, point)| evaluate_point(element_type, &coords, point, section, element, q))
        .collect()
}

/// Contributions of one element
struct ElementContribution {
    dofs: Vec<usize>,
    stiffness: DMatrix<f64>,
    force: DVector<f64>,
    points: Vec<MaterialPoint>,
}

/// Triplets and forces of one chunk of elements
#[derive(Default)]
struct ChunkArena {
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
    elements: Vec<(Vec<usize>, DVector<f64>, Vec<MaterialPoint>)>,
}

impl ChunkArena {
    fn push(&mut self, c: ElementContribution) {
        for (i_local, &i_global) in c.dofs.iter().enumerate() {
            for (j_local, &j_global) in c.dofs.iter().enumerate() {
                self.rows.push(i_global);
                self.cols.push(j_global);
                self.values.push(c.stiffness[(i_local, j_local)]);
            }
        }
        self.elements.push((c.dofs, c.force, c.points));
    }
}

/// Parallel map over elements (or chunk starts) that keeps input order.
///
/// When several items fail, the error of the first one in input order is
/// returned, independent of thread scheduling.
pub(crate) fn par_try_map<I, T, F>(items: I, f: F) -> Result<Vec<T>>
where
    I: IntoParallelIterator<Item = usize>,
    I::Iter: IndexedParallelIterator,
    T: Send,
    F: Fn(usize) -> Result<T> + Sync + Send,
{
    let results: Vec<Result<T>> = items.into_par_iter().map(f).collect();
    results.into_iter().collect()
}

/// Element integrator bound to one model and design
#[derive(Debug)]
pub struct Assembler<'a> {
    model: &'a Model,
    materials: Vec<ScaledMaterial>,
    kinematics: Vec<Vec<PointKinematics>>,
    dofs: Vec<Vec<usize>>,
}

impl<'a> Assembler<'a> {
    /// Evaluate kinematics and scaled materials of all elements
    pub fn new(model: &'a Model, design: &DesignState) -> Result<Self> {
        model.check_design(design)?;
        let mesh = model.mesh();
        let n = mesh.num_elements();

        let kinematics = par_try_map(0..n, |e| element_kinematics(model, e))?;
        let materials = (0..n)
            .map(|e| model.material_for(e, design))
            .collect::<Result<Vec<_>>>()?;
        let dofs = (0..n).map(|e| mesh.element_dofs(e)).collect();

        Ok(Self {
            model,
            materials,
            kinematics,
            dofs,
        })
    }

    pub fn model(&self) -> &Model {
        self.model
    }

    /// Number of global DOFs
    pub fn num_dofs(&self) -> usize {
        self.model.mesh().num_dofs()
    }

    /// Kinematics of the quadrature points of `element`
    pub fn kinematics(&self, element: usize) -> &[PointKinematics] {
        &self.kinematics[element]
    }

    /// Global DOFs of `element`, node-major
    pub fn element_dofs(&self, element: usize) -> &[usize] {
        &self.dofs[element]
    }

    /// Scaled material of `element`
    pub fn material(&self, element: usize) -> &ScaledMaterial {
        &self.materials[element]
    }

    /// Unstrained history for all material points
    pub fn initial_history(&self) -> History {
        self.kinematics
            .iter()
            .zip(&self.materials)
            .map(|(points, m)| vec![MaterialPoint::zeros(m.n_strains(), m.n_state()); points.len()])
            .collect()
    }

    /// Gather the element part of a global vector
    pub fn gather(&self, element: usize, global: &DVector<f64>) -> DVector<f64> {
        DVector::from_iterator(self.dofs[element].len(), self.dofs[element].iter().map(|&i| global[i]))
    }

    fn integrate_element(
        &self,
        e: usize,
        du: &DVector<f64>,
        history: &[MaterialPoint],
        eigen_factor: f64,
    ) -> Result<ElementContribution> {
        let du_e = self.gather(e, du);
        let n = du_e.len();
        let material = &self.materials[e];
        let eigenstrain = self.model.eigenstrain(e).map(|eps0| eps0 * eigen_factor);

        let mut stiffness = DMatrix::zeros(n, n);
        let mut force = DVector::zeros(n);
        let mut points = Vec::with_capacity(history.len());
        for (kin, old) in self.kinematics[e].iter().zip(history) {
            let mut d_strain = &kin.b * &du_e;
            if let Some(eps0) = &eigenstrain {
                d_strain -= eps0;
            }
            let response = material.step(&d_strain, &old.strain, &old.stress, &old.state)?;

            force += kin.b.transpose() * &response.stress * kin.dv;
            stiffness += kin.b.transpose() * &response.tangent * &kin.b * kin.dv;
            points.push(MaterialPoint {
                strain: response.strain,
                stress: response.stress,
                state: response.state,
            });
        }

        Ok(ElementContribution {
            dofs: self.dofs[e].clone(),
            stiffness,
            force,
            points,
        })
    }

    /// Assemble tangent stiffness and internal force.
    ///
    /// `du` is the displacement increment since the converged `history`;
    /// `eigen_factor` scales the element eigenstrains for this increment.
    pub fn assemble(&self, du: &DVector<f64>, history: &[Vec<MaterialPoint>], eigen_factor: f64) -> Result<AssembledSystem> {
        let n_elements = self.kinematics.len();
        let n_dofs = self.num_dofs();
        if du.len() != n_dofs || history.len() != n_elements {
            return Err(FemError::config(format!(
                "assembly expects {n_dofs} DOFs and {n_elements} element histories, got {} and {}",
                du.len(),
                history.len()
            )));
        }

        let starts: Vec<usize> = (0..n_elements).step_by(CHUNK_SIZE).collect();
        let arenas = par_try_map(starts, |start| {
            let mut arena = ChunkArena::default();
            for e in start..(start + CHUNK_SIZE).min(n_elements) {
                arena.push(self.integrate_element(e, du, &history[e], eigen_factor)?);
            }
            Ok(arena)
        })?;

        let nnz: usize = arenas.iter().map(|a| a.values.len()).sum();
        let mut rows = Vec::with_capacity(nnz);
        let mut cols = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);
        let mut internal_force = DVector::zeros(n_dofs);
        let mut points = Vec::with_capacity(n_elements);
        for arena in arenas {
            rows.extend(arena.rows);
            cols.extend(arena.cols);
            values.extend(arena.values);
            for (dofs, force, element_points) in arena.elements {
                for (i_local, &i_global) in dofs.iter().enumerate() {
                    internal_force[i_global] += force[i_local];
                }
                points.push(element_points);
            }
        }

        let coo = CooMatrix::try_from_triplets(n_dofs, n_dofs, rows, cols, values)
            .map_err(|e| FemError::config(format!("failed to build triplet matrix: {e:?}")))?;
        let stiffness = CsrMatrix::from(&coo);
        trace!(elements = n_elements, triplets = nnz, nnz = stiffness.nnz(), "assembled global system");

        Ok(AssembledSystem {
            stiffness,
            internal_force,
            points,
        })
    }

    /// Stiffness of `element` at zero strain with unit stiffness scale
    pub fn unit_stiffness_of(&self, element: usize) -> DMatrix<f64> {
        let inner = self.materials[element].inner();
        let n = self.dofs[element].len();
        let strain = DVector::zeros(inner.n_strains());
        let state = DVector::zeros(inner.n_state());
        let tangent = inner.tangent(&strain, &state);
        self.kinematics[element]
            .iter()
            .fold(DMatrix::zeros(n, n), |k, kin| k + kin.b.transpose() * &tangent * &kin.b * kin.dv)
    }

    /// Unit-scale stiffness `k0_e` of every element
    pub fn unit_stiffness(&self) -> Vec<DMatrix<f64>> {
        (0..self.kinematics.len())
            .into_par_iter()
            .map(|e| self.unit_stiffness_of(e))
            .collect()
    }

    /// Internal force of `element` with unit stiffness scale at converged points
    pub fn unit_internal_force(&self, element: usize, points: &[MaterialPoint]) -> DVector<f64> {
        let inner = self.materials[element].inner();
        let n = self.dofs[element].len();
        self.kinematics[element]
            .iter()
            .zip(points)
            .fold(DVector::zeros(n), |f, (kin, p)| {
                f + kin.b.transpose() * inner.stress(&p.strain, &p.state) * kin.dv
            })
    }
}
