//! Dirichlet constraints and nodal loads.
//!
//! Both are stored densely over the global DOFs (`node * dim + direction`).
//! Constraints hold a mask of fixed DOFs and their prescribed displacement
//! at load factor 1; loads are additive nodal forces grouped in load cases
//! that can be solved independently against the same model.

use crate::error::{FemError, Result};
use crate::mesh::Mesh;

/// Degree of freedom identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DofId {
    /// Node index
    pub node: usize,
    /// Direction (0 = x, 1 = y, 2 = z)
    pub dir: usize,
}

impl DofId {
    /// Create a new DOF identifier
    pub fn new(node: usize, dir: usize) -> Self {
        Self { node, dir }
    }

    /// Global DOF index in a mesh of spatial dimension `dim`
    pub fn index(&self, dim: usize) -> usize {
        self.node * dim + self.dir
    }
}

fn locate(dim: usize, n_dofs: usize, node: usize, dir: usize) -> Result<usize> {
    let dof = DofId::new(node, dir).index(dim);
    if dir >= dim || dof >= n_dofs {
        return Err(FemError::config(format!(
            "DOF (node {node}, direction {dir}) does not exist in a {dim}D mesh with {} nodes",
            n_dofs / dim.max(1)
        )));
    }
    Ok(dof)
}

/// Fixed DOFs and their prescribed displacements
#[derive(Debug, Clone, PartialEq)]
pub struct Constraints {
    dim: usize,
    mask: Vec<bool>,
    prescribed: Vec<f64>,
}

impl Constraints {
    /// No constraints on `mesh`
    pub fn new(mesh: &Mesh) -> Self {
        Self {
            dim: mesh.dim,
            mask: vec![false; mesh.num_dofs()],
            prescribed: vec![0.0; mesh.num_dofs()],
        }
    }

    /// Fix one DOF at zero displacement
    pub fn fix(&mut self, node: usize, dir: usize) -> Result<&mut Self> {
        self.prescribe(node, dir, 0.0)
    }

    /// Fix one DOF at displacement `value` (reached at load factor 1)
    pub fn prescribe(&mut self, node: usize, dir: usize, value: f64) -> Result<&mut Self> {
        if !value.is_finite() {
            return Err(FemError::config(format!(
                "prescribed displacement of node {node} must be finite"
            )));
        }
        let dof = locate(self.dim, self.mask.len(), node, dir)?;
        self.mask[dof] = true;
        self.prescribed[dof] = value;
        Ok(self)
    }

    /// Fix all directions of a node
    pub fn fix_node(&mut self, node: usize) -> Result<&mut Self> {
        for dir in 0..self.dim {
            self.fix(node, dir)?;
        }
        Ok(self)
    }

    /// Prescribe `value` in direction `dir` on every node whose coordinates satisfy `select`
    pub fn prescribe_where<F>(&mut self, mesh: &Mesh, dir: usize, value: f64, select: F) -> Result<usize>
    where
        F: Fn(&[f64; 3]) -> bool,
    {
        let mut count = 0;
        for node in &mesh.nodes {
            if select(&node.coords()) {
                self.prescribe(node.id, dir, value)?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Fix all directions of every node whose coordinates satisfy `select`
    pub fn fix_where<F>(&mut self, mesh: &Mesh, select: F) -> Result<usize>
    where
        F: Fn(&[f64; 3]) -> bool,
    {
        let mut count = 0;
        for node in &mesh.nodes {
            if select(&node.coords()) {
                self.fix_node(node.id)?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Spatial dimension of the mesh the constraints were built for
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn num_dofs(&self) -> usize {
        self.mask.len()
    }

    /// Constraint mask over all DOFs
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// Prescribed displacements over all DOFs (zero on free DOFs)
    pub fn prescribed(&self) -> &[f64] {
        &self.prescribed
    }

    pub fn is_fixed(&self, dof: usize) -> bool {
        self.mask.get(dof).copied().unwrap_or(false)
    }

    /// Indices of constrained DOFs in ascending order
    pub fn constrained_dofs(&self) -> Vec<usize> {
        (0..self.mask.len()).filter(|&i| self.mask[i]).collect()
    }

    /// Indices of free DOFs in ascending order
    pub fn free_dofs(&self) -> Vec<usize> {
        (0..self.mask.len()).filter(|&i| !self.mask[i]).collect()
    }

    /// Whether every prescribed displacement is zero
    pub fn is_homogeneous(&self) -> bool {
        self.prescribed.iter().all(|&v| v == 0.0)
    }
}

/// One set of nodal forces
#[derive(Debug, Clone, PartialEq)]
pub struct LoadCase {
    /// Label used in logs
    pub name: String,
    dim: usize,
    forces: Vec<f64>,
}

impl LoadCase {
    /// Empty load case on `mesh`
    pub fn new(name: impl Into<String>, mesh: &Mesh) -> Self {
        Self {
            name: name.into(),
            dim: mesh.dim,
            forces: vec![0.0; mesh.num_dofs()],
        }
    }

    /// Add a force component; forces on the same DOF accumulate
    pub fn add_force(&mut self, node: usize, dir: usize, value: f64) -> Result<&mut Self> {
        let dof = locate(self.dim, self.forces.len(), node, dir)?;
        self.forces[dof] += value;
        Ok(self)
    }

    /// Add a force vector to a node
    pub fn add_nodal_force(&mut self, node: usize, force: &[f64]) -> Result<&mut Self> {
        if force.len() != self.dim {
            return Err(FemError::config(format!(
                "nodal force has {} components in a {}D mesh",
                force.len(),
                self.dim
            )));
        }
        for (dir, &value) in force.iter().enumerate() {
            self.add_force(node, dir, value)?;
        }
        Ok(self)
    }

    /// Force per global DOF at load factor 1
    pub fn forces(&self) -> &[f64] {
        &self.forces
    }

    pub fn num_dofs(&self) -> usize {
        self.forces.len()
    }

    /// Resultant force per direction
    pub fn resultant(&self) -> Vec<f64> {
        let mut total = vec![0.0; self.dim];
        for (dof, f) in self.forces.iter().enumerate() {
            total[dof % self.dim] += f;
        }
        total
    }
}
