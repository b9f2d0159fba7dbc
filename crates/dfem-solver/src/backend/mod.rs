//! Numerical backend abstraction layer.
//!
//! This module provides trait-based interfaces for the free-DOF linear
//! solve, allowing the Newton and adjoint solvers to be backend-agnostic.
//!
//! # Backends
//!
//! - **SparseCholesky** (default): `nalgebra-sparse` Cholesky for symmetric
//!   positive definite tangents.
//! - **DenseLu**: nalgebra dense LU, also handles unsymmetric tangents.
//!
//! # Architecture
//!
//! ```text
//! Element Library (nalgebra DMatrix, small and dense)
//!         │
//!         ▼
//! Assembly (COO triplets → CSR) + Partition (K_ff)
//!         │
//!         ▼
//! Backend Trait Layer (LinearSolver → Factorization)
//!    ┌────┴────┐
//!    ▼         ▼
//! Sparse     Dense
//! Cholesky   LU
//! ```

pub mod native;
pub mod sparse;
pub mod traits;

pub use native::DenseLu;
pub use sparse::SparseCholesky;
pub use traits::*;

use serde::{Deserialize, Serialize};

/// Selectable linear solver backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverKind {
    #[default]
    SparseCholesky,
    DenseLu,
}

impl LinearSolverKind {
    /// Instantiate the backend.
    pub fn backend(self) -> Box<dyn LinearSolver> {
        match self {
            LinearSolverKind::SparseCholesky => Box::new(SparseCholesky),
            LinearSolverKind::DenseLu => Box::new(DenseLu),
        }
    }
}

/// Returns the default solver backend.
pub fn default_backend() -> Box<dyn LinearSolver> {
    LinearSolverKind::default().backend()
}
