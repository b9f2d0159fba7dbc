//! Backend trait definitions for linear solvers.
//!
//! These traits abstract over the concrete numerical library used for the
//! global free-DOF system. Element-level computations remain in nalgebra
//! (small, dense matrices).

use crate::error::FemError;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

/// Smallest accepted ratio between the smallest and largest pivot magnitude.
///
/// Smaller ratios indicate a rank-deficient matrix (e.g. rigid-body modes).
pub const PIVOT_TOLERANCE: f64 = 1e-13;

/// Error type for backend operations.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

impl From<String> for BackendError {
    fn from(s: String) -> Self {
        BackendError(s)
    }
}

impl From<&str> for BackendError {
    fn from(s: &str) -> Self {
        BackendError(s.to_string())
    }
}

impl From<BackendError> for FemError {
    fn from(e: BackendError) -> Self {
        FemError::SingularSystem { reason: e.0 }
    }
}

/// Solver diagnostic info.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveInfo {
    /// Number of iterations (1 for direct solvers)
    pub iterations: usize,
    /// Ratio of smallest to largest pivot, if the backend reports it
    pub pivot_ratio: Option<f64>,
    /// Human-readable solver name (e.g., "nalgebra-LU")
    pub solver_name: String,
}

/// A factorized matrix that can be solved repeatedly.
pub trait Factorization: Send + Sync {
    /// Solve `K x = b`.
    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, BackendError>;

    /// Solve `Kᵀ x = b` (used by adjoint solves).
    fn solve_transpose(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, BackendError>;

    /// Diagnostics of the factorization.
    fn info(&self) -> SolveInfo;
}

/// Trait for a linear solver backend.
pub trait LinearSolver: Send + Sync {
    /// Human-readable name of this backend.
    fn name(&self) -> &str;

    /// Factorize a square sparse matrix.
    fn factorize(&self, matrix: &CsrMatrix<f64>) -> Result<Box<dyn Factorization>, BackendError>;

    /// Solve `K x = b` once.
    fn solve_linear(
        &self,
        matrix: &CsrMatrix<f64>,
        rhs: &DVector<f64>,
    ) -> Result<(DVector<f64>, SolveInfo), BackendError> {
        let factorization = self.factorize(matrix)?;
        let x = factorization.solve(rhs)?;
        Ok((x, factorization.info()))
    }
}

/// Reject solutions containing NaN or infinity.
pub(crate) fn check_finite(x: DVector<f64>) -> Result<DVector<f64>, BackendError> {
    if x.iter().all(|v| v.is_finite()) {
        Ok(x)
    } else {
        Err("solution contains non-finite values".into())
    }
}

/// Check a pivot ratio against [`PIVOT_TOLERANCE`].
pub(crate) fn check_pivots(min: f64, max: f64, solver: &str) -> Result<f64, BackendError> {
    let ratio = if max > 0.0 { min / max } else { 0.0 };
    if !(ratio >= PIVOT_TOLERANCE) {
        return Err(BackendError(format!(
            "{solver}: pivot ratio {ratio:.3e} below {PIVOT_TOLERANCE:.0e} (insufficient constraints or rigid-body modes?)"
        )));
    }
    Ok(ratio)
}
