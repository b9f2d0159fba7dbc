//! Sparse Cholesky backend using nalgebra-sparse.
//!
//! The free-DOF tangent of conservative materials is symmetric positive
//! definite, so a sparse Cholesky factorization `K = L Lᵀ` is the default.
//! Indefinite or rank-deficient matrices are reported as errors.

use super::traits::*;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::factorization::CscCholesky;
use nalgebra_sparse::{CscMatrix, CsrMatrix};

/// Sparse Cholesky solver backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SparseCholesky;

struct CholeskyFactorization {
    factor: Option<CscCholesky<f64>>,
    pivot_ratio: f64,
}

impl Factorization for CholeskyFactorization {
    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, BackendError> {
        let Some(factor) = &self.factor else {
            return Ok(DVector::zeros(0));
        };
        let b = DMatrix::from_column_slice(rhs.len(), 1, rhs.as_slice());
        let x = factor.solve(&b);
        check_finite(DVector::from_column_slice(x.as_slice()))
    }

    /// Symmetric: identical to [`Factorization::solve`]
    fn solve_transpose(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, BackendError> {
        self.solve(rhs)
    }

    fn info(&self) -> SolveInfo {
        SolveInfo {
            iterations: 1,
            pivot_ratio: Some(self.pivot_ratio),
            solver_name: "nalgebra-sparse-Cholesky".to_string(),
        }
    }
}

impl LinearSolver for SparseCholesky {
    fn name(&self) -> &str {
        "nalgebra-sparse-Cholesky"
    }

    fn factorize(&self, matrix: &CsrMatrix<f64>) -> Result<Box<dyn Factorization>, BackendError> {
        let n = matrix.nrows();
        if matrix.ncols() != n {
            return Err(format!("matrix is not square: {}×{}", n, matrix.ncols()).into());
        }
        if n == 0 {
            return Ok(Box::new(CholeskyFactorization {
                factor: None,
                pivot_ratio: 1.0,
            }));
        }

        let csc = CscMatrix::from(matrix);
        let factor = CscCholesky::factor(&csc)
            .map_err(|e| BackendError(format!("{}: {e:?} (matrix not positive definite)", self.name())))?;

        // Squared diagonal of L are the pivots of the factorization
        let l = factor.l();
        let mut min = f64::INFINITY;
        let mut max = 0.0f64;
        for j in 0..n {
            let d = l
                .get_entry(j, j)
                .map(|entry| entry.into_value())
                .unwrap_or(0.0);
            let pivot = d * d;
            min = min.min(pivot);
            max = max.max(pivot);
        }
        let pivot_ratio = check_pivots(min, max, self.name())?;

        Ok(Box::new(CholeskyFactorization {
            factor: Some(factor),
            pivot_ratio,
        }))
    }
}
