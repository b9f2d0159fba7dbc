//! Native dense backend using nalgebra.
//!
//! Dense LU decomposition with partial pivoting. Works for unsymmetric
//! tangents and is suitable for small-to-medium problems (up to a few
//! thousand free DOFs).

use super::traits::*;
use nalgebra::{DMatrix, DVector, Dyn, LU};
use nalgebra_sparse::CsrMatrix;

/// Dense LU solver backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenseLu;

struct DenseLuFactorization {
    matrix: DMatrix<f64>,
    lu: LU<f64, Dyn, Dyn>,
    pivot_ratio: f64,
}

impl Factorization for DenseLuFactorization {
    fn solve(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, BackendError> {
        let x = self
            .lu
            .solve(rhs)
            .ok_or(BackendError("Singular matrix in LU decomposition".into()))?;
        check_finite(x)
    }

    fn solve_transpose(&self, rhs: &DVector<f64>) -> Result<DVector<f64>, BackendError> {
        let x = self
            .matrix
            .transpose()
            .lu()
            .solve(rhs)
            .ok_or(BackendError("Singular matrix in transposed LU decomposition".into()))?;
        check_finite(x)
    }

    fn info(&self) -> SolveInfo {
        SolveInfo {
            iterations: 1,
            pivot_ratio: Some(self.pivot_ratio),
            solver_name: "nalgebra-LU".to_string(),
        }
    }
}

impl LinearSolver for DenseLu {
    fn name(&self) -> &str {
        "nalgebra-LU"
    }

    fn factorize(&self, matrix: &CsrMatrix<f64>) -> Result<Box<dyn Factorization>, BackendError> {
        if matrix.nrows() != matrix.ncols() {
            return Err(format!("matrix is not square: {}×{}", matrix.nrows(), matrix.ncols()).into());
        }
        let dense = DMatrix::from(matrix);
        let lu = dense.clone().lu();
        let pivots = lu.u().diagonal().map(f64::abs);
        let pivot_ratio = if pivots.is_empty() {
            1.0
        } else {
            check_pivots(pivots.min(), pivots.max(), self.name())?
        };
        Ok(Box::new(DenseLuFactorization {
            matrix: dense,
            lu,
            pivot_ratio,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    fn csr(n: usize, entries: &[(usize, usize, f64)]) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(n, n);
        for &(i, j, v) in entries {
            coo.push(i, j, v);
        }
        CsrMatrix::from(&coo)
    }

    #[test]
    fn native_linear_solve_trivial() {
        // Solve: [2 0; 0 3] * [x; y] = [4; 9]
        let k = csr(2, &[(0, 0, 2.0), (1, 1, 3.0)]);
        let (u, info) = DenseLu.solve_linear(&k, &DVector::from_vec(vec![4.0, 9.0])).unwrap();
        assert!((u[0] - 2.0).abs() < 1e-12);
        assert!((u[1] - 3.0).abs() < 1e-12);
        assert_eq!(info.solver_name, "nalgebra-LU");
    }

    #[test]
    fn solves_unsymmetric_transpose() {
        // K = [2 1; 0 3]
        let k = csr(2, &[(0, 0, 2.0), (0, 1, 1.0), (1, 1, 3.0)]);
        let f = DenseLu.factorize(&k).unwrap();
        let b = DVector::from_vec(vec![2.0, 7.0]);
        let x = f.solve_transpose(&b).unwrap();
        // Kᵀ x = b: 2 x0 = 2, x0 + 3 x1 = 7
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_singular_matrix() {
        let k = csr(2, &[(0, 0, 1.0), (0, 1, -1.0), (1, 0, -1.0), (1, 1, 1.0)]);
        assert!(DenseLu.factorize(&k).is_err());
    }
}
