//! 2-node bar (truss) element for tension/compression.
//!
//! The bar resists only axial deformation. With the unit direction vector
//! `e = (x₂ − x₁) / L`, the axial strain is
//! ```text
//! ε = eᵀ(u₂ − u₁) / L
//! ```
//! so `B = [−eᵀ  eᵀ] / L` and the classic stiffness follows from
//! ```text
//! k = ∫ Bᵀ E B A dx = (A E / L) [ e eᵀ  −e eᵀ]
//!                               [−e eᵀ   e eᵀ]
//! ```
//! The natural coordinate runs over [-1, 1], hence `det J = L / 2`.

use super::quadrature::{self, GaussOrder, QuadraturePoint};
use super::{PointKinematics, ShapeFunctions, unit};
use nalgebra::{DMatrix, DVector, Vector3};

/// 2-node bar in 2D or 3D
#[derive(Debug, Clone, Copy, Default)]
pub struct Bar2;

impl ShapeFunctions for Bar2 {
    fn num_nodes(&self) -> usize {
        2
    }

    fn reference_dim(&self) -> usize {
        1
    }

    fn values(&self, xi: &[f64; 3]) -> DVector<f64> {
        DVector::from_vec(vec![0.5 * (1.0 - xi[0]), 0.5 * (1.0 + xi[0])])
    }

    fn derivatives(&self, _xi: &[f64; 3]) -> DMatrix<f64> {
        DMatrix::from_row_slice(1, 2, &[-0.5, 0.5])
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        quadrature::gauss_line(GaussOrder::One)
    }
}

/// Length and unit direction of a bar, `None` if both nodes coincide
fn axis(coords: &DMatrix<f64>) -> Option<(f64, Vector3<f64>)> {
    let mut d = Vector3::zeros();
    for k in 0..coords.ncols() {
        d[k] = coords[(1, k)] - coords[(0, k)];
    }
    let length = d.norm();
    unit(d).map(|e| (length, e))
}

/// Kinematics of a bar with cross-section `area` at one quadrature point
pub(crate) fn kinematics(
    coords: &DMatrix<f64>,
    shape: DVector<f64>,
    weight: f64,
    area: f64,
) -> Option<PointKinematics> {
    let dim = coords.ncols();
    let (length, e) = axis(coords)?;

    let mut grad = DMatrix::zeros(dim, 2);
    let mut b = DMatrix::zeros(1, 2 * dim);
    for k in 0..dim {
        grad[(k, 0)] = -e[k] / length;
        grad[(k, 1)] = e[k] / length;
    }
    for a in 0..2 {
        for k in 0..dim {
            b[(0, a * dim + k)] = grad[(k, a)];
        }
    }

    let det_j = 0.5 * length;
    Some(PointKinematics {
        shape,
        grad,
        b,
        det_j,
        dv: weight * det_j * area,
    })
}
