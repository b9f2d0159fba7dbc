//! Flat 3-node membrane shell.
//!
//! The element carries in-plane stiffness in a local frame attached to the
//! triangle:
//! - `e1` along edge 0 → 1
//! - `e3` the unit surface normal `(x1 − x0) × (x2 − x0)`
//! - `e2 = e3 × e1`
//!
//! Nodes carry three translations only, so there is no bending or drilling
//! stiffness. Strains are `[ε11, ε22, γ12]` in the local frame and the
//! material sees a plane-stress state; the section property is the thickness.

use super::quadrature::{self, QuadraturePoint};
use super::{PointKinematics, ShapeFunctions, simplex_derivatives, simplex_values, unit};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

/// 3-node flat membrane shell
#[derive(Debug, Clone, Copy, Default)]
pub struct Shell3;

impl ShapeFunctions for Shell3 {
    fn num_nodes(&self) -> usize {
        3
    }

    fn reference_dim(&self) -> usize {
        2
    }

    fn values(&self, xi: &[f64; 3]) -> DVector<f64> {
        simplex_values(2, &[], xi)
    }

    fn derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64> {
        simplex_derivatives(2, &[], xi)
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        quadrature::triangle(1)
    }
}

fn node(coords: &DMatrix<f64>, a: usize) -> Vector3<f64> {
    Vector3::new(coords[(a, 0)], coords[(a, 1)], coords[(a, 2)])
}

/// Local frame `[e1 e2 e3]` as matrix columns, `None` for a degenerate triangle
pub fn local_frame(coords: &DMatrix<f64>) -> Option<Matrix3<f64>> {
    let x0 = node(coords, 0);
    let d1 = node(coords, 1) - x0;
    let d2 = node(coords, 2) - x0;
    let e1 = unit(d1)?;
    let e3 = unit(d1.cross(&d2))?;
    let e2 = e3.cross(&e1);
    Some(Matrix3::from_columns(&[e1, e2, e3]))
}

/// Kinematics of a membrane triangle with `thickness` at one quadrature point
pub(crate) fn kinematics(
    coords: &DMatrix<f64>,
    shape: DVector<f64>,
    dn: &DMatrix<f64>,
    weight: f64,
    thickness: f64,
) -> Option<PointKinematics> {
    let frame = local_frame(coords)?;
    let (e1, e2) = (frame.column(0).into_owned(), frame.column(1).into_owned());

    let x0 = node(coords, 0);
    let mut local = DMatrix::zeros(3, 2);
    for a in 0..3 {
        let d = node(coords, a) - x0;
        local[(a, 0)] = d.dot(&e1);
        local[(a, 1)] = d.dot(&e2);
    }

    let j = dn * &local;
    let det_j = j.determinant();
    if !(det_j > 0.0) {
        return None;
    }
    let g_local = j.try_inverse()? * dn;

    let mut grad = DMatrix::zeros(3, 3);
    let mut b = DMatrix::zeros(3, 9);
    for a in 0..3 {
        let (g1, g2) = (g_local[(0, a)], g_local[(1, a)]);
        for k in 0..3 {
            grad[(k, a)] = e1[k] * g1 + e2[k] * g2;
            b[(0, 3 * a + k)] = g1 * e1[k];
            b[(1, 3 * a + k)] = g2 * e2[k];
            b[(2, 3 * a + k)] = g2 * e1[k] + g1 * e2[k];
        }
    }

    Some(PointKinematics {
        shape,
        grad,
        b,
        det_j,
        dv: weight * det_j * thickness,
    })
}
