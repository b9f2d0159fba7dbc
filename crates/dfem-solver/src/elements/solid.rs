//! 3D solid (continuum) elements
//!
//! - `Hex8`: 8-node trilinear hexahedron, 2×2×2 Gauss points
//! - `Hex20`: 20-node serendipity hexahedron, 3×3×3 Gauss points
//! - `Tet4`: 4-node linear tetrahedron, 1 point
//! - `Tet10`: 10-node quadratic tetrahedron, 4 points
//!
//! Node ordering for the hexahedra:
//! ```text
//!        7----------6
//!       /|         /|
//!      / |        / |
//!     4----------5  |
//!     |  3-------|--2
//!     | /        | /
//!     |/         |/
//!     0----------1
//! ```
//! Bottom face 0-3 at ζ = -1, top face 4-7 at ζ = +1. `Hex20` adds mid-edge
//! nodes 8-11 on the bottom face, 12-15 on the top face and 16-19 on the
//! vertical edges.

use super::quadrature::{self, GaussOrder, QuadraturePoint};
use super::{ShapeFunctions, box_derivatives, box_values, simplex_derivatives, simplex_values};
use nalgebra::{DMatrix, DVector};

const HEX8_NODES: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

const HEX20_NODES: [[f64; 3]; 20] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
    [0.0, -1.0, -1.0],
    [1.0, 0.0, -1.0],
    [0.0, 1.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, -1.0, 1.0],
    [1.0, 0.0, 1.0],
    [0.0, 1.0, 1.0],
    [-1.0, 0.0, 1.0],
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
];

/// Mid-edge nodes 4-9 of `Tet10` as pairs of corner nodes
const TET10_EDGES: [(usize, usize); 6] = [(0, 1), (1, 2), (2, 0), (0, 3), (1, 3), (2, 3)];

/// 8-node trilinear hexahedron
///
/// `N_i = (1 + ξξ_i)(1 + ηη_i)(1 + ζζ_i) / 8`
#[derive(Debug, Clone, Copy, Default)]
pub struct Hex8;

impl ShapeFunctions for Hex8 {
    fn num_nodes(&self) -> usize {
        8
    }

    fn reference_dim(&self) -> usize {
        3
    }

    fn values(&self, xi: &[f64; 3]) -> DVector<f64> {
        box_values(&HEX8_NODES, 3, xi, false)
    }

    fn derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64> {
        box_derivatives(&HEX8_NODES, 3, xi, false)
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        quadrature::gauss_hex(GaussOrder::Two)
    }
}

/// 20-node serendipity hexahedron
#[derive(Debug, Clone, Copy, Default)]
pub struct Hex20;

impl ShapeFunctions for Hex20 {
    fn num_nodes(&self) -> usize {
        20
    }

    fn reference_dim(&self) -> usize {
        3
    }

    fn values(&self, xi: &[f64; 3]) -> DVector<f64> {
        box_values(&HEX20_NODES, 3, xi, true)
    }

    fn derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64> {
        box_derivatives(&HEX20_NODES, 3, xi, true)
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        quadrature::gauss_hex(GaussOrder::Three)
    }
}

/// 4-node linear tetrahedron (constant strain)
#[derive(Debug, Clone, Copy, Default)]
pub struct Tet4;

impl ShapeFunctions for Tet4 {
    fn num_nodes(&self) -> usize {
        4
    }

    fn reference_dim(&self) -> usize {
        3
    }

    fn values(&self, xi: &[f64; 3]) -> DVector<f64> {
        simplex_values(3, &[], xi)
    }

    fn derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64> {
        simplex_derivatives(3, &[], xi)
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        quadrature::tetrahedron(1)
    }
}

/// 10-node quadratic tetrahedron
#[derive(Debug, Clone, Copy, Default)]
pub struct Tet10;

impl ShapeFunctions for Tet10 {
    fn num_nodes(&self) -> usize {
        10
    }

    fn reference_dim(&self) -> usize {
        3
    }

    fn values(&self, xi: &[f64; 3]) -> DVector<f64> {
        simplex_values(3, &TET10_EDGES, xi)
    }

    fn derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64> {
        simplex_derivatives(3, &TET10_EDGES, xi)
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        quadrature::tetrahedron(4)
    }
}
