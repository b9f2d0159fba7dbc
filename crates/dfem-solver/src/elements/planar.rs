//! 2D continuum elements (plane stress / plane strain)
//!
//! Strains are `[εxx, εyy, γxy]`; the section property is the thickness.
//!
//! ```text
//!   Quad4/Quad8            Tri3/Tri6
//!   3----6----2            2
//!   |         |            | \
//!   7         5            5   4
//!   |         |            |     \
//!   0----4----1            0--3---1
//! ```

use super::quadrature::{self, GaussOrder, QuadraturePoint};
use super::{ShapeFunctions, box_derivatives, box_values, simplex_derivatives, simplex_values};
use nalgebra::{DMatrix, DVector};

const QUAD8_NODES: [[f64; 3]; 8] = [
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [0.0, -1.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [-1.0, 0.0, 0.0],
];

const TRI6_EDGES: [(usize, usize); 3] = [(0, 1), (1, 2), (2, 0)];

/// 3-node constant strain triangle
#[derive(Debug, Clone, Copy, Default)]
pub struct Tri3;

impl ShapeFunctions for Tri3 {
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

/// 6-node quadratic triangle
#[derive(Debug, Clone, Copy, Default)]
pub struct Tri6;

impl ShapeFunctions for Tri6 {
    fn num_nodes(&self) -> usize {
        6
    }

    fn reference_dim(&self) -> usize {
        2
    }

    fn values(&self, xi: &[f64; 3]) -> DVector<f64> {
        simplex_values(2, &TRI6_EDGES, xi)
    }

    fn derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64> {
        simplex_derivatives(2, &TRI6_EDGES, xi)
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        quadrature::triangle(3)
    }
}

/// 4-node bilinear quadrilateral
#[derive(Debug, Clone, Copy, Default)]
pub struct Quad4;

impl ShapeFunctions for Quad4 {
    fn num_nodes(&self) -> usize {
        4
    }

    fn reference_dim(&self) -> usize {
        2
    }

    fn values(&self, xi: &[f64; 3]) -> DVector<f64> {
        box_values(&QUAD8_NODES[..4], 2, xi, false)
    }

    fn derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64> {
        box_derivatives(&QUAD8_NODES[..4], 2, xi, false)
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        quadrature::gauss_quad(GaussOrder::Two)
    }
}

/// 8-node serendipity quadrilateral
#[derive(Debug, Clone, Copy, Default)]
pub struct Quad8;

impl ShapeFunctions for Quad8 {
    fn num_nodes(&self) -> usize {
        8
    }

    fn reference_dim(&self) -> usize {
        2
    }

    fn values(&self, xi: &[f64; 3]) -> DVector<f64> {
        box_values(&QUAD8_NODES, 2, xi, true)
    }

    fn derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64> {
        box_derivatives(&QUAD8_NODES, 2, xi, true)
    }

    fn quadrature(&self) -> Vec<QuadraturePoint> {
        quadrature::gauss_quad(GaussOrder::Three)
    }
}
