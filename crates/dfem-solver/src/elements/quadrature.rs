//! Gauss quadrature rules on the reference domains.
//!
//! - Lines and tensor-product boxes: Gauss-Legendre on [-1, 1]
//! - Triangles: reference triangle (0,0)-(1,0)-(0,1), area 1/2
//! - Tetrahedra: reference tetrahedron with unit legs, volume 1/6

/// A quadrature point with natural coordinates and weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadraturePoint {
    /// Natural coordinates; unused trailing components are zero.
    pub coords: [f64; 3],
    /// Integration weight.
    pub weight: f64,
}

impl QuadraturePoint {
    /// Create a new quadrature point.
    pub fn new(coords: [f64; 3], weight: f64) -> Self {
        Self { coords, weight }
    }
}

/// Number of Gauss-Legendre points per direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GaussOrder {
    One,
    Two,
    Three,
}

const INV_SQRT_3: f64 = 0.577_350_269_189_625_8;
const SQRT_3_5: f64 = 0.774_596_669_241_483_4;

/// 1D Gauss-Legendre points and weights on [-1, 1].
pub fn gauss_1d(order: GaussOrder) -> Vec<(f64, f64)> {
    match order {
        GaussOrder::One => vec![(0.0, 2.0)],
        GaussOrder::Two => vec![(-INV_SQRT_3, 1.0), (INV_SQRT_3, 1.0)],
        GaussOrder::Three => vec![
            (-SQRT_3_5, 5.0 / 9.0),
            (0.0, 8.0 / 9.0),
            (SQRT_3_5, 5.0 / 9.0),
        ],
    }
}

/// Gauss rule on the reference line.
pub fn gauss_line(order: GaussOrder) -> Vec<QuadraturePoint> {
    gauss_1d(order)
        .into_iter()
        .map(|(x, w)| QuadraturePoint::new([x, 0.0, 0.0], w))
        .collect()
}

/// Tensor-product Gauss rule on the reference square, ξ fastest.
pub fn gauss_quad(order: GaussOrder) -> Vec<QuadraturePoint> {
    let rule = gauss_1d(order);
    let mut points = Vec::with_capacity(rule.len() * rule.len());
    for &(eta, w_eta) in &rule {
        for &(xi, w_xi) in &rule {
            points.push(QuadraturePoint::new([xi, eta, 0.0], w_xi * w_eta));
        }
    }
    points
}

/// Tensor-product Gauss rule on the reference cube, ξ fastest.
pub fn gauss_hex(order: GaussOrder) -> Vec<QuadraturePoint> {
    let rule = gauss_1d(order);
    let mut points = Vec::with_capacity(rule.len().pow(3));
    for &(zeta, w_zeta) in &rule {
        for &(eta, w_eta) in &rule {
            for &(xi, w_xi) in &rule {
                points.push(QuadraturePoint::new(
                    [xi, eta, zeta],
                    w_xi * w_eta * w_zeta,
                ));
            }
        }
    }
    points
}

/// Triangle rule: 1 point (degree 1) or 3 points (degree 2).
pub fn triangle(n_points: usize) -> Vec<QuadraturePoint> {
    if n_points <= 1 {
        return vec![QuadraturePoint::new([1.0 / 3.0, 1.0 / 3.0, 0.0], 0.5)];
    }
    let w = 1.0 / 6.0;
    vec![
        QuadraturePoint::new([1.0 / 6.0, 1.0 / 6.0, 0.0], w),
        QuadraturePoint::new([2.0 / 3.0, 1.0 / 6.0, 0.0], w),
        QuadraturePoint::new([1.0 / 6.0, 2.0 / 3.0, 0.0], w),
    ]
}

/// Tetrahedron rule: 1 point (degree 1) or 4 points (degree 2).
pub fn tetrahedron(n_points: usize) -> Vec<QuadraturePoint> {
    if n_points <= 1 {
        return vec![QuadraturePoint::new([0.25, 0.25, 0.25], 1.0 / 6.0)];
    }
    let a = 0.585_410_196_624_968_5;
    let b = 0.138_196_601_125_010_5;
    let w = 1.0 / 24.0;
    vec![
        QuadraturePoint::new([b, b, b], w),
        QuadraturePoint::new([a, b, b], w),
        QuadraturePoint::new([b, a, b], w),
        QuadraturePoint::new([b, b, a], w),
    ]
}
