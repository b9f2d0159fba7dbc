//! Finite element library: shape functions, quadrature and kinematics.
//!
//! Each element type provides its shape functions on a reference domain
//! through [`ShapeFunctions`]. [`evaluate_point`] maps them to physical
//! space at one quadrature point and builds the strain-displacement
//! operator `B` for the element's kinematic family.

use crate::error::{FemError, Result};
use crate::mesh::{ElementFamily, ElementType};
use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

pub mod planar;
pub mod quadrature;
pub mod shell;
pub mod solid;
pub mod truss;

pub use planar::{Quad4, Quad8, Tri3, Tri6};
pub use quadrature::{GaussOrder, QuadraturePoint};
pub use shell::Shell3;
pub use solid::{Hex20, Hex8, Tet10, Tet4};
pub use truss::Bar2;

/// Shape function interface on the reference domain
pub trait ShapeFunctions: Sync {
    /// Number of nodes
    fn num_nodes(&self) -> usize;

    /// Dimension of the reference domain
    fn reference_dim(&self) -> usize;

    /// Shape function values at natural coordinates `xi`
    fn values(&self, xi: &[f64; 3]) -> DVector<f64>;

    /// Derivatives with respect to natural coordinates, `reference_dim × num_nodes`
    fn derivatives(&self, xi: &[f64; 3]) -> DMatrix<f64>;

    /// Quadrature rule used for stiffness and internal force integration
    fn quadrature(&self) -> Vec<QuadraturePoint>;
}

impl ElementType {
    /// Shape functions of this element type
    pub fn shape(&self) -> &'static dyn ShapeFunctions {
        match self {
            ElementType::Bar2 => &Bar2,
            ElementType::Tri3 => &Tri3,
            ElementType::Tri6 => &Tri6,
            ElementType::Quad4 => &Quad4,
            ElementType::Quad8 => &Quad8,
            ElementType::Tet4 => &Tet4,
            ElementType::Tet10 => &Tet10,
            ElementType::Hex8 => &Hex8,
            ElementType::Hex20 => &Hex20,
            ElementType::Shell3 => &Shell3,
        }
    }

    /// Quadrature rule of this element type
    pub fn quadrature(&self) -> Vec<QuadraturePoint> {
        self.shape().quadrature()
    }
}

/// Physical-space quantities at one quadrature point
#[derive(Debug, Clone)]
pub struct PointKinematics {
    /// Shape function values
    pub shape: DVector<f64>,
    /// Physical shape function gradients, `dim × num_nodes`
    pub grad: DMatrix<f64>,
    /// Strain-displacement operator, `n_strains × (num_nodes · dim)`
    pub b: DMatrix<f64>,
    /// Jacobian determinant (length/area/volume ratio to the reference domain)
    pub det_j: f64,
    /// Integration measure `weight · det_j · section`
    pub dv: f64,
}

impl PointKinematics {
    /// Displacement gradient `H = Σ u_a ⊗ ∇N_a` embedded in a 3×3 matrix
    pub fn displacement_gradient(&self, u_e: &DVector<f64>) -> Matrix3<f64> {
        let dim = self.grad.nrows();
        let mut h = Matrix3::zeros();
        for a in 0..self.grad.ncols() {
            for i in 0..dim {
                for j in 0..dim {
                    h[(i, j)] += u_e[a * dim + i] * self.grad[(j, a)];
                }
            }
        }
        h
    }

    /// Deformation gradient `F = I + H`
    pub fn deformation_gradient(&self, u_e: &DVector<f64>) -> Matrix3<f64> {
        Matrix3::identity() + self.displacement_gradient(u_e)
    }
}

/// Evaluate kinematics of `element` at quadrature point `q`.
///
/// `coords` holds the element's nodal coordinates (`num_nodes × dim`),
/// `section` is the bar area or planar/shell thickness (1 for solids).
/// A non-positive Jacobian determinant is a [`FemError::Geometry`].
pub fn evaluate_point(
    element_type: ElementType,
    coords: &DMatrix<f64>,
    q: &QuadraturePoint,
    section: f64,
    element: usize,
    point: usize,
) -> Result<PointKinematics> {
    let shape = element_type.shape();
    let n = shape.values(&q.coords);
    let dn = shape.derivatives(&q.coords);
    let geometry_error = |det_j: f64| FemError::Geometry {
        element,
        point,
        det_j,
    };

    match element_type.family() {
        ElementFamily::Planar | ElementFamily::Solid => {
            // J = dN/dξ · X, rows are derivatives along one natural direction
            let j = &dn * coords;
            let det_j = j.determinant();
            if !(det_j > 0.0) {
                return Err(geometry_error(det_j));
            }
            let j_inv = j.try_inverse().ok_or_else(|| geometry_error(det_j))?;
            let grad = j_inv * &dn;
            let b = match element_type.family() {
                ElementFamily::Planar => planar_b(&grad),
                _ => solid_b(&grad),
            };
            Ok(PointKinematics {
                shape: n,
                grad,
                b,
                det_j,
                dv: q.weight * det_j * section,
            })
        }
        ElementFamily::Truss => truss::kinematics(coords, n, q.weight, section)
            .ok_or_else(|| geometry_error(0.0)),
        ElementFamily::Shell => shell::kinematics(coords, n, &dn, q.weight, section)
            .ok_or_else(|| geometry_error(0.0)),
    }
}

/// B operator for 2D continua: `[εxx, εyy, γxy]`
pub(crate) fn planar_b(grad: &DMatrix<f64>) -> DMatrix<f64> {
    let n = grad.ncols();
    let mut b = DMatrix::zeros(3, 2 * n);
    for a in 0..n {
        let (dx, dy) = (grad[(0, a)], grad[(1, a)]);
        b[(0, 2 * a)] = dx;
        b[(1, 2 * a + 1)] = dy;
        b[(2, 2 * a)] = dy;
        b[(2, 2 * a + 1)] = dx;
    }
    b
}

/// B operator for 3D continua: `[εxx, εyy, εzz, γxy, γyz, γzx]`
///
/// For each node:
/// ```text
/// B = [dN/dx    0       0    ]
///     [0        dN/dy   0    ]
///     [0        0       dN/dz]
///     [dN/dy    dN/dx   0    ]
///     [0        dN/dz   dN/dy]
///     [dN/dz    0       dN/dx]
/// ```
pub(crate) fn solid_b(grad: &DMatrix<f64>) -> DMatrix<f64> {
    let n = grad.ncols();
    let mut b = DMatrix::zeros(6, 3 * n);
    for a in 0..n {
        let (dx, dy, dz) = (grad[(0, a)], grad[(1, a)], grad[(2, a)]);
        let c = 3 * a;
        b[(0, c)] = dx;
        b[(1, c + 1)] = dy;
        b[(2, c + 2)] = dz;
        b[(3, c)] = dy;
        b[(3, c + 1)] = dx;
        b[(4, c + 1)] = dz;
        b[(4, c + 2)] = dy;
        b[(5, c + 2)] = dx;
        b[(5, c)] = dz;
    }
    b
}

/// Shape functions of tensor-product elements from a natural node table.
///
/// Corner nodes (all coordinates ±1) of serendipity elements use
/// `N = Π(1 + x_k s_k)(Σ x_k s_k − (d − 1)) / 2^d`, mid-edge nodes (one zero
/// coordinate `m`) use `N = (1 − x_m²) Π_{k≠m}(1 + x_k s_k) / 2^(d−1)`.
/// With `quadratic == false` all nodes are corners of a linear element.
pub(crate) fn box_values(table: &[[f64; 3]], dim: usize, xi: &[f64; 3], quadratic: bool) -> DVector<f64> {
    DVector::from_iterator(
        table.len(),
        table.iter().map(|s| {
            let factors: Vec<f64> = (0..dim).map(|k| 1.0 + xi[k] * s[k]).collect();
            match (0..dim).find(|&k| s[k] == 0.0) {
                Some(m) => {
                    let rest: f64 = (0..dim).filter(|&k| k != m).map(|k| factors[k]).product();
                    (1.0 - xi[m] * xi[m]) * rest / 2f64.powi(dim as i32 - 1)
                }
                None => {
                    let prod: f64 = factors.iter().product();
                    let scale = 2f64.powi(dim as i32);
                    if quadratic {
                        let sum: f64 = (0..dim).map(|k| xi[k] * s[k]).sum();
                        prod * (sum - (dim as f64 - 1.0)) / scale
                    } else {
                        prod / scale
                    }
                }
            }
        }),
    )
}

/// Natural derivatives matching [`box_values`], `dim × nodes`.
pub(crate) fn box_derivatives(table: &[[f64; 3]], dim: usize, xi: &[f64; 3], quadratic: bool) -> DMatrix<f64> {
    let mut dn = DMatrix::zeros(dim, table.len());
    for (a, s) in table.iter().enumerate() {
        let factors: Vec<f64> = (0..dim).map(|k| 1.0 + xi[k] * s[k]).collect();
        let product_except = |skip: &[usize]| -> f64 {
            (0..dim)
                .filter(|k| !skip.contains(k))
                .map(|k| factors[k])
                .product()
        };
        match (0..dim).find(|&k| s[k] == 0.0) {
            Some(m) => {
                let scale = 2f64.powi(dim as i32 - 1);
                for j in 0..dim {
                    dn[(j, a)] = if j == m {
                        -2.0 * xi[m] * product_except(&[m]) / scale
                    } else {
                        (1.0 - xi[m] * xi[m]) * s[j] * product_except(&[m, j]) / scale
                    };
                }
            }
            None => {
                let scale = 2f64.powi(dim as i32);
                let prod = product_except(&[]);
                let sum: f64 = (0..dim).map(|k| xi[k] * s[k]).sum();
                for j in 0..dim {
                    let d_prod = s[j] * product_except(&[j]);
                    dn[(j, a)] = if quadratic {
                        (d_prod * (sum - (dim as f64 - 1.0)) + prod * s[j]) / scale
                    } else {
                        d_prod / scale
                    };
                }
            }
        }
    }
    dn
}

/// Barycentric coordinates `[1 − Σξ, ξ1, .., ξd]` and their constant gradients.
fn barycentric(dim: usize, xi: &[f64; 3]) -> (Vec<f64>, DMatrix<f64>) {
    let mut l = Vec::with_capacity(dim + 1);
    l.push(1.0 - xi[..dim].iter().sum::<f64>());
    l.extend_from_slice(&xi[..dim]);
    let mut dl = DMatrix::zeros(dim, dim + 1);
    for j in 0..dim {
        dl[(j, 0)] = -1.0;
        dl[(j, j + 1)] = 1.0;
    }
    (l, dl)
}

/// Simplex shape functions; quadratic when `edges` is non-empty.
///
/// Corners: `L` (linear) or `L(2L − 1)`; mid-edge nodes: `4 L_a L_b`.
pub(crate) fn simplex_values(dim: usize, edges: &[(usize, usize)], xi: &[f64; 3]) -> DVector<f64> {
    let (l, _) = barycentric(dim, xi);
    let quadratic = !edges.is_empty();
    let corners = l.iter().map(|&li| if quadratic { li * (2.0 * li - 1.0) } else { li });
    let mids = edges.iter().map(|&(a, b)| 4.0 * l[a] * l[b]);
    DVector::from_iterator(dim + 1 + edges.len(), corners.chain(mids))
}

/// Natural derivatives matching [`simplex_values`], `dim × nodes`.
pub(crate) fn simplex_derivatives(dim: usize, edges: &[(usize, usize)], xi: &[f64; 3]) -> DMatrix<f64> {
    let (l, dl) = barycentric(dim, xi);
    let quadratic = !edges.is_empty();
    let mut dn = DMatrix::zeros(dim, dim + 1 + edges.len());
    for j in 0..dim {
        for (a, &la) in l.iter().enumerate() {
            dn[(j, a)] = if quadratic {
                (4.0 * la - 1.0) * dl[(j, a)]
            } else {
                dl[(j, a)]
            };
        }
        for (e, &(a, b)) in edges.iter().enumerate() {
            dn[(j, dim + 1 + e)] = 4.0 * (l[a] * dl[(j, b)] + l[b] * dl[(j, a)]);
        }
    }
    dn
}

/// Unit vector along `v`, `None` for a zero vector
pub(crate) fn unit(v: Vector3<f64>) -> Option<Vector3<f64>> {
    let norm = v.norm();
    (norm > 0.0 && norm.is_finite()).then(|| v / norm)
}
