//! Rotation of Voigt stiffness matrices.
//!
//! The Voigt matrix is expanded to the fourth-order tensor, rotated with
//! ```text
//! C'ijkl = R_ia R_jb R_kc R_ld C_abcd
//! ```
//! and contracted back. Engineering shear strains make `C_IJ = C_ijkl` for
//! the index pairs below, so no factors of two appear.
//!
//! 2D stiffness matrices are rotated with the in-plane block of `R`, which
//! must therefore be a rotation about z. Bar stiffness is frame independent.

use crate::error::{FemError, Result};
use nalgebra::{DMatrix, Matrix3, Rotation3, Unit, Vector3};

const PAIRS_3D: [(usize, usize); 6] = [(0, 0), (1, 1), (2, 2), (0, 1), (1, 2), (2, 0)];
const PAIRS_2D: [(usize, usize); 3] = [(0, 0), (1, 1), (0, 1)];

const TOLERANCE: f64 = 1e-9;

/// Rotation about z by `angle` radians
pub fn rotation_z(angle: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Vector3::z_axis(), angle).into_inner()
}

/// Rotation about `axis` by `angle` radians
pub fn axis_angle(axis: Vector3<f64>, angle: f64) -> Matrix3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle).into_inner()
}

fn check_rotation(r: &Matrix3<f64>) -> Result<()> {
    let orthogonality = (r.transpose() * r - Matrix3::identity()).amax();
    if orthogonality > TOLERANCE || (r.determinant() - 1.0).abs() > TOLERANCE {
        return Err(FemError::config(format!(
            "orientation is not a proper rotation matrix: {r}"
        )));
    }
    Ok(())
}

fn index(pairs: &[(usize, usize)], i: usize, j: usize) -> usize {
    pairs
        .iter()
        .position(|&(a, b)| (a, b) == (i, j) || (b, a) == (i, j))
        .unwrap_or(usize::MAX)
}

fn rotate_with(c: &DMatrix<f64>, r: &[[f64; 3]; 3], pairs: &[(usize, usize)], dim: usize) -> DMatrix<f64> {
    // Expand to the full tensor on `dim` axes
    let n = dim * dim;
    let mut tensor = vec![0.0; n * n];
    let at = |i: usize, j: usize, k: usize, l: usize| ((i * dim + j) * dim + k) * dim + l;
    for i in 0..dim {
        for j in 0..dim {
            let ij = index(pairs, i, j);
            for k in 0..dim {
                for l in 0..dim {
                    tensor[at(i, j, k, l)] = c[(ij, index(pairs, k, l))];
                }
            }
        }
    }

    // Rotate one index at a time
    for slot in 0..4 {
        let mut next = vec![0.0; n * n];
        for i in 0..dim {
            for j in 0..dim {
                for k in 0..dim {
                    for l in 0..dim {
                        let idx = [i, j, k, l];
                        let mut sum = 0.0;
                        for a in 0..dim {
                            let mut src = idx;
                            src[slot] = a;
                            sum += r[idx[slot]][a] * tensor[at(src[0], src[1], src[2], src[3])];
                        }
                        next[at(i, j, k, l)] = sum;
                    }
                }
            }
        }
        tensor = next;
    }

    let m = pairs.len();
    DMatrix::from_fn(m, m, |p, q| {
        let (i, j) = pairs[p];
        let (k, l) = pairs[q];
        tensor[at(i, j, k, l)]
    })
}

/// Rotate a Voigt stiffness matrix of size 1, 3 or 6 by `r`
pub fn rotate_stiffness(c: &DMatrix<f64>, r: &Matrix3<f64>) -> Result<DMatrix<f64>> {
    check_rotation(r)?;
    let rows = |dim: usize| -> [[f64; 3]; 3] {
        let mut out = [[0.0; 3]; 3];
        for i in 0..dim {
            for j in 0..dim {
                out[i][j] = r[(i, j)];
            }
        }
        out
    };
    match c.nrows() {
        1 => Ok(c.clone()),
        3 => {
            let out_of_plane = r[(0, 2)].abs() + r[(1, 2)].abs() + r[(2, 0)].abs() + r[(2, 1)].abs();
            if out_of_plane > TOLERANCE || (r[(2, 2)] - 1.0).abs() > TOLERANCE {
                return Err(FemError::config(
                    "2D materials can only be rotated about the z axis",
                ));
            }
            Ok(rotate_with(c, &rows(2), &PAIRS_2D, 2))
        }
        6 => Ok(rotate_with(c, &rows(3), &PAIRS_3D, 3)),
        n => Err(FemError::config(format!("cannot rotate a {n}×{n} stiffness"))),
    }
}
