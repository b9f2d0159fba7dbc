//! Linear elastic materials.
//!
//! All constructors build the Voigt stiffness `C` directly and check it is
//! symmetric positive definite. Anisotropic laws are defined in their
//! material frame (axis 1 = x) and oriented with [`Material::rotated`].

use super::Material;
use super::rotation::rotate_stiffness;
use crate::error::{FemError, Result};
use nalgebra::{DMatrix, DVector, Matrix3};
use std::sync::Arc;

/// Linear elastic law `σ = C ε`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearElastic {
    stiffness: DMatrix<f64>,
    /// Poisson's ratio of a plane-strain law, which carries `σzz = ν(σxx + σyy)`
    plane_strain_poisson: Option<f64>,
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(FemError::Material(format!("{name} must be positive, got {value}")))
    }
}

fn check_poisson(nu: f64) -> Result<()> {
    if nu > -1.0 && nu < 0.5 {
        Ok(())
    } else {
        Err(FemError::Material(format!(
            "Poisson's ratio must lie in (-1, 0.5), got {nu}"
        )))
    }
}

/// Shear modulus `G = E / (2(1 + ν))`
pub fn shear_modulus(e: f64, nu: f64) -> f64 {
    e / (2.0 * (1.0 + nu))
}

/// Bulk modulus `K = E / (3(1 − 2ν))`
pub fn bulk_modulus(e: f64, nu: f64) -> f64 {
    e / (3.0 * (1.0 - 2.0 * nu))
}

impl LinearElastic {
    /// From a Voigt stiffness matrix of size 1, 3 or 6
    pub fn from_stiffness(stiffness: DMatrix<f64>) -> Result<Self> {
        let n = stiffness.nrows();
        if stiffness.ncols() != n || ![1, 3, 6].contains(&n) {
            return Err(FemError::Material(format!(
                "stiffness must be 1×1, 3×3 or 6×6, got {}×{}",
                n,
                stiffness.ncols()
            )));
        }
        if stiffness.iter().any(|v| !v.is_finite()) {
            return Err(FemError::Material("stiffness has non-finite entries".into()));
        }
        let scale = stiffness.amax().max(f64::MIN_POSITIVE);
        if (&stiffness - stiffness.transpose()).amax() > 1e-10 * scale {
            return Err(FemError::Material("stiffness is not symmetric".into()));
        }
        if stiffness.clone().cholesky().is_none() {
            return Err(FemError::Material("stiffness is not positive definite".into()));
        }
        Ok(Self {
            stiffness,
            plane_strain_poisson: None,
        })
    }

    /// Isotropic 3D law from Young's modulus and Poisson's ratio
    ///
    /// ```text
    /// C = λ 1⊗1 + 2G I   (engineering shear: G on the shear diagonal)
    /// ```
    pub fn isotropic(e: f64, nu: f64) -> Result<Self> {
        check_positive("Young's modulus", e)?;
        check_poisson(nu)?;
        let lambda = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let g = shear_modulus(e, nu);
        let mut c = DMatrix::zeros(6, 6);
        for i in 0..3 {
            for j in 0..3 {
                c[(i, j)] = lambda;
            }
            c[(i, i)] += 2.0 * g;
            c[(i + 3, i + 3)] = g;
        }
        Self::from_stiffness(c)
    }

    /// Isotropic plane stress (`σzz = 0`)
    pub fn plane_stress(e: f64, nu: f64) -> Result<Self> {
        check_positive("Young's modulus", e)?;
        check_poisson(nu)?;
        let f = e / (1.0 - nu * nu);
        let c = DMatrix::from_row_slice(
            3,
            3,
            &[f, f * nu, 0.0, f * nu, f, 0.0, 0.0, 0.0, f * 0.5 * (1.0 - nu)],
        );
        Self::from_stiffness(c)
    }

    /// Isotropic plane strain (`εzz = 0`)
    pub fn plane_strain(e: f64, nu: f64) -> Result<Self> {
        check_positive("Young's modulus", e)?;
        check_poisson(nu)?;
        let f = e / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let c = DMatrix::from_row_slice(
            3,
            3,
            &[
                f * (1.0 - nu),
                f * nu,
                0.0,
                f * nu,
                f * (1.0 - nu),
                0.0,
                0.0,
                0.0,
                f * 0.5 * (1.0 - 2.0 * nu),
            ],
        );
        Ok(Self {
            plane_strain_poisson: Some(nu),
            ..Self::from_stiffness(c)?
        })
    }

    /// Uniaxial law for bars
    pub fn uniaxial(e: f64) -> Result<Self> {
        check_positive("Young's modulus", e)?;
        Self::from_stiffness(DMatrix::from_element(1, 1, e))
    }

    /// Orthotropic 3D law in its material frame.
    ///
    /// `nu_ij` is the contraction in `j` for a load in `i`. Shear moduli are
    /// given per plane: `g12` (xy), `g13` (zx), `g23` (yz).
    #[allow(clippy::too_many_arguments)]
    pub fn orthotropic(
        e1: f64,
        e2: f64,
        e3: f64,
        nu12: f64,
        nu13: f64,
        nu23: f64,
        g12: f64,
        g13: f64,
        g23: f64,
    ) -> Result<Self> {
        for (name, v) in [("E1", e1), ("E2", e2), ("E3", e3), ("G12", g12), ("G13", g13), ("G23", g23)] {
            check_positive(name, v)?;
        }
        let mut s = DMatrix::zeros(6, 6);
        s[(0, 0)] = 1.0 / e1;
        s[(1, 1)] = 1.0 / e2;
        s[(2, 2)] = 1.0 / e3;
        s[(0, 1)] = -nu12 / e1;
        s[(1, 0)] = -nu12 / e1;
        s[(0, 2)] = -nu13 / e1;
        s[(2, 0)] = -nu13 / e1;
        s[(1, 2)] = -nu23 / e2;
        s[(2, 1)] = -nu23 / e2;
        s[(3, 3)] = 1.0 / g12;
        s[(4, 4)] = 1.0 / g23;
        s[(5, 5)] = 1.0 / g13;
        let c = s
            .cholesky()
            .map(|chol| chol.inverse())
            .ok_or_else(|| FemError::Material("orthotropic compliance is not positive definite".into()))?;
        Self::from_stiffness(symmetrized(c))
    }

    /// Transversely isotropic 3D law with fibre (longitudinal) direction x.
    ///
    /// The transverse plane is isotropic with `G_T = E_T / (2(1 + ν_T))`.
    pub fn transverse_isotropic(e_l: f64, e_t: f64, nu_l: f64, nu_t: f64, g_l: f64) -> Result<Self> {
        check_positive("E_T", e_t)?;
        check_poisson(nu_t)?;
        let g_t = shear_modulus(e_t, nu_t);
        Self::orthotropic(e_l, e_t, e_t, nu_l, nu_l, nu_t, g_l, g_l, g_t)
    }

    /// Orthotropic plane stress law in its material frame
    pub fn orthotropic_plane_stress(e1: f64, e2: f64, nu12: f64, g12: f64) -> Result<Self> {
        for (name, v) in [("E1", e1), ("E2", e2), ("G12", g12)] {
            check_positive(name, v)?;
        }
        let nu21 = nu12 * e2 / e1;
        let d = 1.0 - nu12 * nu21;
        if !(d > 0.0) {
            return Err(FemError::Material(format!(
                "orthotropic plane stress requires ν12·ν21 < 1, got {}",
                nu12 * nu21
            )));
        }
        let c = DMatrix::from_row_slice(
            3,
            3,
            &[e1 / d, nu12 * e2 / d, 0.0, nu12 * e2 / d, e2 / d, 0.0, 0.0, 0.0, g12],
        );
        Self::from_stiffness(c)
    }

    /// Voigt stiffness matrix
    pub fn stiffness(&self) -> &DMatrix<f64> {
        &self.stiffness
    }
}

fn symmetrized(c: DMatrix<f64>) -> DMatrix<f64> {
    (&c + c.transpose()) * 0.5
}

impl Material for LinearElastic {
    fn n_strains(&self) -> usize {
        self.stiffness.nrows()
    }

    fn stress(&self, strain: &DVector<f64>, _state: &DVector<f64>) -> DVector<f64> {
        &self.stiffness * strain
    }

    fn tangent(&self, _strain: &DVector<f64>, _state: &DVector<f64>) -> DMatrix<f64> {
        self.stiffness.clone()
    }

    fn out_of_plane_stress(&self, stress: &DVector<f64>) -> f64 {
        match self.plane_strain_poisson {
            Some(nu) if stress.len() == 3 => nu * (stress[0] + stress[1]),
            _ => 0.0,
        }
    }

    // In-plane rotations keep σxx + σyy, so the plane-strain ratio carries over.
    fn rotated(&self, r: &Matrix3<f64>) -> Result<Arc<dyn Material>> {
        let stiffness = rotate_stiffness(&self.stiffness, r)?;
        Ok(Arc::new(Self {
            stiffness: symmetrized(stiffness),
            plane_strain_poisson: self.plane_strain_poisson,
        }))
    }
}
