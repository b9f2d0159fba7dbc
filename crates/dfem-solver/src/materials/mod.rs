//! Constitutive models.
//!
//! A [`Material`] maps a strain increment and the converged history of a
//! material point to the new stress, the new history and the consistent
//! tangent. Vectors use Voigt notation with engineering shear strains:
//!
//! | family  | components                          |
//! |---------|-------------------------------------|
//! | solid   | `[xx, yy, zz, xy, yz, zx]`          |
//! | planar  | `[xx, yy, xy]`                      |
//! | truss   | `[xx]`                              |
//!
//! Design variables act through [`ScaledMaterial`], which multiplies the
//! response of an unscaled material by a stiffness scale `s`.

use crate::error::{FemError, Result};
use nalgebra::{DMatrix, DVector, Matrix3};
use std::fmt::Debug;
use std::sync::Arc;

pub mod elastic;
pub mod plasticity;
pub mod rotation;

pub use elastic::LinearElastic;
pub use plasticity::IsotropicPlasticity;
pub use rotation::{axis_angle, rotate_stiffness, rotation_z};

/// Result of one constitutive update
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialResponse {
    /// Total mechanical strain after the update
    pub strain: DVector<f64>,
    /// Stress after the update
    pub stress: DVector<f64>,
    /// History variables after the update
    pub state: DVector<f64>,
    /// Consistent tangent `dσ/dε`
    pub tangent: DMatrix<f64>,
}

/// Constitutive law interface
pub trait Material: Send + Sync + Debug {
    /// Number of Voigt strain components
    fn n_strains(&self) -> usize;

    /// Number of history variables per material point
    fn n_state(&self) -> usize {
        0
    }

    /// Stress for a total strain and history
    fn stress(&self, strain: &DVector<f64>, state: &DVector<f64>) -> DVector<f64>;

    /// Tangent stiffness for a total strain and history
    fn tangent(&self, strain: &DVector<f64>, state: &DVector<f64>) -> DMatrix<f64>;

    /// Incremental update from the last converged point.
    ///
    /// Path-independent laws evaluate at the total strain `ε_old + Δε`.
    fn step(
        &self,
        d_strain: &DVector<f64>,
        strain_old: &DVector<f64>,
        _stress_old: &DVector<f64>,
        state_old: &DVector<f64>,
    ) -> Result<MaterialResponse> {
        let strain = strain_old + d_strain;
        Ok(MaterialResponse {
            stress: self.stress(&strain, state_old),
            tangent: self.tangent(&strain, state_old),
            state: state_old.clone(),
            strain,
        })
    }

    /// Normal stress `σzz` carried alongside an in-plane stress.
    ///
    /// Zero except for planar laws that constrain `εzz`.
    fn out_of_plane_stress(&self, _stress: &DVector<f64>) -> f64 {
        0.0
    }

    /// Same law with its frame rotated by `r`
    fn rotated(&self, r: &Matrix3<f64>) -> Result<Arc<dyn Material>>;

    /// Whether the stress depends on the loading history
    fn is_path_dependent(&self) -> bool {
        self.n_state() > 0
    }
}

/// A material whose response is multiplied by a stiffness scale.
///
/// Stress and tangent are `s` times those of the inner law. The inner law
/// sees the unscaled stress history `σ_old / s`, so incremental laws remain
/// consistent. The scale is stored separately from the inner material and
/// can always be removed again with [`ScaledMaterial::inner`].
#[derive(Debug, Clone)]
pub struct ScaledMaterial {
    inner: Arc<dyn Material>,
    scale: f64,
}

impl ScaledMaterial {
    /// Wrap `inner` with stiffness scale `scale ≥ 0`
    pub fn new(inner: Arc<dyn Material>, scale: f64) -> Result<Self> {
        if !(scale >= 0.0 && scale.is_finite()) {
            return Err(FemError::Material(format!(
                "stiffness scale must be finite and non-negative, got {scale}"
            )));
        }
        Ok(Self { inner, scale })
    }

    /// Stiffness scale
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Unscaled material
    pub fn inner(&self) -> &Arc<dyn Material> {
        &self.inner
    }

    fn unscaled_stress(&self, stress: &DVector<f64>) -> DVector<f64> {
        if self.scale > 0.0 {
            stress / self.scale
        } else {
            DVector::zeros(stress.len())
        }
    }
}

impl Material for ScaledMaterial {
    fn n_strains(&self) -> usize {
        self.inner.n_strains()
    }

    fn n_state(&self) -> usize {
        self.inner.n_state()
    }

    fn stress(&self, strain: &DVector<f64>, state: &DVector<f64>) -> DVector<f64> {
        self.inner.stress(strain, state) * self.scale
    }

    fn tangent(&self, strain: &DVector<f64>, state: &DVector<f64>) -> DMatrix<f64> {
        self.inner.tangent(strain, state) * self.scale
    }

    fn step(
        &self,
        d_strain: &DVector<f64>,
        strain_old: &DVector<f64>,
        stress_old: &DVector<f64>,
        state_old: &DVector<f64>,
    ) -> Result<MaterialResponse> {
        let sigma_old = self.unscaled_stress(stress_old);
        let mut response = self.inner.step(d_strain, strain_old, &sigma_old, state_old)?;
        response.stress *= self.scale;
        response.tangent *= self.scale;
        Ok(response)
    }

    fn out_of_plane_stress(&self, stress: &DVector<f64>) -> f64 {
        self.inner.out_of_plane_stress(&self.unscaled_stress(stress)) * self.scale
    }

    fn rotated(&self, r: &Matrix3<f64>) -> Result<Arc<dyn Material>> {
        Ok(Arc::new(Self {
            inner: self.inner.rotated(r)?,
            scale: self.scale,
        }))
    }

    fn is_path_dependent(&self) -> bool {
        self.inner.is_path_dependent()
    }
}

/// Material assignment over the elements of a mesh
#[derive(Debug, Clone)]
pub enum MaterialAssignment {
    /// One material shared by every element
    Uniform(Arc<dyn Material>),
    /// One material per element, indexed like the mesh elements
    PerElement(Vec<Arc<dyn Material>>),
}

impl MaterialAssignment {
    /// Material of element `element`
    pub fn get(&self, element: usize) -> Option<&Arc<dyn Material>> {
        match self {
            MaterialAssignment::Uniform(m) => Some(m),
            MaterialAssignment::PerElement(ms) => ms.get(element),
        }
    }

    /// Number of explicit entries (`None` for a uniform assignment)
    pub fn len(&self) -> Option<usize> {
        match self {
            MaterialAssignment::Uniform(_) => None,
            MaterialAssignment::PerElement(ms) => Some(ms.len()),
        }
    }

    /// Whether any assigned material is path dependent
    pub fn is_path_dependent(&self) -> bool {
        match self {
            MaterialAssignment::Uniform(m) => m.is_path_dependent(),
            MaterialAssignment::PerElement(ms) => ms.iter().any(|m| m.is_path_dependent()),
        }
    }

    /// Largest number of history variables over all materials
    pub fn max_state(&self) -> usize {
        match self {
            MaterialAssignment::Uniform(m) => m.n_state(),
            MaterialAssignment::PerElement(ms) => ms.iter().map(|m| m.n_state()).max().unwrap_or(0),
        }
    }
}

impl From<Arc<dyn Material>> for MaterialAssignment {
    fn from(material: Arc<dyn Material>) -> Self {
        MaterialAssignment::Uniform(material)
    }
}

impl From<LinearElastic> for MaterialAssignment {
    fn from(material: LinearElastic) -> Self {
        MaterialAssignment::Uniform(Arc::new(material))
    }
}

impl From<IsotropicPlasticity> for MaterialAssignment {
    fn from(material: IsotropicPlasticity) -> Self {
        MaterialAssignment::Uniform(Arc::new(material))
    }
}
