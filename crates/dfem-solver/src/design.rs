//! Design variables passed into each solve.
//!
//! A [`DesignState`] is an immutable snapshot: per-element densities with a
//! penalization exponent (SIMP, `s = ρ^p`) and optional per-element material
//! orientations. Optimizers create a new snapshot with [`DesignState::next`]
//! instead of mutating shared stiffness storage; every solution records the
//! version it was computed from.

use crate::error::{FemError, Result};
use nalgebra::Matrix3;

/// Versioned design variables
#[derive(Debug, Clone, PartialEq)]
pub struct DesignState {
    version: u64,
    densities: Vec<f64>,
    penalty: f64,
    orientations: Option<Vec<Matrix3<f64>>>,
}

fn check_densities(densities: &[f64]) -> Result<()> {
    if let Some((e, rho)) = densities
        .iter()
        .enumerate()
        .find(|(_, rho)| !(rho.is_finite() && **rho >= 0.0))
    {
        return Err(FemError::config(format!(
            "density of element {e} must be finite and non-negative, got {rho}"
        )));
    }
    Ok(())
}

impl DesignState {
    /// Densities with penalization exponent `penalty ≥ 1`
    pub fn new(densities: Vec<f64>, penalty: f64) -> Result<Self> {
        if !(penalty >= 1.0 && penalty.is_finite()) {
            return Err(FemError::config(format!(
                "penalization exponent must be at least 1, got {penalty}"
            )));
        }
        check_densities(&densities)?;
        Ok(Self {
            version: 0,
            densities,
            penalty,
            orientations: None,
        })
    }

    /// Fully solid design (`ρ = 1`, `p = 1`) for `n_elements` elements
    pub fn solid(n_elements: usize) -> Self {
        Self {
            version: 0,
            densities: vec![1.0; n_elements],
            penalty: 1.0,
            orientations: None,
        }
    }

    /// Attach one material orientation per element
    pub fn with_orientations(mut self, orientations: Vec<Matrix3<f64>>) -> Result<Self> {
        if orientations.len() != self.densities.len() {
            return Err(FemError::config(format!(
                "{} orientations given for {} elements",
                orientations.len(),
                self.densities.len()
            )));
        }
        self.orientations = Some(orientations);
        Ok(self)
    }

    /// Successor snapshot with new densities (orientations and exponent kept)
    pub fn next(&self, densities: Vec<f64>) -> Result<Self> {
        if densities.len() != self.densities.len() {
            return Err(FemError::config(format!(
                "design has {} elements, got {} densities",
                self.densities.len(),
                densities.len()
            )));
        }
        check_densities(&densities)?;
        Ok(Self {
            version: self.version + 1,
            densities,
            penalty: self.penalty,
            orientations: self.orientations.clone(),
        })
    }

    /// Successor snapshot with new orientations
    pub fn next_orientations(&self, orientations: Vec<Matrix3<f64>>) -> Result<Self> {
        let mut next = self.clone().with_orientations(orientations)?;
        next.version = self.version + 1;
        Ok(next)
    }

    /// Snapshot version, incremented by every successor
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    pub fn num_elements(&self) -> usize {
        self.densities.len()
    }

    /// Material orientation of `element`, if any
    pub fn orientation(&self, element: usize) -> Option<&Matrix3<f64>> {
        self.orientations.as_ref().and_then(|o| o.get(element))
    }

    /// Stiffness scale `ρ_e^p`
    pub fn stiffness_scale(&self, element: usize) -> f64 {
        self.densities[element].powf(self.penalty)
    }

    /// `d(ρ^p)/dρ = p ρ^(p−1)`
    pub fn scale_derivative(&self, element: usize) -> f64 {
        self.penalty * self.densities[element].powf(self.penalty - 1.0)
    }

    /// Density that yields stiffness scale `scale` (inverse of [`Self::stiffness_scale`])
    pub fn density_for_scale(&self, scale: f64) -> f64 {
        scale.max(0.0).powf(1.0 / self.penalty)
    }

    /// Check the design against a mesh with `n_elements` elements
    pub fn validate(&self, n_elements: usize) -> Result<()> {
        if self.densities.len() != n_elements {
            return Err(FemError::config(format!(
                "design has {} densities but the mesh has {} elements",
                self.densities.len(),
                n_elements
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn scale_and_inverse() {
        let design = DesignState::new(vec![0.5, 1.0, 0.0], 3.0).unwrap();
        assert_relative_eq!(design.stiffness_scale(0), 0.125);
        assert_relative_eq!(design.scale_derivative(0), 0.75);
        assert_relative_eq!(design.density_for_scale(0.125), 0.5, epsilon = 1e-14);
        assert_eq!(design.stiffness_scale(2), 0.0);
        assert_eq!(design.scale_derivative(2), 0.0);
    }

    #[test]
    fn derivative_matches_finite_difference() {
        let design = DesignState::new(vec![0.37], 3.0).unwrap();
        let h = 1e-6;
        let plus = design.next(vec![0.37 + h]).unwrap();
        let minus = design.next(vec![0.37 - h]).unwrap();
        let fd = (plus.stiffness_scale(0) - minus.stiffness_scale(0)) / (2.0 * h);
        assert_relative_eq!(design.scale_derivative(0), fd, max_relative = 1e-8);
    }

    #[test]
    fn successors_bump_version() {
        let design = DesignState::solid(2);
        let next = design.next(vec![0.2, 0.4]).unwrap();
        assert_eq!(next.version(), 1);
        assert_eq!(design.version(), 0);
        let rotated = next.next_orientations(vec![Matrix3::identity(); 2]).unwrap();
        assert_eq!(rotated.version(), 2);
        assert!(rotated.orientation(1).is_some());
    }

    #[test]
    fn rejects_invalid_designs() {
        assert!(DesignState::new(vec![0.5], 0.5).is_err());
        assert!(DesignState::new(vec![-0.1], 3.0).is_err());
        assert!(DesignState::new(vec![f64::NAN], 3.0).is_err());
        let design = DesignState::solid(2);
        assert!(design.next(vec![1.0]).is_err());
        assert!(design.clone().with_orientations(vec![Matrix3::identity()]).is_err());
        assert!(design.validate(3).is_err());
    }
}
