//! Post-processing of converged solutions.
//!
//! The [`FieldIntegrator`] evaluates element kinematics once per model and
//! integrates quantities over the quadrature rule of each element:
//! ```text
//! V_e   = Σ_q dV_q
//! ∫ φ   = Σ_q (Σ_a N_a(ξ_q) φ_a) dV_q
//! W     = Σ_e Σ_q ½ σ_q · ε_q dV_q
//! ```
//! Per-element stress, strain and deformation gradient fields are the
//! arithmetic mean over the element's quadrature points.

use crate::assembly::{MaterialPoint, element_kinematics, par_try_map};
use crate::elements::PointKinematics;
use crate::error::{FemError, Result};
use crate::model::Model;
use crate::nonlinear_solver::Solution;
use nalgebra::{DVector, Matrix3};

/// Compute von Mises equivalent stress from a Voigt stress vector
///
/// Formula: σ_v = sqrt(0.5 * ((σ_xx - σ_yy)² + (σ_yy - σ_zz)² + (σ_zz - σ_xx)²)
///                    + 3 * (τ_xy² + τ_yz² + τ_zx²))
///
/// Three-component vectors are treated as plane stress (`σ_zz = 0`), a single
/// component as uniaxial stress. Use [`planar_von_mises_stress`] when the
/// out-of-plane stress is known. Other lengths are rejected.
///
/// # Example
/// ```
/// use dfem_solver::postprocess::von_mises_stress;
/// use nalgebra::DVector;
///
/// let uniaxial = DVector::from_vec(vec![100.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
/// assert!((von_mises_stress(&uniaxial).unwrap() - 100.0).abs() < 1e-12);
/// ```
pub fn von_mises_stress(stress: &DVector<f64>) -> Result<f64> {
    match stress.as_slice() {
        &[s] => Ok(s.abs()),
        &[sxx, syy, sxy] => Ok(equivalent([sxx, syy, 0.0, sxy, 0.0, 0.0])),
        &[sxx, syy, szz, sxy, syz, szx] => Ok(equivalent([sxx, syy, szz, sxy, syz, szx])),
        s => Err(FemError::config(format!(
            "von Mises stress needs 1, 3 or 6 stress components, got {}",
            s.len()
        ))),
    }
}

/// Von Mises stress of an in-plane stress `[σxx, σyy, τxy]` with normal
/// stress `σzz` (non-zero under plane strain)
pub fn planar_von_mises_stress(stress: &DVector<f64>, szz: f64) -> Result<f64> {
    match stress.as_slice() {
        &[sxx, syy, sxy] => Ok(equivalent([sxx, syy, szz, sxy, 0.0, 0.0])),
        s => Err(FemError::config(format!(
            "planar von Mises stress needs 3 stress components, got {}",
            s.len()
        ))),
    }
}

fn equivalent([sxx, syy, szz, sxy, syz, szx]: [f64; 6]) -> f64 {
    let term1 = 0.5 * ((sxx - syy).powi(2) + (syy - szz).powi(2) + (szz - sxx).powi(2));
    let term2 = 3.0 * (sxy.powi(2) + syz.powi(2) + szx.powi(2));
    (term1 + term2).sqrt()
}

/// Quadrature-based integration of element fields
#[derive(Debug)]
pub struct FieldIntegrator<'a> {
    model: &'a Model,
    kinematics: Vec<Vec<PointKinematics>>,
}

impl<'a> FieldIntegrator<'a> {
    /// Evaluate kinematics of all elements; fails on degenerate geometry
    pub fn new(model: &'a Model) -> Result<Self> {
        let kinematics = par_try_map(0..model.mesh().num_elements(), |e| element_kinematics(model, e))?;
        Ok(Self { model, kinematics })
    }

    /// Volume of each element (length × area for bars, area × thickness for
    /// planar and shell elements)
    pub fn element_volumes(&self) -> DVector<f64> {
        DVector::from_iterator(
            self.kinematics.len(),
            self.kinematics.iter().map(|points| points.iter().map(|k| k.dv).sum::<f64>()),
        )
    }

    pub fn total_volume(&self) -> f64 {
        self.element_volumes().sum()
    }

    /// Integral of an interpolated nodal scalar field over each element
    pub fn integrate_nodal_field(&self, field: &[f64]) -> Result<DVector<f64>> {
        let mesh = self.model.mesh();
        if field.len() != mesh.num_nodes() {
            return Err(FemError::config(format!(
                "nodal field has {} values for {} nodes",
                field.len(),
                mesh.num_nodes()
            )));
        }
        Ok(DVector::from_iterator(
            mesh.num_elements(),
            mesh.elements.iter().zip(&self.kinematics).map(|(element, points)| {
                let phi = DVector::from_iterator(element.nodes.len(), element.nodes.iter().map(|&n| field[n]));
                points.iter().map(|k| k.shape.dot(&phi) * k.dv).sum::<f64>()
            }),
        ))
    }

    /// Mean strain of each element
    pub fn element_strains(&self, solution: &Solution) -> Result<Vec<DVector<f64>>> {
        self.check(solution)?;
        Ok(solution.points.iter().map(|p| mean(p, |m| &m.strain)).collect())
    }

    /// Mean stress of each element
    pub fn element_stresses(&self, solution: &Solution) -> Result<Vec<DVector<f64>>> {
        self.check(solution)?;
        Ok(solution.points.iter().map(|p| mean(p, |m| &m.stress)).collect())
    }

    /// Mean deformation gradient `F = I + ∇u` of each element
    pub fn deformation_gradients(&self, solution: &Solution) -> Result<Vec<Matrix3<f64>>> {
        self.check(solution)?;
        let mesh = self.model.mesh();
        Ok((0..mesh.num_elements())
            .map(|e| {
                let dofs = mesh.element_dofs(e);
                let u_e = DVector::from_iterator(dofs.len(), dofs.iter().map(|&i| solution.displacement[i]));
                let points = &self.kinematics[e];
                points
                    .iter()
                    .fold(Matrix3::zeros(), |f, k| f + k.deformation_gradient(&u_e))
                    / points.len().max(1) as f64
            })
            .collect())
    }

    /// Stored energy `Σ ∫ ½ σ · ε dV`
    pub fn strain_energy(&self, solution: &Solution) -> Result<f64> {
        self.check(solution)?;
        Ok(self
            .kinematics
            .iter()
            .zip(&solution.points)
            .map(|(kin, points)| {
                kin.iter()
                    .zip(points)
                    .map(|(k, p)| 0.5 * p.stress.dot(&p.strain) * k.dv)
                    .sum::<f64>()
            })
            .sum())
    }

    /// Von Mises stress of the mean element stress.
    ///
    /// Planar elements include the out-of-plane stress their material
    /// reports, so plane-strain models are evaluated with `σzz ≠ 0`.
    pub fn von_mises(&self, solution: &Solution) -> Result<DVector<f64>> {
        let stresses = self.element_stresses(solution)?;
        let materials = self.model.materials();
        let values = stresses
            .iter()
            .enumerate()
            .map(|(e, stress)| {
                if stress.len() != 3 {
                    return von_mises_stress(stress);
                }
                let material = materials
                    .get(e)
                    .ok_or_else(|| FemError::config(format!("element {e} has no material")))?;
                planar_von_mises_stress(stress, material.out_of_plane_stress(stress))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(DVector::from_vec(values))
    }

    fn check(&self, solution: &Solution) -> Result<()> {
        let matches = solution.points.len() == self.kinematics.len()
            && solution
                .points
                .iter()
                .zip(&self.kinematics)
                .all(|(p, k)| p.len() == k.len())
            && solution.displacement.len() == self.model.mesh().num_dofs();
        if matches {
            Ok(())
        } else {
            Err(FemError::config("solution does not belong to this model"))
        }
    }
}

fn mean<'p>(points: &'p [MaterialPoint], field: impl Fn(&'p MaterialPoint) -> &'p DVector<f64>) -> DVector<f64> {
    let Some(first) = points.first() else {
        return DVector::zeros(0);
    };
    let sum = points
        .iter()
        .skip(1)
        .fold(field(first).clone(), |acc, p| acc + field(p));
    sum / points.len() as f64
}
