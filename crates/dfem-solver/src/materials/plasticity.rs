//! J2 (von Mises) plasticity with linear isotropic hardening.
//!
//! Small-strain radial return:
//! ```text
//! σ_tr = σ_old + C Δε
//! f    = q_tr − (σ_y + H α),   q = √(3/2 s:s)
//! Δγ   = f / (3G + H)
//! σ    = σ_tr − 2G Δγ √(3/2) n,   n = s_tr / |s_tr|
//! ```
//! The consistent tangent is
//! ```text
//! C_ep = K 1⊗1 + 2Gθ I_dev − 2Gθ̄ n⊗n
//! θ = 1 − 3GΔγ / q_tr,   θ̄ = 3G / (3G + H) − (1 − θ)
//! ```
//! History: plastic strain (6 Voigt components, engineering shear) followed
//! by the equivalent plastic strain `α`.

use super::elastic::{LinearElastic, bulk_modulus, shear_modulus};
use super::{Material, MaterialResponse};
use crate::error::{FemError, Result};
use nalgebra::{DMatrix, DVector, Matrix3};
use std::sync::Arc;

const N_STATE: usize = 7;

/// Isotropic elasto-plastic solid
#[derive(Debug, Clone)]
pub struct IsotropicPlasticity {
    elastic: LinearElastic,
    shear: f64,
    bulk: f64,
    yield_stress: f64,
    hardening: f64,
}

fn deviator(stress: &DVector<f64>) -> DVector<f64> {
    let p = (stress[0] + stress[1] + stress[2]) / 3.0;
    let mut s = stress.clone();
    for i in 0..3 {
        s[i] -= p;
    }
    s
}

/// `s:s` for a symmetric tensor stored as Voigt stress
fn double_dot(s: &DVector<f64>) -> f64 {
    s.rows(0, 3).norm_squared() + 2.0 * s.rows(3, 3).norm_squared()
}

impl IsotropicPlasticity {
    /// Young's modulus, Poisson's ratio, initial yield stress and hardening modulus
    pub fn new(e: f64, nu: f64, yield_stress: f64, hardening: f64) -> Result<Self> {
        let elastic = LinearElastic::isotropic(e, nu)?;
        if !(yield_stress > 0.0) {
            return Err(FemError::Material(format!(
                "yield stress must be positive, got {yield_stress}"
            )));
        }
        if !(hardening >= 0.0) {
            return Err(FemError::Material(format!(
                "hardening modulus must be non-negative, got {hardening}"
            )));
        }
        Ok(Self {
            elastic,
            shear: shear_modulus(e, nu),
            bulk: bulk_modulus(e, nu),
            yield_stress,
            hardening,
        })
    }

    /// Current yield stress for equivalent plastic strain `alpha`
    pub fn flow_stress(&self, alpha: f64) -> f64 {
        self.yield_stress + self.hardening * alpha
    }

    /// von Mises equivalent stress
    pub fn equivalent_stress(stress: &DVector<f64>) -> f64 {
        (1.5 * double_dot(&deviator(stress))).sqrt()
    }

    fn plastic_tangent(&self, n: &DVector<f64>, theta: f64, theta_bar: f64) -> DMatrix<f64> {
        let (g, k) = (self.shear, self.bulk);
        let mut c = DMatrix::zeros(6, 6);
        for i in 0..3 {
            for j in 0..3 {
                c[(i, j)] = k - 2.0 * g * theta / 3.0;
            }
            c[(i, i)] += 2.0 * g * theta;
            c[(i + 3, i + 3)] = g * theta;
        }
        c - n * n.transpose() * (2.0 * g * theta_bar)
    }
}

impl Material for IsotropicPlasticity {
    fn n_strains(&self) -> usize {
        6
    }

    fn n_state(&self) -> usize {
        N_STATE
    }

    /// Elastic stress `C (ε − εp)` for the given plastic strain
    fn stress(&self, strain: &DVector<f64>, state: &DVector<f64>) -> DVector<f64> {
        let plastic = if state.len() >= 6 {
            state.rows(0, 6).into_owned()
        } else {
            DVector::zeros(6)
        };
        self.elastic.stiffness() * (strain - plastic)
    }

    /// Elastic tangent; the elasto-plastic tangent comes from [`Material::step`]
    fn tangent(&self, _strain: &DVector<f64>, _state: &DVector<f64>) -> DMatrix<f64> {
        self.elastic.stiffness().clone()
    }

    fn step(
        &self,
        d_strain: &DVector<f64>,
        strain_old: &DVector<f64>,
        stress_old: &DVector<f64>,
        state_old: &DVector<f64>,
    ) -> Result<MaterialResponse> {
        let strain = strain_old + d_strain;
        let mut state = if state_old.len() == N_STATE {
            state_old.clone()
        } else {
            DVector::zeros(N_STATE)
        };

        let trial = stress_old + self.elastic.stiffness() * d_strain;
        let s = deviator(&trial);
        let s_norm = double_dot(&s).sqrt();
        let q_trial = (1.5f64).sqrt() * s_norm;
        let f = q_trial - self.flow_stress(state[6]);

        if f <= 0.0 || s_norm == 0.0 {
            return Ok(MaterialResponse {
                strain,
                stress: trial,
                state,
                tangent: self.elastic.stiffness().clone(),
            });
        }

        let g = self.shear;
        let d_gamma = f / (3.0 * g + self.hardening);
        let n = s / s_norm;
        let flow = (1.5f64).sqrt() * d_gamma;

        let mut stress = trial;
        for i in 0..6 {
            stress[i] -= 2.0 * g * flow * n[i];
            // Engineering shear doubles the off-diagonal plastic strain
            let factor = if i < 3 { 1.0 } else { 2.0 };
            state[i] += factor * flow * n[i];
        }
        state[6] += d_gamma;

        let theta = 1.0 - 3.0 * g * d_gamma / q_trial;
        let theta_bar = 3.0 * g / (3.0 * g + self.hardening) - (1.0 - theta);
        Ok(MaterialResponse {
            strain,
            stress,
            state,
            tangent: self.plastic_tangent(&n, theta, theta_bar),
        })
    }

    /// Isotropic: orientation has no effect
    fn rotated(&self, _r: &Matrix3<f64>) -> Result<Arc<dyn Material>> {
        Ok(Arc::new(self.clone()))
    }
}
