//! Design sensitivities of scalar objectives by the discrete adjoint method.
//!
//! For a converged state `R_f(u, ρ) = 0` and an objective `g(u, ρ)`:
//! ```text
//! K_ffᵀ λ = −∂g/∂u_f
//! dg/dρ_e = ∂g/∂ρ_e + λ_eᵀ ∂R_e/∂ρ_e
//! ```
//! With the stiffness scale `s_e = ρ_e^p` and a path-independent material,
//! the internal force is linear in `s_e`, so
//! `∂R_e/∂ρ_e = −p ρ_e^(p−1) f̂_e` where `f̂_e` is the element internal force
//! at unit scale. The Newton iteration sequence itself is never differentiated.
//!
//! Compliance `g = fᵀu` is self-adjoint under homogeneous constraints
//! (`λ = −u`), which gives the closed form
//! `dC/dρ_e = −p ρ_e^(p−1) u_eᵀ k0_e u_e` without an extra solve.

use crate::assembly::Assembler;
use crate::boundary_conditions::LoadCase;
use crate::design::DesignState;
use crate::error::{FemError, Result};
use crate::model::Model;
use crate::nonlinear_solver::Solution;
use nalgebra::DVector;
use rayon::prelude::*;
use tracing::debug;

/// Scalar function of the converged displacement
pub trait Objective: Send + Sync {
    /// `g(u)`
    fn value(&self, u: &DVector<f64>) -> f64;

    /// `∂g/∂u` over all DOFs
    fn gradient_u(&self, u: &DVector<f64>) -> DVector<f64>;

    /// Explicit design dependence `∂g/∂ρ`, zero unless overridden
    fn gradient_rho(&self, _u: &DVector<f64>, design: &DesignState) -> DVector<f64> {
        DVector::zeros(design.num_elements())
    }
}

/// External work `fᵀu` of a fixed load vector
#[derive(Debug, Clone)]
pub struct Compliance {
    pub forces: DVector<f64>,
}

impl Compliance {
    pub fn new(forces: DVector<f64>) -> Self {
        Self { forces }
    }

    /// Compliance of the full load of `load_case`
    pub fn from_load_case(load_case: &LoadCase) -> Self {
        Self::new(DVector::from_column_slice(load_case.forces()))
    }
}

impl Objective for Compliance {
    fn value(&self, u: &DVector<f64>) -> f64 {
        self.forces.dot(u)
    }

    fn gradient_u(&self, _u: &DVector<f64>) -> DVector<f64> {
        self.forces.clone()
    }
}

/// Weighted squared distance of selected DOFs to target values
#[derive(Debug, Clone)]
pub struct TargetDisplacement {
    /// `(dof, target)` pairs
    pub targets: Vec<(usize, f64)>,
    pub weight: f64,
}

impl TargetDisplacement {
    pub fn new(targets: Vec<(usize, f64)>, weight: f64) -> Self {
        Self { targets, weight }
    }
}

impl Objective for TargetDisplacement {
    fn value(&self, u: &DVector<f64>) -> f64 {
        self.weight
            * self
                .targets
                .iter()
                .map(|&(i, t)| (u[i] - t).powi(2))
                .sum::<f64>()
    }

    fn gradient_u(&self, u: &DVector<f64>) -> DVector<f64> {
        let mut g = DVector::zeros(u.len());
        for &(i, t) in &self.targets {
            g[i] += 2.0 * self.weight * (u[i] - t);
        }
        g
    }
}

/// Per-element derivative of an objective with respect to the densities
#[derive(Debug, Clone, PartialEq)]
pub struct Sensitivities {
    /// Objective value at the analysed design
    pub value: f64,
    /// `dg/dρ_e`
    pub gradient: DVector<f64>,
    /// Design the gradient belongs to
    pub design_version: u64,
}

impl Sensitivities {
    /// Apply a smoothing filter to the raw gradient
    pub fn filtered<F: SensitivityFilter + ?Sized>(&self, filter: &F, design: &DesignState) -> Result<Self> {
        let gradient = filter.filter(&self.gradient, design);
        if gradient.len() != self.gradient.len() {
            return Err(FemError::config(format!(
                "sensitivity filter returned {} values for {} elements",
                gradient.len(),
                self.gradient.len()
            )));
        }
        Ok(Self {
            value: self.value,
            gradient,
            design_version: self.design_version,
        })
    }
}

/// Post-hoc regularization of raw sensitivities
pub trait SensitivityFilter {
    fn filter(&self, gradient: &DVector<f64>, design: &DesignState) -> DVector<f64>;
}

impl<F> SensitivityFilter for F
where
    F: Fn(&DVector<f64>, &DesignState) -> DVector<f64>,
{
    fn filter(&self, gradient: &DVector<f64>, design: &DesignState) -> DVector<f64> {
        self(gradient, design)
    }
}

/// Sum objective values and gradients of independent load cases
pub fn sum_load_cases(cases: &[Sensitivities]) -> Result<Sensitivities> {
    let first = cases
        .first()
        .ok_or_else(|| FemError::config("no load cases to sum"))?;
    let mut total = first.clone();
    for case in &cases[1..] {
        if case.design_version != first.design_version || case.gradient.len() != first.gradient.len() {
            return Err(FemError::config(format!(
                "cannot sum sensitivities of design versions {} and {}",
                first.design_version, case.design_version
            )));
        }
        total.value += case.value;
        total.gradient += &case.gradient;
    }
    Ok(total)
}

/// Sensitivity evaluator bound to one model and design
pub struct SensitivityAnalysis<'a> {
    design: &'a DesignState,
    assembler: Assembler<'a>,
}

impl<'a> SensitivityAnalysis<'a> {
    pub fn new(model: &'a Model, design: &'a DesignState) -> Result<Self> {
        if model.is_path_dependent() {
            return Err(FemError::config(
                "adjoint sensitivities require path-independent materials",
            ));
        }
        Ok(Self {
            design,
            assembler: Assembler::new(model, design)?,
        })
    }

    fn check_solution(&self, solution: &Solution) -> Result<()> {
        if solution.design_version != self.design.version() {
            return Err(FemError::config(format!(
                "solution belongs to design version {}, sensitivities requested for version {}",
                solution.design_version,
                self.design.version()
            )));
        }
        if solution.displacement.len() != self.assembler.num_dofs() {
            return Err(FemError::config("solution does not match the model"));
        }
        Ok(())
    }

    /// Closed-form compliance sensitivity `−p ρ^(p−1) u_eᵀ k0_e u_e`.
    ///
    /// Valid for homogeneous constraints without eigenstrain; use
    /// [`SensitivityAnalysis::adjoint`] with [`Compliance`] otherwise.
    pub fn compliance_sensitivity(&self, solution: &Solution) -> Result<Sensitivities> {
        self.check_solution(solution)?;
        let model = self.assembler.model();
        if !model.constraints().is_homogeneous() {
            return Err(FemError::config(
                "closed-form compliance sensitivity needs homogeneous constraints",
            ));
        }
        if (0..model.mesh().num_elements()).any(|e| model.eigenstrain(e).is_some()) {
            return Err(FemError::config(
                "closed-form compliance sensitivity does not account for eigenstrain",
            ));
        }

        let u = &solution.displacement;
        let gradient: Vec<f64> = (0..model.mesh().num_elements())
            .into_par_iter()
            .map(|e| {
                let u_e = self.assembler.gather(e, u);
                let k0 = self.assembler.unit_stiffness_of(e);
                -self.design.scale_derivative(e) * u_e.dot(&(k0 * &u_e))
            })
            .collect();

        Ok(Sensitivities {
            value: solution.external_force.dot(u),
            gradient: DVector::from_vec(gradient),
            design_version: self.design.version(),
        })
    }

    /// General discrete adjoint, one transpose solve with the converged tangent
    pub fn adjoint<O: Objective + ?Sized>(&self, solution: &Solution, objective: &O) -> Result<Sensitivities> {
        self.check_solution(solution)?;
        let u = &solution.displacement;
        let partition = &solution.tangent.partition;

        let dg_du = objective.gradient_u(u);
        let rhs = -partition.restrict_free(&dg_du);
        let lambda_f = solution.tangent.factorize()?.solve_transpose(&rhs)?;
        let lambda = partition.expand(&lambda_f, &DVector::zeros(partition.constrained().len()));

        let explicit = objective.gradient_rho(u, self.design);
        let n = solution.points.len();
        if explicit.len() != n {
            return Err(FemError::config(format!(
                "objective returned {} explicit derivatives for {n} elements",
                explicit.len()
            )));
        }
        let gradient: Vec<f64> = (0..n)
            .into_par_iter()
            .map(|e| {
                let lambda_e = self.assembler.gather(e, &lambda);
                let f_unit = self.assembler.unit_internal_force(e, &solution.points[e]);
                explicit[e] + self.design.scale_derivative(e) * lambda_e.dot(&f_unit)
            })
            .collect();

        debug!(
            elements = n,
            adjoint_norm = lambda.norm(),
            design_version = self.design.version(),
            "adjoint sensitivities computed"
        );

        Ok(Sensitivities {
            value: objective.value(u),
            gradient: DVector::from_vec(gradient),
            design_version: self.design.version(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary_conditions::Constraints;
    use crate::error::ErrorKind;
    use crate::materials::{IsotropicPlasticity, LinearElastic};
    use crate::mesh::{Element, ElementType, Mesh};
    use crate::nonlinear_solver::{NonlinearConfig, NonlinearSolver};
    use approx::assert_relative_eq;

    /// Two bars in series along x, clamped at the left, pulled at the right
    fn two_bars() -> (Model, LoadCase) {
        let mut mesh = Mesh::new(2);
        for x in [0.0, 1.0, 2.0] {
            mesh.add_node(x, 0.0, 0.0);
        }
        mesh.add_element(Element::new(ElementType::Bar2, vec![0, 1])).unwrap();
        mesh.add_element(Element::new(ElementType::Bar2, vec![1, 2])).unwrap();
        let mut constraints = Constraints::new(&mesh);
        constraints.fix_node(0).unwrap().fix(1, 1).unwrap().fix(2, 1).unwrap();
        let model = Model::new(mesh, LinearElastic::uniaxial(100.0).unwrap(), constraints).unwrap();
        let mut load = LoadCase::new("pull", model.mesh());
        load.add_force(2, 0, 2.0).unwrap();
        (model, load)
    }

    fn solve(model: &Model, design: &DesignState, load: &LoadCase) -> Solution {
        NonlinearSolver::new(model, design, NonlinearConfig::default())
            .unwrap()
            .solve(load)
            .unwrap()
    }

    #[test]
    fn test_series_bars_closed_form() {
        let (model, load) = two_bars();
        let design = DesignState::new(vec![0.5, 1.0], 3.0).unwrap();
        let solution = solve(&model, &design, &load);
        let sens = SensitivityAnalysis::new(&model, &design)
            .unwrap()
            .compliance_sensitivity(&solution)
            .unwrap();

        // C = F² Σ 1/(E ρ_e^p), dC/dρ_e = −p F² / (E ρ_e^(p+1))
        assert_relative_eq!(sens.value, 4.0 * (1.0 / 12.5 + 1.0 / 100.0), max_relative = 1e-10);
        assert_relative_eq!(sens.gradient[0], -3.0 * 4.0 / (100.0 * 0.5f64.powi(4)), max_relative = 1e-10);
        assert_relative_eq!(sens.gradient[1], -3.0 * 4.0 / 100.0, max_relative = 1e-10);
    }

    #[test]
    fn test_adjoint_matches_closed_form() {
        let (model, load) = two_bars();
        let design = DesignState::new(vec![0.7, 0.4], 3.0).unwrap();
        let solution = solve(&model, &design, &load);
        let analysis = SensitivityAnalysis::new(&model, &design).unwrap();
        let closed = analysis.compliance_sensitivity(&solution).unwrap();
        let adjoint = analysis
            .adjoint(&solution, &Compliance::from_load_case(&load))
            .unwrap();
        assert_relative_eq!(closed.value, adjoint.value, max_relative = 1e-12);
        for e in 0..2 {
            assert_relative_eq!(closed.gradient[e], adjoint.gradient[e], max_relative = 1e-9);
        }
    }

    #[test]
    fn test_target_displacement_gradient() {
        let objective = TargetDisplacement::new(vec![(0, 1.0), (2, -1.0)], 0.5);
        let u = DVector::from_vec(vec![2.0, 5.0, 1.0]);
        assert_relative_eq!(objective.value(&u), 0.5 * (1.0 + 4.0));
        assert_eq!(objective.gradient_u(&u), DVector::from_vec(vec![1.0, 0.0, 2.0]));
    }

    #[test]
    fn test_sum_and_filter() {
        let a = Sensitivities {
            value: 1.0,
            gradient: DVector::from_vec(vec![1.0, 2.0]),
            design_version: 3,
        };
        let b = Sensitivities {
            value: 2.0,
            gradient: DVector::from_vec(vec![-1.0, 4.0]),
            design_version: 3,
        };
        let total = sum_load_cases(&[a.clone(), b]).unwrap();
        assert_eq!(total.value, 3.0);
        assert_eq!(total.gradient, DVector::from_vec(vec![0.0, 6.0]));

        let design = DesignState::solid(2);
        let mean = |g: &DVector<f64>, _: &DesignState| DVector::from_element(g.len(), g.mean());
        let smoothed = total.filtered(&mean, &design).unwrap();
        assert_eq!(smoothed.gradient, DVector::from_vec(vec![3.0, 3.0]));

        let stale = Sensitivities { design_version: 4, ..a };
        assert!(sum_load_cases(&[total, stale]).is_err());
        assert!(sum_load_cases(&[]).is_err());
    }

    #[test]
    fn test_rejects_stale_solution() {
        let (model, load) = two_bars();
        let design = DesignState::solid(2);
        let solution = solve(&model, &design, &load);
        let next = design.next(vec![0.9, 0.9]).unwrap();
        let err = SensitivityAnalysis::new(&model, &next)
            .unwrap()
            .compliance_sensitivity(&solution)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_rejects_path_dependent_material() {
        let (model, _) = two_bars();
        let mut mesh = Mesh::new(3);
        for (x, y, z) in [(0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0), (0.0, 0.0, 1.0)] {
            mesh.add_node(x, y, z);
        }
        mesh.add_element(Element::new(ElementType::Tet4, vec![0, 1, 2, 3])).unwrap();
        let constraints = Constraints::new(&mesh);
        let plastic = Model::new(
            mesh,
            IsotropicPlasticity::new(100.0, 0.3, 1.0, 0.0).unwrap(),
            constraints,
        )
        .unwrap();
        let design = DesignState::solid(1);
        assert!(SensitivityAnalysis::new(&plastic, &design).is_err());
        assert!(SensitivityAnalysis::new(&model, &DesignState::solid(2)).is_ok());
    }
}
