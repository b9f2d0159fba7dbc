//! Path-dependent response over a load schedule.
//!
//! Setup: roller-supported unit cube, E = 200, ν = 0.3, σ_y = 1, H = 10,
//! face x = 1 pulled to ε_xx = 0.02.
//! Theory (uniaxial stress, linear hardening):
//! σ = (σ_y + H ε) / (1 + H/E), ε_p = ε − σ/E, ε_yy = −ν σ/E − ε_p/2.

mod common;

use approx::assert_relative_eq;
use common::{hex_block, nodes_on, rollers};
use dfem_solver::{
    DesignState, FieldIntegrator, IsotropicPlasticity, LoadCase, Model, NonlinearConfig,
    NonlinearSolver, Solution,
};

const E: f64 = 200.0;
const NU: f64 = 0.3;
const STRAIN: f64 = 0.02;

fn pulled_cube() -> Model {
    let mesh = hex_block([1, 1, 1], [1.0, 1.0, 1.0]);
    let mut constraints = rollers(&mesh);
    for node in nodes_on(&mesh, 0, 1.0) {
        constraints.prescribe(node, 0, STRAIN).expect("Failed to prescribe");
    }
    let material = IsotropicPlasticity::new(E, NU, 1.0, 10.0).expect("material");
    Model::new(mesh, material, constraints).expect("model")
}

fn run(model: &Model, increments: usize) -> Solution {
    let design = DesignState::solid(1);
    let config = NonlinearConfig::default().with_uniform_increments(increments);
    NonlinearSolver::new(model, &design, config)
        .expect("solver")
        .solve(&LoadCase::new("none", model.mesh()))
        .expect("Failed to solve")
}

#[test]
fn uniaxial_hardening_matches_theory() {
    let model = pulled_cube();
    let solution = run(&model, 10);
    assert!(solution.converged);
    // Plastic increments need more than one Newton step each
    assert!(solution.iterations > 10);

    let stress = (1.0 + 10.0 * STRAIN) / (1.0 + 10.0 / E);
    let plastic = STRAIN - stress / E;
    let lateral = -NU * stress / E - 0.5 * plastic;

    let integrator = FieldIntegrator::new(&model).expect("integrator");
    let sigma = &integrator.element_stresses(&solution).expect("stresses")[0];
    let eps = &integrator.element_strains(&solution).expect("strains")[0];
    assert_relative_eq!(sigma[0], stress, max_relative = 1e-8);
    assert!(sigma[1].abs() < 1e-8 && sigma[2].abs() < 1e-8);
    assert_relative_eq!(eps[1], lateral, max_relative = 1e-8);

    for point in &solution.points[0] {
        assert_relative_eq!(point.state[6], plastic, max_relative = 1e-8);
        assert_relative_eq!(
            IsotropicPlasticity::equivalent_stress(&point.stress),
            1.0 + 10.0 * plastic,
            max_relative = 1e-8
        );
    }
}

#[test]
fn load_path_history_is_monotone() {
    let model = pulled_cube();
    let solution = run(&model, 8);
    let corner = model.mesh().num_nodes() - 1;
    let mut previous = 0.0;
    for record in &solution.increments {
        let uy = record.displacement[3 * corner + 1];
        assert!(uy < previous, "lateral contraction must grow");
        previous = uy;
        let pull: f64 = nodes_on(model.mesh(), 0, 1.0)
            .iter()
            .map(|&n| record.reactions[3 * n])
            .sum();
        assert!(pull > 0.0);
    }
}

#[test]
fn proportional_path_is_increment_independent() {
    let model = pulled_cube();
    let coarse = run(&model, 1);
    let fine = run(&model, 5);
    for (a, b) in coarse.displacement.iter().zip(fine.displacement.iter()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-10);
    }
}
