//! Global equilibrium and energy checks on converged solutions.

mod common;

use approx::assert_relative_eq;
use common::{cantilever, hex_block, nodes_on, solve};
use dfem_solver::{
    Constraints, DesignState, FieldIntegrator, LinearElastic, LoadCase, Model, NonlinearConfig,
    NonlinearSolver,
};

#[test]
fn reactions_balance_applied_load() {
    let (model, load) = cantilever(8, 2);
    let design = DesignState::solid(model.mesh().num_elements());
    let solution = solve(&model, &design, &load);

    let applied = load.resultant();
    let reactions = solution.reaction_resultant(2);
    for d in 0..2 {
        assert!(
            (applied[d] + reactions[d]).abs() < 1e-9,
            "direction {d}: applied {} vs reaction {}",
            applied[d],
            reactions[d]
        );
    }
    // Clamp carries the full tip load upward
    assert_relative_eq!(reactions[1], 1.0, max_relative = 1e-9);
    // Tip deflects downward
    let tip = nodes_on(model.mesh(), 0, 4.0)[0];
    assert!(solution.displacement[2 * tip + 1] < 0.0);
}

#[test]
fn converged_residual_within_tolerance() {
    let (model, load) = cantilever(8, 2);
    let design = DesignState::solid(model.mesh().num_elements());
    let config = NonlinearConfig::default();
    let solution = solve(&model, &design, &load);

    let residual = &solution.external_force - &solution.internal_force;
    let free_norm = solution.tangent.partition.free_norm(&residual);
    let scale = solution.external_force.norm().max(solution.internal_force.norm());
    assert!(free_norm <= config.atol.max(config.rtol * scale));
    assert_relative_eq!(free_norm, solution.residual_norm, epsilon = 1e-14);
}

#[test]
fn compliance_equals_twice_strain_energy_2d() {
    let (model, load) = cantilever(6, 2);
    let design = DesignState::new(vec![0.8; model.mesh().num_elements()], 3.0).expect("design");
    let solution = solve(&model, &design, &load);

    let integrator = FieldIntegrator::new(&model).expect("Failed to integrate");
    let energy = integrator.strain_energy(&solution).expect("energy");
    let work = 0.5 * solution.displacement.dot(&solution.external_force);
    assert_relative_eq!(energy, work, max_relative = 1e-9);
}

#[test]
fn compliance_equals_twice_strain_energy_3d() {
    let mesh = hex_block([4, 1, 1], [4.0, 1.0, 1.0]);
    let mut constraints = Constraints::new(&mesh);
    for node in nodes_on(&mesh, 0, 0.0) {
        constraints.fix_node(node).expect("Failed to clamp");
    }
    let mut load = LoadCase::new("bend", &mesh);
    for node in nodes_on(&mesh, 0, 4.0) {
        load.add_nodal_force(node, &[0.1, 0.0, -0.25]).expect("Failed to load");
    }
    let material = LinearElastic::isotropic(500.0, 0.25).expect("material");
    let model = Model::new(mesh, material, constraints).expect("model");
    let design = DesignState::solid(model.mesh().num_elements());
    let solution = solve(&model, &design, &load);

    let integrator = FieldIntegrator::new(&model).expect("Failed to integrate");
    let energy = integrator.strain_energy(&solution).expect("energy");
    let work = 0.5 * solution.displacement.dot(&solution.external_force);
    assert_relative_eq!(energy, work, max_relative = 1e-9);
    assert_relative_eq!(integrator.total_volume(), 4.0, max_relative = 1e-12);
}

#[test]
fn load_cases_superpose() {
    let (model, tip) = cantilever(6, 2);
    let mut axial = LoadCase::new("axial", model.mesh());
    for node in nodes_on(model.mesh(), 0, 4.0) {
        axial.add_force(node, 0, 2.0).expect("Failed to load");
    }
    let mut combined = LoadCase::new("combined", model.mesh());
    for (dof, (a, b)) in tip.forces().iter().zip(axial.forces()).enumerate() {
        combined.add_force(dof / 2, dof % 2, a + b).expect("Failed to load");
    }

    let design = DesignState::solid(model.mesh().num_elements());
    let solver = NonlinearSolver::new(&model, &design, NonlinearConfig::default()).expect("solver");
    let solutions = solver
        .solve_load_cases(&[tip, axial, combined])
        .expect("Failed to solve load cases");
    assert_eq!(solutions.len(), 3);
    assert_eq!(solutions[1].load_case, "axial");

    let sum = &solutions[0].displacement + &solutions[1].displacement;
    for (a, b) in sum.iter().zip(solutions[2].displacement.iter()) {
        assert!((a - b).abs() < 1e-10 * (1.0 + b.abs()));
    }
}

#[test]
fn increments_record_load_path() {
    let (model, load) = cantilever(4, 1);
    let design = DesignState::solid(model.mesh().num_elements());
    let config = NonlinearConfig::default().with_uniform_increments(4);
    let solver = NonlinearSolver::new(&model, &design, config).expect("solver");
    let solution = solver.solve(&load).expect("Failed to solve");

    assert_eq!(solution.increments.len(), 4);
    assert_eq!(solution.iterations, 4);
    for (i, record) in solution.increments.iter().enumerate() {
        assert_eq!(record.increment, i + 1);
        assert_relative_eq!(record.load_factor, (i + 1) as f64 / 4.0);
        assert_eq!(record.iterations, 1);
        assert_eq!(record.residual_history.len(), 2);
        let scaled = &solution.displacement * record.load_factor;
        assert!((&record.displacement - scaled).amax() < 1e-12);
    }
}
