//! Failures must name their root cause and, inside Newton, their location.

mod common;

use common::{hex_block, nodes_on, rollers};
use dfem_solver::{
    ConvergenceFailureReason, Constraints, DesignState, Element, ElementType, ErrorKind, FemError,
    IsotropicPlasticity, LinearElastic, LoadCase, Material, MaterialAssignment, Mesh, Model,
    NonlinearConfig, NonlinearSolver,
};
use nalgebra::{DMatrix, DVector, Matrix3};
use std::sync::Arc;

/// Bar law whose tangent underestimates the true stiffness a thousandfold
#[derive(Debug)]
struct WrongTangent;

impl Material for WrongTangent {
    fn n_strains(&self) -> usize {
        1
    }

    fn stress(&self, strain: &DVector<f64>, _state: &DVector<f64>) -> DVector<f64> {
        strain * 100.0
    }

    fn tangent(&self, _strain: &DVector<f64>, _state: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, 0.1)
    }

    fn rotated(&self, _r: &Matrix3<f64>) -> dfem_solver::Result<Arc<dyn Material>> {
        Ok(Arc::new(WrongTangent))
    }
}

/// Bar law that breaks down as soon as it is strained
#[derive(Debug)]
struct Breaking;

impl Material for Breaking {
    fn n_strains(&self) -> usize {
        1
    }

    fn stress(&self, strain: &DVector<f64>, _state: &DVector<f64>) -> DVector<f64> {
        strain.map(|e| if e == 0.0 { 0.0 } else { f64::NAN })
    }

    fn tangent(&self, _strain: &DVector<f64>, _state: &DVector<f64>) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, 100.0)
    }

    fn rotated(&self, _r: &Matrix3<f64>) -> dfem_solver::Result<Arc<dyn Material>> {
        Ok(Arc::new(Breaking))
    }
}

/// Bar along x from the origin, loaded axially at its free end
fn bar(material: Arc<dyn Material>) -> (Model, LoadCase) {
    let mut mesh = Mesh::new(2);
    mesh.add_node(0.0, 0.0, 0.0);
    mesh.add_node(1.0, 0.0, 0.0);
    mesh.add_element(Element::new(ElementType::Bar2, vec![0, 1]))
        .expect("Failed to add bar");
    let mut constraints = Constraints::new(&mesh);
    constraints
        .fix_node(0)
        .and_then(|c| c.fix(1, 1))
        .expect("Failed to constrain");
    let mut load = LoadCase::new("axial", &mesh);
    load.add_force(1, 0, 1.0).expect("Failed to load");
    (Model::new(mesh, material, constraints).expect("model"), load)
}

fn diagnostics(err: &FemError) -> &dfem_solver::NewtonDiagnostics {
    match err {
        FemError::ConvergenceFailure { diagnostics } => diagnostics,
        other => panic!("expected a convergence failure, got {other}"),
    }
}

#[test]
fn missing_supports_are_singular() {
    let mesh = hex_block([2, 1, 1], [2.0, 1.0, 1.0]);
    let constraints = Constraints::new(&mesh);
    let mut load = LoadCase::new("push", &mesh);
    load.add_force(1, 0, 1.0).expect("Failed to load");
    let material = LinearElastic::isotropic(100.0, 0.3).expect("material");
    let model = Model::new(mesh, material, constraints).expect("model");
    let design = DesignState::solid(2);

    let err = NonlinearSolver::new(&model, &design, NonlinearConfig::default())
        .expect("solver")
        .solve(&load)
        .expect_err("rigid body modes must be detected");
    assert_eq!(err.kind(), ErrorKind::SingularSystem);
    match err {
        FemError::Increment {
            increment, iteration, ..
        } => {
            assert_eq!(increment, 1);
            assert_eq!(iteration, 1);
        }
        other => panic!("missing location: {other}"),
    }
}

#[test]
fn void_design_is_singular_with_dense_backend() {
    let (model, load) = bar(Arc::new(LinearElastic::uniaxial(100.0).expect("material")));
    let design = DesignState::new(vec![0.0], 3.0).expect("design");
    let config = NonlinearConfig {
        linear_solver: dfem_solver::LinearSolverKind::DenseLu,
        ..Default::default()
    };
    let err = NonlinearSolver::new(&model, &design, config)
        .expect("solver")
        .solve(&load)
        .expect_err("zero stiffness cannot carry load");
    assert_eq!(err.kind(), ErrorKind::SingularSystem);
}

#[test]
fn inverted_element_is_a_geometry_error() {
    let mut mesh = Mesh::new(3);
    for (x, y, z) in [
        (0.0, 0.0, 0.0),
        (1.0, 0.0, 0.0),
        (1.0, 1.0, 0.0),
        (0.0, 1.0, 0.0),
        (0.0, 0.0, 1.0),
        (1.0, 0.0, 1.0),
        (1.0, 1.0, 1.0),
        (0.0, 1.0, 1.0),
    ] {
        mesh.add_node(x, y, z);
    }
    // Top and bottom faces swapped
    mesh.add_element(Element::new(ElementType::Hex8, vec![4, 5, 6, 7, 0, 1, 2, 3]))
        .expect("Failed to add hex");
    let constraints = rollers(&mesh);
    let material = LinearElastic::isotropic(100.0, 0.3).expect("material");
    let model = Model::new(mesh, material, constraints).expect("model");
    let design = DesignState::solid(1);

    let err = NonlinearSolver::new(&model, &design, NonlinearConfig::default())
        .err()
        .expect("inverted element must be rejected");
    assert_eq!(err.kind(), ErrorKind::Geometry);
    assert!(matches!(err, FemError::Geometry { element: 0, det_j, .. } if det_j < 0.0));
}

#[test]
fn inconsistent_inputs_are_configuration_errors() {
    let mesh = hex_block([2, 1, 1], [2.0, 1.0, 1.0]);
    let constraints = rollers(&mesh);

    // Planar material on solid elements
    let planar = LinearElastic::plane_stress(100.0, 0.3).expect("material");
    let err = Model::new(mesh.clone(), planar, constraints.clone()).expect_err("strain count");
    assert_eq!(err.kind(), ErrorKind::Configuration);

    // One material for two elements
    let solid: Arc<dyn Material> = Arc::new(LinearElastic::isotropic(100.0, 0.3).expect("material"));
    let err = Model::new(
        mesh.clone(),
        MaterialAssignment::PerElement(vec![solid.clone()]),
        constraints.clone(),
    )
    .expect_err("material count");
    assert_eq!(err.kind(), ErrorKind::Configuration);

    // Invalid constitutive parameters
    let err = LinearElastic::isotropic(-1.0, 0.3).expect_err("negative modulus");
    assert_eq!(err.kind(), ErrorKind::Configuration);

    let model = Model::new(mesh, solid, constraints).expect("model");

    // Design of the wrong size
    let err = NonlinearSolver::new(&model, &DesignState::solid(3), NonlinearConfig::default())
        .err()
        .expect("design size");
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(DesignState::new(vec![1.0, 1.0], 0.5).is_err());

    // Decreasing load schedule
    let config = NonlinearConfig {
        increments: vec![0.0, 1.0, 0.5],
        ..Default::default()
    };
    let err = NonlinearSolver::new(&model, &DesignState::solid(2), config)
        .err()
        .expect("schedule");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn iteration_cap_reports_diagnostics() {
    // Roller-supported cube pulled far beyond yield
    let mesh = hex_block([1, 1, 1], [1.0, 1.0, 1.0]);
    let mut constraints = rollers(&mesh);
    for node in nodes_on(&mesh, 0, 1.0) {
        constraints.prescribe(node, 0, 0.05).expect("Failed to prescribe");
    }
    let material = IsotropicPlasticity::new(1000.0, 0.3, 5.0, 10.0).expect("material");
    let model = Model::new(mesh, material, constraints).expect("model");
    let design = DesignState::solid(1);
    let config = NonlinearConfig {
        max_iterations: 1,
        ..Default::default()
    };

    let err = NonlinearSolver::new(&model, &design, config)
        .expect("solver")
        .solve(&LoadCase::new("none", model.mesh()))
        .expect_err("one elastic predictor cannot converge");
    assert_eq!(err.kind(), ErrorKind::ConvergenceFailure);
    let diag = diagnostics(&err);
    assert_eq!(diag.reason, ConvergenceFailureReason::MaxIterations);
    assert_eq!(diag.increment, 1);
    assert_eq!(diag.iterations, 1);
    assert_eq!(diag.history.len(), 2);
    assert!(diag.residual_norm > 0.0);
}

#[test]
fn growing_residual_is_divergence() {
    let (model, load) = bar(Arc::new(WrongTangent));
    let design = DesignState::solid(1);
    let config = NonlinearConfig {
        divergence_factor: 10.0,
        ..Default::default()
    };
    let err = NonlinearSolver::new(&model, &design, config)
        .expect("solver")
        .solve(&load)
        .expect_err("residual grows");
    let diag = diagnostics(&err);
    assert_eq!(diag.reason, ConvergenceFailureReason::Diverged);
    assert_eq!(diag.iterations, 1);
    assert!(diag.residual_norm > 10.0 * diag.history[0]);
}

#[test]
fn nan_residual_is_reported() {
    let (model, load) = bar(Arc::new(Breaking));
    let design = DesignState::solid(1);
    let err = NonlinearSolver::new(&model, &design, NonlinearConfig::default())
        .expect("solver")
        .solve(&load)
        .expect_err("NaN stress");
    let diag = diagnostics(&err);
    assert_eq!(diag.reason, ConvergenceFailureReason::NonFinite);
    assert!(diag.residual_norm.is_nan());
}
