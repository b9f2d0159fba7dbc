//! Differentiable nonlinear finite-element equilibrium solver.
//!
//! The crate assembles element stiffness and internal force in parallel,
//! solves `R(u) = λ F_ext − F_int(u) = 0` by Newton-Raphson over a load
//! schedule, and computes design sensitivities of scalar objectives with
//! the discrete adjoint method for density-based topology optimization.
//!
//! A typical call sequence:
//! 1. Build a [`Mesh`], [`Constraints`] and a [`Model`]
//! 2. Create a [`DesignState`] holding densities and penalization
//! 3. Run [`NonlinearSolver::solve`] for one or more [`LoadCase`]s
//! 4. Evaluate [`SensitivityAnalysis`] and [`FieldIntegrator`] on the [`Solution`]

pub mod assembly;
pub mod backend;
pub mod boundary_conditions;
pub mod design;
pub mod elements;
pub mod error;
pub mod materials;
pub mod mesh;
pub mod model;
pub mod nonlinear_solver;
pub mod partition;
pub mod postprocess;
pub mod sensitivity;

pub use assembly::{AssembledSystem, Assembler, History, MaterialPoint};
pub use backend::{
    BackendError, DenseLu, Factorization, LinearSolver, LinearSolverKind, SolveInfo, SparseCholesky,
    default_backend,
};
pub use boundary_conditions::{Constraints, DofId, LoadCase};
pub use design::DesignState;
pub use elements::{GaussOrder, PointKinematics, QuadraturePoint, ShapeFunctions, evaluate_point};
pub use error::{ConvergenceFailureReason, ErrorKind, FemError, NewtonDiagnostics, Result};
pub use materials::{
    IsotropicPlasticity, LinearElastic, Material, MaterialAssignment, MaterialResponse, ScaledMaterial,
};
pub use mesh::{Element, ElementFamily, ElementType, Mesh, Node};
pub use model::Model;
pub use nonlinear_solver::{
    IncrementRecord, NewtonPhase, NonlinearConfig, NonlinearSolver, ReducedTangent, Solution,
};
pub use partition::{Partition, ReducedSystem};
pub use postprocess::{FieldIntegrator, planar_von_mises_stress, von_mises_stress};
pub use sensitivity::{
    Compliance, Objective, SensitivityAnalysis, SensitivityFilter, Sensitivities, TargetDisplacement,
    sum_load_cases,
};
