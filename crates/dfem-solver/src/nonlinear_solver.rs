//! Nonlinear static analysis solver using Newton-Raphson iteration.
//!
//! Solves the equilibrium equation
//! ```text
//! R(u) = λ F_ext − F_int(u) = 0
//! ```
//! for a schedule of load factors `λ_0 < λ_1 < … < λ_N`.
//!
//! # Newton-Raphson Method
//!
//! Each increment `n` starts from the last converged state and iterates:
//! 1. Assemble tangent `K_T` and internal force at the current increment `Δu`
//! 2. Compute residual `R = λ_n F_ext − F_int` and check convergence
//! 3. Solve `K_ff δu_f = R_f − K_fc δu_c`
//! 4. Update `Δu ← Δu + δu`
//!
//! `δu_c` carries the prescribed displacement increment
//! `(λ_n − λ_{n−1}) ū` on the first iteration and is zero afterwards.
//!
//! # Convergence Criteria
//!
//! - converged: `‖R_f‖ ≤ atol` or `‖R_f‖ ≤ rtol · max(‖λF_ext‖, ‖F_int‖)`
//! - diverged: iteration cap reached, non-finite residual, or
//!   `‖R_f‖ > divergence_factor · ‖R_f⁰‖`
//!
//! A failed increment is always an error; no partial solution is returned.

use crate::assembly::{AssembledSystem, Assembler, History};
use crate::backend::{Factorization, LinearSolver, LinearSolverKind};
use crate::boundary_conditions::LoadCase;
use crate::design::DesignState;
use crate::error::{ConvergenceFailureReason, FemError, NewtonDiagnostics, Result};
use crate::model::Model;
use crate::partition::Partition;
use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

/// Nonlinear solver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NonlinearConfig {
    /// Load factor schedule, strictly increasing
    pub increments: Vec<f64>,
    /// Relative residual tolerance
    pub rtol: f64,
    /// Absolute residual tolerance
    pub atol: f64,
    /// Maximum number of linear solves per increment
    pub max_iterations: usize,
    /// Residual growth (relative to the first residual) treated as divergence
    pub divergence_factor: f64,
    /// Report every iteration at info level
    pub verbose: bool,
    /// Backend for the free-DOF linear systems
    pub linear_solver: LinearSolverKind,
}

impl Default for NonlinearConfig {
    fn default() -> Self {
        Self {
            increments: vec![0.0, 1.0],
            rtol: 1e-8,
            atol: 1e-10,
            max_iterations: 20,
            divergence_factor: 1e6,
            verbose: false,
            linear_solver: LinearSolverKind::default(),
        }
    }
}

impl NonlinearConfig {
    /// `n` equal load steps from 0 to 1
    pub fn with_uniform_increments(mut self, n: usize) -> Self {
        let n = n.max(1);
        self.increments = (0..=n).map(|i| i as f64 / n as f64).collect();
        self
    }

    /// Check the configuration before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.increments.len() < 2 {
            return Err(FemError::config(
                "load schedule needs at least a start and an end factor",
            ));
        }
        if self.increments.iter().any(|l| !l.is_finite())
            || self.increments.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(FemError::config(format!(
                "load schedule must be finite and strictly increasing, got {:?}",
                self.increments
            )));
        }
        if !(self.rtol > 0.0 && self.atol > 0.0) {
            return Err(FemError::config(format!(
                "tolerances must be positive (rtol = {}, atol = {})",
                self.rtol, self.atol
            )));
        }
        if self.max_iterations == 0 {
            return Err(FemError::config("max_iterations must be at least 1"));
        }
        if !(self.divergence_factor > 1.0) {
            return Err(FemError::config(format!(
                "divergence_factor must exceed 1, got {}",
                self.divergence_factor
            )));
        }
        Ok(())
    }
}

/// State of the Newton loop within one increment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewtonPhase {
    /// Increment set up, nothing assembled yet
    Initial,
    /// Assembling tangent and internal force
    Assembling,
    /// Evaluating the residual against the tolerances
    ResidualCheck,
    /// Solving the reduced system for a correction
    LinearSolve,
    /// Equilibrium reached
    Converged,
    /// Gave up for the given reason
    Diverged(ConvergenceFailureReason),
}

/// Converged state after one load increment
#[derive(Debug, Clone)]
pub struct IncrementRecord {
    /// Increment index (1-based)
    pub increment: usize,
    /// Load factor reached
    pub load_factor: f64,
    /// Linear solves needed
    pub iterations: usize,
    /// Free residual norm at every check
    pub residual_history: Vec<f64>,
    /// Total displacement after the increment
    pub displacement: DVector<f64>,
    /// Reactions after the increment
    pub reactions: DVector<f64>,
}

/// Converged free-DOF tangent, reused by adjoint solves
#[derive(Debug, Clone)]
pub struct ReducedTangent {
    /// DOF partition the tangent refers to
    pub partition: Partition,
    /// `K_ff` at the converged state
    pub stiffness: CsrMatrix<f64>,
    /// Backend that produced the Newton solves
    pub linear_solver: LinearSolverKind,
}

impl ReducedTangent {
    /// Factorize `K_ff` with the configured backend
    pub fn factorize(&self) -> Result<Box<dyn Factorization>> {
        Ok(self.linear_solver.backend().factorize(&self.stiffness)?)
    }
}

/// Result of a converged analysis
#[derive(Debug, Clone)]
pub struct Solution {
    /// Load case label
    pub load_case: String,
    /// Nodal displacements over all DOFs
    pub displacement: DVector<f64>,
    /// Support reactions `F_int − F_ext` on constrained DOFs, zero elsewhere
    pub reactions: DVector<f64>,
    /// Internal force over all DOFs
    pub internal_force: DVector<f64>,
    /// External force at the final load factor
    pub external_force: DVector<f64>,
    /// Converged material points `[element][quadrature point]`
    pub points: History,
    /// Per-increment records
    pub increments: Vec<IncrementRecord>,
    /// Total number of linear solves
    pub iterations: usize,
    /// Free residual norm at convergence of the last increment
    pub residual_norm: f64,
    /// Always true for a returned solution
    pub converged: bool,
    /// Converged reduced tangent
    pub tangent: ReducedTangent,
    /// Version of the design the solution belongs to
    pub design_version: u64,
}

impl Solution {
    /// Displacement of `node` as a `dim`-vector
    pub fn nodal_displacement(&self, node: usize, dim: usize) -> Vec<f64> {
        (0..dim).map(|d| self.displacement[node * dim + d]).collect()
    }

    /// Reaction resultant per direction
    pub fn reaction_resultant(&self, dim: usize) -> Vec<f64> {
        let mut total = vec![0.0; dim];
        for (i, r) in self.reactions.iter().enumerate() {
            total[i % dim] += r;
        }
        total
    }
}

/// Newton-Raphson solver bound to one model and design
pub struct NonlinearSolver<'a> {
    model: &'a Model,
    design: &'a DesignState,
    config: NonlinearConfig,
    assembler: Assembler<'a>,
    partition: Partition,
    backend: Box<dyn LinearSolver>,
}

/// Mutable state of one increment
struct IncrementState {
    phase: NewtonPhase,
    du: DVector<f64>,
    solves: usize,
    history: Vec<f64>,
    reference: Option<f64>,
    system: Option<(AssembledSystem, DVector<f64>)>,
}

impl<'a> NonlinearSolver<'a> {
    /// Validate inputs and evaluate element kinematics.
    ///
    /// Geometry errors (inverted elements) are reported here, before any
    /// increment starts.
    pub fn new(model: &'a Model, design: &'a DesignState, config: NonlinearConfig) -> Result<Self> {
        config.validate()?;
        let assembler = Assembler::new(model, design)?;
        let partition = Partition::new(model.constraints());
        let backend = config.linear_solver.backend();
        debug!(
            free = partition.free().len(),
            constrained = partition.constrained().len(),
            increments = config.increments.len() - 1,
            solver = backend.name(),
            design_version = design.version(),
            "nonlinear solver ready"
        );
        Ok(Self {
            model,
            design,
            config,
            assembler,
            partition,
            backend,
        })
    }

    pub fn config(&self) -> &NonlinearConfig {
        &self.config
    }

    pub fn assembler(&self) -> &Assembler<'a> {
        &self.assembler
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Solve every load case independently against the same model
    pub fn solve_load_cases(&self, load_cases: &[LoadCase]) -> Result<Vec<Solution>> {
        load_cases.iter().map(|case| self.solve(case)).collect()
    }

    /// Run the load schedule for one load case
    pub fn solve(&self, load_case: &LoadCase) -> Result<Solution> {
        let n_dofs = self.assembler.num_dofs();
        if load_case.num_dofs() != n_dofs {
            return Err(FemError::config(format!(
                "load case '{}' has {} DOFs, the model has {}",
                load_case.name,
                load_case.num_dofs(),
                n_dofs
            )));
        }

        let forces = DVector::from_column_slice(load_case.forces());
        let prescribed = self
            .partition
            .restrict_constrained(&DVector::from_column_slice(self.model.constraints().prescribed()));

        let mut u = DVector::zeros(n_dofs);
        let mut points = self.assembler.initial_history();
        let mut records = Vec::with_capacity(self.config.increments.len() - 1);
        let mut last: Option<(AssembledSystem, DVector<f64>)> = None;

        for (n, window) in self.config.increments.windows(2).enumerate() {
            let increment = n + 1;
            let load_factor = window[1];
            let step = window[1] - window[0];
            let f_ext = &forces * load_factor;
            let du_c = &prescribed * step;

            let (state, system, residual) = self.run_increment(increment, &f_ext, &du_c, &points, step)?;

            u += &state.du;
            let reactions = self.partition.reactions(&system.stiffness, &DVector::zeros(n_dofs), &residual);
            records.push(IncrementRecord {
                increment,
                load_factor,
                iterations: state.solves,
                residual_history: state.history,
                displacement: u.clone(),
                reactions,
            });
            points = system.points.clone();
            last = Some((system, f_ext));
        }

        let (system, external_force) = last.ok_or_else(|| FemError::config("empty load schedule"))?;
        let record = records
            .last()
            .ok_or_else(|| FemError::config("empty load schedule"))?;
        let reactions = record.reactions.clone();
        let residual_norm = record.residual_history.last().copied().unwrap_or(0.0);
        let iterations = records.iter().map(|r| r.iterations).sum();
        let zeros = DVector::zeros(self.partition.constrained().len());
        let reduced = self
            .partition
            .reduce(&system.stiffness, &DVector::zeros(n_dofs), &zeros)?;

        info!(
            load_case = %load_case.name,
            increments = records.len(),
            iterations,
            residual = residual_norm,
            "analysis converged"
        );

        Ok(Solution {
            load_case: load_case.name.clone(),
            displacement: u,
            reactions,
            internal_force: system.internal_force,
            external_force,
            points,
            increments: records,
            iterations,
            residual_norm,
            converged: true,
            tangent: ReducedTangent {
                partition: self.partition.clone(),
                stiffness: reduced.stiffness,
                linear_solver: self.config.linear_solver,
            },
            design_version: self.design.version(),
        })
    }

    /// Newton loop of one increment, returns the converged state, system and residual
    fn run_increment(
        &self,
        increment: usize,
        f_ext: &DVector<f64>,
        du_c: &DVector<f64>,
        converged_points: &History,
        step: f64,
    ) -> Result<(IncrementState, AssembledSystem, DVector<f64>)> {
        let mut state = IncrementState {
            phase: NewtonPhase::Initial,
            du: DVector::zeros(self.assembler.num_dofs()),
            solves: 0,
            history: Vec::new(),
            reference: None,
            system: None,
        };
        let prescribed_pending = du_c.amax() > 0.0;
        let f_ext_norm = f_ext.norm();

        loop {
            trace!(increment, iteration = state.solves, phase = ?state.phase, "newton phase");
            match state.phase {
                NewtonPhase::Initial => state.phase = NewtonPhase::Assembling,

                NewtonPhase::Assembling => {
                    let system = self
                        .assembler
                        .assemble(&state.du, converged_points, step)
                        .map_err(|e| e.in_iteration(increment, state.solves))?;
                    let residual = f_ext - &system.internal_force;
                    state.system = Some((system, residual));
                    state.phase = NewtonPhase::ResidualCheck;
                }

                NewtonPhase::ResidualCheck => {
                    let Some((system, residual)) = &state.system else {
                        state.phase = NewtonPhase::Assembling;
                        continue;
                    };
                    let norm = self.partition.free_norm(residual);
                    state.history.push(norm);
                    if self.config.verbose {
                        info!(increment, iteration = state.solves, residual = norm, "newton iteration");
                    } else {
                        debug!(increment, iteration = state.solves, residual = norm, "newton iteration");
                    }

                    let reason = if !norm.is_finite() {
                        Some(ConvergenceFailureReason::NonFinite)
                    } else if state
                        .reference
                        .is_some_and(|r0| norm > self.config.divergence_factor * r0)
                    {
                        Some(ConvergenceFailureReason::Diverged)
                    } else {
                        None
                    };
                    if state.reference.is_none() && norm > 0.0 {
                        state.reference = Some(norm);
                    }

                    let first_pending = prescribed_pending && state.solves == 0;
                    let scale = f_ext_norm.max(system.internal_force.norm());
                    let converged = !first_pending
                        && reason.is_none()
                        && (norm <= self.config.atol || norm <= self.config.rtol * scale);

                    state.phase = if converged {
                        NewtonPhase::Converged
                    } else if let Some(reason) = reason {
                        NewtonPhase::Diverged(reason)
                    } else if state.solves >= self.config.max_iterations {
                        NewtonPhase::Diverged(ConvergenceFailureReason::MaxIterations)
                    } else {
                        NewtonPhase::LinearSolve
                    };
                }

                NewtonPhase::LinearSolve => {
                    let Some((system, residual)) = &state.system else {
                        state.phase = NewtonPhase::Assembling;
                        continue;
                    };
                    let correction_c = if state.solves == 0 {
                        du_c.clone()
                    } else {
                        DVector::zeros(du_c.len())
                    };
                    let correction = self
                        .correction(&system.stiffness, residual, &correction_c)
                        .map_err(|e| e.in_iteration(increment, state.solves + 1))?;
                    state.du += correction;
                    state.solves += 1;
                    state.phase = NewtonPhase::Assembling;
                }

                NewtonPhase::Converged => {
                    let (system, residual) = state
                        .system
                        .take()
                        .ok_or_else(|| FemError::config("converged without an assembled system"))?;
                    return Ok((state, system, residual));
                }

                NewtonPhase::Diverged(reason) => {
                    return Err(self.failure(increment, &state, reason));
                }
            }
        }
    }

    /// One linear solve of the reduced system
    fn correction(
        &self,
        stiffness: &CsrMatrix<f64>,
        residual: &DVector<f64>,
        du_c: &DVector<f64>,
    ) -> Result<DVector<f64>> {
        let reduced = self.partition.reduce(stiffness, residual, du_c)?;
        let factorization = self.backend.factorize(&reduced.stiffness).inspect_err(|e| {
            warn!(error = %e, "tangent factorization failed");
        })?;
        let du_f = factorization.solve(&reduced.rhs)?;
        Ok(self.partition.expand(&du_f, du_c))
    }

    fn failure(&self, increment: usize, state: &IncrementState, reason: ConvergenceFailureReason) -> FemError {
        let residual_norm = state.history.last().copied().unwrap_or(f64::NAN);
        warn!(
            increment,
            iterations = state.solves,
            residual = residual_norm,
            ?reason,
            "newton iteration failed"
        );
        FemError::ConvergenceFailure {
            diagnostics: NewtonDiagnostics {
                increment,
                iterations: state.solves,
                residual_norm,
                history: state.history.clone(),
                reason,
            },
        }
    }
}
