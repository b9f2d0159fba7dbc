//! Error taxonomy for the equilibrium engine.
//!
//! Every failure is surfaced to the caller. Failures raised inside a Newton
//! iteration carry the increment and iteration in which they occurred, see
//! [`FemError::Increment`].

use thiserror::Error;

/// Result type alias using [`FemError`].
pub type Result<T> = std::result::Result<T, FemError>;

/// Root cause of a failed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Degenerate or inverted element.
    Geometry,
    /// Free-free stiffness block could not be factorized.
    SingularSystem,
    /// Newton iteration did not converge.
    ConvergenceFailure,
    /// Inconsistent input detected before assembly.
    Configuration,
}

/// Why a Newton loop gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceFailureReason {
    /// Iteration count exceeded `max_iterations`.
    MaxIterations,
    /// Residual grew beyond `divergence_factor` times its initial value.
    Diverged,
    /// Residual became NaN or infinite.
    NonFinite,
}

/// Last known state of a failed Newton loop.
#[derive(Debug, Clone, PartialEq)]
pub struct NewtonDiagnostics {
    /// Load increment index (1-based).
    pub increment: usize,
    /// Number of linear solves performed in the failing increment.
    pub iterations: usize,
    /// Free-DOF residual norm at the last check.
    pub residual_norm: f64,
    /// Residual norm at every check of the failing increment.
    pub history: Vec<f64>,
    /// Reason the loop stopped.
    pub reason: ConvergenceFailureReason,
}

/// Errors produced by the solver.
#[derive(Error, Debug)]
pub enum FemError {
    /// Non-positive Jacobian determinant at a quadrature point.
    #[error(
        "geometry error: element {element} has non-positive Jacobian determinant {det_j:.3e} at quadrature point {point} (check node ordering)"
    )]
    Geometry {
        element: usize,
        point: usize,
        det_j: f64,
    },

    /// Free-free stiffness block is singular or not positive definite.
    #[error("singular system: {reason}")]
    SingularSystem { reason: String },

    /// Newton-Raphson failed to reach the configured tolerance.
    #[error(
        "convergence failure in increment {}: {:?} after {} iterations (residual {:.3e})",
        .diagnostics.increment,
        .diagnostics.reason,
        .diagnostics.iterations,
        .diagnostics.residual_norm
    )]
    ConvergenceFailure { diagnostics: NewtonDiagnostics },

    /// Inconsistent dimensions or invalid options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Invalid constitutive parameters.
    #[error("invalid material: {0}")]
    Material(String),

    /// A failure raised while iterating, tagged with its location.
    #[error("increment {increment}, iteration {iteration}: {source}")]
    Increment {
        increment: usize,
        iteration: usize,
        #[source]
        source: Box<FemError>,
    },
}

impl FemError {
    /// Root cause, looking through [`FemError::Increment`] wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FemError::Geometry { .. } => ErrorKind::Geometry,
            FemError::SingularSystem { .. } => ErrorKind::SingularSystem,
            FemError::ConvergenceFailure { .. } => ErrorKind::ConvergenceFailure,
            FemError::Configuration(_) | FemError::Material(_) => ErrorKind::Configuration,
            FemError::Increment { source, .. } => source.kind(),
        }
    }

    /// Attach increment/iteration context, keeping existing context untouched.
    pub(crate) fn in_iteration(self, increment: usize, iteration: usize) -> Self {
        match self {
            FemError::Increment { .. } | FemError::ConvergenceFailure { .. } => self,
            other => FemError::Increment {
                increment,
                iteration,
                source: Box::new(other),
            },
        }
    }

    /// Shorthand for a configuration error.
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        FemError::Configuration(msg.into())
    }
}
