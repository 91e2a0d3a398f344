// Error types for the orrery kernel
// Configuration problems surface from `start`, runtime problems are fatal to the session

use thiserror::Error;

/// Result type for kernel operations
pub type Result<T> = std::result::Result<T, OrreryError>;

#[derive(Error, Debug)]
pub enum OrreryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Cyclic relativeTo dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Invalid stepper configuration: {0}")]
    InvalidStepper(String),

    #[error("Numerical overflow while stepping {body} (sub-step {step})")]
    NumericalOverflow { body: String, step: u32 },

    #[error("Gravity ticker is not attached to a live body registry")]
    NotAttached,

    #[error("Simulation has not been started")]
    NotStarted,

    #[error("Simulation session was killed")]
    SessionKilled,

    #[error("Resource loader dropped before signalling readiness")]
    ResourcesUnavailable,

    #[error("Scenario error: {0}")]
    Scenario(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
