//! Error types for the runtime.

use pixsim_bus::MessengerError;
use pixsim_types::{GeometryError, LaneId};
use thiserror::Error;

use crate::config::ConfigError;

/// Everything that can abort a simulation run.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Binding, dispatch or requirement failure reported by the messenger.
    #[error(transparent)]
    Messenger(#[from] MessengerError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// A module failed while processing.
    #[error("Module {module} failed in {stage}: {message}")]
    Module {
        module: String,
        stage: Stage,
        message: String,
    },

    /// The run stopped because another lane failed first.
    #[error("{lane} aborted after another lane failed")]
    Aborted { lane: LaneId },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    /// Delegates were still registered after every module tore down.
    #[error("{count} delegates still registered after teardown")]
    LeakedDelegates { count: usize },
}

impl RuntimeError {
    /// Shorthand for a module failure.
    pub fn module(module: impl Into<String>, stage: Stage, message: impl Into<String>) -> Self {
        Self::Module {
            module: module.into(),
            stage,
            message: message.into(),
        }
    }

    /// Whether the run was set up wrong rather than failing on its data.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Self::Messenger(err) => err.is_configuration_error(),
            Self::Config(_) | Self::Geometry(_) => true,
            _ => false,
        }
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Messenger(MessengerError::InvalidBinding { .. }) => "invalid_binding",
            Self::Messenger(MessengerError::UnmetRequirement { .. }) => "unmet_requirement",
            Self::Messenger(MessengerError::Consistency(_)) => "consistency",
            Self::Config(_) => "config",
            Self::Geometry(_) => "geometry",
            Self::Module { .. } => "module",
            Self::Aborted { .. } => "aborted",
            Self::ThreadPool(_) => "thread_pool",
            Self::LeakedDelegates { .. } => "leaked_delegates",
        }
    }
}

/// Lifecycle stage of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Initialize,
    Run,
    Finalize,
    Teardown,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Initialize => "initialize",
            Self::Run => "run",
            Self::Finalize => "finalize",
            Self::Teardown => "teardown",
        };
        f.write_str(label)
    }
}
