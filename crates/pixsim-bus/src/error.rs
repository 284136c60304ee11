//! # Messenger Errors

use thiserror::Error;

/// Errors raised by registration, dispatch and teardown.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessengerError {
    /// A binding cannot accept the requested operation: a single-slot binding
    /// was already filled without `ALLOW_OVERWRITE`, or the registration used
    /// flags that do not fit the binding variant.
    #[error("Invalid binding {delegate} for {payload} message (name '{name}'): {reason}")]
    InvalidBinding {
        /// Unique name of the offending delegate.
        delegate: String,
        payload: &'static str,
        name: String,
        reason: String,
    },

    /// A `REQUIRED` binding received nothing by the end of a unit of work.
    #[error("Module {module} did not receive a required {payload} message (input '{name}')")]
    UnmetRequirement {
        module: String,
        payload: &'static str,
        name: String,
    },

    /// Registry bookkeeping violated: unknown delegate handle, a leaked
    /// delegate, or forward map and reverse index out of step.
    #[error("Messenger consistency violation: {0}")]
    Consistency(String),
}

impl MessengerError {
    /// Whether the error is a configuration problem an operator can fix
    /// (as opposed to a programming error in a module).
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidBinding { .. } | Self::UnmetRequirement { .. }
        )
    }
}
