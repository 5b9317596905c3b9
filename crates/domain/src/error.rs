//! Variable error types

use thiserror::Error;

/// Errors raised while scanning, resolving or assigning variables.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VariableError {
    /// A variable reference is malformed (unbalanced braces, invalid name or index).
    #[error("{0}")]
    Syntax(String),

    /// A variable does not exist in the visible scope.
    #[error("{}", with_recommendations(.message, .recommendations))]
    NotFound {
        /// The decorated name that was looked up, e.g. `${name}`.
        name: String,
        /// Human-readable message without recommendations.
        message: String,
        /// Similarly named variables, best match first.
        recommendations: Vec<String>,
    },

    /// An environment variable does not exist and no default was given.
    #[error("{}", environment_message(.name, .recommendations))]
    EnvironmentNotFound {
        /// The decorated name that was looked up, e.g. `%{HOME}`.
        name: String,
        /// Similarly named environment variables, best match first.
        recommendations: Vec<String>,
    },

    /// A deferred value was entered again while it was being resolved.
    #[error("Recursive variable definition.")]
    RecursiveDefinition,

    /// A value has the wrong shape for the requested operation.
    #[error("{0}")]
    TypeMismatch(String),

    /// An extended variable expression could not be evaluated.
    #[error("Resolving variable '{variable}' failed: {message}")]
    Evaluation {
        /// The full reference text, e.g. `${obj.attr}`.
        variable: String,
        /// The underlying failure.
        message: String,
    },

    /// A scope lifecycle operation was used out of order.
    #[error("{0}")]
    Scope(String),
}

impl VariableError {
    /// Creates a syntax error.
    #[must_use]
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    /// Creates a type mismatch error.
    #[must_use]
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }

    /// Creates the standard "not found" error for a decorated name.
    #[must_use]
    pub fn not_found(name: impl Into<String>, recommendations: Vec<String>) -> Self {
        let name = name.into();
        Self::NotFound {
            message: format!("Variable '{name}' not found."),
            name,
            recommendations,
        }
    }

    /// Creates an evaluation failure for the given reference.
    #[must_use]
    pub fn evaluation(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Evaluation {
            variable: variable.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors meaning "nothing by that name exists".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::EnvironmentNotFound { .. })
    }
}

fn with_recommendations(message: &str, recommendations: &[String]) -> String {
    if recommendations.is_empty() {
        return message.to_string();
    }
    let mut rendered = format!("{message} Did you mean:");
    for candidate in recommendations {
        rendered.push_str("\n    ");
        rendered.push_str(candidate);
    }
    rendered
}

fn environment_message(name: &str, recommendations: &[String]) -> String {
    with_recommendations(
        &format!("Environment variable '{name}' not found."),
        recommendations,
    )
}

/// Result type alias for variable operations.
pub type VariableResult<T> = Result<T, VariableError>;
