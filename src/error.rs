//! Error types for portfolio_optimizer
//!
//! This module defines domain-specific error types that provide clear,
//! actionable error messages to users.

use std::fmt;

use thiserror::Error;

/// Shown whenever the optimizer could not be reached or answered with
/// something that is not JSON.
pub const CONNECTION_FALLBACK: &str =
    "Failed to connect to server. Please check your connection and try again.";

/// Errors raised while adding a ticker to the ticker set.
///
/// These are shown inline below the ticker input and never block the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TickerError {
    #[error("Please enter a ticker symbol")]
    EmptyInput,

    #[error("Ticker must be 1-5 characters long")]
    InvalidLength,

    #[error("Ticker can only contain letters")]
    InvalidCharacters,

    #[error("This ticker is already added")]
    Duplicate,
}

/// Validation errors for the whole input bundle.
///
/// These errors are shown directly to users and should be clear and actionable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Capital must be a positive number")]
    NonPositiveCapital,

    #[error("Desired return must be a positive percentage")]
    NonPositiveReturn,

    #[error("Please select an investment horizon")]
    MissingHorizon,

    #[error("Please add at least 2 stocks to your portfolio")]
    InsufficientTickers,
}

/// Every violated validation rule, in rule-check order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn kinds(&self) -> &[ValidationError] {
        &self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("\n"))
    }
}

impl std::error::Error for ValidationErrors {}

/// Failures of a single request to the optimizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The optimizer answered with a non-success status. Carries the body's
    /// `error` field or `Server error: {status}`; only logged.
    #[error("{0}")]
    Status(String),

    /// A successful response whose body carries an `error` field.
    #[error("{0}")]
    Remote(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl SubmitError {
    /// The text placed in the error block.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Remote(message) => message,
            Self::Transport(_) | Self::Status(_) | Self::MalformedResponse(_) => {
                CONNECTION_FALLBACK
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_join_in_order() {
        let errors = ValidationErrors(vec![
            ValidationError::NonPositiveCapital,
            ValidationError::InsufficientTickers,
        ]);
        assert_eq!(
            errors.to_string(),
            "Capital must be a positive number\nPlease add at least 2 stocks to your portfolio"
        );
    }

    #[test]
    fn test_submit_error_user_message() {
        let remote = SubmitError::Remote("Missing one or more required fields".to_string());
        assert_eq!(remote.user_message(), "Missing one or more required fields");

        let status = SubmitError::Status("Server error: 500".to_string());
        assert_eq!(status.user_message(), CONNECTION_FALLBACK);

        let transport = SubmitError::Transport("connection refused".to_string());
        assert_eq!(transport.user_message(), CONNECTION_FALLBACK);
        assert_eq!(
            SubmitError::MalformedResponse("eof".to_string()).user_message(),
            CONNECTION_FALLBACK
        );
    }
}
