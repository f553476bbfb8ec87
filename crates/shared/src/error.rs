//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// This is the surface callers of the ledger see. Domain errors are folded
/// into one of these variants so every failure maps to a stable code.
#[derive(Debug, Error)]
pub enum AppError {
    /// Entity absent, or owned by a different tenant.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input rejected before any write.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Duplicate key or lost race on a state transition.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Write against a posted entry or a closed period.
    #[error("Immutable record: {0}")]
    ImmutableRecord(String),

    /// Delete blocked by existing references.
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Conflict(_) | Self::Dependency(_) => 409,
            Self::ImmutableRecord(_) => 422,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::ImmutableRecord(_) => "IMMUTABLE_RECORD",
            Self::Dependency(_) => "DEPENDENCY_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Internal(format!("configuration: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::NotFound(String::new()), 404, "NOT_FOUND")]
    #[case(AppError::Validation(String::new()), 400, "VALIDATION_ERROR")]
    #[case(AppError::Conflict(String::new()), 409, "CONFLICT")]
    #[case(AppError::ImmutableRecord(String::new()), 422, "IMMUTABLE_RECORD")]
    #[case(AppError::Dependency(String::new()), 409, "DEPENDENCY_ERROR")]
    #[case(AppError::Database(String::new()), 500, "DATABASE_ERROR")]
    #[case(AppError::Internal(String::new()), 500, "INTERNAL_ERROR")]
    fn test_error_status_and_code(
        #[case] err: AppError,
        #[case] status: u16,
        #[case] code: &str,
    ) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::Dependency("account in use".into()).to_string(),
            "Dependency error: account in use"
        );
        assert_eq!(
            AppError::ImmutableRecord("entry posted".into()).to_string(),
            "Immutable record: entry posted"
        );
    }
}
