//! Engine error taxonomy.

use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// The taxonomy is transport-agnostic; the embedding process maps kinds onto
/// status codes. `retryable()` tells clients whether backing off and retrying
/// can help without changing the request.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed coordinates, missing required fields, invalid enum values.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Addressed entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Precondition on state or lock violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Business-rule violation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// External dependency did not respond within its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Persistence, cache, PSP, or bus unavailable.
    #[error("Dependency unavailable: {0}")]
    Dependency(String),

    /// Invariant violation or bug. Fatal to the request.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Stable machine-readable kind tag.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::NotFound(_) => "not_found",
            EngineError::Conflict(_) => "conflict",
            EngineError::Validation(_) => "validation",
            EngineError::Timeout(_) => "timeout",
            EngineError::Dependency(_) => "dependency",
            EngineError::Internal(_) => "internal",
        }
    }

    /// Whether retrying with backoff can succeed without changed inputs.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Conflict(_) | EngineError::Timeout(_) | EngineError::Dependency(_)
        )
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => EngineError::NotFound("Resource not found".into()),
            sqlx::Error::PoolTimedOut => {
                EngineError::Timeout("Database connection pool exhausted".into())
            }
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                EngineError::Dependency(format!("Database unavailable: {}", err))
            }
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        // unique_violation
                        "23505" => EngineError::Conflict("Resource already exists".into()),
                        // foreign_key_violation
                        "23503" => EngineError::NotFound("Referenced resource not found".into()),
                        _ => EngineError::Internal(format!("Database error: {}", db_err)),
                    }
                } else {
                    EngineError::Internal(format!("Database error: {}", db_err))
                }
            }
            _ => EngineError::Internal(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for EngineError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    format!(
                        "{}: {}",
                        field,
                        e.message.as_deref().unwrap_or("invalid value")
                    )
                })
            })
            .collect();

        EngineError::InvalidInput(details.join(", "))
    }
}

/// Whether a unique-violation came back from the database.
///
/// Used to translate duplicate idempotency-key inserts into replays.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(EngineError::Conflict("x".into()).retryable());
        assert!(EngineError::Timeout("x".into()).retryable());
        assert!(EngineError::Dependency("x".into()).retryable());
        assert!(!EngineError::InvalidInput("x".into()).retryable());
        assert!(!EngineError::NotFound("x".into()).retryable());
        assert!(!EngineError::Validation("x".into()).retryable());
        assert!(!EngineError::Internal("x".into()).retryable());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: EngineError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn test_validation_errors_map_to_invalid_input() {
        let mut errors = validator::ValidationErrors::new();
        errors.add(
            "latitude",
            validator::ValidationError::new("latitude_range"),
        );
        let err: EngineError = errors.into();
        assert_eq!(err.kind(), "invalid_input");
    }
}
