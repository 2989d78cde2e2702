/*!
 * Core error types
 *
 * Error handling for the custody scheduling, event aggregation, and
 * cache-consistency engines. Cache and notification failures are
 * intentionally absorbed at their call sites (best-effort semantics) rather
 * than surfaced through this type; `CoreError` models the failures that a
 * caller of the engine facade must be able to act on.
 */

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Result type for core engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum CoreError {
    /// Requested entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    /// A custody record already exists for the given family/date.
    #[error("custody record already exists for family {family_id} on {date}")]
    CustodyConflict {
        family_id: Uuid,
        date: NaiveDate,
        existing_custodian_id: Uuid,
    },

    /// A schedule template's weekly pattern cannot be materialized (unknown
    /// weekday key, empty pattern, or a referenced custodian not in the
    /// pattern's participant set).
    #[error("unsupported schedule pattern: {reason}")]
    UnsupportedPattern { reason: String },

    /// Custody generation requires at least two active family members.
    #[error("family {family_id} has {found} active member(s), need at least 2")]
    InsufficientFamilyMembers { family_id: Uuid, found: usize },

    /// Input failed a field-level validation rule.
    #[error("validation failed for {field}: {message}")]
    ValidationError { field: String, message: String },

    /// Relational store failure.
    #[error("database error during {operation}: {message}")]
    DatabaseError {
        message: String,
        operation: String,
        table: Option<String>,
        constraint_violation: bool,
    },

    /// External calendar fetch/parse failure for a specific provider.
    #[error("sync error for provider {provider_id}: {message}")]
    SyncError {
        provider_id: Uuid,
        message: String,
        retryable: bool,
    },

    /// Outbound HTTP failure (calendar discovery/fetch).
    #[error("network error: {message}")]
    NetworkError {
        message: String,
        status_code: Option<u16>,
        is_timeout: bool,
        is_connection_error: bool,
    },

    /// Caller-facing wrapper for anything unexpected.
    #[error("internal error: {message}")]
    InternalError {
        message: String,
        operation: Option<String>,
    },
}

impl CoreError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::NetworkError {
                is_timeout,
                is_connection_error,
                ..
            } => *is_timeout || *is_connection_error,
            CoreError::SyncError { retryable, .. } => *retryable,
            CoreError::DatabaseError {
                constraint_violation,
                ..
            } => !constraint_violation,
            _ => false,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::InsufficientFamilyMembers { .. } => ErrorSeverity::High,
            CoreError::UnsupportedPattern { .. } => ErrorSeverity::High,
            CoreError::CustodyConflict { .. } => ErrorSeverity::Medium,
            CoreError::ValidationError { .. } => ErrorSeverity::Medium,
            CoreError::NotFound { .. } => ErrorSeverity::Low,
            CoreError::NetworkError { .. } => ErrorSeverity::Low,
            CoreError::SyncError { .. } => ErrorSeverity::Low,
            _ => ErrorSeverity::Medium,
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Structured context attached to a log line at the point an error is
/// handled, mirroring the engine-level logging the calendar orchestration
/// code emits at operation boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub family_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub additional_data: Option<serde_json::Value>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation: operation.into(),
            family_id: None,
            entity_id: None,
            additional_data: None,
        }
    }

    pub fn with_family_id(mut self, family_id: Uuid) -> Self {
        self.family_id = Some(family_id);
        self
    }

    pub fn with_entity_id(mut self, entity_id: Uuid) -> Self {
        self.entity_id = Some(entity_id);
        self
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(error: sqlx::Error) -> Self {
        let constraint_violation = matches!(
            error,
            sqlx::Error::Database(ref db_err)
                if db_err.is_unique_violation() || db_err.is_foreign_key_violation()
        );
        CoreError::DatabaseError {
            message: error.to_string(),
            operation: "unknown".to_string(),
            table: None,
            constraint_violation,
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(error: reqwest::Error) -> Self {
        CoreError::NetworkError {
            message: error.to_string(),
            status_code: error.status().map(|s| s.as_u16()),
            is_timeout: error.is_timeout(),
            is_connection_error: error.is_connect(),
        }
    }
}

impl From<chrono::ParseError> for CoreError {
    fn from(error: chrono::ParseError) -> Self {
        CoreError::ValidationError {
            field: "date".to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_renders_entity_and_id() {
        let err = CoreError::not_found("family", "f-1");
        assert_eq!(err.to_string(), "family f-1 not found");
        assert_eq!(err.severity(), ErrorSeverity::Low);
        assert!(!err.is_retryable());
    }

    #[test]
    fn insufficient_members_is_high_severity_and_not_retryable() {
        let err = CoreError::InsufficientFamilyMembers {
            family_id: Uuid::nil(),
            found: 1,
        };
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(!err.is_retryable());
    }

    #[test]
    fn network_timeout_is_retryable() {
        let err = CoreError::NetworkError {
            message: "timed out".to_string(),
            status_code: None,
            is_timeout: true,
            is_connection_error: false,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn error_context_builder_sets_fields() {
        let family_id = Uuid::new_v4();
        let ctx = ErrorContext::new("generate_custody").with_family_id(family_id);
        assert_eq!(ctx.operation, "generate_custody");
        assert_eq!(ctx.family_id, Some(family_id));
    }
}
