//! Compile error types
//!
//! Error codes:
//! - QUERY_INVALID (REJECT)
//! - QUERY_UNKNOWN_OPERATOR (REJECT)
//! - QUERY_UNKNOWN_FIELD (REJECT)
//! - QUERY_UNKNOWN_RELATION (REJECT)
//! - QUERY_MISSING_AGGREGATE_FIELD (REJECT)
//! - QUERY_INVALID_AGGREGATE (REJECT)
//! - QUERY_UNSUPPORTED_SORT (REJECT)
//! - QUERY_LIMIT_EXCEEDED (REJECT)
//! - QUERY_INVALID_PAGINATION (REJECT)
//! - QUERY_DEEP_TOO_DEEP (REJECT)
//! - QUERY_DEEP_PARENT_MISSING (REJECT)
//!
//! Every compile error is raised before any query is issued.

use std::fmt;

/// Severity levels for compile errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Client request rejected
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Compile error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorCode {
    /// Malformed request, filter, sort or deep shape
    QueryInvalid,
    /// Operator key not in the supported set
    UnknownOperator,
    /// Column does not exist on the table
    UnknownField,
    /// Relation does not exist on the table
    UnknownRelation,
    /// Non-count aggregate without a column
    MissingAggregateField,
    /// Aggregate applied to a column of the wrong type
    InvalidAggregate,
    /// Sort path the resolver cannot order by
    UnsupportedSort,
    /// Limit above the configured maximum
    LimitExceeded,
    /// Zero page or limit
    InvalidPagination,
    /// Deep path longer than the configured maximum
    DeepTooDeep,
    /// Deep path declared without its parent path
    DeepParentMissing,
}

impl CompileErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            CompileErrorCode::QueryInvalid => "QUERY_INVALID",
            CompileErrorCode::UnknownOperator => "QUERY_UNKNOWN_OPERATOR",
            CompileErrorCode::UnknownField => "QUERY_UNKNOWN_FIELD",
            CompileErrorCode::UnknownRelation => "QUERY_UNKNOWN_RELATION",
            CompileErrorCode::MissingAggregateField => "QUERY_MISSING_AGGREGATE_FIELD",
            CompileErrorCode::InvalidAggregate => "QUERY_INVALID_AGGREGATE",
            CompileErrorCode::UnsupportedSort => "QUERY_UNSUPPORTED_SORT",
            CompileErrorCode::LimitExceeded => "QUERY_LIMIT_EXCEEDED",
            CompileErrorCode::InvalidPagination => "QUERY_INVALID_PAGINATION",
            CompileErrorCode::DeepTooDeep => "QUERY_DEEP_TOO_DEEP",
            CompileErrorCode::DeepParentMissing => "QUERY_DEEP_PARENT_MISSING",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for CompileErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Compile error with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Error code
    code: CompileErrorCode,
    /// Human-readable message
    message: String,
    /// Offending field, relation or operator if applicable
    field: Option<String>,
}

impl CompileError {
    fn with_field(code: CompileErrorCode, message: String, field: String) -> Self {
        Self {
            code,
            message,
            field: Some(field),
        }
    }

    /// Create a malformed request error
    pub fn query_invalid(reason: impl Into<String>) -> Self {
        Self {
            code: CompileErrorCode::QueryInvalid,
            message: reason.into(),
            field: None,
        }
    }

    /// Create an unknown operator error
    pub fn unknown_operator(op: impl Into<String>) -> Self {
        let op = op.into();
        Self::with_field(
            CompileErrorCode::UnknownOperator,
            format!("Unknown operator '{}'", op),
            op,
        )
    }

    /// Create an unknown field error
    pub fn unknown_field(table: &str, field: impl Into<String>) -> Self {
        let f = field.into();
        Self::with_field(
            CompileErrorCode::UnknownField,
            format!("Table '{}' has no column '{}'", table, f),
            f,
        )
    }

    /// Create an unknown relation error
    pub fn unknown_relation(table: &str, relation: impl Into<String>) -> Self {
        let r = relation.into();
        Self::with_field(
            CompileErrorCode::UnknownRelation,
            format!("Table '{}' has no relation '{}'", table, r),
            r,
        )
    }

    /// Create a missing aggregate field error
    pub fn missing_aggregate_field(aggregate: &str, relation: impl Into<String>) -> Self {
        let r = relation.into();
        Self::with_field(
            CompileErrorCode::MissingAggregateField,
            format!("Aggregate '{}' on '{}' requires a column", aggregate, r),
            r,
        )
    }

    /// Create an invalid aggregate error
    pub fn invalid_aggregate(reason: impl Into<String>) -> Self {
        Self {
            code: CompileErrorCode::InvalidAggregate,
            message: reason.into(),
            field: None,
        }
    }

    /// Create an unsupported sort error
    pub fn unsupported_sort(path: impl Into<String>, reason: &str) -> Self {
        let p = path.into();
        Self::with_field(
            CompileErrorCode::UnsupportedSort,
            format!("Cannot sort by '{}': {}", p, reason),
            p,
        )
    }

    /// Create a limit exceeded error
    pub fn limit_exceeded(limit: u64, max: u64) -> Self {
        Self {
            code: CompileErrorCode::LimitExceeded,
            message: format!("Limit {} exceeds maximum {}", limit, max),
            field: None,
        }
    }

    /// Create an invalid pagination error
    pub fn invalid_pagination(reason: impl Into<String>) -> Self {
        Self {
            code: CompileErrorCode::InvalidPagination,
            message: reason.into(),
            field: None,
        }
    }

    /// Create a deep-too-deep error
    pub fn deep_too_deep(path: impl Into<String>, max: usize) -> Self {
        let p = path.into();
        Self::with_field(
            CompileErrorCode::DeepTooDeep,
            format!("Deep path '{}' is longer than {} relations", p, max),
            p,
        )
    }

    /// Create a deep-parent-missing error
    pub fn deep_parent_missing(path: impl Into<String>, parent: impl Into<String>) -> Self {
        let p = path.into();
        Self::with_field(
            CompileErrorCode::DeepParentMissing,
            format!("Deep path '{}' requires '{}' to be declared", p, parent.into()),
            p,
        )
    }

    /// Returns the error code
    pub fn code(&self) -> CompileErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the offending name if applicable
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for CompileError {}

/// Result type for compile operations
pub type CompileResult<T> = Result<T, CompileError>;
