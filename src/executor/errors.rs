//! Execution error types
//!
//! Error codes:
//! - EXECUTION_QUERY_FAILED (ERROR)
//! - EXECUTION_TYPE_MISMATCH (ERROR)
//! - EXECUTION_UNAVAILABLE (ERROR)
//! - EXECUTION_UNKNOWN_TABLE (ERROR)

use std::fmt;

/// Severity levels for execution errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The query failed; the executor itself is healthy
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Execution error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionErrorCode {
    /// General query failure
    QueryFailed,
    /// Operand and column value have incomparable kinds
    TypeMismatch,
    /// Executor cannot serve queries right now
    Unavailable,
    /// Query names a table the executor has no rows for
    UnknownTable,
}

impl ExecutionErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionErrorCode::QueryFailed => "EXECUTION_QUERY_FAILED",
            ExecutionErrorCode::TypeMismatch => "EXECUTION_TYPE_MISMATCH",
            ExecutionErrorCode::Unavailable => "EXECUTION_UNAVAILABLE",
            ExecutionErrorCode::UnknownTable => "EXECUTION_UNKNOWN_TABLE",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for ExecutionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Execution error with context
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionError {
    code: ExecutionErrorCode,
    message: String,
}

impl ExecutionError {
    /// Create a query failed error
    pub fn query_failed(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutionErrorCode::QueryFailed,
            message: reason.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(column: &str, expected: &str, found: &str) -> Self {
        Self {
            code: ExecutionErrorCode::TypeMismatch,
            message: format!(
                "Cannot compare column '{}' holding {} with {}",
                column, found, expected
            ),
        }
    }

    /// Create an unavailable error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            code: ExecutionErrorCode::Unavailable,
            message: reason.into(),
        }
    }

    /// Create an unknown table error
    pub fn unknown_table(table: &str) -> Self {
        Self {
            code: ExecutionErrorCode::UnknownTable,
            message: format!("No rows registered for table '{}'", table),
        }
    }

    pub fn code(&self) -> ExecutionErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ExecutionError {
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

impl std::error::Error for ExecutionError {}

/// Result type for execution operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;
