//! Errors returned by `find`

use thiserror::Error;

use crate::executor::ExecutionError;
use crate::planner::CompileError;
use crate::schema::NotFoundError;

/// Result type for find operations
pub type FindResult<T> = Result<T, FindError>;

/// Any failure of a find call. There is never a partial result.
#[derive(Debug, Clone, Error)]
pub enum FindError {
    /// Malformed or unsupported request; nothing was executed
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Unknown table or relation path; nothing was executed
    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    /// The execution collaborator rejected a query
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// The caller aborted the request
    #[error("Request cancelled")]
    Cancelled,
}

impl FindError {
    /// Returns the error code string
    pub fn code(&self) -> &'static str {
        match self {
            FindError::Compile(e) => e.code().code(),
            FindError::NotFound(e) => e.code(),
            FindError::Execution(e) => e.code().code(),
            FindError::Cancelled => "REQUEST_CANCELLED",
        }
    }

    /// HTTP-style status for a transport layer
    pub fn status_code(&self) -> u16 {
        match self {
            FindError::Compile(_) => 400,
            FindError::NotFound(_) => 404,
            FindError::Execution(_) => 500,
            FindError::Cancelled => 499,
        }
    }

    /// True when the request was rejected before any query ran
    pub fn is_rejection(&self) -> bool {
        matches!(self, FindError::Compile(_) | FindError::NotFound(_))
    }
}
