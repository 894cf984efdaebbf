//! Convenience result type alias for FileFlow.

use crate::error::AppError;

/// A specialized `Result` type for FileFlow operations.
pub type AppResult<T> = Result<T, AppError>;
