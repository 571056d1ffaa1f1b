//! Convenience result type alias for Kairo.

use crate::error::AppError;

/// A specialized `Result` type for Kairo host operations.
pub type AppResult<T> = Result<T, AppError>;
