//! # kairo-core
//!
//! Core crate for the Kairo extension host. Contains the unified error
//! system and the configuration schemas read at startup.
//!
//! This crate has **no** internal dependencies on other Kairo crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
