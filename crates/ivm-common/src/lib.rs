//! # ivm-common
//!
//! Shared configuration and error types for the investment platform gateway.

pub mod config;
pub mod error;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
