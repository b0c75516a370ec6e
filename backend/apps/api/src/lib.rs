//! API composition
//!
//! Configuration and the service graph shared by the binary and the
//! request layer mounted on top of it.

pub mod config;
pub mod state;

// Re-export unified error types for the request layer
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
