//! Shared Kernel - Domain-crossing minimal core
//!
//! Vocabulary that means the same thing in every crate of the workspace:
//! - Typed entity ids ([`id::Id`])
//! - The unified error type ([`AppError`]) and its classification ([`ErrorKind`])
//!
//! Only things that are hard to change belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;

pub use error::app_error::{AppError, AppResult, OptionExt, ResultExt};
pub use error::kind::ErrorKind;
