//! Abuse Control
//!
//! Cheap gates that run in front of the expensive or abusable endpoints:
//! - `RateLimiter` - fixed-window counters per client key, one named
//!   limiter per endpoint family (global, login, register, chat)
//! - Captcha guard - single-use arithmetic challenges with a short TTL
//! - `RegistrationThrottle` - caps sign-ups per network address and per
//!   device fingerprint
//!
//! Layout:
//! - `domain/` - challenge entity, value objects, question generation
//! - `application/` - config and use cases, the `AbuseGuard` facade, sweeper
//! - `infra/` - in-process stores
//!
//! All state is in-process and rebuilt empty on restart. Counters and
//! challenges are swept by a background task; every read path also treats
//! expired entries as absent, so correctness never depends on the sweep.

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

pub use application::config::GuardConfig;
pub use application::guard::{AbuseGuard, GuardStats, SweepReport};
pub use application::sweeper::spawn_sweeper;
pub use domain::value_objects::{LimiterName, RegistrationSubject};
pub use error::{GuardError, GuardResult};
pub use infra::memory::{InMemoryGuard, MemoryCaptchaRepository};

#[cfg(test)]
mod tests;
