//! Domain Layer
//!
//! - Captcha challenge entity and its verdicts
//! - Value objects (limiter names, registration subjects, policies)
//! - Question generation and answer comparison
//! - Repository traits

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
