//! Domain Layer
//!
//! Entities, value objects, pure business rules and store traits.

pub mod entity;
pub mod repository;
pub mod services;
pub mod value_object;
