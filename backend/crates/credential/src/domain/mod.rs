//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (Identity, HealthRecord, Task)
//! - Domain value objects (IdentityId, TargetRef, FailureClass)
//! - Domain services (cooldown, scoring and backoff math)
//! - Repository traits (interfaces)

pub mod entities;
pub mod repository;
pub mod services;
pub mod value_objects;
