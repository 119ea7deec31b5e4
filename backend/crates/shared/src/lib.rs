//! Shared Kernel - Domain-crossing minimal core
//!
//! The vocabulary every crate in the workspace agrees on:
//! - [`error::app_error::AppError`] and its [`error::kind::ErrorKind`] classification
//! - Typed identifiers ([`id::TaskId`])
//!
//! Anything that belongs to a single domain (identities, cooldowns,
//! rate windows) lives in that domain's crate, not here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
