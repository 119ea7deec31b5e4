//! Infrastructure Layer
//!
//! Store implementations, identity files and the outbound platform client.

pub mod identity_files;
pub mod memory;
pub mod platform_http;
pub mod postgres;
