//! # wormhole-common
//!
//! Shared ids, models, configuration, error handling, and permission helpers
//! used across all wormhole crates. No relay logic lives here, just the
//! primitives and contracts the other crates agree on.

pub mod config;
pub mod error;
pub mod ids;
pub mod models;
pub mod permissions;
pub mod validation;
