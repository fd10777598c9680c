//! Domain models shared across the wormhole crates.
//!
//! Storage records (wormholes, links, admins, endpoints) and the platform's
//! channel and message shapes as the relay sees them.

pub mod admin;
pub mod channel;
pub mod endpoint;
pub mod link;
pub mod message;
pub mod wormhole;

/// Re-export all model types for convenience.
pub use admin::*;
pub use channel::*;
pub use endpoint::*;
pub use link::*;
pub use message::*;
pub use wormhole::*;
