//! # wormhole-relay
//!
//! The relay core. Given platform events it works out which channels a
//! message should reach, posts a mirror through each channel's delivery
//! endpoint, and later finds those mirrors again (to delete or edit them)
//! without keeping any message-id mapping: mirrors are recognized by their
//! content fingerprint inside a small window of channel history.
//!
//! The platform itself sits behind the [`transport::Transport`] trait so the
//! core can run against the real REST API or an in-memory fake.

pub mod admin;
pub mod content;
pub mod endpoints;
pub mod engine;
pub mod identity;
pub mod link_graph;
pub mod suppression;
pub mod transport;

pub use admin::{Actor, LinkRequest, WormholeAdmin};
pub use content::ContentCodec;
pub use endpoints::EndpointRegistry;
pub use engine::{RelayEngine, RelayReport, SkipReason};
pub use identity::{Fingerprint, IdentityResolver};
pub use link_graph::LinkGraph;
pub use suppression::SuppressionCache;
pub use transport::{HistoryOrder, HistoryQuery, Transport};
