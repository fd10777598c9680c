//! Delivery endpoint model.
//!
//! A delivery endpoint is a channel webhook owned by the relay. Posting
//! through it lets a mirror show the original author's name and avatar while
//! staying recognizable as relay traffic (its author id is the endpoint id).

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, EndpointId};
use crate::models::message::Attachment;

/// A persisted delivery endpoint for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,
    pub channel_id: ChannelId,
    /// Secret needed to execute the endpoint. Never logged.
    #[serde(skip_serializing)]
    pub token: String,
}

impl From<&Endpoint> for EndpointId {
    fn from(endpoint: &Endpoint) -> Self {
        endpoint.id
    }
}

/// Name and avatar a new endpoint is created with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointProfile {
    pub name: String,
    pub avatar_url: Option<String>,
}

/// A message to post through an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorPayload {
    pub content: String,
    /// Display name override (the original author's)
    pub username: String,
    /// Avatar override (the original author's)
    pub avatar_url: Option<String>,
    /// Disable @everyone, @here, user and role mention resolution
    pub suppress_mentions: bool,
    /// Attachments to re-upload as files
    pub files: Vec<Attachment>,
    /// Embeds forwarded verbatim
    pub embeds: Vec<serde_json::Value>,
}
