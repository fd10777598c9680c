//! Channel model: where mirrored conversation happens.

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, GuildId};

/// A guild text channel (or thread) as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,

    /// Guild this channel belongs to (None for DMs)
    pub guild_id: Option<GuildId>,

    /// Parent channel for threads
    pub parent_id: Option<ChannelId>,

    pub name: Option<String>,
}

impl Channel {
    /// Display label for logs: `#name (id)` or just the id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("#{name} ({})", self.id),
            None => self.id.to_string(),
        }
    }
}

impl From<&Channel> for ChannelId {
    fn from(channel: &Channel) -> Self {
        channel.id
    }
}
