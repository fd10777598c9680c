//! Message model: the unit the relay mirrors.
//!
//! This is the relay's view of a platform message: enough to fingerprint it,
//! compose its mirror, and find it again. Embeds are carried as opaque JSON
//! because the relay forwards them verbatim.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, EndpointId, GuildId, MessageId, UserId};

/// A message in a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,

    /// Channel this message belongs to
    pub channel_id: ChannelId,

    /// Guild of the channel (None for DMs)
    pub guild_id: Option<GuildId>,

    pub author: Author,

    /// Set when the message was posted through a webhook
    pub webhook_id: Option<EndpointId>,

    /// Markdown-flavored text content
    pub content: String,

    pub created_at: DateTime<Utc>,

    /// Reply target, if this message answers another one
    pub reference: Option<MessageReference>,

    /// File attachments
    pub attachments: Vec<Attachment>,

    /// Rich embeds, forwarded verbatim
    pub embeds: Vec<serde_json::Value>,
}

impl Message {
    /// The address other channels can link to.
    pub fn link(&self) -> MessageLink {
        MessageLink {
            guild_id: self.guild_id,
            channel_id: self.channel_id,
            message_id: self.id,
        }
    }

    pub fn jump_url(&self, web_url: &str) -> String {
        self.link().to_url(web_url)
    }

    /// Whether the message was posted by the given delivery endpoint.
    ///
    /// Endpoint messages report the endpoint id as their author id.
    pub fn is_authored_by_endpoint(&self, endpoint_id: EndpointId) -> bool {
        self.author.id.get() == endpoint_id.get() || self.webhook_id == Some(endpoint_id)
    }
}

impl From<&Message> for MessageId {
    fn from(message: &Message) -> Self {
        message.id
    }
}

impl From<&Message> for ChannelId {
    fn from(message: &Message) -> Self {
        message.channel_id
    }
}

/// Who posted a message, as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    /// Guild nickname, global display name, or username, in that order
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bot: bool,
}

impl From<&Author> for UserId {
    fn from(author: &Author) -> Self {
        author.id
    }
}

/// Reference to another message (for replies).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReference {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
}

impl From<MessageLink> for MessageReference {
    fn from(link: MessageLink) -> Self {
        Self {
            message_id: link.message_id,
            channel_id: link.channel_id,
            guild_id: link.guild_id,
        }
    }
}

/// File attachment metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: u64,
    /// Original filename
    pub filename: String,
    /// MIME type, when the platform reports one
    pub content_type: Option<String>,
    /// File size in bytes
    pub size: u64,
    /// Download URL
    pub url: String,
    /// Whether this is marked as a spoiler
    #[serde(default)]
    pub spoiler: bool,
}

/// Fully qualified address of a message, the target of a jump URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageLink {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

impl MessageLink {
    /// `{web_url}/channels/{guild or @me}/{channel}/{message}`
    pub fn to_url(&self, web_url: &str) -> String {
        format!("{}/channels/{self}", web_url.trim_end_matches('/'))
    }

    /// Parse a jump URL back into its ids. The host is not checked.
    pub fn parse(jump_url: &str) -> Option<Self> {
        let url = url::Url::parse(jump_url).ok()?;
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        let [.., "channels", guild, channel, message] = segments.as_slice() else {
            return None;
        };
        let guild_id = match *guild {
            "@me" => None,
            raw => Some(raw.parse().ok()?),
        };
        Some(Self {
            guild_id,
            channel_id: channel.parse().ok()?,
            message_id: message.parse().ok()?,
        })
    }
}

impl fmt::Display for MessageLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.guild_id {
            Some(guild) => write!(f, "{guild}/{}/{}", self.channel_id, self.message_id),
            None => write!(f, "@me/{}/{}", self.channel_id, self.message_id),
        }
    }
}
