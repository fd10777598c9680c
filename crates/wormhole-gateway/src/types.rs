//! Wire types matching the platform's JSON payloads, and their conversion
//! into the relay's models.
//!
//! Only the fields the relay reads are declared; everything else in a payload
//! is ignored on deserialization.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use wormhole_common::ids::{ChannelId, EndpointId, GuildId, MessageId, UserId};
use wormhole_common::models::{Attachment, Author, Channel, Endpoint, Message, MessageReference};

/// Filename prefix the platform uses to mark an attachment as a spoiler.
const SPOILER_PREFIX: &str = "SPOILER_";

// ── Users ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct WireUser {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl WireUser {
    /// CDN URL of the user's avatar, or of the default avatar if none is set.
    pub fn avatar_url(&self, cdn_url: &str) -> String {
        let cdn = cdn_url.trim_end_matches('/');
        match &self.avatar {
            Some(hash) => {
                let ext = if hash.starts_with("a_") { "gif" } else { "png" };
                format!("{cdn}/avatars/{}/{hash}.{ext}", self.id)
            }
            None => format!("{cdn}/embed/avatars/{}.png", (self.id.get() >> 22) % 6),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireMember {
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Present on member objects fetched over REST
    #[serde(default)]
    pub user: Option<WireUser>,
}

// ── Messages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct WireAttachment {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

impl From<WireAttachment> for Attachment {
    fn from(wire: WireAttachment) -> Self {
        Self {
            id: wire.id.parse().unwrap_or_default(),
            spoiler: wire.filename.starts_with(SPOILER_PREFIX),
            filename: wire.filename,
            content_type: wire.content_type,
            size: wire.size,
            url: wire.url,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireReference {
    #[serde(default)]
    pub message_id: Option<MessageId>,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
}

/// A full message, as sent in `MESSAGE_CREATE` and by REST reads.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    /// Only present in gateway events
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    pub author: WireUser,
    #[serde(default)]
    pub member: Option<WireMember>,
    #[serde(default)]
    pub webhook_id: Option<EndpointId>,
    #[serde(default)]
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message_reference: Option<WireReference>,
    #[serde(default)]
    pub attachments: Vec<WireAttachment>,
    #[serde(default)]
    pub embeds: Vec<Value>,
}

impl WireMessage {
    /// Convert into the relay's model. `guild_id` fills in the guild for REST
    /// payloads, which omit it.
    pub fn into_model(self, guild_id: Option<GuildId>, cdn_url: &str) -> Message {
        let guild_id = self.guild_id.or(guild_id);
        let display_name = self
            .member
            .as_ref()
            .and_then(|m| m.nick.clone())
            .or_else(|| self.author.global_name.clone())
            .unwrap_or_else(|| self.author.username.clone());
        let author = Author {
            id: self.author.id,
            avatar_url: Some(self.author.avatar_url(cdn_url)),
            bot: self.author.bot,
            display_name,
        };
        let reference = self.message_reference.and_then(|r| {
            Some(MessageReference {
                message_id: r.message_id?,
                channel_id: r.channel_id.unwrap_or(self.channel_id),
                guild_id: r.guild_id.or(guild_id),
            })
        });

        Message {
            id: self.id,
            channel_id: self.channel_id,
            guild_id,
            author,
            webhook_id: self.webhook_id,
            content: self.content,
            created_at: self.timestamp,
            reference,
            attachments: self.attachments.into_iter().map(Attachment::from).collect(),
            embeds: self.embeds,
        }
    }
}

/// A partial message from `MESSAGE_UPDATE`. Absent fields did not change.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessageUpdate {
    pub id: MessageId,
    pub channel_id: ChannelId,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<WireAttachment>>,
    #[serde(default)]
    pub embeds: Option<Vec<Value>>,
}

impl WireMessageUpdate {
    /// Apply the changed fields on top of the previously known message.
    pub fn apply(self, before: &Message) -> Message {
        let mut after = before.clone();
        if let Some(content) = self.content {
            after.content = content;
        }
        if let Some(attachments) = self.attachments {
            after.attachments = attachments.into_iter().map(Attachment::from).collect();
        }
        if let Some(embeds) = self.embeds {
            after.embeds = embeds;
        }
        after
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessageDelete {
    pub id: MessageId,
    pub channel_id: ChannelId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessageDeleteBulk {
    pub ids: Vec<MessageId>,
    pub channel_id: ChannelId,
}

// ── Channels & guilds ────────────────────────────────────────────────────────

/// Channel types that are threads (announcement, public, private).
const THREAD_TYPES: [u8; 3] = [10, 11, 12];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(from = "u8")]
pub enum OverwriteKind {
    Role,
    Member,
}

impl From<u8> for OverwriteKind {
    fn from(raw: u8) -> Self {
        if raw == 1 { Self::Member } else { Self::Role }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireOverwrite {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OverwriteKind,
    pub allow: String,
    pub deny: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireChannel {
    pub id: ChannelId,
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub guild_id: Option<GuildId>,
    #[serde(default)]
    pub parent_id: Option<ChannelId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub permission_overwrites: Vec<WireOverwrite>,
}

impl WireChannel {
    pub fn is_thread(&self) -> bool {
        THREAD_TYPES.contains(&self.kind)
    }
}

impl From<WireChannel> for Channel {
    fn from(wire: WireChannel) -> Self {
        Self {
            id: wire.id,
            guild_id: wire.guild_id,
            parent_id: wire.parent_id,
            name: wire.name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireRole {
    pub id: String,
    pub permissions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireGuild {
    pub id: GuildId,
    pub owner_id: UserId,
    #[serde(default)]
    pub roles: Vec<WireRole>,
}

// ── Webhooks ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct WireWebhook {
    pub id: EndpointId,
    #[serde(default)]
    pub channel_id: Option<ChannelId>,
    /// Only returned for incoming webhooks the caller can execute
    #[serde(default)]
    pub token: Option<String>,
}

impl WireWebhook {
    /// The endpoint, if the webhook is executable.
    pub fn into_endpoint(self, channel: ChannelId) -> Option<Endpoint> {
        Some(Endpoint {
            id: self.id,
            channel_id: self.channel_id.unwrap_or(channel),
            token: self.token?,
        })
    }
}
