//! In-memory chat platform for relay tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use wormhole_common::config::{LimitsConfig, RelayConfig};
use wormhole_common::error::TransportError;
use wormhole_common::ids::{ChannelId, EndpointId, GuildId, MessageId, UserId};
use wormhole_common::models::{
    Author, Channel, Endpoint, EndpointProfile, Link, Message, MessageReference, MirrorPayload,
    OpenWormholeRequest, Wormhole,
};
use wormhole_common::permissions::Permissions;
use wormhole_db::Database;
use wormhole_relay::admin::{Actor, LinkRequest, WormholeAdmin};
use wormhole_relay::transport::{HistoryOrder, HistoryQuery, Transport};
use wormhole_relay::{RelayEngine, SuppressionCache};

pub const GUILD: GuildId = GuildId(1);
pub const WEB_URL: &str = "https://discord.com";
pub const OWNER: UserId = UserId(7);
/// The account the relay posts notices as.
pub const RELAY_USER: UserId = UserId(900);

#[derive(Default)]
struct State {
    channels: HashMap<ChannelId, Channel>,
    messages: HashMap<ChannelId, Vec<Message>>,
    endpoints: HashMap<EndpointId, (Endpoint, String)>,
    no_webhooks: HashSet<ChannelId>,
    next_id: u64,
    ticks: i64,
    payloads: Vec<MirrorPayload>,
    deleted: Vec<(ChannelId, MessageId)>,
    notices: Vec<(ChannelId, String)>,
    history_calls: usize,
    history_served: usize,
    history_delay: Option<Duration>,
}

/// Channels, messages and webhooks kept in memory. Every new message is one
/// second younger than the previous one.
#[derive(Default)]
pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn add_channel(&self, id: u64) -> ChannelId {
        let id = ChannelId(id);
        self.with(|s| {
            s.channels.insert(
                id,
                Channel {
                    id,
                    guild_id: Some(GUILD),
                    parent_id: None,
                    name: Some(format!("chan-{id}")),
                },
            );
        });
        id
    }

    pub fn remove_channel(&self, id: ChannelId) {
        self.with(|s| s.channels.remove(&id));
    }

    pub fn deny_webhooks(&self, id: ChannelId) {
        self.with(|s| s.no_webhooks.insert(id));
    }

    pub fn delete_remote_endpoint(&self, id: EndpointId) {
        self.with(|s| s.endpoints.remove(&id));
    }

    pub fn set_history_delay(&self, delay: Duration) {
        self.with(|s| s.history_delay = Some(delay));
    }

    fn stamp(s: &mut State) -> (MessageId, DateTime<Utc>) {
        s.next_id += 1;
        s.ticks += 1;
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        (MessageId(1000 + s.next_id), base + chrono::Duration::seconds(s.ticks))
    }

    /// Post a message as a regular user.
    pub fn post(&self, channel: ChannelId, author: &str, content: &str) -> Message {
        self.post_message(channel, author, content, None)
    }

    pub fn reply(&self, to: &Message, author: &str, content: &str) -> Message {
        let reference = MessageReference {
            message_id: to.id,
            channel_id: to.channel_id,
            guild_id: to.guild_id,
        };
        self.post_message(to.channel_id, author, content, Some(reference))
    }

    fn post_message(
        &self,
        channel: ChannelId,
        author: &str,
        content: &str,
        reference: Option<MessageReference>,
    ) -> Message {
        self.with(|s| {
            let (id, created_at) = Self::stamp(s);
            let message = Message {
                id,
                channel_id: channel,
                guild_id: Some(GUILD),
                author: Author {
                    id: UserId(author.len() as u64 + 100),
                    display_name: author.into(),
                    avatar_url: Some(format!("https://cdn.example/{author}.png")),
                    bot: false,
                },
                webhook_id: None,
                content: content.into(),
                created_at,
                reference,
                attachments: Vec::new(),
                embeds: Vec::new(),
            };
            s.messages.entry(channel).or_default().push(message.clone());
            message
        })
    }

    /// Change a message's content in place and return the new version.
    pub fn edit(&self, message: &Message, content: &str) -> Message {
        self.with(|s| {
            let stored = s
                .messages
                .get_mut(&message.channel_id)
                .and_then(|list| list.iter_mut().find(|m| m.id == message.id))
                .unwrap();
            stored.content = content.into();
            stored.clone()
        })
    }

    /// Remove a message as a user would, returning it for the delete event.
    pub fn user_delete(&self, message: &Message) -> Message {
        self.with(|s| {
            let list = s.messages.get_mut(&message.channel_id).unwrap();
            let idx = list.iter().position(|m| m.id == message.id).unwrap();
            list.remove(idx)
        })
    }

    pub fn messages_in(&self, channel: ChannelId) -> Vec<Message> {
        self.with(|s| s.messages.get(&channel).cloned().unwrap_or_default())
    }

    pub fn endpoint_names(&self) -> Vec<String> {
        self.with(|s| s.endpoints.values().map(|(_, name)| name.clone()).collect())
    }

    pub fn payloads(&self) -> Vec<MirrorPayload> {
        self.with(|s| s.payloads.clone())
    }

    pub fn deleted(&self) -> Vec<(ChannelId, MessageId)> {
        self.with(|s| s.deleted.clone())
    }

    pub fn notices(&self) -> Vec<(ChannelId, String)> {
        self.with(|s| s.notices.clone())
    }

    /// (history calls, history entries returned)
    pub fn history_stats(&self) -> (usize, usize) {
        self.with(|s| (s.history_calls, s.history_served))
    }
}

#[async_trait]
impl Transport for FakePlatform {
    async fn channel(&self, id: ChannelId) -> Result<Option<Channel>, TransportError> {
        Ok(self.with(|s| s.channels.get(&id).cloned()))
    }

    async fn history(
        &self,
        channel: ChannelId,
        query: &HistoryQuery,
    ) -> Result<Vec<Message>, TransportError> {
        if let Some(delay) = self.with(|s| s.history_delay) {
            tokio::time::sleep(delay).await;
        }
        self.with(|s| {
            if !s.channels.contains_key(&channel) {
                return Err(TransportError::UnknownChannel);
            }
            let mut found: Vec<Message> = s
                .messages
                .get(&channel)
                .map(|list| {
                    list.iter()
                        .filter(|m| query.admits(m.created_at))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            if query.order == HistoryOrder::NewestFirst {
                found.reverse();
            }
            found.truncate(query.limit);
            s.history_calls += 1;
            s.history_served += found.len();
            Ok(found)
        })
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        id: MessageId,
    ) -> Result<Option<Message>, TransportError> {
        Ok(self.with(|s| {
            s.messages
                .get(&channel)
                .and_then(|list| list.iter().find(|m| m.id == id).cloned())
        }))
    }

    async fn permissions_in(&self, channel: ChannelId) -> Result<Permissions, TransportError> {
        Ok(self.with(|s| {
            let base = Permissions::VIEW_CHANNEL
                | Permissions::SEND_MESSAGES
                | Permissions::READ_MESSAGE_HISTORY
                | Permissions::MANAGE_MESSAGES;
            if s.no_webhooks.contains(&channel) {
                base
            } else {
                base | Permissions::MANAGE_WEBHOOKS
            }
        }))
    }

    async fn member_permissions(
        &self,
        _channel: ChannelId,
        _user: UserId,
    ) -> Result<Permissions, TransportError> {
        Ok(Permissions::VIEW_CHANNEL | Permissions::MANAGE_MESSAGES)
    }

    async fn create_endpoint(
        &self,
        channel: ChannelId,
        profile: &EndpointProfile,
    ) -> Result<Endpoint, TransportError> {
        self.with(|s| {
            if s.no_webhooks.contains(&channel) {
                return Err(TransportError::Forbidden("MANAGE_WEBHOOKS".into()));
            }
            s.next_id += 1;
            let endpoint = Endpoint {
                id: EndpointId(90_000 + s.next_id),
                channel_id: channel,
                token: format!("secret-{}", s.next_id),
            };
            s.endpoints
                .insert(endpoint.id, (endpoint.clone(), profile.name.clone()));
            Ok(endpoint)
        })
    }

    async fn find_endpoint(
        &self,
        channel: ChannelId,
        id: EndpointId,
    ) -> Result<Option<Endpoint>, TransportError> {
        Ok(self.with(|s| {
            s.endpoints
                .get(&id)
                .filter(|(e, _)| e.channel_id == channel)
                .map(|(e, _)| e.clone())
        }))
    }

    async fn execute_endpoint(
        &self,
        endpoint: &Endpoint,
        payload: &MirrorPayload,
    ) -> Result<Message, TransportError> {
        self.with(|s| {
            if !s.endpoints.contains_key(&endpoint.id) {
                return Err(TransportError::Api {
                    status: 404,
                    message: "Unknown Webhook".into(),
                });
            }
            let (id, created_at) = Self::stamp(s);
            let message = Message {
                id,
                channel_id: endpoint.channel_id,
                guild_id: Some(GUILD),
                author: Author {
                    id: UserId(endpoint.id.get()),
                    display_name: payload.username.clone(),
                    avatar_url: payload.avatar_url.clone(),
                    bot: true,
                },
                webhook_id: Some(endpoint.id),
                content: payload.content.clone(),
                created_at,
                reference: None,
                attachments: payload.files.clone(),
                embeds: payload.embeds.clone(),
            };
            s.messages
                .entry(endpoint.channel_id)
                .or_default()
                .push(message.clone());
            s.payloads.push(payload.clone());
            Ok(message)
        })
    }

    async fn edit_endpoint_message(
        &self,
        endpoint: &Endpoint,
        message: MessageId,
        content: &str,
    ) -> Result<(), TransportError> {
        self.with(|s| {
            let stored = s
                .messages
                .get_mut(&endpoint.channel_id)
                .and_then(|list| list.iter_mut().find(|m| m.id == message))
                .ok_or(TransportError::Api {
                    status: 404,
                    message: "Unknown Message".into(),
                })?;
            stored.content = content.into();
            Ok(())
        })
    }

    async fn delete_message(&self, channel: ChannelId, id: MessageId) -> Result<(), TransportError> {
        self.with(|s| {
            let list = s.messages.entry(channel).or_default();
            let idx = list
                .iter()
                .position(|m| m.id == id)
                .ok_or(TransportError::Api {
                    status: 404,
                    message: "Unknown Message".into(),
                })?;
            list.remove(idx);
            s.deleted.push((channel, id));
            Ok(())
        })
    }

    async fn current_user(&self) -> Result<UserId, TransportError> {
        Ok(RELAY_USER)
    }

    async fn send_notice(&self, channel: ChannelId, text: &str) -> Result<(), TransportError> {
        self.with(|s| {
            let (id, created_at) = Self::stamp(s);
            s.messages.entry(channel).or_default().push(Message {
                id,
                channel_id: channel,
                guild_id: Some(GUILD),
                author: Author {
                    id: RELAY_USER,
                    display_name: "Wormhole".into(),
                    avatar_url: None,
                    bot: true,
                },
                webhook_id: None,
                content: text.into(),
                created_at,
                reference: None,
                attachments: Vec::new(),
                embeds: Vec::new(),
            });
            s.notices.push((channel, text.to_owned()));
        });
        Ok(())
    }
}

/// A relay engine, its management service and the fake platform, sharing
/// one in-memory database.
pub struct Harness {
    pub db: Database,
    pub platform: Arc<FakePlatform>,
    pub engine: RelayEngine,
    pub admin: WormholeAdmin,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(RelayConfig::default()).await
    }

    pub async fn with_config(config: RelayConfig) -> Self {
        let db = Database::connect_in_memory().await.unwrap();
        let platform = Arc::new(FakePlatform::default());
        let transport: Arc<dyn Transport> = platform.clone();
        let engine = RelayEngine::new(
            db.clone(),
            transport,
            SuppressionCache::new(config.suppression_delay()),
            &config,
            WEB_URL,
        );
        let admin = WormholeAdmin::new(db.clone(), LimitsConfig::default());
        Self {
            db,
            platform,
            engine,
            admin,
        }
    }

    pub async fn wormhole(&self, name: &str) -> Wormhole {
        self.admin
            .open(
                OWNER,
                OpenWormholeRequest {
                    name: name.into(),
                    sync_threads: true,
                },
            )
            .await
            .unwrap()
    }

    pub async fn link(&self, wormhole: &Wormhole, channel: ChannelId, read: bool, write: bool) -> Link {
        let mut request = LinkRequest::new(wormhole, channel);
        request.can_read = read;
        request.can_write = write;
        self.admin
            .add_link(&Actor::operator(OWNER), request)
            .await
            .unwrap()
    }
}
