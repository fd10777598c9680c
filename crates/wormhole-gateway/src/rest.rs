//! Async REST client for the platform API, and the relay [`Transport`] built
//! on it.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::OnceCell;

use wormhole_common::config::PlatformConfig;
use wormhole_common::error::TransportError;
use wormhole_common::ids::{ChannelId, EndpointId, GuildId, MessageId, UserId, snowflake_at};
use wormhole_common::models::{Channel, Endpoint, EndpointProfile, Message, MirrorPayload};
use wormhole_common::permissions::Permissions;
use wormhole_relay::transport::{HistoryOrder, HistoryQuery, Transport};

use crate::error::{GatewayError, Result};
use crate::permissions::compute_permissions;
use crate::types::{WireChannel, WireGuild, WireMember, WireMessage, WireUser, WireWebhook};

/// Rate-limited requests are retried this many times before giving up.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Async platform REST client.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    /// Unauthenticated client for CDN downloads
    cdn: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(token: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let token = {
            let t = token.into();
            if t.starts_with("Bot ") { t } else { format!("Bot {t}") }
        };
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("wormhole/", env!("CARGO_PKG_VERSION")))
            .default_headers({
                let mut h = reqwest::header::HeaderMap::new();
                let mut auth = reqwest::header::HeaderValue::from_str(&token)
                    .map_err(|e| GatewayError::Other(e.to_string()))?;
                auth.set_sensitive(true);
                h.insert(reqwest::header::AUTHORIZATION, auth);
                h
            })
            .build()?;
        let cdn = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            cdn,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    // ── Internal ──────────────────────────────────────────────────────────────

    async fn send(&self, method: Method, path: &str, body: Body<'_>) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt = 0;
        loop {
            let mut req = self.client.request(method.clone(), &url);
            req = match &body {
                Body::Empty => req,
                Body::Json(b) => req.json(b),
                Body::Multipart(build) => req.multipart(build()?),
            };
            let resp = req.send().await?;
            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS && attempt < MAX_RATE_LIMIT_RETRIES {
                attempt += 1;
                let retry_after = resp
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("retry_after").and_then(Value::as_f64))
                    .unwrap_or(1.0);
                tracing::warn!(path, retry_after, attempt, "Rate limited");
                tokio::time::sleep(Duration::from_secs_f64(retry_after.clamp(0.0, 60.0))).await;
                continue;
            }

            if !status.is_success() {
                let msg = resp
                    .json::<Value>()
                    .await
                    .ok()
                    .and_then(|v| v.get("message").and_then(|e| e.as_str()).map(str::to_owned))
                    .unwrap_or_else(|| status.to_string());
                return Err(GatewayError::Api {
                    status: status.as_u16(),
                    message: msg,
                });
            }
            return Ok(resp);
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Body<'_>,
    ) -> Result<T> {
        let resp = self.send(method, path, body).await?;
        if resp.status() == StatusCode::NO_CONTENT {
            return serde_json::from_value(Value::Null).map_err(GatewayError::Json);
        }
        Ok(resp.json::<T>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, Body::Empty).await
    }

    /// GET that maps "gone" (404) and "hidden" (403) to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.get(path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if matches!(e.status(), Some(403 | 404)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        self.request(Method::POST, path, Body::Json(body)).await
    }

    async fn patch<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T> {
        self.request(Method::PATCH, path, Body::Json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send(Method::DELETE, path, Body::Empty).await?;
        Ok(())
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.cdn.get(url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }

    // ── Users ─────────────────────────────────────────────────────────────────

    pub async fn current_user(&self) -> Result<WireUser> {
        self.get("/users/@me").await
    }

    pub async fn guild_member(&self, guild: GuildId, user: UserId) -> Result<Option<WireMember>> {
        self.get_optional(&format!("/guilds/{guild}/members/{user}")).await
    }

    // ── Channels & guilds ─────────────────────────────────────────────────────

    pub async fn get_channel(&self, channel: ChannelId) -> Result<Option<WireChannel>> {
        self.get_optional(&format!("/channels/{channel}")).await
    }

    pub async fn get_guild(&self, guild: GuildId) -> Result<WireGuild> {
        self.get(&format!("/guilds/{guild}")).await
    }

    pub async fn guild_channels(&self, guild: GuildId) -> Result<Vec<WireChannel>> {
        self.get(&format!("/guilds/{guild}/channels")).await
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    /// `GET /channels/{id}/messages` with snowflake cursors.
    pub async fn list_messages(
        &self,
        channel: ChannelId,
        limit: usize,
        after: Option<u64>,
        before: Option<u64>,
    ) -> Result<Vec<WireMessage>> {
        let mut path = format!("/channels/{channel}/messages?limit={}", limit.clamp(1, 100));
        if let Some(after) = after {
            path.push_str(&format!("&after={after}"));
        }
        if let Some(before) = before {
            path.push_str(&format!("&before={before}"));
        }
        self.get(&path).await
    }

    pub async fn get_message(&self, channel: ChannelId, id: MessageId) -> Result<Option<WireMessage>> {
        self.get_optional(&format!("/channels/{channel}/messages/{id}")).await
    }

    pub async fn create_message(&self, channel: ChannelId, content: &str) -> Result<WireMessage> {
        self.post(
            &format!("/channels/{channel}/messages"),
            &json!({ "content": content, "allowed_mentions": { "parse": [] } }),
        )
        .await
    }

    pub async fn delete_message(&self, channel: ChannelId, id: MessageId) -> Result<()> {
        self.delete(&format!("/channels/{channel}/messages/{id}")).await
    }

    // ── Webhooks ──────────────────────────────────────────────────────────────

    pub async fn create_webhook(
        &self,
        channel: ChannelId,
        name: &str,
        avatar: Option<&str>,
    ) -> Result<WireWebhook> {
        self.post(
            &format!("/channels/{channel}/webhooks"),
            &json!({ "name": name, "avatar": avatar }),
        )
        .await
    }

    pub async fn get_webhook(&self, id: EndpointId) -> Result<Option<WireWebhook>> {
        self.get_optional(&format!("/webhooks/{id}")).await
    }

    /// Execute a webhook and wait for the created message.
    pub async fn execute_webhook(
        &self,
        id: EndpointId,
        token: &str,
        payload: &Value,
        files: Vec<(String, String, Vec<u8>)>,
    ) -> Result<WireMessage> {
        let path = format!("/webhooks/{id}/{token}?wait=true");
        if files.is_empty() {
            return self.post(&path, payload).await;
        }

        let payload_json = payload.to_string();
        let build = move || -> Result<Form> {
            let mut form = Form::new().text("payload_json", payload_json.clone());
            for (i, (filename, mime, bytes)) in files.iter().enumerate() {
                let part = Part::bytes(bytes.clone())
                    .file_name(filename.clone())
                    .mime_str(mime)?;
                form = form.part(format!("files[{i}]"), part);
            }
            Ok(form)
        };
        self.request(Method::POST, &path, Body::Multipart(Box::new(build)))
            .await
    }

    pub async fn edit_webhook_message(
        &self,
        id: EndpointId,
        token: &str,
        message: MessageId,
        content: &str,
    ) -> Result<WireMessage> {
        self.patch(
            &format!("/webhooks/{id}/{token}/messages/{message}"),
            &json!({ "content": content, "allowed_mentions": { "parse": [] } }),
        )
        .await
    }
}

enum Body<'a> {
    Empty,
    Json(&'a Value),
    /// Multipart forms are single-use, so a retry rebuilds the form.
    Multipart(Box<dyn Fn() -> Result<Form> + Send + Sync + 'a>),
}

// ── Transport ────────────────────────────────────────────────────────────────

/// The relay's platform transport over the REST API.
pub struct RestTransport {
    rest: RestClient,
    cdn_url: String,
    me: OnceCell<UserId>,
    /// REST message payloads omit the guild; remember it per channel.
    guilds: Mutex<HashMap<ChannelId, Option<GuildId>>>,
}

impl RestTransport {
    pub fn new(config: &PlatformConfig) -> Result<Self> {
        Ok(Self {
            rest: RestClient::new(&config.token, &config.api_url, config.request_timeout())?,
            cdn_url: config.cdn_url.clone(),
            me: OnceCell::new(),
            guilds: Mutex::new(HashMap::new()),
        })
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// The relay's own user id.
    pub async fn me(&self) -> Result<UserId> {
        self.me
            .get_or_try_init(|| async { Ok(self.rest.current_user().await?.id) })
            .await
            .copied()
    }

    fn remember_guild(&self, channel: ChannelId, guild: Option<GuildId>) {
        if let Ok(mut guilds) = self.guilds.lock() {
            guilds.insert(channel, guild);
        }
    }

    async fn guild_of(&self, channel: ChannelId) -> Result<Option<GuildId>> {
        let cached = self.guilds.lock().ok().and_then(|g| g.get(&channel).copied());
        if let Some(guild) = cached {
            return Ok(guild);
        }
        let guild = self.rest.get_channel(channel).await?.and_then(|c| c.guild_id);
        self.remember_guild(channel, guild);
        Ok(guild)
    }

    async fn to_model(&self, wire: WireMessage) -> Result<Message> {
        let guild = match wire.guild_id {
            Some(guild) => Some(guild),
            None => self.guild_of(wire.channel_id).await?,
        };
        Ok(wire.into_model(guild, &self.cdn_url))
    }

    async fn permissions_for(&self, channel: ChannelId, user: UserId) -> Result<Permissions> {
        let Some(wire) = self.rest.get_channel(channel).await? else {
            return Ok(Permissions::empty());
        };
        let Some(guild_id) = wire.guild_id else {
            return Ok(Permissions::VIEW_CHANNEL
                | Permissions::SEND_MESSAGES
                | Permissions::READ_MESSAGE_HISTORY);
        };

        // Threads inherit the parent channel's overwrites
        let overwrites = match (wire.is_thread(), wire.parent_id) {
            (true, Some(parent)) => self
                .rest
                .get_channel(parent)
                .await?
                .map(|p| p.permission_overwrites)
                .unwrap_or_default(),
            _ => wire.permission_overwrites,
        };

        let guild = self.rest.get_guild(guild_id).await?;
        let Some(member) = self.rest.guild_member(guild_id, user).await? else {
            return Ok(Permissions::empty());
        };
        Ok(compute_permissions(&guild, &overwrites, user, &member.roles))
    }

    async fn files_of(&self, payload: &MirrorPayload) -> Vec<(String, String, Vec<u8>)> {
        let mut files = Vec::with_capacity(payload.files.len());
        for attachment in &payload.files {
            match self.rest.download(&attachment.url).await {
                Ok(bytes) => {
                    let mime = attachment.content_type.clone().unwrap_or_else(|| {
                        mime_guess::from_path(&attachment.filename)
                            .first_or_octet_stream()
                            .to_string()
                    });
                    files.push((attachment.filename.clone(), mime, bytes));
                }
                // A missing file should not cost the whole mirror
                Err(e) => tracing::warn!(url = %attachment.url, error = %e, "Attachment download failed"),
            }
        }
        files
    }
}

#[async_trait]
impl Transport for RestTransport {
    async fn channel(&self, id: ChannelId) -> std::result::Result<Option<Channel>, TransportError> {
        let wire = self.rest.get_channel(id).await?;
        if let Some(wire) = &wire {
            self.remember_guild(wire.id, wire.guild_id);
        }
        Ok(wire.map(Channel::from))
    }

    async fn history(
        &self,
        channel: ChannelId,
        query: &HistoryQuery,
    ) -> std::result::Result<Vec<Message>, TransportError> {
        // `after` and `before` are exclusive on both sides of the wire
        let after = query
            .after
            .map(|at| snowflake_at(at + chrono::Duration::milliseconds(1)).saturating_sub(1));
        let before = query.before.map(snowflake_at);

        let mut wire = self.rest.list_messages(channel, query.limit, after, before).await?;
        wire.sort_by_key(|m| m.id);
        if query.order == HistoryOrder::NewestFirst {
            wire.reverse();
        }

        let mut messages = Vec::with_capacity(wire.len());
        for m in wire.into_iter().take(query.limit) {
            messages.push(self.to_model(m).await?);
        }
        Ok(messages)
    }

    async fn fetch_message(
        &self,
        channel: ChannelId,
        id: MessageId,
    ) -> std::result::Result<Option<Message>, TransportError> {
        match self.rest.get_message(channel, id).await? {
            Some(wire) => Ok(Some(self.to_model(wire).await?)),
            None => Ok(None),
        }
    }

    async fn permissions_in(&self, channel: ChannelId) -> std::result::Result<Permissions, TransportError> {
        let me = self.me().await?;
        Ok(self.permissions_for(channel, me).await?)
    }

    async fn member_permissions(
        &self,
        channel: ChannelId,
        user: UserId,
    ) -> std::result::Result<Permissions, TransportError> {
        Ok(self.permissions_for(channel, user).await?)
    }

    async fn create_endpoint(
        &self,
        channel: ChannelId,
        profile: &EndpointProfile,
    ) -> std::result::Result<Endpoint, TransportError> {
        // The avatar is uploaded as a data URI; a broken URL just leaves it unset
        let avatar = match &profile.avatar_url {
            Some(url) => match self.rest.download(url).await {
                Ok(bytes) => {
                    let mime = mime_guess::from_path(url).first_or(mime_guess::mime::IMAGE_PNG);
                    let data = base64::engine::general_purpose::STANDARD.encode(bytes);
                    Some(format!("data:{mime};base64,{data}"))
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Endpoint avatar download failed");
                    None
                }
            },
            None => None,
        };

        let hook = self
            .rest
            .create_webhook(channel, &profile.name, avatar.as_deref())
            .await?;
        hook.into_endpoint(channel)
            .ok_or_else(|| TransportError::Decode("webhook created without a token".into()))
    }

    async fn find_endpoint(
        &self,
        channel: ChannelId,
        id: EndpointId,
    ) -> std::result::Result<Option<Endpoint>, TransportError> {
        let hook = self.rest.get_webhook(id).await?;
        Ok(hook
            .filter(|h| h.channel_id.is_none_or(|c| c == channel))
            .and_then(|h| h.into_endpoint(channel)))
    }

    async fn execute_endpoint(
        &self,
        endpoint: &Endpoint,
        payload: &MirrorPayload,
    ) -> std::result::Result<Message, TransportError> {
        let files = self.files_of(payload).await;
        let mut body = json!({
            "content": payload.content,
            "username": payload.username,
            "avatar_url": payload.avatar_url,
            "embeds": payload.embeds,
        });
        if payload.suppress_mentions {
            body["allowed_mentions"] = json!({ "parse": [] });
        }
        if !files.is_empty() {
            body["attachments"] = files
                .iter()
                .enumerate()
                .map(|(i, (name, _, _))| json!({ "id": i, "filename": name }))
                .collect();
        }

        let wire = self
            .rest
            .execute_webhook(endpoint.id, &endpoint.token, &body, files)
            .await?;
        Ok(self.to_model(wire).await?)
    }

    async fn edit_endpoint_message(
        &self,
        endpoint: &Endpoint,
        message: MessageId,
        content: &str,
    ) -> std::result::Result<(), TransportError> {
        self.rest
            .edit_webhook_message(endpoint.id, &endpoint.token, message, content)
            .await?;
        Ok(())
    }

    async fn delete_message(
        &self,
        channel: ChannelId,
        id: MessageId,
    ) -> std::result::Result<(), TransportError> {
        Ok(self.rest.delete_message(channel, id).await?)
    }

    async fn current_user(&self) -> std::result::Result<UserId, TransportError> {
        Ok(self.me().await?)
    }

    async fn send_notice(&self, channel: ChannelId, text: &str) -> std::result::Result<(), TransportError> {
        self.rest.create_message(channel, text).await?;
        Ok(())
    }
}
