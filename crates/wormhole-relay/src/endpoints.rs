//! Per-channel delivery endpoints.
//!
//! Endpoints are created the first time a channel needs one and reused from
//! storage afterwards. The relay never deletes them on purpose.

use std::sync::Arc;

use tokio::sync::Mutex;

use wormhole_common::error::{TransportError, WormholeError, WormholeResult};
use wormhole_common::ids::ChannelId;
use wormhole_common::models::{Channel, Endpoint, EndpointProfile, Link};
use wormhole_db::Database;
use wormhole_db::repository::endpoints;

use crate::transport::Transport;

#[derive(Clone)]
pub struct EndpointRegistry {
    db: Database,
    transport: Arc<dyn Transport>,
    default_name: String,
    creating: Arc<Mutex<()>>,
}

impl EndpointRegistry {
    pub fn new(db: Database, transport: Arc<dyn Transport>, default_name: impl Into<String>) -> Self {
        Self {
            db,
            transport,
            default_name: default_name.into(),
            creating: Arc::new(Mutex::new(())),
        }
    }

    /// The stored endpoint of a channel, without touching the platform.
    pub async fn lookup(&self, channel: impl Into<ChannelId>) -> WormholeResult<Option<Endpoint>> {
        let channel = channel.into();
        let rows = endpoints::list_for_channel(&self.db.pool, channel).await?;
        if rows.len() > 1 {
            let ids = rows
                .iter()
                .map(|e| e.id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::error!(channel_id = %channel, endpoints = %ids, "Channel has more than one delivery endpoint");
        }
        Ok(rows.into_iter().next())
    }

    /// The channel's endpoint, created if missing or gone from the platform.
    ///
    /// `link` supplies the name and avatar overrides used at creation time.
    /// Fails with `MissingPermission` when the relay cannot manage webhooks
    /// in the channel.
    pub async fn get_or_create(&self, channel: &Channel, link: Option<&Link>) -> WormholeResult<Endpoint> {
        if let Some(endpoint) = self.verified(channel.id).await? {
            return Ok(endpoint);
        }

        // Serialize creation so concurrent events don't create duplicates.
        let _guard = self.creating.lock().await;
        if let Some(endpoint) = self.verified(channel.id).await? {
            return Ok(endpoint);
        }

        let permissions = self.transport.permissions_in(channel.id).await?;
        if !permissions.can_manage_endpoints() {
            return Err(missing_manage_webhooks());
        }

        let profile = EndpointProfile {
            name: link
                .and_then(|l| l.webhook_name.clone())
                .unwrap_or_else(|| self.default_name.clone()),
            avatar_url: link.and_then(|l| l.webhook_avatar.clone()),
        };
        let endpoint = match self.transport.create_endpoint(channel.id, &profile).await {
            Ok(endpoint) => endpoint,
            Err(TransportError::Forbidden(_)) => return Err(missing_manage_webhooks()),
            Err(e) => return Err(e.into()),
        };
        endpoints::insert_endpoint(&self.db.pool, &endpoint).await?;

        tracing::info!(
            channel = %channel.label(),
            endpoint_id = %endpoint.id,
            name = %profile.name,
            "Delivery endpoint created"
        );
        Ok(endpoint)
    }

    /// Stored endpoint that still exists remotely. Stale rows are dropped.
    async fn verified(&self, channel: ChannelId) -> WormholeResult<Option<Endpoint>> {
        let Some(stored) = self.lookup(channel).await? else {
            return Ok(None);
        };
        if self.transport.find_endpoint(channel, stored.id).await?.is_some() {
            return Ok(Some(stored));
        }

        tracing::warn!(channel_id = %channel, endpoint_id = %stored.id, "Stored delivery endpoint is gone, dropping it");
        endpoints::delete_endpoint(&self.db.pool, stored.id).await?;
        Ok(None)
    }
}

fn missing_manage_webhooks() -> WormholeError {
    WormholeError::MissingPermission {
        permission: "MANAGE_WEBHOOKS".into(),
    }
}
