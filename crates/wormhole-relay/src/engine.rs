//! Event orchestration: fan-out of creates, deletes and edits.
//!
//! Every handler follows the same shape. Find the wormholes the source
//! channel may write into, expand them into readable destination channels,
//! then act on each destination independently. A failure at one destination
//! is logged and never aborts the others, and nothing is retried.

use std::sync::Arc;

use wormhole_common::config::RelayConfig;
use wormhole_common::error::{WormholeError, WormholeResult};
use wormhole_common::ids::ChannelId;
use wormhole_common::models::{Channel, Link, LinkFilter, Message, MirrorPayload, Wormhole};
use wormhole_db::Database;

use crate::content::{ContentCodec, ReplyPreview};
use crate::endpoints::EndpointRegistry;
use crate::identity::IdentityResolver;
use crate::link_graph::LinkGraph;
use crate::suppression::SuppressionCache;
use crate::transport::Transport;

/// Why an event produced no work at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The channel writes into no wormhole.
    NotLinked,
    /// The message was posted through the channel's delivery endpoint.
    OwnEndpoint,
    /// The message was posted by the relay's own account, e.g. a notice.
    OwnUser,
    /// Another pass is already propagating this deletion.
    Suppressed,
    /// An update that did not touch the content.
    Unchanged,
}

/// Outcome of one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayReport {
    pub skipped: Option<SkipReason>,
    pub delivered: usize,
    pub deleted: usize,
    pub edited: usize,
    /// Destinations where the mirror could not be located
    pub unresolved: usize,
    /// Destinations abandoned because of an error
    pub failed: usize,
    /// Links removed because their channel became unreachable
    pub pruned: Vec<Link>,
    pub notices: usize,
}

impl RelayReport {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

/// A destination channel and every event wormhole link that leads to it.
struct Destination {
    channel_id: ChannelId,
    links: Vec<Link>,
}

pub struct RelayEngine {
    transport: Arc<dyn Transport>,
    graph: LinkGraph,
    endpoints: EndpointRegistry,
    identity: IdentityResolver,
    codec: ContentCodec,
    suppression: SuppressionCache,
}

impl RelayEngine {
    pub fn new(
        db: Database,
        transport: Arc<dyn Transport>,
        suppression: SuppressionCache,
        config: &RelayConfig,
        web_url: &str,
    ) -> Self {
        let endpoints =
            EndpointRegistry::new(db.clone(), Arc::clone(&transport), config.endpoint_name.clone());
        let identity = IdentityResolver::new(
            Arc::clone(&transport),
            endpoints.clone(),
            config.history_timeout(),
        );
        Self {
            graph: LinkGraph::new(db),
            codec: ContentCodec::new(web_url),
            transport,
            endpoints,
            identity,
            suppression,
        }
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn suppression(&self) -> &SuppressionCache {
        &self.suppression
    }

    // ── Create ───────────────────────────────────────────────────────────────

    /// Mirror a new message into every readable channel of its wormholes.
    pub async fn on_message_created(&self, message: &Message) -> WormholeResult<RelayReport> {
        let wormholes = self.writable_wormholes(message.channel_id).await?;
        if wormholes.is_empty() {
            return Ok(RelayReport::skipped(SkipReason::NotLinked));
        }
        if let Some(reason) = self.own_message(message).await? {
            return Ok(RelayReport::skipped(reason));
        }

        let mut report = RelayReport::default();
        let mut notice_sent = false;

        for destination in self.destinations(message.channel_id, &wormholes).await? {
            let Some(channel) = self.resolve(&destination, &mut report).await else {
                continue;
            };

            let endpoint = match self
                .endpoints
                .get_or_create(&channel, destination.links.first())
                .await
            {
                Ok(endpoint) => endpoint,
                Err(WormholeError::MissingPermission { permission }) => {
                    tracing::warn!(channel = %channel.label(), %permission, "Cannot create delivery endpoint");
                    report.failed += 1;
                    if !notice_sent {
                        notice_sent = true;
                        if self.send_permission_notice(message.channel_id, &channel).await {
                            report.notices += 1;
                        }
                    }
                    continue;
                }
                Err(e) => {
                    tracing::warn!(channel = %channel.label(), error = %e, "Failed to resolve delivery endpoint");
                    report.failed += 1;
                    continue;
                }
            };

            let preview = self.reply_preview(message, channel.id).await;
            let payload = MirrorPayload {
                content: self.codec.compose(message, preview.as_ref()),
                username: message.author.display_name.clone(),
                avatar_url: message.author.avatar_url.clone(),
                suppress_mentions: true,
                files: message.attachments.clone(),
                embeds: message.embeds.clone(),
            };

            match self.transport.execute_endpoint(&endpoint, &payload).await {
                Ok(mirror) => {
                    tracing::debug!(source = %message.id, mirror = %mirror.id, channel = %channel.label(), "Message mirrored");
                    report.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(source = %message.id, channel = %channel.label(), error = %e, "Delivery failed");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    // ── Delete ───────────────────────────────────────────────────────────────

    /// Delete the mirrors of a deleted message.
    ///
    /// Deleting a mirror raises its own delete event; the suppression cache
    /// swallows those echoes until the delay elapses.
    pub async fn on_message_deleted(&self, message: &Message) -> WormholeResult<RelayReport> {
        let wormholes = self.writable_wormholes(message.channel_id).await?;
        if wormholes.is_empty() {
            return Ok(RelayReport::skipped(SkipReason::NotLinked));
        }

        let fingerprint = self.identity.fingerprint(message).await?;
        if !self.suppression.claim(&fingerprint).await {
            tracing::debug!(message_id = %message.id, %fingerprint, "Deletion already being propagated");
            return Ok(RelayReport::skipped(SkipReason::Suppressed));
        }

        let result = self.propagate_delete(message, &wormholes).await;
        self.suppression.release_later(&fingerprint);
        result
    }

    async fn propagate_delete(
        &self,
        message: &Message,
        wormholes: &[Wormhole],
    ) -> WormholeResult<RelayReport> {
        let mut report = RelayReport::default();

        for destination in self.destinations(message.channel_id, wormholes).await? {
            let Some(channel) = self.resolve(&destination, &mut report).await else {
                continue;
            };

            let mirror = match self.identity.find_mirror_in(message, channel.id).await {
                Ok(Some(mirror)) => mirror,
                Ok(None) => {
                    report.unresolved += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(channel = %channel.label(), error = %e, "Mirror lookup failed");
                    report.failed += 1;
                    continue;
                }
            };

            match self.transport.delete_message(channel.id, mirror.id).await {
                Ok(()) => {
                    tracing::debug!(source = %message.id, mirror = %mirror.id, channel = %channel.label(), "Mirror deleted");
                    report.deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(mirror = %mirror.id, channel = %channel.label(), error = %e, "Failed to delete mirror");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    // ── Update ───────────────────────────────────────────────────────────────

    /// Carry an edit over to the mirrors of `before`.
    pub async fn on_message_updated(
        &self,
        before: &Message,
        after: &Message,
    ) -> WormholeResult<RelayReport> {
        let wormholes = self.writable_wormholes(after.channel_id).await?;
        if wormholes.is_empty() {
            return Ok(RelayReport::skipped(SkipReason::NotLinked));
        }
        if let Some(reason) = self.own_message(after).await? {
            return Ok(RelayReport::skipped(reason));
        }
        if before.content == after.content {
            return Ok(RelayReport::skipped(SkipReason::Unchanged));
        }

        let mut report = RelayReport::default();

        for destination in self.destinations(after.channel_id, &wormholes).await? {
            let Some(channel) = self.resolve(&destination, &mut report).await else {
                continue;
            };

            let endpoint = match self.endpoints.lookup(channel.id).await {
                Ok(Some(endpoint)) => endpoint,
                Ok(None) => {
                    report.unresolved += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(channel = %channel.label(), error = %e, "Failed to look up delivery endpoint");
                    report.failed += 1;
                    continue;
                }
            };

            let mirror = match self.identity.find_mirror_in(before, channel.id).await {
                Ok(Some(mirror)) if mirror.is_authored_by_endpoint(endpoint.id) => mirror,
                Ok(_) => {
                    report.unresolved += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!(channel = %channel.label(), error = %e, "Mirror lookup failed");
                    report.failed += 1;
                    continue;
                }
            };

            let preview = self.reply_preview(after, channel.id).await;
            let content = self.codec.compose(after, preview.as_ref());
            match self
                .transport
                .edit_endpoint_message(&endpoint, mirror.id, &content)
                .await
            {
                Ok(()) => {
                    tracing::debug!(source = %after.id, mirror = %mirror.id, channel = %channel.label(), "Mirror edited");
                    report.edited += 1;
                }
                Err(e) => {
                    tracing::warn!(mirror = %mirror.id, channel = %channel.label(), error = %e, "Failed to edit mirror");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    // ── Helpers ──────────────────────────────────────────────────────────────

    async fn writable_wormholes(&self, channel: ChannelId) -> WormholeResult<Vec<Wormhole>> {
        self.graph.wormholes_linked_to(channel, LinkFilter::WRITE).await
    }

    /// Whether the source channel's own endpoint posted the message.
    /// Whether the relay wrote `message` itself, either through an endpoint
    /// or as its own account.
    async fn own_message(&self, message: &Message) -> WormholeResult<Option<SkipReason>> {
        let endpoint = self.endpoints.lookup(message.channel_id).await?;
        if endpoint.is_some_and(|e| message.is_authored_by_endpoint(e.id)) {
            return Ok(Some(SkipReason::OwnEndpoint));
        }
        if message.author.bot && message.author.id == self.transport.current_user().await? {
            return Ok(Some(SkipReason::OwnUser));
        }
        Ok(None)
    }

    /// Readable channels of `wormholes` other than the source, each once.
    async fn destinations(
        &self,
        source: ChannelId,
        wormholes: &[Wormhole],
    ) -> WormholeResult<Vec<Destination>> {
        let mut destinations: Vec<Destination> = Vec::new();
        for wormhole in wormholes {
            for link in self.graph.links_for_wormhole(wormhole).await? {
                if !link.can_read || link.channel_id == source {
                    continue;
                }
                match destinations
                    .iter_mut()
                    .find(|d| d.channel_id == link.channel_id)
                {
                    Some(existing) => existing.links.push(link),
                    None => destinations.push(Destination {
                        channel_id: link.channel_id,
                        links: vec![link],
                    }),
                }
            }
        }
        Ok(destinations)
    }

    /// Resolve a destination channel, pruning its links if it is gone.
    async fn resolve(&self, destination: &Destination, report: &mut RelayReport) -> Option<Channel> {
        match self.transport.channel(destination.channel_id).await {
            Ok(Some(channel)) => Some(channel),
            Ok(None) => {
                self.prune(destination, report).await;
                None
            }
            Err(e) if e.is_unreachable() => {
                self.prune(destination, report).await;
                None
            }
            Err(e) => {
                tracing::warn!(channel_id = %destination.channel_id, error = %e, "Failed to resolve channel");
                report.failed += 1;
                None
            }
        }
    }

    async fn prune(&self, destination: &Destination, report: &mut RelayReport) {
        for link in &destination.links {
            match self.graph.remove_link(link.wormhole_id, link.channel_id).await {
                Ok(_) => {
                    tracing::warn!(
                        wormhole_id = %link.wormhole_id,
                        channel_id = %link.channel_id,
                        "Channel unreachable, link removed"
                    );
                    report.pruned.push(link.clone());
                }
                Err(e) => {
                    tracing::error!(
                        wormhole_id = %link.wormhole_id,
                        channel_id = %link.channel_id,
                        error = %e,
                        "Failed to remove stale link"
                    );
                }
            }
        }
    }

    /// Reply line for the mirror of `message` in `destination`, if it
    /// answers a message that can still be fetched.
    async fn reply_preview(&self, message: &Message, destination: ChannelId) -> Option<ReplyPreview> {
        let reference = match self.identity.reference_of(message).await {
            Ok(reference) => reference?,
            Err(e) => {
                tracing::debug!(message_id = %message.id, error = %e, "Failed to read reply reference");
                return None;
            }
        };

        let replied = match self
            .transport
            .fetch_message(reference.channel_id, reference.message_id)
            .await
        {
            Ok(replied) => replied?,
            Err(e) => {
                tracing::debug!(message_id = %reference.message_id, error = %e, "Replied-to message unavailable");
                return None;
            }
        };

        let mirror = match self.identity.find_mirror_in(&replied, destination).await {
            Ok(mirror) => mirror,
            Err(e) => {
                tracing::debug!(message_id = %replied.id, error = %e, "Replied-to mirror lookup failed");
                None
            }
        };
        let shown = mirror.as_ref().unwrap_or(&replied);
        let content = self
            .identity
            .original_content(shown)
            .await
            .unwrap_or(shown.content.as_str())
            .to_owned();

        Some(ReplyPreview {
            author: replied.author.display_name.clone(),
            jump_url: self.codec.jump_url(shown),
            content,
        })
    }

    /// Best-effort notice in the source channel. Returns whether it was sent.
    async fn send_permission_notice(&self, source: ChannelId, destination: &Channel) -> bool {
        let text = format!(
            "Wormhole: missing the Manage Webhooks permission in {}, messages cannot be relayed there.",
            destination.label()
        );
        match self.transport.send_notice(source, &text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(channel_id = %source, error = %e, "Failed to send permission notice");
                false
            }
        }
    }
}
