//! Message identity without a mapping table.
//!
//! An original and its mirrors share one [`Fingerprint`]. A mirror's text is
//! first reduced to the original's text; both are then put through the same
//! decoration stripping and capped to
//! [`COMPARISON_CAP`](crate::content::COMPARISON_CAP) chars, so originals
//! that merely look decorated still match their mirrors. Finding the
//! mirror of a message in another channel means scanning a few messages on
//! either side of the original's timestamp for an equal fingerprint.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use wormhole_common::error::{TransportError, WormholeResult};
use wormhole_common::ids::{ChannelId, EndpointId};
use wormhole_common::models::{Message, MessageReference};

use crate::content::{comparison_form, extract_original_content, extract_reference};
use crate::endpoints::EndpointRegistry;
use crate::transport::{HistoryQuery, Transport};

/// Messages read on each side of the source timestamp.
pub const SEARCH_WINDOW: usize = 5;

/// Comparison form of a message's content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Comparison form of an original text. Anything shaped like a mirror
    /// decoration is stripped here as well.
    pub fn from_content(content: &str) -> Self {
        Self(comparison_form(extract_original_content(content)).to_owned())
    }

    /// Fingerprint `message`, given the delivery endpoint of its channel.
    pub fn of(message: &Message, endpoint: Option<EndpointId>) -> Self {
        Self::from_content(original_content(message, endpoint))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.0.as_bytes()).into()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.digest()[..8]))
    }
}

/// The original text of `message`: decorations are stripped only when the
/// channel's endpoint posted it.
pub fn original_content(message: &Message, endpoint: Option<EndpointId>) -> &str {
    match endpoint {
        Some(id) if message.is_authored_by_endpoint(id) => extract_original_content(&message.content),
        _ => &message.content,
    }
}

/// Correlates originals and mirrors across channels.
#[derive(Clone)]
pub struct IdentityResolver {
    transport: Arc<dyn Transport>,
    endpoints: EndpointRegistry,
    history_timeout: Duration,
}

impl IdentityResolver {
    pub fn new(
        transport: Arc<dyn Transport>,
        endpoints: EndpointRegistry,
        history_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            endpoints,
            history_timeout,
        }
    }

    async fn endpoint_of(&self, channel: ChannelId) -> WormholeResult<Option<EndpointId>> {
        Ok(self.endpoints.lookup(channel).await?.map(|e| e.id))
    }

    pub async fn fingerprint(&self, message: &Message) -> WormholeResult<Fingerprint> {
        let endpoint = self.endpoint_of(message.channel_id).await?;
        Ok(Fingerprint::of(message, endpoint))
    }

    /// Text of `message` without mirror decorations.
    pub async fn original_content<'m>(&self, message: &'m Message) -> WormholeResult<&'m str> {
        let endpoint = self.endpoint_of(message.channel_id).await?;
        Ok(original_content(message, endpoint))
    }

    /// Exact fingerprint equality.
    pub async fn equal(&self, a: &Message, b: &Message) -> WormholeResult<bool> {
        Ok(self.fingerprint(a).await? == self.fingerprint(b).await?)
    }

    /// What `message` replies to. A mirror carries its reply target in its
    /// reply line rather than as a platform reference.
    pub async fn reference_of(&self, message: &Message) -> WormholeResult<Option<MessageReference>> {
        let endpoint = self.endpoint_of(message.channel_id).await?;
        match endpoint {
            Some(id) if message.is_authored_by_endpoint(id) => {
                Ok(extract_reference(&message.content).map(MessageReference::from))
            }
            _ => Ok(message.reference.clone()),
        }
    }

    /// Find the counterpart of `message` in `destination`.
    ///
    /// Reads at most [`SEARCH_WINDOW`] messages after the source timestamp
    /// (oldest first), then at most [`SEARCH_WINDOW`] before it (newest
    /// first), and returns the first one with an equal fingerprint.
    pub async fn find_mirror_in(
        &self,
        message: &Message,
        destination: impl Into<ChannelId>,
    ) -> WormholeResult<Option<Message>> {
        let destination = destination.into();
        let target = self.fingerprint(message).await?;
        let endpoint = self.endpoint_of(destination).await?;

        let windows = [
            HistoryQuery::after(message.created_at, SEARCH_WINDOW),
            HistoryQuery::before(message.created_at, SEARCH_WINDOW),
        ];
        for query in &windows {
            let candidates = self.history(destination, query).await?;
            if let Some(found) = candidates
                .into_iter()
                .find(|candidate| Fingerprint::of(candidate, endpoint) == target)
            {
                tracing::debug!(
                    source = %message.id,
                    mirror = %found.id,
                    channel = %destination,
                    "Found mirror"
                );
                return Ok(Some(found));
            }
        }

        tracing::debug!(source = %message.id, channel = %destination, fingerprint = %target, "No mirror found");
        Ok(None)
    }

    async fn history(
        &self,
        channel: ChannelId,
        query: &HistoryQuery,
    ) -> Result<Vec<Message>, TransportError> {
        let mut messages =
            tokio::time::timeout(self.history_timeout, self.transport.history(channel, query))
                .await
                .map_err(|_| TransportError::Timeout)??;
        messages.truncate(query.limit);
        Ok(messages)
    }
}
