//! Abstract chat-platform transport.
//!
//! Everything the relay needs from the platform: channel lookup, bounded
//! history reads, delivery endpoint management and message mutation. The
//! production implementation lives in `wormhole-gateway`; tests use an
//! in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use wormhole_common::error::TransportError;
use wormhole_common::ids::{ChannelId, EndpointId, MessageId, UserId};
use wormhole_common::models::{Channel, Endpoint, EndpointProfile, Message, MirrorPayload};
use wormhole_common::permissions::Permissions;

/// Direction in which history entries are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOrder {
    OldestFirst,
    NewestFirst,
}

/// A bounded history read.
///
/// `after` and `before` are exclusive bounds on message creation time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: usize,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub order: HistoryOrder,
}

impl HistoryQuery {
    /// The `limit` oldest messages created strictly after `at`.
    pub fn after(at: DateTime<Utc>, limit: usize) -> Self {
        Self {
            limit,
            after: Some(at),
            before: None,
            order: HistoryOrder::OldestFirst,
        }
    }

    /// The `limit` newest messages created strictly before `at`.
    pub fn before(at: DateTime<Utc>, limit: usize) -> Self {
        Self {
            limit,
            after: None,
            before: Some(at),
            order: HistoryOrder::NewestFirst,
        }
    }

    /// Whether a message falls inside the query's time bounds.
    pub fn admits(&self, created_at: DateTime<Utc>) -> bool {
        self.after.is_none_or(|after| created_at > after)
            && self.before.is_none_or(|before| created_at < before)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Resolve a channel. `Ok(None)` means it no longer exists or is hidden.
    async fn channel(&self, id: ChannelId) -> Result<Option<Channel>, TransportError>;

    /// Read a bounded slice of channel history.
    async fn history(
        &self,
        channel: ChannelId,
        query: &HistoryQuery,
    ) -> Result<Vec<Message>, TransportError>;

    async fn fetch_message(
        &self,
        channel: ChannelId,
        id: MessageId,
    ) -> Result<Option<Message>, TransportError>;

    /// The relay's own effective permissions in a channel.
    async fn permissions_in(&self, channel: ChannelId) -> Result<Permissions, TransportError>;

    /// Effective permissions of a member in a channel.
    async fn member_permissions(
        &self,
        channel: ChannelId,
        user: UserId,
    ) -> Result<Permissions, TransportError>;

    async fn create_endpoint(
        &self,
        channel: ChannelId,
        profile: &EndpointProfile,
    ) -> Result<Endpoint, TransportError>;

    /// Look a delivery endpoint up on the platform. `Ok(None)` if it is gone.
    async fn find_endpoint(
        &self,
        channel: ChannelId,
        id: EndpointId,
    ) -> Result<Option<Endpoint>, TransportError>;

    /// Post through an endpoint and return the created message.
    async fn execute_endpoint(
        &self,
        endpoint: &Endpoint,
        payload: &MirrorPayload,
    ) -> Result<Message, TransportError>;

    /// Replace the content of a message previously posted through `endpoint`.
    async fn edit_endpoint_message(
        &self,
        endpoint: &Endpoint,
        message: MessageId,
        content: &str,
    ) -> Result<(), TransportError>;

    async fn delete_message(&self, channel: ChannelId, id: MessageId)
    -> Result<(), TransportError>;

    /// The account the relay is logged in as.
    async fn current_user(&self) -> Result<UserId, TransportError>;

    /// Post a plain message as the relay itself.
    async fn send_notice(&self, channel: ChannelId, text: &str) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn query_bounds_are_exclusive() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let later = at + chrono::Duration::seconds(1);
        let earlier = at - chrono::Duration::seconds(1);

        let forward = HistoryQuery::after(at, 5);
        assert!(forward.admits(later));
        assert!(!forward.admits(at));
        assert!(!forward.admits(earlier));
        assert_eq!(forward.order, HistoryOrder::OldestFirst);

        let backward = HistoryQuery::before(at, 5);
        assert!(backward.admits(earlier));
        assert!(!backward.admits(at));
        assert_eq!(backward.order, HistoryOrder::NewestFirst);
    }
}
