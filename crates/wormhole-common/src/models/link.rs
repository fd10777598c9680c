//! Link model: one channel's membership in one wormhole.

use serde::{Deserialize, Serialize};

use crate::ids::{ChannelId, WormholeId};

/// A link between a wormhole and a channel.
///
/// At most one link exists per `(wormhole_id, channel_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub wormhole_id: WormholeId,
    pub channel_id: ChannelId,
    /// The channel receives mirrored traffic from the wormhole.
    pub can_read: bool,
    /// Messages posted in the channel are relayed into the wormhole.
    pub can_write: bool,
    /// Display name used when the channel's delivery endpoint is created.
    pub webhook_name: Option<String>,
    /// Avatar URL used when the channel's delivery endpoint is created.
    pub webhook_avatar: Option<String>,
}

impl Link {
    pub fn new(
        wormhole_id: impl Into<WormholeId>,
        channel_id: impl Into<ChannelId>,
        can_read: bool,
        can_write: bool,
    ) -> Self {
        Self {
            wormhole_id: wormhole_id.into(),
            channel_id: channel_id.into(),
            can_read,
            can_write,
            webhook_name: None,
            webhook_avatar: None,
        }
    }
}

/// Read/write requirements when looking links up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkFilter {
    pub require_read: bool,
    pub require_write: bool,
}

impl LinkFilter {
    pub const ANY: Self = Self {
        require_read: false,
        require_write: false,
    };
    pub const READ: Self = Self {
        require_read: true,
        require_write: false,
    };
    pub const WRITE: Self = Self {
        require_read: false,
        require_write: true,
    };

    pub fn matches(&self, link: &Link) -> bool {
        (!self.require_read || link.can_read) && (!self.require_write || link.can_write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_matching() {
        let read_only = Link::new(WormholeId(1), ChannelId(10), true, false);
        let write_only = Link::new(WormholeId(1), ChannelId(11), false, true);

        assert!(LinkFilter::ANY.matches(&read_only));
        assert!(LinkFilter::READ.matches(&read_only));
        assert!(!LinkFilter::WRITE.matches(&read_only));
        assert!(LinkFilter::WRITE.matches(&write_only));
        assert!(!LinkFilter::READ.matches(&write_only));

        let both = LinkFilter {
            require_read: true,
            require_write: true,
        };
        assert!(both.matches(&Link::new(WormholeId(1), ChannelId(12), true, true)));
        assert!(!both.matches(&write_only));
    }
}
