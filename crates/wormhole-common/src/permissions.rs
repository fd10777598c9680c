//! Channel permission bits as reported by the chat platform.
//!
//! Only the bits the relay and the management surface look at are named;
//! unknown bits are retained so values round-trip unchanged.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Effective permissions of a member (or of the relay itself) in a channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Permissions: u64 {
        /// Bypasses every channel override
        const ADMINISTRATOR        = 1 << 3;
        /// See the channel and read new messages
        const VIEW_CHANNEL         = 1 << 10;
        /// Post messages
        const SEND_MESSAGES        = 1 << 11;
        /// Delete or pin other members' messages
        const MANAGE_MESSAGES      = 1 << 13;
        /// Links get previews
        const EMBED_LINKS          = 1 << 14;
        /// Upload files
        const ATTACH_FILES         = 1 << 15;
        /// Read messages posted before joining
        const READ_MESSAGE_HISTORY = 1 << 16;
        /// Create, edit and delete channel webhooks
        const MANAGE_WEBHOOKS      = 1 << 29;

        const _ = !0;
    }
}

impl Permissions {
    fn has(self, required: Permissions) -> bool {
        self.contains(Self::ADMINISTRATOR) || self.contains(required)
    }

    /// Whether a delivery endpoint can be created in the channel.
    pub fn can_manage_endpoints(self) -> bool {
        self.has(Self::MANAGE_WEBHOOKS)
    }

    /// Whether a member may link or unlink the channel.
    pub fn can_manage_link(self) -> bool {
        self.has(Self::VIEW_CHANNEL | Self::MANAGE_MESSAGES)
    }

    /// Parse the decimal string form used on the wire.
    pub fn from_wire(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(Self::from_bits_retain)
    }
}
