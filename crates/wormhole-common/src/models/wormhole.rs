//! Wormhole model: a named relay group connecting several channels.

use std::fmt;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::ids::WormholeId;

/// A wormhole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wormhole {
    pub id: WormholeId,
    pub name: String,
    /// Reserved: stored and displayed, but the relay never branches on it.
    pub sync_threads: bool,
}

impl From<&Wormhole> for WormholeId {
    fn from(wormhole: &Wormhole) -> Self {
        wormhole.id
    }
}

impl fmt::Display for Wormhole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (id:{})", self.name, self.id)
    }
}

/// Open a new wormhole.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OpenWormholeRequest {
    #[validate(length(min = 1, max = 64, message = "Wormhole name must be 1-64 characters"))]
    pub name: String,
    #[serde(default = "default_sync_threads")]
    pub sync_threads: bool,
}

fn default_sync_threads() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_id() {
        let wh = Wormhole {
            id: WormholeId(3),
            name: "Nebula".into(),
            sync_threads: true,
        };
        assert_eq!(wh.to_string(), "Nebula (id:3)");
        assert_eq!(WormholeId::from(&wh), WormholeId(3));
    }

    #[test]
    fn sync_threads_defaults_on() {
        let req: OpenWormholeRequest = serde_json::from_str(r#"{"name":"Nebula"}"#).unwrap();
        assert!(req.sync_threads);
    }
}
