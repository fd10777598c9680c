//! Admin model: a user allowed to manage a wormhole.

use serde::{Deserialize, Serialize};

use crate::ids::{UserId, WormholeId};

/// Grants a user management rights over one wormhole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Admin {
    pub wormhole_id: WormholeId,
    pub user_id: UserId,
}
