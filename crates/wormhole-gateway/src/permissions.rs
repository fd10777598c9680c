//! Effective channel permissions from guild roles and channel overwrites.
//!
//! Base permissions are the `@everyone` role (whose id equals the guild id)
//! OR'ed with every role the member holds. Guild owners and administrators get
//! everything. Otherwise the channel's overwrites apply in order: `@everyone`,
//! then the member's roles combined, then the member itself.

use wormhole_common::ids::UserId;
use wormhole_common::permissions::Permissions;

use crate::types::{OverwriteKind, WireGuild, WireOverwrite};

pub fn compute_permissions(
    guild: &WireGuild,
    overwrites: &[WireOverwrite],
    user: UserId,
    member_roles: &[String],
) -> Permissions {
    if guild.owner_id == user {
        return Permissions::all();
    }

    let everyone = guild.id.to_string();
    let role_bits = |id: &str| {
        guild
            .roles
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| Permissions::from_wire(&r.permissions))
            .unwrap_or_else(Permissions::empty)
    };

    let mut perms = role_bits(&everyone);
    for role in member_roles {
        perms |= role_bits(role);
    }
    if perms.contains(Permissions::ADMINISTRATOR) {
        return Permissions::all();
    }

    if let Some(ow) = overwrites.iter().find(|o| o.id == everyone) {
        perms = apply(perms, allow_of(ow), deny_of(ow));
    }

    let (mut allow, mut deny) = (Permissions::empty(), Permissions::empty());
    for ow in overwrites
        .iter()
        .filter(|o| o.kind == OverwriteKind::Role && member_roles.contains(&o.id))
    {
        allow |= allow_of(ow);
        deny |= deny_of(ow);
    }
    perms = apply(perms, allow, deny);

    let user_id = user.to_string();
    if let Some(ow) = overwrites
        .iter()
        .find(|o| o.kind == OverwriteKind::Member && o.id == user_id)
    {
        perms = apply(perms, allow_of(ow), deny_of(ow));
    }

    perms
}

fn apply(perms: Permissions, allow: Permissions, deny: Permissions) -> Permissions {
    (perms - deny) | allow
}

fn allow_of(ow: &WireOverwrite) -> Permissions {
    Permissions::from_wire(&ow.allow).unwrap_or_else(Permissions::empty)
}

fn deny_of(ow: &WireOverwrite) -> Permissions {
    Permissions::from_wire(&ow.deny).unwrap_or_else(Permissions::empty)
}
