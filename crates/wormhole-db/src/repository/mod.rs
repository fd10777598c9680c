//! Repository layer: query functions organized by table.

pub mod admins;
pub mod endpoints;
pub mod links;
pub mod wormholes;
