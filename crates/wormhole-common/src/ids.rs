//! Snowflake ids and the per-entity coercions built on them.
//!
//! The chat platform identifies channels, users, guilds, messages and
//! webhooks with 64-bit Snowflakes: the upper 42 bits are a millisecond
//! timestamp relative to the platform epoch, which makes ids time-sortable.
//! Each entity gets its own newtype so a channel id can never be passed
//! where a user id is expected. Anything that names an entity (the model
//! type, a reference to it, or the raw integer) converts into its id through
//! `From`, and every storage or comparison operation goes through that single
//! coercion.
//!
//! Wormhole ids are different: they are assigned by storage, so they are
//! plain sequential integers and carry no timestamp.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Platform epoch (2015-01-01T00:00:00Z) in Unix milliseconds.
pub const PLATFORM_EPOCH_MS: u64 = 1_420_070_400_000;

/// Extract the creation timestamp encoded in a Snowflake.
pub fn extract_timestamp(raw: u64) -> Option<DateTime<Utc>> {
    let ms = (raw >> 22) + PLATFORM_EPOCH_MS;
    DateTime::from_timestamp_millis(i64::try_from(ms).ok()?)
}

/// Build the smallest Snowflake that could have been created at `at`.
///
/// Useful as a history cursor: every message created strictly after `at`
/// has an id greater than `snowflake_at(at)`.
pub fn snowflake_at(at: DateTime<Utc>) -> u64 {
    let ms = at.timestamp_millis().max(0) as u64;
    ms.saturating_sub(PLATFORM_EPOCH_MS) << 22
}

/// Platform ids travel as JSON strings (they overflow JavaScript numbers),
/// but some payloads and test fixtures use bare integers. Accept both.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSnowflake {
    Text(String),
    Number(u64),
}

fn deserialize_snowflake<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    match RawSnowflake::deserialize(de)? {
        RawSnowflake::Number(n) => Ok(n),
        RawSnowflake::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl $name {
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Creation time encoded in the id.
            pub fn timestamp(self) -> Option<DateTime<Utc>> {
                extract_timestamp(self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<&$name> for $name {
            fn from(id: &$name) -> Self {
                *id
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, ser: S) -> Result<S::Ok, S::Error> {
                ser.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
                deserialize_snowflake(de).map(Self)
            }
        }
    };
}

snowflake_id!(
    /// A text channel (or thread) on the platform.
    ChannelId
);
snowflake_id!(
    /// A guild (server) grouping channels.
    GuildId
);
snowflake_id!(
    /// A platform user.
    UserId
);
snowflake_id!(
    /// A message inside a channel.
    MessageId
);
snowflake_id!(
    /// A delivery endpoint (channel webhook). Messages posted through the
    /// endpoint report the endpoint id as their author id.
    EndpointId
);

/// Storage-assigned wormhole id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WormholeId(pub i64);

impl WormholeId {
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for WormholeId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl From<&WormholeId> for WormholeId {
    fn from(id: &WormholeId) -> Self {
        *id
    }
}

impl fmt::Display for WormholeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WormholeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_timestamp() {
        // Snowflake from the platform's public documentation.
        let ts = extract_timestamp(175_928_847_299_117_063).expect("should extract timestamp");
        assert_eq!(ts.timestamp_millis(), 1_462_015_105_796);
    }

    #[test]
    fn test_snowflake_at_is_lower_bound() {
        let id = ChannelId(175_928_847_299_117_063);
        let at = id.timestamp().unwrap();
        let cursor = snowflake_at(at);
        assert!(cursor <= id.get());
        assert_eq!(extract_timestamp(cursor), Some(at));
    }

    #[test]
    fn test_ids_accept_string_and_number() {
        let a: UserId = serde_json::from_str("\"80351110224678912\"").unwrap();
        let b: UserId = serde_json::from_str("80351110224678912").unwrap();
        assert_eq!(a, b);
        assert_eq!(serde_json::to_string(&a).unwrap(), "\"80351110224678912\"");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(" 42 ".parse::<ChannelId>().unwrap(), ChannelId(42));
        assert_eq!("7".parse::<WormholeId>().unwrap(), WormholeId(7));
        assert!("abc".parse::<MessageId>().is_err());
    }
}
