//! Platform client for the wormhole relay.
//!
//! [`RestTransport`] implements the relay's `Transport` trait over the REST
//! API. [`GatewayClient`] keeps the WebSocket session alive and broadcasts raw
//! dispatches, which [`EventTranslator`] turns into [`RelayEvent`]s.
//!
//! ```rust,no_run
//! use wormhole_gateway::{EventTranslator, GatewayClient};
//!
//! # async fn demo(config: &wormhole_common::config::PlatformConfig) {
//! let gateway = GatewayClient::new(&config.token, &config.gateway_url);
//! let translator = EventTranslator::new(&config.cdn_url, config.message_cache_size);
//! let mut events = gateway.subscribe();
//! gateway.connect();
//! while let Ok(event) = events.recv().await {
//!     for relay_event in translator.translate(&event).unwrap_or_default() {
//!         println!("{relay_event:?}");
//!     }
//! }
//! # }
//! ```

pub mod error;
pub mod events;
pub mod gateway;
pub mod permissions;
pub mod rest;
pub mod types;

pub use error::{GatewayError, Result};
pub use events::{EventTranslator, MessageCache, RelayEvent};
pub use gateway::{GatewayClient, GatewayEvent};
pub use rest::{RestClient, RestTransport};
