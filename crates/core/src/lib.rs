//! Pure building blocks of the Koji message-bus bridge.
//!
//! Nothing in this crate performs I/O against the broker:
//!
//! - [`event`]: callback kinds and the [`Event`] record handed over by the hub.
//! - [`routing`]: routing-key derivation ([`derive_routing_key`]).
//! - [`payload`]: message body encoding ([`serialize`]).
//! - [`config`]: [`BrokerConfig`] and the [`ConfigSource`]s it is loaded from.

pub mod config;
pub mod error;
pub mod event;
pub mod payload;
pub mod routing;

pub use config::{AuthMechanism, BrokerConfig, ConfigSource, EnvConfigSource, ExchangeConfig};
pub use error::{ConfigError, EncodeError};
pub use event::{CallbackType, Event, Hook, Phase};
pub use payload::{serialize, PayloadFormat};
pub use routing::{derive_routing_key, RoutingKey, MAX_KEY_LENGTH};
