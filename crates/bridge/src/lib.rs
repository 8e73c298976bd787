//! Koji message-bus bridge.
//!
//! Republishes hub callback events as messages on a broker exchange:
//!
//! - [`Dispatcher`]: per-event entry point; publishes and swallows failures.
//! - [`ConnectionManager`]: lazily opened, self-healing shared connection.
//! - [`broker`]: the client abstraction the manager drives.
//! - [`amqp`]: the `lapin`-based AMQP 0-9-1 client.
//! - [`telemetry`]: tracing subscriber setup.
//!
//! ```no_run
//! use kojibus_bridge::Dispatcher;
//! use kojibus_core::Event;
//! use serde_json::json;
//!
//! # async fn run() {
//! let dispatcher = Dispatcher::amqp_from_env();
//! let event = Event::new("postTag").with_attributes(json!({
//!     "tag": {"name": "f30"},
//!     "build": {"name": "bash", "version": "5.0", "release": "1"},
//!     "user": {"name": "alice"},
//! }));
//! dispatcher.notify(event).await;
//! # }
//! ```

pub mod amqp;
pub mod broker;
pub mod dispatcher;
pub mod manager;
pub mod telemetry;

pub use amqp::AmqpConnector;
pub use broker::{BrokerConnection, BrokerConnector, BrokerError, BrokerSession, OutboundMessage};
pub use dispatcher::{DispatchError, DispatchStage, Dispatcher};
pub use manager::{AcquiredSession, ConnectionManager, ManagerError};
