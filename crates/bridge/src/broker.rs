//! Broker client abstraction.
//!
//! The bridge only needs four things from a broker client: open a
//! connection, derive a short-lived session from it, declare an exchange
//! and publish one message. [`BrokerConnector`], [`BrokerConnection`] and
//! [`BrokerSession`] capture exactly that, so the connection lifecycle can
//! be driven (and tested) independently of the wire protocol. The AMQP
//! implementation lives in [`crate::amqp`].

use std::future::Future;

use kojibus_core::{BrokerConfig, ExchangeConfig};

/// Errors reported by a broker client.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Transport, TLS or handshake failure while opening a connection.
    #[error("Connection error: {0}")]
    Connect(String),

    /// A session could not be opened on an existing connection.
    #[error("Session error: {0}")]
    Session(String),

    /// The broker refused the exchange declaration.
    #[error("Exchange declare error: {0}")]
    Declare(String),

    /// The message could not be handed to the broker.
    #[error("Publish error: {0}")]
    Publish(String),

    /// Closing the session failed.
    #[error("Close error: {0}")]
    Close(String),
}

/// One message ready to go out on a session.
#[derive(Debug, Clone, Copy)]
pub struct OutboundMessage<'a> {
    pub exchange: &'a str,
    pub routing_key: &'a str,
    pub content_type: &'a str,
    pub body: &'a [u8],
}

/// Opens connections to a broker.
pub trait BrokerConnector: Send + Sync {
    type Connection: BrokerConnection;

    /// Connect and authenticate using `config`.
    fn connect(
        &self,
        config: &BrokerConfig,
    ) -> impl Future<Output = Result<Self::Connection, BrokerError>> + Send;
}

/// A long-lived, authenticated link to the broker.
pub trait BrokerConnection: Send + Sync {
    type Session: BrokerSession;

    /// Open a new session identified by `name`.
    fn open_session(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Self::Session, BrokerError>> + Send;
}

/// A single-use logical channel over a connection.
pub trait BrokerSession: Send {
    /// Name the session was opened with.
    fn name(&self) -> &str;

    /// Declare `exchange`; a no-op when it already exists with the same settings.
    fn declare_exchange(
        &self,
        exchange: &ExchangeConfig,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Publish one message. Delivery is not confirmed.
    fn publish(
        &self,
        message: OutboundMessage<'_>,
    ) -> impl Future<Output = Result<(), BrokerError>> + Send;

    /// Close the session.
    fn close(self) -> impl Future<Output = Result<(), BrokerError>> + Send
    where
        Self: Sized;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_connect() {
        let err = BrokerError::Connect("connection refused".to_string());
        assert_eq!(err.to_string(), "Connection error: connection refused");
    }

    #[test]
    fn display_publish() {
        let err = BrokerError::Publish("channel closed".to_string());
        assert_eq!(err.to_string(), "Publish error: channel closed");
    }
}
