//! Per-event publishing entry point.
//!
//! [`Dispatcher::notify`] is what the hub's callback calls for every event.
//! It acquires a session, derives the routing key and body, publishes and
//! closes the session. Notifications are best effort: any failure along the
//! way (including a panic) is logged with the event kind and the stage it
//! happened in, and never reaches the caller.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::task::JoinHandle;

use kojibus_core::{derive_routing_key, EncodeError, EnvConfigSource, Event, PayloadFormat, RoutingKey};

use crate::amqp::AmqpConnector;
use crate::broker::{BrokerConnector, BrokerError, BrokerSession, OutboundMessage};
use crate::manager::{AcquiredSession, ConnectionManager, ManagerError};

/// Step of the publish pipeline, reported when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    AcquireSession,
    Encode,
    Publish,
    CloseSession,
}

impl DispatchStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AcquireSession => "acquire_session",
            Self::Encode => "encode",
            Self::Publish => "publish",
            Self::CloseSession => "close_session",
        }
    }
}

/// Why a notification was dropped.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    AcquireSession(#[from] ManagerError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Failed to publish message: {0}")]
    Publish(#[source] BrokerError),

    #[error("Failed to close session: {0}")]
    CloseSession(#[source] BrokerError),
}

impl DispatchError {
    pub fn stage(&self) -> DispatchStage {
        match self {
            Self::AcquireSession(_) => DispatchStage::AcquireSession,
            Self::Encode(_) => DispatchStage::Encode,
            Self::Publish(_) => DispatchStage::Publish,
            Self::CloseSession(_) => DispatchStage::CloseSession,
        }
    }
}

/// Publishes hub events to the configured exchange.
pub struct Dispatcher<C: BrokerConnector> {
    manager: ConnectionManager<C>,
}

impl Dispatcher<AmqpConnector> {
    /// AMQP dispatcher configured from `MESSAGEBUS_*` environment variables.
    ///
    /// Configuration is read on first use, not here.
    pub fn amqp_from_env() -> Self {
        Self::new(ConnectionManager::new(AmqpConnector::new(), EnvConfigSource::new()))
    }
}

impl<C: BrokerConnector> Dispatcher<C> {
    pub fn new(manager: ConnectionManager<C>) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    /// Publish one event. Never fails and never panics.
    pub async fn notify(&self, event: Event) {
        let outcome = AssertUnwindSafe(self.try_notify(&event))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(routing_key)) => {
                tracing::debug!(
                    kind = %event.kind,
                    routing_key = %routing_key,
                    "Notification published",
                );
            }
            Ok(Err(e)) => {
                tracing::error!(
                    kind = %event.kind,
                    stage = e.stage().as_str(),
                    error = %e,
                    "Failed to send notification",
                );
            }
            Err(_) => {
                tracing::error!(kind = %event.kind, "Notification dispatch panicked");
            }
        }
    }

    /// Publish one event on a background task so the caller never waits on
    /// broker I/O.
    pub fn notify_detached(self: &Arc<Self>, event: Event) -> JoinHandle<()>
    where
        C: 'static,
    {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.notify(event).await })
    }

    /// Run the pipeline, returning the routing key used on success.
    pub async fn try_notify(&self, event: &Event) -> Result<RoutingKey, DispatchError> {
        let AcquiredSession { session, config } = self.manager.get_session().await?;

        let encoded = derive_routing_key(&config.routing_prefix, event).and_then(|key| {
            let format: PayloadFormat = config.format.parse()?;
            Ok((key, format, format.encode(event)?))
        });
        let (routing_key, format, body) = match encoded {
            Ok(encoded) => encoded,
            Err(e) => {
                close_quietly(session).await;
                return Err(e.into());
            }
        };

        let published = session
            .publish(OutboundMessage {
                exchange: &config.exchange.name,
                routing_key: routing_key.as_str(),
                content_type: format.content_type(),
                body: &body,
            })
            .await;
        let closed = session.close().await;

        published.map_err(DispatchError::Publish)?;
        closed.map_err(DispatchError::CloseSession)?;
        Ok(routing_key)
    }
}

/// Close a session whose message will not be sent.
async fn close_quietly<S: BrokerSession>(session: S) {
    let name = session.name().to_string();
    if let Err(e) = session.close().await {
        tracing::debug!(session = %name, error = %e, "Failed to close unused session");
    }
}
