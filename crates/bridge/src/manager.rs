//! Lazily established, self-healing broker connection.
//!
//! [`ConnectionManager`] owns the single connection shared by every
//! notification and hands out one fresh session per call to
//! [`get_session`](ConnectionManager::get_session). The connection is only
//! opened when first needed. When a session cannot be derived from it the
//! connection is considered dead: it is dropped (not closed, the transport
//! may already be gone) and a new one is established on the same call, with
//! the configuration re-read from its source.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use kojibus_core::{BrokerConfig, ConfigError, ConfigSource};

use crate::broker::{BrokerConnection, BrokerConnector, BrokerError, BrokerSession};

/// Prefix of every session name; a UUID v4 follows it.
pub const SESSION_NAME_PREFIX: &str = "koji";

/// Session type produced by a connector's connections.
pub type SessionOf<C> = <<C as BrokerConnector>::Connection as BrokerConnection>::Session;

/// A session together with the configuration of the connection it came from.
pub struct AcquiredSession<S> {
    pub session: S,
    pub config: Arc<BrokerConfig>,
}

/// Owns the shared broker connection.
///
/// The check-then-connect sequence runs under one async mutex, so callers
/// racing on a missing connection establish it exactly once.
pub struct ConnectionManager<C: BrokerConnector> {
    connector: C,
    source: Box<dyn ConfigSource>,
    live: Mutex<Option<LiveConnection<C::Connection>>>,
}

/// The current connection and the configuration it was opened with.
struct LiveConnection<T> {
    connection: T,
    config: Arc<BrokerConfig>,
}

impl<C: BrokerConnector> ConnectionManager<C> {
    /// Create a manager; nothing is loaded or connected until first use.
    pub fn new(connector: C, source: impl ConfigSource + 'static) -> Self {
        Self {
            connector,
            source: Box::new(source),
            live: Mutex::new(None),
        }
    }

    /// Return a session ready to publish one message.
    ///
    /// Reuses the cached connection when it still yields sessions, otherwise
    /// reloads the configuration, reconnects and declares the exchange.
    /// Opening a session on the cached connection and establishing a new one
    /// are each bounded by the configured connect timeout; a session that
    /// does not open in time counts as a dead connection. Failures to
    /// establish a new connection are returned to the caller.
    pub async fn get_session(&self) -> Result<AcquiredSession<SessionOf<C>>, ManagerError> {
        let mut live = self.live.lock().await;

        if let Some(current) = live.as_ref() {
            let name = session_name();
            let limit = current.config.connect_timeout;
            match tokio::time::timeout(limit, current.connection.open_session(&name)).await {
                Ok(Ok(session)) => {
                    return Ok(AcquiredSession {
                        session,
                        config: Arc::clone(&current.config),
                    });
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        session = %name,
                        error = %e,
                        "Error getting session, will reconnect",
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        session = %name,
                        timeout = ?limit,
                        "Timed out getting session, will reconnect",
                    );
                }
            }
        }
        *live = None;

        let config = Arc::new(self.source.load()?);
        let (connection, session) =
            match tokio::time::timeout(config.connect_timeout, self.establish(&config)).await {
                Ok(established) => established?,
                Err(_) => return Err(ManagerError::Timeout(config.connect_timeout)),
            };

        tracing::info!(
            host = %config.host,
            port = config.port,
            ssl = config.ssl,
            exchange = %config.exchange.name,
            "Connected to message broker",
        );

        *live = Some(LiveConnection {
            connection,
            config: Arc::clone(&config),
        });

        Ok(AcquiredSession { session, config })
    }

    /// Whether a connection is currently cached.
    pub async fn is_connected(&self) -> bool {
        self.live.lock().await.is_some()
    }

    /// Drop the cached connection; the next [`get_session`](Self::get_session)
    /// reconnects.
    pub async fn disconnect(&self) {
        if self.live.lock().await.take().is_some() {
            tracing::info!("Dropped message broker connection");
        }
    }

    // ---- private helpers ----

    /// Connect, open the first session and declare the exchange on it.
    ///
    /// The caller bounds the whole sequence by the connect timeout.
    async fn establish(
        &self,
        config: &BrokerConfig,
    ) -> Result<(C::Connection, SessionOf<C>), ManagerError> {
        let connection = self
            .connector
            .connect(config)
            .await
            .map_err(ManagerError::Connect)?;

        let session = connection
            .open_session(&session_name())
            .await
            .map_err(ManagerError::Session)?;
        session
            .declare_exchange(&config.exchange)
            .await
            .map_err(ManagerError::DeclareExchange)?;

        Ok((connection, session))
    }
}

/// A fresh, unique session name.
fn session_name() -> String {
    format!("{SESSION_NAME_PREFIX}-{}", Uuid::new_v4())
}

/// Failures to obtain a session.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The configuration could not be (re)loaded.
    #[error("Failed to load broker configuration: {0}")]
    Config(#[from] ConfigError),

    /// Transport or handshake failure.
    #[error("Failed to connect to message broker: {0}")]
    Connect(#[source] BrokerError),

    /// Connecting, opening the first session and declaring the exchange
    /// did not finish in time.
    #[error("Timed out connecting to message broker after {0:?}")]
    Timeout(Duration),

    /// The new connection could not open its first session.
    #[error("Failed to open session on new connection: {0}")]
    Session(#[source] BrokerError),

    /// The exchange could not be declared on the new connection.
    #[error("Failed to declare exchange: {0}")]
    DeclareExchange(#[source] BrokerError),
}
