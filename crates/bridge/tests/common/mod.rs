//! In-memory broker used by the bridge integration tests.
//!
//! [`FakeConnector`] records every connect, session, exchange declaration
//! and publish in a shared [`FakeBroker`], and lets tests inject a failure
//! at each step.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use kojibus_bridge::{
    BrokerConnection, BrokerConnector, BrokerError, BrokerSession, ConnectionManager, Dispatcher,
    OutboundMessage,
};
use kojibus_core::{
    AuthMechanism, BrokerConfig, ConfigError, ConfigSource, ExchangeConfig,
};

// ---------------------------------------------------------------------------
// Recorded state
// ---------------------------------------------------------------------------

/// A message as the fake broker received it.
#[derive(Debug, Clone)]
pub struct Published {
    pub connection_id: usize,
    pub session: String,
    pub exchange: String,
    pub routing_key: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl Published {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("body should be JSON")
    }
}

/// Shared record of everything the fake broker saw, plus fault switches.
#[derive(Default)]
pub struct FakeBroker {
    pub connects: AtomicUsize,
    pub sessions_opened: AtomicUsize,
    pub sessions_closed: AtomicUsize,
    pub session_names: Mutex<Vec<String>>,
    pub declared: Mutex<Vec<ExchangeConfig>>,
    pub published: Mutex<Vec<Published>>,

    pub fail_connect: AtomicBool,
    pub fail_declare: AtomicBool,
    pub fail_publish: AtomicBool,
    pub fail_close: AtomicBool,
    pub panic_on_publish: AtomicBool,
    pub hang_declare: AtomicBool,
    /// Connections with an id at or below this value refuse new sessions.
    pub dead_up_to: AtomicUsize,
    /// Connections with an id at or below this value never finish opening
    /// a session.
    pub stuck_up_to: AtomicUsize,
    /// Every connection hangs when opening a session.
    pub hang_open_session: AtomicBool,
    /// Artificial connect latency in milliseconds.
    pub connect_delay_ms: AtomicUsize,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    /// Make every connection opened so far refuse new sessions.
    pub fn kill_connections(&self) {
        self.dead_up_to
            .store(self.connects.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    /// Make session opens on every connection opened so far hang.
    pub fn stall_connections(&self) {
        self.stuck_up_to
            .store(self.connects.load(Ordering::SeqCst), Ordering::SeqCst);
    }

    pub fn set(&self, flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Broker trait implementations
// ---------------------------------------------------------------------------

pub struct FakeConnector {
    pub broker: Arc<FakeBroker>,
}

impl BrokerConnector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self, config: &BrokerConfig) -> Result<FakeConnection, BrokerError> {
        let delay = self.broker.connect_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        if self.broker.fail_connect.load(Ordering::SeqCst) {
            return Err(BrokerError::Connect(format!(
                "connection refused by {}",
                config.host
            )));
        }

        let id = self.broker.connects.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FakeConnection {
            id,
            broker: Arc::clone(&self.broker),
        })
    }
}

pub struct FakeConnection {
    id: usize,
    broker: Arc<FakeBroker>,
}

impl BrokerConnection for FakeConnection {
    type Session = FakeSession;

    async fn open_session(&self, name: &str) -> Result<FakeSession, BrokerError> {
        if self.broker.hang_open_session.load(Ordering::SeqCst)
            || self.id <= self.broker.stuck_up_to.load(Ordering::SeqCst)
        {
            std::future::pending::<()>().await;
        }
        if self.id <= self.broker.dead_up_to.load(Ordering::SeqCst) {
            return Err(BrokerError::Session(format!(
                "connection {} is closed",
                self.id
            )));
        }

        self.broker.sessions_opened.fetch_add(1, Ordering::SeqCst);
        self.broker
            .session_names
            .lock()
            .unwrap()
            .push(name.to_string());

        Ok(FakeSession {
            connection_id: self.id,
            name: name.to_string(),
            broker: Arc::clone(&self.broker),
        })
    }
}

pub struct FakeSession {
    connection_id: usize,
    name: String,
    broker: Arc<FakeBroker>,
}

impl BrokerSession for FakeSession {
    fn name(&self) -> &str {
        &self.name
    }

    async fn declare_exchange(&self, exchange: &ExchangeConfig) -> Result<(), BrokerError> {
        if self.broker.hang_declare.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.broker.fail_declare.load(Ordering::SeqCst) {
            return Err(BrokerError::Declare(format!(
                "{}: access refused",
                exchange.name
            )));
        }
        self.broker.declared.lock().unwrap().push(exchange.clone());
        Ok(())
    }

    async fn publish(&self, message: OutboundMessage<'_>) -> Result<(), BrokerError> {
        if self.broker.panic_on_publish.load(Ordering::SeqCst) {
            panic!("fake broker exploded");
        }
        if self.broker.fail_publish.load(Ordering::SeqCst) {
            return Err(BrokerError::Publish("channel closed".to_string()));
        }

        self.broker.published.lock().unwrap().push(Published {
            connection_id: self.connection_id,
            session: self.name.clone(),
            exchange: message.exchange.to_string(),
            routing_key: message.routing_key.to_string(),
            content_type: message.content_type.to_string(),
            body: message.body.to_vec(),
        });
        Ok(())
    }

    async fn close(self) -> Result<(), BrokerError> {
        self.broker.sessions_closed.fetch_add(1, Ordering::SeqCst);
        if self.broker.fail_close.load(Ordering::SeqCst) {
            return Err(BrokerError::Close("already closed".to_string()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// A valid configuration pointing at a made-up broker.
pub fn test_config() -> BrokerConfig {
    BrokerConfig {
        host: "broker.test".to_string(),
        port: 5672,
        ssl: false,
        virtual_host: "/".to_string(),
        auth: AuthMechanism::Anonymous,
        connect_timeout: Duration::from_secs(2),
        exchange: ExchangeConfig {
            name: "koji.events".to_string(),
            kind: "topic".to_string(),
            durable: true,
        },
        routing_prefix: "koji".to_string(),
        format: "json".to_string(),
    }
}

/// Config source that counts loads and can be swapped out or broken.
#[derive(Clone)]
pub struct SharedSource {
    pub config: Arc<Mutex<Option<BrokerConfig>>>,
    pub loads: Arc<AtomicUsize>,
}

impl SharedSource {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config: Arc::new(Mutex::new(Some(config))),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn replace(&self, config: Option<BrokerConfig>) {
        *self.config.lock().unwrap() = config;
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ConfigSource for SharedSource {
    fn load(&self) -> Result<BrokerConfig, ConfigError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.config
            .lock()
            .unwrap()
            .clone()
            .ok_or(ConfigError::Missing("MESSAGEBUS_BROKER_HOST"))
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn manager(broker: &Arc<FakeBroker>, source: SharedSource) -> ConnectionManager<FakeConnector> {
    ConnectionManager::new(
        FakeConnector {
            broker: Arc::clone(broker),
        },
        source,
    )
}

pub fn dispatcher(broker: &Arc<FakeBroker>) -> Dispatcher<FakeConnector> {
    Dispatcher::new(manager(broker, SharedSource::new(test_config())))
}
