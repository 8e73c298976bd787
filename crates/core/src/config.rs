//! Broker configuration and the sources it is loaded from.
//!
//! The bridge re-reads its configuration every time it (re)connects, so
//! configuration is obtained through a [`ConfigSource`] rather than loaded
//! once at startup. [`EnvConfigSource`] reads environment variables and an
//! optional dotenv-style file; a [`BrokerConfig`] value is also a source that
//! always yields itself.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Default AMQP port.
const DEFAULT_PORT: u16 = 5672;

/// Default virtual host.
const DEFAULT_VHOST: &str = "/";

/// Default upper bound on connect + handshake.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default exchange type.
const DEFAULT_EXCHANGE_TYPE: &str = "topic";

/// Default routing-key prefix.
const DEFAULT_QUEUE_PREFIX: &str = "koji";

/// Default payload format.
const DEFAULT_FORMAT: &str = "json";

// ---------------------------------------------------------------------------
// BrokerConfig
// ---------------------------------------------------------------------------

/// Everything needed to reach the broker and address messages on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker hostname.
    pub host: String,
    /// Broker port (default `5672`).
    pub port: u16,
    /// Wrap the connection in TLS.
    pub ssl: bool,
    /// AMQP virtual host (default `/`).
    pub virtual_host: String,
    /// SASL mechanism, with credentials for `PLAIN`.
    pub auth: AuthMechanism,
    /// Upper bound on connect + handshake (default 10 s).
    pub connect_timeout: Duration,
    /// Exchange every message is published to.
    pub exchange: ExchangeConfig,
    /// First routing-key segment (default `koji`).
    pub routing_prefix: String,
    /// Payload format name (default `json`). Checked when encoding.
    pub format: String,
}

/// Exchange declaration parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    pub name: String,
    /// Exchange type, e.g. `topic`, `direct`, `fanout`, `headers`.
    pub kind: String,
    pub durable: bool,
}

impl BrokerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                           | Required            | Default |
    /// |-----------------------------------|---------------------|---------|
    /// | `MESSAGEBUS_BROKER_HOST`          | **yes**             | --      |
    /// | `MESSAGEBUS_BROKER_PORT`          | no                  | `5672`  |
    /// | `MESSAGEBUS_BROKER_SSL`           | no                  | `false` |
    /// | `MESSAGEBUS_BROKER_VHOST`         | no                  | `/`     |
    /// | `MESSAGEBUS_BROKER_AUTH`          | no                  | `PLAIN` |
    /// | `MESSAGEBUS_BROKER_USERNAME`      | when auth is `PLAIN`| --      |
    /// | `MESSAGEBUS_BROKER_PASSWORD`      | when auth is `PLAIN`| --      |
    /// | `MESSAGEBUS_CONNECT_TIMEOUT_SECS` | no                  | `10`    |
    /// | `MESSAGEBUS_EXCHANGE_NAME`        | **yes**             | --      |
    /// | `MESSAGEBUS_EXCHANGE_TYPE`        | no                  | `topic` |
    /// | `MESSAGEBUS_EXCHANGE_DURABLE`     | no                  | `true`  |
    /// | `MESSAGEBUS_QUEUE_PREFIX`         | no                  | `koji`  |
    /// | `MESSAGEBUS_FORMAT_ENCODING`      | no                  | `json`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let auth = match vars.get("MESSAGEBUS_BROKER_AUTH") {
            Some(name) => parse_auth(&vars, &name)?,
            None => parse_auth(&vars, "PLAIN")?,
        };

        Ok(Self {
            host: vars.required("MESSAGEBUS_BROKER_HOST")?,
            port: vars.parsed("MESSAGEBUS_BROKER_PORT", DEFAULT_PORT)?,
            ssl: vars.flag("MESSAGEBUS_BROKER_SSL", false)?,
            virtual_host: vars
                .get("MESSAGEBUS_BROKER_VHOST")
                .unwrap_or_else(|| DEFAULT_VHOST.to_string()),
            auth,
            connect_timeout: Duration::from_secs(
                vars.parsed("MESSAGEBUS_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
            ),
            exchange: ExchangeConfig {
                name: vars.required("MESSAGEBUS_EXCHANGE_NAME")?,
                kind: vars
                    .get("MESSAGEBUS_EXCHANGE_TYPE")
                    .unwrap_or_else(|| DEFAULT_EXCHANGE_TYPE.to_string()),
                durable: vars.flag("MESSAGEBUS_EXCHANGE_DURABLE", true)?,
            },
            routing_prefix: vars
                .get("MESSAGEBUS_QUEUE_PREFIX")
                .unwrap_or_else(|| DEFAULT_QUEUE_PREFIX.to_string()),
            format: vars
                .get("MESSAGEBUS_FORMAT_ENCODING")
                .unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// AuthMechanism
// ---------------------------------------------------------------------------

/// SASL mechanism used when opening the connection.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthMechanism {
    /// Username/password authentication.
    Plain { username: String, password: String },
    /// Authentication by TLS client certificate.
    External,
    Anonymous,
}

impl AuthMechanism {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain { .. } => "PLAIN",
            Self::External => "EXTERNAL",
            Self::Anonymous => "ANONYMOUS",
        }
    }
}

impl fmt::Debug for AuthMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain { username, .. } => f
                .debug_struct("Plain")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::External => f.write_str("External"),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

fn parse_auth<F>(vars: &Vars<F>, name: &str) -> Result<AuthMechanism, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match name.to_ascii_uppercase().as_str() {
        "PLAIN" => Ok(AuthMechanism::Plain {
            username: vars.required("MESSAGEBUS_BROKER_USERNAME")?,
            password: vars.required("MESSAGEBUS_BROKER_PASSWORD")?,
        }),
        "EXTERNAL" => Ok(AuthMechanism::External),
        "ANONYMOUS" => Ok(AuthMechanism::Anonymous),
        _ => Err(ConfigError::Invalid {
            var: "MESSAGEBUS_BROKER_AUTH",
            value: name.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Somewhere a [`BrokerConfig`] can be (re)loaded from.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<BrokerConfig, ConfigError>;
}

impl ConfigSource for BrokerConfig {
    fn load(&self) -> Result<BrokerConfig, ConfigError> {
        Ok(self.clone())
    }
}

/// Reads `MESSAGEBUS_*` variables from the environment and, optionally, a
/// dotenv-format file.
///
/// The file is read again on every [`load`](ConfigSource::load); variables
/// set in the process environment take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct EnvConfigSource {
    file: Option<PathBuf>,
}

impl EnvConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also read settings from `path` on every load.
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
        }
    }

    fn read_file(&self) -> Result<HashMap<String, String>, ConfigError> {
        let Some(path) = &self.file else {
            return Ok(HashMap::new());
        };
        let file_error = |source| ConfigError::File {
            path: path.clone(),
            source,
        };

        dotenvy::from_path_iter(path)
            .map_err(file_error)?
            .map(|item| item.map_err(file_error))
            .collect()
    }
}

impl ConfigSource for EnvConfigSource {
    fn load(&self) -> Result<BrokerConfig, ConfigError> {
        let file_vars = self.read_file()?;
        BrokerConfig::from_lookup(|var| {
            std::env::var(var)
                .ok()
                .or_else(|| file_vars.get(var).cloned())
        })
    }
}

// ---- private helpers ----

/// Typed accessors over a variable lookup.
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// A set, non-blank value.
    fn get(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        self.get(var).ok_or(ConfigError::Missing(var))
    }

    fn parsed<T: FromStr>(&self, var: &'static str, default: T) -> Result<T, ConfigError> {
        let Some(value) = self.get(var) else {
            return Ok(default);
        };
        match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(_) => Err(ConfigError::Invalid { var, value }),
        }
    }

    /// Booleans accept the usual ini spellings (`1/0`, `yes/no`, `on/off`).
    fn flag(&self, var: &'static str, default: bool) -> Result<bool, ConfigError> {
        let Some(value) = self.get(var) else {
            return Ok(default);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "yes" | "true" | "on" => Ok(true),
            "0" | "no" | "false" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { var, value }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
