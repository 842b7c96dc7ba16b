//! Runtime configuration.
//!
//! Values start from defaults, may be overlaid by a JSON file named in
//! `PROXY_CONFIG`, then by individual `PROXY_*` environment variables. The
//! listening port normally comes from the command line.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::cache::{MAX_CACHE_SIZE, MAX_OBJECT_SIZE};
use crate::http::codec::{DEFAULT_MAX_HEADER_LINES, DEFAULT_MAX_LINE_LENGTH, FrameLimits};

/// The `User-Agent` sent to every origin.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:10.0.3) Gecko/20120305 Firefox/10.0.3";

/// Problems loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value {value:?} for {var}")]
    Env { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// TCP port to accept client connections on
    pub listen_port: u16,
    /// Budget for the sum of cached body sizes, in bytes
    pub max_cache_size: usize,
    /// Largest cacheable body, in bytes
    pub max_object_size: usize,
    /// Longest accepted start or header line, in bytes
    pub max_line_length: usize,
    /// Most header lines accepted in one message head
    pub max_header_lines: usize,
    /// Deadline for establishing an origin connection
    pub connect_timeout_ms: u64,
    /// Deadline for each read on client and origin sockets
    pub read_timeout_ms: u64,
    /// Deadline for each write on client and origin sockets
    pub write_timeout_ms: u64,
    /// Deadline for receiving a client's complete request head
    pub head_timeout_ms: u64,
    /// `User-Agent` value forced on forwarded requests
    pub user_agent: String,
    /// When set, every origin connection is made to this `host:port`
    pub origin_override: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_port: 15213,
            max_cache_size: MAX_CACHE_SIZE,
            max_object_size: MAX_OBJECT_SIZE,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_header_lines: DEFAULT_MAX_HEADER_LINES,
            connect_timeout_ms: 5_000,
            read_timeout_ms: 30_000,
            write_timeout_ms: 30_000,
            head_timeout_ms: 60_000,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            origin_override: None,
        }
    }
}

impl ProxyConfig {
    /// Loads configuration from `PROXY_CONFIG` and `PROXY_*` variables.
    ///
    /// # Environment Variables
    /// - `PROXY_CONFIG` - Path to a JSON file with any subset of the fields
    /// - `PROXY_MAX_CACHE_SIZE` - Cache budget in bytes (default: 1049000)
    /// - `PROXY_MAX_OBJECT_SIZE` - Object limit in bytes (default: 102400)
    /// - `PROXY_CONNECT_TIMEOUT_MS` - Origin connect deadline (default: 5000)
    /// - `PROXY_READ_TIMEOUT_MS` - Per-read deadline (default: 30000)
    /// - `PROXY_WRITE_TIMEOUT_MS` - Per-write deadline (default: 30000)
    /// - `PROXY_HEAD_TIMEOUT_MS` - Whole request head deadline (default: 60000)
    /// - `PROXY_ORIGIN_OVERRIDE` - Fixed `host:port` for all origin traffic
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match env::var("PROXY_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };

        if let Some(v) = env_parse("PROXY_MAX_CACHE_SIZE")? {
            config.max_cache_size = v;
        }
        if let Some(v) = env_parse("PROXY_MAX_OBJECT_SIZE")? {
            config.max_object_size = v;
        }
        if let Some(v) = env_parse("PROXY_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout_ms = v;
        }
        if let Some(v) = env_parse("PROXY_READ_TIMEOUT_MS")? {
            config.read_timeout_ms = v;
        }
        if let Some(v) = env_parse("PROXY_WRITE_TIMEOUT_MS")? {
            config.write_timeout_ms = v;
        }
        if let Some(v) = env_parse("PROXY_HEAD_TIMEOUT_MS")? {
            config.head_timeout_ms = v;
        }
        if let Ok(v) = env::var("PROXY_ORIGIN_OVERRIDE") {
            config.origin_override = Some(v).filter(|v| !v.trim().is_empty());
        }

        Ok(config)
    }

    /// Reads a JSON config file; absent fields keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Returns a copy listening on `port`.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_cache_size == 0 || self.max_object_size == 0 {
            return Err(ConfigError::Invalid("cache sizes must be non-zero".into()));
        }
        if self.max_object_size > self.max_cache_size {
            return Err(ConfigError::Invalid(format!(
                "max_object_size ({}) exceeds max_cache_size ({})",
                self.max_object_size, self.max_cache_size
            )));
        }
        if self.max_line_length == 0 || self.max_header_lines == 0 {
            return Err(ConfigError::Invalid("framing limits must be non-zero".into()));
        }
        if self.connect_timeout_ms == 0
            || self.read_timeout_ms == 0
            || self.write_timeout_ms == 0
            || self.head_timeout_ms == 0
        {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Overall deadline for a client's request line and headers, however
    /// slowly the bytes arrive.
    pub fn head_timeout(&self) -> Duration {
        Duration::from_millis(self.head_timeout_ms)
    }

    /// Framing limits applied to both client and origin sockets.
    pub fn frame_limits(&self) -> FrameLimits {
        FrameLimits {
            max_line_length: self.max_line_length,
            max_header_lines: self.max_header_lines,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            write_timeout: Duration::from_millis(self.write_timeout_ms),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value }),
        Err(_) => Ok(None),
    }
}
