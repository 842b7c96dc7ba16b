//! # cacheproxy
//!
//! A concurrent HTTP/1.0 forwarding proxy with a bounded in-memory LRU cache
//! of response bodies.
//!
//! Each client connection carries one request. `GET` and `HEAD` requests are
//! served from the cache when possible; otherwise they are forwarded to the
//! origin over a fresh connection, the response is relayed to the client as
//! it arrives, and small successful bodies are cached afterwards.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cacheproxy::config::ProxyConfig;
//! use cacheproxy::proxy::Proxy;
//! use cacheproxy::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProxyConfig::from_env()?.with_port(15213);
//!     config.validate()?;
//!     let server = Server::bind(format!("0.0.0.0:{}", config.listen_port), Proxy::new(config)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod http;
pub mod proxy;
pub mod server;

pub use cache::{MAX_CACHE_SIZE, MAX_OBJECT_SIZE, ObjectCache};
pub use config::{ConfigError, ProxyConfig};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use proxy::{Proxy, ProxyError};
pub use server::{Server, ServerError};
