//! Authenticating reverse proxy
//!
//! Forwards HTTP requests and WebSocket upgrades to a single target origin,
//! adding a Basic `Authorization` header when the client did not send one.
//! A request for `/shutdown-proxy` stops the proxy.

pub mod config;
pub mod error;
pub mod http;
pub mod proxy;
pub mod server;

pub use config::Config;
pub use error::{ConfigError, ProxyError};
pub use server::{Lifecycle, LifecycleState, Proxy};
