//! Reverse proxy functionality
//!
//! Credential injection, forwarding of plain requests to the target origin,
//! and byte-level bridging of WebSocket upgrades. A request in flight is
//! abandoned as soon as its client goes away.

pub mod auth;
pub mod client;
pub mod tunnel;
pub mod upstream;

pub use auth::{basic_auth_value, inject_credentials};
pub use client::{client_gone, stream_body};
pub use upstream::{Upstream, UpstreamResponse};
