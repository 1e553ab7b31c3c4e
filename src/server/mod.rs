//! Listening socket and server lifecycle.

pub mod lifecycle;
pub mod listener;

pub use lifecycle::{Lifecycle, LifecycleState};
pub use listener::{Proxy, ProxyContext};
