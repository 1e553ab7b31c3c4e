//! HTTP/1.x plumbing for the proxy.
//!
//! - **`body`**: incremental body boundaries for streamed request bodies
//! - **`connection`**: per-client state machine
//! - **`headers`**: ordered, case-insensitive header list
//! - **`parser`**: request-head and response-head parsers
//! - **`request`**: request representation
//! - **`response`**: proxy-generated responses and relayed response heads
//! - **`writer`**: serialization back onto the wire
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← Wait for a complete request head
//!        └──────┬──────┘
//!               │ Request parsed              malformed → Responding (400)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Shutdown path? inject credentials
//!        └──────┬───────────┘
//!               ├─ /shutdown-proxy → Closed (no response)
//!               ├─ Upgrade → Upgrading → bridge until close → Closed
//!               ▼
//!        ┌──────────────────┐
//!        │   Forwarding     │ ← Stream body upstream, stream response back
//!        └──────┬───────────┘       upstream unreachable → Responding (502)
//!               ├─ client gone → Closed (upstream dropped)
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed
//! ```

pub mod body;
pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
