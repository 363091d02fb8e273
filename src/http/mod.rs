//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → request.rs (stamp x-request-id)
//!     → server.rs gateway_handler:
//!         rate_limit (admit or 429)
//!         → load_balancer / hash_ring (pick backend or 503)
//!         → hyper client (forward verbatim)
//!     → response (id propagated back)
//! ```

pub mod request;
pub mod server;

pub use server::HttpServer;
