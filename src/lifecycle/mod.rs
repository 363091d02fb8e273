//! Lifecycle management subsystem.
//!
//! Startup is orchestrated directly in `main`; this module owns the
//! graceful-shutdown coordinator shared by the server and background
//! tasks.

pub mod shutdown;

pub use shutdown::Shutdown;
