//! Health checking subsystem.
//!
//! Active probes (active.rs) run on a timer; passive signals come from
//! forward outcomes in the dispatcher. Both feed the same per-backend
//! streak counters, so either source can flip a health flag.

pub mod active;

pub use active::HealthMonitor;
