//! Logging for the Medool client
//!
//! The client only emits `tracing` events; installing a subscriber is the
//! host application's call. [`init_tracing`] is a convenience for hosts
//! that do not bring their own.

pub mod logging;

pub use logging::{build_filter, init_tracing};
