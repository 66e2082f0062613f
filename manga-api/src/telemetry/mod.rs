//! Manga API Telemetry
//!
//! Structured logging setup for the API binary.

pub mod tracer;

pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
