//! Observability module for the gatekeeper.
//!
//! Provides metrics definitions and the Prometheus recorder.

pub mod metrics;
