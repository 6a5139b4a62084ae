//! Observability for strata: subscriber setup and optional OpenTelemetry export.

pub mod tracing_setup;
