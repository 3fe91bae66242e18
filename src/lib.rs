#![deny(missing_docs)]

//! Core library for the docdigest batch ingestion pipeline.

/// Environment-driven configuration management.
pub mod config;
/// Input dataset loading.
pub mod dataset;
/// Text extraction from stored document bytes.
pub mod extract;
/// Document transport abstraction and HTTP adapter.
pub mod fetch;
/// Structured logging and tracing setup.
pub mod logging;
/// Run-scoped ingestion metrics.
pub mod metrics;
/// Per-document pipeline and run orchestration.
pub mod processing;
/// Document record store abstraction and backends.
pub mod store;
