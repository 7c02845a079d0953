#![deny(missing_docs)]

//! Core library for Billwatch, the legislative bill ingestion pipeline.

/// Bill identity parsing and version lifecycle ordering.
pub mod bill;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Semantic index contract used by ingestion and the sweepers.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Bill XML parsing and prose extraction.
pub mod markup;
/// Enrichment pipeline: gates, chunking, retries, and orchestration.
pub mod processing;
/// Qdrant vector store integration.
pub mod qdrant;
/// Bulk data manifest and document fetching.
pub mod source;
/// SQLite persistence for bills, versions, audit records, and the watermark.
pub mod storage;
/// Summarization service client.
pub mod summarization;
/// Consistency sweeps between the store and the semantic index.
pub mod sweeper;
