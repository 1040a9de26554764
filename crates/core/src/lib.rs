//! Core types and shared functionality for urlmeta.
//!
//! This crate provides:
//! - Metadata records and their status model
//! - SQLite-backed record store
//! - The fetcher contract and the record lifecycle manager
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod record;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use fetch::{FetchFailure, FetchOutcome, FetchedPage, Fetcher};
pub use lifecycle::Collector;
pub use record::{MetadataRecord, MetadataStatus, RecordState, StringMap};
pub use store::{MetadataDb, RetryPolicy, StoreTarget};
