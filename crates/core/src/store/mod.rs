//! SQLite-backed store for metadata records.
//!
//! This module provides durable, URL-keyed storage using SQLite with async
//! access via tokio-rusqlite. It supports:
//!
//! - Atomic upsert and insert-if-absent keyed on a unique URL index
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Startup connection retries and a liveness probe

pub mod connection;
pub mod migrations;
pub mod records;

pub use crate::Error;

pub use connection::{MetadataDb, RetryPolicy, StoreTarget, is_valid_table_name};
