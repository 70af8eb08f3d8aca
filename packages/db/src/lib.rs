//! SurrealDB integration for the job feed importer.
//!
//! This crate provides the database handle and repositories for
//! persisting jobs, import logs and queued tasks.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError};
pub use schema::init_schema;
