//! # sqlx-sqlite-conn-mgr
//!
//! A minimal wrapper around SQLx that provisions SQLite connections for the
//! data-access layer built on top of it.
//!
//! ## Core Types
//!
//! - **[`SqliteDatabase`]**: Main database type with separate read and write connection pools
//! - **[`SqliteDatabaseConfig`]**: Configuration for connection pool settings
//! - **[`WriteGuard`]**: RAII guard ensuring exclusive write access
//! - **[`Dialect`]**: Native type names of the engine the handle is bound to
//! - **[`Error`]**: Error type for database operations
//!
//! ## Architecture
//!
//! - **Dual pools**: Separate read-only pool and write pool (max 1 connection)
//! - **Lazy WAL mode**: Write-Ahead Logging enabled automatically on first write
//! - **Exclusive writes**: Single-connection write pool enforces serialized write access
//! - **Concurrent reads**: Multiple readers can query simultaneously via the read pool

mod config;
mod database;
mod dialect;
mod error;
mod write_guard;

// Re-export public types
pub use config::SqliteDatabaseConfig;
pub use database::SqliteDatabase;
pub use dialect::{Dialect, SqliteDialect};
pub use error::{Error, Result};
pub use write_guard::WriteGuard;
