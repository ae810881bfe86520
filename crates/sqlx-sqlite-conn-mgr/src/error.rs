//! Error types for sqlx-sqlite-conn-mgr

use thiserror::Error;

/// Errors that may occur while provisioning or using database connections
#[derive(Error, Debug)]
pub enum Error {
   /// IO error when creating or removing database files.
   #[error("IO error: {0}")]
   Io(#[from] std::io::Error),

   /// Error from the sqlx library while opening or using a pool
   #[error("Sqlx error: {0}")]
   Sqlx(#[from] sqlx::Error),

   /// Database has been closed and cannot be used
   #[error("Database has been closed")]
   DatabaseClosed,

   /// Pool settings that cannot be honored
   #[error("Invalid database config: {0}")]
   InvalidConfig(String),
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
