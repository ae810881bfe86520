//! Configuration for SQLite database connection pools

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration for SqliteDatabase connection pools
///
/// Durations are expressed in whole seconds when (de)serialized, so the
/// config can live in an application's TOML or JSON settings file.
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_conn_mgr::SqliteDatabaseConfig;
/// use std::time::Duration;
///
/// // Use defaults
/// let config = SqliteDatabaseConfig::default();
///
/// // Override just one field
/// let config = SqliteDatabaseConfig {
///     max_read_connections: 3,
///     ..Default::default()
/// };
///
/// // Load from settings
/// let config: SqliteDatabaseConfig =
///     serde_json::from_str(r#"{ "idle_timeout": 60 }"#).unwrap();
/// assert_eq!(config.idle_timeout, Duration::from_secs(60));
/// assert_eq!(config.max_read_connections, 6);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteDatabaseConfig {
   /// Maximum number of concurrent read connections
   ///
   /// This controls the size of the read-only connection pool.
   /// Must be at least 1.
   ///
   /// Default: 6
   pub max_read_connections: u32,

   /// Idle timeout for both read and write connections
   ///
   /// Connections that remain idle for this duration will be closed automatically.
   ///
   /// Default: 30 seconds
   #[serde(with = "duration_secs")]
   pub idle_timeout: Duration,

   /// How long a connection waits on a locked database before giving up
   ///
   /// Default: 5 seconds
   #[serde(with = "duration_secs")]
   pub busy_timeout: Duration,
}

impl Default for SqliteDatabaseConfig {
   fn default() -> Self {
      Self {
         max_read_connections: 6,
         idle_timeout: Duration::from_secs(30),
         busy_timeout: Duration::from_secs(5),
      }
   }
}

impl SqliteDatabaseConfig {
   /// Reject settings the pools cannot be built with.
   pub fn validate(&self) -> Result<()> {
      if self.max_read_connections == 0 {
         return Err(Error::InvalidConfig(
            "max_read_connections must be at least 1".into(),
         ));
      }
      Ok(())
   }
}

mod duration_secs {
   use std::time::Duration;

   use serde::{Deserialize, Deserializer, Serializer};

   pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
      serializer.serialize_u64(value.as_secs())
   }

   pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
      u64::deserialize(deserializer).map(Duration::from_secs)
   }
}
