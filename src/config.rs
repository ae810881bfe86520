//! Table manager configuration

use serde::{Deserialize, Serialize};

/// How [`TableManager::upsert`](crate::TableManager::upsert) writes a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertStrategy {
   /// Check for the key, then insert or update.
   ///
   /// If another writer inserts the same key between the check and the
   /// insert, the upsert fails with [`Error::DuplicateKey`](crate::Error::DuplicateKey).
   #[default]
   TwoStep,

   /// A single `INSERT ... ON CONFLICT DO UPDATE` statement.
   Atomic,
}

/// Configuration for a [`TableManager`](crate::TableManager)
///
/// # Examples
///
/// ```
/// use sqlx_sqlite_store::{ManagerConfig, UpsertStrategy};
///
/// let config = ManagerConfig::default();
/// assert_eq!(config.upsert, UpsertStrategy::TwoStep);
///
/// let config = ManagerConfig {
///     upsert: UpsertStrategy::Atomic,
/// };
/// # let _ = config;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
   /// Default: [`UpsertStrategy::TwoStep`]
   pub upsert: UpsertStrategy,
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_deserialize_manager_config() {
      let config: ManagerConfig = serde_json::from_str(r#"{ "upsert": "atomic" }"#).unwrap();
      assert_eq!(config.upsert, UpsertStrategy::Atomic);

      let config: ManagerConfig = serde_json::from_str("{}").unwrap();
      assert_eq!(config, ManagerConfig::default());
   }
}
