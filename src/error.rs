/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for table managers and managed transactions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// Error from SQLx operations.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// Error from the connection manager.
   #[error(transparent)]
   ConnectionManager(#[from] sqlx_sqlite_conn_mgr::Error),

   /// Encoding, decoding or length validation of a column value failed.
   #[error(transparent)]
   Column(#[from] sqlx_sqlite_columns::Error),

   /// A row with the same primary key already exists.
   #[error("duplicate key in table '{table}'")]
   DuplicateKey { table: String },

   /// No row exists for the requested primary key.
   #[error("no row with the requested key in table '{table}'")]
   KeyNotFound { table: String },

   /// The table descriptor cannot back a key-value manager.
   #[error("invalid schema for table '{table}': {reason}")]
   InvalidSchema { table: String, reason: String },

   /// A statement was issued outside of an open transaction.
   #[error("no active transaction for database: {0}")]
   NoActiveTransaction(String),

   /// Transaction has already been committed or rolled back.
   #[error("transaction has already been finalized (committed or rolled back)")]
   TransactionAlreadyFinalized,

   /// Transaction failed and rollback also failed.
   #[error("transaction failed: {transaction_error}; rollback also failed: {rollback_error}")]
   TransactionRollbackFailed {
      transaction_error: String,
      rollback_error: String,
   },

   /// The unit of work was cancelled before it committed.
   #[error("unit of work was cancelled")]
   Cancelled,

   /// The unit of work panicked while running.
   #[error("unit of work panicked: {0}")]
   UnitOfWorkPanicked(String),

   /// Generic error for operations that don't fit other categories.
   #[error("{0}")]
   Other(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   ///
   /// This provides machine-readable error codes for error handling.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("SQLITE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::ConnectionManager(_) => "CONNECTION_ERROR".to_string(),
         Error::Column(e) => match e {
            sqlx_sqlite_columns::Error::LengthExceeded { .. } => "LENGTH_EXCEEDED".to_string(),
            e if e.is_serialization() => "SERIALIZATION_ERROR".to_string(),
            _ => "INVALID_COLUMN".to_string(),
         },
         Error::DuplicateKey { .. } => "DUPLICATE_KEY".to_string(),
         Error::KeyNotFound { .. } => "KEY_NOT_FOUND".to_string(),
         Error::InvalidSchema { .. } => "INVALID_SCHEMA".to_string(),
         Error::NoActiveTransaction(_) => "NO_ACTIVE_TRANSACTION".to_string(),
         Error::TransactionAlreadyFinalized => "TRANSACTION_ALREADY_FINALIZED".to_string(),
         Error::TransactionRollbackFailed { .. } => "TRANSACTION_ROLLBACK_FAILED".to_string(),
         Error::Cancelled => "UNIT_OF_WORK_CANCELLED".to_string(),
         Error::UnitOfWorkPanicked(_) => "UNIT_OF_WORK_PANICKED".to_string(),
         Error::Other(_) => "ERROR".to_string(),
      }
   }

   /// Whether this is a codec failure (malformed payload or rejected value).
   pub fn is_serialization(&self) -> bool {
      matches!(self, Error::Column(e) if e.is_serialization())
   }
}

#[cfg(test)]
mod tests {
   use sqlx_sqlite_columns::TypeKey;

   use super::*;

   #[test]
   fn test_error_code_duplicate_key() {
      let err = Error::DuplicateKey {
         table: "homes".into(),
      };
      assert_eq!(err.error_code(), "DUPLICATE_KEY");
      assert!(err.to_string().contains("homes"));
   }

   #[test]
   fn test_error_code_key_not_found() {
      let err = Error::KeyNotFound {
         table: "homes".into(),
      };
      assert_eq!(err.error_code(), "KEY_NOT_FOUND");
   }

   #[test]
   fn test_error_code_length_exceeded() {
      let err = Error::Column(sqlx_sqlite_columns::Error::LengthExceeded {
         column: "payload".into(),
         length: 9,
         max: 8,
         unit: "bytes",
      });
      assert_eq!(err.error_code(), "LENGTH_EXCEEDED");
      assert!(!err.is_serialization());
   }

   #[test]
   fn test_error_code_serialization() {
      let err = Error::Column(sqlx_sqlite_columns::Error::UnregisteredType(TypeKey(
         "location",
      )));
      assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
      assert!(err.is_serialization());
   }

   #[test]
   fn test_error_code_transaction_rollback_failed() {
      let err = Error::TransactionRollbackFailed {
         transaction_error: "constraint".into(),
         rollback_error: "busy".into(),
      };
      assert_eq!(err.error_code(), "TRANSACTION_ROLLBACK_FAILED");
      assert!(err.to_string().contains("constraint"));
      assert!(err.to_string().contains("busy"));
   }

   #[test]
   fn test_error_code_no_active_transaction() {
      let err = Error::NoActiveTransaction("test.db".into());
      assert_eq!(err.error_code(), "NO_ACTIVE_TRANSACTION");
      assert!(err.to_string().contains("test.db"));
   }

   #[test]
   fn test_error_code_cancelled() {
      assert_eq!(Error::Cancelled.error_code(), "UNIT_OF_WORK_CANCELLED");
   }

   #[test]
   fn test_error_code_panicked() {
      let err = Error::UnitOfWorkPanicked("boom".into());
      assert_eq!(err.error_code(), "UNIT_OF_WORK_PANICKED");
      assert!(err.to_string().contains("boom"));
   }

   #[test]
   fn test_error_code_sqlx_non_database() {
      // RowNotFound is not a database error, so no SQLite code
      let err = Error::Sqlx(sqlx::Error::RowNotFound);
      assert_eq!(err.error_code(), "SQLX_ERROR");
   }

   #[test]
   fn test_error_code_other() {
      let err = Error::Other("something went wrong".into());
      assert_eq!(err.error_code(), "ERROR");
      assert_eq!(err.to_string(), "something went wrong");
   }
}
