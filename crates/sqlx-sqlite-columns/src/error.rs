//! Error types for the sqlx-sqlite-columns crate.

use crate::registry::TypeKey;

/// Result type alias for column operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while registering columns or converting values to and from
/// their physical representation.
///
/// Encode and validation failures happen before anything is sent to the
/// database. Decode failures happen after a full row has been fetched.
#[derive(Debug, thiserror::Error)]
pub enum Error {
   /// The codec rejected a value, or a stored payload is malformed.
   #[error("serialization of '{type_key}' failed: {reason}")]
   Serialization { type_key: TypeKey, reason: String },

   /// No codec is registered under the requested type key.
   #[error("no codec registered for type '{0}'")]
   UnregisteredType(TypeKey),

   /// An encoded payload does not fit a bounded column.
   #[error("value for column '{column}' is {length} {unit} long, exceeding the column length of {max}")]
   LengthExceeded {
      column: String,
      length: usize,
      max: u32,
      unit: &'static str,
   },

   /// A column with this name is already part of the table.
   #[error("column '{0}' is already registered")]
   DuplicateColumn(String),

   /// The table has no column with this name.
   #[error("unknown column '{0}'")]
   UnknownColumn(String),

   /// Table or column name contains characters that are not allowed.
   ///
   /// Names must match `[a-zA-Z_][a-zA-Z0-9_]*`.
   #[error("invalid identifier '{name}': must match [a-zA-Z_][a-zA-Z0-9_]*")]
   InvalidIdentifier { name: String },
}

impl Error {
   /// Whether this error belongs to the serialization family (encode/decode
   /// failures and unresolvable codecs).
   pub fn is_serialization(&self) -> bool {
      matches!(
         self,
         Error::Serialization { .. } | Error::UnregisteredType(_)
      )
   }

   pub(crate) fn serialization(type_key: TypeKey, reason: impl Into<String>) -> Self {
      Error::Serialization {
         type_key,
         reason: reason.into(),
      }
   }
}
