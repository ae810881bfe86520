/// Physical payload stored in a text or binary column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
   Text(String),
   Blob(Vec<u8>),
}

impl ColumnValue {
   /// Attempts to get this value as a string reference.
   pub fn as_text(&self) -> Option<&str> {
      match self {
         ColumnValue::Text(s) => Some(s),
         ColumnValue::Blob(_) => None,
      }
   }

   /// Attempts to get this value as a blob reference.
   pub fn as_blob(&self) -> Option<&[u8]> {
      match self {
         ColumnValue::Blob(b) => Some(b),
         ColumnValue::Text(_) => None,
      }
   }

   /// Size in bytes.
   pub fn byte_len(&self) -> usize {
      match self {
         ColumnValue::Text(s) => s.len(),
         ColumnValue::Blob(b) => b.len(),
      }
   }

   /// Size in characters for text, bytes for blobs.
   pub fn char_len(&self) -> usize {
      match self {
         ColumnValue::Text(s) => s.chars().count(),
         ColumnValue::Blob(b) => b.len(),
      }
   }
}

impl From<String> for ColumnValue {
   fn from(value: String) -> Self {
      ColumnValue::Text(value)
   }
}

impl From<Vec<u8>> for ColumnValue {
   fn from(value: Vec<u8>) -> Self {
      ColumnValue::Blob(value)
   }
}

/// A cell handed to [`TypedColumn::value_from_db`](crate::TypedColumn::value_from_db).
///
/// Layers that keep written values in memory before flushing hand back
/// `Decoded` values; those pass through without touching the codec.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue<T> {
   Raw(ColumnValue),
   Decoded(T),
}

impl<T> From<ColumnValue> for CellValue<T> {
   fn from(value: ColumnValue) -> Self {
      CellValue::Raw(value)
   }
}
