//! Column descriptors and typed columns.

use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::WireFormat;
use crate::ident::validate_identifier;
use crate::registry::TypeKey;
use crate::value::{CellValue, ColumnValue};

/// Physical storage kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "length", rename_all = "camelCase")]
pub enum ColumnKind {
   /// Text capped at `n` characters
   BoundedText(u32),
   /// Unbounded text
   Text,
   /// Binary capped at `n` bytes
   BoundedBinary(u32),
   /// Unbounded binary
   Binary,
}

impl ColumnKind {
   pub fn is_text(self) -> bool {
      matches!(self, ColumnKind::BoundedText(_) | ColumnKind::Text)
   }

   /// Declared length, if the column is bounded.
   pub fn bound(self) -> Option<u32> {
      match self {
         ColumnKind::BoundedText(n) | ColumnKind::BoundedBinary(n) => Some(n),
         ColumnKind::Text | ColumnKind::Binary => None,
      }
   }
}

/// Name, physical kind and codec identity of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
   name: String,
   kind: ColumnKind,
   type_key: TypeKey,
   format: WireFormat,
}

impl ColumnDescriptor {
   pub fn name(&self) -> &str {
      &self.name
   }

   pub fn kind(&self) -> ColumnKind {
      self.kind
   }

   pub fn type_key(&self) -> TypeKey {
      self.type_key
   }

   pub fn format(&self) -> WireFormat {
      self.format
   }
}

/// A column bound to the codec for its value type `T`.
///
/// Text columns holding a binary format store the payload as standard base64;
/// binary columns holding a textual format store its UTF-8 bytes.
pub struct TypedColumn<T> {
   descriptor: ColumnDescriptor,
   codec: Arc<dyn Codec<T>>,
}

impl<T> TypedColumn<T> {
   pub fn new(name: impl Into<String>, kind: ColumnKind, codec: Arc<dyn Codec<T>>) -> Result<Self> {
      let name = name.into();
      validate_identifier(&name)?;

      Ok(Self {
         descriptor: ColumnDescriptor {
            name,
            kind,
            type_key: codec.type_key(),
            format: codec.format(),
         },
         codec,
      })
   }

   pub fn descriptor(&self) -> &ColumnDescriptor {
      &self.descriptor
   }

   pub fn name(&self) -> &str {
      &self.descriptor.name
   }

   pub fn kind(&self) -> ColumnKind {
      self.descriptor.kind
   }

   /// Encode `value` into this column's physical shape.
   ///
   /// Fails with a serialization error if the codec rejects the value, or
   /// [`Error::LengthExceeded`] if the payload does not fit a bounded column.
   pub fn encode(&self, value: &T) -> Result<ColumnValue> {
      let payload = self.codec.encode(value)?;
      let physical = self.to_storage_shape(payload);
      self.validate(&physical)?;
      Ok(physical)
   }

   /// Decode a payload read from this column.
   pub fn decode(&self, physical: ColumnValue) -> Result<T> {
      let payload = self.to_codec_shape(physical)?;
      self.codec.decode(payload)
   }

   /// Decode a cell, passing already-decoded values through untouched.
   pub fn value_from_db(&self, cell: CellValue<T>) -> Result<T> {
      match cell {
         CellValue::Raw(physical) => self.decode(physical),
         CellValue::Decoded(value) => Ok(value),
      }
   }

   /// Check a physical payload against the column's declared length.
   ///
   /// Binary bounds count bytes, text bounds count characters.
   pub fn validate(&self, physical: &ColumnValue) -> Result<()> {
      let (length, max, unit) = match self.descriptor.kind {
         ColumnKind::BoundedBinary(max) => (physical.byte_len(), max, "bytes"),
         ColumnKind::BoundedText(max) => (physical.char_len(), max, "characters"),
         ColumnKind::Text | ColumnKind::Binary => return Ok(()),
      };

      if length > max as usize {
         return Err(Error::LengthExceeded {
            column: self.descriptor.name.clone(),
            length,
            max,
            unit,
         });
      }
      Ok(())
   }

   fn to_storage_shape(&self, payload: ColumnValue) -> ColumnValue {
      match (self.descriptor.kind.is_text(), payload) {
         (true, ColumnValue::Blob(bytes)) => ColumnValue::Text(BASE64.encode(bytes)),
         (false, ColumnValue::Text(text)) => ColumnValue::Blob(text.into_bytes()),
         (_, payload) => payload,
      }
   }

   fn to_codec_shape(&self, physical: ColumnValue) -> Result<ColumnValue> {
      match (self.descriptor.format.is_textual(), physical) {
         (false, ColumnValue::Text(text)) => BASE64
            .decode(text)
            .map(ColumnValue::Blob)
            .map_err(|e| Error::serialization(self.descriptor.type_key, e.to_string())),
         (true, ColumnValue::Blob(bytes)) => String::from_utf8(bytes)
            .map(ColumnValue::Text)
            .map_err(|e| Error::serialization(self.descriptor.type_key, e.to_string())),
         (_, physical) => Ok(physical),
      }
   }
}

impl<T> Clone for TypedColumn<T> {
   fn clone(&self) -> Self {
      Self {
         descriptor: self.descriptor.clone(),
         codec: Arc::clone(&self.codec),
      }
   }
}

impl<T> fmt::Debug for TypedColumn<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TypedColumn")
         .field("descriptor", &self.descriptor)
         .finish_non_exhaustive()
   }
}

#[cfg(test)]
mod tests {
   use serde::Deserialize;

   use super::*;
   use crate::codec::SerdeCodec;

   #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
   struct Location {
      world: String,
      x: i32,
      y: i32,
      z: i32,
   }

   fn location() -> Location {
      Location {
         world: "overworld".into(),
         x: 10,
         y: 64,
         z: -20,
      }
   }

   fn column(kind: ColumnKind, format: WireFormat) -> TypedColumn<Location> {
      TypedColumn::new(
         "location",
         kind,
         Arc::new(SerdeCodec::new(TypeKey("location"), format)),
      )
      .unwrap()
   }

   #[test]
   fn test_round_trip_every_kind_and_format() {
      let kinds = [
         ColumnKind::BoundedText(256),
         ColumnKind::Text,
         ColumnKind::BoundedBinary(256),
         ColumnKind::Binary,
      ];
      let formats = [WireFormat::Json, WireFormat::Bincode, WireFormat::Tag];

      for kind in kinds {
         for format in formats {
            let column = column(kind, format);
            let physical = column.encode(&location()).unwrap();
            assert_eq!(physical.as_text().is_some(), kind.is_text(), "{kind:?} {format}");
            assert_eq!(column.decode(physical).unwrap(), location(), "{kind:?} {format}");
         }
      }
   }

   #[test]
   fn test_binary_format_in_text_column_is_base64() {
      let column = column(ColumnKind::Text, WireFormat::Bincode);
      let physical = column.encode(&location()).unwrap();
      let text = physical.as_text().unwrap();
      let raw = bincode::serialize(&location()).unwrap();
      assert_eq!(text, BASE64.encode(raw));
   }

   #[test]
   fn test_bounded_binary_rejects_oversized_payload() {
      let unbounded = column(ColumnKind::Binary, WireFormat::Bincode);
      let size = unbounded.encode(&location()).unwrap().byte_len();

      // Exactly at the bound is accepted
      let exact = column(ColumnKind::BoundedBinary(size as u32), WireFormat::Bincode);
      assert!(exact.encode(&location()).is_ok());

      let small = column(ColumnKind::BoundedBinary(size as u32 - 1), WireFormat::Bincode);
      let err = small.encode(&location()).unwrap_err();
      match err {
         Error::LengthExceeded {
            column,
            length,
            max,
            unit,
         } => {
            assert_eq!(column, "location");
            assert_eq!(length, size);
            assert_eq!(max, size as u32 - 1);
            assert_eq!(unit, "bytes");
         }
         other => panic!("unexpected error: {other:?}"),
      }
   }

   #[test]
   fn test_bounded_text_counts_characters() {
      let column = TypedColumn::new(
         "name",
         ColumnKind::BoundedText(3),
         Arc::new(SerdeCodec::<String>::new(TypeKey("name"), WireFormat::Json)),
      )
      .unwrap();

      // "é" JSON-encoded is `"é"`: 3 characters but 4 bytes
      assert!(column.encode(&"é".to_string()).is_ok());
      let err = column.encode(&"ab".to_string()).unwrap_err();
      assert!(matches!(err, Error::LengthExceeded { length: 4, max: 3, .. }));
   }

   #[test]
   fn test_decoded_cell_passes_through() {
      let column = column(ColumnKind::Text, WireFormat::Json);
      let value = column
         .value_from_db(CellValue::Decoded(location()))
         .unwrap();
      assert_eq!(value, location());

      let raw = column.encode(&location()).unwrap();
      assert_eq!(column.value_from_db(raw.into()).unwrap(), location());
   }

   #[test]
   fn test_malformed_payload_is_serialization_error() {
      let column = column(ColumnKind::Text, WireFormat::Bincode);
      let err = column
         .decode(ColumnValue::Text("%%% not base64".into()))
         .unwrap_err();
      assert!(err.is_serialization());

      let column = self::column(ColumnKind::Binary, WireFormat::Json);
      let err = column.decode(ColumnValue::Blob(vec![0xFF, 0xFE])).unwrap_err();
      assert!(err.is_serialization());
   }

   #[test]
   fn test_invalid_name_rejected() {
      let result = TypedColumn::<Location>::new(
         "bad name",
         ColumnKind::Text,
         Arc::new(SerdeCodec::new(TypeKey("location"), WireFormat::Json)),
      );
      assert!(matches!(result, Err(Error::InvalidIdentifier { .. })));
   }

   #[test]
   fn test_kind_serde() {
      let json = serde_json::to_value(ColumnKind::BoundedBinary(64)).unwrap();
      assert_eq!(json, serde_json::json!({ "kind": "boundedBinary", "length": 64 }));
      let kind: ColumnKind = serde_json::from_value(serde_json::json!({ "kind": "text" })).unwrap();
      assert_eq!(kind, ColumnKind::Text);
   }
}
