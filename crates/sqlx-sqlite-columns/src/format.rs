//! Wire formats a codec can serialize values with.

use std::fmt;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::finite::ensure_finite;
use crate::tag;
use crate::value::ColumnValue;

/// Serialization strategy used by a [`SerdeCodec`](crate::SerdeCodec).
///
/// Textual formats produce [`ColumnValue::Text`], binary formats produce
/// [`ColumnValue::Blob`]. Columns adapt the payload to their own storage
/// shape, so every format can live in every column kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireFormat {
   /// Structured text (JSON)
   Json,
   /// Compact binary (bincode)
   Bincode,
   /// Self-describing tagged binary, see [`crate::tag`]
   Tag,
}

impl WireFormat {
   /// Whether this format produces text payloads.
   pub fn is_textual(self) -> bool {
      matches!(self, WireFormat::Json)
   }

   /// Serialize `value` into this format's natural payload shape.
   ///
   /// JSON and tag payloads cannot hold NaN or infinite floats, so values
   /// containing one fail here instead of being stored as `null`.
   pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<ColumnValue, String> {
      match self {
         WireFormat::Json => {
            ensure_finite(value)?;
            serde_json::to_string(value)
               .map(ColumnValue::Text)
               .map_err(|e| e.to_string())
         }
         WireFormat::Bincode => bincode::serialize(value)
            .map(ColumnValue::Blob)
            .map_err(|e| e.to_string()),
         WireFormat::Tag => tag::to_vec(value).map(ColumnValue::Blob),
      }
   }

   /// Deserialize a payload produced by [`encode`](Self::encode).
   pub fn decode<T: DeserializeOwned>(self, payload: &ColumnValue) -> Result<T, String> {
      match (self, payload) {
         (WireFormat::Json, ColumnValue::Text(text)) => {
            serde_json::from_str(text).map_err(|e| e.to_string())
         }
         (WireFormat::Json, ColumnValue::Blob(bytes)) => {
            serde_json::from_slice(bytes).map_err(|e| e.to_string())
         }
         (WireFormat::Bincode, ColumnValue::Blob(bytes)) => bincode_options()
            .deserialize(bytes)
            .map_err(|e| e.to_string()),
         (WireFormat::Tag, ColumnValue::Blob(bytes)) => tag::from_slice(bytes),
         (format, ColumnValue::Text(_)) => Err(format!("{format} expects a binary payload")),
      }
   }
}

/// The layout `bincode::serialize` writes, with leftover input treated as
/// corruption.
fn bincode_options() -> impl Options {
   bincode::DefaultOptions::new()
      .with_fixint_encoding()
      .with_little_endian()
      .reject_trailing_bytes()
}

impl fmt::Display for WireFormat {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let name = match self {
         WireFormat::Json => "json",
         WireFormat::Bincode => "bincode",
         WireFormat::Tag => "tag",
      };
      f.write_str(name)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[derive(Debug, PartialEq, Serialize, Deserialize)]
   struct Location {
      world: String,
      x: f64,
      y: f64,
      z: f64,
   }

   fn location() -> Location {
      Location {
         world: "overworld".into(),
         x: 12.5,
         y: 64.0,
         z: -3.25,
      }
   }

   #[test]
   fn test_payload_shapes() {
      assert!(matches!(
         WireFormat::Json.encode(&location()),
         Ok(ColumnValue::Text(_))
      ));
      assert!(matches!(
         WireFormat::Bincode.encode(&location()),
         Ok(ColumnValue::Blob(_))
      ));
      assert!(matches!(
         WireFormat::Tag.encode(&location()),
         Ok(ColumnValue::Blob(_))
      ));
   }

   #[test]
   fn test_every_format_round_trips() {
      for format in [WireFormat::Json, WireFormat::Bincode, WireFormat::Tag] {
         let payload = format.encode(&location()).unwrap();
         let decoded: Location = format.decode(&payload).unwrap();
         assert_eq!(decoded, location(), "{format}");
      }
   }

   #[test]
   fn test_binary_formats_reject_text() {
      let err = WireFormat::Bincode
         .decode::<Location>(&ColumnValue::Text("{}".into()))
         .unwrap_err();
      assert!(err.contains("binary payload"));
   }

   #[test]
   fn test_textual_formats_reject_non_finite_floats() {
      let mut location = location();
      location.y = f64::NAN;

      for format in [WireFormat::Json, WireFormat::Tag] {
         let err = format.encode(&location).unwrap_err();
         assert!(err.contains("non-finite"), "{format}: {err}");
         assert!(format.encode(&Some(f64::INFINITY)).is_err(), "{format}");
         assert!(format.encode(&vec![f32::NEG_INFINITY]).is_err(), "{format}");

         let payload = format.encode(&Some(-0.5f64)).unwrap();
         assert_eq!(format.decode::<Option<f64>>(&payload).unwrap(), Some(-0.5), "{format}");
      }
   }

   #[test]
   fn test_bincode_keeps_non_finite_floats() {
      let payload = WireFormat::Bincode
         .encode(&(f64::NAN, Some(f64::INFINITY)))
         .unwrap();
      let (nan, inf): (f64, Option<f64>) = WireFormat::Bincode.decode(&payload).unwrap();
      assert!(nan.is_nan());
      assert_eq!(inf, Some(f64::INFINITY));
   }

   #[test]
   fn test_bincode_rejects_trailing_bytes() {
      let Ok(ColumnValue::Blob(mut bytes)) = WireFormat::Bincode.encode(&location()) else {
         panic!("bincode produces a blob");
      };
      assert_eq!(bytes, bincode::serialize(&location()).unwrap());

      bytes.push(0);
      let err = WireFormat::Bincode
         .decode::<Location>(&ColumnValue::Blob(bytes))
         .unwrap_err();
      assert!(!err.is_empty());
   }

   #[test]
   fn test_malformed_json_rejected() {
      let result = WireFormat::Json.decode::<Location>(&ColumnValue::Text("{\"world\":".into()));
      assert!(result.is_err());
   }

   #[test]
   fn test_serde_names() {
      assert_eq!(serde_json::to_string(&WireFormat::Bincode).unwrap(), "\"bincode\"");
      let format: WireFormat = serde_json::from_str("\"tag\"").unwrap();
      assert_eq!(format, WireFormat::Tag);
   }
}
