//! Encode/decode pairs bridging a value type and its physical payload.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::format::WireFormat;
use crate::registry::TypeKey;
use crate::value::ColumnValue;

/// Converts values of `T` to and from a [`ColumnValue`].
///
/// `encode` must produce the payload shape of [`format`](Codec::format)
/// (text for textual formats, blob otherwise); columns rely on that to adapt
/// payloads to their storage shape.
pub trait Codec<T>: Send + Sync {
   /// Stable key the codec is registered under.
   fn type_key(&self) -> TypeKey;

   fn format(&self) -> WireFormat;

   fn encode(&self, value: &T) -> Result<ColumnValue>;

   fn decode(&self, payload: ColumnValue) -> Result<T>;
}

/// Codec for any serde type, using one of the built-in wire formats.
pub struct SerdeCodec<T> {
   type_key: TypeKey,
   format: WireFormat,
   _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeCodec<T> {
   pub fn new(type_key: TypeKey, format: WireFormat) -> Self {
      Self {
         type_key,
         format,
         _marker: PhantomData,
      }
   }
}

impl<T> fmt::Debug for SerdeCodec<T> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("SerdeCodec")
         .field("type_key", &self.type_key)
         .field("format", &self.format)
         .finish()
   }
}

impl<T> Codec<T> for SerdeCodec<T>
where
   T: Serialize + DeserializeOwned,
{
   fn type_key(&self) -> TypeKey {
      self.type_key
   }

   fn format(&self) -> WireFormat {
      self.format
   }

   fn encode(&self, value: &T) -> Result<ColumnValue> {
      self
         .format
         .encode(value)
         .map_err(|reason| Error::serialization(self.type_key, reason))
   }

   fn decode(&self, payload: ColumnValue) -> Result<T> {
      self
         .format
         .decode(&payload)
         .map_err(|reason| Error::serialization(self.type_key, reason))
   }
}

type EncodeFn<T> = Box<dyn Fn(&T) -> std::result::Result<ColumnValue, String> + Send + Sync>;
type DecodeFn<T> = Box<dyn Fn(ColumnValue) -> std::result::Result<T, String> + Send + Sync>;

/// Codec built from an explicit encode/decode function pair.
///
/// For types without serde support, or with a hand-tuned layout. The
/// functions report failures as plain messages; the codec attaches its type
/// key.
///
/// ```
/// use sqlx_sqlite_columns::{Codec, ColumnValue, FnCodec, TypeKey, WireFormat};
///
/// let codec = FnCodec::new(
///    TypeKey("world"),
///    WireFormat::Json,
///    |name: &String| Ok(ColumnValue::Text(name.clone())),
///    |payload| payload.as_text().map(str::to_owned).ok_or_else(|| "not text".to_string()),
/// );
/// assert_eq!(codec.encode(&"nether".to_string()).unwrap(), ColumnValue::Text("nether".into()));
/// ```
pub struct FnCodec<T> {
   type_key: TypeKey,
   format: WireFormat,
   encode: EncodeFn<T>,
   decode: DecodeFn<T>,
}

impl<T> FnCodec<T> {
   pub fn new<E, D>(type_key: TypeKey, format: WireFormat, encode: E, decode: D) -> Self
   where
      E: Fn(&T) -> std::result::Result<ColumnValue, String> + Send + Sync + 'static,
      D: Fn(ColumnValue) -> std::result::Result<T, String> + Send + Sync + 'static,
   {
      Self {
         type_key,
         format,
         encode: Box::new(encode),
         decode: Box::new(decode),
      }
   }
}

impl<T> Codec<T> for FnCodec<T> {
   fn type_key(&self) -> TypeKey {
      self.type_key
   }

   fn format(&self) -> WireFormat {
      self.format
   }

   fn encode(&self, value: &T) -> Result<ColumnValue> {
      (self.encode)(value).map_err(|reason| Error::serialization(self.type_key, reason))
   }

   fn decode(&self, payload: ColumnValue) -> Result<T> {
      (self.decode)(payload).map_err(|reason| Error::serialization(self.type_key, reason))
   }
}

#[cfg(test)]
mod tests {
   use serde::Deserialize;

   use super::*;

   #[derive(Debug, PartialEq, Serialize, Deserialize)]
   struct Pair(i32, i32);

   #[test]
   fn test_serde_codec_round_trip() {
      let codec = SerdeCodec::<Pair>::new(TypeKey("pair"), WireFormat::Bincode);
      let payload = codec.encode(&Pair(1, 2)).unwrap();
      assert_eq!(codec.decode(payload).unwrap(), Pair(1, 2));
   }

   #[test]
   fn test_serde_codec_decode_failure_names_type() {
      let codec = SerdeCodec::<Pair>::new(TypeKey("pair"), WireFormat::Json);
      let err = codec
         .decode(ColumnValue::Text("not json".into()))
         .unwrap_err();
      assert!(err.is_serialization());
      assert!(err.to_string().contains("'pair'"));
   }

   #[test]
   fn test_fn_codec_rejection_is_serialization_error() {
      let codec = FnCodec::new(
         TypeKey("positive"),
         WireFormat::Json,
         |n: &i32| {
            if *n > 0 {
               Ok(ColumnValue::Text(n.to_string()))
            } else {
               Err(format!("{n} is not positive"))
            }
         },
         |payload| {
            payload
               .as_text()
               .and_then(|t| t.parse().ok())
               .ok_or_else(|| "bad payload".to_string())
         },
      );

      assert_eq!(codec.decode(codec.encode(&5).unwrap()).unwrap(), 5);
      let err = codec.encode(&-1).unwrap_err();
      assert!(matches!(err, Error::Serialization { .. }));
      assert!(err.to_string().contains("-1 is not positive"));
   }
}
