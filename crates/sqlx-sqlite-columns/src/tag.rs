//! Tagged binary format.
//!
//! A self-describing binary encoding in the spirit of NBT: every node starts
//! with a one-byte tag naming its type, followed by a big-endian payload.
//!
//! ```text
//! tag | payload
//! ----|---------------------------------------------------------------
//!  0  | end of compound (no payload)
//!  1  | null
//!  2  | bool       u8
//!  3  | long       i64
//!  4  | ulong      u64
//!  5  | double     f64
//!  6  | string     u32 length + UTF-8 bytes
//!  7  | list       u32 count + `count` tagged nodes
//!  8  | compound   (tag, u32 name length, name, payload)* then tag 0
//! ```
//!
//! Values go through [`serde_json::Value`] on the way in and out, so any type
//! that round-trips through JSON round-trips through this format too. Like
//! JSON, NaN and infinite floats are rejected.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};

use crate::finite::ensure_finite;

const TAG_END: u8 = 0;
const TAG_NULL: u8 = 1;
const TAG_BOOL: u8 = 2;
const TAG_LONG: u8 = 3;
const TAG_ULONG: u8 = 4;
const TAG_DOUBLE: u8 = 5;
const TAG_STRING: u8 = 6;
const TAG_LIST: u8 = 7;
const TAG_COMPOUND: u8 = 8;

/// Nesting limit for decoding untrusted payloads.
const MAX_DEPTH: usize = 128;

/// Serialize `value` as a tagged binary payload.
pub fn to_vec<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, String> {
   ensure_finite(value)?;
   let tree = serde_json::to_value(value).map_err(|e| e.to_string())?;
   let mut out = Vec::new();
   out.push(tag_of(&tree));
   write_payload(&mut out, &tree)?;
   Ok(out)
}

/// Deserialize a payload produced by [`to_vec`].
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, String> {
   let mut reader = Reader { bytes, pos: 0 };
   let tag = reader.byte()?;
   let tree = reader.payload(tag, 0)?;
   if reader.pos != bytes.len() {
      return Err(format!(
         "{} trailing bytes after tag payload",
         bytes.len() - reader.pos
      ));
   }
   serde_json::from_value(tree).map_err(|e| e.to_string())
}

fn tag_of(value: &Value) -> u8 {
   match value {
      Value::Null => TAG_NULL,
      Value::Bool(_) => TAG_BOOL,
      Value::Number(n) if n.is_i64() => TAG_LONG,
      Value::Number(n) if n.is_u64() => TAG_ULONG,
      Value::Number(_) => TAG_DOUBLE,
      Value::String(_) => TAG_STRING,
      Value::Array(_) => TAG_LIST,
      Value::Object(_) => TAG_COMPOUND,
   }
}

fn write_payload(out: &mut Vec<u8>, value: &Value) -> Result<(), String> {
   match value {
      Value::Null => {}
      Value::Bool(b) => out.push(u8::from(*b)),
      Value::Number(n) => {
         if let Some(i) = n.as_i64() {
            out.extend_from_slice(&i.to_be_bytes());
         } else if let Some(u) = n.as_u64() {
            out.extend_from_slice(&u.to_be_bytes());
         } else {
            let f = n.as_f64().ok_or("number is not representable")?;
            out.extend_from_slice(&f.to_be_bytes());
         }
      }
      Value::String(s) => write_str(out, s)?,
      Value::Array(items) => {
         write_len(out, items.len())?;
         for item in items {
            out.push(tag_of(item));
            write_payload(out, item)?;
         }
      }
      Value::Object(map) => {
         for (name, item) in map {
            out.push(tag_of(item));
            write_str(out, name)?;
            write_payload(out, item)?;
         }
         out.push(TAG_END);
      }
   }
   Ok(())
}

fn write_len(out: &mut Vec<u8>, len: usize) -> Result<(), String> {
   let len = u32::try_from(len).map_err(|_| format!("length {len} exceeds u32"))?;
   out.extend_from_slice(&len.to_be_bytes());
   Ok(())
}

fn write_str(out: &mut Vec<u8>, s: &str) -> Result<(), String> {
   write_len(out, s.len())?;
   out.extend_from_slice(s.as_bytes());
   Ok(())
}

struct Reader<'a> {
   bytes: &'a [u8],
   pos: usize,
}

impl<'a> Reader<'a> {
   fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
      let end = self
         .pos
         .checked_add(n)
         .filter(|end| *end <= self.bytes.len())
         .ok_or_else(|| format!("unexpected end of payload at byte {}", self.pos))?;
      let slice = &self.bytes[self.pos..end];
      self.pos = end;
      Ok(slice)
   }

   fn byte(&mut self) -> Result<u8, String> {
      Ok(self.take(1)?[0])
   }

   fn array<const N: usize>(&mut self) -> Result<[u8; N], String> {
      let mut buf = [0u8; N];
      buf.copy_from_slice(self.take(N)?);
      Ok(buf)
   }

   fn len(&mut self) -> Result<usize, String> {
      Ok(u32::from_be_bytes(self.array()?) as usize)
   }

   fn string(&mut self) -> Result<String, String> {
      let len = self.len()?;
      let bytes = self.take(len)?;
      String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
   }

   fn payload(&mut self, tag: u8, depth: usize) -> Result<Value, String> {
      if depth > MAX_DEPTH {
         return Err(format!("nesting deeper than {MAX_DEPTH}"));
      }

      match tag {
         TAG_NULL => Ok(Value::Null),
         TAG_BOOL => match self.byte()? {
            0 => Ok(Value::Bool(false)),
            1 => Ok(Value::Bool(true)),
            other => Err(format!("invalid bool byte {other}")),
         },
         TAG_LONG => Ok(Value::from(i64::from_be_bytes(self.array()?))),
         TAG_ULONG => Ok(Value::from(u64::from_be_bytes(self.array()?))),
         TAG_DOUBLE => {
            let f = f64::from_be_bytes(self.array()?);
            Number::from_f64(f)
               .map(Value::Number)
               .ok_or_else(|| format!("non-finite double {f}"))
         }
         TAG_STRING => self.string().map(Value::String),
         TAG_LIST => {
            let count = self.len()?;
            // Every element takes at least its tag byte
            let mut items = Vec::with_capacity(count.min(self.bytes.len() - self.pos));
            for _ in 0..count {
               let tag = self.byte()?;
               items.push(self.payload(tag, depth + 1)?);
            }
            Ok(Value::Array(items))
         }
         TAG_COMPOUND => {
            let mut map = Map::new();
            loop {
               let tag = self.byte()?;
               if tag == TAG_END {
                  break;
               }
               let name = self.string()?;
               let item = self.payload(tag, depth + 1)?;
               map.insert(name, item);
            }
            Ok(Value::Object(map))
         }
         TAG_END => Err("unexpected end tag".to_string()),
         other => Err(format!("unknown tag {other}")),
      }
   }
}

#[cfg(test)]
mod tests {
   use std::collections::BTreeMap;

   use serde::Deserialize;

   use super::*;

   #[derive(Debug, PartialEq, Serialize, Deserialize)]
   struct Block {
      world: String,
      x: i32,
      y: u8,
      z: i64,
      solid: bool,
      light: Option<f32>,
      tags: Vec<String>,
      data: BTreeMap<String, u64>,
   }

   fn block() -> Block {
      Block {
         world: "nether".into(),
         x: -12,
         y: 70,
         z: i64::MIN,
         solid: true,
         light: Some(0.5),
         tags: vec!["ore".into(), "rare".into()],
         data: BTreeMap::from([("age".into(), u64::MAX)]),
      }
   }

   #[test]
   fn test_round_trip_struct() {
      let bytes = to_vec(&block()).unwrap();
      assert_eq!(bytes[0], TAG_COMPOUND);
      let decoded: Block = from_slice(&bytes).unwrap();
      assert_eq!(decoded, block());
   }

   #[test]
   fn test_scalar_layout() {
      assert_eq!(to_vec(&true).unwrap(), vec![TAG_BOOL, 1]);
      assert_eq!(
         to_vec(&1i64).unwrap(),
         vec![TAG_LONG, 0, 0, 0, 0, 0, 0, 0, 1]
      );
      assert_eq!(
         to_vec("hi").unwrap(),
         vec![TAG_STRING, 0, 0, 0, 2, b'h', b'i']
      );
      assert_eq!(to_vec(&()).unwrap(), vec![TAG_NULL]);
   }

   #[test]
   fn test_whole_float_stays_float() {
      let bytes = to_vec(&2.0f64).unwrap();
      assert_eq!(bytes[0], TAG_DOUBLE);
      assert_eq!(from_slice::<f64>(&bytes).unwrap(), 2.0);
   }

   #[test]
   fn test_truncated_payload_rejected() {
      let bytes = to_vec(&block()).unwrap();
      let err = from_slice::<Block>(&bytes[..bytes.len() - 3]).unwrap_err();
      assert!(err.contains("unexpected end"));
   }

   #[test]
   fn test_trailing_bytes_rejected() {
      let mut bytes = to_vec(&7u8).unwrap();
      bytes.push(0);
      let err = from_slice::<u8>(&bytes).unwrap_err();
      assert!(err.contains("trailing"));
   }

   #[test]
   fn test_unknown_tag_rejected() {
      let err = from_slice::<u8>(&[42]).unwrap_err();
      assert!(err.contains("unknown tag 42"));
   }

   #[test]
   fn test_huge_list_count_does_not_preallocate() {
      // Claims u32::MAX elements but carries none
      let err = from_slice::<Vec<u8>>(&[TAG_LIST, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap_err();
      assert!(err.contains("unexpected end"));
   }

   #[test]
   fn test_depth_limit() {
      let mut bytes = Vec::new();
      for _ in 0..(MAX_DEPTH + 2) {
         bytes.extend_from_slice(&[TAG_LIST, 0, 0, 0, 1]);
      }
      bytes.push(TAG_NULL);
      let err = from_slice::<serde_json::Value>(&bytes).unwrap_err();
      assert!(err.contains("nesting"));
   }
}
