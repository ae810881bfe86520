//! Non-finite float detection.
//!
//! JSON has no spelling for NaN or infinity and `serde_json` quietly writes
//! them as `null`, which never decodes back to the original value. Formats
//! built on JSON run [`ensure_finite`] first so such values fail to encode.

use std::fmt;

use serde::Serialize;
use serde::ser;

/// Walk `value` and fail on the first NaN or infinite float.
pub(crate) fn ensure_finite<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
   value.serialize(FiniteCheck).map_err(|e| e.0)
}

#[derive(Debug)]
struct NonFinite(String);

impl fmt::Display for NonFinite {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(&self.0)
   }
}

impl std::error::Error for NonFinite {}

impl ser::Error for NonFinite {
   fn custom<M: fmt::Display>(msg: M) -> Self {
      NonFinite(msg.to_string())
   }
}

type Check = Result<(), NonFinite>;

fn check_float(v: f64) -> Check {
   if v.is_finite() {
      Ok(())
   } else {
      Err(NonFinite(format!("non-finite float {v} cannot be represented")))
   }
}

/// Serializer that produces nothing and only inspects floats.
#[derive(Clone, Copy)]
struct FiniteCheck;

impl ser::Serializer for FiniteCheck {
   type Ok = ();
   type Error = NonFinite;
   type SerializeSeq = Self;
   type SerializeTuple = Self;
   type SerializeTupleStruct = Self;
   type SerializeTupleVariant = Self;
   type SerializeMap = Self;
   type SerializeStruct = Self;
   type SerializeStructVariant = Self;

   fn serialize_bool(self, _: bool) -> Check {
      Ok(())
   }

   fn serialize_i8(self, _: i8) -> Check {
      Ok(())
   }

   fn serialize_i16(self, _: i16) -> Check {
      Ok(())
   }

   fn serialize_i32(self, _: i32) -> Check {
      Ok(())
   }

   fn serialize_i64(self, _: i64) -> Check {
      Ok(())
   }

   fn serialize_i128(self, _: i128) -> Check {
      Ok(())
   }

   fn serialize_u8(self, _: u8) -> Check {
      Ok(())
   }

   fn serialize_u16(self, _: u16) -> Check {
      Ok(())
   }

   fn serialize_u32(self, _: u32) -> Check {
      Ok(())
   }

   fn serialize_u64(self, _: u64) -> Check {
      Ok(())
   }

   fn serialize_u128(self, _: u128) -> Check {
      Ok(())
   }

   fn serialize_f32(self, v: f32) -> Check {
      check_float(f64::from(v))
   }

   fn serialize_f64(self, v: f64) -> Check {
      check_float(v)
   }

   fn serialize_char(self, _: char) -> Check {
      Ok(())
   }

   fn serialize_str(self, _: &str) -> Check {
      Ok(())
   }

   fn serialize_bytes(self, _: &[u8]) -> Check {
      Ok(())
   }

   fn serialize_none(self) -> Check {
      Ok(())
   }

   fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Check {
      value.serialize(self)
   }

   fn serialize_unit(self) -> Check {
      Ok(())
   }

   fn serialize_unit_struct(self, _: &'static str) -> Check {
      Ok(())
   }

   fn serialize_unit_variant(self, _: &'static str, _: u32, _: &'static str) -> Check {
      Ok(())
   }

   fn serialize_newtype_struct<T: Serialize + ?Sized>(self, _: &'static str, value: &T) -> Check {
      value.serialize(self)
   }

   fn serialize_newtype_variant<T: Serialize + ?Sized>(
      self,
      _: &'static str,
      _: u32,
      _: &'static str,
      value: &T,
   ) -> Check {
      value.serialize(self)
   }

   fn serialize_seq(self, _: Option<usize>) -> Result<Self, NonFinite> {
      Ok(self)
   }

   fn serialize_tuple(self, _: usize) -> Result<Self, NonFinite> {
      Ok(self)
   }

   fn serialize_tuple_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
      Ok(self)
   }

   fn serialize_tuple_variant(
      self,
      _: &'static str,
      _: u32,
      _: &'static str,
      _: usize,
   ) -> Result<Self, NonFinite> {
      Ok(self)
   }

   fn serialize_map(self, _: Option<usize>) -> Result<Self, NonFinite> {
      Ok(self)
   }

   fn serialize_struct(self, _: &'static str, _: usize) -> Result<Self, NonFinite> {
      Ok(self)
   }

   fn serialize_struct_variant(
      self,
      _: &'static str,
      _: u32,
      _: &'static str,
      _: usize,
   ) -> Result<Self, NonFinite> {
      Ok(self)
   }
}

impl ser::SerializeSeq for FiniteCheck {
   type Ok = ();
   type Error = NonFinite;

   fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Check {
      value.serialize(FiniteCheck)
   }

   fn end(self) -> Check {
      Ok(())
   }
}

impl ser::SerializeTuple for FiniteCheck {
   type Ok = ();
   type Error = NonFinite;

   fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Check {
      value.serialize(FiniteCheck)
   }

   fn end(self) -> Check {
      Ok(())
   }
}

impl ser::SerializeTupleStruct for FiniteCheck {
   type Ok = ();
   type Error = NonFinite;

   fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Check {
      value.serialize(FiniteCheck)
   }

   fn end(self) -> Check {
      Ok(())
   }
}

impl ser::SerializeTupleVariant for FiniteCheck {
   type Ok = ();
   type Error = NonFinite;

   fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Check {
      value.serialize(FiniteCheck)
   }

   fn end(self) -> Check {
      Ok(())
   }
}

impl ser::SerializeMap for FiniteCheck {
   type Ok = ();
   type Error = NonFinite;

   fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Check {
      key.serialize(FiniteCheck)
   }

   fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Check {
      value.serialize(FiniteCheck)
   }

   fn end(self) -> Check {
      Ok(())
   }
}

impl ser::SerializeStruct for FiniteCheck {
   type Ok = ();
   type Error = NonFinite;

   fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &'static str, value: &T) -> Check {
      value.serialize(FiniteCheck)
   }

   fn end(self) -> Check {
      Ok(())
   }
}

impl ser::SerializeStructVariant for FiniteCheck {
   type Ok = ();
   type Error = NonFinite;

   fn serialize_field<T: Serialize + ?Sized>(&mut self, _: &'static str, value: &T) -> Check {
      value.serialize(FiniteCheck)
   }

   fn end(self) -> Check {
      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use std::collections::BTreeMap;

   use serde::Serialize;

   use super::*;

   #[derive(Serialize)]
   enum Shape {
      Circle { radius: f64 },
      Point(f32, f32),
   }

   #[test]
   fn test_finite_values_pass() {
      assert!(ensure_finite(&1.5f64).is_ok());
      assert!(ensure_finite(&vec![0.0f32, -0.0, f32::MAX]).is_ok());
      assert!(ensure_finite(&Shape::Circle { radius: 2.0 }).is_ok());
      assert!(ensure_finite(&("text", 7u64, None::<f64>)).is_ok());
   }

   #[test]
   fn test_non_finite_rejected_anywhere() {
      assert!(ensure_finite(&f64::NAN).is_err());
      assert!(ensure_finite(&Some(f64::INFINITY)).is_err());
      assert!(ensure_finite(&vec![1.0, f64::NEG_INFINITY]).is_err());
      assert!(ensure_finite(&Shape::Point(0.0, f32::NAN)).is_err());
      assert!(ensure_finite(&Shape::Circle { radius: f64::NAN }).is_err());
      assert!(ensure_finite(&BTreeMap::from([("x", f64::INFINITY)])).is_err());

      let message = ensure_finite(&f64::NAN).unwrap_err();
      assert!(message.contains("NaN"), "{message}");
   }
}
