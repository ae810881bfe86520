//! Codec registry keyed by stable type keys.

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::codec::{Codec, SerdeCodec};
use crate::error::{Error, Result};
use crate::format::WireFormat;

/// Stable name identifying a value type, independent of the Rust type path.
///
/// Keys end up in error messages and logs, so pick something readable
/// (`"location"`, `"world"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey(pub &'static str);

impl fmt::Display for TypeKey {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(self.0)
   }
}

struct Registered {
   type_name: &'static str,
   /// Holds an `Arc<dyn Codec<T>>` for the registered `T`
   codec: Arc<dyn Any + Send + Sync>,
}

/// Map from [`TypeKey`] to the codec for that type.
///
/// Codecs are looked up once, when a column is registered; encoding and
/// decoding never consult the registry.
#[derive(Clone, Default)]
pub struct CodecRegistry {
   codecs: HashMap<TypeKey, Arc<Registered>>,
}

impl CodecRegistry {
   pub fn new() -> Self {
      Self::default()
   }

   /// Register `codec` under its type key, replacing any earlier codec.
   pub fn register<T, C>(&mut self, codec: C) -> &mut Self
   where
      T: 'static,
      C: Codec<T> + 'static,
   {
      let key = codec.type_key();
      let codec: Arc<dyn Codec<T>> = Arc::new(codec);
      let previous = self.codecs.insert(
         key,
         Arc::new(Registered {
            type_name: type_name::<T>(),
            codec: Arc::new(codec),
         }),
      );

      if let Some(previous) = previous {
         debug!(type_key = %key, previous = previous.type_name, "Replaced registered codec");
      }
      self
   }

   /// Register a [`SerdeCodec`] for `T` using `format`.
   pub fn register_serde<T>(&mut self, key: TypeKey, format: WireFormat) -> &mut Self
   where
      T: Serialize + DeserializeOwned + 'static,
   {
      self.register::<T, _>(SerdeCodec::<T>::new(key, format))
   }

   /// Look up the codec registered under `key` for `T`.
   ///
   /// Fails with [`Error::UnregisteredType`] when nothing is registered under
   /// the key, and with [`Error::Serialization`] when the key belongs to a
   /// different type.
   pub fn resolve<T: 'static>(&self, key: TypeKey) -> Result<Arc<dyn Codec<T>>> {
      let registered = self
         .codecs
         .get(&key)
         .ok_or(Error::UnregisteredType(key))?;

      registered
         .codec
         .downcast_ref::<Arc<dyn Codec<T>>>()
         .cloned()
         .ok_or_else(|| {
            Error::serialization(
               key,
               format!(
                  "registered for {}, requested as {}",
                  registered.type_name,
                  type_name::<T>()
               ),
            )
         })
   }

   pub fn contains(&self, key: TypeKey) -> bool {
      self.codecs.contains_key(&key)
   }

   pub fn len(&self) -> usize {
      self.codecs.len()
   }

   pub fn is_empty(&self) -> bool {
      self.codecs.is_empty()
   }
}

impl fmt::Debug for CodecRegistry {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_map()
         .entries(self.codecs.iter().map(|(key, r)| (key, r.type_name)))
         .finish()
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::value::ColumnValue;

   #[test]
   fn test_resolve_registered() {
      let mut registry = CodecRegistry::new();
      registry.register_serde::<(i32, i32)>(TypeKey("pair"), WireFormat::Json);

      let codec = registry.resolve::<(i32, i32)>(TypeKey("pair")).unwrap();
      assert_eq!(
         codec.encode(&(1, 2)).unwrap(),
         ColumnValue::Text("[1,2]".into())
      );
      assert!(registry.contains(TypeKey("pair")));
      assert_eq!(registry.len(), 1);
   }

   #[test]
   fn test_resolve_unregistered() {
      let registry = CodecRegistry::new();
      let err = registry.resolve::<String>(TypeKey("world")).err().unwrap();
      assert!(matches!(err, Error::UnregisteredType(TypeKey("world"))));
      assert!(err.is_serialization());
   }

   #[test]
   fn test_resolve_wrong_type() {
      let mut registry = CodecRegistry::new();
      registry.register_serde::<String>(TypeKey("world"), WireFormat::Json);

      let err = registry.resolve::<u64>(TypeKey("world")).err().unwrap();
      assert!(matches!(err, Error::Serialization { .. }));
      assert!(err.to_string().contains("alloc::string::String"));
   }

   #[test]
   fn test_register_replaces() {
      let mut registry = CodecRegistry::new();
      registry
         .register_serde::<String>(TypeKey("world"), WireFormat::Json)
         .register_serde::<String>(TypeKey("world"), WireFormat::Tag);

      let codec = registry.resolve::<String>(TypeKey("world")).unwrap();
      assert_eq!(codec.format(), WireFormat::Tag);
      assert_eq!(registry.len(), 1);
   }
}
