//! Table descriptors: an ordered set of columns plus a primary key.

use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::{Codec, SerdeCodec};
use crate::column::{ColumnDescriptor, ColumnKind, TypedColumn};
use crate::error::{Error, Result};
use crate::format::WireFormat;
use crate::ident::validate_identifier;
use crate::registry::{CodecRegistry, TypeKey};

/// Physical schema of one table.
///
/// Registration methods hand back the [`TypedColumn`] used to encode and
/// decode values of that column; the table keeps only its descriptor.
///
/// ```
/// use sqlx_sqlite_columns::{ColumnKind, Table, TypeKey};
///
/// let mut table = Table::new("homes").unwrap();
/// let owner = table.varchar::<String>("owner", 36, TypeKey("player")).unwrap();
/// let home = table.tag::<(i32, i32, i32)>("home", TypeKey("coords"), None).unwrap();
/// table.set_primary_key("owner").unwrap();
///
/// assert_eq!(owner.kind(), ColumnKind::BoundedText(36));
/// assert_eq!(home.kind(), ColumnKind::Binary);
/// assert_eq!(table.primary_key().unwrap().name(), "owner");
/// ```
#[derive(Debug, Clone)]
pub struct Table {
   name: String,
   columns: IndexMap<String, ColumnDescriptor>,
   primary_key: Option<String>,
}

impl Table {
   pub fn new(name: impl Into<String>) -> Result<Self> {
      let name = name.into();
      validate_identifier(&name)?;
      Ok(Self {
         name,
         columns: IndexMap::new(),
         primary_key: None,
      })
   }

   pub fn name(&self) -> &str {
      &self.name
   }

   /// Declare a column bound to `codec`.
   pub fn register_column<T>(
      &mut self,
      name: impl Into<String>,
      kind: ColumnKind,
      codec: Arc<dyn Codec<T>>,
   ) -> Result<TypedColumn<T>> {
      let column = TypedColumn::new(name, kind, codec)?;

      match self.columns.entry(column.name().to_string()) {
         Entry::Occupied(e) => Err(Error::DuplicateColumn(e.key().clone())),
         Entry::Vacant(e) => {
            e.insert(column.descriptor().clone());
            Ok(column)
         }
      }
   }

   /// Declare a column whose codec is resolved from `registry`.
   pub fn column<T: 'static>(
      &mut self,
      registry: &CodecRegistry,
      name: impl Into<String>,
      kind: ColumnKind,
      type_key: TypeKey,
   ) -> Result<TypedColumn<T>> {
      let codec = registry.resolve::<T>(type_key)?;
      self.register_column(name, kind, codec)
   }

   /// Declare a column using a serde codec with `format`.
   pub fn serde_column<T>(
      &mut self,
      name: impl Into<String>,
      kind: ColumnKind,
      type_key: TypeKey,
      format: WireFormat,
   ) -> Result<TypedColumn<T>>
   where
      T: Serialize + DeserializeOwned + 'static,
   {
      self.register_column(name, kind, Arc::new(SerdeCodec::<T>::new(type_key, format)))
   }

   /// JSON text column, `VARCHAR(length)` when bounded.
   pub fn json<T>(
      &mut self,
      name: impl Into<String>,
      type_key: TypeKey,
      length: Option<u32>,
   ) -> Result<TypedColumn<T>>
   where
      T: Serialize + DeserializeOwned + 'static,
   {
      let kind = length.map_or(ColumnKind::Text, ColumnKind::BoundedText);
      self.serde_column(name, kind, type_key, WireFormat::Json)
   }

   /// Bounded JSON text column.
   pub fn varchar<T>(
      &mut self,
      name: impl Into<String>,
      length: u32,
      type_key: TypeKey,
   ) -> Result<TypedColumn<T>>
   where
      T: Serialize + DeserializeOwned + 'static,
   {
      self.json(name, type_key, Some(length))
   }

   /// Compact binary (bincode) column, length-checked when bounded.
   pub fn bincode<T>(
      &mut self,
      name: impl Into<String>,
      type_key: TypeKey,
      length: Option<u32>,
   ) -> Result<TypedColumn<T>>
   where
      T: Serialize + DeserializeOwned + 'static,
   {
      let kind = length.map_or(ColumnKind::Binary, ColumnKind::BoundedBinary);
      self.serde_column(name, kind, type_key, WireFormat::Bincode)
   }

   /// Tagged binary column, length-checked when bounded.
   pub fn tag<T>(
      &mut self,
      name: impl Into<String>,
      type_key: TypeKey,
      length: Option<u32>,
   ) -> Result<TypedColumn<T>>
   where
      T: Serialize + DeserializeOwned + 'static,
   {
      let kind = length.map_or(ColumnKind::Binary, ColumnKind::BoundedBinary);
      self.serde_column(name, kind, type_key, WireFormat::Tag)
   }

   /// Designate a registered column as the primary key.
   pub fn set_primary_key(&mut self, name: &str) -> Result<()> {
      if !self.columns.contains_key(name) {
         return Err(Error::UnknownColumn(name.to_string()));
      }
      self.primary_key = Some(name.to_string());
      Ok(())
   }

   pub fn primary_key(&self) -> Option<&ColumnDescriptor> {
      self
         .primary_key
         .as_deref()
         .and_then(|name| self.columns.get(name))
   }

   /// Columns in registration order.
   pub fn columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
      self.columns.values()
   }

   pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
      self.columns.get(name)
   }
}
