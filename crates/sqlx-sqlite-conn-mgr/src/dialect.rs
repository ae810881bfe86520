//! Native column type names reported by a database handle

/// SQL dialect a database handle is bound to.
///
/// Column descriptors are physical-kind based (bounded/unbounded text or
/// binary); the dialect turns those kinds into the engine's type names when a
/// table is created.
pub trait Dialect: Send + Sync + std::fmt::Debug {
   /// Short name used in logs
   fn name(&self) -> &'static str;

   /// Unbounded text
   fn text_type(&self) -> String;

   /// Text capped at `length` characters
   fn varchar_type(&self, length: u32) -> String;

   /// Binary capped at `length` bytes
   fn binary_type(&self, length: u32) -> String;

   /// Unbounded binary
   fn blob_type(&self) -> String;
}

/// SQLite type names.
///
/// SQLite has no sized binary type, so bounded binary columns are plain
/// `BLOB`s and their bound is only enforced client-side.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
   fn name(&self) -> &'static str {
      "sqlite"
   }

   fn text_type(&self) -> String {
      "TEXT".to_string()
   }

   fn varchar_type(&self, length: u32) -> String {
      format!("VARCHAR({length})")
   }

   fn binary_type(&self, _length: u32) -> String {
      "BLOB".to_string()
   }

   fn blob_type(&self) -> String {
      "BLOB".to_string()
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_sqlite_type_names() {
      let dialect = SqliteDialect;
      assert_eq!(dialect.text_type(), "TEXT");
      assert_eq!(dialect.varchar_type(24), "VARCHAR(24)");
      assert_eq!(dialect.binary_type(64), "BLOB");
      assert_eq!(dialect.blob_type(), "BLOB");
   }
}
