//! DDL for table descriptors

use sqlx_sqlite_columns::{ColumnKind, Table, quote_identifier};
use sqlx_sqlite_conn_mgr::Dialect;

/// Native type name for a column kind.
pub fn column_type(kind: ColumnKind, dialect: &dyn Dialect) -> String {
   match kind {
      ColumnKind::BoundedText(length) => dialect.varchar_type(length),
      ColumnKind::Text => dialect.text_type(),
      ColumnKind::BoundedBinary(length) => dialect.binary_type(length),
      ColumnKind::Binary => dialect.blob_type(),
   }
}

/// `CREATE TABLE IF NOT EXISTS` statement for `table`.
///
/// The primary key column is `NOT NULL`; every other column is nullable so
/// rows can be written through managers that only know the key and value.
pub fn create_table_sql(table: &Table, dialect: &dyn Dialect) -> String {
   let primary_key = table.primary_key().map(|pk| pk.name().to_string());

   let mut definitions: Vec<String> = table
      .columns()
      .map(|column| {
         let mut definition = format!(
            "{} {}",
            quote_identifier(column.name()),
            column_type(column.kind(), dialect)
         );
         if primary_key.as_deref() == Some(column.name()) {
            definition.push_str(" NOT NULL");
         }
         definition
      })
      .collect();

   if let Some(pk) = &primary_key {
      definitions.push(format!("PRIMARY KEY ({})", quote_identifier(pk)));
   }

   format!(
      "CREATE TABLE IF NOT EXISTS {} ({})",
      quote_identifier(table.name()),
      definitions.join(", ")
   )
}

#[cfg(test)]
mod tests {
   use sqlx_sqlite_columns::TypeKey;
   use sqlx_sqlite_conn_mgr::SqliteDialect;

   use super::*;

   #[test]
   fn test_create_table_sql() {
      let mut table = Table::new("homes").unwrap();
      table.varchar::<String>("owner", 36, TypeKey("owner")).unwrap();
      table.json::<String>("label", TypeKey("label"), None).unwrap();
      table.tag::<(i32, i32, i32)>("home", TypeKey("coords"), Some(64)).unwrap();
      table.set_primary_key("owner").unwrap();

      assert_eq!(
         create_table_sql(&table, &SqliteDialect),
         r#"CREATE TABLE IF NOT EXISTS "homes" ("owner" VARCHAR(36) NOT NULL, "label" TEXT, "home" BLOB, PRIMARY KEY ("owner"))"#
      );
   }

   #[test]
   fn test_create_table_without_primary_key() {
      let mut table = Table::new("log").unwrap();
      table.json::<String>("line", TypeKey("line"), None).unwrap();

      assert_eq!(
         create_table_sql(&table, &SqliteDialect),
         r#"CREATE TABLE IF NOT EXISTS "log" ("line" TEXT)"#
      );
   }
}
