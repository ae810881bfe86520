//! Binding and reading physical column payloads

use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, TypeInfo, ValueRef};
use sqlx_sqlite_columns::{ColumnValue, TypedColumn};

use crate::Result;

pub(crate) type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Bind a physical payload to a query, as TEXT or BLOB.
pub(crate) fn bind_value(query: SqliteQuery<'_>, value: ColumnValue) -> SqliteQuery<'_> {
   match value {
      ColumnValue::Text(text) => query.bind(text),
      ColumnValue::Blob(bytes) => query.bind(bytes),
   }
}

/// Read the payload at `index` in whatever storage class the cell holds.
///
/// The column adapts TEXT and BLOB payloads to its codec when decoding. Any
/// other storage class (NULL, INTEGER, REAL) is a serialization error.
pub(crate) fn read_value<T>(
   row: &SqliteRow,
   index: usize,
   column: &TypedColumn<T>,
) -> Result<ColumnValue> {
   let raw = row.try_get_raw(index)?;
   let type_info = raw.type_info();
   let class = if raw.is_null() {
      "NULL"
   } else {
      type_info.name()
   };

   match class {
      "TEXT" => Ok(row.try_get::<String, _>(index).map(ColumnValue::Text)?),
      "BLOB" => Ok(row.try_get::<Vec<u8>, _>(index).map(ColumnValue::Blob)?),
      other => Err(sqlx_sqlite_columns::Error::Serialization {
         type_key: column.descriptor().type_key(),
         reason: format!(
            "column '{}' holds {other}, expected TEXT or BLOB",
            column.name()
         ),
      }
      .into()),
   }
}
