//! Filter expressions over typed columns, rendered with bound parameters.

use sqlx_sqlite_columns::{ColumnValue, TypedColumn, quote_identifier};

use crate::Result;

/// A boolean filter over a table's columns.
///
/// Comparison operands are encoded with the column's codec, so they match
/// stored payloads exactly. Build predicates from a [`TypedColumn`] through
/// [`ColumnPredicates`] and combine them with [`and`](Self::and),
/// [`or`](Self::or) and [`not`](Self::not).
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
   Equals { column: String, value: ColumnValue },
   NotEquals { column: String, value: ColumnValue },
   In { column: String, values: Vec<ColumnValue> },
   Like { column: String, pattern: String },
   IsNull(String),
   And(Box<Predicate>, Box<Predicate>),
   Or(Box<Predicate>, Box<Predicate>),
   Not(Box<Predicate>),
}

impl Predicate {
   pub fn and(self, other: Predicate) -> Predicate {
      Predicate::And(Box::new(self), Box::new(other))
   }

   pub fn or(self, other: Predicate) -> Predicate {
      Predicate::Or(Box::new(self), Box::new(other))
   }

   #[allow(clippy::should_implement_trait)]
   pub fn not(self) -> Predicate {
      Predicate::Not(Box::new(self))
   }

   /// Names of every column the predicate references.
   pub fn columns(&self) -> Vec<&str> {
      let mut names = Vec::new();
      self.collect_columns(&mut names);
      names
   }

   fn collect_columns<'a>(&'a self, names: &mut Vec<&'a str>) {
      match self {
         Predicate::Equals { column, .. }
         | Predicate::NotEquals { column, .. }
         | Predicate::In { column, .. }
         | Predicate::Like { column, .. }
         | Predicate::IsNull(column) => names.push(column),
         Predicate::And(lhs, rhs) | Predicate::Or(lhs, rhs) => {
            lhs.collect_columns(names);
            rhs.collect_columns(names);
         }
         Predicate::Not(inner) => inner.collect_columns(names),
      }
   }

   /// Render as a SQL boolean expression with `?` placeholders, returning
   /// the values to bind in order.
   pub fn to_sql(&self) -> (String, Vec<ColumnValue>) {
      let mut sql = String::new();
      let mut values = Vec::new();
      self.write_sql(&mut sql, &mut values);
      (sql, values)
   }

   fn write_sql(&self, sql: &mut String, values: &mut Vec<ColumnValue>) {
      match self {
         Predicate::Equals { column, value } => {
            sql.push_str(&format!("{} = ?", quote_identifier(column)));
            values.push(value.clone());
         }
         Predicate::NotEquals { column, value } => {
            sql.push_str(&format!("{} <> ?", quote_identifier(column)));
            values.push(value.clone());
         }
         Predicate::In { column, values: list } => {
            // `IN ()` is not valid SQLite; an empty list matches nothing
            if list.is_empty() {
               sql.push('0');
               return;
            }
            let placeholders = vec!["?"; list.len()].join(", ");
            sql.push_str(&format!("{} IN ({placeholders})", quote_identifier(column)));
            values.extend(list.iter().cloned());
         }
         Predicate::Like { column, pattern } => {
            sql.push_str(&format!("{} LIKE ?", quote_identifier(column)));
            values.push(ColumnValue::Text(pattern.clone()));
         }
         Predicate::IsNull(column) => {
            sql.push_str(&format!("{} IS NULL", quote_identifier(column)));
         }
         Predicate::And(lhs, rhs) => write_binary(sql, values, lhs, "AND", rhs),
         Predicate::Or(lhs, rhs) => write_binary(sql, values, lhs, "OR", rhs),
         Predicate::Not(inner) => {
            sql.push_str("NOT (");
            inner.write_sql(sql, values);
            sql.push(')');
         }
      }
   }
}

fn write_binary(
   sql: &mut String,
   values: &mut Vec<ColumnValue>,
   lhs: &Predicate,
   op: &str,
   rhs: &Predicate,
) {
   sql.push('(');
   lhs.write_sql(sql, values);
   sql.push_str(") ");
   sql.push_str(op);
   sql.push_str(" (");
   rhs.write_sql(sql, values);
   sql.push(')');
}

/// Predicate constructors on typed columns.
pub trait ColumnPredicates<T> {
   /// Column equals the encoded `value`.
   fn equals(&self, value: &T) -> Result<Predicate>;

   fn not_equals(&self, value: &T) -> Result<Predicate>;

   /// Column equals any of `values`.
   fn is_in<'a, I>(&self, values: I) -> Result<Predicate>
   where
      I: IntoIterator<Item = &'a T>,
      T: 'a;

   /// SQL `LIKE` against the stored text.
   fn like(&self, pattern: impl Into<String>) -> Predicate;

   fn is_null(&self) -> Predicate;
}

impl<T> ColumnPredicates<T> for TypedColumn<T> {
   fn equals(&self, value: &T) -> Result<Predicate> {
      Ok(Predicate::Equals {
         column: self.name().to_string(),
         value: self.encode(value)?,
      })
   }

   fn not_equals(&self, value: &T) -> Result<Predicate> {
      Ok(Predicate::NotEquals {
         column: self.name().to_string(),
         value: self.encode(value)?,
      })
   }

   fn is_in<'a, I>(&self, values: I) -> Result<Predicate>
   where
      I: IntoIterator<Item = &'a T>,
      T: 'a,
   {
      let values = values
         .into_iter()
         .map(|value| self.encode(value))
         .collect::<sqlx_sqlite_columns::Result<Vec<_>>>()?;
      Ok(Predicate::In {
         column: self.name().to_string(),
         values,
      })
   }

   fn like(&self, pattern: impl Into<String>) -> Predicate {
      Predicate::Like {
         column: self.name().to_string(),
         pattern: pattern.into(),
      }
   }

   fn is_null(&self) -> Predicate {
      Predicate::IsNull(self.name().to_string())
   }
}

#[cfg(test)]
mod tests {
   use sqlx_sqlite_columns::{Table, TypeKey};

   use super::*;

   #[test]
   fn test_render_compound_predicate() {
      let mut table = Table::new("homes").unwrap();
      let owner = table.varchar::<String>("owner", 36, TypeKey("owner")).unwrap();
      let world = table.json::<String>("world", TypeKey("world"), None).unwrap();

      let predicate = owner
         .equals(&"steve".to_string())
         .unwrap()
         .or(world.like("%nether%"))
         .and(world.is_null().not());

      let (sql, values) = predicate.to_sql();
      assert_eq!(
         sql,
         r#"(("owner" = ?) OR ("world" LIKE ?)) AND (NOT ("world" IS NULL))"#
      );
      assert_eq!(
         values,
         vec![
            ColumnValue::Text("\"steve\"".into()),
            ColumnValue::Text("%nether%".into()),
         ]
      );
      assert_eq!(predicate.columns(), vec!["owner", "world", "world"]);
   }

   #[test]
   fn test_in_list() {
      let mut table = Table::new("scores").unwrap();
      let score = table.bincode::<u32>("score", TypeKey("score"), None).unwrap();

      let (sql, values) = score.is_in([&1, &2]).unwrap().to_sql();
      assert_eq!(sql, r#""score" IN (?, ?)"#);
      assert_eq!(values.len(), 2);

      let (sql, values) = score.is_in(std::iter::empty()).unwrap().to_sql();
      assert_eq!(sql, "0");
      assert!(values.is_empty());
   }

   #[test]
   fn test_operand_respects_column_bound() {
      let mut table = Table::new("names").unwrap();
      let name = table.varchar::<String>("name", 4, TypeKey("name")).unwrap();
      assert!(name.equals(&"far too long".to_string()).is_err());
   }
}
