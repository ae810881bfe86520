//! Key-value table manager

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::sqlite::SqliteRow;
use sqlx_sqlite_columns::{Table, TypedColumn, quote_identifier};
use tracing::{debug, trace};

use crate::bind::{bind_value, read_value};
use crate::config::{ManagerConfig, UpsertStrategy};
use crate::predicate::Predicate;
use crate::schema::create_table_sql;
use crate::scope::{Deferred, Job, TransactionScope};
use crate::transactions::Transaction;
use crate::{Error, Result};

/// A key paired with its value, as stored in one row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entity<K, V> {
   pub key: K,
   pub value: V,
}

impl<K, V> Entity<K, V> {
   pub fn new(key: K, value: V) -> Self {
      Self { key, value }
   }

   pub fn into_pair(self) -> (K, V) {
      (self.key, self.value)
   }
}

impl<K, V> From<(K, V)> for Entity<K, V> {
   fn from((key, value): (K, V)) -> Self {
      Self::new(key, value)
   }
}

/// SQL text prepared once per manager.
#[derive(Debug)]
struct Statements {
   create: String,
   insert: String,
   upsert: String,
   update: String,
   select: String,
   contains: String,
   select_all: String,
   count: String,
   delete: String,
   delete_all: String,
}

impl Statements {
   fn new(table: &Table, key: &str, value: &str, dialect: &dyn sqlx_sqlite_conn_mgr::Dialect) -> Self {
      let t = quote_identifier(table.name());
      let k = quote_identifier(key);
      let v = quote_identifier(value);

      Self {
         create: create_table_sql(table, dialect),
         insert: format!("INSERT INTO {t} ({k}, {v}) VALUES (?, ?)"),
         upsert: format!(
            "INSERT INTO {t} ({k}, {v}) VALUES (?, ?) ON CONFLICT ({k}) DO UPDATE SET {v} = excluded.{v}"
         ),
         update: format!("UPDATE {t} SET {v} = ? WHERE {k} = ?"),
         select: format!("SELECT {k}, {v} FROM {t} WHERE {k} = ?"),
         contains: format!("SELECT 1 FROM {t} WHERE {k} = ? LIMIT 1"),
         select_all: format!("SELECT {k}, {v} FROM {t} ORDER BY rowid"),
         count: format!("SELECT COUNT(*) FROM {t}"),
         delete: format!("DELETE FROM {t} WHERE {k} = ? RETURNING {k}, {v}"),
         delete_all: format!("DELETE FROM {t}"),
      }
   }
}

struct Inner<K, V> {
   table: Table,
   key: TypedColumn<K>,
   value: TypedColumn<V>,
   scope: TransactionScope,
   config: ManagerConfig,
   sql: Statements,
}

/// Key-value access to one table, keyed by its primary key column.
///
/// Direct operations take the caller's open [`Transaction`]; they fail with
/// [`Error::NoActiveTransaction`] once it has been committed or rolled back.
/// The `manage_*` variants submit the same operation as its own unit of work
/// through the manager's [`TransactionScope`].
///
/// Values are encoded and length-checked before any statement runs, so a
/// rejected value never reaches the database.
pub struct TableManager<K, V> {
   inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for TableManager<K, V> {
   fn clone(&self) -> Self {
      Self {
         inner: Arc::clone(&self.inner),
      }
   }
}

impl<K, V> fmt::Debug for TableManager<K, V> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("TableManager")
         .field("table", &self.inner.table.name())
         .field("key", self.inner.key.descriptor())
         .field("value", self.inner.value.descriptor())
         .field("config", &self.inner.config)
         .finish_non_exhaustive()
   }
}

impl<K, V> TableManager<K, V>
where
   K: Send + Sync + 'static,
   V: Send + Sync + 'static,
{
   /// Bind `key` and `value` columns of `table` to a scope.
   ///
   /// `key` must be the table's primary key and both columns must have been
   /// registered on `table`.
   pub fn new(
      table: Table,
      key: TypedColumn<K>,
      value: TypedColumn<V>,
      scope: TransactionScope,
      config: ManagerConfig,
   ) -> Result<Self> {
      let invalid = |reason: &str| Error::InvalidSchema {
         table: table.name().to_string(),
         reason: reason.to_string(),
      };

      match table.primary_key() {
         Some(pk) if pk == key.descriptor() => {}
         Some(_) => return Err(invalid("key column is not the primary key")),
         None => return Err(invalid("table has no primary key")),
      }
      if table.get(value.name()) != Some(value.descriptor()) {
         return Err(invalid("value column is not registered on the table"));
      }
      if key.name() == value.name() {
         return Err(invalid("key and value must be distinct columns"));
      }

      let sql = Statements::new(&table, key.name(), value.name(), scope.database().dialect());

      Ok(Self {
         inner: Arc::new(Inner {
            table,
            key,
            value,
            scope,
            config,
            sql,
         }),
      })
   }

   pub fn table(&self) -> &Table {
      &self.inner.table
   }

   pub fn name(&self) -> &str {
      self.inner.table.name()
   }

   pub fn key_column(&self) -> &TypedColumn<K> {
      &self.inner.key
   }

   pub fn value_column(&self) -> &TypedColumn<V> {
      &self.inner.value
   }

   pub fn scope(&self) -> &TransactionScope {
      &self.inner.scope
   }

   pub fn config(&self) -> &ManagerConfig {
      &self.inner.config
   }

   /// Create the table if it does not exist.
   pub async fn create(&self, tx: &mut Transaction) -> Result<()> {
      tx.execute(&self.inner.sql.create, vec![]).await?;
      debug!(table = %self.name(), "Ensured table exists");
      Ok(())
   }

   /// Insert a new row.
   ///
   /// Fails with [`Error::DuplicateKey`] if the key is already present.
   pub async fn insert(&self, tx: &mut Transaction, key: K, value: V) -> Result<Entity<K, V>> {
      let k = self.inner.key.encode(&key)?;
      let v = self.inner.value.encode(&value)?;

      tx.execute(&self.inner.sql.insert, vec![k, v])
         .await
         .map_err(|e| self.classify(e))?;
      trace!(table = %self.name(), "Inserted row");
      Ok(Entity::new(key, value))
   }

   /// Replace the value of an existing row. Returns `None` if the key is absent.
   pub async fn update(
      &self,
      tx: &mut Transaction,
      key: K,
      value: V,
   ) -> Result<Option<Entity<K, V>>> {
      let k = self.inner.key.encode(&key)?;
      let v = self.inner.value.encode(&value)?;

      let result = tx.execute(&self.inner.sql.update, vec![v, k]).await?;
      trace!(table = %self.name(), rows = result.rows_affected(), "Updated row");
      Ok((result.rows_affected() > 0).then(|| Entity::new(key, value)))
   }

   /// Insert the row, or replace its value if the key exists.
   ///
   /// See [`UpsertStrategy`] for how concurrent inserts of the same key
   /// behave.
   pub async fn upsert(&self, tx: &mut Transaction, key: K, value: V) -> Result<Entity<K, V>> {
      match self.inner.config.upsert {
         UpsertStrategy::TwoStep => {
            if self.contains(tx, &key).await? {
               self
                  .update(tx, key, value)
                  .await?
                  .ok_or_else(|| self.key_not_found())
            } else {
               self.insert(tx, key, value).await
            }
         }
         UpsertStrategy::Atomic => {
            let k = self.inner.key.encode(&key)?;
            let v = self.inner.value.encode(&value)?;
            tx.execute(&self.inner.sql.upsert, vec![k, v]).await?;
            Ok(Entity::new(key, value))
         }
      }
   }

   /// Look up the row for `key`.
   pub async fn find(&self, tx: &mut Transaction, key: &K) -> Result<Option<Entity<K, V>>> {
      let k = self.inner.key.encode(key)?;
      let row = bind_value(sqlx::query(&self.inner.sql.select), k)
         .fetch_optional(tx.connection()?)
         .await?;

      row.map(|row| self.entity_from_row(&row)).transpose()
   }

   /// Like [`find`](Self::find), but a missing key is [`Error::KeyNotFound`].
   pub async fn get(&self, tx: &mut Transaction, key: &K) -> Result<Entity<K, V>> {
      self
         .find(tx, key)
         .await?
         .ok_or_else(|| self.key_not_found())
   }

   pub async fn contains(&self, tx: &mut Transaction, key: &K) -> Result<bool> {
      let k = self.inner.key.encode(key)?;
      let row = bind_value(sqlx::query(&self.inner.sql.contains), k)
         .fetch_optional(tx.connection()?)
         .await?;
      Ok(row.is_some())
   }

   /// Stream every row, in insertion order.
   ///
   /// Each call runs a fresh query. The stream borrows the transaction until
   /// it is dropped.
   pub fn all<'a>(&'a self, tx: &'a mut Transaction) -> BoxStream<'a, Result<Entity<K, V>>> {
      let conn = match tx.connection() {
         Ok(conn) => conn,
         Err(e) => return stream::once(async move { Err(e) }).boxed(),
      };

      sqlx::query(&self.inner.sql.select_all)
         .fetch(conn)
         .map(move |row| self.entity_from_row(&row?))
         .boxed()
   }

   pub async fn count(&self, tx: &mut Transaction) -> Result<u64> {
      let (count,): (i64,) = sqlx::query_as(&self.inner.sql.count)
         .fetch_one(tx.connection()?)
         .await?;
      Ok(u64::try_from(count).unwrap_or_default())
   }

   /// Delete the row for `key`, returning what was removed.
   ///
   /// Deleting an absent key returns `None`.
   pub async fn delete(&self, tx: &mut Transaction, key: &K) -> Result<Option<Entity<K, V>>> {
      let k = self.inner.key.encode(key)?;
      let row = bind_value(sqlx::query(&self.inner.sql.delete), k)
         .fetch_optional(tx.connection()?)
         .await?;

      trace!(table = %self.name(), deleted = row.is_some(), "Deleted row");
      row.map(|row| self.entity_from_row(&row)).transpose()
   }

   /// Delete the row with `entity`'s key.
   pub async fn delete_entity(
      &self,
      tx: &mut Transaction,
      entity: &Entity<K, V>,
   ) -> Result<Option<Entity<K, V>>> {
      self.delete(tx, &entity.key).await
   }

   /// Delete rows matching `predicate`, returning how many were removed.
   ///
   /// With a `limit` or `offset`, the window is taken over matching rows in
   /// insertion order.
   pub async fn delete_if(
      &self,
      tx: &mut Transaction,
      predicate: &Predicate,
      limit: Option<u64>,
      offset: Option<u64>,
   ) -> Result<u64> {
      for column in predicate.columns() {
         if self.inner.table.get(column).is_none() {
            return Err(sqlx_sqlite_columns::Error::UnknownColumn(column.to_string()).into());
         }
      }

      let (condition, values) = predicate.to_sql();
      let t = quote_identifier(self.name());
      let k = quote_identifier(self.inner.key.name());
      let windowed = limit.is_some() || offset.is_some();

      let sql = if windowed {
         format!(
            "DELETE FROM {t} WHERE {k} IN (SELECT {k} FROM {t} WHERE {condition} ORDER BY rowid LIMIT ? OFFSET ?)"
         )
      } else {
         format!("DELETE FROM {t} WHERE {condition}")
      };

      let mut q = sqlx::query(&sql);
      for value in values {
         q = bind_value(q, value);
      }
      if windowed {
         // SQLite treats a negative LIMIT as "no limit"
         q = q
            .bind(limit.map_or(-1, saturating_i64))
            .bind(offset.map_or(0, saturating_i64));
      }

      let result = q.execute(tx.connection()?).await?;
      debug!(table = %self.name(), rows = result.rows_affected(), "Deleted matching rows");
      Ok(result.rows_affected())
   }

   pub async fn delete_all(&self, tx: &mut Transaction) -> Result<u64> {
      let result = tx.execute(&self.inner.sql.delete_all, vec![]).await?;
      debug!(table = %self.name(), rows = result.rows_affected(), "Deleted all rows");
      Ok(result.rows_affected())
   }

   /// Insert every entry, stopping at the first failure.
   pub async fn insert_all<I>(&self, tx: &mut Transaction, entries: I) -> Result<Vec<Entity<K, V>>>
   where
      I: IntoIterator<Item = (K, V)>,
   {
      let mut inserted = Vec::new();
      for (key, value) in entries {
         tx.checkpoint()?;
         inserted.push(self.insert(tx, key, value).await?);
      }
      Ok(inserted)
   }

   /// Update every entry whose key exists; absent keys are skipped.
   pub async fn update_all<I>(&self, tx: &mut Transaction, entries: I) -> Result<Vec<Entity<K, V>>>
   where
      I: IntoIterator<Item = (K, V)>,
   {
      let mut updated = Vec::new();
      for (key, value) in entries {
         tx.checkpoint()?;
         if let Some(entity) = self.update(tx, key, value).await? {
            updated.push(entity);
         }
      }
      Ok(updated)
   }

   /// Upsert every entry, stopping at the first failure.
   pub async fn upsert_all<I>(&self, tx: &mut Transaction, entries: I) -> Result<Vec<Entity<K, V>>>
   where
      I: IntoIterator<Item = (K, V)>,
   {
      let mut written = Vec::new();
      for (key, value) in entries {
         tx.checkpoint()?;
         written.push(self.upsert(tx, key, value).await?);
      }
      Ok(written)
   }

   pub fn manage_create(&self) -> Job {
      self.management(|manager, tx| Box::pin(async move { manager.create(tx).await }))
   }

   pub fn manage_insert(&self, key: K, value: V) -> Job {
      self.management(move |manager, tx| {
         Box::pin(async move { manager.insert(tx, key, value).await })
      })
   }

   pub fn manage_update(&self, key: K, value: V) -> Job {
      self.management(move |manager, tx| {
         Box::pin(async move { manager.update(tx, key, value).await })
      })
   }

   pub fn manage_upsert(&self, key: K, value: V) -> Job {
      self.management(move |manager, tx| {
         Box::pin(async move { manager.upsert(tx, key, value).await })
      })
   }

   pub fn manage_delete(&self, key: K) -> Job {
      self.management(move |manager, tx| {
         Box::pin(async move { manager.delete(tx, &key).await })
      })
   }

   pub fn manage_delete_entity(&self, entity: Entity<K, V>) -> Job {
      self.management(move |manager, tx| {
         Box::pin(async move { manager.delete_entity(tx, &entity).await })
      })
   }

   pub fn manage_delete_if(
      &self,
      predicate: Predicate,
      limit: Option<u64>,
      offset: Option<u64>,
   ) -> Job {
      self.management(move |manager, tx| {
         Box::pin(async move { manager.delete_if(tx, &predicate, limit, offset).await })
      })
   }

   pub fn manage_delete_all(&self) -> Job {
      self.management(|manager, tx| Box::pin(async move { manager.delete_all(tx).await }))
   }

   pub fn manage_insert_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Job {
      let entries: Vec<(K, V)> = entries.into_iter().collect();
      self.management(move |manager, tx| {
         Box::pin(async move { manager.insert_all(tx, entries).await })
      })
   }

   pub fn manage_update_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Job {
      let entries: Vec<(K, V)> = entries.into_iter().collect();
      self.management(move |manager, tx| {
         Box::pin(async move { manager.update_all(tx, entries).await })
      })
   }

   pub fn manage_upsert_all(&self, entries: impl IntoIterator<Item = (K, V)>) -> Job {
      let entries: Vec<(K, V)> = entries.into_iter().collect();
      self.management(move |manager, tx| {
         Box::pin(async move { manager.upsert_all(tx, entries).await })
      })
   }

   /// [`TransactionScope::management`] with this manager handed to the unit.
   pub fn management<T, F>(&self, work: F) -> Job
   where
      T: Send + 'static,
      F: for<'t> FnOnce(Self, &'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let manager = self.clone();
      self.inner.scope.management(move |tx| work(manager, tx))
   }

   /// [`TransactionScope::lazy_management`] with this manager handed to the unit.
   pub fn lazy_management<T, F>(&self, work: F) -> Job
   where
      T: Send + 'static,
      F: for<'t> FnOnce(Self, &'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let manager = self.clone();
      self.inner.scope.lazy_management(move |tx| work(manager, tx))
   }

   /// [`TransactionScope::management_async`] with this manager handed to the unit.
   pub fn management_async<T, F>(&self, work: F) -> Deferred<T>
   where
      T: Send + 'static,
      F: for<'t> FnOnce(Self, &'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let manager = self.clone();
      self.inner.scope.management_async(move |tx| work(manager, tx))
   }

   /// [`TransactionScope::lazy_management_async`] with this manager handed to the unit.
   pub fn lazy_management_async<T, F>(&self, work: F) -> Deferred<T>
   where
      T: Send + 'static,
      F: for<'t> FnOnce(Self, &'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let manager = self.clone();
      self.inner.scope.lazy_management_async(move |tx| work(manager, tx))
   }

   /// [`TransactionScope::transaction`] with this manager handed to the unit.
   /// Hangs on an undriven `current_thread` scheduler, like the scope's.
   ///
   /// # Panics
   ///
   /// Panics if called from within an asynchronous execution context.
   pub fn transaction<T, F>(&self, work: F) -> Result<T>
   where
      T: Send + 'static,
      F: for<'t> FnOnce(Self, &'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let manager = self.clone();
      self.inner.scope.transaction(move |tx| work(manager, tx))
   }

   fn entity_from_row(&self, row: &SqliteRow) -> Result<Entity<K, V>> {
      let key = self
         .inner
         .key
         .decode(read_value(row, 0, &self.inner.key)?)?;
      let value = self
         .inner
         .value
         .decode(read_value(row, 1, &self.inner.value)?)?;
      Ok(Entity::new(key, value))
   }

   fn classify(&self, e: Error) -> Error {
      match e {
         Error::Sqlx(ref sqlx_err)
            if sqlx_err
               .as_database_error()
               .is_some_and(|db_err| db_err.is_unique_violation()) =>
         {
            Error::DuplicateKey {
               table: self.name().to_string(),
            }
         }
         e => e,
      }
   }

   fn key_not_found(&self) -> Error {
      Error::KeyNotFound {
         table: self.name().to_string(),
      }
   }
}

fn saturating_i64(n: u64) -> i64 {
   i64::try_from(n).unwrap_or(i64::MAX)
}
