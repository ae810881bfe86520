//! RAII guard for the single writer connection

use std::ops::{Deref, DerefMut};

use sqlx::Sqlite;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteConnection;

/// Exclusive access to the database's writer connection.
///
/// The connection goes back to the write pool when the guard is dropped,
/// which lets the next waiting writer proceed.
#[must_use = "if unused, the write lock is immediately released"]
#[derive(Debug)]
pub struct WriteGuard {
   conn: PoolConnection<Sqlite>,
}

impl WriteGuard {
   pub(crate) fn new(conn: PoolConnection<Sqlite>) -> Self {
      Self { conn }
   }

   /// Close the underlying connection instead of returning it to the pool.
   ///
   /// SQLite discards any transaction still open on a closed connection, so
   /// this is the fallback when a `ROLLBACK` cannot be issued.
   pub fn close_on_drop(&mut self) {
      self.conn.close_on_drop();
   }
}

impl Deref for WriteGuard {
   type Target = SqliteConnection;

   fn deref(&self) -> &Self::Target {
      &self.conn
   }
}

impl DerefMut for WriteGuard {
   fn deref_mut(&mut self) -> &mut Self::Target {
      &mut self.conn
   }
}
