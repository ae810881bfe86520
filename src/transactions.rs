//! Write transactions on the single writer connection

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use sqlx::sqlite::{SqliteConnection, SqliteQueryResult};
use sqlx_sqlite_columns::ColumnValue;
use sqlx_sqlite_conn_mgr::{SqliteDatabase, WriteGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bind::bind_value;
use crate::{Error, Result};

/// Cooperative cancellation flag shared between a handle and its unit of work.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
   pub(crate) fn cancel(&self) {
      self.0.store(true, Ordering::Release);
   }

   pub(crate) fn is_cancelled(&self) -> bool {
      self.0.load(Ordering::Acquire)
   }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
   Active,
   Committed,
   RolledBack,
}

/// An open `BEGIN IMMEDIATE` transaction holding the database's writer.
///
/// Table manager operations take `&mut Transaction`. Once the transaction is
/// committed or rolled back every further statement fails with
/// [`Error::NoActiveTransaction`], and a second commit or rollback fails with
/// [`Error::TransactionAlreadyFinalized`].
///
/// Dropping a transaction that was never finalized rolls it back.
#[must_use = "if unused, the transaction is immediately rolled back"]
#[derive(Debug)]
pub struct Transaction {
   db_path: String,
   unit_id: String,
   writer: Option<WriteGuard>,
   state: TransactionState,
   cancel: CancelFlag,
}

impl Transaction {
   /// Acquire the writer and begin a transaction outside any scope.
   pub async fn begin(db: &SqliteDatabase) -> Result<Self> {
      Self::begin_unit(db, Uuid::new_v4().to_string(), CancelFlag::default()).await
   }

   pub(crate) async fn begin_unit(
      db: &SqliteDatabase,
      unit_id: String,
      cancel: CancelFlag,
   ) -> Result<Self> {
      let db_path = db.path().display().to_string();
      let mut writer = db.acquire_writer().await?;

      sqlx::query("BEGIN IMMEDIATE").execute(&mut *writer).await?;
      debug!(db = %db_path, unit = %unit_id, "Transaction started");

      Ok(Self {
         db_path,
         unit_id,
         writer: Some(writer),
         state: TransactionState::Active,
         cancel,
      })
   }

   pub fn db_path(&self) -> &str {
      &self.db_path
   }

   /// Identifier of the unit of work this transaction belongs to, used in logs.
   pub fn unit_id(&self) -> &str {
      &self.unit_id
   }

   /// Whether the transaction is still open.
   pub fn is_active(&self) -> bool {
      self.state == TransactionState::Active
   }

   /// Whether cancellation of the owning unit of work has been requested.
   pub fn is_cancelled(&self) -> bool {
      self.cancel.is_cancelled()
   }

   /// Logical cancellation point between statements.
   ///
   /// Returns [`Error::Cancelled`] once the owning handle has been cancelled;
   /// the managing scope then rolls the transaction back.
   pub fn checkpoint(&self) -> Result<()> {
      self.ensure_active()?;
      if self.cancel.is_cancelled() {
         debug!(unit = %self.unit_id, "Cancellation observed at checkpoint");
         return Err(Error::Cancelled);
      }
      Ok(())
   }

   /// Borrow the writer connection for custom statements.
   pub fn connection(&mut self) -> Result<&mut SqliteConnection> {
      self.ensure_active()?;
      match self.writer.as_mut() {
         Some(writer) => Ok(&mut **writer),
         None => Err(Error::NoActiveTransaction(self.db_path.clone())),
      }
   }

   /// Execute a single statement with bound payloads.
   pub async fn execute(
      &mut self,
      query: &str,
      values: Vec<ColumnValue>,
   ) -> Result<SqliteQueryResult> {
      let mut q = sqlx::query(query);
      for value in values {
         q = bind_value(q, value);
      }
      Ok(q.execute(self.connection()?).await?)
   }

   /// Commit this transaction
   pub async fn commit(&mut self) -> Result<()> {
      self.finalize("COMMIT", TransactionState::Committed).await?;
      debug!(db = %self.db_path, unit = %self.unit_id, "Transaction committed");
      Ok(())
   }

   /// Rollback this transaction
   pub async fn rollback(&mut self) -> Result<()> {
      self.finalize("ROLLBACK", TransactionState::RolledBack).await?;
      debug!(db = %self.db_path, unit = %self.unit_id, "Transaction rolled back");
      Ok(())
   }

   async fn finalize(&mut self, statement: &str, next: TransactionState) -> Result<()> {
      if !self.is_active() {
         return Err(Error::TransactionAlreadyFinalized);
      }
      let Some(mut writer) = self.writer.take() else {
         return Err(Error::TransactionAlreadyFinalized);
      };

      match sqlx::query(statement).execute(&mut *writer).await {
         Ok(_) => {
            self.state = next;
            Ok(())
         }
         Err(e) => {
            // The writer goes back so the caller can still roll back, and
            // Drop cleans up if nobody does.
            self.writer = Some(writer);
            Err(e.into())
         }
      }
   }

   pub(crate) fn ensure_active(&self) -> Result<()> {
      if !self.is_active() {
         return Err(Error::NoActiveTransaction(self.db_path.clone()));
      }
      Ok(())
   }
}

impl Drop for Transaction {
   fn drop(&mut self) {
      let Some(mut writer) = self.writer.take() else {
         return;
      };
      if !self.is_active() {
         return;
      }

      debug!(
         db = %self.db_path,
         unit = %self.unit_id,
         "Dropping unfinalized transaction (will roll back)"
      );

      match tokio::runtime::Handle::try_current() {
         Ok(handle) => {
            let unit_id = std::mem::take(&mut self.unit_id);
            handle.spawn(async move {
               if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *writer).await {
                  warn!(unit = %unit_id, error = %e, "Rollback of dropped transaction failed");
                  writer.close_on_drop();
               }
            });
         }
         // No runtime to issue ROLLBACK on; closing the connection discards
         // the open transaction.
         Err(_) => writer.close_on_drop(),
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_cancel_flag_is_shared() {
      let flag = CancelFlag::default();
      let other = flag.clone();
      assert!(!other.is_cancelled());
      flag.cancel();
      assert!(other.is_cancelled());
   }
}
