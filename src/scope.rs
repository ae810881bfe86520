//! Managed transaction scope: submit units of work to run in their own
//! transaction on an injected scheduler.

use std::any::Any;
use std::future::IntoFuture;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use sqlx_sqlite_conn_mgr::SqliteDatabase;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::transactions::{CancelFlag, Transaction};
use crate::{Error, Result};

/// Submits units of work, each executed in exactly one transaction.
///
/// A unit of work is a closure receiving the open [`Transaction`]. Its
/// returned future completing with `Ok` commits, `Err` or a panic rolls back.
/// Units never share a transaction; since the database has a single writer,
/// concurrently submitted units run one after another.
///
/// The scheduler is injected rather than taken from ambient state, so the
/// same scope can be driven from async code and from plain threads.
///
/// ```no_run
/// # async fn demo(db: std::sync::Arc<sqlx_sqlite_conn_mgr::SqliteDatabase>) -> sqlx_sqlite_store::Result<()> {
/// use sqlx_sqlite_store::TransactionScope;
///
/// let scope = TransactionScope::new(db, tokio::runtime::Handle::current());
/// let rows = scope
///    .manage(|tx| {
///       Box::pin(async move {
///          let result = tx.execute("DELETE FROM homes", vec![]).await?;
///          Ok(result.rows_affected())
///       })
///    })
///    .await?;
/// # let _ = rows;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TransactionScope {
   db: Arc<SqliteDatabase>,
   scheduler: Handle,
}

impl TransactionScope {
   pub fn new(db: Arc<SqliteDatabase>, scheduler: Handle) -> Self {
      Self { db, scheduler }
   }

   pub fn database(&self) -> &Arc<SqliteDatabase> {
      &self.db
   }

   pub fn scheduler(&self) -> &Handle {
      &self.scheduler
   }

   /// Begin an unmanaged transaction; the caller commits or rolls it back.
   pub async fn begin(&self) -> Result<Transaction> {
      Transaction::begin(&self.db).await
   }

   /// Run `work` in a new transaction and wait for its result.
   pub async fn manage<T, F>(&self, work: F) -> Result<T>
   where
      T: Send + 'static,
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      self.management_async(work).await
   }

   /// Start `work` now, fire-and-forget. Failures are logged.
   ///
   /// The unit is spawned on the scope's scheduler and only makes progress
   /// while that runtime is driven. On a `current_thread` runtime nobody is
   /// blocking on or awaiting, it never runs.
   pub fn management<T, F>(&self, work: F) -> Job
   where
      T: Send + 'static,
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let mut job = self.job(work);
      job.start();
      job
   }

   /// Like [`management`](Self::management) but nothing runs until
   /// [`Job::start`] or [`Job::join`].
   pub fn lazy_management<T, F>(&self, work: F) -> Job
   where
      T: Send + 'static,
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      self.job(work)
   }

   /// Start `work` now; await the returned handle for its result.
   pub fn management_async<T, F>(&self, work: F) -> Deferred<T>
   where
      T: Send + 'static,
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let mut deferred = self.deferred(work);
      deferred.start();
      deferred
   }

   /// Like [`management_async`](Self::management_async) but nothing runs
   /// until [`Deferred::start`] or the handle is awaited.
   pub fn lazy_management_async<T, F>(&self, work: F) -> Deferred<T>
   where
      T: Send + 'static,
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      self.deferred(work)
   }

   /// Run `work` on the scheduler and block the calling thread until its
   /// transaction has committed or rolled back.
   ///
   /// The unit runs on the scope's scheduler, not on the calling thread. A
   /// multi-thread runtime drives it on its workers. A `current_thread`
   /// runtime only runs tasks inside its own `block_on`, so if no other
   /// thread is driving it this call never returns.
   ///
   /// # Panics
   ///
   /// Panics if called from within an asynchronous execution context, like
   /// any blocking wait on a Tokio runtime.
   pub fn transaction<T, F>(&self, work: F) -> Result<T>
   where
      T: Send + 'static,
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let unit = Unit::new(&self.db, work);
      let (sender, receiver) = tokio::sync::oneshot::channel();

      self.scheduler.spawn(async move {
         // The caller is blocked on the receiver, so the result is always observed
         let _ = sender.send(catch_panic(unit.run()).await);
      });

      receiver
         .blocking_recv()
         .map_err(|_| Error::Other("scheduler shut down before the unit of work finished".into()))?
   }

   fn job<T, F>(&self, work: F) -> Job
   where
      T: Send + 'static,
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let unit = Unit::new(&self.db, work);
      let cancel = unit.cancel.clone();
      let unit_id = unit.id.clone();

      let task = async move {
         let id = unit.id.clone();
         match catch_panic(unit.run()).await {
            Ok(_) => {}
            Err(Error::Cancelled) => debug!(unit = %id, "Unit of work cancelled"),
            Err(e) => error!(
               unit = %id,
               code = %e.error_code(),
               error = %e,
               "Unit of work failed"
            ),
         }
      };

      Job {
         exec: Execution::new(Box::pin(task), cancel, self.scheduler.clone(), unit_id),
      }
   }

   fn deferred<T, F>(&self, work: F) -> Deferred<T>
   where
      T: Send + 'static,
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let unit = Unit::new(&self.db, work);
      let cancel = unit.cancel.clone();
      let unit_id = unit.id.clone();

      Deferred {
         exec: Execution::new(
            Box::pin(catch_panic(unit.run())),
            cancel,
            self.scheduler.clone(),
            unit_id,
         ),
      }
   }
}

/// A submitted unit of work, not yet polled.
struct Unit<T> {
   id: String,
   cancel: CancelFlag,
   future: BoxFuture<'static, Result<T>>,
}

impl<T: Send + 'static> Unit<T> {
   fn new<F>(db: &Arc<SqliteDatabase>, work: F) -> Self
   where
      F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
   {
      let id = Uuid::new_v4().to_string();
      let cancel = CancelFlag::default();
      let future = Box::pin(execute(Arc::clone(db), id.clone(), cancel.clone(), work));
      Self { id, cancel, future }
   }

   fn run(self) -> BoxFuture<'static, Result<T>> {
      self.future
   }
}

/// Open a transaction, run `work` in it, then commit or roll back.
async fn execute<T, F>(
   db: Arc<SqliteDatabase>,
   unit_id: String,
   cancel: CancelFlag,
   work: F,
) -> Result<T>
where
   F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>> + Send + 'static,
{
   if cancel.is_cancelled() {
      debug!(unit = %unit_id, "Unit of work cancelled before start");
      return Err(Error::Cancelled);
   }

   let mut tx = Transaction::begin_unit(&db, unit_id, cancel).await?;
   let outcome = work(&mut tx).await;

   // Work that finalized its own transaction keeps its outcome
   if !tx.is_active() {
      return outcome;
   }

   let outcome = match outcome {
      Ok(_) if tx.is_cancelled() => Err(Error::Cancelled),
      other => other,
   };

   match outcome {
      Ok(value) => {
         tx.commit().await?;
         Ok(value)
      }
      Err(e) => match tx.rollback().await {
         Ok(()) => Err(e),
         Err(rollback_err) => Err(Error::TransactionRollbackFailed {
            transaction_error: e.to_string(),
            rollback_error: rollback_err.to_string(),
         }),
      },
   }
}

async fn catch_panic<T>(unit: BoxFuture<'static, Result<T>>) -> Result<T> {
   match AssertUnwindSafe(unit).catch_unwind().await {
      Ok(result) => result,
      Err(panic) => Err(Error::UnitOfWorkPanicked(panic_message(panic.as_ref()))),
   }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
   if let Some(message) = panic.downcast_ref::<&str>() {
      message.to_string()
   } else if let Some(message) = panic.downcast_ref::<String>() {
      message.clone()
   } else {
      "unknown panic payload".to_string()
   }
}

fn join_error(e: JoinError) -> Error {
   if e.is_panic() {
      Error::UnitOfWorkPanicked(panic_message(e.into_panic().as_ref()))
   } else {
      Error::Cancelled
   }
}

enum ExecState<O> {
   Pending(BoxFuture<'static, O>),
   Running(JoinHandle<O>),
   Finished,
}

/// Shared start/cancel/wait machinery behind [`Job`] and [`Deferred`].
struct Execution<O> {
   state: ExecState<O>,
   cancel: CancelFlag,
   scheduler: Handle,
   unit_id: String,
}

impl<O: Send + 'static> Execution<O> {
   fn new(
      future: BoxFuture<'static, O>,
      cancel: CancelFlag,
      scheduler: Handle,
      unit_id: String,
   ) -> Self {
      Self {
         state: ExecState::Pending(future),
         cancel,
         scheduler,
         unit_id,
      }
   }

   fn start(&mut self) -> bool {
      match std::mem::replace(&mut self.state, ExecState::Finished) {
         ExecState::Pending(future) => {
            debug!(unit = %self.unit_id, "Starting unit of work");
            self.state = ExecState::Running(self.scheduler.spawn(future));
            true
         }
         other => {
            self.state = other;
            false
         }
      }
   }

   fn is_started(&self) -> bool {
      !matches!(self.state, ExecState::Pending(_))
   }

   fn is_finished(&self) -> bool {
      match &self.state {
         ExecState::Pending(_) => false,
         ExecState::Running(handle) => handle.is_finished(),
         ExecState::Finished => true,
      }
   }

   fn cancel(&self) {
      debug!(unit = %self.unit_id, "Cancellation requested");
      self.cancel.cancel();
   }

   /// Start if needed, then wait for the output.
   ///
   /// The join handle stays in place while waiting, so an abandoned wait
   /// still leaves a running unit for `Drop` to observe.
   async fn wait(&mut self) -> std::result::Result<O, Error> {
      self.start();
      let output = match &mut self.state {
         ExecState::Running(handle) => handle.await.map_err(join_error),
         _ => Err(Error::Other("unit of work result was already taken".into())),
      };
      self.state = ExecState::Finished;
      output
   }
}

/// Handle to a fire-and-forget unit of work.
///
/// The unit's result is discarded; failures are logged at error level.
/// Dropping a started job does not stop it. Dropping a lazy job that was
/// never started discards the work, with a debug log.
#[must_use = "a lazy job does nothing unless started"]
pub struct Job {
   exec: Execution<()>,
}

impl Job {
   /// Schedule the unit if it has not started yet. Returns whether this call
   /// started it.
   pub fn start(&mut self) -> bool {
      self.exec.start()
   }

   /// Request cancellation.
   ///
   /// A unit that has not opened its transaction yet never runs; a running
   /// unit stops at its next checkpoint and rolls back. Cancellation after
   /// commit has no effect.
   pub fn cancel(&self) {
      self.exec.cancel();
   }

   pub fn is_started(&self) -> bool {
      self.exec.is_started()
   }

   pub fn is_finished(&self) -> bool {
      self.exec.is_finished()
   }

   pub fn is_cancelled(&self) -> bool {
      self.exec.cancel.is_cancelled()
   }

   /// Start the unit if needed and wait until it has finished.
   pub async fn join(mut self) {
      if let Err(e) = self.exec.wait().await {
         warn!(unit = %self.exec.unit_id, error = %e, "Job did not run to completion");
      }
   }
}

impl Drop for Job {
   fn drop(&mut self) {
      if !self.is_started() {
         debug!(unit = %self.exec.unit_id, "Lazy unit of work dropped without starting");
      }
   }
}

impl std::fmt::Debug for Job {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("Job")
         .field("unit_id", &self.exec.unit_id)
         .field("started", &self.is_started())
         .field("cancelled", &self.is_cancelled())
         .finish()
   }
}

/// Handle to a unit of work whose result can be awaited.
///
/// Awaiting starts a lazy unit. If the handle is dropped while the unit is
/// running, a failure is still logged once the unit finishes.
#[must_use = "a deferred result does nothing unless started or awaited"]
pub struct Deferred<T: Send + 'static> {
   exec: Execution<Result<T>>,
}

impl<T: Send + 'static> Deferred<T> {
   /// Schedule the unit if it has not started yet. Returns whether this call
   /// started it.
   pub fn start(&mut self) -> bool {
      self.exec.start()
   }

   /// Request cancellation; awaiting then yields [`Error::Cancelled`] unless
   /// the unit had already committed.
   pub fn cancel(&self) {
      self.exec.cancel();
   }

   pub fn is_started(&self) -> bool {
      self.exec.is_started()
   }

   pub fn is_finished(&self) -> bool {
      self.exec.is_finished()
   }

   pub fn is_cancelled(&self) -> bool {
      self.exec.cancel.is_cancelled()
   }
}

impl<T: Send + 'static> IntoFuture for Deferred<T> {
   type Output = Result<T>;
   type IntoFuture = BoxFuture<'static, Result<T>>;

   fn into_future(mut self) -> Self::IntoFuture {
      Box::pin(async move { self.exec.wait().await? })
   }
}

impl<T: Send + 'static> Drop for Deferred<T> {
   fn drop(&mut self) {
      let unit_id = std::mem::take(&mut self.exec.unit_id);

      match std::mem::replace(&mut self.exec.state, ExecState::Finished) {
         ExecState::Finished => {}
         ExecState::Pending(_) => {
            debug!(unit = %unit_id, "Lazy unit of work dropped without starting");
         }
         ExecState::Running(handle) => {
            self.exec.scheduler.spawn(async move {
               match handle.await.map_err(join_error) {
                  Ok(Ok(_)) | Ok(Err(Error::Cancelled)) | Err(Error::Cancelled) => {}
                  Ok(Err(e)) | Err(e) => error!(
                     unit = %unit_id,
                     code = %e.error_code(),
                     error = %e,
                     "Unobserved unit of work failed"
                  ),
               }
            });
         }
      }
   }
}

impl<T: Send + 'static> std::fmt::Debug for Deferred<T> {
   fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
      f.debug_struct("Deferred")
         .field("unit_id", &self.exec.unit_id)
         .field("started", &self.is_started())
         .field("cancelled", &self.is_cancelled())
         .finish()
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_panic_message() {
      let boxed: Box<dyn Any + Send> = Box::new("static message");
      assert_eq!(panic_message(boxed.as_ref()), "static message");

      let boxed: Box<dyn Any + Send> = Box::new(String::from("owned message"));
      assert_eq!(panic_message(boxed.as_ref()), "owned message");

      let boxed: Box<dyn Any + Send> = Box::new(42_u8);
      assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
   }

   async fn explode() -> Result<()> {
      panic!("kaboom")
   }

   #[tokio::test]
   async fn test_catch_panic_maps_to_error() {
      let err = catch_panic(Box::pin(explode())).await.unwrap_err();
      assert!(matches!(err, Error::UnitOfWorkPanicked(msg) if msg == "kaboom"));
   }
}
