//! # sqlx-sqlite-store
//!
//! Typed key-value table managers over SQLite, with units of work that run
//! in their own transaction on an injected Tokio scheduler.
//!
//! ## Core Types
//!
//! - **[`TransactionScope`]**: submits units of work eagerly or lazily, as
//!   fire-and-forget [`Job`]s or awaitable [`Deferred`] results, or blocks on
//!   them with [`TransactionScope::transaction`]
//! - **[`Transaction`]**: `BEGIN IMMEDIATE` on the exclusive writer connection
//! - **[`TableManager`]**: insert/update/upsert/find/delete of [`Entity`] rows
//!   through typed key and value columns
//! - **[`Predicate`]**: filters for [`TableManager::delete_if`]
//!
//! Column codecs live in [`sqlx_sqlite_columns`] and connection provisioning
//! in [`sqlx_sqlite_conn_mgr`]; both are re-exported.
//!
//! ## Example
//!
//! ```no_run
//! use sqlx_sqlite_store::columns::{Table, TypeKey};
//! use sqlx_sqlite_store::conn_mgr::SqliteDatabase;
//! use sqlx_sqlite_store::{ManagerConfig, TableManager, TransactionScope};
//!
//! # async fn demo() -> sqlx_sqlite_store::Result<()> {
//! let db = SqliteDatabase::connect("data/homes.db", None).await?;
//! let scope = TransactionScope::new(db, tokio::runtime::Handle::current());
//!
//! let mut table = Table::new("homes")?;
//! let owner = table.varchar::<String>("owner", 36, TypeKey("owner"))?;
//! let home = table.tag::<(i32, i32, i32)>("home", TypeKey("coords"), None)?;
//! table.set_primary_key("owner")?;
//!
//! let homes = TableManager::new(table, owner, home, scope, ManagerConfig::default())?;
//! homes.manage_create().join().await;
//!
//! let found = homes
//!    .management_async(|homes, tx| {
//!       Box::pin(async move {
//!          homes.upsert(tx, "steve".into(), (10, 64, -20)).await?;
//!          homes.find(tx, &"steve".to_string()).await
//!       })
//!    })
//!    .await?;
//! assert_eq!(found.map(|e| e.value), Some((10, 64, -20)));
//! # Ok(())
//! # }
//! ```

mod bind;
mod config;
mod error;
mod manager;
mod predicate;
mod schema;
mod scope;
mod transactions;

pub use config::{ManagerConfig, UpsertStrategy};
pub use error::{Error, Result};
pub use manager::{Entity, TableManager};
pub use predicate::{ColumnPredicates, Predicate};
pub use schema::{column_type, create_table_sql};
pub use scope::{Deferred, Job, TransactionScope};
pub use transactions::Transaction;

pub use sqlx_sqlite_columns as columns;
pub use sqlx_sqlite_conn_mgr as conn_mgr;
