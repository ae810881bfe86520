use std::time::Duration;

use sqlx::Row;
use sqlx_sqlite_conn_mgr::{Error, SqliteDatabase, SqliteDatabaseConfig};
use tempfile::TempDir;
use tokio::time::timeout;

async fn create_test_db() -> (std::sync::Arc<SqliteDatabase>, TempDir) {
   let temp_dir = TempDir::new().expect("Failed to create temp directory");
   let db_path = temp_dir.path().join("nested").join("test.db");
   let db = SqliteDatabase::connect(&db_path, None)
      .await
      .expect("Failed to connect to test database");

   (db, temp_dir)
}

#[tokio::test]
async fn test_connect_creates_file_and_parents() {
   let (db, _temp) = create_test_db().await;
   assert!(db.path().exists());
   assert_eq!(db.dialect().name(), "sqlite");
   db.remove().await.unwrap();
}

#[tokio::test]
async fn test_writer_enables_wal_and_reader_sees_commits() {
   let (db, _temp) = create_test_db().await;

   let mut writer = db.acquire_writer().await.unwrap();
   let mode: String = sqlx::query("PRAGMA journal_mode")
      .fetch_one(&mut *writer)
      .await
      .unwrap()
      .get(0);
   assert_eq!(mode.to_lowercase(), "wal");

   sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
      .execute(&mut *writer)
      .await
      .unwrap();
   sqlx::query("INSERT INTO t (name) VALUES (?)")
      .bind("Alice")
      .execute(&mut *writer)
      .await
      .unwrap();
   drop(writer);

   let rows = sqlx::query("SELECT name FROM t")
      .fetch_all(db.read_pool().unwrap())
      .await
      .unwrap();
   assert_eq!(rows.len(), 1);
   assert_eq!(rows[0].get::<String, _>("name"), "Alice");

   db.remove().await.unwrap();
}

#[tokio::test]
async fn test_read_pool_rejects_writes() {
   let (db, _temp) = create_test_db().await;

   let result = sqlx::query("CREATE TABLE t (id INTEGER)")
      .execute(db.read_pool().unwrap())
      .await;
   assert!(result.is_err());

   db.remove().await.unwrap();
}

#[tokio::test]
async fn test_writer_is_exclusive() {
   let (db, _temp) = create_test_db().await;

   let writer = db.acquire_writer().await.unwrap();

   // A second writer must wait for the first guard to drop
   let blocked = timeout(Duration::from_millis(100), db.acquire_writer()).await;
   assert!(blocked.is_err());

   drop(writer);
   let second = timeout(Duration::from_secs(5), db.acquire_writer()).await;
   assert!(matches!(second, Ok(Ok(_))));

   db.remove().await.unwrap();
}

#[tokio::test]
async fn test_closed_database_rejects_use() {
   let (db, _temp) = create_test_db().await;

   db.close().await.unwrap();
   // Idempotent
   db.close().await.unwrap();

   assert!(db.is_closed());
   assert!(matches!(db.read_pool(), Err(Error::DatabaseClosed)));
   assert!(matches!(
      db.acquire_writer().await,
      Err(Error::DatabaseClosed)
   ));
}

#[tokio::test]
async fn test_remove_deletes_files() {
   let (db, _temp) = create_test_db().await;
   let path = db.path().to_path_buf();

   let mut writer = db.acquire_writer().await.unwrap();
   sqlx::query("CREATE TABLE t (id INTEGER)")
      .execute(&mut *writer)
      .await
      .unwrap();
   drop(writer);

   db.remove().await.unwrap();
   assert!(!path.exists());
}

#[tokio::test]
async fn test_invalid_config_rejected() {
   let temp_dir = TempDir::new().unwrap();
   let config = SqliteDatabaseConfig {
      max_read_connections: 0,
      ..Default::default()
   };

   let result = SqliteDatabase::connect(temp_dir.path().join("test.db"), Some(config)).await;
   assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
