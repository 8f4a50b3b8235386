pub mod sqlite_store;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Pool;

pub type SqlitePool = Pool<sqlx::Sqlite>;

/// Opens the embedded relational engine in WAL mode with a bounded
/// connection pool (concurrent readers, serialized writer) and applies
/// migrations, matching the teacher's `connect_pool` + `migrate` split in
/// `infrastructure/db/mod.rs`. `database_path == ":memory:"` opens a
/// private in-memory database pinned to a single connection, for tests.
pub async fn connect_pool(database_path: &str) -> anyhow::Result<SqlitePool> {
    if database_path == ":memory:" {
        let options = SqliteConnectOptions::new()
            .in_memory(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        return Ok(pool);
    }

    if let Some(parent) = std::path::Path::new(database_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }
    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
