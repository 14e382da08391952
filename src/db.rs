use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_async::pooled_connection::bb8::{Pool, PooledConnection};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::{FidlyGridError, Result};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

const BUSY_TIMEOUT_PRAGMA: &str = "PRAGMA busy_timeout = 5000";

pub type SqliteAsyncConn = SyncConnectionWrapper<SqliteConnection>;
pub type SqlitePool = Pool<SqliteAsyncConn>;
pub type SqlitePooledConn<'a> = PooledConnection<'a, SqliteAsyncConn>;

pub fn open_connection_sync(database_url: &str) -> Result<SqliteConnection> {
    let mut conn = SqliteConnection::establish(database_url)
        .map_err(|e| FidlyGridError::Storage(e.to_string()))?;
    diesel::RunQueryDsl::execute(diesel::sql_query(BUSY_TIMEOUT_PRAGMA), &mut conn)?;
    Ok(conn)
}

pub async fn apply_pragmas_async(conn: &mut SqliteAsyncConn) -> Result<()> {
    diesel_async::RunQueryDsl::execute(diesel::sql_query(BUSY_TIMEOUT_PRAGMA), conn).await?;
    Ok(())
}

/// Creates the parent directory, applies pending migrations and builds a pool.
pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    ensure_parent_dir(database_url)?;
    run_migrations(database_url).await?;

    let manager = AsyncDieselConnectionManager::<SqliteAsyncConn>::new(database_url);
    let pool: SqlitePool = Pool::builder()
        .build(manager)
        .await
        .map_err(|e| FidlyGridError::Storage(e.to_string()))?;
    Ok(pool)
}

pub async fn checkout(pool: &SqlitePool) -> Result<SqlitePooledConn<'_>> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| FidlyGridError::Storage(e.to_string()))?;
    apply_pragmas_async(&mut conn).await?;
    Ok(conn)
}

/// Returns the versions of the migrations that were applied by this call.
pub async fn run_migrations(database_url: &str) -> Result<Vec<String>> {
    let database_url = database_url.to_string();
    let applied = tokio::task::spawn_blocking(move || {
        let mut conn = open_connection_sync(&database_url)?;
        let versions = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| FidlyGridError::Storage(e.to_string()))?;
        Ok::<_, FidlyGridError>(
            versions
                .into_iter()
                .map(|version| version.to_string())
                .collect::<Vec<_>>(),
        )
    })
    .await
    .map_err(|e| FidlyGridError::Runtime(e.to_string()))??;

    if !applied.is_empty() {
        tracing::info!(count = applied.len(), "Applied pending migrations");
    }
    Ok(applied)
}

pub fn ensure_parent_dir(path: &str) -> Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| FidlyGridError::Storage(e.to_string()))?;
    }
    Ok(())
}

/// Row id of the latest insert on this connection.
pub async fn last_insert_id(conn: &mut SqliteAsyncConn) -> Result<i32> {
    let id = diesel_async::RunQueryDsl::get_result(
        diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>(
            "last_insert_rowid()",
        )),
        conn,
    )
    .await?;
    Ok(id)
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
