use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::db::{self, SqlitePool, SqlitePooledConn};
use crate::error::{FidlyGridError, Result};
use crate::items::timestamp_from_millis;
use crate::tasks::schema::tasks;

pub(crate) mod schema;
use schema::workspaces;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: i32,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewWorkspace {
    pub name: Option<String>,
}

#[derive(Queryable)]
struct WorkspaceRow {
    id: i32,
    name: String,
    created_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = workspaces)]
struct NewWorkspaceRow<'a> {
    name: &'a str,
    created_at: i64,
}

pub struct WorkspaceStore {
    pool: SqlitePool,
}

impl WorkspaceStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let pool = db::connect(sqlite_path.as_ref()).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>> {
        let mut conn = self.conn().await?;
        let rows: Vec<WorkspaceRow> = workspaces::table
            .order(workspaces::id.asc())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    pub async fn create_workspace(&self, input: &NewWorkspace) -> Result<Workspace> {
        let name = input
            .name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| FidlyGridError::InvalidInput("Name is required".to_string()))?;

        let mut conn = self.conn().await?;
        diesel::insert_into(workspaces::table)
            .values(&NewWorkspaceRow {
                name,
                created_at: db::now_millis(),
            })
            .execute(&mut conn)
            .await?;

        let id = db::last_insert_id(&mut conn).await?;
        let row: WorkspaceRow = workspaces::table
            .filter(workspaces::id.eq(id))
            .first(&mut conn)
            .await?;
        tracing::info!(workspace_id = row.id, name = %row.name, "Created workspace");
        Ok(map_row(row))
    }

    /// Detaches the workspace's tasks, then removes the workspace, in one
    /// transaction. Tasks themselves are kept. Returns how many were detached.
    pub async fn delete_workspace(&self, id: i32) -> Result<usize> {
        let mut conn = self.conn().await?;
        let detached = conn
            .transaction::<_, FidlyGridError, _>(|conn| {
                async move {
                    // Runs before the delete so the count is not swallowed by
                    // the ON DELETE SET NULL foreign key.
                    let detached =
                        diesel::update(tasks::table.filter(tasks::workspace_id.eq(id)))
                            .set(tasks::workspace_id.eq(None::<i32>))
                            .execute(conn)
                            .await?;
                    let deleted =
                        diesel::delete(workspaces::table.filter(workspaces::id.eq(id)))
                            .execute(conn)
                            .await?;
                    if deleted == 0 {
                        return Err(FidlyGridError::not_found("Workspace", id));
                    }
                    Ok(detached)
                }
                .scope_boxed()
            })
            .await?;
        tracing::info!(workspace_id = id, detached, "Deleted workspace");
        Ok(detached)
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        db::checkout(&self.pool).await
    }
}

fn map_row(row: WorkspaceRow) -> Workspace {
    Workspace {
        id: row.id,
        name: row.name,
        created_at: timestamp_from_millis(row.created_at),
    }
}
