use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use crate::db::{self, SqlitePool, SqlitePooledConn};
use crate::error::{FidlyGridError, Result};
use crate::items::{
    timestamp_from_millis, Flagged, ItemChanges, ItemPatch, NewItem, TASKS_CATEGORY,
};
use crate::lifecycle::{self, LifecycleAction};
use crate::workspaces::schema::workspaces;

pub(crate) mod schema;
use schema::tasks;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i32,
    pub title: String,
    pub emoji: Option<String>,
    pub completed: bool,
    pub favorite: bool,
    pub deleted: bool,
    pub category: String,
    pub workspace_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flagged for Task {
    fn id(&self) -> i32 {
        self.id
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn category(&self) -> &str {
        &self.category
    }

    fn is_completed(&self) -> bool {
        self.completed
    }

    fn is_favorite(&self) -> bool {
        self.favorite
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }
}

#[derive(Queryable)]
struct TaskRow {
    id: i32,
    title: String,
    emoji: Option<String>,
    completed: bool,
    favorite: bool,
    deleted: bool,
    category: String,
    workspace_id: Option<i32>,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = tasks)]
struct NewTaskRow<'a> {
    title: &'a str,
    emoji: Option<&'a str>,
    completed: bool,
    favorite: bool,
    deleted: bool,
    category: &'a str,
    workspace_id: Option<i32>,
    created_at: i64,
    updated_at: i64,
}

#[derive(AsChangeset)]
#[diesel(table_name = tasks)]
struct TaskChangeset<'a> {
    title: Option<&'a str>,
    emoji: Option<Option<&'a str>>,
    completed: Option<bool>,
    favorite: Option<bool>,
    deleted: Option<bool>,
    category: Option<&'a str>,
    workspace_id: Option<Option<i32>>,
    updated_at: i64,
}

pub struct TaskStore {
    pool: SqlitePool,
}

impl TaskStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let pool = db::connect(sqlite_path.as_ref()).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_tasks(&self) -> Result<Vec<Task>> {
        let mut conn = self.conn().await?;
        let rows: Vec<TaskRow> = tasks::table
            .order(tasks::id.asc())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    pub async fn get_task(&self, id: i32) -> Result<Task> {
        let mut conn = self.conn().await?;
        load_row(&mut conn, id).await.map(map_row)
    }

    pub async fn create_task(&self, input: &NewItem) -> Result<Task> {
        let draft = input.validate(TASKS_CATEGORY)?;
        let now = db::now_millis();
        let mut conn = self.conn().await?;

        if let Some(workspace_id) = draft.workspace_id {
            ensure_workspace_exists(&mut conn, workspace_id).await?;
        }

        let new = NewTaskRow {
            title: &draft.title,
            emoji: draft.emoji.as_deref(),
            completed: false,
            favorite: false,
            deleted: false,
            category: &draft.category,
            workspace_id: draft.workspace_id,
            created_at: now,
            updated_at: now,
        };
        diesel::insert_into(tasks::table)
            .values(&new)
            .execute(&mut conn)
            .await?;

        let id = db::last_insert_id(&mut conn).await?;
        let row = load_row(&mut conn, id).await?;
        tracing::debug!(task_id = row.id, category = %row.category, "Created task");
        Ok(map_row(row))
    }

    pub async fn update_task(&self, id: i32, patch: &ItemPatch) -> Result<Task> {
        let changes = patch.validate()?;
        let mut conn = self.conn().await?;
        let current = map_row(load_row(&mut conn, id).await?);
        apply_changes(&mut conn, &current, &changes).await?;
        load_row(&mut conn, id).await.map(map_row)
    }

    pub async fn soft_delete_task(&self, id: i32) -> Result<Task> {
        self.update_task(id, &ItemPatch::soft_delete()).await
    }

    pub async fn restore_task(&self, id: i32) -> Result<Task> {
        self.update_task(id, &ItemPatch::restore()).await
    }

    pub async fn purge_task(&self, id: i32) -> Result<()> {
        let mut conn = self.conn().await?;
        let current = map_row(load_row(&mut conn, id).await?);
        lifecycle::transition(current.lifecycle_state(), LifecycleAction::Purge)
            .ok_or_else(|| FidlyGridError::not_found("Task", id))?;

        let count = diesel::delete(tasks::table.filter(tasks::id.eq(id)))
            .execute(&mut conn)
            .await?;
        if count == 0 {
            return Err(FidlyGridError::not_found("Task", id));
        }
        tracing::debug!(task_id = id, "Permanently deleted task");
        Ok(())
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        db::checkout(&self.pool).await
    }
}

async fn load_row(conn: &mut SqlitePooledConn<'_>, id: i32) -> Result<TaskRow> {
    tasks::table
        .filter(tasks::id.eq(id))
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| FidlyGridError::not_found("Task", id))
}

async fn ensure_workspace_exists(conn: &mut SqlitePooledConn<'_>, workspace_id: i32) -> Result<()> {
    let found: Option<i32> = workspaces::table
        .filter(workspaces::id.eq(workspace_id))
        .select(workspaces::id)
        .first(conn)
        .await
        .optional()?;
    if found.is_none() {
        return Err(FidlyGridError::InvalidInput(format!(
            "Unknown workspace {workspace_id}"
        )));
    }
    Ok(())
}

async fn apply_changes(
    conn: &mut SqlitePooledConn<'_>,
    current: &Task,
    changes: &ItemChanges,
) -> Result<()> {
    let deleted = changes.next_deleted_flag(current.lifecycle_state(), "Task")?;
    if let Some(Some(workspace_id)) = changes.workspace_id {
        ensure_workspace_exists(conn, workspace_id).await?;
    }

    let changeset = TaskChangeset {
        title: changes.title.as_deref(),
        emoji: changes.emoji.as_ref().map(|value| value.as_deref()),
        completed: changes.completed,
        favorite: changes.favorite,
        deleted,
        category: changes.category.as_deref(),
        workspace_id: changes.workspace_id,
        updated_at: db::now_millis(),
    };
    diesel::update(tasks::table.filter(tasks::id.eq(current.id)))
        .set(&changeset)
        .execute(conn)
        .await?;
    Ok(())
}

fn map_row(row: TaskRow) -> Task {
    Task {
        id: row.id,
        title: row.title,
        emoji: row.emoji,
        completed: row.completed,
        favorite: row.favorite,
        deleted: row.deleted,
        category: row.category,
        workspace_id: row.workspace_id,
        created_at: timestamp_from_millis(row.created_at),
        updated_at: timestamp_from_millis(row.updated_at),
    }
}
