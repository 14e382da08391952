use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};

use crate::db::{self, SqlitePool, SqlitePooledConn};
use crate::error::{FidlyGridError, Result};
use crate::items::{timestamp_from_millis, Flagged, ItemPatch, NewItem, GOALS_CATEGORY};
use crate::lifecycle::{self, LifecycleAction};

mod schema;
use schema::goals;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: i32,
    pub title: String,
    pub emoji: Option<String>,
    pub completed: bool,
    pub favorite: bool,
    pub deleted: bool,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flagged for Goal {
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
struct GoalRow {
    id: i32,
    title: String,
    emoji: Option<String>,
    completed: bool,
    favorite: bool,
    deleted: bool,
    category: String,
    created_at: i64,
    updated_at: i64,
}

#[derive(Insertable)]
#[diesel(table_name = goals)]
struct NewGoalRow<'a> {
    title: &'a str,
    emoji: Option<&'a str>,
    completed: bool,
    favorite: bool,
    deleted: bool,
    category: &'a str,
    created_at: i64,
    updated_at: i64,
}

#[derive(AsChangeset)]
#[diesel(table_name = goals)]
struct GoalChangeset<'a> {
    title: Option<&'a str>,
    emoji: Option<Option<&'a str>>,
    completed: Option<bool>,
    favorite: Option<bool>,
    deleted: Option<bool>,
    category: Option<&'a str>,
    updated_at: i64,
}

pub struct GoalStore {
    pool: SqlitePool,
}

impl GoalStore {
    pub async fn new(sqlite_path: impl AsRef<str>) -> Result<Self> {
        let pool = db::connect(sqlite_path.as_ref()).await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_goals(&self) -> Result<Vec<Goal>> {
        let mut conn = self.conn().await?;
        let rows: Vec<GoalRow> = goals::table
            .order(goals::id.asc())
            .load(&mut conn)
            .await?;
        Ok(rows.into_iter().map(map_row).collect())
    }

    pub async fn get_goal(&self, id: i32) -> Result<Goal> {
        let mut conn = self.conn().await?;
        load_row(&mut conn, id).await.map(map_row)
    }

    pub async fn create_goal(&self, input: &NewItem) -> Result<Goal> {
        // Goals have no workspace column.
        if matches!(input.workspace_id, Some(Some(_))) {
            return Err(FidlyGridError::InvalidInput(
                "Goals cannot belong to a workspace".to_string(),
            ));
        }
        let draft = input.validate(GOALS_CATEGORY)?;
        let now = db::now_millis();
        let new = NewGoalRow {
            title: &draft.title,
            emoji: draft.emoji.as_deref(),
            completed: false,
            favorite: false,
            deleted: false,
            category: &draft.category,
            created_at: now,
            updated_at: now,
        };

        let mut conn = self.conn().await?;
        diesel::insert_into(goals::table)
            .values(&new)
            .execute(&mut conn)
            .await?;

        let id = db::last_insert_id(&mut conn).await?;
        let row = load_row(&mut conn, id).await?;
        tracing::debug!(goal_id = row.id, "Created goal");
        Ok(map_row(row))
    }

    pub async fn update_goal(&self, id: i32, patch: &ItemPatch) -> Result<Goal> {
        let changes = patch.validate()?;
        if matches!(changes.workspace_id, Some(Some(_))) {
            return Err(FidlyGridError::InvalidInput(
                "Goals cannot belong to a workspace".to_string(),
            ));
        }

        let mut conn = self.conn().await?;
        let current = map_row(load_row(&mut conn, id).await?);
        let deleted = changes.next_deleted_flag(current.lifecycle_state(), "Goal")?;

        let changeset = GoalChangeset {
            title: changes.title.as_deref(),
            emoji: changes.emoji.as_ref().map(|value| value.as_deref()),
            completed: changes.completed,
            favorite: changes.favorite,
            deleted,
            category: changes.category.as_deref(),
            updated_at: db::now_millis(),
        };
        diesel::update(goals::table.filter(goals::id.eq(id)))
            .set(&changeset)
            .execute(&mut conn)
            .await?;

        load_row(&mut conn, id).await.map(map_row)
    }

    pub async fn soft_delete_goal(&self, id: i32) -> Result<Goal> {
        self.update_goal(id, &ItemPatch::soft_delete()).await
    }

    pub async fn restore_goal(&self, id: i32) -> Result<Goal> {
        self.update_goal(id, &ItemPatch::restore()).await
    }

    pub async fn purge_goal(&self, id: i32) -> Result<()> {
        let mut conn = self.conn().await?;
        let current = map_row(load_row(&mut conn, id).await?);
        lifecycle::transition(current.lifecycle_state(), LifecycleAction::Purge)
            .ok_or_else(|| FidlyGridError::not_found("Goal", id))?;

        let count = diesel::delete(goals::table.filter(goals::id.eq(id)))
            .execute(&mut conn)
            .await?;
        if count == 0 {
            return Err(FidlyGridError::not_found("Goal", id));
        }
        tracing::debug!(goal_id = id, "Permanently deleted goal");
        Ok(())
    }

    async fn conn(&self) -> Result<SqlitePooledConn<'_>> {
        db::checkout(&self.pool).await
    }
}

async fn load_row(conn: &mut SqlitePooledConn<'_>, id: i32) -> Result<GoalRow> {
    goals::table
        .filter(goals::id.eq(id))
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| FidlyGridError::not_found("Goal", id))
}

fn map_row(row: GoalRow) -> Goal {
    Goal {
        id: row.id,
        title: row.title,
        emoji: row.emoji,
        completed: row.completed,
        favorite: row.favorite,
        deleted: row.deleted,
        category: row.category,
        created_at: timestamp_from_millis(row.created_at),
        updated_at: timestamp_from_millis(row.updated_at),
    }
}
