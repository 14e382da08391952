//! Pieces shared by tasks and goals: the flag accessors the views filter on,
//! the create/patch payloads, and their validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{FidlyGridError, Result};
use crate::lifecycle::{LifecycleAction, LifecycleState};

pub const TASKS_CATEGORY: &str = "Tasks";
pub const GOALS_CATEGORY: &str = "Goals";

pub trait Flagged {
    fn id(&self) -> i32;
    fn title(&self) -> &str;
    fn category(&self) -> &str;
    fn is_completed(&self) -> bool;
    fn is_favorite(&self) -> bool;
    fn is_deleted(&self) -> bool;

    fn lifecycle_state(&self) -> LifecycleState {
        LifecycleState::from_deleted(self.is_deleted())
    }

    /// Favorites ignore category but never show trashed items.
    fn is_visible_favorite(&self) -> bool {
        self.is_favorite() && !self.is_deleted()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    #[serde(default)]
    pub title: String,
    pub category: Option<String>,
    pub emoji: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub workspace_id: Option<Option<i32>>,
}

/// Validated create payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDraft {
    pub title: String,
    pub category: String,
    pub emoji: Option<String>,
    pub workspace_id: Option<i32>,
}

impl NewItem {
    pub fn validate(&self, default_category: &str) -> Result<ItemDraft> {
        let title = normalize_title(&self.title)?;
        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(default_category)
            .to_string();
        let emoji = self
            .emoji
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(ItemDraft {
            title,
            category,
            emoji,
            workspace_id: self.workspace_id.flatten(),
        })
    }
}

/// Partial update body. Absent fields are left untouched. Unknown keys such
/// as `id` or `createdAt` echoed back by clients are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    pub title: Option<String>,
    pub emoji: Option<String>,
    pub completed: Option<bool>,
    #[serde(alias = "isFavorite")]
    pub favorite: Option<bool>,
    #[serde(alias = "isDeleted")]
    pub deleted: Option<bool>,
    pub category: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub workspace_id: Option<Option<i32>>,
}

/// A patch after validation, shaped the way the stores write it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemChanges {
    pub title: Option<String>,
    pub emoji: Option<Option<String>>,
    pub completed: Option<bool>,
    pub favorite: Option<bool>,
    pub category: Option<String>,
    pub workspace_id: Option<Option<i32>>,
    pub lifecycle: Option<LifecycleAction>,
}

impl ItemPatch {
    pub fn soft_delete() -> Self {
        Self {
            deleted: Some(true),
            ..Self::default()
        }
    }

    pub fn restore() -> Self {
        Self {
            deleted: Some(false),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<ItemChanges> {
        let title = self.title.as_deref().map(normalize_title).transpose()?;
        let category = match self.category.as_deref().map(str::trim) {
            Some("") => {
                return Err(FidlyGridError::InvalidInput(
                    "Category cannot be empty".to_string(),
                ))
            }
            other => other.map(str::to_string),
        };
        // An empty emoji clears the column.
        let emoji = self.emoji.as_deref().map(|value| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        });

        Ok(ItemChanges {
            title,
            emoji,
            completed: self.completed,
            favorite: self.favorite,
            category,
            workspace_id: self.workspace_id,
            lifecycle: self.deleted.map(LifecycleAction::from_deleted_flag),
        })
    }
}

impl ItemChanges {
    /// Resolves the lifecycle action against the current state and returns
    /// the `deleted` value to write, if any.
    pub fn next_deleted_flag(&self, current: LifecycleState, entity: &str) -> Result<Option<bool>> {
        let Some(action) = self.lifecycle else {
            return Ok(None);
        };
        let next = crate::lifecycle::transition(current, action).ok_or_else(|| {
            FidlyGridError::InvalidInput(format!("{entity} cannot {action:?} from {current:?}"))
        })?;
        Ok(next.deleted_flag())
    }
}

fn normalize_title(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FidlyGridError::InvalidInput(
            "Title is required".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

fn double_option<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub fn timestamp_from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default()
}
