//! Category views over tasks and goals.
//!
//! Every list the sidebar offers is a pure filter over the full task and goal
//! sets; nothing here touches storage.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::FidlyGridError;
use crate::goals::Goal;
use crate::items::{Flagged, TASKS_CATEGORY};
use crate::tasks::Task;

pub const MIN_SEARCH_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Home,
    MyTasks,
    Goals,
    Favorites,
    Trash,
    Custom(String),
}

impl FromStr for Category {
    type Err = FidlyGridError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        match value {
            "" => Err(FidlyGridError::InvalidInput(
                "Category is required".to_string(),
            )),
            "Home" => Ok(Self::Home),
            "My Tasks" | "Tasks" => Ok(Self::MyTasks),
            "Goals" => Ok(Self::Goals),
            "Favorites" => Ok(Self::Favorites),
            "Trash" => Ok(Self::Trash),
            other => Ok(Self::Custom(other.to_string())),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Home => "Home",
            Self::MyTasks => "My Tasks",
            Self::Goals => "Goals",
            Self::Favorites => "Favorites",
            Self::Trash => "Trash",
            Self::Custom(name) => name.as_str(),
        };
        f.write_str(name)
    }
}

impl Category {
    fn empty_message(&self) -> Option<&'static str> {
        match self {
            Self::MyTasks => Some("You don't have any tasks yet"),
            Self::Goals => Some("You don't have any goals yet"),
            Self::Favorites => Some("You don't have any favorites yet"),
            Self::Trash => Some("Trash can is empty"),
            Self::Home | Self::Custom(_) => None,
        }
    }

    fn shows_goal(&self, goal: &Goal) -> bool {
        match self {
            Self::Home | Self::Goals => !goal.is_deleted(),
            Self::Favorites => goal.is_visible_favorite(),
            Self::Trash => goal.is_deleted(),
            Self::MyTasks | Self::Custom(_) => false,
        }
    }

    fn shows_task(&self, task: &Task) -> bool {
        match self {
            Self::Home | Self::MyTasks => !task.is_deleted() && task.category() == TASKS_CATEGORY,
            Self::Favorites => task.is_visible_favorite(),
            Self::Trash => task.is_deleted(),
            Self::Custom(name) => !task.is_deleted() && task.category() == name,
            Self::Goals => false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryView {
    pub category: String,
    pub goals: Vec<Goal>,
    pub tasks: Vec<Task>,
    pub empty_message: Option<String>,
}

pub fn category_view(category: &Category, tasks: Vec<Task>, goals: Vec<Goal>) -> CategoryView {
    let goals: Vec<Goal> = goals
        .into_iter()
        .filter(|goal| category.shows_goal(goal))
        .collect();
    let tasks: Vec<Task> = tasks
        .into_iter()
        .filter(|task| category.shows_task(task))
        .collect();
    let empty_message = if goals.is_empty() && tasks.is_empty() {
        category.empty_message().map(str::to_string)
    } else {
        None
    };

    CategoryView {
        category: category.to_string(),
        goals,
        tasks,
        empty_message,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub tasks: usize,
    pub goals: usize,
    pub favorites: usize,
    pub trash: usize,
}

pub fn counts(tasks: &[Task], goals: &[Goal]) -> Counts {
    Counts {
        tasks: tasks.iter().filter(|task| !task.is_deleted()).count(),
        goals: goals.iter().filter(|goal| !goal.is_deleted()).count(),
        favorites: tasks.iter().filter(|task| task.is_visible_favorite()).count()
            + goals.iter().filter(|goal| goal.is_visible_favorite()).count(),
        trash: tasks.iter().filter(|task| task.is_deleted()).count()
            + goals.iter().filter(|goal| goal.is_deleted()).count(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Task,
    Goal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub id: i32,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: SearchKind,
    pub category: String,
}

/// Case-insensitive substring match on title or category. Short queries match
/// nothing so the result list doesn't flood while the user is still typing.
pub fn search(query: &str, tasks: &[Task], goals: &[Goal]) -> Vec<SearchHit> {
    let needle = query.trim().to_lowercase();
    if needle.chars().count() < MIN_SEARCH_LEN {
        return Vec::new();
    }

    let matches = |item: &dyn Flagged| {
        item.title().to_lowercase().contains(&needle)
            || item.category().to_lowercase().contains(&needle)
    };
    let hit = |item: &dyn Flagged, kind| SearchHit {
        id: item.id(),
        title: item.title().to_string(),
        kind,
        category: item.category().to_string(),
    };

    let task_hits = tasks
        .iter()
        .filter(|task| matches(*task))
        .map(|task| hit(task, SearchKind::Task));
    let goal_hits = goals
        .iter()
        .filter(|goal| matches(*goal))
        .map(|goal| hit(goal, SearchKind::Goal));
    task_hits.chain(goal_hits).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::items::GOALS_CATEGORY;
    use chrono::{TimeZone, Utc};

    fn task(id: i32, title: &str, category: &str, favorite: bool, deleted: bool) -> Task {
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
        Task {
            id,
            title: title.to_string(),
            emoji: None,
            completed: false,
            favorite,
            deleted,
            category: category.to_string(),
            workspace_id: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn goal(id: i32, title: &str, favorite: bool, deleted: bool) -> Goal {
        let at = Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap();
        Goal {
            id,
            title: title.to_string(),
            emoji: None,
            completed: false,
            favorite,
            deleted,
            category: GOALS_CATEGORY.to_string(),
            created_at: at,
            updated_at: at,
        }
    }

    fn fixture() -> (Vec<Task>, Vec<Goal>) {
        let tasks = vec![
            task(1, "Buy groceries", "Tasks", false, false),
            task(2, "Call plumber", "Tasks", true, false),
            task(3, "Old chore", "Tasks", true, true),
            task(4, "Sketch logo", "Design", false, false),
            task(5, "Review logo", "Design", true, false),
        ];
        let goals = vec![
            goal(1, "Run a marathon", true, false),
            goal(2, "Learn piano", false, true),
        ];
        (tasks, goals)
    }

    fn ids<T: Flagged>(items: &[T]) -> Vec<i32> {
        items.iter().map(Flagged::id).collect()
    }

    #[test]
    fn parses_known_and_custom_categories() {
        assert_eq!("Home".parse::<Category>().unwrap(), Category::Home);
        assert_eq!("Tasks".parse::<Category>().unwrap(), Category::MyTasks);
        assert_eq!("My Tasks".parse::<Category>().unwrap(), Category::MyTasks);
        assert_eq!(
            "Design".parse::<Category>().unwrap(),
            Category::Custom("Design".to_string())
        );
        assert!(" ".parse::<Category>().is_err());
    }

    #[test]
    fn home_hides_trash_and_other_categories() {
        let (tasks, goals) = fixture();
        let view = category_view(&Category::Home, tasks, goals);
        assert_eq!(ids(&view.tasks), vec![1, 2]);
        assert_eq!(ids(&view.goals), vec![1]);
        assert_eq!(view.empty_message, None);
    }

    #[test]
    fn favorites_ignore_category_but_not_trash() {
        let (tasks, goals) = fixture();
        let view = category_view(&Category::Favorites, tasks, goals);
        assert_eq!(ids(&view.tasks), vec![2, 5]);
        assert_eq!(ids(&view.goals), vec![1]);
    }

    #[test]
    fn trash_shows_only_deleted() {
        let (tasks, goals) = fixture();
        let view = category_view(&Category::Trash, tasks, goals);
        assert_eq!(ids(&view.tasks), vec![3]);
        assert_eq!(ids(&view.goals), vec![2]);
    }

    #[test]
    fn custom_category_filters_tasks_only() {
        let (tasks, goals) = fixture();
        let view = category_view(&Category::Custom("Design".to_string()), tasks, goals);
        assert_eq!(ids(&view.tasks), vec![4, 5]);
        assert!(view.goals.is_empty());
        assert_eq!(view.category, "Design");
    }

    #[test]
    fn empty_views_carry_messages() {
        let view = category_view(&Category::Trash, Vec::new(), Vec::new());
        assert!(view.goals.is_empty() && view.tasks.is_empty());
        assert_eq!(view.empty_message.as_deref(), Some("Trash can is empty"));

        let view = category_view(&Category::Home, Vec::new(), Vec::new());
        assert_eq!(view.empty_message, None);
    }

    #[test]
    fn counts_match_sidebar_rules() {
        let (tasks, goals) = fixture();
        assert_eq!(
            counts(&tasks, &goals),
            Counts {
                tasks: 4,
                goals: 1,
                favorites: 3,
                trash: 2,
            }
        );
    }

    #[test]
    fn search_needs_three_characters() {
        let (tasks, goals) = fixture();
        assert!(search("ca", &tasks, &goals).is_empty());

        let hits = search("CALL", &tasks, &goals);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, SearchKind::Task);

        let hits = search("goals", &tasks, &goals);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|hit| hit.kind == SearchKind::Goal));
    }
}
