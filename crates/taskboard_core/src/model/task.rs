//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by repository and board engine.
//! - Keep the ordering-relevant fields (`stage`, `rank`) explicit and typed.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - `rank` is only meaningful inside the task's (team, stage) partition.
//! - Title, description, priority and assignee are opaque to ordering.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable task identifier.
pub type TaskId = Uuid;

/// Team identifier. Teams are owned by the external membership layer.
pub type TeamId = Uuid;

/// Order key of a task inside its partition. Lower ranks render first.
pub type Rank = i64;

/// Workflow stage a task occupies. One board column per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Not started.
    Backlog,
    /// In progress.
    Active,
    /// Finished.
    Done,
}

impl Stage {
    /// All stages in board column order.
    pub const ALL: [Stage; 3] = [Stage::Backlog, Stage::Active, Stage::Done];

    /// Canonical storage and wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Active => "active",
            Self::Done => "done",
        }
    }

    /// Parses a stage identifier.
    ///
    /// Accepts canonical names plus the legacy column ids
    /// `todo | inprogress | complete`, case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "backlog" | "todo" => Some(Self::Backlog),
            "active" | "inprogress" | "in_progress" => Some(Self::Active),
            "done" | "complete" => Some(Self::Done),
            _ => None,
        }
    }

    /// Column position of this stage on the board.
    pub(crate) fn column(self) -> usize {
        match self {
            Self::Backlog => 0,
            Self::Active => 1,
            Self::Done => 2,
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Task priority. Carried for rendering; never consulted by ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Canonical storage and wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parses a priority name, case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Validation failures for task payload fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    /// Title is empty after trim.
    BlankTitle,
    /// Assignee was provided but is empty after trim.
    BlankAssignee,
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankTitle => write!(f, "task title must not be blank"),
            Self::BlankAssignee => write!(f, "task assignee must not be blank when set"),
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub team_id: TeamId,
    pub stage: Stage,
    pub rank: Rank,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub assignee: Option<String>,
    /// Epoch ms creation timestamp.
    pub created_at: i64,
    /// Epoch ms update timestamp.
    pub updated_at: i64,
}

impl Task {
    /// Creates an in-memory task with a generated id, placed in `backlog`
    /// at rank 0.
    ///
    /// Persisted tasks get their rank from the repository; this constructor
    /// is for fixtures and import paths.
    pub fn new(team_id: TeamId, title: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), team_id, title)
    }

    /// Creates an in-memory task with a caller-provided id.
    pub fn with_id(id: TaskId, team_id: TeamId, title: impl Into<String>) -> Self {
        Self {
            id,
            team_id,
            stage: Stage::Backlog,
            rank: 0,
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            assignee: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Builder-style stage and rank placement.
    pub fn placed(mut self, stage: Stage, rank: Rank) -> Self {
        self.stage = stage;
        self.rank = rank;
        self
    }

    /// Checks payload invariants.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::BlankTitle);
        }
        if self
            .assignee
            .as_deref()
            .is_some_and(|value| value.trim().is_empty())
        {
            return Err(TaskValidationError::BlankAssignee);
        }
        Ok(())
    }
}

/// Request model for creating one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    /// Initial stage. The task is appended last in this stage.
    pub stage: Stage,
    pub assignee: Option<String>,
}

impl NewTask {
    /// Backlog task with default priority.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::Medium,
            stage: Stage::Backlog,
            assignee: None,
        }
    }

    /// Normalizes text fields and checks payload invariants.
    ///
    /// Blank descriptions collapse to `None`.
    pub fn normalized(&self) -> Result<Self, TaskValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(TaskValidationError::BlankTitle);
        }
        let assignee = match self.assignee.as_deref().map(str::trim) {
            Some("") => return Err(TaskValidationError::BlankAssignee),
            other => other.map(str::to_string),
        };
        let description = self
            .description
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self {
            title: title.to_string(),
            description,
            priority: self.priority,
            stage: self.stage,
            assignee,
        })
    }
}

/// Partial edit of a task's payload.
///
/// Stage and rank are not editable here; they only change through board
/// moves. `None` leaves a field as it is. For the optional fields,
/// `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub assignee: Option<Option<String>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
    }

    /// Applies the patch to `task` with the same normalization as
    /// [`NewTask::normalized`].
    ///
    /// `task` is left untouched when the patch is invalid.
    pub fn apply_to(&self, task: &mut Task) -> Result<(), TaskValidationError> {
        let mut edited = task.clone();
        if let Some(title) = &self.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(TaskValidationError::BlankTitle);
            }
            edited.title = title.to_string();
        }
        if let Some(description) = &self.description {
            edited.description = description
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string);
        }
        if let Some(priority) = self.priority {
            edited.priority = priority;
        }
        if let Some(assignee) = &self.assignee {
            edited.assignee = match assignee.as_deref().map(str::trim) {
                Some("") => return Err(TaskValidationError::BlankAssignee),
                other => other.map(str::to_string),
            };
        }
        edited.validate()?;
        *task = edited;
        Ok(())
    }
}

/// Durable write of one task position.
///
/// Carries values, not deltas: replaying the same write yields the same
/// end state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionWrite {
    pub task_id: TaskId,
    pub stage: Stage,
    pub rank: Rank,
}

#[cfg(test)]
mod tests {
    use super::{NewTask, Priority, Stage, Task, TaskPatch, TaskValidationError};
    use uuid::Uuid;

    #[test]
    fn stage_parse_accepts_legacy_column_ids() {
        assert_eq!(Stage::parse("todo"), Some(Stage::Backlog));
        assert_eq!(Stage::parse("InProgress"), Some(Stage::Active));
        assert_eq!(Stage::parse(" complete "), Some(Stage::Done));
        assert_eq!(Stage::parse("archived"), None);
    }

    #[test]
    fn stage_round_trips_through_canonical_name() {
        for stage in Stage::ALL {
            assert_eq!(Stage::parse(stage.as_str()), Some(stage));
        }
    }

    #[test]
    fn stage_serializes_snake_case() {
        let value = serde_json::to_string(&Stage::Active).unwrap();
        assert_eq!(value, "\"active\"");
    }

    #[test]
    fn priority_defaults_to_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Priority::parse("HIGH"), Some(Priority::High));
    }

    #[test]
    fn validate_rejects_blank_title() {
        let task = Task::new(Uuid::new_v4(), "   ");
        assert_eq!(task.validate(), Err(TaskValidationError::BlankTitle));
    }

    #[test]
    fn normalized_trims_and_drops_blank_description() {
        let mut request = NewTask::titled("  Write docs  ");
        request.description = Some("   ".to_string());
        request.assignee = Some(" ana ".to_string());

        let normalized = request.normalized().unwrap();
        assert_eq!(normalized.title, "Write docs");
        assert_eq!(normalized.description, None);
        assert_eq!(normalized.assignee.as_deref(), Some("ana"));
    }

    #[test]
    fn normalized_rejects_blank_assignee() {
        let mut request = NewTask::titled("Task");
        request.assignee = Some(String::new());
        assert_eq!(
            request.normalized(),
            Err(TaskValidationError::BlankAssignee)
        );
    }

    #[test]
    fn patch_edits_payload_and_keeps_position() {
        let mut task = Task::new(Uuid::new_v4(), "Draft").placed(Stage::Active, 42);
        task.assignee = Some("ana".to_string());
        let patch = TaskPatch {
            title: Some("  Final  ".to_string()),
            description: Some(Some(" notes ".to_string())),
            priority: Some(Priority::High),
            assignee: Some(None),
        };

        patch.apply_to(&mut task).unwrap();
        assert_eq!(task.title, "Final");
        assert_eq!(task.description.as_deref(), Some("notes"));
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.assignee, None);
        assert_eq!((task.stage, task.rank), (Stage::Active, 42));
    }

    #[test]
    fn invalid_patch_leaves_task_untouched() {
        let mut task = Task::new(Uuid::new_v4(), "Keep");
        let before = task.clone();
        let patch = TaskPatch {
            priority: Some(Priority::Low),
            assignee: Some(Some("  ".to_string())),
            ..TaskPatch::default()
        };

        assert_eq!(
            patch.apply_to(&mut task),
            Err(TaskValidationError::BlankAssignee)
        );
        assert_eq!(task, before);
        assert!(TaskPatch::default().is_empty());
    }
}
