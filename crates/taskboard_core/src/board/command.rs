//! Normalized move commands and raw drop targets.

use crate::model::task::{Stage, TaskId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One drag gesture's normalized result. Applied whole or not at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCommand {
    pub task_id: TaskId,
    pub target_stage: Stage,
    /// Position the task occupies in the target partition after it has
    /// been removed from its source partition.
    pub target_index: usize,
}

/// What a task was released over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum DropTarget {
    /// A column background.
    Stage(Stage),
    /// Another task card.
    Task(TaskId),
}

impl DropTarget {
    /// Parses a raw drop-target id: a stage identifier or a task uuid.
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some(stage) = Stage::parse(raw) {
            return Some(Self::Stage(stage));
        }
        Uuid::parse_str(raw.trim()).ok().map(Self::Task)
    }
}

#[cfg(test)]
mod tests {
    use super::DropTarget;
    use crate::model::task::Stage;
    use uuid::Uuid;

    #[test]
    fn parse_prefers_stage_identifiers() {
        assert_eq!(
            DropTarget::parse("inprogress"),
            Some(DropTarget::Stage(Stage::Active))
        );
    }

    #[test]
    fn parse_accepts_task_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(
            DropTarget::parse(&id.to_string()),
            Some(DropTarget::Task(id))
        );
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(DropTarget::parse("sidebar"), None);
    }
}
