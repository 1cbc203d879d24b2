//! Drop-event resolution.
//!
//! # Responsibility
//! - Turn one raw drop (source task, drop target) into a normalized
//!   [`MoveCommand`] or an explicit no-op.
//!
//! # Invariants
//! - Resolution never mutates the index.
//! - Cross-stage drops always append to the destination stage, whether the
//!   target was the column or a card in it.
//! - A gesture resolves exactly once: [`DragGesture`] is consumed by
//!   `drop_on` or `cancel`.

use super::command::{DropTarget, MoveCommand};
use super::index::PartitionIndex;
use crate::model::task::{Stage, TaskId};
use log::debug;

/// Why a gesture changes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// Gesture cancelled before drop.
    Cancelled,
    /// Released outside every drop target.
    NoTarget,
    /// Dropped on the background of its own column.
    SameStage,
    /// Net position equals the current position.
    SamePosition,
    /// The dragged task is not on the board (already removed).
    UnknownSource,
    /// The target card is not on the board (already removed).
    UnknownTarget,
}

impl NoOpReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::NoTarget => "no_target",
            Self::SameStage => "same_stage",
            Self::SamePosition => "same_position",
            Self::UnknownSource => "unknown_source",
            Self::UnknownTarget => "unknown_target",
        }
    }
}

/// Result of resolving one drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Move(MoveCommand),
    NoOp(NoOpReason),
}

/// Resolves a drop of `source` onto `target`.
///
/// Same-stage card drops insert the task immediately before the target
/// card. The index is counted in the sequence without the task, so a drop
/// on the card right after the task changes nothing.
pub fn resolve(index: &PartitionIndex, source: TaskId, target: DropTarget) -> Resolution {
    let Some((source_stage, source_index)) = index.locate(source) else {
        return no_op(NoOpReason::UnknownSource);
    };

    match target {
        DropTarget::Stage(stage) if stage == source_stage => no_op(NoOpReason::SameStage),
        DropTarget::Stage(stage) => append_to(index, source, stage),
        DropTarget::Task(sibling) if sibling == source => no_op(NoOpReason::SamePosition),
        DropTarget::Task(sibling) => match index.locate(sibling) {
            None => no_op(NoOpReason::UnknownTarget),
            Some((stage, _)) if stage != source_stage => append_to(index, source, stage),
            Some((stage, sibling_index)) => {
                let target_index = if source_index < sibling_index {
                    sibling_index - 1
                } else {
                    sibling_index
                };
                if target_index == source_index {
                    return no_op(NoOpReason::SamePosition);
                }
                Resolution::Move(MoveCommand {
                    task_id: source,
                    target_stage: stage,
                    target_index,
                })
            }
        },
    }
}

/// Resolves an explicit placement request (keyboard moves, API callers).
///
/// `target_index` is clamped to the destination partition without the task.
pub fn resolve_placement(
    index: &PartitionIndex,
    source: TaskId,
    stage: Stage,
    target_index: usize,
) -> Resolution {
    let Some((source_stage, source_index)) = index.locate(source) else {
        return no_op(NoOpReason::UnknownSource);
    };

    let len = if source_stage == stage {
        index.len(stage) - 1
    } else {
        index.len(stage)
    };
    let target_index = target_index.min(len);
    if source_stage == stage && source_index == target_index {
        return no_op(NoOpReason::SamePosition);
    }

    Resolution::Move(MoveCommand {
        task_id: source,
        target_stage: stage,
        target_index,
    })
}

fn append_to(index: &PartitionIndex, source: TaskId, stage: Stage) -> Resolution {
    Resolution::Move(MoveCommand {
        task_id: source,
        target_stage: stage,
        target_index: index.len(stage),
    })
}

fn no_op(reason: NoOpReason) -> Resolution {
    debug!(
        "event=move_resolve module=board status=noop reason={}",
        reason.as_str()
    );
    Resolution::NoOp(reason)
}

/// One drag gesture, from pick-up to drop or cancel.
#[derive(Debug)]
#[must_use = "a gesture must be dropped or cancelled"]
pub struct DragGesture {
    task_id: TaskId,
}

impl DragGesture {
    pub fn start(task_id: TaskId) -> Self {
        Self { task_id }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Resolves the gesture at release. `None` means released outside any
    /// valid target.
    pub fn drop_on(self, index: &PartitionIndex, target: Option<DropTarget>) -> Resolution {
        match target {
            Some(target) => resolve(index, self.task_id, target),
            None => no_op(NoOpReason::NoTarget),
        }
    }

    pub fn cancel(self) -> Resolution {
        no_op(NoOpReason::Cancelled)
    }
}
