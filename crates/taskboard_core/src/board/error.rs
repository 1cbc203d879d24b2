//! Board engine errors.

use super::gateway::GatewayError;
use crate::model::task::{Rank, Stage, TaskId, TeamId};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from the partition index and mutation applier.
///
/// Every variant is local to one call: the index stays usable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    /// A loaded task belongs to another team than the board.
    ForeignTask { task_id: TaskId, team_id: TeamId },
    /// The same task id appeared twice in a load.
    DuplicateTask(TaskId),
    /// The command names a task the index does not hold.
    UnknownTask(TaskId),
    /// The command's target index lies outside the destination partition.
    TargetIndexOutOfRange {
        stage: Stage,
        target_index: usize,
        len: usize,
    },
    /// An allocated rank is already taken in the destination partition.
    RankCollision { stage: Stage, rank: Rank },
    /// The durable write failed; the index was rolled back.
    Persistence(GatewayError),
}

impl BoardError {
    /// Whether re-attempting the same gesture may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(err) if err.is_retryable())
    }
}

impl Display for BoardError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignTask { task_id, team_id } => {
                write!(f, "task {task_id} belongs to another team ({team_id})")
            }
            Self::DuplicateTask(id) => write!(f, "task listed twice: {id}"),
            Self::UnknownTask(id) => write!(f, "task not on board: {id}"),
            Self::TargetIndexOutOfRange {
                stage,
                target_index,
                len,
            } => write!(
                f,
                "target index {target_index} out of range for stage {stage} with {len} tasks"
            ),
            Self::RankCollision { stage, rank } => {
                write!(f, "rank {rank} already taken in stage {stage}")
            }
            Self::Persistence(err) => write!(f, "move reverted: {err}"),
        }
    }
}

impl Error for BoardError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}
