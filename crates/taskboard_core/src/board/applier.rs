//! Optimistic move application with rollback.
//!
//! # Responsibility
//! - Allocate the destination rank, update the partition index, then issue
//!   the durable write.
//! - Restore the pre-move snapshot when the durable write fails.
//!
//! # Invariants
//! - The index is updated before the durable write is issued.
//! - A failed write always restores the snapshot taken for that move.
//! - Malformed commands are rejected before anything is mutated.
//! - Identity moves issue no write.

use super::command::MoveCommand;
use super::error::BoardError;
use super::gateway::PersistenceGateway;
use super::index::PartitionIndex;
use super::rank;
use super::resolver::{NoOpReason, Resolution};
use crate::model::task::{PositionWrite, Rank, Stage, TaskId};
use log::{debug, info, warn};

/// A move that reached the durable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub task_id: TaskId,
    pub from: Stage,
    pub stage: Stage,
    pub index: usize,
    pub rank: Rank,
    /// Whether the destination partition was renumbered.
    pub renumbered: bool,
    /// Every position written, moving task first.
    pub writes: Vec<PositionWrite>,
}

/// Result of one apply call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Nothing changed and nothing was written.
    Skipped(NoOpReason),
    Applied(AppliedMove),
}

/// Applies move commands to a partition index through a gateway.
pub struct MutationApplier<G: PersistenceGateway> {
    gateway: G,
}

impl<G: PersistenceGateway> MutationApplier<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Applies a resolution. No-ops pass through untouched.
    pub fn apply_resolution(
        &self,
        index: &mut PartitionIndex,
        resolution: Resolution,
    ) -> Result<MoveOutcome, BoardError> {
        match resolution {
            Resolution::Move(command) => self.apply(index, &command),
            Resolution::NoOp(reason) => Ok(MoveOutcome::Skipped(reason)),
        }
    }

    /// Applies one command.
    ///
    /// # Errors
    /// - `UnknownTask` / `TargetIndexOutOfRange` for malformed commands; the
    ///   index is untouched.
    /// - `Persistence` when the durable write fails; the index is restored
    ///   to its state before this call.
    pub fn apply(
        &self,
        index: &mut PartitionIndex,
        command: &MoveCommand,
    ) -> Result<MoveOutcome, BoardError> {
        let (from, current_index) = index
            .locate(command.task_id)
            .ok_or(BoardError::UnknownTask(command.task_id))?;
        let ranks = index.ranks_without(command.target_stage, command.task_id);
        if command.target_index > ranks.len() {
            return Err(BoardError::TargetIndexOutOfRange {
                stage: command.target_stage,
                target_index: command.target_index,
                len: ranks.len(),
            });
        }
        if from == command.target_stage && current_index == command.target_index {
            debug!("event=move_apply module=board status=noop reason=same_position");
            return Ok(MoveOutcome::Skipped(NoOpReason::SamePosition));
        }

        let snapshot = index.snapshot();
        let (rank, writes, renumbered) = match rank::allocate(&ranks, command.target_index) {
            Some(rank) => {
                index.apply_move(command, rank)?;
                let write = PositionWrite {
                    task_id: command.task_id,
                    stage: command.target_stage,
                    rank,
                };
                (rank, vec![write], false)
            }
            None => {
                let writes = index.apply_move_renumbered(command)?;
                (writes[0].rank, writes, true)
            }
        };

        if let Err(err) = self.gateway.persist_positions(&writes) {
            index.restore(snapshot);
            warn!(
                "event=move_apply module=board status=rollback from={from} to={} writes={} retryable={} error={err}",
                command.target_stage,
                writes.len(),
                err.is_retryable()
            );
            return Err(BoardError::Persistence(err));
        }

        info!(
            "event=move_apply module=board status=ok from={from} to={} index={} rank={rank} renumbered={renumbered} writes={}",
            command.target_stage,
            command.target_index,
            writes.len()
        );
        Ok(MoveOutcome::Applied(AppliedMove {
            task_id: command.task_id,
            from,
            stage: command.target_stage,
            index: command.target_index,
            rank,
            renumbered,
            writes,
        }))
    }
}
