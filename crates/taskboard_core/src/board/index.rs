//! In-memory partition index.
//!
//! # Responsibility
//! - Hold, per stage, the rank-ordered task ids of one team's board.
//! - Apply moves as one uninterrupted step and capture cheap snapshots for
//!   rollback.
//!
//! # Invariants
//! - Each partition is sorted by `(rank, task_id)`; ranks written by the
//!   applier are strictly increasing.
//! - A task id lives in exactly one partition.
//! - Only the mutation applier and the board service mutate the index.

use super::command::MoveCommand;
use super::error::BoardError;
use super::rank::dense_ranks;
use crate::model::task::{PositionWrite, Rank, Stage, Task, TaskId, TeamId};
use log::info;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// One task's entry in a partition sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub task_id: TaskId,
    pub rank: Rank,
}

/// Stage and rank a task currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub stage: Stage,
    pub rank: Rank,
}

type Partitions = [Arc<Vec<Slot>>; 3];

/// Captured ordering of a [`PartitionIndex`].
///
/// Shares storage with the index until the index is next written.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    team_id: TeamId,
    partitions: Partitions,
    placements: Arc<HashMap<TaskId, Placement>>,
}

/// Stage → ordered task ids for one team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionIndex {
    team_id: TeamId,
    partitions: Partitions,
    placements: Arc<HashMap<TaskId, Placement>>,
}

impl PartitionIndex {
    /// Empty board for `team_id`.
    pub fn new(team_id: TeamId) -> Self {
        Self {
            team_id,
            partitions: Default::default(),
            placements: Arc::default(),
        }
    }

    /// Builds the index from the authoritative flat task list.
    ///
    /// The caller scopes the list to one team; a task of another team is
    /// rejected rather than filtered. Equal ranks inside a partition are
    /// ordered by task id.
    pub fn load<'a>(
        team_id: TeamId,
        tasks: impl IntoIterator<Item = &'a Task>,
    ) -> Result<Self, BoardError> {
        let mut partitions: [Vec<Slot>; 3] = Default::default();
        let mut placements = HashMap::new();

        for task in tasks {
            if task.team_id != team_id {
                return Err(BoardError::ForeignTask {
                    task_id: task.id,
                    team_id: task.team_id,
                });
            }
            let placement = Placement {
                stage: task.stage,
                rank: task.rank,
            };
            if placements.insert(task.id, placement).is_some() {
                return Err(BoardError::DuplicateTask(task.id));
            }
            partitions[task.stage.column()].push(Slot {
                task_id: task.id,
                rank: task.rank,
            });
        }

        for partition in &mut partitions {
            partition.sort_by_key(|slot| (slot.rank, slot.task_id));
        }

        info!(
            "event=board_load module=board status=ok tasks={} backlog={} active={} done={}",
            placements.len(),
            partitions[0].len(),
            partitions[1].len(),
            partitions[2].len()
        );

        Ok(Self {
            team_id,
            partitions: partitions.map(Arc::new),
            placements: Arc::new(placements),
        })
    }

    pub fn team_id(&self) -> TeamId {
        self.team_id
    }

    /// Ordered slots of one stage. Borrowed, never copied.
    pub fn sequence_for(&self, stage: Stage) -> &[Slot] {
        self.partitions[stage.column()].as_slice()
    }

    /// Ordered task ids of one stage.
    pub fn task_ids(&self, stage: Stage) -> impl Iterator<Item = TaskId> + '_ {
        self.sequence_for(stage).iter().map(|slot| slot.task_id)
    }

    /// Position of `task_id` inside `stage`, if it lives there.
    pub fn index_of(&self, stage: Stage, task_id: TaskId) -> Option<usize> {
        self.sequence_for(stage)
            .iter()
            .position(|slot| slot.task_id == task_id)
    }

    pub fn placement(&self, task_id: TaskId) -> Option<Placement> {
        self.placements.get(&task_id).copied()
    }

    /// Stage and position of `task_id`.
    pub fn locate(&self, task_id: TaskId) -> Option<(Stage, usize)> {
        let placement = self.placement(task_id)?;
        let index = self.index_of(placement.stage, task_id)?;
        Some((placement.stage, index))
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.placements.contains_key(&task_id)
    }

    pub fn len(&self, stage: Stage) -> usize {
        self.sequence_for(stage).len()
    }

    pub fn task_count(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Ascending ranks of `stage` with `task_id` left out.
    pub fn ranks_without(&self, stage: Stage, task_id: TaskId) -> Vec<Rank> {
        self.sequence_for(stage)
            .iter()
            .filter(|slot| slot.task_id != task_id)
            .map(|slot| slot.rank)
            .collect()
    }

    /// Whether every partition has strictly increasing ranks.
    pub fn is_strictly_ordered(&self) -> bool {
        self.partitions
            .iter()
            .all(|partition| partition.windows(2).all(|pair| pair[0].rank < pair[1].rank))
    }

    /// Captures the current ordering.
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            team_id: self.team_id,
            partitions: self.partitions.clone(),
            placements: Arc::clone(&self.placements),
        }
    }

    /// Returns the index to a captured ordering.
    pub(crate) fn restore(&mut self, snapshot: IndexSnapshot) {
        self.team_id = snapshot.team_id;
        self.partitions = snapshot.partitions;
        self.placements = snapshot.placements;
    }

    /// Moves a task to `command.target_stage` at `new_rank`.
    ///
    /// The destination position follows from the rank. Nothing changes when
    /// the task is unknown or the rank is taken by another task.
    pub(crate) fn apply_move(
        &mut self,
        command: &MoveCommand,
        new_rank: Rank,
    ) -> Result<(), BoardError> {
        let current = self
            .placement(command.task_id)
            .ok_or(BoardError::UnknownTask(command.task_id))?;
        let taken = self
            .sequence_for(command.target_stage)
            .iter()
            .any(|slot| slot.rank == new_rank && slot.task_id != command.task_id);
        if taken {
            return Err(BoardError::RankCollision {
                stage: command.target_stage,
                rank: new_rank,
            });
        }

        self.detach(current.stage, command.task_id);
        self.attach(
            command.target_stage,
            Slot {
                task_id: command.task_id,
                rank: new_rank,
            },
        );
        Ok(())
    }

    /// Moves a task to `command.target_index` and renumbers the destination
    /// partition densely from zero.
    ///
    /// Relative order of the other tasks is kept. Returns the writes for
    /// every task whose (stage, rank) changed, the moving task first.
    pub(crate) fn apply_move_renumbered(
        &mut self,
        command: &MoveCommand,
    ) -> Result<Vec<PositionWrite>, BoardError> {
        let current = self
            .placement(command.task_id)
            .ok_or(BoardError::UnknownTask(command.task_id))?;
        let mut order: Vec<TaskId> = self
            .task_ids(command.target_stage)
            .filter(|id| *id != command.task_id)
            .collect();
        if command.target_index > order.len() {
            return Err(BoardError::TargetIndexOutOfRange {
                stage: command.target_stage,
                target_index: command.target_index,
                len: order.len(),
            });
        }
        order.insert(command.target_index, command.task_id);

        let stage = command.target_stage;
        let count = order.len();
        let slots: Vec<Slot> = order
            .into_iter()
            .zip(dense_ranks(count))
            .map(|(task_id, rank)| Slot { task_id, rank })
            .collect();

        let moved = slots[command.target_index];
        let mut writes = vec![PositionWrite {
            task_id: moved.task_id,
            stage,
            rank: moved.rank,
        }];
        writes.extend(
            slots
                .iter()
                .filter(|slot| slot.task_id != moved.task_id)
                .filter(|slot| self.placement(slot.task_id).map(|p| p.rank) != Some(slot.rank))
                .map(|slot| PositionWrite {
                    task_id: slot.task_id,
                    stage,
                    rank: slot.rank,
                }),
        );

        self.detach(current.stage, command.task_id);
        let placements = Arc::make_mut(&mut self.placements);
        for slot in &slots {
            placements.insert(
                slot.task_id,
                Placement {
                    stage,
                    rank: slot.rank,
                },
            );
        }
        self.partitions[stage.column()] = Arc::new(slots);

        info!(
            "event=rank_renumber module=board status=ok stage={stage} tasks={} writes={}",
            self.len(stage),
            writes.len()
        );
        Ok(writes)
    }

    /// Adds a task created elsewhere. Placed by its rank.
    pub(crate) fn insert_task(&mut self, task: &Task) -> Result<(), BoardError> {
        if task.team_id != self.team_id {
            return Err(BoardError::ForeignTask {
                task_id: task.id,
                team_id: task.team_id,
            });
        }
        if self.contains(task.id) {
            return Err(BoardError::DuplicateTask(task.id));
        }
        self.attach(
            task.stage,
            Slot {
                task_id: task.id,
                rank: task.rank,
            },
        );
        Ok(())
    }

    /// Drops a task removed elsewhere. Unknown ids are already gone.
    pub(crate) fn remove_task(&mut self, task_id: TaskId) -> bool {
        match self.placement(task_id) {
            Some(placement) => {
                self.detach(placement.stage, task_id);
                Arc::make_mut(&mut self.placements).remove(&task_id);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, stage: Stage, task_id: TaskId) {
        Arc::make_mut(&mut self.partitions[stage.column()])
            .retain(|slot| slot.task_id != task_id);
    }

    fn attach(&mut self, stage: Stage, slot: Slot) {
        let partition = Arc::make_mut(&mut self.partitions[stage.column()]);
        let at = partition
            .partition_point(|other| (other.rank, other.task_id) < (slot.rank, slot.task_id));
        partition.insert(at, slot);
        Arc::make_mut(&mut self.placements).insert(
            slot.task_id,
            Placement {
                stage,
                rank: slot.rank,
            },
        );
    }
}
