//! Board session use-case service.
//!
//! # Responsibility
//! - Own one team's partition index for the lifetime of a board session.
//! - Route drops and explicit moves through resolver and mutation applier.
//! - Keep the index in step with task creation and deletion.
//! - Keep cached payloads in step with task edits.
//!
//! # Invariants
//! - The index is only written through this service or the applier it drives.
//! - The durable store wins on reload; the in-memory index may be stale
//!   between loads.
//! - Cached task payloads mirror the index's stage and rank after every
//!   successful move.

use crate::board::{
    resolve_placement, BoardError, DragGesture, DropTarget, MoveOutcome, MutationApplier,
    PartitionIndex, RepoGateway, Resolution, Slot,
};
use crate::model::task::{NewTask, Stage, Task, TaskId, TaskPatch, TeamId};
use crate::repo::task_repo::{TaskRepoError, TaskRepository};
use log::{info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from board service operations.
#[derive(Debug)]
pub enum BoardServiceError {
    /// Durable store failure outside of a move.
    Repo(TaskRepoError),
    /// Engine failure. Moves that fail here were rolled back.
    Board(BoardError),
}

impl BoardServiceError {
    /// Whether re-attempting the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Board(err) => err.is_retryable(),
            Self::Repo(TaskRepoError::Db(err)) => err.is_transient(),
            Self::Repo(_) => false,
        }
    }
}

impl Display for BoardServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Board(err) => write!(f, "{err}"),
        }
    }
}

impl Error for BoardServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Board(err) => Some(err),
        }
    }
}

impl From<TaskRepoError> for BoardServiceError {
    fn from(value: TaskRepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<BoardError> for BoardServiceError {
    fn from(value: BoardError) -> Self {
        Self::Board(value)
    }
}

/// One rendered column: a stage and its ordered slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardColumn<'a> {
    pub stage: Stage,
    pub slots: &'a [Slot],
}

/// One team's board session.
pub struct BoardService<R: TaskRepository> {
    repo: R,
    index: PartitionIndex,
    tasks: HashMap<TaskId, Task>,
}

impl<R: TaskRepository> BoardService<R> {
    /// Loads the team's tasks and builds the session index.
    pub fn open(repo: R, team_id: TeamId) -> Result<Self, BoardServiceError> {
        let (index, tasks) = load_board(&repo, team_id)?;
        Ok(Self { repo, index, tasks })
    }

    /// Rebuilds the index from the durable store.
    ///
    /// The current index is kept when loading fails.
    pub fn reload(&mut self) -> Result<(), BoardServiceError> {
        let (index, tasks) = load_board(&self.repo, self.index.team_id())?;
        self.index = index;
        self.tasks = tasks;
        Ok(())
    }

    pub fn team_id(&self) -> TeamId {
        self.index.team_id()
    }

    pub fn index(&self) -> &PartitionIndex {
        &self.index
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Cached task payload.
    pub fn task(&self, task_id: TaskId) -> Option<&Task> {
        self.tasks.get(&task_id)
    }

    /// Columns in board order, each with its ordered slots.
    pub fn columns(&self) -> impl Iterator<Item = BoardColumn<'_>> {
        Stage::ALL.into_iter().map(|stage| BoardColumn {
            stage,
            slots: self.index.sequence_for(stage),
        })
    }

    /// Creates a task ranked last in its initial stage.
    pub fn create_task(&mut self, request: &NewTask) -> Result<Task, BoardServiceError> {
        let task = self.repo.create_task(self.team_id(), request)?;
        if let Err(err) = self.index.insert_task(&task) {
            warn!("event=task_create module=service status=error error={err}");
            self.reload()?;
            return Ok(task);
        }
        self.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    /// Edits a task's payload. The index is not touched: edits never move
    /// a task.
    pub fn update_task(
        &mut self,
        task_id: TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, BoardServiceError> {
        let task = self.repo.update_task(task_id, patch)?;
        if let Some(cached) = self.tasks.get_mut(&task_id) {
            *cached = task.clone();
        }
        Ok(task)
    }

    /// Deletes a task durably and drops it from the index.
    ///
    /// Returns `false` when the task was already gone.
    pub fn delete_task(&mut self, task_id: TaskId) -> Result<bool, BoardServiceError> {
        let existed = match self.repo.delete_task(task_id) {
            Ok(()) => true,
            Err(TaskRepoError::TaskNotFound(_)) => false,
            Err(err) => return Err(err.into()),
        };
        self.index.remove_task(task_id);
        self.tasks.remove(&task_id);
        info!("event=task_delete module=service status=ok existed={existed}");
        Ok(existed)
    }

    /// Resolves a finished gesture and applies the resulting move.
    pub fn drop_task(
        &mut self,
        gesture: DragGesture,
        target: Option<DropTarget>,
    ) -> Result<MoveOutcome, BoardServiceError> {
        let resolution = gesture.drop_on(&self.index, target);
        self.apply(resolution)
    }

    /// Moves a task to an explicit stage and index.
    pub fn move_task(
        &mut self,
        task_id: TaskId,
        stage: Stage,
        target_index: usize,
    ) -> Result<MoveOutcome, BoardServiceError> {
        let resolution = resolve_placement(&self.index, task_id, stage, target_index);
        self.apply(resolution)
    }

    /// Applies a resolution through the repository-backed gateway.
    pub fn apply(&mut self, resolution: Resolution) -> Result<MoveOutcome, BoardServiceError> {
        if let Resolution::NoOp(reason) = resolution {
            return Ok(MoveOutcome::Skipped(reason));
        }

        let applier = MutationApplier::new(RepoGateway::new(&self.repo));
        let outcome = applier.apply_resolution(&mut self.index, resolution)?;
        if let MoveOutcome::Applied(applied) = &outcome {
            for write in &applied.writes {
                if let Some(task) = self.tasks.get_mut(&write.task_id) {
                    task.stage = write.stage;
                    task.rank = write.rank;
                }
            }
        }
        Ok(outcome)
    }
}

fn load_board<R: TaskRepository>(
    repo: &R,
    team_id: TeamId,
) -> Result<(PartitionIndex, HashMap<TaskId, Task>), BoardServiceError> {
    let tasks = repo.list_team_tasks(team_id)?;
    let index = PartitionIndex::load(team_id, &tasks)?;
    let tasks = tasks.into_iter().map(|task| (task.id, task)).collect();
    Ok((index, tasks))
}
