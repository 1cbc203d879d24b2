//! Core domain logic for the team task board.
//! This crate owns task ordering and stage transitions; UI and CLI layers
//! only forward drop events and render the resulting columns.

pub mod board;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use board::{
    resolve, resolve_placement, AppliedMove, BoardError, DragGesture, DropTarget, GatewayError,
    IndexSnapshot, MoveCommand, MoveOutcome, MutationApplier, NoOpReason, PartitionIndex,
    PersistenceGateway, Placement, RepoGateway, Resolution, Slot,
};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::task::{
    NewTask, PositionWrite, Priority, Rank, Stage, Task, TaskId, TaskPatch, TaskValidationError,
    TeamId,
};
pub use repo::task_repo::{SqliteTaskRepository, TaskRepoError, TaskRepoResult, TaskRepository};
pub use service::board_service::{BoardColumn, BoardService, BoardServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
