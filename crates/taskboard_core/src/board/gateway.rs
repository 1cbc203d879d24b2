//! Persistence gateway contract.
//!
//! # Responsibility
//! - Define the one durable write the board engine issues per move.
//! - Adapt any [`TaskRepository`] into a gateway.
//!
//! # Invariants
//! - A call is all-or-nothing across its writes.
//! - Writes carry values, so replaying a call is safe.

use crate::model::task::PositionWrite;
use crate::repo::task_repo::{TaskRepoError, TaskRepository};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure reported by the durable store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Transient failure (network, lock contention). Re-attempting the
    /// gesture may succeed.
    Retryable(String),
    /// The store refused the write (missing task, invalid data).
    Rejected(String),
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl Display for GatewayError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Retryable(message) => write!(f, "transient persistence failure: {message}"),
            Self::Rejected(message) => write!(f, "persistence rejected write: {message}"),
        }
    }
}

impl Error for GatewayError {}

/// Durable boundary storing (stage, rank) per task.
pub trait PersistenceGateway {
    /// Persists every write or none of them.
    fn persist_positions(&self, writes: &[PositionWrite]) -> Result<(), GatewayError>;
}

impl<G: PersistenceGateway + ?Sized> PersistenceGateway for &G {
    fn persist_positions(&self, writes: &[PositionWrite]) -> Result<(), GatewayError> {
        (**self).persist_positions(writes)
    }
}

/// Gateway backed by a task repository.
pub struct RepoGateway<'r, R: TaskRepository> {
    repo: &'r R,
}

impl<'r, R: TaskRepository> RepoGateway<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        Self { repo }
    }
}

impl<R: TaskRepository> PersistenceGateway for RepoGateway<'_, R> {
    fn persist_positions(&self, writes: &[PositionWrite]) -> Result<(), GatewayError> {
        self.repo.write_positions(writes).map_err(Into::into)
    }
}

impl From<TaskRepoError> for GatewayError {
    fn from(value: TaskRepoError) -> Self {
        match &value {
            TaskRepoError::Db(err) if err.is_transient() => Self::Retryable(value.to_string()),
            _ => Self::Rejected(value.to_string()),
        }
    }
}
