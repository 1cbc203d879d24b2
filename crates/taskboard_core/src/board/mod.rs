//! Ordering and stage-transition engine.
//!
//! # Responsibility
//! - Assign tasks a stage and a rank inside that stage.
//! - Keep ranks strictly increasing per partition under ad-hoc moves.
//! - Persist each move without corrupting other tasks' ranks.
//!
//! # Flow
//! drop event → [`resolver`] → [`MoveCommand`] → [`MutationApplier`]
//! (optimistic index update, then one durable write) → rollback on failure.

pub mod applier;
pub mod command;
pub mod error;
pub mod gateway;
pub mod index;
pub mod rank;
pub mod resolver;

pub use applier::{AppliedMove, MoveOutcome, MutationApplier};
pub use command::{DropTarget, MoveCommand};
pub use error::BoardError;
pub use gateway::{GatewayError, PersistenceGateway, RepoGateway};
pub use index::{IndexSnapshot, PartitionIndex, Placement, Slot};
pub use resolver::{resolve, resolve_placement, DragGesture, NoOpReason, Resolution};
