//! Task board domain model.
//!
//! # Responsibility
//! - Define the task record consumed by the ordering engine.
//! - Define the stage and priority enumerations and their wire names.
//!
//! # Invariants
//! - Every task is identified by a stable `TaskId`.
//! - Ranks only compare within one (team, stage) partition.

pub mod task;
