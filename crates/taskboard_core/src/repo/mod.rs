//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the durable task store contract used by the board engine.
//! - Isolate SQLite query details from board orchestration.
//!
//! # Invariants
//! - Write paths validate payloads before SQL mutations.
//! - Position writes are all-or-nothing per call.

pub mod task_repo;
