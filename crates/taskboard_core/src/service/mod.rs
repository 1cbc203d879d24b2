//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and board engine calls into use-case APIs.
//! - Keep CLI and UI layers decoupled from storage details.

pub mod board_service;
