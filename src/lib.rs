//! postdraft - Crash-safe local drafts for server-owned posts.
//!
//! This library keeps a user's in-progress edit of a post in a persisted
//! draft store and reconciles it with the server's copy: the draft is shown
//! while it exists and is evicted automatically once it matches the server.
//!
//! The engine is three pieces:
//! - [`normalize`] - projects server and local data into a comparable form
//! - [`storage`] - persisted `post id -> draft` mapping
//! - [`reconcile`] - decides what to display and when to evict a draft
//!
//! The `pd` binary drives the engine from the command line.

pub mod action_log;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod storage;
pub mod telemetry;


/// Library-level error type for postdraft operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Save failed: {0}")]
    Save(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for postdraft operations.
pub type Result<T> = std::result::Result<T, Error>;
