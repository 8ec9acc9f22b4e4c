//! # Taskboard Client
//!
//! Client-side state and server reconciliation for a kanban board REST API.
//!
//! The crate keeps a local copy of a board's columns and tasks, resolves
//! drag-and-drop gestures into new orderings, applies them optimistically
//! and persists the resulting positions to the server. Rendering is left to
//! the caller.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod session;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use api::{BoardApi, HttpBoardApi};
pub use config::ClientConfig;
pub use domain::{
    Board, BoardId, Column, ColumnId, DragGesture, DropPolicy, DropTarget, MoveDirection, Task,
    TaskId,
};
pub use error::{BoardError, Result};
pub use session::{Authenticator, FileSessionStore, Session, SessionStore};
pub use store::{BoardAction, BoardStore, ItemChange, ReorderPlan};
pub use sync::{BoardSync, RefetchPolicy, SyncPolicy};
