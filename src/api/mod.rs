use crate::{
    domain::{Board, BoardId, Column, ColumnId, MoveDirection, Task, TaskId},
    error::Result,
};
use async_trait::async_trait;

pub mod http;
pub mod types;

pub use http::HttpBoardApi;
pub use types::{
    ColumnUpdate, Credentials, NewBoard, NewColumn, NewTask, TaskUpdate, TokenResponse, User,
};

/// The remote store of boards, columns and tasks
///
/// Every call except `login`, `register` and `refresh_token` is
/// authenticated with the current access token.
#[async_trait]
pub trait BoardApi: Send + Sync {
    /// Exchanges credentials for tokens
    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse>;

    /// Creates an account
    async fn register(&self, credentials: &Credentials) -> Result<()>;

    /// Exchanges a refresh token for a new access token
    async fn refresh_token(&self, refresh_token: &str) -> Result<String>;

    /// Installs or removes the access token used for later calls
    async fn set_access_token(&self, token: Option<String>);

    async fn list_boards(&self) -> Result<Vec<Board>>;

    async fn create_board(&self, board: &NewBoard) -> Result<Board>;

    /// Deletes a board with its columns and tasks
    async fn delete_board(&self, id: BoardId) -> Result<()>;

    /// Lists a board's columns in server order
    async fn list_columns(&self, board: BoardId) -> Result<Vec<Column>>;

    async fn create_column(&self, board: BoardId, column: &NewColumn) -> Result<Column>;

    async fn update_column(&self, id: ColumnId, update: &ColumnUpdate) -> Result<()>;

    /// Deletes a column with its tasks
    async fn delete_column(&self, id: ColumnId) -> Result<()>;

    /// Lists a column's tasks in server order
    async fn list_tasks(&self, column: ColumnId) -> Result<Vec<Task>>;

    async fn create_task(&self, column: ColumnId, task: &NewTask) -> Result<Task>;

    async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<()>;

    async fn delete_task(&self, id: TaskId) -> Result<()>;

    /// Moves a task one column left or right on the server
    async fn move_task(&self, id: TaskId, direction: MoveDirection) -> Result<()>;
}
