//! `BoardApi` over JSON/HTTP.

use super::{
    types::{AccessTokenResponse, ApiMessage, MoveRequest},
    BoardApi, ColumnUpdate, Credentials, NewBoard, NewColumn, NewTask, TaskUpdate, TokenResponse,
};
use crate::{
    config::ClientConfig,
    domain::{Board, BoardId, Column, ColumnId, MoveDirection, Task, TaskId},
    error::{BoardError, Result},
};
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

const HTTP_UNAUTHORIZED: u16 = 401;
const HTTP_FORBIDDEN: u16 = 403;
const HTTP_NOT_FOUND: u16 = 404;

/// HTTP client for the board REST API
///
/// The access token lives behind a lock so one shared instance picks up a
/// new login everywhere.
#[derive(Debug)]
pub struct HttpBoardApi {
    client: Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
}

impl HttpBoardApi {
    const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a client for the API rooted at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::with_timeout(config.api_url.clone(), config.request_timeout())
    }

    fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn bearer(&self) -> Result<String> {
        self.access_token
            .read()
            .await
            .as_ref()
            .map(|token| format!("Bearer {}", token))
            .ok_or(BoardError::NotAuthenticated)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        check_response(response).await
    }

    async fn send_authorized(&self, request: RequestBuilder) -> Result<Response> {
        let bearer = self.bearer().await?;
        self.send(request.header(AUTHORIZATION, bearer)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send_authorized(self.client.get(self.url(path))).await?;
        read_json(response).await
    }
}

/// Maps a non-2xx response to the matching `BoardError`
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status_code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = extract_message(&body);
    warn!(status = status_code, %message, "request rejected");

    match status_code {
        HTTP_UNAUTHORIZED => Err(BoardError::Unauthorized(message)),
        HTTP_FORBIDDEN => Err(BoardError::Forbidden(message)),
        HTTP_NOT_FOUND => Err(BoardError::NotFound(message)),
        _ => Err(BoardError::Api {
            status: status_code,
            message,
        }),
    }
}

/// Decodes a successful response body.
///
/// A body that does not parse is the server's fault, so it maps to `Api`
/// with the response status rather than to a transport error.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        warn!(status, error = %e, "unreadable response body");
        BoardError::Api {
            status,
            message: format!("unreadable response body: {}", e),
        }
    })
}

/// Prefers the server's `message` field, falling back to the raw body
fn extract_message(body: &str) -> String {
    serde_json::from_str::<ApiMessage>(body)
        .ok()
        .and_then(|m| m.message)
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse> {
        let request = self.client.post(self.url("/login")).json(credentials);
        let response = self.send(request).await?;
        read_json(response).await
    }

    #[instrument(skip(self, credentials), fields(username = %credentials.username))]
    async fn register(&self, credentials: &Credentials) -> Result<()> {
        let request = self.client.post(self.url("/register")).json(credentials);
        self.send(request).await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn refresh_token(&self, refresh_token: &str) -> Result<String> {
        let request = self
            .client
            .post(self.url("/refresh"))
            .header(AUTHORIZATION, format!("Bearer {}", refresh_token));
        let response = self.send(request).await?;
        let body: AccessTokenResponse = read_json(response).await?;
        Ok(body.access_token)
    }

    async fn set_access_token(&self, token: Option<String>) {
        debug!(present = token.is_some(), "access token updated");
        *self.access_token.write().await = token;
    }

    #[instrument(skip(self))]
    async fn list_boards(&self) -> Result<Vec<Board>> {
        self.get_json("/boards").await
    }

    #[instrument(skip(self))]
    async fn create_board(&self, board: &NewBoard) -> Result<Board> {
        let request = self.client.post(self.url("/boards")).json(board);
        let response = self.send_authorized(request).await?;
        read_json(response).await
    }

    #[instrument(skip(self))]
    async fn delete_board(&self, id: BoardId) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/boards/{}", id)));
        self.send_authorized(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_columns(&self, board: BoardId) -> Result<Vec<Column>> {
        self.get_json(&format!("/boards/{}/columns", board)).await
    }

    #[instrument(skip(self))]
    async fn create_column(&self, board: BoardId, column: &NewColumn) -> Result<Column> {
        let request = self
            .client
            .post(self.url(&format!("/boards/{}/columns", board)))
            .json(column);
        let response = self.send_authorized(request).await?;
        read_json(response).await
    }

    #[instrument(skip(self))]
    async fn update_column(&self, id: ColumnId, update: &ColumnUpdate) -> Result<()> {
        let request = self
            .client
            .put(self.url(&format!("/columns/{}", id)))
            .json(update);
        self.send_authorized(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_column(&self, id: ColumnId) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/columns/{}", id)));
        self.send_authorized(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_tasks(&self, column: ColumnId) -> Result<Vec<Task>> {
        self.get_json(&format!("/columns/{}/tasks", column)).await
    }

    #[instrument(skip(self))]
    async fn create_task(&self, column: ColumnId, task: &NewTask) -> Result<Task> {
        let request = self
            .client
            .post(self.url(&format!("/columns/{}/tasks", column)))
            .json(task);
        let response = self.send_authorized(request).await?;
        read_json(response).await
    }

    #[instrument(skip(self))]
    async fn update_task(&self, id: TaskId, update: &TaskUpdate) -> Result<()> {
        let request = self
            .client
            .put(self.url(&format!("/tasks/{}", id)))
            .json(update);
        self.send_authorized(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, id: TaskId) -> Result<()> {
        let request = self.client.delete(self.url(&format!("/tasks/{}", id)));
        self.send_authorized(request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn move_task(&self, id: TaskId, direction: MoveDirection) -> Result<()> {
        let request = self
            .client
            .post(self.url(&format!("/tasks/{}/move", id)))
            .json(&MoveRequest { direction });
        self.send_authorized(request).await?;
        Ok(())
    }
}
