use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardError>;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Drop target not found for {0}")]
    DropTargetNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Index {index} out of range for list of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Not authenticated. Log in first.")]
    NotAuthenticated,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    Other(String),
}

impl BoardError {
    /// True for failures that never reached the server or never came back
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// True for non-2xx responses (validation or authorization failures)
    pub fn is_server(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_) | Self::Forbidden(_) | Self::NotFound(_) | Self::Api { .. }
        )
    }
}
