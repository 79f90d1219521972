/// Shared error type used across all boardbridge crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("board: {0}")]
    Board(String),

    /// The board service answered with a non-2xx status.
    #[error("board returned HTTP {status}: {body}")]
    BoardStatus { status: u16, body: String },

    #[error("invalid action: {0}")]
    InvalidAction(String),

    #[error("reply: {0}")]
    Reply(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
