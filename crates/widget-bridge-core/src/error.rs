use thiserror::Error;

#[derive(Debug, Error)]
pub enum WidgetBridgeError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Widget not found: {0}")]
    NotFound(String),

    #[error("Storage error during {operation} of widget {id}: {source}")]
    Storage {
        operation: &'static str,
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("Display mode request {0} was abandoned")]
    Abandoned(u64),

    #[error("Display mode request {0} timed out")]
    Timeout(u64),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WidgetBridgeError {
    /// Wrap an I/O failure with the cache operation and widget id it belongs to.
    pub fn storage(operation: &'static str, id: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            operation,
            id: id.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, WidgetBridgeError>;
