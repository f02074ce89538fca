use thiserror::Error;

#[derive(Error, Debug)]
pub enum ThrottleError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Sink failed to publish: {0}")]
    SinkFailed(String),

    #[error("Internal channel closed")]
    ChannelClosed,

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),

    #[error("Failed to parse JSON: {0}")]
    ParseError(#[from] serde_json::Error),
}
