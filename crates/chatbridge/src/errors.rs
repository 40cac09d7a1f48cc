use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    /// The inbound request is unusable; surfaced to callers as a client error
    #[error("{0}")]
    InvalidRequest(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

pub type ChatResult<T> = Result<T, ChatError>;
