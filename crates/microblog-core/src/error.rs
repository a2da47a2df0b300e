//! Error types surfaced by the caches and the push channel.

/// A page or list fetch failed. The cache that issued it is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// An optimistic action was rejected or could not reach the server.
/// By the time the caller sees this the local effect has been rolled back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MutationError {
    #[error("Post {0} is not in the feed")]
    UnknownPost(String),
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

/// Push transport failure. Reported to subscribers; never closes the channel by itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to connect: {0}")]
    Connect(String),
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Malformed(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<reqwest::Error> for MutationError {
    fn from(err: reqwest::Error) -> Self {
        MutationError::Transport(err.to_string())
    }
}
