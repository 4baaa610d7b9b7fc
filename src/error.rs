use thiserror::Error;

/// failures of one poll cycle; none of them stop the scheduler
#[derive(Error, Debug)]
pub enum PollError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("source answered {status} for {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("response is not a record list: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid source url {url}: {reason}")]
    Config { url: String, reason: String },
}

impl PollError {
    /// transport and http-status failures, as opposed to bad payloads
    pub fn is_fetch(&self) -> bool {
        matches!(self, PollError::Fetch(_) | PollError::Status { .. })
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, PollError::Decode(_))
    }
}

pub type Result<T, E = PollError> = std::result::Result<T, E>;
