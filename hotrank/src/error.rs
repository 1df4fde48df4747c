use thiserror::Error;

/// Why a single request attempt did not produce a usable JSON object.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("invalid JSON body: {0}")]
    Decode(String),

    #[error("response is not a JSON object")]
    NotAnObject,
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AttemptError::Status(status.as_u16()),
            None => AttemptError::Network(err.to_string()),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// Every attempt failed; `last` is the cause of the final one.
    #[error("GET {url} failed after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: AttemptError,
    },

    /// The endpoint answered but reported a non-success code.
    #[error("api error: code={code} message={message}")]
    Api { code: i64, message: String },

    #[error("unexpected response shape: {0}")]
    Shape(String),
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("catalog entry has no bvid")]
    MissingIdentifier,

    #[error("concurrency gate closed")]
    Closed,

    #[error("enriching {bvid} failed: {source}")]
    Fetch {
        bvid: String,
        #[source]
        source: FetchError,
    },
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
