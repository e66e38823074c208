/// Crate-wide result type for registry calls.
pub type Result<T> = std::result::Result<T, Error>;

/// Registry call failures. Both variants are transient from the caller's
/// point of view and go through the retry orchestrator before surfacing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network-level failure (unreachable, timeout, malformed body).
    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The registry answered with a non-success status.
    #[error("registry returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}
