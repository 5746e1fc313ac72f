use crate::model::{ParseError, UnsupportedOperation};

/// Classification of everything that can go wrong while fetching.
///
/// Item-scoped failures (`NotFound`, `Payload`, …) are reported to listeners
/// and skipped; page-scoped ones drive the orchestrator's retry machinery;
/// `Fatal` and `Checkpoint` abort the whole crawl with the checkpoint
/// retained for resume.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Malformed or unrecognized URL; the caller's input is wrong, never retried.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Resource absent at the expected location; terminal for that item.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Connection failure or retryable HTTP status, surfaced after the
    /// transport's own backoff retries were exhausted.
    #[error("transient fetch failure: {message}")]
    Transient { status: Option<u16>, message: String },

    /// A non-final page came back with fewer results than the page size
    /// implies, caused by a server-side search timeout rather than end-of-data.
    #[error("page {page} returned {got} of {expected} expected results")]
    IncompletePage { page: u64, got: usize, expected: usize },

    /// Secondary/backoff rate limit signal; sleep and retry, uncounted.
    #[error("hit a secondary rate limit")]
    RateLimited,

    /// Empty or binary payload, rejected before normalization.
    #[error("invalid payload: {0}")]
    Payload(String),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperation),

    /// The checkpoint store failed; aborts the crawl.
    #[error("checkpoint persistence failed: {0}")]
    Checkpoint(String),

    /// Retry budget exhausted or unrecoverable response; aborts the crawl.
    #[error("fatal fetch failure: {0}")]
    Fatal(String),
}
