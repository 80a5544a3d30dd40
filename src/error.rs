use std::time::Duration;

/// Result alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level crate error.
///
/// Errors reach callers two ways: returned synchronously from
/// [`LiveViewSource::start`](crate::LiveViewSource::start) and
/// [`LiveViewSource::cancel`](crate::LiveViewSource::cancel) when a
/// precondition fails, or delivered through the frame delegate once a
/// session is running.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid camera host {0:?}")]
    InvalidHost(String),
    #[error("stream already started")]
    AlreadyStarted,
    #[error("stream not started")]
    NotStarted,
    #[error("stream canceled")]
    Canceled,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    /// The camera answered the preview command with a non-success status.
    #[error("camera returned status {status}: {message}")]
    Status {
        status: u16,
        /// OSC error code (e.g. `invalidSessionId`) when the body carried one.
        code: Option<String>,
        message: String,
    },
    #[error("no data from camera for {0:?}")]
    Timeout(Duration),
    #[error("camera closed the preview stream")]
    StreamEnded,
    #[error("frame exceeds {limit} bytes without an end-of-image marker")]
    FrameTooLarge { limit: usize },
    #[error("failed to decode frame: {0}")]
    Decode(#[from] image::ImageError),
    #[error("failed to start stream worker: {0}")]
    Runtime(#[from] std::io::Error),
}

impl Error {
    /// Whether this error ends the session that produced it.
    ///
    /// Only per-frame decode failures leave the stream running.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Decode(_))
    }
}
