use crate::error::Result;
use crate::frame::Frame;

/// Delegate receiving each decoded frame or the error that replaced it.
pub type FrameCallback = Box<dyn FnMut(Result<Frame>) + Send + 'static>;

/// Callback-based live preview delivery.
///
/// Every delegate invocation carries exactly one outcome: a [`Frame`] or an
/// [`Error`](crate::Error). Invocations for a session happen in order on a single thread
/// owned by the source.
pub trait LiveViewSource {
    /// Install or clear the delegate. Takes effect from the next delivery.
    fn set_delegate(&mut self, delegate: Option<FrameCallback>);

    /// Begin streaming from `host` (`name`, `ip` or `name:port`).
    ///
    /// Returns once the session has been scheduled. Connection failures
    /// are reported through the delegate, not here.
    fn start(&mut self, host: &str, session_id: Option<&str>) -> Result<()>;

    /// Stop the active session. No delivery happens after this returns.
    fn cancel(&mut self) -> Result<()>;

    /// Whether a session is running.
    fn is_active(&self) -> bool;
}
