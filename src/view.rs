//! A stateful façade over a [`LiveViewSource`].
//!
//! [`LiveView`] tracks whether the preview is idle, connecting, streaming
//! or failed, keeps the most recent frame, and tells a
//! [`LiveViewDelegate`] whenever the state changes.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::osc::LiveViewStream;
use crate::stream::LiveViewSource;
use crate::types::DEFAULT_HOST;

/// Why a live view ended up in [`State::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum LiveViewError {
    #[error("unknown live view error")]
    Unknown,
    #[error("live view canceled")]
    Canceled,
    #[error("camera cannot perform the live view operation")]
    CanNotPerformOperation,
}

impl From<&Error> for LiveViewError {
    fn from(e: &Error) -> Self {
        match e {
            Error::Canceled => Self::Canceled,
            Error::InvalidHost(_)
            | Error::AlreadyStarted
            | Error::NotStarted
            | Error::Status { .. } => Self::CanNotPerformOperation,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Idle,
    Connecting,
    Streaming,
    Error(LiveViewError),
}

/// Receives state changes of a [`LiveView`].
///
/// Called on whichever thread caused the change: the caller's thread for
/// start and stop, the stream's worker thread for frames and errors. Calls
/// are made without the view's locks held, but a delegate must not call
/// [`start_streaming`](LiveView::start_streaming) or
/// [`stop_streaming`](LiveView::stop_streaming) while another thread is
/// inside one of them.
pub trait LiveViewDelegate: Send + Sync {
    fn did_change(&self, state: State);
}

struct Inner {
    state: State,
    latest_frame: Option<Arc<Frame>>,
    session_id: Option<String>,
}

impl Inner {
    /// Move to `state`, returning it if it differs from the current one.
    fn replace(&mut self, state: State) -> Option<State> {
        if self.state == state {
            return None;
        }
        self.state = state;
        Some(state)
    }
}

struct Shared {
    inner: Mutex<Inner>,
    delegate: Mutex<Option<Weak<dyn LiveViewDelegate>>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn notify(&self, changed: Option<State>) {
        let Some(state) = changed else { return };
        let delegate = self
            .delegate
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .and_then(Weak::upgrade);
        if let Some(delegate) = delegate {
            delegate.did_change(state);
        }
    }

    fn set(&self, state: State) {
        let changed = self.lock().replace(state);
        self.notify(changed);
    }

    /// Handle one delivery from the source.
    fn apply(&self, result: Result<Frame>) {
        let changed = {
            let mut inner = self.lock();
            match (inner.state, result) {
                // Stopped: whatever the source still had in flight is stale.
                (State::Idle, _) => None,
                // Only stop_streaming cancels, and it leaves Idle first.
                (_, Err(Error::Canceled)) => None,
                (_, Ok(frame)) => {
                    inner.latest_frame = Some(Arc::new(frame));
                    inner.replace(State::Streaming)
                }
                (_, Err(e)) => inner.replace(State::Error(LiveViewError::from(&e))),
            }
        };
        self.notify(changed);
    }
}

/// Live preview with connection state, backed by [`LiveViewStream`] by default.
pub struct LiveView<S: LiveViewSource = LiveViewStream> {
    shared: Arc<Shared>,
    source: Mutex<S>,
}

impl Default for LiveView<LiveViewStream> {
    fn default() -> Self {
        Self::new(LiveViewStream::default())
    }
}

impl<S: LiveViewSource> LiveView<S> {
    /// Wrap `source`, replacing any delegate it had.
    pub fn new(mut source: S) -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: State::Idle,
                latest_frame: None,
                session_id: None,
            }),
            delegate: Mutex::new(None),
        });
        let sink = shared.clone();
        source.set_delegate(Some(Box::new(move |result| sink.apply(result))));
        LiveView {
            shared,
            source: Mutex::new(source),
        }
    }

    /// Install the state delegate. Only a weak reference is kept.
    pub fn set_delegate<D: LiveViewDelegate + 'static>(&self, delegate: &Arc<D>) {
        let weak = Arc::downgrade(delegate);
        let weak: Weak<dyn LiveViewDelegate> = weak;
        *self.shared.delegate.lock().unwrap_or_else(|p| p.into_inner()) = Some(weak);
    }

    pub fn clear_delegate(&self) {
        *self.shared.delegate.lock().unwrap_or_else(|p| p.into_inner()) = None;
    }

    /// Session id sent with the next [`start_streaming`](Self::start_streaming).
    pub fn set_session_id(&self, session_id: Option<String>) {
        self.shared.lock().session_id = session_id;
    }

    pub fn session_id(&self) -> Option<String> {
        self.shared.lock().session_id.clone()
    }

    pub fn state(&self) -> State {
        self.shared.lock().state
    }

    /// The last frame received, kept across stops.
    pub fn latest_frame(&self) -> Option<Arc<Frame>> {
        self.shared.lock().latest_frame.clone()
    }

    /// Connect to `host`. Does nothing while connecting or streaming.
    pub fn start_streaming(&self, host: &str) {
        let (changed, session_id) = {
            let mut inner = self.shared.lock();
            match inner.state {
                State::Connecting | State::Streaming => return,
                State::Idle | State::Error(_) => {}
            }
            (inner.replace(State::Connecting), inner.session_id.clone())
        };
        self.shared.notify(changed);

        let started = {
            let mut source = self.source();
            match source.start(host, session_id.as_deref()) {
                // A decode error left a session running, or a concurrent
                // stop_streaming has not reached the source yet.
                Err(Error::AlreadyStarted) => {
                    debug!(host, "replacing the running live view session");
                    if let Err(e) = source.cancel() {
                        debug!(error = %e, "live view session ended before cancel");
                    }
                    source.start(host, session_id.as_deref())
                }
                started => started,
            }
        };
        if let Err(e) = started {
            warn!(host, error = %e, "live view failed to start");
            self.shared.set(State::Error(LiveViewError::from(&e)));
        }
    }

    /// Connect to the camera at its access-point address.
    pub fn start_streaming_default(&self) {
        self.start_streaming(DEFAULT_HOST);
    }

    /// Disconnect. Does nothing while idle or failed.
    pub fn stop_streaming(&self) {
        let changed = {
            let mut inner = self.shared.lock();
            match inner.state {
                State::Idle | State::Error(_) => return,
                State::Connecting | State::Streaming => inner.replace(State::Idle),
            }
        };
        self.shared.notify(changed);

        if let Err(e) = self.source().cancel() {
            debug!(error = %e, "live view source had no session to cancel");
        }
    }

    fn source(&self) -> MutexGuard<'_, S> {
        self.source.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl<S: LiveViewSource> Drop for LiveView<S> {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}
