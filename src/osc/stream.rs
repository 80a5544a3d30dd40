use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use futures::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::mjpeg::FrameExtractor;
use crate::osc::command::{self, MAX_ERROR_BODY};
use crate::stream::{FrameCallback, LiveViewSource};
use crate::types::StreamConfig;

type SharedDelegate = Arc<Mutex<Option<FrameCallback>>>;

/// Live preview stream over the Open Spherical Camera HTTP API.
///
/// Each session runs on its own thread with a single-threaded tokio
/// runtime, so delegate calls for a session are serialized. The stream is
/// usable from synchronous code; no runtime is required by the caller.
pub struct LiveViewStream {
    config: StreamConfig,
    delegate: SharedDelegate,
    session: Option<Session>,
    /// Worker of a session cancelled from its own delegate, not yet joined.
    draining: Option<JoinHandle<()>>,
    /// Generation of the newest session; older workers' deliveries are dropped.
    generation: Arc<AtomicU64>,
}

struct Session {
    token: CancellationToken,
    /// Set by the worker just before its final delivery.
    done: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl Session {
    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire) || self.worker.is_finished()
    }

    /// Wait for the worker. On the worker itself, hand its handle back.
    fn join(self) -> Option<JoinHandle<()>> {
        join_worker(self.worker)
    }
}

fn join_worker(worker: JoinHandle<()>) -> Option<JoinHandle<()>> {
    if worker.thread().id() == thread::current().id() {
        return Some(worker);
    }
    if worker.join().is_err() {
        error!("live preview worker panicked");
    }
    None
}

impl Default for LiveViewStream {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

impl LiveViewStream {
    pub fn new(config: StreamConfig) -> Self {
        LiveViewStream {
            config,
            delegate: Arc::new(Mutex::new(None)),
            session: None,
            draining: None,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Replace the configuration used by subsequent sessions.
    pub fn set_config(&mut self, config: StreamConfig) {
        self.config = config;
    }

    fn reap_finished(&mut self) {
        if self.session.as_ref().is_some_and(Session::is_done) {
            if let Some(session) = self.session.take() {
                if let Some(worker) = session.join() {
                    self.draining = Some(worker);
                }
            }
        }
    }

    /// Wait for a worker left running by a self-cancel.
    fn drain(&mut self) {
        if let Some(worker) = self.draining.take() {
            // Called from that worker's own delegate: it exits once the
            // delegate returns, and generation keeps it quiet until then.
            if join_worker(worker).is_some() {
                debug!("previous live preview worker is the caller, not joining");
            }
        }
    }
}

impl LiveViewSource for LiveViewStream {
    fn set_delegate(&mut self, delegate: Option<FrameCallback>) {
        *lock(&self.delegate) = delegate;
    }

    fn start(&mut self, host: &str, session_id: Option<&str>) -> Result<()> {
        self.reap_finished();
        if self.session.is_some() {
            return Err(Error::AlreadyStarted);
        }

        let url = command::execute_url(host)?;
        self.drain();
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let token = CancellationToken::new();
        let done = Arc::new(AtomicBool::new(false));
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let worker = Worker {
            url,
            session_id: session_id.map(str::to_owned),
            config: self.config.clone(),
            delegate: self.delegate.clone(),
            token: token.clone(),
            done: done.clone(),
            generation,
            current: self.generation.clone(),
        };
        let handle = thread::Builder::new()
            .name("theta-live-view".into())
            .spawn(move || {
                let reason = runtime.block_on(worker.run());
                worker.finish(reason);
            })?;

        self.session = Some(Session {
            token,
            done,
            worker: handle,
        });
        Ok(())
    }

    fn cancel(&mut self) -> Result<()> {
        let session = self.session.take().ok_or(Error::NotStarted)?;
        session.token.cancel();
        // A delegate cancelling its own session returns without waiting;
        // the next start joins the worker instead.
        if let Some(worker) = session.join() {
            self.draining = Some(worker);
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_done())
    }
}

impl Drop for LiveViewStream {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _ = self.cancel();
        }
        self.drain();
    }
}

fn lock(delegate: &SharedDelegate) -> std::sync::MutexGuard<'_, Option<FrameCallback>> {
    delegate.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Worker {
    url: Url,
    session_id: Option<String>,
    config: StreamConfig,
    delegate: SharedDelegate,
    token: CancellationToken,
    done: Arc<AtomicBool>,
    generation: u64,
    current: Arc<AtomicU64>,
}

impl Worker {
    /// Run the session until something ends it and return why.
    async fn run(&self) -> Error {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Error::Canceled,
            reason = self.pump() => reason,
        }
    }

    fn finish(&self, reason: Error) {
        match &reason {
            Error::Canceled => info!(url = %self.url, "live preview canceled"),
            Error::StreamEnded => info!(url = %self.url, "live preview ended by camera"),
            Error::Status { .. } => warn!(url = %self.url, error = %reason, "live preview rejected"),
            _ => error!(url = %self.url, error = %reason, "live preview failed"),
        }
        self.done.store(true, Ordering::Release);
        self.deliver(Err(reason));
    }

    fn deliver(&self, result: Result<Frame>) {
        let mut delegate = lock(&self.delegate);
        if self.current.load(Ordering::Acquire) != self.generation {
            debug!(generation = self.generation, "session replaced, dropping delivery");
            return;
        }
        match delegate.as_mut() {
            Some(callback) => callback(result),
            None => debug!("no delegate installed, dropping delivery"),
        }
    }

    async fn pump(&self) -> Error {
        let client = match Client::builder()
            .connect_timeout(self.config.connect_timeout)
            .user_agent(self.config.user_agent.as_str())
            // Cameras sit on the local network.
            .no_proxy()
            .build()
        {
            Ok(client) => client,
            Err(e) => return e.into(),
        };

        let preview = command::live_preview(self.config.api_level, self.session_id.as_deref());
        info!(url = %self.url, ?preview, "starting live preview");

        let request = client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json;charset=utf-8")
            .header(ACCEPT, "multipart/x-mixed-replace")
            .json(&preview)
            .send();
        let response = match tokio::time::timeout(self.config.frame_timeout, request).await {
            Err(_) => return Error::Timeout(self.config.frame_timeout),
            Ok(Err(e)) => return e.into(),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        let mut body = std::pin::pin!(response.bytes_stream());

        if !status.is_success() {
            let mut document = Vec::new();
            while document.len() < MAX_ERROR_BODY {
                match tokio::time::timeout(self.config.frame_timeout, body.next()).await {
                    Ok(Some(Ok(chunk))) => document.extend_from_slice(&chunk),
                    _ => break,
                }
            }
            document.truncate(MAX_ERROR_BODY);
            return command::status_error(status.as_u16(), &document);
        }

        debug!(%status, "live preview connected");
        let started = Instant::now();
        let mut extractor = FrameExtractor::new(self.config.max_frame_bytes);
        let mut sequence = 0u64;

        loop {
            let chunk = match tokio::time::timeout(self.config.frame_timeout, body.next()).await {
                Err(_) => return Error::Timeout(self.config.frame_timeout),
                Ok(None) => return Error::StreamEnded,
                Ok(Some(Err(e))) => return e.into(),
                Ok(Some(Ok(chunk))) => chunk,
            };
            extractor.push(&chunk);

            loop {
                let jpeg = match extractor.next_frame() {
                    Ok(Some(jpeg)) => jpeg,
                    Ok(None) => break,
                    Err(e) => return e,
                };
                // A delegate may cancel mid-chunk; stop before the next delivery.
                if self.token.is_cancelled() {
                    return Error::Canceled;
                }
                let len = jpeg.len();
                match Frame::decode(sequence, started.elapsed(), jpeg) {
                    Ok(frame) => {
                        debug!(sequence, bytes = len, "frame");
                        self.deliver(Ok(frame));
                    }
                    Err(e) => {
                        warn!(sequence, bytes = len, error = %e, "undecodable frame");
                        self.deliver(Err(e));
                    }
                }
                sequence += 1;
            }
        }
    }
}
