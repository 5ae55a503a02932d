//! Fetch orchestration.
//!
//! [`fetch`] runs one fetch synchronously. [`FetchController`] runs it on a
//! worker thread, rejects overlapping requests and publishes the finished
//! session into a [`Dataset`].

use chrono::NaiveDate;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::domain::email::{FailureKind, FetchSession};
use crate::domain::range::DateRange;
use crate::error::{FetchError, Result};
use crate::mail::imap_client::{Connector, DEFAULT_TIMEOUT, ImapConnector};
use crate::mail::parser::{DEFAULT_PREVIEW_CHARS, MessageParser};
use crate::mail::provider::{Credentials, Provider};
use crate::source::{CancelToken, DemoSource, ImapSource, RecordSource};
use crate::store::dataset::Dataset;

#[derive(Debug, Clone)]
pub enum FetchMode {
    Demo { count: Option<usize> },
    Real(Credentials),
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub mode: FetchMode,
    pub preview_chars: usize,
    pub timeout: Duration,
}

impl FetchConfig {
    pub fn new(start: NaiveDate, end: NaiveDate, mode: FetchMode) -> Self {
        Self {
            start,
            end,
            mode,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn range(&self) -> Result<DateRange> {
        DateRange::new(self.start, self.end)
    }

    /// The data source for this configuration. This is the only place that
    /// distinguishes real and demo fetches.
    pub fn source(&self) -> Box<dyn RecordSource> {
        match &self.mode {
            FetchMode::Demo { count } => Box::new(DemoSource::new(*count, self.preview_chars)),
            FetchMode::Real(credentials) => Box::new(ImapSource::new(
                ImapConnector::new(self.timeout),
                credentials.clone(),
                MessageParser::new(self.preview_chars),
            )),
        }
    }

    /// Provider to blame in failure messages, if any.
    fn provider(&self) -> Option<&Provider> {
        match &self.mode {
            FetchMode::Real(c) => Some(&c.provider),
            FetchMode::Demo { .. } => None,
        }
    }
}

/// Run one fetch to completion on the calling thread.
///
/// Range errors and cancellation are returned as `Err`; authentication and
/// network problems come back as a session with a failure outcome.
pub fn fetch(config: &FetchConfig, cancel: &CancelToken) -> Result<FetchSession> {
    let range = config.range()?;
    let source = config.source();
    run_source(source.as_ref(), range, config.provider(), cancel)
}

/// Like [`fetch`], with an explicit source.
pub fn fetch_from(
    source: &dyn RecordSource,
    range: DateRange,
    cancel: &CancelToken,
) -> Result<FetchSession> {
    run_source(source, range, None, cancel)
}

fn run_source(
    source: &dyn RecordSource,
    range: DateRange,
    provider: Option<&Provider>,
    cancel: &CancelToken,
) -> Result<FetchSession> {
    info!("fetching {range} from {}", source.label());
    match source.produce_records(&range, cancel) {
        Ok(session) => {
            info!("fetch finished: {} with {} records", session.outcome, session.len());
            Ok(session)
        }
        Err(e @ FetchError::Auth { .. }) => {
            warn!("{e}");
            let reason = match provider {
                Some(p) => format!("{e}. {}", p.auth_hint()),
                None => e.to_string(),
            };
            Ok(FetchSession::failed(range, source.label(), FailureKind::Auth, reason))
        }
        Err(e @ FetchError::Network { .. }) => {
            warn!("{e}");
            Ok(FetchSession::failed(
                range,
                source.label(),
                FailureKind::Network,
                e.to_string(),
            ))
        }
        Err(e) => Err(e),
    }
}

/// Check that a login succeeds and INBOX opens, without fetching anything.
pub fn test_connection(connector: &dyn Connector, credentials: &Credentials) -> Result<()> {
    let mut mailbox = connector.connect(credentials)?;
    info!("connection to {} ok", credentials.provider);
    mailbox.close()
}

/// Clears the busy flag when the worker ends, however it ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs fetches off the calling thread, one at a time, against a dataset.
pub struct FetchController {
    dataset: Arc<Dataset>,
    busy: Arc<AtomicBool>,
}

impl FetchController {
    pub fn new(dataset: Arc<Dataset>) -> Self {
        Self {
            dataset,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Start a fetch for `config`.
    ///
    /// Fails synchronously with `Range` or `Busy`; nothing is spawned then.
    pub fn start(&self, config: FetchConfig) -> Result<FetchHandle> {
        let range = config.range()?;
        let provider = config.provider().cloned();
        self.spawn(range, config.source(), provider)
    }

    /// Start a fetch from an explicit source.
    pub fn start_with(&self, range: DateRange, source: Box<dyn RecordSource>) -> Result<FetchHandle> {
        self.spawn(range, source, None)
    }

    fn spawn(
        &self,
        range: DateRange,
        source: Box<dyn RecordSource>,
        provider: Option<Provider>,
    ) -> Result<FetchHandle> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(FetchError::Busy);
        }
        let guard = BusyGuard(self.busy.clone());

        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::channel();
        let dataset = self.dataset.clone();
        let worker_cancel = cancel.clone();

        let thread = thread::Builder::new()
            .name("fetch".into())
            .spawn(move || {
                let result = run_source(source.as_ref(), range, provider.as_ref(), &worker_cancel)
                    .and_then(|session| {
                        let session = Arc::new(session);
                        if session.outcome.is_failure() {
                            worker_cancel.check()?;
                            return Ok(session);
                        }
                        // A cancel that lands after the last message still
                        // discards the result, up to the moment of the swap.
                        if dataset.replace_if(session.clone(), || !worker_cancel.is_cancelled()) {
                            Ok(session)
                        } else {
                            Err(FetchError::Cancelled)
                        }
                    });
                drop(guard);
                let _ = tx.send(result);
            })
            .map_err(FetchError::Spawn)?;

        Ok(FetchHandle {
            rx,
            cancel,
            thread: Mutex::new(Some(thread)),
        })
    }
}

/// A fetch running on a worker thread.
pub struct FetchHandle {
    rx: Receiver<Result<Arc<FetchSession>>>,
    cancel: CancelToken,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl FetchHandle {
    /// Ask the worker to stop. It closes the mailbox and publishes nothing.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Non-blocking poll, for event loops.
    pub fn try_result(&self) -> Option<Result<Arc<FetchSession>>> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.join();
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(FetchError::Cancelled)),
        }
    }

    /// Block until the worker finishes.
    pub fn wait(self) -> Result<Arc<FetchSession>> {
        let result = self.rx.recv().unwrap_or(Err(FetchError::Cancelled));
        self.join();
        result
    }

    fn join(&self) {
        let handle = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            warn!("fetch worker panicked");
        }
    }
}
