//! Record sources: where a fetch gets its messages from.
//!
//! The orchestrator picks one variant per fetch; everything downstream only
//! sees the resulting [`FetchSession`].

pub mod demo;
pub mod imap;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::email::FetchSession;
use crate::domain::range::DateRange;
use crate::error::{FetchError, Result};

pub use self::demo::DemoSource;
pub use self::imap::ImapSource;

pub trait RecordSource: Send + Sync {
    /// Label recorded as the session's provider.
    fn label(&self) -> String;

    /// Produce every record in `range`.
    ///
    /// Authentication and network problems are returned as errors; the
    /// orchestrator turns them into a failed session.
    fn produce_records(&self, range: &DateRange, cancel: &CancelToken) -> Result<FetchSession>;
}

/// Shared cancellation flag for one fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FetchError::Cancelled)
        } else {
            Ok(())
        }
    }
}
