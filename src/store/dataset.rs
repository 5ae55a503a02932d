use log::debug;
use std::sync::{Arc, PoisonError, RwLock};

use crate::domain::email::{EmailRecord, FetchSession};
use crate::store::query::{QueryStats, QueryView};

#[derive(Default)]
struct Slot {
    generation: u64,
    session: Option<Arc<FetchSession>>,
}

/// Holds the current fetch session and answers queries against it.
///
/// `replace` is the only mutation. Queries take a snapshot of the session
/// pointer and evaluate outside the lock, so they always see one whole
/// session.
#[derive(Default)]
pub struct Dataset {
    slot: RwLock<Slot>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a new session, returning the previous one.
    pub fn replace(&self, session: impl Into<Arc<FetchSession>>) -> Option<Arc<FetchSession>> {
        let session = session.into();
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.generation += 1;
        debug!(
            "dataset generation {} holds {} records",
            slot.generation,
            session.len()
        );
        slot.session.replace(session)
    }

    /// Swap in `session` only if `publish` still returns true once the write
    /// lock is held. Returns whether the swap happened.
    pub fn replace_if(
        &self,
        session: impl Into<Arc<FetchSession>>,
        publish: impl FnOnce() -> bool,
    ) -> bool {
        let session = session.into();
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if !publish() {
            debug!("dataset generation {} kept", slot.generation);
            return false;
        }
        slot.generation += 1;
        debug!(
            "dataset generation {} holds {} records",
            slot.generation,
            session.len()
        );
        slot.session = Some(session);
        true
    }

    /// The current session, if a fetch has been published.
    pub fn snapshot(&self) -> Option<Arc<FetchSession>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .session
            .clone()
    }

    /// Bumped by every `replace`; results computed under an older
    /// generation are stale.
    pub fn generation(&self) -> u64 {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).generation
    }

    pub fn query(&self, view: &QueryView) -> Vec<EmailRecord> {
        match self.snapshot() {
            Some(session) => view.apply(&session.records),
            None => Vec::new(),
        }
    }

    pub fn stats(&self, view: &QueryView) -> QueryStats {
        match self.snapshot() {
            Some(session) => QueryStats::compute(&session.records, view),
            None => QueryStats::default(),
        }
    }

    /// Record count of the current session before any filtering.
    pub fn size(&self) -> usize {
        self.snapshot().map_or(0, |s| s.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::email::Source;
    use crate::domain::range::DateRange;
    use crate::store::query::{SortDirection, SortKey};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn session(n: u32) -> FetchSession {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut s = FetchSession::new(DateRange::new(day, day).unwrap(), "test");
        s.records = (1..=n)
            .map(|id| EmailRecord {
                id,
                sender: format!("s{id}@example.com"),
                sender_name: format!("S{id}"),
                recipients: vec![],
                subject: format!("subject {id}"),
                date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, id).unwrap(),
                body_preview: String::new(),
                has_attachment: false,
                source: Source::Demo,
            })
            .collect();
        s
    }

    #[test]
    fn empty_dataset_answers_empty() {
        let ds = Dataset::new();
        assert_eq!(ds.size(), 0);
        assert!(ds.query(&QueryView::new().search("x")).is_empty());
        assert_eq!(ds.stats(&QueryView::new()), QueryStats::default());
    }

    #[test]
    fn replace_swaps_whole_session() {
        let ds = Dataset::new();
        assert!(ds.replace(session(3)).is_none());
        assert_eq!(ds.size(), 3);

        let old = ds.replace(session(5)).unwrap();
        assert_eq!(old.len(), 3);
        assert_eq!(ds.size(), 5);
        assert_eq!(ds.generation(), 2);
    }

    #[test]
    fn replace_if_decides_under_the_write_lock() {
        let ds = Dataset::new();
        ds.replace(session(3));

        let swapped = ds.replace_if(session(5), || {
            assert!(ds.slot.try_read().is_err());
            false
        });
        assert!(!swapped);
        assert_eq!(ds.size(), 3);
        assert_eq!(ds.generation(), 1);

        assert!(ds.replace_if(session(5), || true));
        assert_eq!(ds.size(), 5);
        assert_eq!(ds.generation(), 2);
    }

    #[test]
    fn query_is_idempotent_and_non_mutating() {
        let ds = Dataset::new();
        ds.replace(session(10));
        let view = QueryView::new()
            .search("subject 1")
            .sort_by(SortKey::Date, SortDirection::Descending);

        let first = ds.query(&view);
        let second = ds.query(&view);
        assert_eq!(first, second);
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), vec![10, 1]);

        let snapshot = ds.snapshot().unwrap();
        assert_eq!(snapshot.records.first().map(|r| r.id), Some(1));
    }
}
