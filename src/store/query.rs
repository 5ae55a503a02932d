use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::domain::email::{EmailRecord, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    Date,
    Sender,
    Subject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Which fields free-text search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    #[default]
    All,
    Sender,
    Subject,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub key: SortKey,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    pub has_attachment: Option<bool>,
    pub source: Option<Source>,
}

impl FieldFilter {
    fn accepts(&self, rec: &EmailRecord) -> bool {
        self.has_attachment.is_none_or(|want| rec.has_attachment == want)
            && self.source.is_none_or(|want| rec.source == want)
    }
}

/// A read-only projection over a session's records.
///
/// Evaluation order: free-text search, field filters, then a stable sort.
/// Without a sort the delivery order is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryView {
    pub text: String,
    pub scope: SearchScope,
    pub filter: FieldFilter,
    pub sort: Option<Sort>,
}

impl QueryView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_attachment(mut self, has_attachment: bool) -> Self {
        self.filter.has_attachment = Some(has_attachment);
        self
    }

    pub fn source(mut self, source: Source) -> Self {
        self.filter.source = Some(source);
        self
    }

    pub fn sort_by(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort = Some(Sort { key, direction });
        self
    }

    pub fn matches(&self, rec: &EmailRecord) -> bool {
        self.matches_text(rec) && self.filter.accepts(rec)
    }

    fn matches_text(&self, rec: &EmailRecord) -> bool {
        let needle = self.text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let hit = |hay: &str| hay.to_lowercase().contains(&needle);
        match self.scope {
            SearchScope::Sender => hit(&rec.sender) || hit(&rec.sender_name),
            SearchScope::Subject => hit(&rec.subject),
            SearchScope::Body => hit(&rec.body_preview),
            SearchScope::All => {
                hit(&rec.sender) || hit(&rec.sender_name) || hit(&rec.subject) || hit(&rec.body_preview)
            }
        }
    }

    /// Evaluate against `records`, cloning the matches.
    pub fn apply(&self, records: &[EmailRecord]) -> Vec<EmailRecord> {
        let mut out: Vec<EmailRecord> = records.iter().filter(|r| self.matches(r)).cloned().collect();
        if let Some(sort) = self.sort {
            // `sort_by` is stable; descending flips the comparison, not the
            // result, so ties keep delivery order.
            out.sort_by(|a, b| {
                let ord = compare(sort.key, a, b);
                match sort.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }
        out
    }
}

fn compare(key: SortKey, a: &EmailRecord, b: &EmailRecord) -> Ordering {
    match key {
        SortKey::Date => a.date.cmp(&b.date),
        SortKey::Sender => a.sender_name.to_lowercase().cmp(&b.sender_name.to_lowercase()),
        SortKey::Subject => a.subject.to_lowercase().cmp(&b.subject.to_lowercase()),
    }
}

/// Counts shown next to a result list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QueryStats {
    pub total: usize,
    pub matched: usize,
    pub unique_senders: usize,
}

impl QueryStats {
    pub fn compute(records: &[EmailRecord], view: &QueryView) -> Self {
        let mut senders = HashSet::new();
        let mut matched = 0;
        for rec in records.iter().filter(|r| view.matches(r)) {
            matched += 1;
            senders.insert(rec.sender.to_lowercase());
        }
        Self {
            total: records.len(),
            matched,
            unique_senders: senders.len(),
        }
    }
}
