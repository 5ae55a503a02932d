use chrono::{Datelike, Duration};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::email::{EmailRecord, FetchSession, Source};
use crate::domain::range::DateRange;
use crate::error::Result;
use crate::mail::decoders::normalize_snippet;
use crate::mail::parser::DEFAULT_PREVIEW_CHARS;
use crate::source::{CancelToken, RecordSource};

const DEMO_SEED: u64 = 12_345;
const DEMO_RECIPIENT: &str = "you@example.com";
const MESSAGES_PER_DAY: std::ops::RangeInclusive<usize> = 5..=30;

const SENDERS: &[(&str, &str)] = &[
    ("Himanshu", "himanshu@example.com"),
    ("Sakher", "sakher@company.com"),
    ("Mayank", "mayank@techcorp.com"),
    ("Sandhya", "sandhya@startup.io"),
    ("Vinod", "vinod@consulting.com"),
    ("Priya Nair", "priya.nair@acme.co"),
    ("Aviral", "aviral@supplychain.io"),
    ("Aisha Khan", "aisha.khan@fintech.app"),
    ("Nora", "nora@retailhub.com"),
    ("Lucky", "lucky@hardware.cn"),
    ("Shobhit", "shobhit@healthcare.org"),
    ("Chavi", "chavi@edutech.edu"),
];

const SUBJECTS: &[&str] = &[
    "Meeting Reminder",
    "Project Update",
    "Invoice Attached",
    "Release Notes",
    "Action Required",
    "Budget Approval",
    "Welcome Aboard",
    "Weekly Report",
    "Customer Feedback",
    "Outage Postmortem",
    "Contract Review",
    "Security Notice",
];

const SNIPPETS: &[&str] = &[
    "Please find the details in the attached document. Let me know if you have questions.",
    "We are on track against the current milestones and expect to hit the deadline.",
    "This is a reminder for the meeting scheduled tomorrow at 2 PM.",
    "The latest build includes performance improvements and bug fixes across modules.",
    "Kindly review and approve at your earliest convenience.",
    "Thanks for your prompt attention to this matter.",
    "Summarizing this week's progress and next steps for the team.",
    "Please review the notes and provide your feedback by EOD.",
    "We observed an increase in engagement week over week.",
    "Action items are listed at the end of this message.",
];

/// Synthetic mailbox for credential-free runs. Never touches the network.
#[derive(Debug, Clone, Copy)]
pub struct DemoSource {
    count: Option<usize>,
    preview_chars: usize,
}

impl Default for DemoSource {
    fn default() -> Self {
        Self::new(None, DEFAULT_PREVIEW_CHARS)
    }
}

impl DemoSource {
    /// `count: None` picks a per-day density like a busy inbox.
    pub fn new(count: Option<usize>, preview_chars: usize) -> Self {
        Self {
            count,
            preview_chars,
        }
    }
}

impl RecordSource for DemoSource {
    fn label(&self) -> String {
        "demo".to_string()
    }

    fn produce_records(&self, range: &DateRange, cancel: &CancelToken) -> Result<FetchSession> {
        cancel.check()?;
        let count = self.count.unwrap_or_else(|| default_count(range));
        let mut session = FetchSession::new(*range, self.label());
        session.records = generate_with_preview(range, count, self.preview_chars);
        debug!("generated {} demo records for {range}", session.records.len());
        Ok(session)
    }
}

fn rng_for(range: &DateRange) -> StdRng {
    let start = range.start().num_days_from_ce() as u64;
    let end = range.end().num_days_from_ce() as u64;
    StdRng::seed_from_u64(DEMO_SEED ^ (start << 32) ^ end)
}

/// Message count for `range` at the usual demo density.
pub fn default_count(range: &DateRange) -> usize {
    let mut rng = rng_for(range);
    (0..range.days())
        .map(|_| rng.gen_range(MESSAGES_PER_DAY))
        .sum()
}

/// Generate `count` records spread over `range`, newest first.
///
/// The same range and count always yield the same records.
pub fn generate(range: &DateRange, count: usize) -> Vec<EmailRecord> {
    generate_with_preview(range, count, DEFAULT_PREVIEW_CHARS)
}

fn generate_with_preview(range: &DateRange, count: usize, preview_chars: usize) -> Vec<EmailRecord> {
    // Offset the stream so it does not replay the density draws.
    let mut rng = rng_for(range);
    let _: u64 = rng.r#gen();

    let start = range.start_instant();
    let span = (range.end_instant() - start).num_seconds();

    let mut records: Vec<EmailRecord> = (0..count)
        .map(|_| {
            let date = start + Duration::seconds(rng.gen_range(0..=span));
            let (name, addr) = SENDERS[rng.gen_range(0..SENDERS.len())];
            let topic = SUBJECTS[rng.gen_range(0..SUBJECTS.len())];
            let body = (0..3)
                .map(|_| SNIPPETS[rng.gen_range(0..SNIPPETS.len())])
                .collect::<Vec<_>>()
                .join(" ");
            let has_attachment = topic.contains("Attached") || rng.gen_bool(0.1);

            EmailRecord {
                id: 0,
                sender: addr.to_string(),
                sender_name: name.to_string(),
                recipients: vec![DEMO_RECIPIENT.to_string()],
                subject: format!("{topic} - {}", date.format("%b %d, %Y")),
                date,
                body_preview: normalize_snippet(&body, preview_chars),
                has_attachment,
                source: Source::Demo,
            }
        })
        .collect();

    records.sort_by(|a, b| b.date.cmp(&a.date));
    for (i, rec) in records.iter_mut().enumerate() {
        rec.id = i as u32 + 1;
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::HashSet;

    fn range(start: (i32, u32, u32), end: (i32, u32, u32)) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn records_stay_inside_range() {
        for r in [range((2024, 1, 1), (2024, 1, 1)), range((2023, 11, 1), (2024, 2, 29))] {
            let records = generate(&r, 500);
            assert_eq!(records.len(), 500);
            assert!(records.iter().all(|rec| r.contains(&rec.date)));
        }
    }

    #[test]
    fn generation_is_repeatable() {
        let r = range((2024, 3, 1), (2024, 3, 10));
        assert_eq!(generate(&r, 50), generate(&r, 50));
        assert_eq!(default_count(&r), default_count(&r));
    }

    #[test]
    fn records_are_tagged_and_identified() {
        let r = range((2024, 3, 1), (2024, 3, 10));
        let records = generate(&r, 100);
        let ids: HashSet<_> = records.iter().map(|rec| rec.id).collect();
        assert_eq!(ids.len(), 100);
        assert!(records.iter().all(|rec| rec.source == Source::Demo));
        assert!(records.windows(2).all(|w| w[0].date >= w[1].date));
        assert!(records.iter().all(|rec| !rec.body_preview.is_empty()));
    }

    #[test]
    fn default_density_is_per_day() {
        let r = range((2024, 3, 1), (2024, 3, 10));
        let n = default_count(&r);
        assert!((50..=300).contains(&n));
    }

    #[test]
    fn source_always_succeeds() {
        let r = range((2024, 6, 1), (2024, 6, 1));
        let session = DemoSource::default()
            .produce_records(&r, &CancelToken::new())
            .unwrap();
        assert_eq!(session.outcome, crate::domain::email::FetchOutcome::Success);
        assert_eq!(session.provider, "demo");
        assert!(!session.is_empty());
    }
}
