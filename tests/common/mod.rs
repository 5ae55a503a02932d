#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rs_mail_filter::error::{FetchError, Result};
use rs_mail_filter::mail::imap_client::{Connector, Mailbox};
use rs_mail_filter::mail::provider::{Credentials, Provider};
use rs_mail_filter::source::CancelToken;
use rs_mail_filter::DateRange;

/// What the fake server saw.
#[derive(Default)]
pub struct Journal {
    pub connects: AtomicUsize,
    pub fetched: AtomicUsize,
    pub closed: AtomicBool,
}

/// In-memory INBOX keyed by UID.
#[derive(Clone, Default)]
pub struct FakeConnector {
    pub messages: Vec<(u32, Option<Vec<u8>>)>,
    pub reject_login: bool,
    pub unreachable: bool,
    /// Cancel this token once the given number of messages has been fetched.
    pub cancel_after: Option<(usize, CancelToken)>,
    pub journal: Arc<Journal>,
}

impl FakeConnector {
    pub fn with_messages(messages: Vec<(u32, Vec<u8>)>) -> Self {
        Self {
            messages: messages.into_iter().map(|(uid, m)| (uid, Some(m))).collect(),
            ..Self::default()
        }
    }
}

impl Connector for FakeConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Mailbox>> {
        self.journal.connects.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(FetchError::network(
                credentials.provider.endpoint().to_string(),
                "connection refused",
            ));
        }
        if self.reject_login {
            return Err(FetchError::auth(
                credentials.provider.name(),
                "[AUTHENTICATIONFAILED] Invalid credentials",
            ));
        }
        Ok(Box::new(FakeMailbox {
            messages: Mutex::new(self.messages.clone()),
            cancel_after: self.cancel_after.clone(),
            journal: self.journal.clone(),
        }))
    }
}

struct FakeMailbox {
    messages: Mutex<Vec<(u32, Option<Vec<u8>>)>>,
    cancel_after: Option<(usize, CancelToken)>,
    journal: Arc<Journal>,
}

impl Mailbox for FakeMailbox {
    fn search(&mut self, _range: &DateRange) -> Result<Vec<u32>> {
        let mut uids: Vec<u32> = self.messages.lock().unwrap().iter().map(|(u, _)| *u).collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch_raw(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let n = self.journal.fetched.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, token)) = &self.cancel_after
            && n >= *after
        {
            token.cancel();
        }
        Ok(self
            .messages
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| *u == uid)
            .and_then(|(_, m)| m.clone()))
    }

    fn close(&mut self) -> Result<()> {
        self.journal.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        provider: Provider::Custom {
            host: "imap.test.invalid".into(),
            port: 993,
        },
        address: "me@test.invalid".into(),
        secret: "hunter2".into(),
    }
}

pub fn message(from: &str, subject: &str, date: &str, body: &str) -> Vec<u8> {
    format!(
        "From: {from}\r\nTo: me@test.invalid\r\nSubject: {subject}\r\nDate: {date}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\r\n{body}\r\n"
    )
    .into_bytes()
}

/// Ten March 2024 messages; UIDs 3, 6 and 9 carry an unparseable date.
pub fn march_inbox() -> Vec<(u32, Vec<u8>)> {
    (1..=10)
        .map(|uid| {
            let date = if uid % 3 == 0 {
                "sometime last week".to_string()
            } else {
                format!("Fri, {:02} Mar 2024 09:15:00 +0000", uid)
            };
            let body = if uid == 4 {
                "The zanzibar shipment left the port this morning."
            } else {
                "Regular status update, nothing unusual."
            };
            let from = format!("Sender {uid} <sender{uid}@example.com>");
            (uid, message(&from, &format!("Report {uid}"), &date, body))
        })
        .collect()
}
