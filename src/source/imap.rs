use log::{debug, info, warn};

use crate::domain::email::{FetchOutcome, FetchSession};
use crate::domain::range::DateRange;
use crate::error::Result;
use crate::mail::imap_client::{Connector, ImapConnector, Mailbox};
use crate::mail::parser::{MessageParser, ParseError};
use crate::mail::provider::Credentials;
use crate::source::{CancelToken, RecordSource};

/// Fetches the INBOX of a real account.
pub struct ImapSource<C = ImapConnector> {
    connector: C,
    credentials: Credentials,
    parser: MessageParser,
}

impl<C: Connector> ImapSource<C> {
    pub fn new(connector: C, credentials: Credentials, parser: MessageParser) -> Self {
        Self {
            connector,
            credentials,
            parser,
        }
    }

    fn collect(
        &self,
        mailbox: &mut dyn Mailbox,
        range: &DateRange,
        cancel: &CancelToken,
    ) -> Result<FetchSession> {
        let uids = mailbox.search(range)?;
        info!("{} candidate messages for {range}", uids.len());

        let mut session = FetchSession::new(*range, self.label());
        let mut errors = 0;
        for uid in uids {
            cancel.check()?;

            let parsed = match mailbox.fetch_raw(uid)? {
                Some(raw) => self.parser.parse(uid, &raw),
                None => Err(ParseError::MissingBody(uid)),
            };
            match parsed {
                Ok(record) if range.contains(&record.date) => session.records.push(record),
                Ok(record) => debug!("UID {uid} dated {} is outside {range}", record.date),
                Err(e) => {
                    warn!("skipping UID {uid}: {e}");
                    errors += 1;
                }
            }
        }

        session.outcome = FetchOutcome::from_error_count(errors);
        Ok(session)
    }
}

impl<C: Connector> RecordSource for ImapSource<C> {
    fn label(&self) -> String {
        self.credentials.provider.to_string()
    }

    fn produce_records(&self, range: &DateRange, cancel: &CancelToken) -> Result<FetchSession> {
        cancel.check()?;
        let mut mailbox = self.connector.connect(&self.credentials)?;

        let result = self.collect(mailbox.as_mut(), range, cancel);
        if let Err(e) = mailbox.close() {
            warn!("error while closing mailbox: {e}");
        }
        result
    }
}
