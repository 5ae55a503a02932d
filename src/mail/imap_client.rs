use log::{debug, info, warn};
use native_tls::{TlsConnector, TlsStream};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::domain::email::EmailId;
use crate::domain::range::DateRange;
use crate::error::{FetchError, Result};
use crate::mail::provider::{Credentials, Endpoint, Provider};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type ImapSession = imap::Session<TlsStream<TcpStream>>;

/// An open, read-only INBOX.
pub trait Mailbox {
    /// UIDs whose server-side date may fall in `range`, ascending.
    fn search(&mut self, range: &DateRange) -> Result<Vec<EmailId>>;

    /// Raw RFC 822 bytes of one message, `None` when the server returned no body.
    fn fetch_raw(&mut self, uid: EmailId) -> Result<Option<Vec<u8>>>;

    /// Log out. Further calls are no-ops.
    fn close(&mut self) -> Result<()>;
}

/// Opens authenticated mailbox sessions.
pub trait Connector: Send + Sync {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Mailbox>>;
}

pub struct ImapConnector {
    pub timeout: Duration,
}

impl Default for ImapConnector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ImapConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn open_tls(&self, endpoint: &Endpoint) -> Result<TlsStream<TcpStream>> {
        let addrs = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| FetchError::network(endpoint.to_string(), e))?;

        let mut last_err = None;
        let mut tcp = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(s) => {
                    tcp = Some(s);
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        let tcp = match (tcp, last_err) {
            (Some(s), _) => s,
            (None, Some(e)) => return Err(FetchError::network(endpoint.to_string(), e)),
            (None, None) => {
                return Err(FetchError::network(
                    endpoint.to_string(),
                    "host did not resolve to any address",
                ));
            }
        };
        tcp.set_read_timeout(Some(self.timeout))
            .and_then(|_| tcp.set_write_timeout(Some(self.timeout)))
            .map_err(|e| FetchError::network(endpoint.to_string(), e))?;

        let tls = TlsConnector::builder()
            .build()
            .map_err(|e| FetchError::network(endpoint.to_string(), e))?;
        tls.connect(endpoint.host.as_str(), tcp)
            .map_err(|e| FetchError::network(endpoint.to_string(), e))
    }
}

impl Connector for ImapConnector {
    fn connect(&self, credentials: &Credentials) -> Result<Box<dyn Mailbox>> {
        let provider = &credentials.provider;
        let endpoint = provider.endpoint();
        info!("connecting to {endpoint}");

        let stream = self.open_tls(&endpoint)?;
        let mut client = imap::Client::new(stream);
        client
            .read_greeting()
            .map_err(|e| FetchError::network(endpoint.to_string(), e))?;

        let mut session = client
            .login(&credentials.address, &credentials.secret)
            .map_err(|(e, _client)| login_error(e, provider, &endpoint))?;
        debug!("logged in as {}", credentials.address);

        // EXAMINE keeps the mailbox read-only so no \Seen flags change.
        if let Err(e) = session.examine("INBOX") {
            let _ = session.logout();
            return Err(FetchError::network(endpoint.to_string(), e));
        }

        Ok(Box::new(ImapMailbox {
            session: Some(session),
            endpoint,
        }))
    }
}

fn login_error(err: imap::Error, provider: &Provider, endpoint: &Endpoint) -> FetchError {
    match err {
        imap::Error::No(msg) | imap::Error::Bad(msg) => FetchError::auth(provider.name(), msg),
        other => FetchError::network(endpoint.to_string(), other),
    }
}

struct ImapMailbox {
    session: Option<ImapSession>,
    endpoint: Endpoint,
}

impl ImapMailbox {
    fn session(&mut self) -> Result<&mut ImapSession> {
        let endpoint = &self.endpoint;
        self.session
            .as_mut()
            .ok_or_else(|| FetchError::network(endpoint.to_string(), "session already closed"))
    }
}

impl Mailbox for ImapMailbox {
    fn search(&mut self, range: &DateRange) -> Result<Vec<EmailId>> {
        let criterion = range.imap_criterion();
        let endpoint = self.endpoint.to_string();
        debug!("UID SEARCH {criterion}");

        let mut uids: Vec<EmailId> = self
            .session()?
            .uid_search(&criterion)
            .map_err(|e| FetchError::network(endpoint, e))?
            .into_iter()
            .collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch_raw(&mut self, uid: EmailId) -> Result<Option<Vec<u8>>> {
        let endpoint = self.endpoint.to_string();
        let session = self.session()?;

        let fetches = session
            .uid_fetch(uid.to_string(), "BODY.PEEK[]")
            .map_err(|e| FetchError::network(endpoint.clone(), e))?;
        if let Some(raw) = fetches.iter().find_map(|f| f.body()) {
            return Ok(Some(raw.to_vec()));
        }

        // Some servers drop the literal on the first try; ask once more.
        let retry = session
            .uid_fetch(uid.to_string(), "BODY.PEEK[]")
            .map_err(|e| FetchError::network(endpoint, e))?;
        let raw = retry.iter().find_map(|f| f.body()).map(<[u8]>::to_vec);
        if raw.is_none() {
            warn!("UID {uid} missing body even after retry");
        }
        Ok(raw)
    }

    fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        debug!("logging out of {}", self.endpoint);
        session
            .logout()
            .map_err(|e| FetchError::network(self.endpoint.to_string(), e))
    }
}

impl Drop for ImapMailbox {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            let _ = session.logout();
        }
    }
}
