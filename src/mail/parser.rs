use chrono::{DateTime, TimeZone, Utc};
use mailparse::{DispositionType, MailAddr, MailHeaderMap, ParsedMail};
use thiserror::Error;

use crate::domain::email::{EmailId, EmailRecord, Source};
use crate::mail::decoders::{decode_header_value, normalize_snippet};

pub const DEFAULT_PREVIEW_CHARS: usize = 200;

const UNKNOWN_SENDER: &str = "(unknown)";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed message")]
    Malformed(#[from] mailparse::MailParseError),
    #[error("message has no Date header")]
    MissingDate,
    #[error("cannot parse Date header {0:?}")]
    InvalidDate(String),
    #[error("server returned no body for UID {0}")]
    MissingBody(EmailId),
}

/// Turns raw RFC 822 bytes into an [`EmailRecord`].
#[derive(Debug, Clone, Copy)]
pub struct MessageParser {
    preview_chars: usize,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_CHARS)
    }
}

impl MessageParser {
    pub fn new(preview_chars: usize) -> Self {
        Self { preview_chars }
    }

    pub fn parse(&self, id: EmailId, raw: &[u8]) -> Result<EmailRecord, ParseError> {
        let parsed = mailparse::parse_mail(raw)?;
        let date = parse_date(&parsed)?;

        let subject = parsed
            .headers
            .get_first_header("Subject")
            .map(decode_header_value)
            .unwrap_or_default();

        let (sender, sender_name) = parse_sender(&parsed);

        let mut recipients = Vec::new();
        for key in ["To", "Cc"] {
            for header in parsed.headers.get_all_headers(key) {
                recipients.extend(parse_addresses(header));
            }
        }

        let body_preview = first_plain_text(&parsed)
            .map(|text| normalize_snippet(&text, self.preview_chars))
            .unwrap_or_default();

        Ok(EmailRecord {
            id,
            sender,
            sender_name,
            recipients,
            subject,
            date,
            body_preview,
            has_attachment: has_attachment(&parsed),
            source: Source::Real,
        })
    }
}

fn parse_date(parsed: &ParsedMail) -> Result<DateTime<Utc>, ParseError> {
    let raw = parsed
        .headers
        .get_first_value("Date")
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .ok_or(ParseError::MissingDate)?;

    if let Ok(date) = DateTime::parse_from_rfc2822(&raw) {
        return Ok(date.with_timezone(&Utc));
    }

    // Lenient forms (wrong weekday, missing seconds, obsolete zones).
    // dateparse yields 0 when it recognizes nothing.
    match mailparse::dateparse(&raw) {
        Ok(epoch) if epoch != 0 => Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or(ParseError::InvalidDate(raw)),
        _ => Err(ParseError::InvalidDate(raw)),
    }
}

/// Returns `(address, display name)` of the first `From` mailbox.
fn parse_sender(parsed: &ParsedMail) -> (String, String) {
    let Some(header) = parsed.headers.get_first_header("From") else {
        return (UNKNOWN_SENDER.to_string(), UNKNOWN_SENDER.to_string());
    };

    let first = mailparse::addrparse_header(header)
        .ok()
        .and_then(|list| {
            list.iter().find_map(|addr| match addr {
                MailAddr::Single(single) => Some(single.clone()),
                MailAddr::Group(group) => group.addrs.first().cloned(),
            })
        })
        .filter(|single| !single.addr.trim().is_empty());

    match first {
        Some(single) => {
            let addr = single.addr.trim().to_string();
            let name = single
                .display_name
                .map(|n| n.trim().trim_matches('"').trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| addr.clone());
            (addr, name)
        }
        None => {
            let raw = decode_header_value(header);
            if raw.is_empty() {
                (UNKNOWN_SENDER.to_string(), UNKNOWN_SENDER.to_string())
            } else {
                (raw.clone(), raw)
            }
        }
    }
}

fn parse_addresses(header: &mailparse::MailHeader) -> Vec<String> {
    let Ok(list) = mailparse::addrparse_header(header) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for addr in list.iter() {
        match addr {
            MailAddr::Single(single) => out.push(single.to_string()),
            MailAddr::Group(group) => out.extend(group.addrs.iter().map(|s| s.to_string())),
        }
    }
    out
}

fn is_attachment(p: &ParsedMail) -> bool {
    matches!(
        p.get_content_disposition().disposition,
        DispositionType::Attachment
    )
}

fn first_plain_text(p: &ParsedMail) -> Option<String> {
    if p.subparts.is_empty() {
        let mime = p.ctype.mimetype.to_ascii_lowercase();
        if mime == "text/plain" && !is_attachment(p) {
            return p.get_body().ok();
        }
        return None;
    }
    p.subparts.iter().find_map(first_plain_text)
}

/// Any leaf part that is marked as an attachment or is not text.
fn has_attachment(p: &ParsedMail) -> bool {
    if p.subparts.is_empty() {
        let mime = p.ctype.mimetype.to_ascii_lowercase();
        return is_attachment(p) || !mime.starts_with("text/");
    }
    p.subparts.iter().any(has_attachment)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &str = "From: \"Ada Lovelace\" <ada@example.com>\r\n\
        To: bob@example.com, Carol <carol@example.com>\r\n\
        Cc: dave@example.com\r\n\
        Subject: Engine notes\r\n\
        Date: Tue, 02 Jan 2024 10:30:00 +0200\r\n\
        \r\n\
        First line.\r\n\
        Second line.\r\n";

    #[test]
    fn parses_plain_message() {
        let rec = MessageParser::default().parse(7, PLAIN.as_bytes()).unwrap();
        assert_eq!(rec.id, 7);
        assert_eq!(rec.sender, "ada@example.com");
        assert_eq!(rec.sender_name, "Ada Lovelace");
        assert_eq!(rec.subject, "Engine notes");
        assert_eq!(rec.recipients.len(), 3);
        assert!(rec.recipients[1].contains("carol@example.com"));
        assert_eq!(rec.date, Utc.with_ymd_and_hms(2024, 1, 2, 8, 30, 0).unwrap());
        assert_eq!(rec.body_preview, "First line. Second line.");
        assert!(!rec.has_attachment);
        assert_eq!(rec.source, Source::Real);
    }

    #[test]
    fn decodes_encoded_subject_and_sender() {
        let raw = "From: =?UTF-8?Q?Ren=C3=A9?= <rene@example.fr>\r\n\
            Subject: =?UTF-8?B?UmFwcG9ydCBtZW5zdWVs?=\r\n\
            Date: Mon, 1 Jan 2024 09:00:00 +0000\r\n\
            \r\n\
            Bonjour\r\n";
        let rec = MessageParser::default().parse(1, raw.as_bytes()).unwrap();
        assert_eq!(rec.sender_name, "René");
        assert_eq!(rec.subject, "Rapport mensuel");
    }

    #[test]
    fn multipart_takes_first_plain_part_and_flags_attachment() {
        let raw = "From: ops@example.com\r\n\
            Subject: Invoice\r\n\
            Date: Mon, 1 Jan 2024 09:00:00 +0000\r\n\
            Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
            \r\n\
            --XYZ\r\n\
            Content-Type: text/html\r\n\
            \r\n\
            <p>html</p>\r\n\
            --XYZ\r\n\
            Content-Type: text/plain; charset=utf-8\r\n\
            \r\n\
            Please pay.\r\n\
            --XYZ\r\n\
            Content-Type: application/pdf\r\n\
            Content-Disposition: attachment; filename=\"invoice.pdf\"\r\n\
            Content-Transfer-Encoding: base64\r\n\
            \r\n\
            JVBERi0xLjQK\r\n\
            --XYZ--\r\n";
        let rec = MessageParser::default().parse(2, raw.as_bytes()).unwrap();
        assert_eq!(rec.body_preview, "Please pay.");
        assert!(rec.has_attachment);
    }

    #[test]
    fn no_plain_part_means_empty_preview() {
        let raw = "From: ops@example.com\r\n\
            Date: Mon, 1 Jan 2024 09:00:00 +0000\r\n\
            Content-Type: multipart/alternative; boundary=\"B\"\r\n\
            \r\n\
            --B\r\n\
            Content-Type: text/html\r\n\
            \r\n\
            <p>only html</p>\r\n\
            --B--\r\n";
        let rec = MessageParser::default().parse(3, raw.as_bytes()).unwrap();
        assert_eq!(rec.body_preview, "");
        assert!(!rec.has_attachment);
        assert_eq!(rec.subject, "");
    }

    #[test]
    fn preview_is_truncated() {
        let raw = format!(
            "From: a@example.com\r\nDate: Mon, 1 Jan 2024 09:00:00 +0000\r\n\r\n{}\r\n",
            "x".repeat(500)
        );
        let rec = MessageParser::new(50).parse(4, raw.as_bytes()).unwrap();
        assert_eq!(rec.body_preview, format!("{}...", "x".repeat(50)));
    }

    #[test]
    fn missing_or_bad_date_is_an_error() {
        let raw = "From: a@example.com\r\nSubject: hi\r\n\r\nbody\r\n";
        let err = MessageParser::default().parse(5, raw.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MissingDate));

        let raw = "From: a@example.com\r\nDate: not a date\r\n\r\nbody\r\n";
        let err = MessageParser::default().parse(6, raw.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDate(_)));
    }

    #[test]
    fn unreadable_dates_never_become_the_epoch() {
        for date in ["not a date", "sometime last week"] {
            let raw = format!("From: a@example.com\r\nDate: {date}\r\n\r\nbody\r\n");
            let err = MessageParser::default().parse(9, raw.as_bytes()).unwrap_err();
            assert!(matches!(err, ParseError::InvalidDate(ref d) if d == date), "{date}");
        }
    }

    #[test]
    fn lenient_dates_still_parse() {
        // Weekday does not match the date; strict RFC 2822 parsing rejects it.
        let raw = "From: a@example.com\r\nDate: Fri, 04 Mar 2024 09:15:00 +0000\r\n\r\nbody\r\n";
        let rec = MessageParser::default().parse(10, raw.as_bytes()).unwrap();
        assert_eq!(rec.date, Utc.with_ymd_and_hms(2024, 3, 4, 9, 15, 0).unwrap());
    }

    #[test]
    fn missing_from_is_unknown() {
        let raw = "Date: Mon, 1 Jan 2024 09:00:00 +0000\r\n\r\nbody\r\n";
        let rec = MessageParser::default().parse(8, raw.as_bytes()).unwrap();
        assert_eq!(rec.sender, "(unknown)");
    }
}
