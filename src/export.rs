use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::domain::email::{EmailRecord, Source};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    /// Guess from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(anyhow!("unsupported export format {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    pub include_body: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { include_body: true }
    }
}

/// One exported row. Field order is the CSV column order.
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    id: u32,
    name: &'a str,
    email: &'a str,
    recipients: &'a [String],
    subject: &'a str,
    date: String,
    has_attachment: bool,
    source: Source,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

impl<'a> ExportRow<'a> {
    fn new(rec: &'a EmailRecord, opts: ExportOptions) -> Self {
        Self {
            id: rec.id,
            name: &rec.sender_name,
            email: &rec.sender,
            recipients: &rec.recipients,
            subject: &rec.subject,
            date: rec.date.format(DATE_FORMAT).to_string(),
            has_attachment: rec.has_attachment,
            source: rec.source,
            body: opts.include_body.then_some(rec.body_preview.as_str()),
        }
    }
}

pub fn write_json<W: Write>(records: &[EmailRecord], out: W, opts: ExportOptions) -> Result<()> {
    let rows: Vec<ExportRow> = records.iter().map(|r| ExportRow::new(r, opts)).collect();
    serde_json::to_writer_pretty(out, &rows)?;
    Ok(())
}

pub fn write_csv<W: Write>(records: &[EmailRecord], mut out: W, opts: ExportOptions) -> Result<()> {
    let mut header = vec![
        "id",
        "name",
        "email",
        "recipients",
        "subject",
        "date",
        "has_attachment",
        "source",
    ];
    if opts.include_body {
        header.push("body");
    }
    writeln!(out, "{}", header.join(","))?;

    for rec in records {
        let row = ExportRow::new(rec, opts);
        let mut fields = vec![
            row.id.to_string(),
            csv_field(row.name),
            csv_field(row.email),
            csv_field(&row.recipients.join("; ")),
            csv_field(row.subject),
            row.date,
            row.has_attachment.to_string(),
            row.source.to_string(),
        ];
        if let Some(body) = row.body {
            fields.push(csv_field(body));
        }
        writeln!(out, "{}", fields.join(","))?;
    }
    out.flush()?;
    Ok(())
}

/// Quote a field when it holds a separator, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Write `records` to `path`, returning how many were written.
pub fn export_to_path(
    records: &[EmailRecord],
    path: &Path,
    format: ExportFormat,
    opts: ExportOptions,
) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file '{}'", path.display()))?;
    let out = BufWriter::new(file);
    match format {
        ExportFormat::Csv => write_csv(records, out, opts),
        ExportFormat::Json => write_json(records, out, opts),
    }
    .with_context(|| format!("Failed to write '{}'", path.display()))?;
    Ok(records.len())
}
