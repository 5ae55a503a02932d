use anyhow::{Result, anyhow, bail};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

use rs_mail_filter::auth::secret_store;
use rs_mail_filter::config::{Config, load_config, load_config_from};
use rs_mail_filter::export::{ExportFormat, ExportOptions, export_to_path};
use rs_mail_filter::fetch::test_connection;
use rs_mail_filter::mail::imap_client::ImapConnector;
use rs_mail_filter::mail::provider::{Credentials, Provider};
use rs_mail_filter::{
    Dataset, DateRange, EmailRecord, FetchConfig, FetchController, FetchMode, FetchOutcome,
    QueryView, SearchScope, SortDirection, SortKey,
};

#[derive(Parser)]
#[command(name = "rs_mail_filter")]
#[command(about = "Fetch a date range of email over IMAP, then search, sort and export it", long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch messages in a date range and print or export them
    Fetch(FetchArgs),

    /// Log in and open INBOX without fetching anything
    TestConnection(AccountArgs),

    /// Store the IMAP password for an address in the OS keyring
    SetPassword {
        #[arg(long)]
        address: String,

        /// Remove the stored password instead
        #[arg(long)]
        forget_password: bool,
    },

    /// List the built-in providers
    Providers,
}

#[derive(Args)]
struct AccountArgs {
    /// gmail, outlook or custom
    #[arg(long)]
    provider: Option<String>,

    #[arg(long)]
    address: Option<String>,

    /// IMAP host for a custom provider
    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args)]
struct FetchArgs {
    #[command(flatten)]
    account: AccountArgs,

    /// Use generated demo data instead of a mailbox
    #[arg(long)]
    demo: bool,

    /// Number of demo messages (default: a few dozen per day)
    #[arg(long)]
    demo_count: Option<usize>,

    /// First day, YYYY-MM-DD
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day, YYYY-MM-DD (default: today)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Fetch the last N days up to today; overrides --from/--to
    #[arg(long)]
    last_days: Option<u32>,

    /// Case-insensitive text to look for
    #[arg(long)]
    search: Option<String>,

    #[arg(long, value_enum, default_value_t = ScopeArg::All)]
    scope: ScopeArg,

    /// Only messages with attachments
    #[arg(long, conflicts_with = "no_attachments")]
    attachments: bool,

    /// Only messages without attachments
    #[arg(long)]
    no_attachments: bool,

    #[arg(long, value_enum)]
    sort: Option<SortArg>,

    /// Sort descending
    #[arg(long)]
    desc: bool,

    /// Print at most N rows
    #[arg(long)]
    limit: Option<usize>,

    /// Write the result to a file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Export format (default: from the file extension, else csv)
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Leave the body preview out of the export
    #[arg(long)]
    no_body: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    All,
    Sender,
    Subject,
    Body,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Date,
    Sender,
    Subject,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let cfg = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config().map_err(|e| anyhow!("Configuration error: {e}"))?,
    };

    match cli.cmd {
        Command::Fetch(args) => run_fetch(&cfg, args),

        Command::TestConnection(account) => {
            let credentials = credentials(&cfg, &account)?;
            let connector = ImapConnector::new(cfg.timeout());
            match test_connection(&connector, &credentials) {
                Ok(()) => {
                    println!("Connection to {} succeeded.", credentials.provider);
                    Ok(())
                }
                Err(e) => bail!("Connection test failed: {e}"),
            }
        }

        Command::SetPassword {
            address,
            forget_password,
        } => {
            if forget_password {
                secret_store::delete_password(&address)?;
                println!("Removed stored password for {address}");
                return Ok(());
            }
            let secret = prompt_secret(&address)?;
            secret_store::save_password(&address, &secret)?;
            println!("Saved password for {address} in keyring");
            Ok(())
        }

        Command::Providers => {
            for p in Provider::known() {
                println!("{p}");
            }
            println!("custom (--host <HOST> [--port <PORT>], port defaults to 993)");
            Ok(())
        }
    }
}

fn run_fetch(cfg: &Config, args: FetchArgs) -> Result<()> {
    let today = Local::now().date_naive();
    let (start, end) = match args.last_days {
        Some(days) => {
            let r = DateRange::last_days(today, days)?;
            (r.start(), r.end())
        }
        None => {
            let end = args.to.unwrap_or(today);
            let start = match args.from {
                Some(from) => from,
                None => DateRange::last_days(end, 7)?.start(),
            };
            (start, end)
        }
    };

    let mode = if args.demo || cfg.demo.unwrap_or(false) {
        FetchMode::Demo {
            count: args.demo_count.or(cfg.demo_count),
        }
    } else {
        FetchMode::Real(credentials(cfg, &args.account)?)
    };

    let mut fetch_config = FetchConfig::new(start, end, mode);
    fetch_config.preview_chars = cfg.preview_chars();
    fetch_config.timeout = cfg.timeout();

    let dataset = Arc::new(Dataset::new());
    let controller = FetchController::new(dataset.clone());
    let handle = controller.start(fetch_config)?;

    let cancel = handle.cancel_token();
    ctrlc::set_handler(move || {
        eprintln!("Cancelling fetch...");
        cancel.cancel();
    })?;

    eprintln!("Fetching emails from {start} to {end}...");
    let session = handle.wait()?;

    match &session.outcome {
        FetchOutcome::Success => eprintln!(
            "{}: {} emails from {}",
            session.outcome,
            session.len(),
            session.provider
        ),
        FetchOutcome::Partial { errors } => eprintln!(
            "WARNING {}: {} emails fetched, {errors} could not be read and were skipped",
            session.outcome,
            session.len()
        ),
        FetchOutcome::Failure { .. } => bail!("{}", session.outcome),
    }
    if session.is_empty() {
        eprintln!("No emails found for the selected date range.");
        return Ok(());
    }

    let view = query_view(&args);
    let results = dataset.query(&view);
    let stats = dataset.stats(&view);
    println!(
        "Total: {}  Matching: {}  Unique senders: {}",
        stats.total, stats.matched, stats.unique_senders
    );
    print_table(&results, args.limit);

    if let Some(path) = &args.export {
        let format = match args.format {
            Some(FormatArg::Csv) => ExportFormat::Csv,
            Some(FormatArg::Json) => ExportFormat::Json,
            None => ExportFormat::from_path(path).unwrap_or(ExportFormat::Csv),
        };
        let opts = ExportOptions {
            include_body: !args.no_body,
        };
        let n = export_to_path(&results, path, format, opts)?;
        eprintln!("Exported {n} emails to {}", path.display());
    }
    Ok(())
}

fn query_view(args: &FetchArgs) -> QueryView {
    let scope = match args.scope {
        ScopeArg::All => SearchScope::All,
        ScopeArg::Sender => SearchScope::Sender,
        ScopeArg::Subject => SearchScope::Subject,
        ScopeArg::Body => SearchScope::Body,
    };
    let mut view = QueryView::new()
        .search(args.search.clone().unwrap_or_default())
        .scope(scope);
    if args.attachments {
        view = view.with_attachment(true);
    } else if args.no_attachments {
        view = view.with_attachment(false);
    }

    let direction = if args.desc {
        SortDirection::Descending
    } else {
        SortDirection::Ascending
    };
    match args.sort {
        Some(SortArg::Date) => view.sort_by(SortKey::Date, direction),
        Some(SortArg::Sender) => view.sort_by(SortKey::Sender, direction),
        Some(SortArg::Subject) => view.sort_by(SortKey::Subject, direction),
        None if args.desc => view.sort_by(SortKey::Date, direction),
        None => view,
    }
}

fn credentials(cfg: &Config, account: &AccountArgs) -> Result<Credentials> {
    let provider = cfg.provider_with(
        account.provider.as_deref(),
        account.host.as_deref(),
        account.port,
    )?;

    let address = account
        .address
        .clone()
        .or_else(|| cfg.address.clone())
        .ok_or_else(|| anyhow!("an address is required when demo mode is off (--address)"))?;

    let secret = match secret_store::lookup_password(&address) {
        Ok(Some(s)) => s,
        Ok(None) => prompt_secret(&address)?,
        Err(e) => {
            log::warn!("keyring unavailable: {e}");
            prompt_secret(&address)?
        }
    };

    Ok(Credentials {
        provider,
        address,
        secret,
    })
}

fn prompt_secret(address: &str) -> Result<String> {
    eprintln!("Password (or app password) for {address}:");
    let mut secret = String::new();
    std::io::stdin().read_line(&mut secret)?;
    let secret = secret.trim().to_string();
    if secret.is_empty() {
        bail!("a password is required when demo mode is off");
    }
    Ok(secret)
}

fn print_table(records: &[EmailRecord], limit: Option<usize>) {
    let shown = limit.unwrap_or(records.len()).min(records.len());
    for rec in &records[..shown] {
        println!(
            "{}  {:<24}  {:<40}  {}  {}",
            rec.date.format("%Y-%m-%d %H:%M"),
            clip(&rec.sender_name, 24),
            clip(&rec.subject, 40),
            if rec.has_attachment { "@" } else { " " },
            clip(&rec.body_preview, 60),
        );
    }
    if shown < records.len() {
        println!("... {} more", records.len() - shown);
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
