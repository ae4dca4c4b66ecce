//! CLI entry point for `extract`.

use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand};
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use mailextract::config::Config;
use mailextract::model::attachment::Extraction;
use mailextract::source::local;
use mailextract::source::mailbox::{self, MailboxSettings, SessionGuard};

#[derive(Parser)]
#[command(
    name = "extract",
    version,
    about = "Extract attachments from EML files or an IMAP mailbox",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Message file to read (a directory when --dir is given)
    #[arg(value_name = "SOURCE")]
    source: Option<PathBuf>,

    /// Directory to save attachments into (created if missing)
    #[arg(value_name = "OUTDIR")]
    outdir: Option<PathBuf>,

    /// Treat SOURCE as a directory and process every .eml file under it
    #[arg(long = "dir")]
    is_dir: bool,

    /// Print a JSON report instead of human-readable lines
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Search an IMAP mailbox and extract attachments from matching messages
    Imap(ImapArgs),
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[derive(Args)]
struct ImapArgs {
    /// IMAP host (e.g. imap.gmail.com)
    #[arg(long)]
    host: Option<String>,

    /// IMAP port (implicit TLS)
    #[arg(long)]
    port: Option<u16>,

    /// Username / email
    #[arg(long)]
    user: Option<String>,

    /// Password or app-password
    #[arg(long, env = "MAILEXTRACT_PASSWORD", hide_env_values = true)]
    password: String,

    /// Mailbox/folder to search [default: INBOX]
    #[arg(long)]
    mailbox: Option<String>,

    /// IMAP search criteria, e.g. 'ALL', 'UNSEEN', 'SINCE 01-Feb-2025' [default: ALL]
    #[arg(long)]
    criteria: Option<String>,

    /// Leave fetched messages unread (BODY.PEEK[] instead of RFC822)
    #[arg(long)]
    peek: bool,

    /// Directory to save attachments into (created if missing)
    #[arg(value_name = "OUTDIR")]
    outdir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mailextract::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Imap(args)) => cmd_imap(args, cli.json, &config),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => {
            let (Some(source), Some(outdir)) = (cli.source, cli.outdir) else {
                anyhow::bail!("Usage: extract [--dir] <SOURCE> <OUTDIR>  (see --help)");
            };
            if cli.is_dir {
                cmd_dir(&source, &outdir, cli.json, &config)
            } else {
                cmd_file(&source, &outdir, cli.json)
            }
        }
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailextract::config::log_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "extract.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "extract", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Extract attachments from a single message file. A parse failure is fatal.
fn cmd_file(source: &Path, outdir: &Path, json: bool) -> anyhow::Result<()> {
    if !source.exists() {
        anyhow::bail!("Source not found: {}", source.display());
    }
    if source.is_dir() {
        anyhow::bail!(
            "{} is a directory; pass --dir to process every .eml file in it",
            source.display()
        );
    }
    std::fs::create_dir_all(outdir)?;

    let extraction = local::process_file(source, outdir)?;
    let summary = serde_json::json!({
        "attachments": extraction.saved.len(),
        "failed_attachments": extraction.failed.len(),
    });

    let mut reporter = Reporter::new(json, None);
    reporter.message(&source.display().to_string(), &Ok(extraction));
    reporter.finish(summary)
}

/// Extract attachments from every message file under a directory.
fn cmd_dir(source: &Path, outdir: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    if !source.is_dir() {
        anyhow::bail!("Not a directory: {}", source.display());
    }
    std::fs::create_dir_all(outdir)?;

    let files = local::find_message_files(source, &config.local.extensions)?;
    if files.is_empty() && !json {
        println!("No message files found under {}", source.display());
    }

    let mut reporter = Reporter::new(json, Some(progress_bar(files.len(), "Extracting")));
    let summary = local::process_files(&files, outdir, &mut |path, outcome| {
        reporter.message(&path.display().to_string(), outcome);
    });

    if !json {
        reporter.println(format!(
            "Extracted {} attachment(s) from {} file(s) to {}{}",
            summary.attachments,
            summary.files,
            outdir.display(),
            failure_suffix(summary.failed_files + summary.failed_attachments)
        ));
    }
    reporter.finish(serde_json::json!(summary))
}

/// Search a remote mailbox and extract attachments from each match.
fn cmd_imap(args: ImapArgs, json: bool, config: &Config) -> anyhow::Result<()> {
    let settings = MailboxSettings {
        host: args
            .host
            .or_else(|| config.imap.host.clone())
            .ok_or_else(|| anyhow::anyhow!("--host is required (or set imap.host in the config file)"))?,
        port: args.port.unwrap_or(config.imap.port),
        user: args
            .user
            .or_else(|| config.imap.user.clone())
            .ok_or_else(|| anyhow::anyhow!("--user is required (or set imap.user in the config file)"))?,
        password: args.password,
        mailbox: args.mailbox.unwrap_or_else(|| config.imap.mailbox.clone()),
        criteria: args.criteria.unwrap_or_else(|| config.imap.criteria.clone()),
        peek: args.peek || config.imap.peek,
    };
    std::fs::create_dir_all(&args.outdir)?;

    let mut session = SessionGuard::new(mailbox::connect(&settings)?);
    let ids = mailbox::search_messages(&mut *session, &settings.mailbox, &settings.criteria)?;
    if !json {
        println!(
            "Found {} message(s) matching '{}'",
            ids.len(),
            settings.criteria
        );
    }

    let mut reporter = Reporter::new(json, Some(progress_bar(ids.len(), "Fetching")));
    let summary = mailbox::extract_messages(&mut *session, &ids, &args.outdir, &mut |report| {
        let label = format!("[{}/{}] message {}", report.position, report.total, report.id);
        reporter.message(&label, report.outcome);
    });
    drop(session);

    if !json {
        reporter.println(format!(
            "Extracted {} attachment(s) from {} message(s) to {}{}",
            summary.attachments,
            summary.processed,
            args.outdir.display(),
            failure_suffix(summary.failed + summary.failed_attachments)
        ));
    }
    reporter.finish(serde_json::json!(summary))
}

fn failure_suffix(failures: usize) -> String {
    if failures == 0 {
        String::new()
    } else {
        format!(" ({failures} failure(s), see log)")
    }
}

fn progress_bar(total: usize, verb: &str) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} {verb} [{{bar:40.cyan/blue}}] {{pos}}/{{len}}"
            ))
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb
}

/// Console output for a run: human lines as each message completes, or one
/// JSON document at the end.
struct Reporter {
    json: bool,
    records: Vec<serde_json::Value>,
    progress: Option<ProgressBar>,
}

impl Reporter {
    fn new(json: bool, progress: Option<ProgressBar>) -> Self {
        Self {
            json,
            records: Vec::new(),
            progress,
        }
    }

    fn message(&mut self, label: &str, outcome: &mailextract::Result<Extraction>) {
        if let Some(pb) = &self.progress {
            pb.inc(1);
        }
        if self.json {
            self.records.push(json_record(label, outcome));
        } else {
            for line in human_lines(label, outcome) {
                self.println(line);
            }
        }
    }

    fn println(&self, line: String) {
        match &self.progress {
            Some(pb) => pb.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }

    fn finish(self, summary: serde_json::Value) -> anyhow::Result<()> {
        if let Some(pb) = &self.progress {
            pb.finish_and_clear();
        }
        if self.json {
            let output = serde_json::json!({
                "messages": self.records,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Ok(())
    }
}

fn human_lines(label: &str, outcome: &mailextract::Result<Extraction>) -> Vec<String> {
    let extraction = match outcome {
        Ok(extraction) => extraction,
        Err(e) => return vec![format!("Failed to process {label}: {e}")],
    };

    let mut lines = Vec::new();
    if extraction.is_empty() {
        lines.push(format!("No attachments found in {label}"));
        return lines;
    }

    if extraction.saved.is_empty() {
        lines.push(format!("No attachments saved from {label}:"));
    } else {
        lines.push(format!(
            "Saved {} attachment(s) from {label}:",
            extraction.saved.len()
        ));
    }
    for saved in &extraction.saved {
        lines.push(format!(
            "  - {} ({})",
            saved.path.display(),
            format_size(saved.size, BINARY)
        ));
    }
    for failed in &extraction.failed {
        lines.push(format!("  ! {}: {}", failed.filename, failed.error));
    }
    lines
}

fn json_record(label: &str, outcome: &mailextract::Result<Extraction>) -> serde_json::Value {
    match outcome {
        Ok(extraction) => serde_json::json!({
            "source": label,
            "saved": &extraction.saved,
            "failed": extraction
                .failed
                .iter()
                .map(|f| serde_json::json!({
                    "filename": f.filename,
                    "error": f.error.to_string(),
                }))
                .collect::<Vec<_>>(),
        }),
        Err(e) => serde_json::json!({
            "source": label,
            "error": e.to_string(),
        }),
    }
}
