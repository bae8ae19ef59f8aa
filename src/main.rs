use clap::Parser;
use std::path::PathBuf;
use std::process::{Command, ExitCode};
use tracing::error;

use gmail_attachments::config::{self, Config};
use gmail_attachments::log;
use gmail_attachments::{Extractor, FileSink, GmailClient};

/// Save attachments of one content type from Gmail messages matching a
/// search query, then mark the fully processed messages as read.
#[derive(Parser, Debug)]
#[command(name = "gmail-attachments", version)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/gmail-attachments/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Gmail search query, e.g. "is:unread from:bank@example.com"
    #[arg(short, long)]
    query: Option<String>,

    /// User to act as ("me" for the token's owner)
    #[arg(short, long)]
    user: Option<String>,

    /// Directory attachments are written to
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// MIME type of the parts to save
    #[arg(long, value_name = "TYPE")]
    content_type: Option<String>,

    /// Extension of the saved files (default: pdf)
    #[arg(long, value_name = "EXT")]
    extension: Option<String>,

    /// Leave processed messages unread
    #[arg(long)]
    no_mark_read: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

pub fn run_token_command(cmd: &str) -> Result<String, String> {
    let output = Command::new("sh")
        .arg("-c")
        .arg(cmd)
        .output()
        .map_err(|e| format!("failed to execute token command: {}", e))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!(
            "token command exited with {}: {}",
            output.status, stderr
        ));
    }

    let token = String::from_utf8(output.stdout)
        .map_err(|e| format!("token command output is not valid UTF-8: {}", e))?;
    let token = token.trim().to_string();
    if token.is_empty() {
        return Err("token command printed nothing".to_string());
    }
    Ok(token)
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(query) = &cli.query {
        config.fetch.query = Some(query.clone());
    }
    if let Some(user) = &cli.user {
        config.account.user_id = user.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.fetch.output_dir = dir.clone();
    }
    if let Some(content_type) = &cli.content_type {
        config.fetch.content_type = content_type.clone();
    }
    if let Some(extension) = &cli.extension {
        config.fetch.extension = extension.clone();
    }
    if cli.no_mark_read {
        config.fetch.mark_read = false;
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = Config::load(&config_path)
        .map_err(|e| format!("Error loading config from {}: {}", config_path.display(), e))?;
    apply_overrides(&mut config, &cli);

    let extract_config = config.extract_config().map_err(|e| e.to_string())?;

    std::fs::create_dir_all(&config.fetch.output_dir).map_err(|e| {
        format!(
            "failed to create output directory {}: {}",
            config.fetch.output_dir.display(),
            e
        )
    })?;

    let token = run_token_command(&config.account.token_command)?;
    let client = GmailClient::new(
        &config.account.api_base_url,
        &config.account.user_id,
        &token,
    );

    let extractor = Extractor::new(&client, extract_config);
    let mut sink = FileSink::new(&config.fetch.output_dir);

    let mut outcome = extractor
        .extract(&mut sink)
        .map_err(|e| format!("failed to list messages: {}", e))?;

    for attachment in &outcome.attachments {
        println!(
            "{}\t{}\t{}",
            sink.dir().join(&attachment.filename).display(),
            attachment.original_name,
            attachment.size
        );
    }

    let finalized = extractor.finalize(&outcome);
    let closed = outcome.attachments.close();

    if let Err(e) = finalized {
        error!("Failed to mark messages as read: {}", e);
        return Err(format!("failed to mark messages as read: {}", e));
    }
    closed.map_err(|e| format!("failed to close output files: {}", e))?;

    if !outcome.failed.is_empty() || !outcome.skipped.is_empty() {
        eprintln!(
            "{} message(s) failed and {} were skipped; they were left unread",
            outcome.failed.len(),
            outcome.skipped.len()
        );
    }

    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    log::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
