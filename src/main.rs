use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use snapframe_lib::capture_socket::{SocketCommand, SocketReply};
use snapframe_lib::config::{self, LogLevel, Settings};
use snapframe_lib::history::ScreenshotRecord;
use snapframe_lib::style::{AspectRatio, FrameStyle};
use snapframe_lib::thumbnail::{self, THUMBNAIL_SIZE};
use snapframe_lib::{capture, AppError};

/// snapframe - keeps your last few screenshots around for framing.
#[derive(Parser)]
#[command(name = "snapframe")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Own the history and answer other invocations over the instance socket.
    Serve,

    /// Copy a screenshot into the history.
    Ingest {
        /// The screenshot file to copy.
        path: PathBuf,
    },

    /// Ingest the newest screenshot from the screenshot folder.
    ImportLatest {
        /// Folder to look in (default: configured or platform screenshot folder).
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },

    /// Show the retained screenshots, newest first.
    List {
        /// Print the records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Remove a screenshot from the history.
    Delete {
        /// Screenshot id.
        id: String,
    },

    /// Drop records whose files are gone and rewrite the index.
    Reconcile,

    /// Write a PNG thumbnail of a retained screenshot.
    Thumbnail {
        /// Screenshot id.
        id: String,

        /// Output PNG path.
        out: PathBuf,

        /// Longest edge in pixels.
        #[arg(short, long, default_value_t = THUMBNAIL_SIZE)]
        size: u32,
    },

    /// Show or change the saved log level.
    LogLevel {
        /// error, warn, info, debug or trace.
        #[arg(value_parser = parse_log_level)]
        level: Option<LogLevel>,
    },

    /// Show or change the saved frame style.
    Style {
        #[arg(long)]
        padding: Option<u32>,

        #[arg(long)]
        inset: Option<u32>,

        #[arg(long)]
        border_radius: Option<u32>,

        #[arg(long)]
        shadow: Option<u32>,

        /// CSS background, or the name of a stock gradient.
        #[arg(long)]
        background: Option<String>,

        /// `auto` or `W:H`.
        #[arg(long)]
        aspect_ratio: Option<AspectRatio>,

        #[arg(long)]
        watermark: Option<bool>,

        #[arg(long)]
        redact_emails: Option<bool>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    snapframe_lib::init_logging(config::load_log_level());

    let settings = match config::load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            error!(error = %e, "Failed to load settings");
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &settings) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands, settings: &Settings) -> Result<(), AppError> {
    match command {
        Commands::Serve => snapframe_lib::run_server(settings),
        Commands::Ingest { path } => {
            let reply = snapframe_lib::run_command(settings, SocketCommand::Ingest(path))?;
            print_saved(reply)
        }
        Commands::ImportLatest { dir } => {
            let folder = dir
                .or_else(|| settings.screenshot_dir.clone())
                .ok_or_else(|| AppError::Rejected("no screenshot folder configured".to_string()))?;
            let latest = capture::latest_screenshot(&folder).ok_or(AppError::NoScreenshot(folder))?;
            info!(source = %latest.display(), "Importing latest screenshot");
            let reply = snapframe_lib::run_command(settings, SocketCommand::Ingest(latest))?;
            print_saved(reply)
        }
        Commands::List { json } => {
            let records = expect_records(snapframe_lib::run_command(settings, SocketCommand::List)?)?;
            print_records(&records, json)
        }
        Commands::Delete { id } => {
            match snapframe_lib::run_command(settings, SocketCommand::Delete(id.clone()))? {
                SocketReply::Deleted { removed: true } => {
                    println!("Deleted {id}");
                    Ok(())
                }
                SocketReply::Deleted { removed: false } => {
                    Err(AppError::Rejected(format!("nothing deleted for {id}")))
                }
                other => Err(unexpected(other)),
            }
        }
        Commands::Reconcile => {
            let records = expect_records(snapframe_lib::run_command(settings, SocketCommand::Reconcile)?)?;
            println!("{} screenshot(s) retained", records.len());
            Ok(())
        }
        Commands::Thumbnail { id, out, size } => {
            let bytes = snapframe_lib::load_screenshot(settings, &id)?;
            let png = thumbnail::thumbnail_png(&bytes, size)?;
            fs::write(&out, png)?;
            println!("{}", out.display());
            Ok(())
        }
        Commands::LogLevel { level } => {
            match level {
                Some(level) if level != settings.log_level => {
                    config::save_log_level(level)?;
                    println!("{}", level.as_str());
                }
                _ => println!("{}", settings.log_level.as_str()),
            }
            Ok(())
        }
        Commands::Style {
            padding,
            inset,
            border_radius,
            shadow,
            background,
            aspect_ratio,
            watermark,
            redact_emails,
        } => {
            let current = settings.style.clone();
            let updated = FrameStyle {
                padding: padding.unwrap_or(current.padding),
                inset: inset.unwrap_or(current.inset),
                border_radius: border_radius.unwrap_or(current.border_radius),
                shadow: shadow.unwrap_or(current.shadow),
                background: background
                    .map(|b| FrameStyle::background_for(&b))
                    .unwrap_or(current.background.clone()),
                aspect_ratio: aspect_ratio.unwrap_or(current.aspect_ratio),
                show_watermark: watermark.unwrap_or(current.show_watermark),
                redact_emails: redact_emails.unwrap_or(current.redact_emails),
            }
            .clamped();

            if updated != current {
                config::save_style(&updated)?;
            }
            println!("{}", serde_json::to_string_pretty(&updated).map_err(config::ConfigError::from)?);
            Ok(())
        }
    }
}

fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    LogLevel::from_str(s).ok_or_else(|| format!("unknown log level {s:?}"))
}

fn print_saved(reply: SocketReply) -> Result<(), AppError> {
    match reply {
        SocketReply::Saved { record } => {
            println!("{}\t{}", record.id, record.path.display());
            Ok(())
        }
        other => Err(unexpected(other)),
    }
}

fn expect_records(reply: SocketReply) -> Result<Vec<ScreenshotRecord>, AppError> {
    match reply {
        SocketReply::Records { records } => Ok(records),
        other => Err(unexpected(other)),
    }
}

fn print_records(records: &[ScreenshotRecord], json: bool) -> Result<(), AppError> {
    if json {
        let body = serde_json::to_string_pretty(records).map_err(config::ConfigError::from)?;
        println!("{body}");
        return Ok(());
    }
    if records.is_empty() {
        println!("No screenshots retained");
    }
    for record in records {
        println!(
            "{}\t{}\t{}",
            record.id,
            record.timestamp.to_rfc3339(),
            record.original_path.display()
        );
    }
    Ok(())
}

fn unexpected(reply: SocketReply) -> AppError {
    match reply {
        SocketReply::Error { message } => AppError::Rejected(message),
        other => AppError::Rejected(format!("unexpected reply: {other:?}")),
    }
}
