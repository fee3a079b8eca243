//! CLI parsing and orchestration. Parses args, merges config, sets up logging and the
//! progress bar, runs the course build. Maps errors to exit codes.

use crate::assemble::{AssembleOptions, DEFAULT_AUTHOR, DEFAULT_LANGUAGE};
use crate::config;
use crate::course::{build_course, list_course, CourseError, CourseOptions};
use crate::logger;
use crate::scraper::{parse_url, resolve_url, DEFAULT_BASE_URL, DEFAULT_START_PATH};
use crate::PoliteClient;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

const DEFAULT_OUTPUT_DIR: &str = "ebooks";
const DEFAULT_DELAY_SECS: u64 = 0;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// CLI error carrying exit code and message.
#[derive(Debug, Error)]
pub enum CliRunError {
    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Course(#[from] CourseError),
}

impl CliRunError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliRunError::InvalidInput(_) => 1,
            CliRunError::Course(CourseError::RootFetch(_))
            | CliRunError::Course(CourseError::Structure(_)) => 2,
            CliRunError::Course(CourseError::OutputDir { .. }) => 3,
        }
    }
}

#[derive(Parser, Debug, Default)]
#[command(name = "coursebook")]
#[command(about = "Download the Hugging Face Agents Course and write one EPUB per unit")]
#[command(
    after_help = "Config file keys (output_dir, base_url, start_url, user_agent, request_delay_secs, timeout_secs, language, author) are read from ./coursebook.toml or the user config dir. CLI flags override config."
)]
pub struct Args {
    /// Directory for the EPUB files. Default: ./ebooks
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Page whose side menu lists the course. Default: {base-url}/learn/agents-course/unit0/introduction
    #[arg(long)]
    pub start_url: Option<String>,

    /// Site root for relative links. Default: https://huggingface.co
    #[arg(long)]
    pub base_url: Option<String>,

    /// HTTP User-Agent (overrides config).
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Delay between requests in seconds (overrides config; default 0).
    #[arg(long)]
    pub delay: Option<u64>,

    /// Request timeout in seconds (overrides config; default 30).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Fetch the course structure only and print each chapter with its output path.
    #[arg(long)]
    pub dry_run: bool,

    /// Hide the progress bar and log warnings only.
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug logging and the full error chain on failure.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Flags merged over the config file over built-in defaults.
#[derive(Debug)]
struct Settings {
    output_dir: PathBuf,
    base_url: Url,
    start_url: Url,
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
    language: String,
    author: String,
}

fn invalid_url(what: &str, e: impl std::fmt::Display) -> CliRunError {
    CliRunError::InvalidInput(format!("Invalid {}: {}", what, e))
}

fn resolve_settings(args: &Args, config: Option<&config::Config>) -> Result<Settings, CliRunError> {
    let base_str = args
        .base_url
        .clone()
        .or_else(|| config.and_then(|c| c.base_url.clone()))
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let base_url = parse_url(&base_str).map_err(|e| invalid_url("base URL", e))?;

    let start_url = match args
        .start_url
        .clone()
        .or_else(|| config.and_then(|c| c.start_url.clone()))
    {
        Some(s) => parse_url(&s).map_err(|e| invalid_url("start URL", e))?,
        None => resolve_url(&base_url, DEFAULT_START_PATH).map_err(|e| invalid_url("start URL", e))?,
    };

    Ok(Settings {
        output_dir: args
            .output_dir
            .clone()
            .or_else(|| config.and_then(|c| c.output_dir.clone()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        base_url,
        start_url,
        user_agent: args
            .user_agent
            .clone()
            .or_else(|| config.and_then(|c| c.user_agent.clone())),
        delay_secs: args
            .delay
            .or_else(|| config.and_then(|c| c.request_delay_secs))
            .unwrap_or(DEFAULT_DELAY_SECS),
        timeout_secs: args
            .timeout
            .or_else(|| config.and_then(|c| c.timeout_secs))
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
        language: config
            .and_then(|c| c.language.clone())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        author: config
            .and_then(|c| c.author.clone())
            .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
    })
}

fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner} {msg} [{bar:40}] {pos}/{len} ({elapsed})")
    {
        bar.set_style(
            style
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .progress_chars("█▉▊▋▌▍▎▏ "),
        );
    }
    bar
}

/// Entry point for the CLI. Returns Ok(()) on success; Err with exit code and message on failure.
pub fn run(args: &Args) -> Result<(), CliRunError> {
    let bar = progress_bar(args.quiet);
    logger::init(&bar, args.quiet, args.verbose);

    let config = config::load_config().map_err(CliRunError::InvalidInput)?;
    let settings = resolve_settings(args, config.as_ref())?;

    let mut builder = PoliteClient::builder()
        .delay_secs(settings.delay_secs)
        .timeout_secs(settings.timeout_secs);
    if let Some(ua) = settings.user_agent.clone() {
        builder = builder.user_agent(ua);
    }
    let mut client = builder
        .build()
        .map_err(|e| CliRunError::InvalidInput(format!("Failed to create HTTP client: {}", e)))?;

    if args.dry_run {
        let planned = list_course(&mut client, &settings.start_url, &settings.output_dir)?;
        for p in &planned {
            eprintln!(
                "{} ({} subchapters) -> {}",
                p.chapter.title,
                p.chapter.subchapters.len(),
                p.output.display()
            );
        }
        eprintln!("Chapters: {}", planned.len());
        return Ok(());
    }

    let on_chapter = |title: &str, total: u32| {
        bar.reset();
        bar.set_length(total as u64);
        bar.set_message(title.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
    };
    let progress_cb = |n: u32, _total: u32| bar.set_position(n as u64);
    let options = CourseOptions {
        start_url: &settings.start_url,
        output_dir: &settings.output_dir,
        assemble: AssembleOptions {
            base_url: &settings.base_url,
            language: &settings.language,
            author: &settings.author,
            progress: if args.quiet { None } else { Some(&progress_cb) },
        },
        on_chapter: if args.quiet { None } else { Some(&on_chapter) },
    };
    let result = build_course(&mut client, &options);
    bar.disable_steady_tick();
    bar.finish_and_clear();
    let summary = result?;

    info!(
        "Done: {} EPUB(s) written to {}, {} skipped, {} failed",
        summary.written.len(),
        settings.output_dir.display(),
        summary.skipped,
        summary.failed
    );
    Ok(())
}
