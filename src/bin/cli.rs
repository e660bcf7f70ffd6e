// src/bin/cli.rs

//! Profile Crawler CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use profile_crawler::{
    error::{AppError, Result},
    models::{Config, OutputFormat, ProfileRequest, RawPage},
    pipeline::{self, EXIT_FATAL, ProfilePipeline, RunSummary},
    services::{HttpFetcher, Normalizer, ProfileParser},
    storage::{LocalStorage, RecordStorage},
};
use tokio_util::sync::CancellationToken;

/// Company profile extractor for ZoomInfo pages
#[derive(Parser, Debug)]
#[command(
    name = "profile-crawler",
    version,
    about = "Extracts normalized company records from ZoomInfo profile pages"
)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch and extract every profile in a URL list
    Crawl {
        /// Plain-text file with one profile URL per line
        #[arg(short, long)]
        input: PathBuf,

        /// Override `[output].directory`
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Override `[output].format` (json or csv)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Override `[crawler].concurrency_limit`
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Extract a saved profile page without touching the network
    Parse {
        /// Saved HTML file
        #[arg(long)]
        file: PathBuf,

        /// URL the page was saved from
        #[arg(long)]
        url: Option<String>,
    },

    /// List the failures recorded by the last crawl
    Failures {
        /// Print only the failed URLs, ready to feed back to `crawl --input`
        #[arg(long)]
        urls_only: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Initialize logging at the given default level.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = Config::load_or_default(&cli.config);
    let level = match (&loaded, cli.verbose) {
        (_, true) => "debug".to_string(),
        (Ok(config), false) => config.logging.level.clone(),
        (Err(_), false) => "info".to_string(),
    };
    init_logging(&level);

    let result = match loaded {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            log::error!("{e}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run(cli: Cli, mut config: Config) -> Result<u8> {
    if !cli.config.exists() {
        log::info!(
            "No config at {}, using defaults",
            cli.config.display()
        );
    }

    match cli.command {
        Command::Crawl {
            input,
            output_dir,
            format,
            concurrency,
        } => {
            if let Some(dir) = output_dir {
                config.output.directory = dir.to_string_lossy().into_owned();
            }
            if let Some(format) = format {
                config.output.format = format;
            }
            if let Some(limit) = concurrency {
                config.crawler.concurrency_limit = limit;
            }
            config.validate()?;
            crawl(&config, &input).await
        }

        Command::Parse { file, url } => {
            config.validate()?;
            parse(&config, &file, url).await
        }

        Command::Failures { urls_only } => failures(&config, urls_only).await,

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());
            config.validate()?;
            log::info!("✓ Config OK");
            Ok(pipeline::EXIT_OK)
        }
    }
}

async fn crawl(config: &Config, input: &Path) -> Result<u8> {
    let text = tokio::fs::read_to_string(input).await?;
    let requests = ProfileRequest::from_url_list(&text);
    if requests.is_empty() {
        return Err(AppError::validation(format!(
            "no profile URLs in {}",
            input.display()
        )));
    }
    log::info!("Loaded {} profile URL(s) from {}", requests.len(), input.display());

    let fetcher = HttpFetcher::new(&config.crawler)?;
    let pipeline = ProfilePipeline::new(fetcher, config)?;
    let storage = LocalStorage::from_config(&config.output);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, cancelling outstanding requests");
                cancel.cancel();
            }
        })
    };

    let results = pipeline
        .run(requests, config.crawler.concurrency_limit, &cancel)
        .await;
    interrupt.abort();
    let results = results?;

    storage.write_results(&results).await?;

    let summary = RunSummary::from_results(&results);
    summary.log();
    Ok(summary.exit_code())
}

async fn parse(config: &Config, file: &Path, url: Option<String>) -> Result<u8> {
    let html = tokio::fs::read_to_string(file).await?;
    let url = url.unwrap_or_else(|| format!("file://{}", file.display()));
    let page = RawPage::from_html(url, html);

    let parser = ProfileParser::new()?;
    let normalizer = Normalizer::from_config(&config.normalize);
    let result = pipeline::extract_page(&parser, &normalizer, &page);

    let json = match (result.record(), result.report_entry()) {
        (Some(record), _) => serde_json::to_string_pretty(record)?,
        (None, Some(entry)) => serde_json::to_string_pretty(&entry)?,
        (None, None) => String::new(),
    };
    println!("{json}");

    Ok(RunSummary::from_results(std::slice::from_ref(&result)).exit_code())
}

async fn failures(config: &Config, urls_only: bool) -> Result<u8> {
    let storage = LocalStorage::from_config(&config.output);
    let Some(report) = storage.load_errors().await? else {
        return Err(AppError::validation(format!(
            "no error report under {}",
            config.output.directory
        )));
    };

    if urls_only {
        for failure in &report.failures {
            println!("{}", failure.url);
        }
        return Ok(pipeline::EXIT_OK);
    }

    log::info!(
        "{} failure(s) in the run of {}",
        report.count,
        report.generated_at.to_rfc3339()
    );
    for failure in &report.failures {
        println!(
            "{}\t{}/{}\t{}",
            failure.url, failure.stage, failure.reason, failure.detail
        );
    }
    Ok(pipeline::EXIT_OK)
}
