//! relctl - Entry Point
//!
//! Shows the release history of an installed application with the action
//! each release allows, and optionally runs an update check.

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use colored::Colorize;

use relctl::app::options::ControllerOptions;
use relctl::app::run::{run, Report, RunOptions};
use relctl::http::client::HttpClient;
use relctl::lifecycle::diff::DiffOutcome;
use relctl::lifecycle::preflight::PreflightSummary;
use relctl::lifecycle::ReleaseDecision;
use relctl::logs::{init_logging, LogOptions};
use relctl::storage::settings::Settings;
use relctl::utils::version_info;

use tracing::{error, info};

const DEFAULT_SETTINGS_FILE: &str = "relctl.json";

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Unable to print version: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let settings_file = cli_args
        .get("settings")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let settings = match load_settings(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{e:#}");
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let client = match build_client(&settings) {
        Ok(client) => client,
        Err(e) => {
            error!("{e:#}");
            return;
        }
    };

    let mut options = ControllerOptions::from(&settings);
    if let Some(page_size) = parse_arg::<u32>(&cli_args, "page-size") {
        options.page_size = page_size.max(1);
    }
    let run_options = RunOptions {
        page: parse_arg(&cli_args, "page").unwrap_or(0),
        check_updates: cli_args.contains_key("check-updates"),
        ..Default::default()
    };

    info!("Running relctl with options: {:?}", options);
    match run(Arc::new(client), options, run_options, await_shutdown_signal()).await {
        Ok(report) => print_report(&report),
        Err(e) => error!("Failed to run relctl: {}", e.display_message()),
    }
}

async fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    Settings::load(path)
        .await
        .with_context(|| format!("Unable to read settings file {}", path.display()))
}

fn build_client(settings: &Settings) -> anyhow::Result<HttpClient> {
    let token = settings
        .backend
        .auth_token
        .clone()
        .context("No session token configured")?;
    HttpClient::new(
        &settings.backend.base_url,
        token,
        Duration::from_secs(settings.backend.request_timeout_secs),
    )
    .with_context(|| format!("Unable to create HTTP client for {}", settings.backend.base_url))
}

fn parse_arg<T: std::str::FromStr>(cli_args: &HashMap<String, String>, key: &str) -> Option<T> {
    let value = cli_args.get(key)?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            error!("Ignoring invalid --{}={}", key, value);
            None
        }
    }
}

// ================================== OUTPUT ===================================== //

fn print_report(report: &Report) {
    let history = &report.history;
    if let Some(app) = &history.app {
        println!("{} ({})", app.name.bold(), app.slug);
    }
    if let Some(error) = &history.error_msg {
        println!("{}", error.red());
    }

    println!(
        "{:>8}  {:<20}  {:<18}  {:<18}  {:<10}  {}",
        "SEQUENCE".bold(),
        "VERSION".bold(),
        "STATUS".bold(),
        "ACTION".bold(),
        "PREFLIGHT".bold(),
        "CHANGES".bold()
    );
    for (release, decision) in history.releases.iter().zip(&report.decisions) {
        println!(
            "{:>8}  {:<20}  {:<18}  {:<18}  {:<10}  {}",
            release.sequence,
            release.display_label(),
            release.status.as_str(),
            action_cell(decision),
            preflight_cell(&decision.preflight),
            diff_cell(&decision.diff)
        );
        if let Some(download) = &decision.download {
            let message = format!("          {}", download.message);
            if download.failed {
                println!("{}", message.red());
            } else {
                println!("{}", message.dimmed());
            }
        }
    }

    println!(
        "{} of {} release(s), {} skipped",
        history.releases.len(),
        history.total_count,
        history.num_of_skipped_versions
    );

    let session = &report.session;
    if let Some(error) = &session.update_error {
        println!("{}", error.red());
    } else if !session.check_for_updates_msg.is_empty() {
        println!("{}", session.check_for_updates_msg.green());
    }
}

fn action_cell(decision: &ReleaseDecision) -> String {
    let label = decision.surface.label();
    if decision.surface.is_enabled() {
        label.cyan().to_string()
    } else {
        label.dimmed().to_string()
    }
}

fn preflight_cell(summary: &PreflightSummary) -> String {
    match summary {
        PreflightSummary::NotRun { skipped: true } => "skipped".dimmed().to_string(),
        PreflightSummary::NotRun { skipped: false } => String::new(),
        PreflightSummary::Evaluated(outcome) if outcome.failed => "fail".red().to_string(),
        PreflightSummary::Evaluated(outcome) => {
            let state = outcome.state.as_str();
            if state == "warn" {
                state.yellow().to_string()
            } else {
                state.green().to_string()
            }
        }
        PreflightSummary::Unreadable(_) => "unreadable".yellow().to_string(),
    }
}

fn diff_cell(diff: &DiffOutcome) -> String {
    match diff {
        DiffOutcome::NotComputed => String::new(),
        DiffOutcome::Error(_) => "unable to generate diff".red().to_string(),
        DiffOutcome::Empty => "no changes".dimmed().to_string(),
        DiffOutcome::Changed(stats) => format!(
            "{} file(s) {} {}",
            stats.files_changed,
            format!("+{}", stats.lines_added).green(),
            format!("-{}", stats.lines_removed).red()
        ),
        DiffOutcome::Unreadable(_) => "unreadable".yellow().to_string(),
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers");
                std::future::pending::<()>().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, shutting down...");
        }
    }
}
