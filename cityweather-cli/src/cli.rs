use std::{
    io::{self, IsTerminal, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    str::FromStr,
};

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use cityweather_core::{
    CityQuery, Config, OutputFormat, QueryMode, SessionOptions, WeatherError, client_from_config,
    config::API_KEY_ENV, lookup, render::render, run_session,
};
use inquire::{Password, PasswordDisplayMode, Select};
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Exit code used when the user interrupts with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "cityweather",
    version,
    about = "Current weather for a city name read from stdin"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub options: GlobalOptions,
}

#[derive(Debug, Args)]
pub struct GlobalOptions {
    /// Config file to use instead of the platform default.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Stop after the first city (`single`) or keep reading until end of input (`until-eof`).
    #[arg(long, value_parser = QueryMode::from_str, global = true)]
    pub mode: Option<QueryMode>,

    /// Output format: `text` or `json`.
    #[arg(long, value_parser = OutputFormat::from_str, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Per-request timeout in seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..), global = true)]
    pub timeout: Option<u64>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and default query mode.
    Configure,

    /// Show weather for a city given on the command line instead of stdin.
    Show {
        /// City name, e.g. "London" or "Paris, FR".
        city: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let Cli { command, options } = self;

        match command {
            Some(Command::Configure) => configure(options.config.as_deref()),
            Some(Command::Show { city }) => {
                let config = load_config(&options)?;
                show(&config, &city, options.format).await
            }
            None => {
                let config = load_config(&options)?;
                read_stdin(&config, options.format).await
            }
        }
    }
}

/// File (or defaults), then environment, then command-line flags.
fn load_config(options: &GlobalOptions) -> anyhow::Result<Config> {
    let mut config = match &options.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
            config
        }
        None => Config::load()?,
    };

    if let Some(mode) = options.mode {
        config.mode = mode;
    }
    if let Some(secs) = options.timeout {
        config.timeout_secs = secs;
    }

    debug!(mode = %config.mode, timeout_secs = config.timeout_secs, "configuration loaded");
    Ok(config)
}

fn configure(path: Option<&Path>) -> anyhow::Result<ExitCode> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => Config::config_file_path()?,
    };
    let mut config = Config::load_from(&path)?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key.trim().to_string());

    let modes = QueryMode::all().to_vec();
    let start = modes.iter().position(|m| *m == config.mode).unwrap_or(0);
    config.mode = Select::new("Default query mode:", modes)
        .with_starting_cursor(start)
        .prompt()
        .context("Failed to read query mode")?;

    config.save_to(&path)?;
    info!(path = %path.display(), "configuration saved");
    println!("Saved configuration to {}", path.display());

    Ok(ExitCode::SUCCESS)
}

async fn show(config: &Config, city: &str, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let client = client_from_config(config)?;
    let cancel = cancel_on_ctrl_c();

    match lookup(&client, &client, &CityQuery::new(city), &cancel).await {
        Ok(report) => {
            let rendered = render(&report, format).context("Failed to serialize weather report")?;
            let mut stdout = io::stdout();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
            Ok(ExitCode::SUCCESS)
        }
        Err(WeatherError::Cancelled) => Ok(ExitCode::from(EXIT_INTERRUPTED)),
        Err(e) => {
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn read_stdin(config: &Config, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let client = client_from_config(config)?;
    let cancel = cancel_on_ctrl_c();

    if io::stdin().is_terminal() {
        eprintln!("This is a simple weather app.");
        eprintln!("Enter city name to get the weather forecast.");
    }

    let options = SessionOptions {
        mode: config.mode,
        format,
    };
    let report = run_session(
        &client,
        &client,
        BufReader::new(tokio::io::stdin()),
        &mut io::stdout(),
        &mut io::stderr(),
        options,
        &cancel,
    )
    .await?;

    debug!(
        succeeded = report.succeeded,
        failed = report.failed,
        cancelled = report.cancelled,
        "session finished"
    );

    if report.cancelled {
        // The blocking stdin read can't be cancelled and would hold up runtime shutdown.
        std::process::exit(i32::from(EXIT_INTERRUPTED));
    }

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("interrupt received");
            trigger.cancel();
        }
    });
    cancel
}
