//! CLI application entry point and configuration.
//!
//! Loads the bridge configuration, installs the tracing subscriber and
//! dispatches the parsed subcommand on a tokio runtime.

use crate::commands::{Cli, Commands, OutputFormat, RunArgs};
use crate::error::{CliError, Result};
use apbridge_core::config::{LogFormat, LogLevel};
use apbridge_core::{BridgeConfig, SnapshotStore};
use apbridge_interpreter::enrichment::ItemInfoClient;
use apbridge_interpreter::{
    BridgeService, ChatSink, ChatUser, Command, CommandRouter, ConsoleSink, MessageCatalog,
    QueryHandlers, QuerySettings, WebhookSink,
};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const LEVELS: [LogLevel; 5] = [
    LogLevel::Error,
    LogLevel::Warn,
    LogLevel::Info,
    LogLevel::Debug,
    LogLevel::Trace,
];

/// Main CLI application.
#[derive(Debug)]
pub struct App {
    /// Effective bridge configuration.
    pub config: BridgeConfig,
    /// File the configuration was read from, if any.
    pub config_path: Option<PathBuf>,
    /// Parsed CLI arguments.
    pub cli: Cli,
}

impl App {
    /// Create a new application instance from command line arguments.
    pub fn new() -> Result<Self> {
        Self::from_cli(Cli::parse())
    }

    /// Create an application instance from already parsed arguments.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let (mut config, config_path) = Self::load_config(&cli)?;
        if let Some(state_file) = &cli.state_file {
            config.paths.state_file = state_file.clone();
        }
        Ok(Self {
            config,
            config_path,
            cli,
        })
    }

    /// Load configuration from `--config`, then the default location. Without
    /// either file the built-in defaults apply.
    fn load_config(cli: &Cli) -> Result<(BridgeConfig, Option<PathBuf>)> {
        if let Some(path) = &cli.config {
            if !path.exists() {
                return Err(CliError::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            return Ok((BridgeConfig::load(path)?, Some(path.clone())));
        }

        match BridgeConfig::default_path() {
            Ok(path) if path.exists() => Ok((BridgeConfig::load(&path)?, Some(path))),
            _ => Ok((BridgeConfig::default(), None)),
        }
    }

    /// Run the application.
    pub fn run(self) -> Result<()> {
        self.setup_logging();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Internal(e.to_string()))?;
        runtime.block_on(self.dispatch())
    }

    /// Set up logging from the configured level, raised by `-v` flags.
    /// `RUST_LOG` overrides both.
    fn setup_logging(&self) {
        let level = effective_level(self.config.logging.level, self.cli.verbose);
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);
        // Ignore errors if a subscriber is already installed.
        let _ = match self.config.logging.format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Text => builder.with_target(false).try_init(),
        };
    }

    async fn dispatch(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run(args) => self.handle_run(args).await,
            Commands::Progress(args) => {
                self.answer(Command::Progress, args.format, |q| to_json(&q.progress()))
                    .await
            }
            Commands::LastItems(args) => {
                let limit = args.limit.max(1);
                self.answer(Command::LastItem { limit }, args.format, |q| {
                    to_json(&q.unique_recent(limit))
                })
                .await
            }
            Commands::KeyItems(args) => {
                self.answer(Command::KeyItems, args.format, |q| {
                    to_json(&q.unique_notable_all())
                })
                .await
            }
            Commands::Rules(args) => {
                self.answer(Command::Rules, args.format, |q| to_json(&q.rules_digest()))
                    .await
            }
            Commands::Flags(args) => {
                self.answer(Command::Flags, args.format, |q| to_json(&q.flags_digest()))
                    .await
            }
            Commands::SeedInfo(args) => {
                self.answer(Command::SeedInfo, args.format, |q| to_json(&q.seed_info()))
                    .await
            }
            Commands::ItemInfo(args) => {
                let index = args.index.max(1);
                self.answer(Command::ItemInfo { index }, args.format, |q| {
                    to_json(&q.item_detail(index))
                })
                .await
            }
            Commands::Identity(args) => {
                self.answer(Command::Identity, args.format, |q| to_json(&q.identity()))
                    .await
            }
            Commands::Team(args) => {
                self.answer(Command::Team, args.format, |q| to_json(&q.identity()))
                    .await
            }
            Commands::Dump(args) => {
                self.print_reply(Command::ApRaw {
                    section: args.section.clone(),
                })
                .await
            }
            Commands::Status => self.print_reply(Command::ApStatus).await,
            Commands::Log(args) => {
                self.print_reply(Command::ApLog {
                    lines: args.lines.max(1),
                })
                .await
            }
            Commands::CheckConfig(args) => self.handle_check_config(args.format),
        }
    }

    async fn handle_run(&self, args: &RunArgs) -> Result<()> {
        let sink: Arc<dyn ChatSink> = match &args.webhook_url {
            Some(url) => Arc::new(WebhookSink::new(
                url.clone(),
                Duration::from_secs(args.webhook_timeout.max(1)),
            )?),
            None => Arc::new(ConsoleSink::new()),
        };

        let mut config = self.config.clone();
        if args.no_announce {
            config.bot.auto_announce_items = false;
        }
        let operator = ChatUser::broadcaster(
            args.operator
                .clone()
                .unwrap_or_else(|| self.operator_name()),
        );

        let mut service = BridgeService::new(config, sink);
        service.start().await?;
        info!(
            "bridge running on {} (commands from stdin as {})",
            self.config.paths.state_file.display(),
            operator.name
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("received Ctrl+C, shutting down");
                    break;
                }
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match service.handle_message(&operator, &line).await {
                            Ok(true) => {}
                            Ok(false) => debug!("ignoring non-command input: {}", line),
                            Err(err) => warn!("failed to answer {}: {}", line.trim(), err),
                        }
                    }
                    Ok(None) => {
                        debug!("stdin closed, running until interrupted");
                        stdin_open = false;
                    }
                    Err(err) => {
                        warn!("failed to read stdin: {}", err);
                        stdin_open = false;
                    }
                },
            }
        }

        service.stop().await?;
        Ok(())
    }

    /// Answer a query: chat text through the command router, or the raw
    /// query result as JSON.
    async fn answer<F>(&self, command: Command, format: OutputFormat, json: F) -> Result<()>
    where
        F: FnOnce(&QueryHandlers<'_>) -> Result<String>,
    {
        match format {
            OutputFormat::Text => self.print_reply(command).await,
            OutputFormat::Json => {
                let snapshot = self.store().load_async().await;
                let settings = QuerySettings::from_config(&self.config);
                let handlers = QueryHandlers::new(&snapshot, &settings);
                println!("{}", json(&handlers)?);
                Ok(())
            }
        }
    }

    async fn print_reply(&self, command: Command) -> Result<()> {
        let router = self.router();
        let operator = ChatUser::broadcaster(self.operator_name());
        println!("{}", router.execute(&operator, &command).await);
        Ok(())
    }

    fn handle_check_config(&self, format: OutputFormat) -> Result<()> {
        self.config.validate()?;
        match format {
            OutputFormat::Json => println!("{}", to_json(&self.config)?),
            OutputFormat::Text => {
                match &self.config_path {
                    Some(path) => println!("config file: {}", path.display()),
                    None => println!("config file: (built-in defaults)"),
                }
                println!("state file exists: {}", self.store().exists());
                let rendered = toml::to_string_pretty(&self.config)
                    .map_err(|e| CliError::Parse(e.to_string()))?;
                println!("{}", rendered.trim_end());
                println!("configuration OK");
            }
        }
        Ok(())
    }

    fn router(&self) -> CommandRouter {
        let config = Arc::new(self.config.clone());
        let catalog = Arc::new(MessageCatalog::open(
            config.paths.messages_file.as_deref(),
        ));
        let enrichment = Arc::new(ItemInfoClient::new(&config.enrichment));
        CommandRouter::new(config, catalog, enrichment)
    }

    fn store(&self) -> SnapshotStore {
        SnapshotStore::new(self.config.paths.state_file.clone())
    }

    fn operator_name(&self) -> String {
        let channel = self.config.bot.channel.trim();
        if channel.is_empty() {
            "operator".to_string()
        } else {
            channel.to_string()
        }
    }
}

/// Configured level raised by one step per `-v`.
fn effective_level(base: LogLevel, verbosity: u8) -> LogLevel {
    let start = LEVELS.iter().position(|l| *l == base).unwrap_or(2);
    let index = (start + verbosity as usize).min(LEVELS.len() - 1);
    LEVELS[index]
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| CliError::Parse(e.to_string()))
}

/// Run the CLI application.
pub fn run() -> Result<()> {
    let app = App::new()?;
    app.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_configured_level() {
        assert_eq!(effective_level(LogLevel::Warn, 0), LogLevel::Warn);
        assert_eq!(effective_level(LogLevel::Warn, 1), LogLevel::Info);
        assert_eq!(effective_level(LogLevel::Info, 9), LogLevel::Trace);
    }

    #[test]
    fn config_file_paths_resolve_and_state_file_flag_wins() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config_path = dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[paths]\nstate_file = \"data/state.json\"\n\n[bot]\nchannel = \"Jade\"\n",
        )
        .expect("write config");
        let config_arg = config_path.to_string_lossy().to_string();

        let cli = Cli::try_parse_from(["apbridge", "--config", config_arg.as_str(), "progress"])
            .expect("parse");
        let app = App::from_cli(cli).expect("load");
        assert_eq!(
            app.config.paths.state_file,
            dir.path().join("data/state.json")
        );
        assert_eq!(app.operator_name(), "Jade");

        let cli = Cli::try_parse_from([
            "apbridge",
            "--config",
            config_arg.as_str(),
            "--state-file",
            "/tmp/other.json",
            "status",
        ])
        .expect("parse");
        let app = App::from_cli(cli).expect("load");
        assert_eq!(app.config.paths.state_file, PathBuf::from("/tmp/other.json"));
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.toml");
        let missing = missing.to_string_lossy().to_string();
        let cli = Cli::try_parse_from(["apbridge", "--config", missing.as_str(), "status"])
            .expect("parse");
        assert!(matches!(App::from_cli(cli), Err(CliError::Config(_))));
    }
}
