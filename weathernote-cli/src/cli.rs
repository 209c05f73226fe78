use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, Select, Text};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::info;
use weathernote_core::{
    CommandError, OpenWeatherFetcher, RefreshInterval, RefreshOrchestrator, Settings, SlotId,
    UnitSystem, ViewMode, WeatherFetcher, render_outcome,
};

use crate::{
    host::{FileHost, TerminalStatus},
    watch,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weathernote", version, about = "Current weather for your notes")]
pub struct Cli {
    /// Settings file to use instead of the platform config location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set location, API key, units and refresh options interactively.
    Configure,

    /// Render a template against the current weather and print it.
    Show {
        /// Format number (1-4); defaults to 1.
        #[arg(long, conflicts_with_all = ["status", "template"])]
        format: Option<u8>,

        /// Render the status bar template.
        #[arg(long, conflicts_with = "template")]
        status: bool,

        /// Render an ad-hoc template, e.g. "%desc% %temp%°".
        #[arg(long)]
        template: Option<String>,
    },

    /// Replace every %weatherN% placeholder in a Markdown file.
    Replace { file: PathBuf },

    /// Insert a rendered format into a Markdown file.
    Insert {
        file: PathBuf,

        /// Format number (1-4).
        format: u8,

        /// 1-based line to insert at; appends when omitted.
        #[arg(long)]
        line: Option<usize>,
    },

    /// Pick a format (or replace-all) from a list of rendered previews.
    Pick {
        file: PathBuf,

        #[arg(long)]
        line: Option<usize>,
    },

    /// Refresh weather_current_N elements in a rendered HTML file.
    Preview { file: PathBuf },

    /// Keep the status line refreshed until Ctrl-C.
    Status,

    /// Fill placeholders in notes as they are created under a directory.
    Watch {
        dir: PathBuf,

        /// Poll interval in milliseconds.
        #[arg(long, default_value_t = 500)]
        poll_ms: u64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let Cli { config, command, .. } = self;
        let settings = match &config {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };

        match command {
            Command::Configure => {
                let settings = configure(settings)?;
                match &config {
                    Some(path) => settings.save_to(path)?,
                    None => settings.save()?,
                }
                println!("Settings saved.");
            }
            Command::Show { format, status, template } => {
                let template = match (template, status) {
                    (Some(template), _) => template,
                    (None, true) => settings.statusbar_format.clone(),
                    (None, false) => {
                        let slot = slot_from_number(format.unwrap_or(1))?;
                        let template = settings.format(slot);
                        if template.is_empty() {
                            return Err(anyhow!(CommandError::FormatUndefined(slot).notice()));
                        }
                        template.to_string()
                    }
                };

                let request = settings
                    .fetch_request()
                    .map_err(|e| anyhow!(e.notice()))?;
                let fetcher = OpenWeatherFetcher::with_defaults()?;
                let outcome = fetcher.fetch(&request).await;
                println!("{}", render_outcome(&outcome, &template));
            }
            Command::Replace { file } => {
                let orchestrator = orchestrator(settings, FileHost::new(file, ViewMode::Source))?;
                let count = orchestrator.replace_template_strings().await?;
                println!("Replaced {count} template string(s).");
            }
            Command::Insert { file, format, line } => {
                let slot = slot_from_number(format)?;
                let host = FileHost::new(file, ViewMode::Source).with_cursor_line(line);
                let orchestrator = orchestrator(settings, host)?;
                orchestrator.insert_format(slot).await?;
            }
            Command::Pick { file, line } => {
                let host = FileHost::new(file, ViewMode::Source).with_cursor_line(line);
                let orchestrator = orchestrator(settings, host)?;
                let picker = orchestrator.open_picker().await?;

                let labels: Vec<String> = picker
                    .entries
                    .iter()
                    .map(|entry| format!("{}  |  {}", entry.label, entry.detail.replace('\n', " ")))
                    .collect();
                let choice = Select::new("Select Weather Format or Action:", labels.clone())
                    .prompt()
                    .context("No selection made")?;
                let index = labels
                    .iter()
                    .position(|label| *label == choice)
                    .ok_or_else(|| anyhow!("Unknown selection"))?;

                orchestrator.choose(&picker, picker.entries[index].action)?;
            }
            Command::Preview { file } => {
                let orchestrator = orchestrator(settings, FileHost::new(file, ViewMode::Preview))?;
                let count = orchestrator.refresh_previews().await;
                println!("Updated {count} weather element(s).");
            }
            Command::Status => {
                let orchestrator = orchestrator(settings, FileHost::unfocused(ViewMode::Source))?;
                let shutdown = CancellationToken::new();
                let timer = tokio::spawn(orchestrator.run_timer(shutdown.clone()));

                tokio::signal::ctrl_c().await?;
                shutdown.cancel();
                timer.await?;
                println!();
            }
            Command::Watch { dir, poll_ms } => {
                let orchestrator = orchestrator(settings, FileHost::unfocused(ViewMode::Source))?;

                let shutdown = CancellationToken::new();
                let watcher = tokio::spawn(watch::run(
                    orchestrator,
                    dir,
                    Duration::from_millis(poll_ms),
                    shutdown.clone(),
                ));

                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        res?;
                        shutdown.cancel();
                        info!("stopping watcher");
                    }
                    res = watcher => return res?,
                }
            }
        }

        Ok(())
    }
}

fn orchestrator(settings: Settings, host: FileHost) -> Result<Arc<RefreshOrchestrator>> {
    let fetcher = OpenWeatherFetcher::with_defaults()?;
    Ok(Arc::new(RefreshOrchestrator::new(
        settings,
        Arc::new(fetcher),
        Arc::new(host),
        Arc::new(TerminalStatus::default()),
    )))
}

fn slot_from_number(number: u8) -> Result<SlotId> {
    SlotId::from_number(number).ok_or_else(|| anyhow!("Format number must be 1-4, got {number}"))
}

fn configure(mut settings: Settings) -> Result<Settings> {
    settings.location = Text::new("Location (city name):")
        .with_initial_value(&settings.location)
        .with_help_message("e.g. Edmonton, Zocca or London,GB")
        .prompt()?;

    let api_key = Password::new("OpenWeather API key (leave empty to keep current):")
        .without_confirmation()
        .prompt()?;
    if !api_key.trim().is_empty() {
        settings.api_key = api_key;
    }

    let units = UnitSystem::all().to_vec();
    let current = units.iter().position(|u| *u == settings.units).unwrap_or_default();
    settings.units = Select::new("Units:", units).with_starting_cursor(current).prompt()?;

    settings.statusbar_active = Confirm::new("Show weather in the status line?")
        .with_default(settings.statusbar_active)
        .prompt()?;

    let intervals = RefreshInterval::all().to_vec();
    let current = intervals
        .iter()
        .position(|i| *i == settings.update_frequency)
        .unwrap_or_default();
    settings.update_frequency = Select::new("Update frequency:", intervals)
        .with_starting_cursor(current)
        .prompt()?;

    settings.template_folder = Text::new("Template folder (never substituted):")
        .with_initial_value(&settings.template_folder)
        .prompt()?;

    for slot in SlotId::DOCUMENT {
        if Confirm::new(&format!("Edit weather string {slot}?")).with_default(false).prompt()? {
            let template = Text::new(&format!("{slot} template:"))
                .with_initial_value(settings.format(slot))
                .prompt()?;
            settings.set_format(slot, template.replace("\\n", "\n"));
        }
    }

    Ok(settings)
}
