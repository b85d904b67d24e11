use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use granny_core::{
    AdviceTone, Advisor, Config, LocationQuery, NotificationScheduler, ProviderId,
    TemperatureMemory, TemperatureUnit, UserSettings, WeatherProvider,
    provider::{UnconfiguredProvider, default_provider_from_config},
    schedule::ChannelSink,
    store::{FileSettingsStore, FileTemperatureMemory, SettingsStore},
};
use std::{path::PathBuf, sync::Arc};
use tracing::{info, warn};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "granny", version, about = "Weather advice from granny")]
pub struct Cli {
    /// Directory holding settings and yesterday's temperature.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "weatherapi" or "openweather".
        provider: String,
    },

    /// Fetch today's weather and print granny's advice.
    Advice {
        /// Use this place for this run instead of the configured location.
        #[arg(long)]
        location: Option<String>,
    },

    /// Show or change preferences.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show the stored "yesterday" temperature.
    Memory,

    /// Stay in the foreground and print the daily reminder when it fires.
    Notify,
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    Show,
    Set(SettingsArgs),
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[arg(long)]
    language: Option<String>,

    /// Reminder hour, 0-23.
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=23))]
    hour: Option<u32>,

    /// Reminder minute, 0-59.
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=59))]
    minute: Option<u32>,

    /// playful, concerned or caring.
    #[arg(long)]
    tone: Option<AdviceTone>,

    /// celsius or fahrenheit.
    #[arg(long)]
    unit: Option<TemperatureUnit>,

    /// Minimum change (°C) that replaces yesterday's temperature.
    #[arg(long)]
    threshold: Option<u32>,

    #[arg(long)]
    voice: Option<bool>,

    #[arg(long)]
    avatar: Option<String>,

    #[arg(long)]
    theme: Option<String>,

    /// Let the provider locate you.
    #[arg(long)]
    auto_location: Option<bool>,

    /// Fixed place name; turns automatic location off unless --auto-location is given.
    #[arg(long)]
    location: Option<String>,
}

impl SettingsArgs {
    fn apply(self, mut settings: UserSettings) -> UserSettings {
        if let Some(v) = self.language {
            settings.language = v;
        }
        if let Some(v) = self.hour {
            settings.notification_hour = v;
        }
        if let Some(v) = self.minute {
            settings.notification_minute = v;
        }
        if let Some(v) = self.tone {
            settings.advice_tone = v;
        }
        if let Some(v) = self.unit {
            settings.temperature_unit = v;
        }
        if let Some(v) = self.threshold {
            settings.threshold_delta = v;
        }
        if let Some(v) = self.voice {
            settings.voice_notifications = v;
        }
        if let Some(v) = self.avatar {
            settings.granny_avatar = v;
        }
        if let Some(v) = self.theme {
            settings.background_theme = v;
        }
        if let Some(v) = self.location {
            settings.manual_location = v;
            settings.automatic_location = false;
        }
        if let Some(v) = self.auto_location {
            settings.automatic_location = v;
        }
        settings
    }
}

struct Stores {
    settings: Arc<FileSettingsStore>,
    memory: Arc<FileTemperatureMemory>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let data_dir = match self.data_dir {
            Some(dir) => dir,
            None => Config::data_dir()?,
        };
        let stores = Stores {
            settings: Arc::new(FileSettingsStore::in_dir(&data_dir)),
            memory: Arc::new(FileTemperatureMemory::in_dir(&data_dir)),
        };

        match self.command {
            Command::Configure { provider } => configure(&provider)?,
            Command::Advice { location } => {
                let advisor = build_advisor(&stores)?;
                advisor.refresh_for(location.map(LocationQuery::Manual)).await;
                print!("{}", render::advice(&advisor.state()));
            }
            Command::Settings { action: SettingsAction::Show } => {
                print!("{}", render::settings(&stores.settings.load()));
            }
            Command::Settings { action: SettingsAction::Set(args) } => {
                let updated = args.apply(stores.settings.load());
                stores.settings.save(&updated).context("Failed to save settings")?;
                println!("Settings saved.");
                print!("{}", render::settings(&updated));
            }
            Command::Memory => {
                let unit = stores.settings.load().temperature_unit;
                println!("{}", render::memory(stores.memory.load(), unit));
            }
            Command::Notify => notify(&stores).await?,
        }

        Ok(())
    }
}

fn resolve_provider() -> Result<Box<dyn WeatherProvider>> {
    let config = Config::load()?.with_env_overrides()?;
    Ok(match default_provider_from_config(&config) {
        Ok(provider) => provider,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "no usable weather provider, granny will use mock data");
            Box::new(UnconfiguredProvider::new(format!("{err:#}")))
        }
    })
}

fn build_advisor(stores: &Stores) -> Result<Advisor> {
    Ok(Advisor::new(resolve_provider()?, stores.settings.clone(), stores.memory.clone()))
}

fn configure(provider: &str) -> Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    let api_key = inquire::Password::new(&format!("API key for {id}:"))
        .without_confirmation()
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .prompt()
        .context("Failed to read API key")?;

    config.upsert_provider_api_key(id, api_key.trim().to_string());

    if config.default_provider_id().ok() != Some(id) {
        let make_default = inquire::Confirm::new(&format!("Use {id} as the default provider?"))
            .with_default(true)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    config.save()?;
    println!("Saved credentials for {id} to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn notify(stores: &Stores) -> Result<()> {
    let advisor = build_advisor(stores)?;
    let (sink, mut fired) = ChannelSink::new();
    let scheduler = NotificationScheduler::new(Arc::new(sink));

    advisor.refresh().await;
    let delay = advisor.schedule_daily(&scheduler)?;
    print!("{}", render::advice(&advisor.state()));
    println!("{}", render::next_reminder(delay));

    loop {
        tokio::select! {
            Some(notification) = fired.recv() => {
                println!("{}", render::notification(&notification));
                // refresh so tomorrow's reminder carries tomorrow's advice
                advisor.refresh().await;
                let delay = advisor.schedule_daily(&scheduler)?;
                println!("{}", render::next_reminder(delay));
            }
            res = tokio::signal::ctrl_c() => {
                res.context("Failed to listen for Ctrl-C")?;
                info!("stopping reminders");
                break;
            }
        }
    }

    Ok(())
}
