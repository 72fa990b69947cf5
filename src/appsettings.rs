use std::{env, path::PathBuf};

use anyhow::Context;
use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct TelegramSettings {
    pub token: String,
}

#[derive(Deserialize, Debug)]
pub struct AssistantSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
}

#[derive(Deserialize, Debug, Default)]
pub struct StorageSettings {
    /// Snapshot file. Reminders are kept in memory only when unset.
    pub reminders_file: Option<PathBuf>,
}

#[derive(Deserialize, Debug)]
pub struct AppSettings {
    pub timezone: String,
    pub telegram: TelegramSettings,
    pub assistant: AssistantSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

impl AppSettings {
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("appsettings").required(true))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .set_override_option("telegram.token", env::var("TELEGRAM_BOT_TOKEN").ok())?
            .set_override_option("assistant.api_key", env::var("MISTRAL_API_KEY").ok())?
            .build()?;

        settings.try_deserialize()
    }

    pub fn timezone(&self) -> anyhow::Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|error| anyhow::anyhow!(error))
            .with_context(|| format!("Invalid timezone {:?}", self.timezone))
    }
}
