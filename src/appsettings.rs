use std::sync::OnceLock;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct TelegramSettings {
    pub token: String,
}

#[derive(Deserialize, Debug)]
pub struct DeliverySettings {
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_fallback_message() -> String {
    "Today's story could not be prepared. A fresh one arrives tomorrow!".to_owned()
}

#[derive(Deserialize, Debug)]
pub struct AppSettings {
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub delivery: DeliverySettings,
}

impl AppSettings {
    fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name("appsettings").required(true))
            .add_source(File::with_name("appsettings.local").required(false))
            .add_source(Environment::with_prefix("APP"))
            .build()?;

        settings.try_deserialize()
    }
}

pub fn get() -> anyhow::Result<&'static AppSettings> {
    static APPSETTINGS: OnceLock<AppSettings> = OnceLock::new();
    match APPSETTINGS.get() {
        Some(settings) => Ok(settings),
        None => {
            let settings = AppSettings::new()?;
            Ok(APPSETTINGS.get_or_init(|| settings))
        }
    }
}
