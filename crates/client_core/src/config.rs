use std::{collections::HashMap, fs, path::Path, time::Duration};

use url::Url;

use crate::error::SettingsError;

pub const DEFAULT_COLLECTION_URL: &str = "https://jsonplaceholder.typicode.com/users";
pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";
/// The demo collection ships exactly ten seed users.
pub const DEFAULT_SEED_ID_CEILING: i64 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub collection_url: Url,
    pub notification_ttl: Duration,
    pub request_timeout: Duration,
    /// Ids above this are treated as never persisted remotely. `None` relies on
    /// the record origin flag alone.
    pub seed_id_ceiling: Option<i64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            collection_url: Url::parse(DEFAULT_COLLECTION_URL)
                .expect("default collection url is valid"),
            notification_ttl: Duration::from_secs(2),
            request_timeout: Duration::from_secs(10),
            seed_id_ceiling: Some(DEFAULT_SEED_ID_CEILING),
        }
    }
}

impl Settings {
    pub fn with_collection_url(mut self, raw: &str) -> Result<Self, SettingsError> {
        self.collection_url = parse_collection_url(raw)?;
        Ok(self)
    }
}

/// Defaults, then `client.toml` in the working directory, then the process environment.
pub fn load_settings() -> Result<Settings, SettingsError> {
    let file = Path::new(DEFAULT_SETTINGS_FILE);
    let file = file.exists().then_some(file);
    load_settings_from(file, |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Settings, SettingsError> {
    let mut settings = Settings::default();

    if let Some(path) = file {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file_cfg: HashMap<String, toml::Value> =
            toml::from_str(&raw).map_err(|source| SettingsError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        if let Some(v) = file_cfg.get("collection_url").and_then(toml::Value::as_str) {
            settings.collection_url = parse_collection_url(v)?;
        }
        if let Some(v) = file_cfg
            .get("notification_ttl_ms")
            .and_then(toml::Value::as_integer)
        {
            settings.notification_ttl = Duration::from_millis(v.max(0) as u64);
        }
        if let Some(v) = file_cfg
            .get("request_timeout_ms")
            .and_then(toml::Value::as_integer)
        {
            settings.request_timeout = Duration::from_millis(v.max(0) as u64);
        }
        match file_cfg.get("seed_id_ceiling") {
            Some(toml::Value::Integer(v)) => settings.seed_id_ceiling = Some(*v),
            Some(toml::Value::String(v)) if v.eq_ignore_ascii_case("none") => {
                settings.seed_id_ceiling = None;
            }
            _ => {}
        }
    }

    if let Some(v) = env("COLLECTION_URL") {
        settings.collection_url = parse_collection_url(&v)?;
    }
    if let Some(v) = env("APP__COLLECTION_URL") {
        settings.collection_url = parse_collection_url(&v)?;
    }

    if let Some(v) = env("APP__NOTIFICATION_TTL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.notification_ttl = Duration::from_millis(parsed);
        }
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout = Duration::from_millis(parsed);
        }
    }

    if let Some(v) = env("APP__SEED_ID_CEILING") {
        if v.eq_ignore_ascii_case("none") {
            settings.seed_id_ceiling = None;
        } else if let Ok(parsed) = v.parse::<i64>() {
            settings.seed_id_ceiling = Some(parsed);
        }
    }

    Ok(settings)
}

fn parse_collection_url(raw: &str) -> Result<Url, SettingsError> {
    let trimmed = raw.trim().trim_end_matches('/');
    Url::parse(trimmed).map_err(|source| SettingsError::CollectionUrl {
        value: raw.to_string(),
        source,
    })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
