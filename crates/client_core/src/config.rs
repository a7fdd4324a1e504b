use std::{fs, path::Path};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use url::Url;

use crate::selection::DEFAULT_ALL_CARS_LIMIT;

pub const DEFAULT_SETTINGS_FILE: &str = "picker.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub service_url: String,
    pub api_key: Option<String>,
    pub rest_prefix: String,
    pub all_cars_limit: u32,
    pub brands_function: String,
    pub models_function: String,
    pub versions_function: String,
    pub cars_table: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_url: "http://127.0.0.1:54321".into(),
            api_key: None,
            rest_prefix: "/rest/v1".into(),
            all_cars_limit: DEFAULT_ALL_CARS_LIMIT,
            brands_function: "get_all_brands".into(),
            models_function: "get_cars_by_brand".into(),
            versions_function: "get_versions_by_brand_model".into(),
            cars_table: "cars".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    service_url: Option<String>,
    api_key: Option<String>,
    rest_prefix: Option<String>,
    all_cars_limit: Option<u32>,
    brands_function: Option<String>,
    models_function: Option<String>,
    versions_function: Option<String>,
    cars_table: Option<String>,
}

/// Defaults, then the TOML file at `path` if it exists, then environment.
pub fn load_settings(path: impl AsRef<Path>) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(path.as_ref()) {
        if let Ok(file_cfg) = toml::from_str::<FileSettings>(&raw) {
            apply_file(&mut settings, file_cfg);
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.service_url {
        settings.service_url = v;
    }
    if file_cfg.api_key.is_some() {
        settings.api_key = file_cfg.api_key;
    }
    if let Some(v) = file_cfg.rest_prefix {
        settings.rest_prefix = v;
    }
    if let Some(v) = file_cfg.all_cars_limit {
        settings.all_cars_limit = v;
    }
    if let Some(v) = file_cfg.brands_function {
        settings.brands_function = v;
    }
    if let Some(v) = file_cfg.models_function {
        settings.models_function = v;
    }
    if let Some(v) = file_cfg.versions_function {
        settings.versions_function = v;
    }
    if let Some(v) = file_cfg.cars_table {
        settings.cars_table = v;
    }
}

fn apply_env(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("QUERY_SERVICE_URL") {
        settings.service_url = v;
    }
    if let Some(v) = lookup("APP__SERVICE_URL") {
        settings.service_url = v;
    }

    if let Some(v) = lookup("QUERY_SERVICE_KEY") {
        settings.api_key = Some(v);
    }
    if let Some(v) = lookup("APP__API_KEY") {
        settings.api_key = Some(v);
    }

    if let Some(v) = lookup("APP__ALL_CARS_LIMIT") {
        if let Ok(parsed) = v.parse::<u32>() {
            settings.all_cars_limit = parsed;
        }
    }
}

/// Validates the service base URL and strips trailing slashes so endpoint
/// paths can be appended directly.
pub fn prepare_service_url(raw_service_url: &str) -> anyhow::Result<String> {
    let trimmed = raw_service_url.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("query service url is empty"));
    }

    let parsed = Url::parse(trimmed)
        .with_context(|| format!("invalid query service url '{trimmed}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(anyhow!(
            "query service url '{trimmed}' must use http or https"
        ));
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}

fn normalize_rest_prefix(raw_prefix: &str) -> String {
    let trimmed = raw_prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

impl Settings {
    pub fn prepared(mut self) -> anyhow::Result<Self> {
        self.service_url = prepare_service_url(&self.service_url)?;
        self.rest_prefix = normalize_rest_prefix(&self.rest_prefix);
        Ok(self)
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
