use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:5000";
pub const DEFAULT_SETTINGS_FILE: &str = "vision.toml";
const DEFAULT_LOG_FILTER: &str = "info";
const ENV_PREFIX: &str = "VISION";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientSettings {
    pub api_base: String,
    pub download_dir: PathBuf,
    pub log_filter: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            download_dir: PathBuf::from("."),
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl ClientSettings {
    /// Defaults, then `path` if it exists, then `VISION__*` variables.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let builder = defaults()?
            .add_source(File::from(path).format(FileFormat::Toml).required(false))
            .add_source(environment());
        finish(builder).with_context(|| format!("failed to load settings from {}", path.display()))
    }

    /// Defaults overlaid with a TOML document; no environment lookup.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let builder = defaults()?.add_source(File::from_str(raw, FileFormat::Toml));
        finish(builder).context("failed to parse settings")
    }

    pub fn api_base_url(&self) -> Result<Url> {
        Url::parse(&self.api_base).with_context(|| format!("invalid api_base {:?}", self.api_base))
    }
}

fn defaults() -> Result<ConfigBuilder<config::builder::DefaultState>> {
    let fallback = ClientSettings::default();
    Ok(Config::builder()
        .set_default("api_base", fallback.api_base)?
        .set_default("download_dir", fallback.download_dir.display().to_string())?
        .set_default("log_filter", fallback.log_filter)?)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
}

fn finish(builder: ConfigBuilder<config::builder::DefaultState>) -> Result<ClientSettings> {
    Ok(builder.build()?.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = ClientSettings::from_toml_str("").expect("settings");
        assert_eq!(settings, ClientSettings::default());
        assert_eq!(
            settings.api_base_url().expect("url").as_str(),
            "http://127.0.0.1:5000/"
        );
    }

    #[test]
    fn document_overrides_individual_keys() {
        let settings = ClientSettings::from_toml_str(
            r#"
            api_base = "http://vision.local:8080/api/"
            log_filter = "client_core=debug"
            "#,
        )
        .expect("settings");

        assert_eq!(settings.api_base, "http://vision.local:8080/api/");
        assert_eq!(settings.log_filter, "client_core=debug");
        assert_eq!(settings.download_dir, PathBuf::from("."));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let settings =
            ClientSettings::load("/nonexistent/vision-settings.toml").expect("settings");
        assert!(!settings.api_base.is_empty());
    }

    #[test]
    fn invalid_api_base_is_reported() {
        let settings = ClientSettings {
            api_base: "not a url".into(),
            ..ClientSettings::default()
        };
        let err = settings.api_base_url().expect_err("must fail");
        assert!(err.to_string().contains("not a url"));
    }
}
