use std::fmt;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::LoaderError;
use crate::reference::DEFAULT_GENE_SOURCE;
use crate::sources::INTERNAL_SOURCE_NAME;

pub const CONFIG_FILE_NAME: &str = "kb-loader.json";
pub const DEFAULT_GRAPHKB_URL: &str = "https://graphkb-api.bcgsc.ca/api";
pub const DEFAULT_ERROR_LOG_PREFIX: &str = "errors";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub graphkb: GraphKbSection,
    #[serde(default)]
    pub error_log_prefix: Option<String>,
    #[serde(default)]
    pub default_source: Option<String>,
    #[serde(default)]
    pub gene_source: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GraphKbSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub graphkb_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub error_log_prefix: Utf8PathBuf,
    pub default_source: String,
    pub gene_source: String,
}

impl ResolvedConfig {
    /// Login credentials, required only once a remote connection is opened.
    pub fn credentials(&self) -> Result<Credentials, LoaderError> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            (None, _) => Err(LoaderError::MissingCredentials(
                "set graphkb.username or GKB_USER".to_string(),
            )),
            (_, None) => Err(LoaderError::MissingCredentials(
                "set graphkb.password or GKB_PASS".to_string(),
            )),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, LoaderError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => Self::default_path().ok_or(LoaderError::MissingConfig)?,
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| LoaderError::ConfigRead(config_path.clone()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|err| LoaderError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    /// `kb-loader.json` in the working directory, else the per-user config file.
    fn default_path() -> Option<PathBuf> {
        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("kb-loader").join("config.json"))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, LoaderError> {
        Self::resolve_config_with_env(config, |key| std::env::var(key).ok())
    }

    /// Applies defaults and the `GKB_URL`/`GKB_USER`/`GKB_PASS` overrides, read through `env`.
    pub fn resolve_config_with_env<F>(config: Config, env: F) -> Result<ResolvedConfig, LoaderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(LoaderError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let graphkb_url = env("GKB_URL")
            .or(config.graphkb.url)
            .unwrap_or_else(|| DEFAULT_GRAPHKB_URL.to_string());
        if !graphkb_url.starts_with("http://") && !graphkb_url.starts_with("https://") {
            return Err(LoaderError::ConfigParse(format!(
                "GraphKB url must be http(s): {graphkb_url}"
            )));
        }

        Ok(ResolvedConfig {
            schema_version,
            graphkb_url,
            username: env("GKB_USER").or(config.graphkb.username),
            password: env("GKB_PASS").or(config.graphkb.password),
            error_log_prefix: Utf8PathBuf::from(
                config
                    .error_log_prefix
                    .unwrap_or_else(|| DEFAULT_ERROR_LOG_PREFIX.to_string()),
            ),
            default_source: config
                .default_source
                .map(|source| source.trim().to_lowercase())
                .unwrap_or_else(|| INTERNAL_SOURCE_NAME.to_string()),
            gene_source: config
                .gene_source
                .map(|source| source.trim().to_lowercase())
                .unwrap_or_else(|| DEFAULT_GENE_SOURCE.to_string()),
        })
    }
}
