//! Configuration loading from disk, environment and command line.

use std::fmt;
use std::path::{Path, PathBuf};

use clap::Args;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::config::schema::{Profile, Settings};

/// Base name of the configuration file.
pub const CONFIG_NAME: &str = "config";

/// Prefix of environment variables that override file values.
pub const ENV_PREFIX: &str = "MEMOS_";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no {CONFIG_NAME}.yaml, {CONFIG_NAME}.yml, {CONFIG_NAME}.json or {CONFIG_NAME}.toml found in {}", dir.display())]
    NotFound { dir: PathBuf },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<figment::Error>,
    },

    #[error("invalid instance-url {value:?} in {}: {reason}", path.display())]
    InvalidInstanceUrl {
        path: PathBuf,
        value: String,
        reason: String,
    },
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    /// Candidate extensions, in lookup order.
    const EXTENSIONS: [(&'static str, ConfigFormat); 4] = [
        ("yaml", ConfigFormat::Yaml),
        ("yml", ConfigFormat::Yaml),
        ("json", ConfigFormat::Json),
        ("toml", ConfigFormat::Toml),
    ];
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFormat::Yaml => f.write_str("yaml"),
            ConfigFormat::Json => f.write_str("json"),
            ConfigFormat::Toml => f.write_str("toml"),
        }
    }
}

/// Command-line overrides. Only flags that were passed take part in the merge.
#[derive(Debug, Clone, Default, Args, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Overrides {
    /// Server mode (prod/dev/demo)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    /// Server address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,

    /// Server port
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Data directory
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    /// Database driver
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,

    /// Database source name (DSN)
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,

    /// Instance URL
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_url: Option<String>,
}

/// A profile together with the file it was read from.
#[derive(Debug)]
pub struct Loaded {
    pub profile: Profile,
    pub path: PathBuf,
    pub format: ConfigFormat,
}

/// Builds a [`Profile`] from `config.<ext>` in a directory.
///
/// Precedence, highest first: overrides, `MEMOS_*` environment, file, defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    dir: PathBuf,
    env_prefix: Option<String>,
}

impl Loader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            env_prefix: Some(ENV_PREFIX.to_string()),
        }
    }

    /// Use a different environment prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Ignore the environment entirely.
    pub fn without_env(mut self) -> Self {
        self.env_prefix = None;
        self
    }

    /// Locate the configuration file in the loader directory.
    pub fn find(&self) -> Option<(PathBuf, ConfigFormat)> {
        find_config(&self.dir)
    }

    pub fn load(&self, overrides: &Overrides) -> Result<Loaded, ConfigError> {
        let (path, format) = self.find().ok_or_else(|| ConfigError::NotFound {
            dir: self.dir.clone(),
        })?;

        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        figment = match format {
            ConfigFormat::Yaml => figment.merge(Yaml::file(&path)),
            ConfigFormat::Json => figment.merge(Json::file(&path)),
            ConfigFormat::Toml => figment.merge(Toml::file(&path)),
        };
        if let Some(prefix) = &self.env_prefix {
            figment = figment.merge(
                Env::prefixed(prefix).map(|key| key.as_str().replace('_', "-").into()),
            );
        }
        figment = figment.merge(Serialized::defaults(overrides));

        let settings: Settings = figment.extract().map_err(|e| ConfigError::Parse {
            path: path.clone(),
            source: Box::new(e),
        })?;

        check_instance_url(&settings.instance_url).map_err(|reason| {
            ConfigError::InvalidInstanceUrl {
                path: path.clone(),
                value: settings.instance_url.clone(),
                reason,
            }
        })?;

        tracing::debug!(path = %path.display(), %format, "Configuration loaded");

        Ok(Loaded {
            profile: Profile::from_settings(settings),
            path,
            format,
        })
    }
}

/// Find `config.<ext>` in `dir`, trying extensions in a fixed order.
pub fn find_config(dir: &Path) -> Option<(PathBuf, ConfigFormat)> {
    ConfigFormat::EXTENSIONS.iter().find_map(|(ext, format)| {
        let candidate = dir.join(format!("{CONFIG_NAME}.{ext}"));
        candidate.is_file().then_some((candidate, *format))
    })
}

fn check_instance_url(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Ok(());
    }
    let url = Url::parse(value).map_err(|e| e.to_string())?;
    if !url.has_host() {
        return Err("URL has no host".to_string());
    }
    Ok(())
}
