//! Profile definitions.
//!
//! The profile is the single configuration record of a server process. It is
//! built once by the loader, normalized by [`Profile::validate`] and then
//! shared read-only (behind an `Arc`) by the driver, the store and the server.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::version;

/// Default port used whenever the server is not running in `prod` mode.
///
/// The frontend dev proxy expects the backend on this port.
pub const DEV_PORT: u16 = 8081;

/// Address used when none is configured.
pub const DEFAULT_ADDR: &str = "127.0.0.1";

/// Server mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Prod,
    Dev,
    #[default]
    Demo,
}

impl Mode {
    /// Parse a mode, falling back to [`Mode::Demo`] for anything unknown.
    pub fn parse(value: &str) -> Self {
        match value {
            "prod" => Mode::Prod,
            "dev" => Mode::Dev,
            "demo" => Mode::Demo,
            _ => Mode::Demo,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Prod => "prod",
            Mode::Dev => "dev",
            Mode::Demo => "demo",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Mode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Mode::parse(&raw))
    }
}

/// Raw settings as they come out of the configuration layers.
///
/// Every field defaults to its zero value so that a partial file is accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub mode: String,
    pub addr: String,
    pub port: u16,
    pub data: String,
    pub driver: String,
    pub dsn: String,
    pub instance_url: String,
}

/// The configuration used to start the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    /// `prod`, `dev` or `demo`.
    pub mode: Mode,

    /// Binding address for the server.
    pub addr: String,

    /// Binding port for the server.
    pub port: u16,

    /// Data directory.
    pub data: PathBuf,

    /// Database driver name (`sqlite`, `mysql`, `postgres`).
    pub driver: String,

    /// Driver specific data source name.
    pub dsn: String,

    /// Version of the running server, derived from the mode.
    pub version: String,

    /// Public URL of this instance, empty when unknown.
    pub instance_url: String,
}

impl Profile {
    /// Build a profile from raw settings. The result still needs [`Profile::validate`].
    pub fn from_settings(settings: Settings) -> Self {
        let mode = Mode::parse(&settings.mode);
        Self {
            mode,
            addr: settings.addr,
            port: settings.port,
            data: PathBuf::from(settings.data),
            driver: settings.driver,
            dsn: settings.dsn,
            version: version::current_version(&settings.mode).to_string(),
            instance_url: settings.instance_url,
        }
    }

    /// Anything but `prod` runs with development defaults.
    pub fn is_dev(&self) -> bool {
        self.mode != Mode::Prod
    }
}
