use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use crate::client::Mode;

pub const ENV_API_KEY: &str = "WEATHERLINK_API_KEY";
pub const ENV_API_SECRET: &str = "WEATHERLINK_API_SECRET";
pub const ENV_STATION_ID: &str = "WEATHERLINK_STATION_ID";

/// API key and secret for the WeatherLink v2 API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// default_mode = "live"
/// default_station_id = 117
///
/// [credentials]
/// api_key = "..."
/// api_secret = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Optional default mode, "live" or "demo".
    pub default_mode: Option<String>,

    pub default_station_id: Option<i64>,

    /// Overrides the public API endpoint, e.g. for a proxy.
    pub base_url: Option<String>,

    pub credentials: Option<Credentials>,
}

impl Config {
    /// Return the default mode as a strongly-typed Mode.
    pub fn default_mode(&self) -> Result<Mode> {
        let s = self.default_mode.as_ref().ok_or_else(|| {
            anyhow!(
                "No default mode configured.\n\
                 Hint: run `weatherlink configure` first, or pass `--demo`."
            )
        })?;

        Mode::try_from(s.as_str())
    }

    pub fn set_default_mode(&mut self, mode: Mode) {
        self.default_mode = Some(mode.as_str().to_string());
    }

    /// Set/replace the credentials; a missing default mode becomes `live`.
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);

        if self.default_mode.is_none() {
            self.set_default_mode(Mode::Live);
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Load config from the platform config file, or defaults on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    /// Load config from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    /// Write config to `path`, creating parent directories as needed. The
    /// file holds the API secret, so on Unix it is readable by the owner only.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600)).with_context(|| {
                format!("Failed to restrict permissions on: {}", path.display())
            })?;
        }

        Ok(())
    }

    /// `<config dir>/weatherlink-cli/config.toml`, e.g.
    /// `~/.config/weatherlink-cli/config.toml` on Linux.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherlink", "weatherlink-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Apply `WEATHERLINK_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Environment values override the file. A key or secret alone only
    /// replaces its half of already configured credentials.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        match (var(ENV_API_KEY), var(ENV_API_SECRET)) {
            (Some(api_key), Some(api_secret)) => {
                self.set_credentials(Credentials { api_key, api_secret });
            }
            (Some(api_key), None) => match self.credentials.as_mut() {
                Some(creds) => creds.api_key = api_key,
                None => tracing::warn!("{ENV_API_KEY} is set without {ENV_API_SECRET}; ignoring it"),
            },
            (None, Some(api_secret)) => match self.credentials.as_mut() {
                Some(creds) => creds.api_secret = api_secret,
                None => tracing::warn!("{ENV_API_SECRET} is set without {ENV_API_KEY}; ignoring it"),
            },
            (None, None) => {}
        }

        if let Some(raw) = var(ENV_STATION_ID) {
            let id = raw
                .parse()
                .with_context(|| format!("{ENV_STATION_ID} is not a station id: '{raw}'"))?;
            self.default_station_id = Some(id);
        }

        Ok(())
    }
}
