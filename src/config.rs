use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

pub const CONFIG_ENV: &str = "SCHOOLHUB_CONFIG";
pub const BASE_URL_ENV: &str = "SCHOOLHUB_BASE_URL";
pub const PROFILE_ENV: &str = "SCHOOLHUB_PROFILE";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub base_url: Url,
    pub refresh_path: String,
    pub login_path: String,
    pub logout_path: String,
    pub me_path: String,
    /// Where the user is sent once the session cannot be refreshed.
    pub login_route: String,
    pub profile_path: PathBuf,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://localhost:8000/api/").expect("static url is valid"),
            refresh_path: "auth/refresh".to_string(),
            login_path: "auth/login".to_string(),
            logout_path: "auth/logout".to_string(),
            me_path: "users/me".to_string(),
            login_route: "/login".to_string(),
            profile_path: home_dir().join("session.json"),
            timeout_secs: 30,
        }
    }
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".schoolhub")
}

impl Config {
    /// Reads the configuration file, if any, then applies the environment.
    ///
    /// An explicit `path` must exist. Without one, `$SCHOOLHUB_CONFIG` or
    /// `~/.schoolhub/config.toml` is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = std::env::var_os(CONFIG_ENV)
                    .map(PathBuf::from)
                    .unwrap_or_else(|| home_dir().join("config.toml"));
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading the config file {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(data: &str) -> Result<Self> {
        let mut config: Config = toml::from_str(data)?;
        config.normalize();
        Ok(config)
    }

    fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base_url) = var(BASE_URL_ENV) {
            self.base_url =
                Url::parse(&base_url).with_context(|| format!("parsing {BASE_URL_ENV}"))?;
        }
        if let Some(profile) = var(PROFILE_ENV) {
            self.profile_path = PathBuf::from(profile);
        }
        self.normalize();
        Ok(())
    }

    // Endpoint paths are joined onto the base url, which only keeps its last
    // segment when it ends with a slash.
    fn normalize(&mut self) {
        if !self.base_url.path().ends_with('/') {
            let path = format!("{}/", self.base_url.path());
            self.base_url.set_path(&path);
        }
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, url::ParseError> {
        self.base_url.join(path.trim_start_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
