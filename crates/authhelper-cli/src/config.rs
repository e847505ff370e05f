use anyhow::Result;
use authhelper_core::settings::{ENV_TRACE, ENV_TRACE_BROKER, ENV_TRACE_SECRETS};
use authhelper_core::Settings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::{BINARY_NAME, CONFIG_FILE_NAME};

/// Optional settings file. Every key can also be set through the environment,
/// which takes precedence.
#[derive(Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Same values as `AUTH_HELPER_TRACE`: a boolean or an absolute file path
    pub trace: Option<String>,
    pub trace_secrets: Option<bool>,
    pub trace_broker: Option<bool>,
    /// Seconds to wait for the browser to complete sign-in
    pub callback_timeout_secs: Option<u64>,
}

impl Config {
    /// `<config dir>/auth-helper`, or `None` when no home directory is known.
    pub fn base_path() -> Option<PathBuf> {
        use etcetera::BaseStrategy;

        let strategy = etcetera::choose_base_strategy().ok()?;
        Some(strategy.config_dir().join(BINARY_NAME))
    }

    /// Load the config file. A missing file yields the defaults.
    pub fn load(base_path: &Path) -> Result<Config> {
        let config_path = base_path.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&config_path)?;
        let config: Config = toml::from_str(&content)?;

        Ok(config)
    }

    pub fn callback_timeout(&self) -> Option<Duration> {
        self.callback_timeout_secs.map(Duration::from_secs)
    }

    /// Resolve trace settings, letting `env` override values from the file.
    pub fn settings<I>(&self, env: I) -> Settings
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut vars = HashMap::new();
        if let Some(trace) = &self.trace {
            vars.insert(ENV_TRACE.to_string(), trace.clone());
        }
        if let Some(secrets) = self.trace_secrets {
            vars.insert(ENV_TRACE_SECRETS.to_string(), secrets.to_string());
        }
        if let Some(broker) = self.trace_broker {
            vars.insert(ENV_TRACE_BROKER.to_string(), broker.to_string());
        }
        vars.extend(env);

        Settings::from_vars(vars)
    }
}
