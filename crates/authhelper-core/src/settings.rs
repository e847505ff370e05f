//! Trace settings resolved from the process environment.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::trace::Logger;
use crate::writer::{FileWriter, StandardErrorWriter};

/// Enables tracing: a truthy value traces to stderr, an absolute path to a file.
pub const ENV_TRACE: &str = "AUTH_HELPER_TRACE";
/// Allows secrets (tokens, codes) to appear in trace output.
pub const ENV_TRACE_SECRETS: &str = "AUTH_HELPER_TRACE_SECRETS";
/// Traces the broker's own requests and responses.
pub const ENV_TRACE_BROKER: &str = "AUTH_HELPER_TRACE_BROKER";

/// Returns true for `1`, `true`, `on` and `yes`, ignoring case.
pub fn is_truthy(value: &str) -> bool {
    ["1", "true", "on", "yes"]
        .iter()
        .any(|t| value.trim().eq_ignore_ascii_case(t))
}

/// Returns true for `0`, `false`, `off` and `no`, ignoring case.
pub fn is_falsey(value: &str) -> bool {
    ["0", "false", "off", "no"]
        .iter()
        .any(|f| value.trim().eq_ignore_ascii_case(f))
}

/// Interpret a value as a boolean, or `None` when it is neither truthy nor falsey.
pub fn to_booleany(value: &str) -> Option<bool> {
    if is_truthy(value) {
        Some(true)
    } else if is_falsey(value) {
        Some(false)
    } else {
        None
    }
}

/// Where trace output should go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TraceTarget {
    #[default]
    Disabled,
    Stderr,
    File(PathBuf),
    /// A value that is neither a boolean nor an absolute path
    Unknown(String),
}

impl TraceTarget {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || is_falsey(value) {
            Self::Disabled
        } else if is_truthy(value) {
            Self::Stderr
        } else if std::path::Path::new(value).is_absolute() {
            Self::File(PathBuf::from(value))
        } else {
            Self::Unknown(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    pub trace: TraceTarget,
    pub trace_secrets: bool,
    pub trace_broker: bool,
    /// Boolean variables whose value was neither truthy nor falsey, as `(name, value)`
    pub unrecognized: Vec<(String, String)>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut unrecognized = Vec::new();
        let mut flag = |name: &str| {
            let value = vars.get(name).map(|v| v.trim()).unwrap_or_default();
            if value.is_empty() {
                return false;
            }
            to_booleany(value).unwrap_or_else(|| {
                unrecognized.push((name.to_string(), value.to_string()));
                false
            })
        };
        let trace_secrets = flag(ENV_TRACE_SECRETS);
        let trace_broker = flag(ENV_TRACE_BROKER);

        Self {
            trace: vars
                .get(ENV_TRACE)
                .map(|v| TraceTarget::parse(v))
                .unwrap_or_default(),
            trace_secrets,
            trace_broker,
            unrecognized,
        }
    }

    /// Attach the writers these settings ask for and set the secret flag.
    ///
    /// Returns warnings for the caller to show; configuring never fails.
    pub fn configure_logger(&self, logger: &mut Logger) -> Vec<String> {
        let mut warnings = Vec::new();

        match &self.trace {
            TraceTarget::Disabled => {}
            TraceTarget::Stderr => logger.add_writer(StandardErrorWriter::new()),
            TraceTarget::File(path) => logger.add_writer(FileWriter::new(path)),
            TraceTarget::Unknown(value) => {
                warnings.push(format!("unknown value for {ENV_TRACE} '{value}'"));
            }
        }

        for (name, value) in &self.unrecognized {
            warnings.push(format!("unknown value for {name} '{value}', treating it as off"));
        }

        if self.trace_secrets {
            logger.set_secret_tracing(true);
            logger.log(
                "Tracing of secrets is enabled. Trace output may contain sensitive information.",
            );
        }

        warnings
    }
}
