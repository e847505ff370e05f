// Binary entry point for auth-helper

mod app;
mod args;
mod config;
mod constants;
mod output;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use app::{Application, Outcome};
use args::Cli;
use authhelper_core::broker::DEFAULT_CALLBACK_TIMEOUT;
use authhelper_core::settings::ENV_TRACE;
use authhelper_core::{Logger, SystemBrowserBroker};
use clap::Parser;
use config::Config;
use constants::{CONFIG_FILE_NAME, EXIT_FAILURE};
use output::OutputLevel;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let output_level = cli.output_level();
    output::init_tracing(output_level);

    match run(&cli, output_level) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output::error(&format!("{e:#}"), output_level);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Resolve settings, run one request against the system browser broker and
/// return the process exit code.
fn run(cli: &Cli, output_level: OutputLevel) -> Result<u8> {
    let config = load_config(output_level);
    let settings = config.settings(std::env::vars());

    let mut logger = Logger::new();
    for warning in settings.configure_logger(&mut logger) {
        output::warning(&warning, output_level);
    }
    let logger = Arc::new(logger);

    let callback_timeout = cli
        .callback_timeout
        .map(Duration::from_secs)
        .or_else(|| config.callback_timeout())
        .unwrap_or(DEFAULT_CALLBACK_TIMEOUT);
    tracing::debug!(?callback_timeout, trace_broker = settings.trace_broker, "broker settings");

    let broker = SystemBrowserBroker::new()
        .with_callback_timeout(callback_timeout)
        .with_broker_tracing(settings.trace_broker);
    let app = Application::new(Arc::new(broker), logger);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let outcome = app.run(cli, stdin.lock(), &mut stdout.lock())?;

    if let Outcome::Failed(e) = &outcome {
        if e.is_fatal() {
            let suggestion = format!(
                "Run with {} to trace what went wrong",
                output::format_command(&format!("{ENV_TRACE}=1"))
            );
            output::error_with_suggestion(&e.to_string(), &suggestion, output_level);
        } else {
            tracing::debug!(error = %e, "token acquisition failed");
        }
    }

    Ok(outcome.exit_code())
}

/// A broken config file is reported and replaced by the defaults.
fn load_config(output_level: OutputLevel) -> Config {
    let Some(base_path) = Config::base_path() else {
        return Config::default();
    };

    match Config::load(&base_path) {
        Ok(config) => config,
        Err(e) => {
            output::warning(
                &format!(
                    "ignoring {}: {e:#}",
                    base_path.join(CONFIG_FILE_NAME).display()
                ),
                output_level,
            );
            Config::default()
        }
    }
}
