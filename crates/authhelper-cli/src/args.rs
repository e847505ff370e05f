use clap::Parser;

use crate::constants::BINARY_NAME;
use crate::output::OutputLevel;

const CLI_EXAMPLES: &str = r#"INPUT:
  Reads key=value lines from stdin until a blank line or EOF:
    authority=https://login.microsoftonline.com/organizations
    clientId=<application id>
    resource=https://management.core.windows.net
    redirectUri=http://localhost/

OUTPUT:
  accessToken=<token> on success, otherwise error=<description> with
  errorCode and errorDomain when known.

EXAMPLES:
  printf 'authority=...\nclientId=...\nresource=...\nredirectUri=http://localhost/\n\n' | auth-helper
  auth-helper --no-stdin --authority https://login.microsoftonline.com/common \
      --client-id <id> --resource https://graph.microsoft.com --redirect-uri http://localhost/
  AUTH_HELPER_TRACE=1 auth-helper < request.txt     # Trace to stderr"#;

#[derive(Parser, Debug)]
#[command(author, version, long_about = None)]
#[command(about = "Acquire an OAuth access token through the system browser")]
#[command(name = BINARY_NAME)]
#[command(after_long_help = CLI_EXAMPLES)]
pub struct Cli {
    /// Identity provider endpoint (overrides the `authority` input)
    #[arg(long)]
    pub authority: Option<String>,

    /// Application (client) id (overrides the `clientId` input)
    #[arg(long)]
    pub client_id: Option<String>,

    /// Resource to request a token for (overrides the `resource` input)
    #[arg(long)]
    pub resource: Option<String>,

    /// Loopback redirect URI (overrides the `redirectUri` input)
    #[arg(long)]
    pub redirect_uri: Option<String>,

    /// Do not read the input dictionary from stdin
    #[arg(long)]
    pub no_stdin: bool,

    /// Seconds to wait for sign-in to complete in the browser
    #[arg(long, value_name = "SECONDS", env = "AUTH_HELPER_CALLBACK_TIMEOUT")]
    pub callback_timeout: Option<u64>,

    /// Verbose diagnostics on stderr
    #[arg(long)]
    pub verbose: bool,

    /// Quiet output (only show errors)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn output_level(&self) -> OutputLevel {
        if self.quiet {
            OutputLevel::Quiet
        } else if self.verbose {
            OutputLevel::Verbose
        } else {
            OutputLevel::Normal
        }
    }
}
