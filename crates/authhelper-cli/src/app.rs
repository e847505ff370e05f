//! One helper invocation: read the request, acquire a token, answer.

use anyhow::{Context, Result};
use authhelper_core::{
    AppRunLoop, AuthBroker, HelperError, Logger, TokenRequest, TokenRequester, get_ignore_case,
    read_dictionary, write_dictionary,
};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::args::Cli;
use crate::constants::{
    EXIT_FAILURE, EXIT_FATAL, EXIT_SUCCESS, KEY_ACCESS_TOKEN, KEY_AUTHORITY, KEY_CLIENT_ID,
    KEY_ERROR, KEY_ERROR_CODE, KEY_ERROR_DOMAIN, KEY_REDIRECT_URI, KEY_RESOURCE,
};

/// How a run ended once the response has been written.
#[derive(Debug)]
pub enum Outcome {
    Acquired,
    Failed(HelperError),
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Acquired => EXIT_SUCCESS,
            Self::Failed(e) if e.is_fatal() => EXIT_FATAL,
            Self::Failed(_) => EXIT_FAILURE,
        }
    }
}

pub struct Application {
    broker: Arc<dyn AuthBroker>,
    logger: Arc<Logger>,
}

impl Application {
    pub fn new(broker: Arc<dyn AuthBroker>, logger: Arc<Logger>) -> Self {
        Self { broker, logger }
    }

    /// Handle one request read from `input` and write the response dictionary to `output`.
    ///
    /// Authentication failures are reported in the response and returned as
    /// [`Outcome::Failed`]; only I/O on `input` or `output` is an `Err`.
    pub fn run(&self, cli: &Cli, input: impl BufRead, output: &mut impl Write) -> Result<Outcome> {
        let input = if cli.no_stdin {
            HashMap::new()
        } else {
            read_dictionary(input).context("failed to read the request from stdin")?
        };

        self.logger.log("Input:");
        self.logger.log_dictionary(&input);

        let request = build_request(cli, &input);
        tracing::debug!(authority = %request.authority, broker = self.broker.name(), "acquiring token");

        let requester = TokenRequester::new(self.broker.clone(), self.logger.clone());
        let result = AppRunLoop::run_delegate(&self.logger, move |_stop| async move {
            requester.acquire_token(&request).await
        });

        let (response, outcome) = match result {
            Ok(token) => {
                let mut response = HashMap::new();
                response.insert(KEY_ACCESS_TOKEN.to_string(), token.into_secret());
                (response, Outcome::Acquired)
            }
            Err(e) => (error_response(&e), Outcome::Failed(e)),
        };

        self.logger.log("Output:");
        self.logger
            .log_dictionary_secrets(&response, &[KEY_ACCESS_TOKEN]);

        write_dictionary(&mut *output, &response).context("failed to write the response")?;
        output.flush().context("failed to write the response")?;

        Ok(outcome)
    }
}

/// Flags win over input keys; absent values stay empty and fail validation.
fn build_request(cli: &Cli, input: &HashMap<String, String>) -> TokenRequest {
    let value = |flag: &Option<String>, key: &str| {
        flag.clone()
            .or_else(|| get_ignore_case(input, key).map(str::to_string))
            .unwrap_or_default()
    };

    TokenRequest::new(
        value(&cli.authority, KEY_AUTHORITY),
        value(&cli.client_id, KEY_CLIENT_ID),
        value(&cli.resource, KEY_RESOURCE),
        value(&cli.redirect_uri, KEY_REDIRECT_URI),
    )
}

fn error_response(error: &HelperError) -> HashMap<String, String> {
    let mut response = HashMap::new();
    response.insert(KEY_ERROR.to_string(), error.description());
    if let Some(code) = error.code() {
        response.insert(KEY_ERROR_CODE.to_string(), code.to_string());
    }
    if let Some(domain) = error.domain() {
        response.insert(KEY_ERROR_DOMAIN.to_string(), domain.to_string());
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use authhelper_core::{AccessToken, MemoryWriter};
    use clap::Parser;
    use std::sync::Mutex;

    const TOKEN: &str = "token-value";
    const FULL_INPUT: &str = "authority=https://login.example.com/common\n\
                              clientId=client\n\
                              resource=https://resource.example.com\n\
                              redirectUri=http://localhost/\n\n";

    #[derive(Default)]
    struct StubBroker {
        error: Option<HelperError>,
        seen: Mutex<Option<TokenRequest>>,
    }

    impl StubBroker {
        fn failing(error: HelperError) -> Self {
            Self {
                error: Some(error),
                ..Self::default()
            }
        }

        fn seen(&self) -> Option<TokenRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl AuthBroker for StubBroker {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn authenticate(
            &self,
            request: &TokenRequest,
            _logger: &Logger,
        ) -> Result<AccessToken, HelperError> {
            *self.seen.lock().unwrap() = Some(request.clone());
            match &self.error {
                Some(HelperError::Authentication {
                    domain,
                    code,
                    description,
                }) => Err(HelperError::authentication(domain, code, description)),
                Some(e) => Err(HelperError::platform(e.to_string())),
                None => Ok(AccessToken::new(TOKEN)),
            }
        }
    }

    struct Harness {
        broker: Arc<StubBroker>,
        trace: MemoryWriter,
        app: Application,
    }

    fn harness(broker: StubBroker) -> Harness {
        let broker = Arc::new(broker);
        let trace = MemoryWriter::new();
        let mut logger = Logger::new();
        logger.add_writer(trace.clone());

        let app = Application::new(broker.clone(), Arc::new(logger));
        Harness { broker, trace, app }
    }

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("auth-helper").chain(args.iter().copied())).unwrap()
    }

    fn run(h: &Harness, args: &[&str], input: &str) -> (Outcome, String) {
        let mut output = Vec::new();
        let outcome = h.app.run(&cli(args), input.as_bytes(), &mut output).unwrap();
        (outcome, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_success_writes_access_token() {
        let h = harness(StubBroker::default());

        let (outcome, output) = run(&h, &[], FULL_INPUT);

        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert_eq!(output, format!("accessToken={TOKEN}\n\n"));
        assert!(!h.trace.contents().contains(TOKEN));
    }

    #[test]
    fn test_missing_authority_is_error() {
        let h = harness(StubBroker::default());
        let input = "clientId=client\nresource=https://r.example.com\nredirectUri=http://localhost/\n";

        let (outcome, output) = run(&h, &[], input);

        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
        assert_eq!(output, "error=Missing 'authority' input\n\n");
        assert!(h.broker.seen().is_none());
    }

    #[test]
    fn test_each_missing_input_is_named() {
        for (key, line) in [
            ("clientId", "clientId=client\n"),
            ("resource", "resource=https://resource.example.com\n"),
            ("redirectUri", "redirectUri=http://localhost/\n"),
        ] {
            let h = harness(StubBroker::default());
            let input = FULL_INPUT.replace(line, "");

            let (outcome, output) = run(&h, &[], &input);

            assert_eq!(outcome.exit_code(), EXIT_FAILURE, "{key}");
            assert!(output.contains(&format!("error=Missing '{key}' input")), "{output}");
        }
    }

    #[test]
    fn test_input_keys_are_case_insensitive() {
        let h = harness(StubBroker::default());
        let input = "AUTHORITY=https://login.example.com/common\nClientID=client\n\
                     Resource=https://resource.example.com\nredirecturi=http://localhost/\n";

        let (outcome, _) = run(&h, &[], input);

        assert_eq!(outcome.exit_code(), EXIT_SUCCESS);
        assert_eq!(h.broker.seen().unwrap().client_id, "client");
    }

    #[test]
    fn test_flags_override_input() {
        let h = harness(StubBroker::default());

        run(&h, &["--client-id", "from-flag"], FULL_INPUT);

        let seen = h.broker.seen().unwrap();
        assert_eq!(seen.client_id, "from-flag");
        assert_eq!(seen.resource, "https://resource.example.com");
    }

    #[test]
    fn test_no_stdin_ignores_input() {
        let h = harness(StubBroker::default());

        let (outcome, output) = run(&h, &["--no-stdin"], FULL_INPUT);

        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
        assert!(output.starts_with("error=Missing 'authority' input"));
    }

    #[test]
    fn test_authentication_error_reports_code_and_domain() {
        let h = harness(StubBroker::failing(HelperError::authentication(
            "oauth2",
            "access_denied",
            "The user cancelled sign-in",
        )));

        let (outcome, output) = run(&h, &[], FULL_INPUT);

        assert_eq!(outcome.exit_code(), EXIT_FAILURE);
        assert_eq!(
            output,
            "error=The user cancelled sign-in\nerrorCode=access_denied\nerrorDomain=oauth2\n\n"
        );
    }

    #[test]
    fn test_fatal_error_exit_code() {
        let h = harness(StubBroker::failing(HelperError::platform("no browser")));

        let (outcome, output) = run(&h, &[], FULL_INPUT);

        assert_eq!(outcome.exit_code(), EXIT_FATAL);
        assert!(output.starts_with("error="));
    }

    #[test]
    fn test_trace_records_input_and_masked_output() {
        let h = harness(StubBroker::default());

        run(&h, &[], FULL_INPUT);

        let trace = h.trace.contents();
        assert!(trace.contains("\tclientId=client"));
        assert!(trace.contains("\taccessToken=********"));
    }
}
