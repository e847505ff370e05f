//! Access token acquisition.
//!
//! [`TokenRequester`] wraps an [`AuthBroker`] (the component that actually
//! talks to the identity provider) and owns the diagnostics around a single
//! attempt: start, success and failure are traced, with the token itself only
//! emitted when secret tracing is enabled.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use url::Url;

use crate::error::HelperError;
use crate::trace::Logger;

/// Inputs for one token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    /// Identity provider endpoint, e.g. `https://login.microsoftonline.com/organizations`
    pub authority: String,
    pub client_id: String,
    /// Resource the token is for; the requested scope is `{resource}/.default`
    pub resource: String,
    pub redirect_uri: String,
}

impl TokenRequest {
    pub fn new(
        authority: impl Into<String>,
        client_id: impl Into<String>,
        resource: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            authority: authority.into(),
            client_id: client_id.into(),
            resource: resource.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    /// Check that every field is present and the URLs parse.
    pub fn validate(&self) -> Result<(), HelperError> {
        let fields = [
            ("authority", &self.authority),
            ("clientId", &self.client_id),
            ("resource", &self.resource),
            ("redirectUri", &self.redirect_uri),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(HelperError::missing_input(name));
            }
        }

        Url::parse(&self.authority).map_err(|e| {
            HelperError::invalid_input(format!("authority '{}' is not a URL: {e}", self.authority))
        })?;
        Url::parse(&self.redirect_uri).map_err(|e| {
            HelperError::invalid_input(format!(
                "redirect URI '{}' is not a URL: {e}",
                self.redirect_uri
            ))
        })?;

        Ok(())
    }

    /// The scope requested on behalf of the resource.
    pub fn scope(&self) -> String {
        format!("{}/.default", self.resource.trim_end_matches('/'))
    }
}

/// An opaque access token. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }

    pub fn into_secret(self) -> String {
        self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(********)")
    }
}

/// The component that performs the authentication handshake.
#[async_trait]
pub trait AuthBroker: Send + Sync {
    /// Broker name used in diagnostics
    fn name(&self) -> &'static str;

    /// Perform one authentication attempt.
    async fn authenticate(
        &self,
        request: &TokenRequest,
        logger: &Logger,
    ) -> Result<AccessToken, HelperError>;
}

/// Drives one token acquisition through a broker and traces the outcome.
pub struct TokenRequester {
    broker: Arc<dyn AuthBroker>,
    logger: Arc<Logger>,
}

impl TokenRequester {
    pub fn new(broker: Arc<dyn AuthBroker>, logger: Arc<Logger>) -> Self {
        Self { broker, logger }
    }

    /// Make exactly one attempt; retrying is left to the caller.
    pub async fn acquire_token(&self, request: &TokenRequest) -> Result<AccessToken, HelperError> {
        let broker = self.broker.name();
        self.logger.log(&format!(
            "Acquiring token via {broker}: authority={} clientId={} resource={} redirectUri={}",
            request.authority, request.client_id, request.resource, request.redirect_uri
        ));

        let result = match request.validate() {
            Ok(()) => self.broker.authenticate(request, &self.logger).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(token) => {
                counter!("auth_helper_token_requests_total", "outcome" => "success").increment(1);
                self.logger
                    .log_secret("Access token acquired.", token.secret());
            }
            Err(e) => {
                counter!("auth_helper_token_requests_total", "outcome" => "failure").increment(1);
                self.logger.log(&format!(
                    "Token acquisition failed: domain={} code={} description={}",
                    e.domain().unwrap_or("-"),
                    e.code().unwrap_or("-"),
                    e.description()
                ));
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TokenRequest {
        TokenRequest::new(
            "https://login.example.com/common",
            "client-id",
            "https://resource.example.com",
            "http://localhost:8400/",
        )
    }

    #[test]
    fn test_validate_accepts_complete_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_validate_reports_missing_field_name() {
        let mut req = request();
        req.client_id = "  ".to_string();

        let err = req.validate().unwrap_err();
        assert!(matches!(err, HelperError::MissingInput { ref name } if name == "clientId"));
    }

    #[test]
    fn test_validate_rejects_unparseable_redirect() {
        let mut req = request();
        req.redirect_uri = "not a url".to_string();

        let err = req.validate().unwrap_err();
        assert!(matches!(err, HelperError::InvalidInput { .. }));
    }

    #[test]
    fn test_scope_from_resource() {
        let mut req = request();
        assert_eq!(req.scope(), "https://resource.example.com/.default");

        req.resource = "https://resource.example.com/".to_string();
        assert_eq!(req.scope(), "https://resource.example.com/.default");
    }

    struct CountingBroker(std::sync::atomic::AtomicUsize);

    #[async_trait]
    impl AuthBroker for CountingBroker {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn authenticate(
            &self,
            _request: &TokenRequest,
            _logger: &Logger,
        ) -> Result<AccessToken, HelperError> {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(HelperError::network("connection reset"))
        }
    }

    #[test]
    fn test_failure_is_not_retried() {
        let broker = Arc::new(CountingBroker(Default::default()));
        let requester = TokenRequester::new(broker.clone(), Arc::new(Logger::new()));

        let result = tokio_test::block_on(requester.acquire_token(&request()));

        assert!(matches!(result, Err(HelperError::Network { .. })));
        assert_eq!(broker.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_access_token_debug_is_masked() {
        let token = AccessToken::new("eyJhbGciOi");
        assert_eq!(format!("{token:?}"), "AccessToken(********)");
        assert_eq!(token.secret(), "eyJhbGciOi");
    }
}
