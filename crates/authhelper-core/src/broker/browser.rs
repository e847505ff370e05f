//! Authorization code flow driven through the system web browser.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::callback::CallbackServer;
use super::pkce::{PkceChallenge, generate_state};
use crate::error::{HelperError, OAUTH2_ERROR_DOMAIN};
use crate::token::{AccessToken, AuthBroker, TokenRequest};
use crate::trace::Logger;

/// Default time to wait for the user to finish signing in.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Opens a URL for the user. Defaults to the system browser.
pub type UrlOpener = Arc<dyn Fn(&str) -> std::io::Result<()> + Send + Sync>;

/// Authorization and token endpoints of an authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorityEndpoints {
    pub authorization: String,
    pub token: String,
}

impl AuthorityEndpoints {
    /// Endpoints of a Microsoft identity platform style authority.
    pub fn from_authority(authority: &str) -> Self {
        let base = authority.trim_end_matches('/');
        Self {
            authorization: format!("{base}/oauth2/v2.0/authorize"),
            token: format!("{base}/oauth2/v2.0/token"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[allow(dead_code)]
    token_type: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

#[derive(Debug, Serialize)]
struct CodeExchangeForm<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    code: &'a str,
    redirect_uri: &'a str,
    code_verifier: &'a str,
    scope: &'a str,
}

/// Broker that signs the user in through the system browser.
///
/// The authorization request carries a PKCE challenge and a random `state`;
/// the redirect is received on a loopback listener and the code is exchanged
/// at the authority's token endpoint.
pub struct SystemBrowserBroker {
    endpoints: Option<AuthorityEndpoints>,
    callback_timeout: Duration,
    open_url: UrlOpener,
    trace_broker: bool,
    http: reqwest::Client,
}

impl Default for SystemBrowserBroker {
    fn default() -> Self {
        Self {
            endpoints: None,
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            open_url: Arc::new(|url: &str| webbrowser::open(url)),
            trace_broker: false,
            http: reqwest::Client::new(),
        }
    }
}

impl SystemBrowserBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    /// Use fixed endpoints instead of deriving them from the authority.
    pub fn with_endpoints(mut self, endpoints: AuthorityEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn with_url_opener(mut self, open_url: UrlOpener) -> Self {
        self.open_url = open_url;
        self
    }

    /// Trace authorization URLs and token endpoint responses.
    pub fn with_broker_tracing(mut self, enabled: bool) -> Self {
        self.trace_broker = enabled;
        self
    }

    fn endpoints_for(&self, request: &TokenRequest) -> AuthorityEndpoints {
        self.endpoints
            .clone()
            .unwrap_or_else(|| AuthorityEndpoints::from_authority(&request.authority))
    }

    fn build_authorization_url(
        authorization_endpoint: &str,
        request: &TokenRequest,
        redirect_uri: &str,
        pkce: &PkceChallenge,
        state: &str,
    ) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&code_challenge={}&code_challenge_method={}&state={}&prompt=select_account",
            authorization_endpoint,
            urlencoding::encode(&request.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&request.scope()),
            urlencoding::encode(&pkce.challenge),
            pkce.method(),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(
        &self,
        token_endpoint: &str,
        request: &TokenRequest,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
        logger: &Logger,
    ) -> Result<AccessToken, HelperError> {
        let scope = request.scope();
        let form = CodeExchangeForm {
            grant_type: "authorization_code",
            client_id: &request.client_id,
            code,
            redirect_uri,
            code_verifier,
            scope: &scope,
        };
        let body = serde_urlencoded::to_string(&form).map_err(|e| {
            HelperError::invalid_input(format!("Failed to encode token request: {e}"))
        })?;

        let response = self
            .http
            .post(token_endpoint)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if self.trace_broker {
            logger.log_secret(
                &format!("Token endpoint responded with {status}."),
                &text,
            );
        }

        if !status.is_success() {
            return Err(match serde_json::from_str::<TokenErrorResponse>(&text) {
                Ok(err) => HelperError::authentication(
                    OAUTH2_ERROR_DOMAIN,
                    err.error,
                    err.error_description
                        .unwrap_or_else(|| format!("Token endpoint returned {status}")),
                ),
                Err(_) => HelperError::network(format!("Token exchange failed: {status} - {text}")),
            });
        }

        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| {
            HelperError::network_with_source("Failed to parse token response", e)
        })?;
        if let Some(expires_in) = token.expires_in {
            log::debug!("access token expires in {expires_in}s");
        }

        Ok(AccessToken::new(token.access_token))
    }
}

#[async_trait]
impl AuthBroker for SystemBrowserBroker {
    fn name(&self) -> &'static str {
        "system browser"
    }

    async fn authenticate(
        &self,
        request: &TokenRequest,
        logger: &Logger,
    ) -> Result<AccessToken, HelperError> {
        let endpoints = self.endpoints_for(request);
        let pkce = PkceChallenge::generate();
        let state = generate_state();

        let server = CallbackServer::bind(&request.redirect_uri).await?;
        let redirect_uri = server.redirect_uri().to_string();

        let auth_url = Self::build_authorization_url(
            &endpoints.authorization,
            request,
            &redirect_uri,
            &pkce,
            &state,
        );
        if self.trace_broker {
            logger.log_secret("Authorization URL:", &auth_url);
        }

        logger.log(&format!(
            "Opening browser for sign-in; waiting up to {}s for redirect to {redirect_uri}",
            self.callback_timeout.as_secs()
        ));
        (self.open_url)(&auth_url)
            .map_err(|e| HelperError::platform(format!("Failed to open browser: {e}")))?;

        let callback = server.wait_for_callback(self.callback_timeout).await?;
        if callback.state.as_deref() != Some(state.as_str()) {
            return Err(HelperError::authentication(
                OAUTH2_ERROR_DOMAIN,
                "state_mismatch",
                "State mismatch in OAuth callback (possible CSRF attack)",
            ));
        }
        logger.log("Authorization code received; redeeming for access token.");

        self.exchange_code(
            &endpoints.token,
            request,
            &callback.code,
            &redirect_uri,
            &pkce.verifier,
            logger,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::MemoryWriter;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    fn request(authority: &str) -> TokenRequest {
        TokenRequest::new(
            authority,
            "test-client",
            "https://resource.example.com",
            "http://127.0.0.1/",
        )
    }

    fn query_param(url: &str, name: &str) -> Option<String> {
        let parsed = url::Url::parse(url).ok()?;
        parsed
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Opener that plays the browser: follows the authorization URL straight
    /// back to the redirect URI with the given code and the echoed state.
    fn redirecting_opener(code: &'static str, tamper_state: bool) -> UrlOpener {
        Arc::new(move |auth_url: &str| -> std::io::Result<()> {
            let redirect = query_param(auth_url, "redirect_uri").expect("redirect_uri");
            let mut state = query_param(auth_url, "state").expect("state");
            if tamper_state {
                state.push('x');
            }
            let redirect = url::Url::parse(&redirect).unwrap();
            let addr = format!("127.0.0.1:{}", redirect.port().unwrap());
            let target = format!("{}?code={code}&state={state}", redirect.path());

            std::thread::spawn(move || {
                let mut stream = TcpStream::connect(addr).unwrap();
                let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
                stream.write_all(request.as_bytes()).unwrap();
                let mut response = String::new();
                stream.read_to_string(&mut response).ok();
            });
            Ok(())
        })
    }

    #[test]
    fn test_endpoints_from_authority() {
        let endpoints = AuthorityEndpoints::from_authority("https://login.example.com/common/");
        assert_eq!(
            endpoints.authorization,
            "https://login.example.com/common/oauth2/v2.0/authorize"
        );
        assert_eq!(endpoints.token, "https://login.example.com/common/oauth2/v2.0/token");
    }

    #[test]
    fn test_build_authorization_url() {
        let pkce = PkceChallenge::generate();
        let req = request("https://login.example.com/common");

        let url = SystemBrowserBroker::build_authorization_url(
            "https://login.example.com/common/oauth2/v2.0/authorize",
            &req,
            "http://127.0.0.1:8400/",
            &pkce,
            "test-state",
        );

        assert!(url.starts_with("https://login.example.com/common/oauth2/v2.0/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test-client"));
        assert_eq!(
            query_param(&url, "scope").as_deref(),
            Some("https://resource.example.com/.default")
        );
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("state=test-state"));
        assert!(url.contains("prompt=select_account"));
    }

    #[tokio::test]
    async fn test_authenticate_exchanges_code_for_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/common/oauth2/v2.0/token")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                mockito::Matcher::UrlEncoded("code".into(), "auth-code-1".into()),
                mockito::Matcher::UrlEncoded("client_id".into(), "test-client".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"at-123","token_type":"Bearer","expires_in":3600}"#)
            .create_async()
            .await;

        let broker = SystemBrowserBroker::new()
            .with_callback_timeout(Duration::from_secs(10))
            .with_url_opener(redirecting_opener("auth-code-1", false));
        let logger = Logger::new();

        let token = broker
            .authenticate(&request(&format!("{}/common", server.url())), &logger)
            .await
            .unwrap();

        assert_eq!(token.secret(), "at-123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_endpoint_error_maps_to_authentication() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/common/oauth2/v2.0/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant","error_description":"AADSTS70008: code expired"}"#)
            .create_async()
            .await;

        let broker = SystemBrowserBroker::new()
            .with_callback_timeout(Duration::from_secs(10))
            .with_url_opener(redirecting_opener("stale", false));

        let err = broker
            .authenticate(&request(&format!("{}/common", server.url())), &Logger::new())
            .await
            .unwrap_err();

        assert_eq!(err.domain(), Some("oauth2"));
        assert_eq!(err.code(), Some("invalid_grant"));
        assert_eq!(err.description(), "AADSTS70008: code expired");
    }

    #[tokio::test]
    async fn test_state_mismatch_is_rejected() {
        let broker = SystemBrowserBroker::new()
            .with_endpoints(AuthorityEndpoints::from_authority("http://127.0.0.1:9/never"))
            .with_callback_timeout(Duration::from_secs(10))
            .with_url_opener(redirecting_opener("code", true));

        let err = broker
            .authenticate(&request("https://login.example.com/common"), &Logger::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some("state_mismatch"));
    }

    #[tokio::test]
    async fn test_browser_failure_is_platform_error() {
        let broker = SystemBrowserBroker::new()
            .with_url_opener(Arc::new(|_: &str| -> std::io::Result<()> {
                Err(std::io::Error::other("no browser"))
            }));

        let err = broker
            .authenticate(&request("https://login.example.com/common"), &Logger::new())
            .await
            .unwrap_err();

        assert!(matches!(err, HelperError::Platform { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_broker_tracing_keeps_response_secret_by_default() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/common/oauth2/v2.0/token")
            .with_status(200)
            .with_body(r#"{"access_token":"very-secret-token"}"#)
            .create_async()
            .await;

        let sink = MemoryWriter::new();
        let mut logger = Logger::new();
        logger.add_writer(sink.clone());
        let broker = SystemBrowserBroker::new()
            .with_broker_tracing(true)
            .with_callback_timeout(Duration::from_secs(10))
            .with_url_opener(redirecting_opener("code", false));

        broker
            .authenticate(&request(&format!("{}/common", server.url())), &logger)
            .await
            .unwrap();

        let contents = sink.contents();
        assert!(contents.contains("Token endpoint responded with 200 OK."));
        assert!(contents.contains("Authorization URL:"));
        assert!(!contents.contains("very-secret-token"));
        assert!(!contents.contains("code_challenge="));
    }
}
