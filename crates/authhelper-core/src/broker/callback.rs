//! Loopback listener that receives the authorization redirect.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::{Host, Url};

use crate::error::{HelperError, OAUTH2_ERROR_DOMAIN};

const MAX_REQUEST_BYTES: usize = 8192;

/// How long one connection may take to deliver its request line and headers.
pub const CONNECTION_READ_TIMEOUT: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authentication complete</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0;">
<div style="text-align: center;">
<h1 style="color: #10b981;">Authentication complete</h1>
<p>You can close this window and return to the application.</p>
</div>
</body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authentication failed</title></head>
<body style="font-family: system-ui; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0;">
<div style="text-align: center;">
<h1 style="color: #ef4444;">Authentication failed</h1>
<p>Return to the application for details.</p>
</div>
</body>
</html>"#;

/// Parameters delivered to the redirect URI.
#[derive(Debug, PartialEq, Eq)]
pub struct CallbackResult {
    pub code: String,
    pub state: Option<String>,
}

/// Listener bound to the address named by a loopback redirect URI.
pub struct CallbackServer {
    listener: TcpListener,
    redirect_uri: String,
    path: String,
    read_timeout: Duration,
}

impl CallbackServer {
    /// Bind the host and port of `redirect_uri`.
    ///
    /// The URI must be plain `http` on a loopback host. Without an explicit
    /// port an ephemeral one is chosen and substituted into
    /// [`CallbackServer::redirect_uri`].
    pub async fn bind(redirect_uri: &str) -> Result<Self, HelperError> {
        let url = Url::parse(redirect_uri).map_err(|e| {
            HelperError::invalid_input(format!("redirect URI '{redirect_uri}' is not a URL: {e}"))
        })?;

        if url.scheme() != "http" {
            return Err(HelperError::invalid_input(format!(
                "redirect URI '{redirect_uri}' must use http on a loopback address"
            )));
        }

        let ip = loopback_ip(&url).ok_or_else(|| {
            HelperError::invalid_input(format!(
                "redirect URI '{redirect_uri}' must point at localhost or a loopback address"
            ))
        })?;

        let addr = SocketAddr::new(ip, url.port().unwrap_or(0));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            HelperError::network_with_source(format!("Failed to bind callback listener to {addr}"), e)
        })?;

        let effective_uri = if url.port().is_some() {
            redirect_uri.to_string()
        } else {
            let port = listener.local_addr()?.port();
            let mut url = url.clone();
            url.set_port(Some(port))
                .map_err(|()| HelperError::invalid_input("redirect URI cannot carry a port"))?;
            url.to_string()
        };

        log::debug!("callback listener bound to {}", listener.local_addr()?);

        Ok(Self {
            listener,
            redirect_uri: effective_uri,
            path: url.path().to_string(),
            read_timeout: CONNECTION_READ_TIMEOUT,
        })
    }

    /// Limit how long a single connection may stay silent before it is dropped.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// The redirect URI to send to the authorization server.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn local_addr(&self) -> Result<SocketAddr, HelperError> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the redirect carrying the authorization code.
    ///
    /// Requests for other paths (a browser asking for `/favicon.ico`, say) are
    /// answered with 404 and the wait continues. Connections that fail or send
    /// nothing within the read timeout are dropped.
    pub async fn wait_for_callback(&self, timeout: Duration) -> Result<CallbackResult, HelperError> {
        tokio::time::timeout(timeout, self.accept_callback())
            .await
            .map_err(|_| HelperError::timeout(timeout))?
    }

    async fn accept_callback(&self) -> Result<CallbackResult, HelperError> {
        loop {
            let (mut stream, peer) = self
                .listener
                .accept()
                .await
                .map_err(|e| HelperError::network_with_source("Failed to accept connection", e))?;
            log::debug!("callback connection from {peer}");

            let request =
                match tokio::time::timeout(self.read_timeout, read_request(&mut stream)).await {
                    Ok(Ok(request)) => request,
                    Ok(Err(e)) => {
                        log::debug!("dropping callback connection from {peer}: {e}");
                        continue;
                    }
                    Err(_) => {
                        log::debug!("callback connection from {peer} sent no request in time");
                        continue;
                    }
                };
            let Some(target) = request_target(&request) else {
                respond(&mut stream, "400 Bad Request", "").await;
                continue;
            };

            if target.split('?').next() != Some(self.path.as_str()) {
                respond(&mut stream, "404 Not Found", "").await;
                continue;
            }

            let result = parse_callback_target(target);
            let page = if result.is_ok() {
                SUCCESS_PAGE
            } else {
                FAILURE_PAGE
            };
            respond(&mut stream, "200 OK", page).await;
            return result;
        }
    }
}

fn loopback_ip(url: &Url) -> Option<IpAddr> {
    match url.host()? {
        Host::Domain(domain) if domain.eq_ignore_ascii_case("localhost") => {
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        }
        Host::Domain(_) => None,
        Host::Ipv4(ip) if ip.is_loopback() => Some(IpAddr::V4(ip)),
        Host::Ipv6(ip) if ip.is_loopback() => Some(IpAddr::V6(ip)),
        _ => None,
    }
}

async fn read_request(stream: &mut TcpStream) -> Result<String, HelperError> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| HelperError::network_with_source("Failed to read from connection", e))?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.windows(4).any(|w| w == b"\r\n\r\n") || buffer.len() >= MAX_REQUEST_BYTES {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Path and query from a request line such as `GET /callback?code=x HTTP/1.1`.
fn request_target(request: &str) -> Option<&str> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let _method = parts.next()?;
    parts.next()
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        log::debug!("failed to answer callback request: {e}");
    }
    stream.flush().await.ok();
}

fn parse_callback_target(target: &str) -> Result<CallbackResult, HelperError> {
    if let Some(error) = extract_query_param(target, "error") {
        let description = extract_query_param(target, "error_description")
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(HelperError::authentication(
            OAUTH2_ERROR_DOMAIN,
            error,
            description,
        ));
    }

    let code = extract_query_param(target, "code").ok_or_else(|| {
        HelperError::authentication(
            OAUTH2_ERROR_DOMAIN,
            "invalid_callback",
            "No authorization code in callback",
        )
    })?;
    let state = extract_query_param(target, "state");

    Ok(CallbackResult { code, state })
}

fn extract_query_param(target: &str, param: &str) -> Option<String> {
    let query = target.split_once('?')?.1;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key == param {
            let value = value.replace('+', " ");
            return Some(urlencoding::decode(&value).ok()?.into_owned());
        }
    }
    None
}
