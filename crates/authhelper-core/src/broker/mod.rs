//! Authentication brokers.
//!
//! The [`SystemBrowserBroker`] runs the OAuth 2.0 authorization code flow with
//! PKCE through the user's browser and a loopback redirect listener.

mod browser;
mod callback;
mod pkce;

pub use browser::{AuthorityEndpoints, DEFAULT_CALLBACK_TIMEOUT, SystemBrowserBroker, UrlOpener};
pub use callback::{CONNECTION_READ_TIMEOUT, CallbackResult, CallbackServer};
pub use pkce::{PkceChallenge, generate_state};
