//! # authhelper-core - OAuth access tokens for a parent process
//!
//! The library behind the `auth-helper` binary. It acquires an access token
//! through an interactive broker and traces what it does to pluggable sinks,
//! keeping secrets out of the trace unless explicitly asked for.
//!
//! ## Features
//!
//! - **Trace logger** - git-style trace lines fanned out to stderr, files or memory
//! - **Secret redaction** - tokens only reach a writer when secret tracing is on
//! - **Browser broker** - authorization code flow with PKCE and a loopback redirect
//! - **Run loop** - a dedicated event-loop thread hosting the interactive flow
//! - **Dictionary protocol** - `key=value` lines on stdin and stdout
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use authhelper_core::{
//!     AppRunLoop, Logger, Settings, SystemBrowserBroker, TokenRequest, TokenRequester,
//! };
//!
//! fn main() -> Result<(), authhelper_core::HelperError> {
//!     let mut logger = Logger::new();
//!     let settings = Settings::from_env();
//!     settings.configure_logger(&mut logger);
//!     let logger = Arc::new(logger);
//!
//!     let request = TokenRequest::new(
//!         "https://login.microsoftonline.com/organizations",
//!         "00000000-0000-0000-0000-000000000000",
//!         "https://management.core.windows.net",
//!         "http://localhost/",
//!     );
//!
//!     let requester = TokenRequester::new(Arc::new(SystemBrowserBroker::new()), logger.clone());
//!     let token = AppRunLoop::run_delegate(&logger, move |_stop| async move {
//!         requester.acquire_token(&request).await
//!     })?;
//!     println!("accessToken={}", token.secret());
//!     Ok(())
//! }
//! ```
//!
//! ## Tracing
//!
//! ```rust
//! use authhelper_core::{Logger, MemoryWriter};
//!
//! let sink = MemoryWriter::new();
//! let mut logger = Logger::new();
//! logger.add_writer(sink.clone());
//!
//! logger.log("Starting");
//! logger.log_secret("Token:", "s3cr3t");
//!
//! let lines = sink.lines();
//! assert_eq!(lines.len(), 2);
//! assert!(lines[0].ends_with("trace: Starting"));
//! assert!(!lines[1].contains("s3cr3t"));
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`HelperError`]. Authentication failures
//! carry the provider's error domain, code and description:
//!
//! ```rust
//! use authhelper_core::HelperError;
//!
//! let err = HelperError::authentication("oauth2", "access_denied", "User cancelled");
//! assert_eq!(err.code(), Some("access_denied"));
//! assert!(!err.is_fatal());
//! ```

pub mod broker;
pub mod dictionary;
pub mod error;
pub mod run_loop;
pub mod settings;
pub mod token;
pub mod trace;
pub mod writer;


pub use broker::{AuthorityEndpoints, SystemBrowserBroker, UrlOpener};
pub use dictionary::{
    DictionaryParser, DuplicateKeys, dictionary_from_config, dictionary_from_file_handle,
    get_ignore_case, read_dictionary, write_dictionary,
};
pub use error::HelperError;
pub use run_loop::{AppRunLoop, RunHandle, StopHandle};
pub use settings::{Settings, TraceTarget};
pub use token::{AccessToken, AuthBroker, TokenRequest, TokenRequester};
pub use trace::Logger;
pub use writer::{FileWriter, LogWriter, MemoryWriter, StandardErrorWriter};
