pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const BINARY_NAME: &str = env!("CARGO_BIN_NAME");

// Input keys, matched case-insensitively
pub const KEY_AUTHORITY: &str = "authority";
pub const KEY_CLIENT_ID: &str = "clientId";
pub const KEY_RESOURCE: &str = "resource";
pub const KEY_REDIRECT_URI: &str = "redirectUri";

// Output keys
pub const KEY_ACCESS_TOKEN: &str = "accessToken";
pub const KEY_ERROR: &str = "error";
pub const KEY_ERROR_CODE: &str = "errorCode";
pub const KEY_ERROR_DOMAIN: &str = "errorDomain";

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_FATAL: u8 = 3;
