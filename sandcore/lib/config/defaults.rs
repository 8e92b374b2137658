use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Default port for the HTTP server
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// How long a sandbox lives when the caller gives no usable expiration: seven days.
pub const DEFAULT_EXPIRATION_SECS: u64 = 7 * 24 * 60 * 60;

/// The page size used when a listing is requested without a usable limit.
pub const DEFAULT_LIST_LIMIT: usize = 10;

/// How long the simulated provisioning backend takes per call.
pub const DEFAULT_PROVISION_DELAY: Duration = Duration::from_secs(30);

/// The config filename looked up in the sandcore home directory.
pub const DEFAULT_CONFIG_FILENAME: &str = "sandcore.toml";
