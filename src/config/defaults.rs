//! Default configuration constants used across the client.

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Default REST request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default delay before reconnecting a dropped event stream.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 5000;

/// Default reconnect backoff factor (1.0 = fixed delay).
pub const DEFAULT_BACKOFF_FACTOR: f64 = 1.0;

/// Default reconnect backoff ceiling.
pub const DEFAULT_RECONNECT_MAX_MS: u64 = 60_000;

/// Default time after which a chat send stops showing as in flight.
pub const DEFAULT_SENDING_FAILSAFE_MS: u64 = 5000;

/// Default toast display time.
pub const DEFAULT_TOAST_DURATION_MS: u64 = 3000;

/// Default log level for the `agentdash` target.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Config file names searched in the working directory, in order.
pub const CONFIG_FILE_NAMES: [&str; 5] = [
    "agentdash.json",
    "agentdash.json5",
    "agentdash.yaml",
    "agentdash.yml",
    "agentdash.toml",
];
