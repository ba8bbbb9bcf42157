use std::path::PathBuf;
use std::time::Duration;

/// Default lab target: nmap's own public test host.
pub const DEFAULT_TARGET: &str = "scanme.nmap.org";
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_NMAP_BIN: &str = "nmap";
pub const DEFAULT_UI_DIR: &str = "ui";
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(DEFAULT_SCAN_TIMEOUT_SECS);

/// Resolved settings for the scan service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind: String,
    /// The only host the service will scan.
    pub target: String,
    /// Scanner binary name or path.
    pub nmap_bin: PathBuf,
    /// Upper bound for a single scan.
    pub scan_timeout: Duration,
    /// Directory with static UI assets, served as a fallback.
    pub ui_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            target: DEFAULT_TARGET.to_string(),
            nmap_bin: PathBuf::from(DEFAULT_NMAP_BIN),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            ui_dir: PathBuf::from(DEFAULT_UI_DIR),
        }
    }
}

/// Settings for the command-line scan client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the scan service, e.g. `http://127.0.0.1:5000`.
    pub server_url: String,
    /// Optional bound on the whole round trip. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: format!("http://{DEFAULT_BIND}"),
            request_timeout: None,
        }
    }
}
