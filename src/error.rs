//! Error types shared by the scan client and the scan service.

use std::time::Duration;

use thiserror::Error;

/// Message shown for any transport-level failure. The cause is logged, never shown.
pub const CONNECTIVITY_MESSAGE: &str =
    "Failed to connect to the server. Please ensure the backend is running.";

/// Why a client-side scan invocation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The backend answered `success: false`.
    #[error("{0}")]
    Application(String),

    /// The round trip itself failed or returned something unusable.
    #[error("transport error: {0}")]
    Transport(String),
}

impl ScanError {
    /// Text to put in front of the user.
    pub fn display_message(&self) -> &str {
        match self {
            ScanError::Application(msg) => msg,
            ScanError::Transport(_) => CONNECTIVITY_MESSAGE,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ScanError::Transport(_))
    }
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        ScanError::Transport(e.to_string())
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        ScanError::Transport(format!("malformed response: {e}"))
    }
}

/// Failure running the scanner binary on the service side.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Nmap is not installed on this system. Please install nmap first.")]
    NotInstalled,

    #[error("Scan timed out after {}", human_duration(.0))]
    TimedOut(Duration),

    #[error("Scan cancelled: server shutting down")]
    Cancelled,

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

fn human_duration(d: &Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 && secs % 60 == 0 {
        let mins = secs / 60;
        format!("{mins} minute{}", if mins == 1 { "" } else { "s" })
    } else {
        format!("{secs} second{}", if secs == 1 { "" } else { "s" })
    }
}
