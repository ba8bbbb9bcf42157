use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use ::time::{format_description::well_known, OffsetDateTime};
use async_trait::async_trait;
use tokio::process::Command;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::RunError;
use crate::options::{command_args, preview_for, OptionSet};
use crate::parse::parse_nmap_output;
use crate::types::ScanResult;

/// Something that can run the scanner binary and hand back its combined output.
#[async_trait]
pub trait ScanExecutor: Send + Sync {
    /// Whether the scanner binary can be found.
    fn available(&self) -> bool;

    /// Run the scanner with `args`, returning stdout followed by stderr.
    async fn execute(&self, args: &[String], cancel: &CancellationToken)
        -> Result<String, RunError>;
}

/// Runs a real `nmap` child process.
#[derive(Debug, Clone)]
pub struct NmapExecutor {
    bin: PathBuf,
    timeout: Duration,
}

impl NmapExecutor {
    pub fn new(bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ScanExecutor for NmapExecutor {
    fn available(&self) -> bool {
        binary_available(&self.bin)
    }

    async fn execute(
        &self,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<String, RunError> {
        if !self.available() {
            return Err(RunError::NotInstalled);
        }

        let child = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => RunError::NotInstalled,
                _ => RunError::Io(e),
            })?;
        debug!(pid = ?child.id(), "scanner started");

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            res = time::timeout(self.timeout, child.wait_with_output()) => match res {
                Ok(out) => out?,
                Err(_) => {
                    warn!(timeout_secs = self.timeout.as_secs(), "scan timed out");
                    return Err(RunError::TimedOut(self.timeout));
                }
            },
            _ = cancel.cancelled() => return Err(RunError::Cancelled),
        };

        if !output.status.success() {
            debug!(status = %output.status, "scanner exited with non-zero status");
        }
        Ok(combine_output(&output.stdout, &output.stderr))
    }
}

/// Run one scan of `target` with `options` and parse the result.
pub async fn run_scan(
    executor: &dyn ScanExecutor,
    options: &OptionSet,
    target: &str,
    cancel: &CancellationToken,
) -> Result<ScanResult, RunError> {
    let args = command_args(options, target);
    let command = preview_for(options, target);
    let started_at = now_rfc3339();
    info!(%command, "starting scan");

    let output = executor.execute(&args, cancel).await?;
    let mut result = parse_nmap_output(&output, target);
    result.command = command;
    result.started_at = Some(started_at);
    info!(ports = result.ports.len(), "scan finished");
    Ok(result)
}

/// Look for `bin` on `PATH`, or check it directly when it is a path.
pub fn binary_available(bin: &Path) -> bool {
    if bin.components().count() > 1 {
        return bin.is_file();
    }
    env::var_os("PATH")
        .map(|paths| env::split_paths(&paths).any(|dir| dir.join(bin).is_file()))
        .unwrap_or(false)
}

fn combine_output(stdout: &[u8], stderr: &[u8]) -> String {
    let mut out = String::from_utf8_lossy(stdout).into_owned();
    if !stderr.is_empty() {
        out.push('\n');
        out.push_str(&String::from_utf8_lossy(stderr));
    }
    out
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}
