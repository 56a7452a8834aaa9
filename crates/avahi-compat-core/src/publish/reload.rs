//! Telling the resolver daemon that `.dnssd` files changed.
//!
//! The daemon rereads its DNS-SD directories on the `ReloadDNSSD` bus call.
//! [`BusctlReload`] issues that call through the `busctl` binary;
//! [`NoReload`] skips it for setups that reload by other means.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use avahi_compat_config::{PublishConfig, ReloadMode};

use crate::BoxFuture;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReloadError {
    #[error("failed to run {bin}: {reason}")]
    Spawn { bin: String, reason: String },

    #[error("reload call exited with {status}: {stderr}")]
    Rejected { status: String, stderr: String },

    #[error("reload call timed out after {0:?}")]
    Timeout(Duration),
}

/// Asks the daemon to reread its `.dnssd` directories.
pub trait ReloadSignal: Send + Sync {
    fn name(&self) -> &str;

    fn reload(&self) -> BoxFuture<'_, Result<(), ReloadError>>;
}

/// Build the reload signal selected by the publish configuration.
pub fn from_config(config: &PublishConfig) -> std::sync::Arc<dyn ReloadSignal> {
    match config.reload {
        ReloadMode::Busctl => std::sync::Arc::new(BusctlReload::new(
            config.busctl_path.clone(),
            config.reload_timeout(),
        )),
        ReloadMode::None => std::sync::Arc::new(NoReload),
    }
}

/// Calls `org.freedesktop.resolve1.Manager.ReloadDNSSD` via `busctl`.
pub struct BusctlReload {
    busctl_bin: PathBuf,
    timeout: Duration,
}

impl BusctlReload {
    pub fn new(busctl_bin: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            busctl_bin: busctl_bin.into(),
            timeout,
        }
    }

    fn args() -> [&'static str; 5] {
        [
            "call",
            "org.freedesktop.resolve1",
            "/org/freedesktop/resolve1",
            "org.freedesktop.resolve1.Manager",
            "ReloadDNSSD",
        ]
    }
}

impl Default for BusctlReload {
    fn default() -> Self {
        Self::new("busctl", Duration::from_secs(5))
    }
}

impl ReloadSignal for BusctlReload {
    fn name(&self) -> &str {
        "busctl"
    }

    fn reload(&self) -> BoxFuture<'_, Result<(), ReloadError>> {
        Box::pin(async move {
            let bin = self.busctl_bin.display().to_string();
            let child = tokio::process::Command::new(&self.busctl_bin)
                .args(Self::args())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| ReloadError::Spawn {
                    bin: bin.clone(),
                    reason: e.to_string(),
                })?;

            let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
                Ok(Ok(output)) => output,
                Ok(Err(e)) => {
                    return Err(ReloadError::Spawn {
                        bin,
                        reason: format!("wait failed: {e}"),
                    });
                }
                Err(_) => return Err(ReloadError::Timeout(self.timeout)),
            };

            if output.status.success() {
                tracing::debug!(bin = %bin, "Resolver daemon reloaded DNS-SD files");
                Ok(())
            } else {
                Err(ReloadError::Rejected {
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                })
            }
        })
    }
}

/// Never signals the daemon.
pub struct NoReload;

impl ReloadSignal for NoReload {
    fn name(&self) -> &str {
        "none"
    }

    fn reload(&self) -> BoxFuture<'_, Result<(), ReloadError>> {
        Box::pin(async {
            tracing::trace!("Reload disabled, not signalling the resolver daemon");
            Ok(())
        })
    }
}
