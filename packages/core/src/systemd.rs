//! Systemd control.
//!
//! After a new fstab entry is appended, systemd has to regenerate its mount
//! and automount units before the entry takes effect.

use std::process::Command;

use tracing::debug;

use crate::error::{Error, IoResultExt, Result};

/// Runs `systemctl daemon-reload`.
pub fn daemon_reload() -> Result<()> {
    systemctl(&["daemon-reload"])
}

fn systemctl(args: &[&str]) -> Result<()> {
    let command = format!("systemctl {}", args.join(" "));
    debug!(%command, "running");

    let output = Command::new("systemctl")
        .args(args)
        .output()
        .command_context(&command)?;

    if output.status.success() {
        return Ok(());
    }
    Err(Error::Systemd {
        message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}
