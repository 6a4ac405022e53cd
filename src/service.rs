//! systemd integration for socks-lb.service.
//!
//! Install registers and enables the unit but never starts it: a fresh
//! install points at a default upstream the operator has not configured yet.

use anyhow::Result;
use host_provision::{Cmd, Host, ProvisionError};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::settings::Layout;

fn systemctl(args: &[&str]) -> Cmd {
    Cmd::new("systemctl").args(args.iter().copied())
}

fn run_required(host: &dyn Host, cmd: Cmd) -> Result<()> {
    let out = host
        .run(&cmd)
        .map_err(|e| ProvisionError::io(format!("could not run `{}`", cmd), e))?;
    if !out.success() {
        return Err(ProvisionError::Service(format!("`{}` failed: {}", cmd, out.failure_reason())).into());
    }
    Ok(())
}

/// Reload the unit cache and enable the unit for the next boot.
pub fn register(host: &dyn Host, layout: &Layout) -> Result<()> {
    run_required(host, systemctl(&["daemon-reload"]))?;
    run_required(host, systemctl(&["enable", layout.unit_name.as_str()]))?;
    info!("Enabled {} (not started)", layout.unit_name);
    Ok(())
}

/// Best-effort: a step that finds nothing to do is logged and skipped.
fn best_effort(host: &dyn Host, cmd: Cmd) {
    match host.run(&cmd) {
        Ok(out) if out.success() => debug!("{}: ok", cmd),
        Ok(out) => debug!("{}: {} (ignored)", cmd, out.failure_reason()),
        Err(e) => warn!("{}: {} (ignored)", cmd, e),
    }
}

/// Stop, disable, delete the unit file, reload — in that order, so systemd
/// never tracks an active unit whose file is gone.
pub fn unregister(host: &dyn Host, layout: &Layout) {
    let unit = layout.unit_name.as_str();
    best_effort(host, systemctl(&["stop", unit]));
    best_effort(host, systemctl(&["disable", unit]));

    let path = layout.unit_path();
    remove_unit_file(&path);
    best_effort(host, systemctl(&["daemon-reload"]));
}

fn remove_unit_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => info!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} already absent", path.display())
        }
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}
