//! Service identity and on-disk layout.
//!
//! Every function here converges: running it against a host that is already
//! in the target state changes nothing and is not an error.

use anyhow::{bail, Context, Result};
use host_provision::{Cmd, Host};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use tracing::{info, warn};

use crate::config::ServiceConfig;
use crate::settings::{Layout, ServiceIdentity, Settings, CONFIG_MODE, DIR_MODE};

const NOLOGIN: &str = "/usr/sbin/nologin";

/// `getent <db> <name>` — true when the entry exists.
fn getent(host: &dyn Host, db: &str, name: &str) -> Result<bool> {
    let out = host
        .run(&Cmd::new("getent").args([db, name]))
        .with_context(|| format!("could not look up {} {}", db, name))?;
    Ok(out.success())
}

/// Run `cmd`, failing with its stderr when it exits non-zero.
fn run_ok(host: &dyn Host, cmd: Cmd) -> Result<()> {
    let out = host.run(&cmd).with_context(|| format!("could not run `{}`", cmd))?;
    if !out.success() {
        bail!("`{}` failed: {}", cmd, out.failure_reason());
    }
    Ok(())
}

/// Create the system group and user if they do not exist yet.
pub fn ensure_identity(host: &dyn Host, id: &ServiceIdentity) -> Result<()> {
    if getent(host, "group", &id.group)? {
        info!("Reusing existing group {}", id.group);
    } else {
        run_ok(host, Cmd::new("groupadd").args(["--system", id.group.as_str()]))?;
        info!("Created system group {}", id.group);
    }

    if getent(host, "passwd", &id.user)? {
        info!("Reusing existing user {}", id.user);
        return Ok(());
    }
    run_ok(
        host,
        Cmd::new("useradd").args([
            "--system",
            "--no-create-home",
            "--home-dir",
            "/nonexistent",
            "--shell",
            NOLOGIN,
            "--gid",
            id.group.as_str(),
            id.user.as_str(),
        ]),
    )?;
    info!("Created system user {} (no login shell, no home)", id.user);
    Ok(())
}

pub fn ensure_directories(layout: &Layout) -> Result<()> {
    for dir in layout.owned_dirs() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    Ok(())
}

/// Copy the built jar into the install directory, replacing any older one.
pub fn place_artifact(layout: &Layout, artifact: &Path) -> Result<()> {
    let dest = layout.artifact_path();
    fs::copy(artifact, &dest)
        .with_context(|| format!("copying {} to {}", artifact.display(), dest.display()))?;
    info!("Installed {}", dest.display());
    Ok(())
}

/// Write the generated config unless one already exists. Returns `true`
/// when the file was written.
pub fn write_config(layout: &Layout, settings: &Settings) -> Result<bool> {
    let path = layout.config_path();
    if path.exists() && !settings.regenerate_config {
        if let Err(e) = ServiceConfig::load(&path) {
            warn!("Existing config does not parse, leaving it untouched: {:#}", e);
        }
        info!("Keeping existing {} (pass --regenerate-config to overwrite)", path.display());
        return Ok(false);
    }

    let text = ServiceConfig::generate(settings).to_yaml()?;
    fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    info!(
        "Wrote {} (listen {}:{}, upstream 127.0.0.1:{})",
        path.display(),
        settings.listen_host,
        settings.listen_port,
        settings.upstream_port
    );
    Ok(true)
}

/// Copy the unit template shipped with the source tree, verbatim.
pub fn place_unit(layout: &Layout, template: &Path) -> Result<()> {
    fs::create_dir_all(&layout.unit_dir)
        .with_context(|| format!("creating {}", layout.unit_dir.display()))?;
    let dest = layout.unit_path();
    fs::copy(template, &dest)
        .with_context(|| format!("copying {} to {}", template.display(), dest.display()))?;
    info!("Installed unit {}", dest.display());
    Ok(())
}

/// Hand the three directories to the service identity, then tighten modes.
/// Ownership goes first so the final modes hold whatever the prior state.
pub fn converge_ownership(host: &dyn Host, layout: &Layout, id: &ServiceIdentity) -> Result<()> {
    let owner = format!("{}:{}", id.user, id.group);
    let mut chown = Cmd::new("chown").args(["-R", owner.as_str()]);
    for dir in layout.owned_dirs() {
        chown = chown.arg_path(dir);
    }
    run_ok(host, chown)?;

    for dir in layout.owned_dirs() {
        set_mode(dir, DIR_MODE)?;
    }
    let config = layout.config_path();
    if config.exists() {
        set_mode(&config, CONFIG_MODE)?;
    }
    Ok(())
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .with_context(|| format!("chmod {:o} {}", mode, path.display()))
}
