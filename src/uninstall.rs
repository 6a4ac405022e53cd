//! `socks-lb-installer --uninstall` — reverse everything install did.
//!
//! Each step is best-effort. Something already gone counts as success, so
//! running this on a host that was never provisioned exits cleanly.

use anyhow::{bail, Result};
use host_provision::{Cmd, Host};
use std::io::{self, Write};
use std::path::Path;

use crate::color;
use crate::service;
use crate::settings::{Layout, ServiceIdentity};

/// What a step found.
enum Outcome {
    Removed,
    Absent,
}

pub fn run(host: &dyn Host, layout: &Layout, id: &ServiceIdentity) -> Result<()> {
    println!("Uninstalling socks-lb:");

    // 1. Service first, so nothing holds the files open
    step(&format!("Stopping and unregistering {}", layout.unit_name), || {
        let present = layout.unit_path().exists();
        service::unregister(host, layout);
        Ok(if present { Outcome::Removed } else { Outcome::Absent })
    });

    // 2. Directories
    for dir in layout.owned_dirs() {
        step(&format!("Removing {}", dir.display()), || remove_dir(dir));
    }

    // 3. Identity
    step(&format!("Removing user {}", id.user), || {
        remove_entry(host, "passwd", &id.user, Cmd::new("userdel").arg(id.user.as_str()))
    });
    // userdel usually takes the matching group with it
    step(&format!("Removing group {}", id.group), || {
        remove_entry(host, "group", &id.group, Cmd::new("groupdel").arg(id.group.as_str()))
    });

    println!();
    println!("{}", color::bold_green("✓ socks-lb uninstalled."));
    Ok(())
}

fn remove_dir(dir: &Path) -> Result<Outcome> {
    if !dir.exists() {
        return Ok(Outcome::Absent);
    }
    std::fs::remove_dir_all(dir)?;
    Ok(Outcome::Removed)
}

fn remove_entry(host: &dyn Host, db: &str, name: &str, delete: Cmd) -> Result<Outcome> {
    let found = host.run(&Cmd::new("getent").args([db, name]))?;
    if !found.success() {
        return Ok(Outcome::Absent);
    }
    let out = host.run(&delete)?;
    if !out.success() {
        bail!("{}", out.failure_reason());
    }
    Ok(Outcome::Removed)
}

fn step(label: &str, f: impl FnOnce() -> Result<Outcome>) {
    print!("  {}...", label);
    io::stdout().flush().ok();
    match f() {
        Ok(Outcome::Removed) => println!(" {}", color::bold_green("done")),
        Ok(Outcome::Absent) => println!(" {}", color::dim("not present")),
        Err(e) => {
            println!(" {} ({:#})", color::yellow("skipped"), e);
            tracing::warn!("{} failed: {:#}", label, e);
        }
    }
}
