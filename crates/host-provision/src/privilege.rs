//! Root privilege check.

use crate::error::{ProvisionError, Result};

pub fn effective_uid() -> u32 {
    unsafe { libc::geteuid() }
}

/// Fails with [`ProvisionError::Privilege`] unless the effective uid is 0.
pub fn require_root() -> Result<()> {
    check_uid(effective_uid())
}

fn check_uid(euid: u32) -> Result<()> {
    if euid == 0 {
        Ok(())
    } else {
        Err(ProvisionError::Privilege { euid })
    }
}
