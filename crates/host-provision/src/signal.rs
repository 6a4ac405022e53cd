//! SIGINT / SIGTERM handling.
//!
//! The handler only records that a signal arrived. [`SystemHost`] checks the
//! flag around every external command and turns it into an `Interrupted`
//! error, so the run unwinds normally and the build workspace guard is
//! dropped on the way out.
//!
//! [`SystemHost`]: crate::SystemHost

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the flag-setting handler for SIGINT and SIGTERM.
pub fn install_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as *const () as libc::sighandler_t);
    }
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// `Err(Interrupted)` once a signal has been received.
pub fn check() -> io::Result<()> {
    if interrupted() {
        Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted by signal"))
    } else {
        Ok(())
    }
}
