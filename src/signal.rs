//! Process-wide shutdown flag, set from a SIGTERM/SIGINT handler and
//! polled by `ConnectionSupervisor`'s loop (§5: "shutdown is delivered
//! by SIGTERM/SIGINT handlers that flush the current page and exit").
//! The `AtomicBool` behind a `once_cell::sync::Lazy` mirrors
//! `monitoring.rs`'s `GLOBAL_MONITORING` singleton idiom, the one part
//! of the process that is genuinely global rather than per-session.

use std::sync::atomic::{AtomicBool, Ordering};
use once_cell::sync::Lazy;

static SHUTDOWN_REQUESTED: Lazy<AtomicBool> = Lazy::new(|| AtomicBool::new(false));

/// Install SIGTERM/SIGINT handlers that set the shutdown flag. SIGPIPE
/// is handled separately (ignored outright, not latched) since a
/// broken printer pipe is recovered rather than treated as shutdown.
#[cfg(unix)]
pub fn install() {
    unsafe {
        libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
        libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub fn install() {}

#[cfg(unix)]
extern "C" fn handle_signal(_sig: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Checked once per poll iteration by the supervisor loop.
pub fn shutdown_requested() -> bool {
    SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unset() {
        assert!(!shutdown_requested());
    }
}
