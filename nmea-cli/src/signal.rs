//! SIGINT/SIGTERM handling
//!
//! The handler only sets a process-wide flag. A watcher thread polls the
//! flag and fires the shutdown trigger so that a pacing sleep in progress
//! wakes immediately.

use nmea_io::ShutdownTrigger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

/// How often the watcher checks the flag
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Set by the signal handler; never cleared outside tests.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Install the handler for SIGINT and SIGTERM
pub fn install_handlers() {
    // signal() with a handler that only stores an atomic is async-signal-safe
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as *const () as libc::sighandler_t);
    }
}

/// Whether a termination signal has been received
pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

/// Request shutdown as if a signal had arrived
#[cfg(test)]
fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

#[cfg(test)]
fn clear_shutdown() {
    SHUTDOWN.store(false, Ordering::Relaxed);
}

/// Spawn the thread that forwards the flag to `trigger`
///
/// The thread exits once it has fired the trigger, or when the trigger was
/// fired by someone else.
pub fn spawn_watcher(trigger: ShutdownTrigger) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("shutdown-watcher".to_string())
        .spawn(move || {
            while !trigger.is_triggered() {
                if shutdown_requested() {
                    info!("Shutdown requested");
                    trigger.trigger();
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }
        })
}
