//! Platform-specific module for operating system features.
//!
//! An interrupt (Ctrl-C) does not kill the process: it raises a flag that
//! the processor checks between files, so the file in flight is finished.

use std::sync::atomic::AtomicBool;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Flag raised once an interrupt was received
pub fn interrupt_flag() -> &'static AtomicBool {
    &INTERRUPTED
}

#[cfg(unix)]
extern "C" fn on_interrupt(_signal: nix::libc::c_int) {
    INTERRUPTED.store(true, std::sync::atomic::Ordering::SeqCst);
}

/// Route SIGINT to the interrupt flag.
#[cfg(unix)]
pub fn install_interrupt_handler() -> std::io::Result<()> {
    use nix::sys::signal::{SigHandler, Signal, signal};

    // SAFETY: the handler only stores to an atomic, which is async-signal-safe
    unsafe { signal(Signal::SIGINT, SigHandler::Handler(on_interrupt)) }
        .map(|_| ())
        .map_err(std::io::Error::from)
}

/// Route SIGINT to the interrupt flag.
#[cfg(not(unix))]
pub fn install_interrupt_handler() -> std::io::Result<()> {
    // default handling terminates the process
    Ok(())
}
