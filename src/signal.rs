//! Unix signal handling (SIGINT).
//!
//! We let the first SIGINT reach child processes, which ought to fail their
//! actions; the run then drains and still saves the status store.  A second
//! SIGINT kills us with the default action.

#[cfg(unix)]
fn sigint_action(handler: libc::sighandler_t) {
    // Safety: registering a signal handler is libc unsafe code.
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = handler;
        libc::sigaction(libc::SIGINT, &sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigint_handler(_sig: libc::c_int) {
    sigint_action(libc::SIG_DFL);
}

#[cfg(unix)]
pub fn register_sigint() {
    sigint_action(sigint_handler as libc::sighandler_t);
}

#[cfg(not(unix))]
pub fn register_sigint() {}
