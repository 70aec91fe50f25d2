//! Terminal Restore
//!
//! Raw mode, the alternate screen and mouse capture have to be undone on
//! every exit path: normal return, early `?`, and panics. [`TerminalGuard`]
//! covers the first two by restoring on drop; [`install_panic_hook`] covers
//! the third by restoring before the default hook prints the panic.
//!
//! Termination signals are turned into a stop flag by
//! [`install_signal_handlers`]; the dispatch loop sees it on the next frame
//! and leaves through the normal shutdown path.

use std::io::{self, Write};
use std::panic;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use crossterm::cursor::{Hide, Show};
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};

/// Puts the terminal into UI mode and restores it when dropped
#[derive(Debug)]
pub struct TerminalGuard {
    restored: bool,
}

impl TerminalGuard {
    /// Enter raw mode and the alternate screen, optionally capturing the mouse
    ///
    /// If any step fails the steps already taken are undone before the error
    /// is returned.
    pub fn enter(mouse: bool) -> io::Result<Self> {
        enable_raw_mode()?;
        let mut guard = Self { restored: false };

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide).inspect_err(|_| guard.restore())?;
        if mouse {
            execute!(stdout, EnableMouseCapture).inspect_err(|_| guard.restore())?;
        }

        tracing::debug!(mouse, "terminal entered UI mode");
        Ok(guard)
    }

    /// Restore now instead of on drop
    pub fn restore(&mut self) {
        if !self.restored {
            restore_terminal();
            self.restored = true;
        }
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Best-effort restore; every step runs even if an earlier one failed
pub fn restore_terminal() {
    let mut stdout = io::stdout();
    let _ = disable_raw_mode();
    let _ = execute!(stdout, DisableMouseCapture, LeaveAlternateScreen, Show);
    let _ = stdout.flush();
}

/// Restore the terminal before the previously installed panic hook runs
///
/// Only panics on the calling (UI) thread restore. Worker panics are caught
/// by the worker loop, so they are logged instead of printed over the UI.
pub fn install_panic_hook() {
    let ui_thread = thread::current().id();
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        if thread::current().id() != ui_thread {
            tracing::error!(thread = ?thread::current().name(), %panic_info, "panic off the UI thread");
            return;
        }
        // Restore terminal before printing panic
        restore_terminal();
        original_hook(panic_info);
    }));
}

/// Raise the returned flag on SIGINT, SIGTERM and (on unix) SIGHUP
///
/// Hand the flag to `App::stop_on`.
pub fn install_signal_handlers() -> io::Result<Arc<AtomicBool>> {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};

    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(SIGINT, Arc::clone(&flag))?;
    signal_hook::flag::register(SIGTERM, Arc::clone(&flag))?;
    #[cfg(unix)]
    signal_hook::flag::register(signal_hook::consts::signal::SIGHUP, Arc::clone(&flag))?;
    tracing::debug!("signal handlers installed");
    Ok(flag)
}
