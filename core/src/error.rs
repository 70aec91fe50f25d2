//! Top-level error type
//!
//! Most failures in a running application are contained where they happen
//! and end up in the message log. `DeskError` names them so they can be
//! logged uniformly, and carries the few that are fatal (terminal setup,
//! bad configuration) out of the application.

use thiserror::Error;

use crate::config::ConfigError;
use crate::keymap::KeymapError;

/// Errors surfaced by the framework
#[derive(Debug, Error)]
pub enum DeskError {
    /// The terminal could not be put into UI mode (no TTY, raw mode refused)
    #[error("failed to initialize the terminal: {0}")]
    RenderSurfaceInit(#[source] std::io::Error),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Terminal or filesystem I/O failed mid-run
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A key had no handler for the current module
    #[error(transparent)]
    Keymap(#[from] KeymapError),

    /// A keybinding handler or module hook returned an error
    #[error("{handler} | {error}")]
    HandlerRaised {
        /// Binding or hook name
        handler: String,
        /// Rendered error chain
        error: String,
    },

    /// A background worker failed
    #[error("worker {worker} failed: {error}")]
    Worker {
        /// Worker name
        worker: String,
        /// Rendered error
        error: String,
    },
}

impl DeskError {
    /// Wrap a handler failure, keeping the whole `anyhow` chain
    pub fn handler_raised(handler: impl Into<String>, error: &anyhow::Error) -> Self {
        Self::HandlerRaised {
            handler: handler.into(),
            error: format!("{error:#}"),
        }
    }

    /// Whether the application must stop because of this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RenderSurfaceInit(_) | Self::Config(_))
    }
}
