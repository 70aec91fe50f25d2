//! deskapp-core - Headless core of the deskapp panel framework
//!
//! Everything here is terminal-agnostic: no crossterm, no ratatui. The
//! `deskapp-tui` crate drives these pieces from its dispatch loop.
//!
//! # Architecture
//!
//! ```text
//!   worker threads              main thread
//!  ┌────────────┐ emit()   ┌───────────────────────────────────────┐
//!  │  Worker    │────────► │ EventBus ──process_events()──► listeners
//!  │  Worker    │ Emitter  │                                       │
//!  └────────────┘          │ Keymap ──resolve(key, owner)──► handler
//!                          │ LayoutEngine ──refresh(key)──► LayoutPlan
//!                          │ FramePacer ──pace()                   │
//!                          │ SharedState (messages + values)       │
//!                          └───────────────────────────────────────┘
//! ```
//!
//! - **keycodes**: curses-compatible key and mouse constants
//! - **keymap**: (owner, key) → handler registry with explicit unregistration
//! - **layout**: split-ratio driven panel geometry
//! - **bus**: bounded event queue drained on the main thread
//! - **worker**: background threads that talk only through the bus
//! - **state**: message log and shared key/value namespace
//! - **frame**: frame budget pacing
//! - **config**: TOML/env configuration

pub mod bus;
pub mod config;
pub mod error;
pub mod frame;
pub mod keycodes;
pub mod keymap;
pub mod layout;
pub mod state;
pub mod worker;

pub use bus::{BusMetrics, Emitter, Event, EventBus, ListenerId};
pub use config::{load_config, ConfigError, ConfigSource, DeskConfig};
pub use error::DeskError;
pub use frame::{FramePacer, FrameStats};
pub use keycodes::{Keycode, MouseClick};
pub use keymap::{Binding, BindingHelp, BindingId, Keymap, KeymapError, OwnerId};
pub use layout::{
    LayoutEngine, LayoutError, LayoutKey, LayoutPlan, PanelKind, PanelVisibility, Region,
    SplitRatios,
};
pub use state::{LogEntry, LogLevel, MessageLog, SharedState};
pub use worker::{StopOutcome, Worker, WorkerContext, WorkerSet};
