//! deskapp-tui - Terminal front end of the deskapp panel framework
//!
//! Drives the headless pieces of `deskapp-core` from a single-threaded
//! dispatch loop and paints them with ratatui.
//!
//! # Architecture
//!
//! - **Surface**: owns the terminal and the input source, text input mode
//! - **Compositor**: z-ordered panels blitted into the frame buffer
//! - **Module**: the contract pluggable screens implement
//! - **Chrome**: header, footer, menu, message log and default panels
//! - **App**: the dispatch loop tying it all together
//! - **Modules**: the demo screens shipped with the binary

pub mod app;
pub mod chrome;
pub mod compositor;
pub mod module;
pub mod modules;
pub mod surface;
pub mod theme;

pub use app::{App, FrameReport, Outcome};
pub use compositor::{Compositor, Panel, PanelId};
pub use module::{
    Capabilities, Context, Host, KeyAction, KeyBinder, Module, ModuleArena, ModuleHandle, Render,
    Subscriber, ViewState,
};
pub use surface::{Input, InputSource, ScriptedInput, Surface};
