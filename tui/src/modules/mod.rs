//! Demo modules shipped with the `deskapp` binary
//!
//! - **About**: a wrapped ratatui paragraph, info strip
//! - **Fire**: animation drawn cell by cell, module keys
//! - **Echo**: text input and mouse routing
//! - **Clock**: a background worker feeding the bus, right sidebar

mod about;
mod clock;
mod echo;
mod fire;

pub use about::About;
pub use clock::{Clock, CLOCK_TICK};
pub use echo::{Echo, ECHO_TEXT};
pub use fire::Fire;
