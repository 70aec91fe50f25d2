//! Render Surface
//!
//! The one object that touches the terminal. It owns the ratatui
//! [`Terminal`] and the input source, and layers text input mode on top of
//! raw keystrokes.
//!
//! ```text
//!   InputSource ──poll()──► Surface ──► Input::{None, Key, Text, Mouse, Resize}
//!                              │  (`/` toggles LineBuffer; keys feed it)
//!   Compositor ──draw()────────┘──► Terminal<B>
//! ```
//!
//! A `Surface` is `!Send`: it cannot be moved to a worker thread, so only
//! the thread that created it can draw.

mod guard;
mod input;
mod splash;

use std::io;
use std::marker::PhantomData;

use deskapp_core::frame::FramePacer;
use deskapp_core::keycodes::Keycode;
use deskapp_core::DeskError;
use ratatui::backend::Backend;
use ratatui::Terminal;

use crate::compositor::Compositor;

pub use guard::{install_panic_hook, install_signal_handlers, restore_terminal, TerminalGuard};
pub use input::{
    key_to_keycode, mouse_to_click, translate, CrosstermInput, Input, InputSource, LineBuffer,
    LineOutcome, ScriptedInput,
};
pub use splash::{render_splash, SPLASH_FRAMES};

/// Key that switches into text input mode
pub const TEXT_INPUT_KEY: Keycode = Keycode::char('/');

/// Terminal plus input, bound to the thread that created it
pub struct Surface<B: Backend> {
    terminal: Terminal<B>,
    input: Box<dyn InputSource>,
    line: LineBuffer,
    text_key: Keycode,
    _not_send: PhantomData<*const ()>,
}

impl<B: Backend> Surface<B> {
    /// Wrap a backend and an input source
    pub fn new(backend: B, input: Box<dyn InputSource>) -> Result<Self, DeskError> {
        let terminal = Terminal::new(backend).map_err(DeskError::RenderSurfaceInit)?;
        Ok(Self {
            terminal,
            input,
            line: LineBuffer::default(),
            text_key: TEXT_INPUT_KEY,
            _not_send: PhantomData,
        })
    }

    /// Use a different key to enter text input mode
    pub fn set_text_key(&mut self, key: Keycode) {
        self.text_key = key;
    }

    /// Poll one input without blocking
    ///
    /// While text input mode is active every key goes to the line buffer
    /// and this returns [`Input::None`] until the line is accepted.
    pub fn poll(&mut self) -> io::Result<Input> {
        let input = self.input.poll()?;
        let Input::Key(key) = input else {
            return Ok(input);
        };

        if self.line.is_active() {
            return Ok(match self.line.feed(key) {
                LineOutcome::Accepted(text) => Input::Text(text),
                LineOutcome::Pending | LineOutcome::Cancelled => Input::None,
            });
        }
        if key == self.text_key {
            self.line.activate();
            return Ok(Input::None);
        }
        Ok(Input::Key(key))
    }

    /// The text input line
    pub fn line(&self) -> &LineBuffer {
        &self.line
    }

    /// Current size as (width, height)
    pub fn size(&self) -> io::Result<(u16, u16)> {
        let size = self.terminal.size()?;
        Ok((size.width, size.height))
    }

    /// Re-read the terminal size after a resize signal
    pub fn refit(&mut self) -> io::Result<()> {
        self.terminal.autoresize()
    }

    /// Paint the composited panels
    pub fn draw(&mut self, compositor: &Compositor) -> io::Result<()> {
        self.terminal.draw(|frame| {
            compositor.composite_into(frame.buffer_mut());
        })?;
        Ok(())
    }

    /// Play the splash animation; any key skips it
    pub fn splash(&mut self, title: &str, pacer: &FramePacer) -> io::Result<()> {
        for step in 0..=SPLASH_FRAMES {
            let frame_start = std::time::Instant::now();
            self.terminal.draw(|frame| {
                let area = frame.area();
                render_splash(frame.buffer_mut(), area, title, step, SPLASH_FRAMES);
            })?;
            if matches!(self.input.poll()?, Input::Key(_)) {
                break;
            }
            pacer.pace(frame_start);
        }
        self.terminal.clear()
    }

    /// The underlying terminal
    pub fn terminal(&self) -> &Terminal<B> {
        &self.terminal
    }

    /// Mutable access to the underlying terminal
    pub fn terminal_mut(&mut self) -> &mut Terminal<B> {
        &mut self.terminal
    }
}
