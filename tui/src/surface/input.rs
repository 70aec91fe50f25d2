//! Input Polling
//!
//! Input arrives through an [`InputSource`], which must never block: when
//! nothing is ready it returns [`Input::None`] immediately. The crossterm
//! source translates terminal events into the curses keycodes the keymap is
//! keyed on; the scripted source replays a fixed sequence for tests.

use std::collections::VecDeque;
use std::io;
use std::time::Duration;

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use deskapp_core::keycodes::{mouse, Keycode, MouseClick};

/// One polled input
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    /// Nothing was ready
    None,
    /// A keystroke
    Key(Keycode),
    /// A line accepted from text input mode
    Text(String),
    /// A mouse click
    Mouse(MouseClick),
    /// The terminal was resized to (width, height)
    Resize(u16, u16),
}

impl Input {
    /// Short name of the variant, for logs and frame reports
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Key(_) => "key",
            Self::Text(_) => "text",
            Self::Mouse(_) => "mouse",
            Self::Resize(..) => "resize",
        }
    }
}

/// Non-blocking source of input
pub trait InputSource {
    /// Return the next input, or [`Input::None`] if nothing is ready
    fn poll(&mut self) -> io::Result<Input>;
}

// ============================================================================
// Crossterm
// ============================================================================

/// Reads from the real terminal through crossterm
#[derive(Debug, Default)]
pub struct CrosstermInput;

impl CrosstermInput {
    /// Create the source
    pub fn new() -> Self {
        Self
    }
}

impl InputSource for CrosstermInput {
    fn poll(&mut self) -> io::Result<Input> {
        if !event::poll(Duration::ZERO)? {
            return Ok(Input::None);
        }
        Ok(translate(event::read()?))
    }
}

/// Map a crossterm event to an [`Input`]
pub fn translate(event: Event) -> Input {
    match event {
        // Only presses; release and repeat events are not keystrokes
        Event::Key(key) if key.kind == KeyEventKind::Press => {
            key_to_keycode(key).map_or(Input::None, Input::Key)
        }
        Event::Mouse(m) => mouse_to_click(m).map_or(Input::None, Input::Mouse),
        Event::Resize(w, h) => Input::Resize(w, h),
        _ => Input::None,
    }
}

/// Curses keycode for a key event
pub fn key_to_keycode(key: KeyEvent) -> Option<Keycode> {
    let code = match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) && c.is_ascii_alphabetic() => {
            // ^A..^Z arrive as 1..26
            Keycode((c.to_ascii_lowercase() as i32) & 0x1f)
        }
        KeyCode::Char(c) => Keycode::char(c),
        KeyCode::Enter => Keycode::ENTER,
        KeyCode::Tab => Keycode::TAB,
        KeyCode::BackTab => Keycode::BACKTAB,
        KeyCode::Backspace => Keycode::BACKSPACE,
        KeyCode::Esc => Keycode::ESC,
        KeyCode::Up => Keycode::UP,
        KeyCode::Down => Keycode::DOWN,
        KeyCode::Left => Keycode::LEFT,
        KeyCode::Right => Keycode::RIGHT,
        KeyCode::Home => Keycode::HOME,
        KeyCode::End => Keycode::END,
        KeyCode::PageUp => Keycode::PAGE_UP,
        KeyCode::PageDown => Keycode::PAGE_DOWN,
        KeyCode::Delete => Keycode::DELETE,
        KeyCode::Insert => Keycode::INSERT,
        KeyCode::F(n) if n < 64 => Keycode::f(n),
        _ => return None,
    };
    Some(code)
}

/// ncurses button mask for a mouse event; moves and drags are ignored
pub fn mouse_to_click(m: MouseEvent) -> Option<MouseClick> {
    let button = match m.kind {
        MouseEventKind::Down(b) => match b {
            MouseButton::Left => mouse::BUTTON1_PRESSED,
            MouseButton::Middle => mouse::BUTTON2_PRESSED,
            MouseButton::Right => mouse::BUTTON3_PRESSED,
        },
        MouseEventKind::Up(b) => match b {
            MouseButton::Left => mouse::BUTTON1_RELEASED,
            MouseButton::Middle => mouse::BUTTON2_RELEASED,
            MouseButton::Right => mouse::BUTTON3_RELEASED,
        },
        MouseEventKind::ScrollUp => mouse::BUTTON4_PRESSED,
        MouseEventKind::ScrollDown => mouse::BUTTON5_PRESSED,
        _ => return None,
    };
    Some(MouseClick::new(m.column, m.row, button))
}

// ============================================================================
// Scripted
// ============================================================================

/// Replays a fixed list of inputs, then reports nothing forever
#[derive(Debug, Default)]
pub struct ScriptedInput {
    queue: VecDeque<Input>,
}

impl ScriptedInput {
    /// Source that yields `inputs` in order
    pub fn new(inputs: impl IntoIterator<Item = Input>) -> Self {
        Self {
            queue: inputs.into_iter().collect(),
        }
    }

    /// Source typing each character of `text` as a key
    pub fn typing(text: &str) -> Self {
        Self::new(text.chars().map(|c| Input::Key(Keycode::char(c))))
    }

    /// Append an input
    pub fn push(&mut self, input: Input) {
        self.queue.push_back(input);
    }

    /// Inputs not replayed yet
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> io::Result<Input> {
        Ok(self.queue.pop_front().unwrap_or(Input::None))
    }
}

// ============================================================================
// Line Buffer
// ============================================================================

/// Result of feeding a key to an active [`LineBuffer`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineOutcome {
    /// Still editing
    Pending,
    /// ENTER pressed; the accepted line
    Accepted(String),
    /// ESC pressed; input discarded
    Cancelled,
}

/// Line-buffered text input mode
#[derive(Clone, Debug, Default)]
pub struct LineBuffer {
    text: String,
    active: bool,
}

impl LineBuffer {
    /// Enter text input mode with an empty line
    pub fn activate(&mut self) {
        self.text.clear();
        self.active = true;
    }

    /// Whether text input mode is on
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The line typed so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Feed one key while active
    pub fn feed(&mut self, key: Keycode) -> LineOutcome {
        match key {
            Keycode::ENTER | Keycode::KEY_ENTER => {
                self.active = false;
                LineOutcome::Accepted(std::mem::take(&mut self.text))
            }
            Keycode::ESC => {
                self.active = false;
                self.text.clear();
                LineOutcome::Cancelled
            }
            Keycode::BACKSPACE | Keycode::DEL => {
                self.text.pop();
                LineOutcome::Pending
            }
            other => {
                if let Some(c) = other.as_char() {
                    self.text.push(c);
                }
                LineOutcome::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventState, KeyModifiers};

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn test_keys_map_to_curses_codes() {
        let cases = [
            (KeyCode::Char('q'), Keycode(113)),
            (KeyCode::Up, Keycode(259)),
            (KeyCode::PageDown, Keycode(338)),
            (KeyCode::BackTab, Keycode(353)),
            (KeyCode::F(5), Keycode(269)),
            (KeyCode::Enter, Keycode(10)),
        ];
        for (code, expected) in cases {
            assert_eq!(translate(press(code, KeyModifiers::NONE)), Input::Key(expected));
        }
        assert_eq!(
            translate(press(KeyCode::Char('x'), KeyModifiers::CONTROL)),
            Input::Key(Keycode(24))
        );
    }

    #[test]
    fn test_release_is_ignored() {
        let event = Event::Key(KeyEvent {
            code: KeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        });
        assert_eq!(translate(event), Input::None);
    }

    #[test]
    fn test_mouse_masks() {
        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 7,
            row: 3,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(
            translate(Event::Mouse(click)),
            Input::Mouse(MouseClick::new(7, 3, mouse::BUTTON1_PRESSED))
        );

        let wheel = MouseEvent {
            kind: MouseEventKind::ScrollDown,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(mouse_to_click(wheel).map(|c| c.button), Some(0x20_0000));

        let moved = MouseEvent {
            kind: MouseEventKind::Moved,
            column: 1,
            row: 1,
            modifiers: KeyModifiers::NONE,
        };
        assert_eq!(mouse_to_click(moved), None);
    }

    #[test]
    fn test_resize() {
        assert_eq!(translate(Event::Resize(100, 30)), Input::Resize(100, 30));
    }

    #[test]
    fn test_line_buffer_editing() {
        let mut line = LineBuffer::default();
        line.activate();
        for c in "helo".chars() {
            assert_eq!(line.feed(Keycode::char(c)), LineOutcome::Pending);
        }
        line.feed(Keycode::BACKSPACE);
        line.feed(Keycode::char('l'));
        line.feed(Keycode::char('o'));
        assert_eq!(line.text(), "hello");
        assert_eq!(line.feed(Keycode::ENTER), LineOutcome::Accepted("hello".to_string()));
        assert!(!line.is_active());
    }

    #[test]
    fn test_line_buffer_cancel() {
        let mut line = LineBuffer::default();
        line.activate();
        line.feed(Keycode::char('x'));
        assert_eq!(line.feed(Keycode::ESC), LineOutcome::Cancelled);
        assert_eq!(line.text(), "");
        assert!(!line.is_active());
    }

    #[test]
    fn test_scripted_runs_dry() {
        let mut source = ScriptedInput::typing("ab");
        assert_eq!(source.poll().unwrap(), Input::Key(Keycode::char('a')));
        assert_eq!(source.poll().unwrap(), Input::Key(Keycode::char('b')));
        assert_eq!(source.poll().unwrap(), Input::None);
    }
}
