//! Keycodes
//!
//! The keycode table is the contract between the render surface (which
//! decodes terminal input) and the keymap (which resolves handlers). Values
//! are bit-exact with the curses constants so bindings written against the
//! classic curses numbering keep working.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw keycode as delivered by the render surface
///
/// Printable characters use their code point; special keys use the curses
/// `KEY_*` numbering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Keycode(pub i32);

impl Keycode {
    // ============================================
    // Control characters
    // ============================================
    /// End of text, what raw mode delivers for Ctrl-C
    pub const CTRL_C: Keycode = Keycode(3);
    /// Horizontal tab
    pub const TAB: Keycode = Keycode(9);
    /// Line feed, what terminals send for Return
    pub const ENTER: Keycode = Keycode(10);
    /// Escape
    pub const ESC: Keycode = Keycode(27);
    /// Space bar
    pub const SPACE: Keycode = Keycode(32);
    /// ASCII DEL, sent by many terminals for Backspace
    pub const DEL: Keycode = Keycode(127);

    // ============================================
    // curses KEY_* constants
    // ============================================
    /// Cursor down
    pub const DOWN: Keycode = Keycode(258);
    /// Cursor up
    pub const UP: Keycode = Keycode(259);
    /// Cursor left
    pub const LEFT: Keycode = Keycode(260);
    /// Cursor right
    pub const RIGHT: Keycode = Keycode(261);
    /// Home
    pub const HOME: Keycode = Keycode(262);
    /// Backspace
    pub const BACKSPACE: Keycode = Keycode(263);
    /// Base for function keys, `F(n) = F0 + n`
    pub const F0: Keycode = Keycode(264);
    /// Delete character
    pub const DELETE: Keycode = Keycode(330);
    /// Insert character
    pub const INSERT: Keycode = Keycode(331);
    /// Next page
    pub const PAGE_DOWN: Keycode = Keycode(338);
    /// Previous page
    pub const PAGE_UP: Keycode = Keycode(339);
    /// Keypad enter
    pub const KEY_ENTER: Keycode = Keycode(343);
    /// Shift+Tab
    pub const BACKTAB: Keycode = Keycode(353);
    /// End
    pub const END: Keycode = Keycode(360);
    /// Mouse event pending
    pub const MOUSE: Keycode = Keycode(409);
    /// Terminal resized
    pub const RESIZE: Keycode = Keycode(410);

    /// Keycode for a printable character
    #[must_use]
    pub const fn char(c: char) -> Keycode {
        Keycode(c as i32)
    }

    /// Function key `F<n>`
    #[must_use]
    pub const fn f(n: u8) -> Keycode {
        Keycode(Self::F0.0 + n as i32)
    }

    /// Raw integer value
    #[must_use]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// The printable character this code stands for, if any
    #[must_use]
    pub fn as_char(self) -> Option<char> {
        // Code points that overlap the KEY_* block are read as keys, as curses does
        let printable = (32..127).contains(&self.0)
            || (self.0 >= 0xa0 && !(Self::DOWN.0..=Self::RESIZE.0).contains(&self.0));
        if printable {
            char::from_u32(self.0 as u32)
        } else {
            None
        }
    }

    /// Whether this is a function key F0..F63
    #[must_use]
    pub fn is_function_key(self) -> bool {
        (Self::F0.0..Self::F0.0 + 64).contains(&self.0)
    }

    /// Symbolic display name ("up", "f5", "q", "space")
    #[must_use]
    pub fn name(self) -> String {
        let named = match self {
            Self::CTRL_C => Some("ctrl+c"),
            Self::TAB => Some("tab"),
            Self::ENTER | Self::KEY_ENTER => Some("enter"),
            Self::ESC => Some("esc"),
            Self::SPACE => Some("space"),
            Self::DEL | Self::BACKSPACE => Some("backspace"),
            Self::DOWN => Some("down"),
            Self::UP => Some("up"),
            Self::LEFT => Some("left"),
            Self::RIGHT => Some("right"),
            Self::HOME => Some("home"),
            Self::END => Some("end"),
            Self::DELETE => Some("delete"),
            Self::INSERT => Some("insert"),
            Self::PAGE_DOWN => Some("pagedown"),
            Self::PAGE_UP => Some("pageup"),
            Self::BACKTAB => Some("backtab"),
            Self::MOUSE => Some("mouse"),
            Self::RESIZE => Some("resize"),
            _ => None,
        };
        if let Some(name) = named {
            return name.to_string();
        }
        if self.is_function_key() {
            return format!("f{}", self.0 - Self::F0.0);
        }
        match self.as_char() {
            Some(c) => c.to_string(),
            None => format!("#{}", self.0),
        }
    }

    /// Parse a symbolic name produced by [`Keycode::name`]
    ///
    /// Single characters map to themselves, so `"Q"` and `"q"` are distinct.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Keycode> {
        let trimmed = name.trim();
        let mut chars = trimmed.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(Keycode::char(c));
        }

        let lower = trimmed.to_ascii_lowercase();
        let code = match lower.as_str() {
            "ctrl+c" | "^c" => Self::CTRL_C,
            "tab" => Self::TAB,
            "enter" | "return" => Self::ENTER,
            "esc" | "escape" => Self::ESC,
            "space" => Self::SPACE,
            "backspace" => Self::BACKSPACE,
            "down" => Self::DOWN,
            "up" => Self::UP,
            "left" => Self::LEFT,
            "right" => Self::RIGHT,
            "home" => Self::HOME,
            "end" => Self::END,
            "delete" | "del" => Self::DELETE,
            "insert" | "ins" => Self::INSERT,
            "pagedown" | "pgdn" => Self::PAGE_DOWN,
            "pageup" | "pgup" => Self::PAGE_UP,
            "backtab" => Self::BACKTAB,
            "resize" => Self::RESIZE,
            _ => {
                let n: u8 = lower.strip_prefix('f')?.parse().ok()?;
                if n >= 64 {
                    return None;
                }
                Self::f(n)
            }
        };
        Some(code)
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl From<char> for Keycode {
    fn from(c: char) -> Self {
        Keycode::char(c)
    }
}

/// Mouse button state bits, ncurses mouse-mask version 2 layout
///
/// Each button gets five bits: released, pressed, clicked, double, triple.
pub mod mouse {
    /// Button 1 released
    pub const BUTTON1_RELEASED: u32 = 0x1;
    /// Button 1 pressed
    pub const BUTTON1_PRESSED: u32 = 0x2;
    /// Button 1 clicked
    pub const BUTTON1_CLICKED: u32 = 0x4;
    /// Button 1 double clicked
    pub const BUTTON1_DOUBLE_CLICKED: u32 = 0x8;

    /// Button 2 (middle) released
    pub const BUTTON2_RELEASED: u32 = BUTTON1_RELEASED << 5;
    /// Button 2 pressed
    pub const BUTTON2_PRESSED: u32 = BUTTON1_PRESSED << 5;
    /// Button 2 clicked
    pub const BUTTON2_CLICKED: u32 = BUTTON1_CLICKED << 5;

    /// Button 3 (right) released
    pub const BUTTON3_RELEASED: u32 = BUTTON1_RELEASED << 10;
    /// Button 3 pressed
    pub const BUTTON3_PRESSED: u32 = BUTTON1_PRESSED << 10;
    /// Button 3 clicked
    pub const BUTTON3_CLICKED: u32 = BUTTON1_CLICKED << 10;

    /// Wheel up
    pub const BUTTON4_PRESSED: u32 = BUTTON1_PRESSED << 15;
    /// Wheel down
    pub const BUTTON5_PRESSED: u32 = BUTTON1_PRESSED << 20;
}

/// A decoded mouse click: cell position and button state bits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseClick {
    /// Column
    pub x: u16,
    /// Row
    pub y: u16,
    /// Button state, see [`mouse`]
    pub button: u32,
}

impl MouseClick {
    /// Create a click at a position
    #[must_use]
    pub const fn new(x: u16, y: u16, button: u32) -> Self {
        Self { x, y, button }
    }

    /// `((x, y), button)` in the tuple shape modules historically receive
    #[must_use]
    pub const fn as_tuple(&self) -> ((u16, u16), u32) {
        ((self.x, self.y), self.button)
    }
}
