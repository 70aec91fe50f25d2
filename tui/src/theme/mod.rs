//! Theme and Colors
//!
//! The fixed palette every panel draws with. Curses programs set up a table
//! of numbered color pairs once at startup; here each pair is a named
//! [`Pair`] that resolves to a ratatui [`Style`].

use ratatui::style::{Color, Modifier, Style};

// ============================================================================
// Base Palette
// ============================================================================

/// Chrome background
pub const CHROME_BG: Color = Color::Rgb(30, 34, 42);

/// Chrome foreground
pub const CHROME_FG: Color = Color::Rgb(210, 214, 222);

/// Accent used for titles and the active menu entry
pub const ACCENT: Color = Color::Rgb(97, 175, 239);

/// Borders
pub const BORDER_GRAY: Color = Color::Rgb(92, 99, 112);

/// Dim text (timestamps, hints)
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Warnings
pub const WARN_YELLOW: Color = Color::Rgb(229, 192, 123);

/// Errors
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Success
pub const SUCCESS_GREEN: Color = Color::Rgb(120, 230, 120);

// ============================================================================
// Color Pairs
// ============================================================================

/// Named color pairs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pair {
    /// Plain text
    Text,
    /// Header strip
    Header,
    /// Footer strip
    Footer,
    /// Menu entries
    Menu,
    /// Current menu entry
    Highlight,
    /// Panel borders
    Border,
    /// Panel titles
    Title,
    /// Secondary information
    Dim,
    /// Warnings
    Warn,
    /// Errors
    Error,
    /// Text input prompt
    Prompt,
}

impl Pair {
    /// Style of this pair
    pub fn style(self) -> Style {
        match self {
            Self::Text => Style::default().fg(CHROME_FG),
            Self::Header => Style::default()
                .fg(CHROME_FG)
                .bg(CHROME_BG)
                .add_modifier(Modifier::BOLD),
            Self::Footer => Style::default().fg(CHROME_FG).bg(CHROME_BG),
            Self::Menu => Style::default().fg(CHROME_FG),
            Self::Highlight => Style::default()
                .fg(CHROME_BG)
                .bg(ACCENT)
                .add_modifier(Modifier::BOLD),
            Self::Border => Style::default().fg(BORDER_GRAY),
            Self::Title => Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            Self::Dim => Style::default().fg(DIM_GRAY),
            Self::Warn => Style::default().fg(WARN_YELLOW),
            Self::Error => Style::default().fg(ERROR_RED),
            Self::Prompt => Style::default().fg(SUCCESS_GREEN),
        }
    }
}

impl From<Pair> for Style {
    fn from(pair: Pair) -> Self {
        pair.style()
    }
}
