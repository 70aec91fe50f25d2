//! Layout Engine
//!
//! Turns the terminal size, the split ratios and the panel visibility toggles
//! into the rectangles every panel is drawn into.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ header (3 rows)                              │
//! ├─────────┬───────────────────────┬────────────┤
//! │         │ info (3 rows)         │            │
//! │  menu   ├───────────────────────┤   right    │
//! │ W*h     │ main                  │  W*r       │
//! │         ├───────────────────────┴────────────┤
//! │         │ messages (body*v)                  │
//! ├─────────┴────────────────────────────────────┤
//! │ footer (3 rows)                              │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! A hidden panel contributes nothing and its neighbours grow into the space.
//! The floating panel is an overlay centred on main and is the only region
//! allowed to overlap another.
//!
//! Recomputing is cheap but recreating panels is not, so [`LayoutEngine`]
//! keeps the [`LayoutKey`] of the last pass and only recomputes when the key
//! changes or the layout was explicitly marked dirty.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rows taken by the header
pub const HEADER_ROWS: u16 = 3;
/// Rows taken by the footer
pub const FOOTER_ROWS: u16 = 3;
/// Rows taken by the info strip
pub const INFO_ROWS: u16 = 3;
/// Largest value a split can be adjusted to at runtime
pub const MAX_SPLIT: f64 = 0.9;

/// Layout errors
#[derive(Clone, Debug, Error, PartialEq)]
pub enum LayoutError {
    /// A split ratio outside `[0, 1)`
    #[error("split ratio {name} = {value} is outside [0, 1)")]
    InvalidSplit {
        /// Which split
        name: &'static str,
        /// The rejected value
        value: f64,
    },
}

/// A rectangle in terminal cells, `(height, width, y, x)` like curses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    /// Rows
    pub height: u16,
    /// Columns
    pub width: u16,
    /// Top row
    pub y: u16,
    /// Left column
    pub x: u16,
}

impl Region {
    /// Create a region from curses-ordered dims
    #[must_use]
    pub const fn new(height: u16, width: u16, y: u16, x: u16) -> Self {
        Self {
            height,
            width,
            y,
            x,
        }
    }

    /// Whether the region has no cells
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    /// Number of cells
    #[must_use]
    pub fn area(&self) -> u32 {
        u32::from(self.width) * u32::from(self.height)
    }

    /// Whether a cell lies inside the region
    #[must_use]
    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.x
            && y >= self.y
            && u32::from(x) < u32::from(self.x) + u32::from(self.width)
            && u32::from(y) < u32::from(self.y) + u32::from(self.height)
    }

    /// Whether two regions share at least one cell
    #[must_use]
    pub fn intersects(&self, other: &Region) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        let (ax2, ay2) = (self.x as u32 + self.width as u32, self.y as u32 + self.height as u32);
        let (bx2, by2) = (
            other.x as u32 + other.width as u32,
            other.y as u32 + other.height as u32,
        );
        (self.x as u32) < bx2 && (other.x as u32) < ax2 && (self.y as u32) < by2 && (other.y as u32) < ay2
    }

    /// The dims tuple `(height, width, y, x)`
    #[must_use]
    pub const fn dims(&self) -> (u16, u16, u16, u16) {
        (self.height, self.width, self.y, self.x)
    }
}

/// Every panel slot the layout knows about
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PanelKind {
    /// Title strip at the top
    Header,
    /// Prompt strip at the bottom
    Footer,
    /// Module list on the left
    Menu,
    /// Message log under main
    Messages,
    /// Where the current module renders
    Main,
    /// Optional sidebar right of main
    Right,
    /// Optional 3-row strip above main
    Info,
    /// Optional overlay centred on main
    Floating,
}

impl PanelKind {
    /// All kinds, in paint order
    pub const ALL: [PanelKind; 8] = [
        PanelKind::Header,
        PanelKind::Footer,
        PanelKind::Menu,
        PanelKind::Messages,
        PanelKind::Main,
        PanelKind::Right,
        PanelKind::Info,
        PanelKind::Floating,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Lowercase label
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Footer => "footer",
            Self::Menu => "menu",
            Self::Messages => "messages",
            Self::Main => "main",
            Self::Right => "right",
            Self::Info => "info",
            Self::Floating => "floating",
        }
    }
}

/// Visibility toggles for the optional panels
///
/// Main is always shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelVisibility {
    /// Show the header
    pub header: bool,
    /// Show the footer
    pub footer: bool,
    /// Show the menu
    pub menu: bool,
    /// Show the message log
    pub messages: bool,
    /// Show the right sidebar
    pub right: bool,
    /// Show the info strip
    pub info: bool,
    /// Show the floating overlay
    pub floating: bool,
}

impl PanelVisibility {
    /// Everything the classic five-panel layout shows
    #[must_use]
    pub const fn classic() -> Self {
        Self {
            header: true,
            footer: true,
            menu: true,
            messages: true,
            right: false,
            info: false,
            floating: false,
        }
    }

    /// Every optional panel on
    #[must_use]
    pub const fn all() -> Self {
        Self {
            header: true,
            footer: true,
            menu: true,
            messages: true,
            right: true,
            info: true,
            floating: true,
        }
    }

    /// Whether a panel kind is toggled on
    #[must_use]
    pub const fn is_visible(&self, kind: PanelKind) -> bool {
        match kind {
            PanelKind::Header => self.header,
            PanelKind::Footer => self.footer,
            PanelKind::Menu => self.menu,
            PanelKind::Messages => self.messages,
            PanelKind::Main => true,
            PanelKind::Right => self.right,
            PanelKind::Info => self.info,
            PanelKind::Floating => self.floating,
        }
    }

    /// Flip a toggle, returning the new state
    ///
    /// Main cannot be hidden; toggling it is a no-op that returns `true`.
    pub fn toggle(&mut self, kind: PanelKind) -> bool {
        let slot = match kind {
            PanelKind::Header => &mut self.header,
            PanelKind::Footer => &mut self.footer,
            PanelKind::Menu => &mut self.menu,
            PanelKind::Messages => &mut self.messages,
            PanelKind::Main => return true,
            PanelKind::Right => &mut self.right,
            PanelKind::Info => &mut self.info,
            PanelKind::Floating => &mut self.floating,
        };
        *slot = !*slot;
        *slot
    }
}

impl Default for PanelVisibility {
    fn default() -> Self {
        Self::classic()
    }
}

/// The split ratios, each in `[0, 1)`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitRatios {
    /// Fraction of the width given to the menu
    pub h_split: f64,
    /// Fraction of the body height given to the messages panel
    pub v_split: f64,
    /// Fraction of the width given to the right sidebar
    pub r_split: f64,
}

impl SplitRatios {
    /// Create validated ratios
    pub fn new(h_split: f64, v_split: f64, r_split: f64) -> Result<Self, LayoutError> {
        let ratios = Self {
            h_split,
            v_split,
            r_split,
        };
        ratios.validate()?;
        Ok(ratios)
    }

    /// Check every ratio is inside `[0, 1)`
    pub fn validate(&self) -> Result<(), LayoutError> {
        for (name, value) in [
            ("h_split", self.h_split),
            ("v_split", self.v_split),
            ("r_split", self.r_split),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(LayoutError::InvalidSplit { name, value });
            }
        }
        Ok(())
    }

    /// Nudge the menu split, clamped to `[0, MAX_SPLIT]`
    pub fn adjust_h(&mut self, delta: f64) {
        self.h_split = clamp_split(self.h_split + delta);
    }

    /// Nudge the messages split, clamped to `[0, MAX_SPLIT]`
    pub fn adjust_v(&mut self, delta: f64) {
        self.v_split = clamp_split(self.v_split + delta);
    }

    /// Nudge the right-panel split, clamped to `[0, MAX_SPLIT]`
    pub fn adjust_r(&mut self, delta: f64) {
        self.r_split = clamp_split(self.r_split + delta);
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            h_split: 0.2,
            v_split: 0.16,
            r_split: 0.25,
        }
    }
}

fn clamp_split(value: f64) -> f64 {
    // Two decimals keeps repeated nudges from drifting
    ((value * 100.0).round() / 100.0).clamp(0.0, MAX_SPLIT)
}

/// `int(total * ratio)`, truncated toward zero and capped at `total`
fn portion(total: u16, ratio: f64) -> u16 {
    let cells = (f64::from(total) * ratio).floor();
    if cells <= 0.0 {
        0
    } else {
        (cells as u16).min(total)
    }
}

/// Everything a layout pass depends on
///
/// Compared for equality once per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutKey {
    /// Terminal columns
    pub width: u16,
    /// Terminal rows
    pub height: u16,
    /// Panel toggles
    pub visibility: PanelVisibility,
    /// Split ratios
    pub splits: SplitRatios,
}

/// The result of one layout pass
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LayoutPlan {
    regions: [Option<Region>; 8],
}

impl LayoutPlan {
    /// Compute the regions for a terminal of `width` x `height`
    #[must_use]
    pub fn compute(
        width: u16,
        height: u16,
        visibility: &PanelVisibility,
        splits: &SplitRatios,
    ) -> Self {
        let mut plan = Self::default();

        let header_h = if visibility.header { HEADER_ROWS.min(height) } else { 0 };
        let footer_h = if visibility.footer {
            FOOTER_ROWS.min(height - header_h)
        } else {
            0
        };
        let body_y = header_h;
        let body_h = height - header_h - footer_h;

        let menu_w = if visibility.menu { portion(width, splits.h_split) } else { 0 };
        let content_x = menu_w;
        let content_w = width - menu_w;

        let messages_h = if visibility.messages {
            portion(body_h, splits.v_split)
        } else {
            0
        };
        let upper_h = body_h - messages_h;

        let right_w = if visibility.right {
            portion(width, splits.r_split).min(content_w)
        } else {
            0
        };
        let main_w = content_w - right_w;

        let info_h = if visibility.info { INFO_ROWS.min(upper_h) } else { 0 };

        if visibility.header {
            plan.set(PanelKind::Header, Region::new(header_h, width, 0, 0));
        }
        if visibility.footer {
            plan.set(
                PanelKind::Footer,
                Region::new(footer_h, width, height - footer_h, 0),
            );
        }
        if visibility.menu {
            plan.set(PanelKind::Menu, Region::new(body_h, menu_w, body_y, 0));
        }
        if visibility.messages {
            plan.set(
                PanelKind::Messages,
                Region::new(messages_h, content_w, body_y + upper_h, content_x),
            );
        }
        if visibility.info {
            plan.set(PanelKind::Info, Region::new(info_h, main_w, body_y, content_x));
        }
        if visibility.right {
            plan.set(
                PanelKind::Right,
                Region::new(upper_h, right_w, body_y, content_x + main_w),
            );
        }

        let main = Region::new(upper_h - info_h, main_w, body_y + info_h, content_x);
        plan.set(PanelKind::Main, main);

        if visibility.floating {
            let (h, w) = (main.height / 2, main.width / 2);
            plan.set(
                PanelKind::Floating,
                Region::new(h, w, main.y + (main.height - h) / 2, main.x + (main.width - w) / 2),
            );
        }

        plan
    }

    fn set(&mut self, kind: PanelKind, region: Region) {
        self.regions[kind.index()] = Some(region);
    }

    /// Region of a panel, `None` when the panel is toggled off
    #[must_use]
    pub fn get(&self, kind: PanelKind) -> Option<Region> {
        self.regions[kind.index()]
    }

    /// Region of the main panel
    #[must_use]
    pub fn main(&self) -> Region {
        self.get(PanelKind::Main).unwrap_or_default()
    }

    /// Every present region, in paint order
    pub fn iter(&self) -> impl Iterator<Item = (PanelKind, Region)> + '_ {
        PanelKind::ALL
            .iter()
            .filter_map(|kind| self.get(*kind).map(|region| (*kind, region)))
    }
}

/// Caches the last layout and recomputes only when its inputs change
#[derive(Debug, Default)]
pub struct LayoutEngine {
    key: Option<LayoutKey>,
    plan: LayoutPlan,
    dirty: bool,
    passes: u64,
}

impl LayoutEngine {
    /// Create an engine that will compute on the first refresh
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a recompute on the next refresh (resize signal)
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether a recompute is pending
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Recompute if `key` differs from the previous pass or the engine is dirty
    ///
    /// Returns `true` when a new plan was computed, meaning every panel has to
    /// be recreated.
    pub fn refresh(&mut self, key: LayoutKey) -> bool {
        if !self.dirty && self.key == Some(key) {
            return false;
        }

        self.plan = LayoutPlan::compute(key.width, key.height, &key.visibility, &key.splits);
        self.key = Some(key);
        self.dirty = false;
        self.passes += 1;

        tracing::debug!(
            width = key.width,
            height = key.height,
            pass = self.passes,
            "layout recomputed"
        );
        true
    }

    /// The current plan
    pub fn plan(&self) -> &LayoutPlan {
        &self.plan
    }

    /// How many passes have run
    pub fn passes(&self) -> u64 {
        self.passes
    }
}
