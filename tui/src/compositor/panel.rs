//! Panels
//!
//! A panel is a rectangle of the screen with its own backing buffer, an
//! optional border and a title. Modules draw into the panel's inner area in
//! panel-local coordinates; the compositor places it on screen.

use deskapp_core::layout::Region;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::Line;
use ratatui::widgets::{Block, Widget};
use unicode_width::UnicodeWidthStr;

use crate::theme::Pair;

/// Unique identifier for a panel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(pub(crate) u32);

/// A rectangular, independently drawn piece of the screen
#[derive(Debug)]
pub struct Panel {
    /// Identifier assigned by the compositor
    pub id: PanelId,
    /// Title drawn into the top border
    pub label: String,
    /// Screen position and size
    pub region: Region,
    /// Backing store, origin at (0, 0)
    pub buffer: Buffer,
    /// Stacking order; higher is drawn later
    pub z_index: i32,
    /// Hidden panels are skipped when compositing
    pub visible: bool,
    /// Whether a border and title frame the content
    pub bordered: bool,
}

impl Panel {
    /// Allocate a panel and draw its frame
    pub fn new(id: PanelId, label: impl Into<String>, region: Region, z_index: i32, bordered: bool) -> Self {
        let mut panel = Self {
            id,
            label: label.into(),
            region,
            buffer: Buffer::empty(Rect::new(0, 0, region.width, region.height)),
            z_index,
            visible: true,
            bordered,
        };
        panel.clear();
        panel
    }

    /// Screen rectangle
    pub fn rect(&self) -> Rect {
        Rect::new(self.region.x, self.region.y, self.region.width, self.region.height)
    }

    /// Drawable area inside the border, in panel-local coordinates
    pub fn inner(&self) -> Rect {
        let full = self.buffer.area;
        if self.bordered && full.width >= 2 && full.height >= 2 {
            Rect::new(1, 1, full.width - 2, full.height - 2)
        } else if self.bordered {
            Rect::new(0, 0, 0, 0)
        } else {
            full
        }
    }

    /// Erase the content and redraw the frame
    pub fn clear(&mut self) {
        self.buffer.reset();
        if self.bordered && self.region.width >= 2 && self.region.height >= 2 {
            let area = self.buffer.area;
            Block::bordered()
                .border_style(Pair::Border.style())
                .title(Line::styled(format!(" {} ", self.label), Pair::Title.style()))
                .render(area, &mut self.buffer);
        }
    }

    /// Draw any ratatui widget into the inner area
    pub fn render_widget<W: Widget>(&mut self, widget: W) {
        let area = self.inner();
        widget.render(area, &mut self.buffer);
    }

    /// Write one line at an inner row, clipped to the inner width
    pub fn put_line(&mut self, row: u16, text: &str, style: Style) {
        let inner = self.inner();
        if row >= inner.height {
            return;
        }
        self.buffer
            .set_stringn(inner.x, inner.y + row, text, usize::from(inner.width), style);
    }

    /// Write a line centered in an inner row
    pub fn put_centered(&mut self, row: u16, text: &str, style: Style) {
        let inner = self.inner();
        let width = u16::try_from(text.width()).unwrap_or(u16::MAX);
        let offset = inner.width.saturating_sub(width) / 2;
        if row >= inner.height {
            return;
        }
        self.buffer.set_stringn(
            inner.x + offset,
            inner.y + row,
            text,
            usize::from(inner.width - offset),
            style,
        );
    }

    /// Blit lines top-down into the inner area; extra lines are cut off
    pub fn write_lines<S: AsRef<str>>(&mut self, lines: &[S], style: Style) {
        let rows = self.inner().height;
        for (row, line) in (0..rows).zip(lines) {
            self.put_line(row, line.as_ref(), style);
        }
    }

    /// Whether a screen cell lies on this panel
    pub fn contains(&self, x: u16, y: u16) -> bool {
        self.region.contains(x, y)
    }

    /// Screen cell to inner-area coordinates, if it falls inside
    pub fn to_inner(&self, x: u16, y: u16) -> Option<(u16, u16)> {
        if !self.contains(x, y) {
            return None;
        }
        let inner = self.inner();
        let (lx, ly) = (x - self.region.x, y - self.region.y);
        (lx >= inner.x && ly >= inner.y && lx < inner.x + inner.width && ly < inner.y + inner.height)
            .then(|| (lx - inner.x, ly - inner.y))
    }
}
