//! Layered Compositor
//!
//! Manages z-ordered panels. Each panel has its own buffer and is drawn
//! independently; the compositor stacks all visible panels into the frame
//! buffer back to front.
//!
//! Panels are never resized in place. When the layout changes the owner
//! calls [`Compositor::clear`] and creates a fresh set.

mod panel;

use std::collections::HashMap;

use deskapp_core::layout::Region;
use ratatui::buffer::Buffer;

pub use panel::{Panel, PanelId};

/// The compositor manages all panels and composites them together
#[derive(Debug, Default)]
pub struct Compositor {
    /// All panels by ID
    panels: HashMap<PanelId, Panel>,
    /// Panels sorted by z-index for rendering
    render_order: Vec<PanelId>,
    /// Next panel ID to assign
    next_id: u32,
}

impl Compositor {
    /// Create an empty compositor
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a panel and return its ID
    pub fn create_panel(
        &mut self,
        label: impl Into<String>,
        region: Region,
        z_index: i32,
        bordered: bool,
    ) -> PanelId {
        let id = PanelId(self.next_id);
        self.next_id += 1;

        self.panels
            .insert(id, Panel::new(id, label, region, z_index, bordered));
        self.update_render_order();

        id
    }

    /// Discard every panel
    pub fn clear(&mut self) {
        self.panels.clear();
        self.render_order.clear();
    }

    /// A panel by ID
    pub fn panel(&self, id: PanelId) -> Option<&Panel> {
        self.panels.get(&id)
    }

    /// Mutable access to a panel for rendering
    pub fn panel_mut(&mut self, id: PanelId) -> Option<&mut Panel> {
        self.panels.get_mut(&id)
    }

    /// Number of panels
    pub fn len(&self) -> usize {
        self.panels.len()
    }

    /// Whether there are no panels
    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// Put a panel above every other panel of the same or lower z-index
    ///
    /// Panels in a higher band (overlays) stay on top. Returns whether the
    /// order changed.
    pub fn raise(&mut self, id: PanelId) -> bool {
        let Some(z) = self.panels.get(&id).map(|p| p.z_index) else {
            return false;
        };
        if self.render_order.last() == Some(&id) {
            return false;
        }

        let before = self.render_order.clone();
        self.render_order.retain(|other| *other != id);
        // Insert after the last panel whose z-index does not exceed ours
        let at = self
            .render_order
            .iter()
            .rposition(|other| self.panels.get(other).map_or(false, |p| p.z_index <= z))
            .map_or(0, |i| i + 1);
        self.render_order.insert(at, id);
        before != self.render_order
    }

    /// Set panel visibility
    pub fn set_visible(&mut self, id: PanelId, visible: bool) {
        if let Some(panel) = self.panels.get_mut(&id) {
            panel.visible = visible;
        }
    }

    /// IDs in paint order, back to front
    pub fn render_order(&self) -> &[PanelId] {
        &self.render_order
    }

    /// Composite all visible panels into `output`, clipped to its area
    pub fn composite_into(&self, output: &mut Buffer) {
        // Render panels in z-order (back to front)
        for id in &self.render_order {
            if let Some(panel) = self.panels.get(id) {
                if panel.visible {
                    Self::blit_panel(output, panel);
                }
            }
        }
    }

    /// Copy a panel onto the output buffer; panels are opaque
    fn blit_panel(output: &mut Buffer, panel: &Panel) {
        let area = output.area;
        let region = panel.region;

        for py in 0..region.height {
            for px in 0..region.width {
                let dst_x = region.x + px;
                let dst_y = region.y + py;

                // Bounds check
                if dst_x >= area.x + area.width || dst_y >= area.y + area.height {
                    continue;
                }

                let Some(src) = panel.buffer.cell((px, py)) else {
                    continue;
                };
                if let Some(dst) = output.cell_mut((dst_x, dst_y)) {
                    *dst = src.clone();
                }
            }
        }
    }

    /// Find the topmost panel at a given position (for mouse events)
    pub fn panel_at(&self, x: u16, y: u16) -> Option<PanelId> {
        // Iterate in reverse render order (front to back)
        self.render_order.iter().rev().copied().find(|id| {
            self.panels
                .get(id)
                .is_some_and(|p| p.visible && p.contains(x, y))
        })
    }

    /// Update render order based on z-indices
    ///
    /// The sort is stable, so panels with equal z-index keep creation or
    /// raise order.
    fn update_render_order(&mut self) {
        let mut order: Vec<PanelId> = self.render_order.clone();
        for id in self.panels.keys() {
            if !order.contains(id) {
                order.push(*id);
            }
        }
        order.retain(|id| self.panels.contains_key(id));
        order.sort_by_key(|id| self.panels.get(id).map_or(0, |p| p.z_index));
        self.render_order = order;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::layout::Rect;
    use ratatui::style::Style;

    fn screen_row(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width).map(|x| buf[(x, y)].symbol()).collect()
    }

    #[test]
    fn test_raise_puts_panel_on_top_of_its_band() {
        let mut compositor = Compositor::new();
        let a = compositor.create_panel("a", Region::new(2, 4, 0, 0), 1, false);
        let b = compositor.create_panel("b", Region::new(2, 4, 0, 0), 1, false);
        let overlay = compositor.create_panel("o", Region::new(1, 1, 0, 0), 10, false);

        assert_eq!(compositor.render_order(), &[a, b, overlay]);
        assert!(compositor.raise(a));
        assert_eq!(compositor.render_order(), &[b, a, overlay]);
        assert!(!compositor.raise(a));
        assert_eq!(compositor.panel_at(2, 1), Some(a));
        assert_eq!(compositor.panel_at(0, 0), Some(overlay));
    }

    #[test]
    fn test_composite_stacks_and_clips() {
        let mut compositor = Compositor::new();
        let back = compositor.create_panel("back", Region::new(1, 6, 0, 0), 0, false);
        let front = compositor.create_panel("front", Region::new(1, 6, 0, 3), 1, false);
        compositor.panel_mut(back).unwrap().put_line(0, "aaaaaa", Style::default());
        compositor.panel_mut(front).unwrap().put_line(0, "bbbbbb", Style::default());

        let mut out = Buffer::empty(Rect::new(0, 0, 7, 1));
        compositor.composite_into(&mut out);
        assert_eq!(screen_row(&out, 0), "aaabbbb");
    }

    #[test]
    fn test_hidden_panels_are_skipped() {
        let mut compositor = Compositor::new();
        let p = compositor.create_panel("p", Region::new(1, 3, 0, 0), 0, false);
        compositor.panel_mut(p).unwrap().put_line(0, "xyz", Style::default());
        compositor.set_visible(p, false);

        let mut out = Buffer::empty(Rect::new(0, 0, 3, 1));
        compositor.composite_into(&mut out);
        assert_eq!(screen_row(&out, 0), "   ");
        assert_eq!(compositor.panel_at(0, 0), None);
    }

    #[test]
    fn test_clear_discards_everything() {
        let mut compositor = Compositor::new();
        compositor.create_panel("p", Region::new(1, 1, 0, 0), 0, false);
        compositor.clear();
        assert!(compositor.is_empty());
        assert!(compositor.render_order().is_empty());
    }
}
