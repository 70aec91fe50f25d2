//! Startup splash: a box grows from the center of the screen and the title
//! is typed into it.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::{Block, Clear, Widget};
use unicode_width::UnicodeWidthStr;

use crate::theme::Pair;

/// Frames the splash runs for
pub const SPLASH_FRAMES: u16 = 24;

/// Draw splash frame `step` of `steps` into `area`
pub fn render_splash(buf: &mut Buffer, area: Rect, title: &str, step: u16, steps: u16) {
    Clear.render(area, buf);
    if area.width < 4 || area.height < 3 {
        return;
    }

    let steps = steps.max(1);
    let step = step.min(steps);
    // The box reaches full size halfway, the title fills in over the rest
    let grow = (u32::from(step) * 2).min(u32::from(steps));
    let title_w = u16::try_from(title.width()).unwrap_or(u16::MAX);
    let full_w = (title_w + 4).min(area.width);
    let w = scale(full_w, grow, steps).max(2);
    let h = scale(3, grow, steps).max(2).min(area.height);

    let rect = Rect::new(
        area.x + (area.width - w) / 2,
        area.y + (area.height - h) / 2,
        w,
        h,
    );
    Block::bordered().border_style(Pair::Title.style()).render(rect, buf);

    if h >= 3 && grow >= u32::from(steps) {
        let typed = u32::from(step.saturating_sub(steps / 2)) * 2;
        let shown: String = title
            .chars()
            .take(usize::try_from(typed).unwrap_or(usize::MAX))
            .collect();
        buf.set_stringn(
            rect.x + 2,
            rect.y + 1,
            &shown,
            usize::from(rect.width.saturating_sub(4)),
            Pair::Header.style(),
        );
    }
}

fn scale(full: u16, num: u32, den: u16) -> u16 {
    u16::try_from(u32::from(full) * num / u32::from(den.max(1))).unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(buf: &Buffer) -> String {
        let area = buf.area;
        (0..area.height)
            .flat_map(|y| (0..area.width).map(move |x| (x, y)))
            .map(|(x, y)| buf[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_last_frame_shows_title() {
        let area = Rect::new(0, 0, 40, 10);
        let mut buf = Buffer::empty(area);
        render_splash(&mut buf, area, "deskapp", SPLASH_FRAMES, SPLASH_FRAMES);
        assert!(text(&buf).contains("deskapp"));
    }

    #[test]
    fn test_first_frame_has_no_title() {
        let area = Rect::new(0, 0, 40, 10);
        let mut buf = Buffer::empty(area);
        render_splash(&mut buf, area, "deskapp", 0, SPLASH_FRAMES);
        assert!(!text(&buf).contains('d'));
    }

    #[test]
    fn test_tiny_screen_is_safe() {
        let area = Rect::new(0, 0, 3, 2);
        let mut buf = Buffer::empty(area);
        render_splash(&mut buf, area, "a long title that cannot fit", 10, SPLASH_FRAMES);
    }
}
