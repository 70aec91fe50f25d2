//! Built-in panels: header, footer, menu, message log, and the defaults for
//! secondary panels when the current module does not draw them.

use deskapp_core::bus::BusMetrics;
use deskapp_core::frame::FrameStats;
use deskapp_core::keymap::BindingHelp;
use deskapp_core::state::{LogLevel, MessageLog};
use ratatui::style::Style;
use unicode_width::UnicodeWidthStr;

use crate::compositor::Panel;
use crate::theme::Pair;

/// Hint line shown in the footer when not typing
pub const FOOTER_HINT: &str = "q quit | tab next | / type | F1-F7 panels | [ ] menu | - + messages";

/// Title strip: application title on the left, current module on the right
pub fn header(panel: &mut Panel, title: &str, module: Option<&str>) {
    fill(panel, Pair::Header.style());
    let inner = panel.inner();
    if inner.height == 0 {
        return;
    }
    let row = inner.height / 2;
    panel.put_line(row, &format!(" {title}"), Pair::Header.style());

    if let Some(name) = module {
        let label = format!("{name} ");
        let width = u16::try_from(label.width()).unwrap_or(u16::MAX);
        let title_w = u16::try_from(title.width()).unwrap_or(u16::MAX).saturating_add(2);
        if width.saturating_add(title_w) <= inner.width {
            let x = inner.x + inner.width - width;
            panel
                .buffer
                .set_string(x, inner.y + row, &label, Pair::Header.style());
        }
    }
}

/// Prompt strip: the text being typed, or the key hints
pub fn footer(panel: &mut Panel, typing: Option<&str>) {
    match typing {
        Some(text) => panel.put_line(0, &format!("> {text}_"), Pair::Prompt.style()),
        None => panel.put_line(0, FOOTER_HINT, Pair::Footer.style()),
    }
}

/// Module list with the current entry highlighted
pub fn menu(panel: &mut Panel, names: &[String], current: usize) {
    let inner = panel.inner();
    let width = usize::from(inner.width);
    // Scroll so the current entry stays visible
    let rows = usize::from(inner.height);
    let first = if rows == 0 { 0 } else { current.saturating_sub(rows - 1) };

    for (row, (index, name)) in (0..inner.height).zip(names.iter().enumerate().skip(first)) {
        let style = if index == current {
            Pair::Highlight.style()
        } else {
            Pair::Menu.style()
        };
        panel.put_line(row, &format!("{name:<width$}"), style);
    }
}

/// Menu index under an inner-area row
pub fn menu_index_at(row: u16, rows: u16, current: usize) -> usize {
    let first = if rows == 0 {
        0
    } else {
        current.saturating_sub(usize::from(rows) - 1)
    };
    first + usize::from(row)
}

/// The newest messages that fit, wrapped to the panel width
pub fn messages(panel: &mut Panel, log: &MessageLog) {
    let inner = panel.inner();
    if inner.width == 0 || inner.height == 0 {
        return;
    }
    let rows = usize::from(inner.height);
    let width = usize::from(inner.width);

    let mut lines: Vec<(String, Style)> = Vec::new();
    for entry in log.iter().rev() {
        let style = match entry.level {
            LogLevel::Info => Pair::Text.style(),
            LogLevel::Warn => Pair::Warn.style(),
            LogLevel::Error => Pair::Error.style(),
        };
        let text = entry.to_string();
        let wrapped: Vec<String> = textwrap::wrap(&text, width)
            .into_iter()
            .map(|line| line.into_owned())
            .collect();
        for line in wrapped.into_iter().rev() {
            lines.push((line, style));
        }
        if lines.len() >= rows {
            break;
        }
    }
    lines.truncate(rows);

    for (row, (line, style)) in (0..inner.height).zip(lines.iter().rev()) {
        panel.put_line(row, line, *style);
    }
}

/// Info strip default: module name and its keys
pub fn default_info(panel: &mut Panel, module: Option<&str>, keys: &[BindingHelp]) {
    panel.put_line(0, module.unwrap_or("no module"), Pair::Title.style());
    let summary: Vec<String> = keys
        .iter()
        .map(|k| format!("{} {}", k.keycode, k.name))
        .collect();
    if summary.is_empty() {
        panel.put_line(1, "no module keys", Pair::Dim.style());
    } else {
        panel.put_line(1, &summary.join("  "), Pair::Text.style());
    }
}

/// Right sidebar default: one binding per line with its help text
pub fn default_right(panel: &mut Panel, keys: &[BindingHelp]) {
    let lines: Vec<String> = keys
        .iter()
        .map(|k| match &k.doc {
            Some(doc) => format!("{:<9}{doc}", k.keycode.to_string()),
            None => format!("{:<9}{}", k.keycode.to_string(), k.name),
        })
        .collect();
    panel.write_lines(&lines, Pair::Text.style());
}

/// Floating overlay default: loop and bus counters
pub fn default_floating(panel: &mut Panel, stats: &FrameStats, bus: &BusMetrics) {
    let lines = [
        format!("frames    {}", stats.frames),
        format!("overruns  {}", stats.overruns),
        format!("last      {:?}", stats.last_elapsed),
        format!("events    {} / {} dropped", bus.processed, bus.dropped),
        format!("queued    {}", bus.queued),
        format!("listeners {}", bus.listeners),
    ];
    panel.write_lines(&lines, Pair::Text.style());
}

/// Paint every cell of the inner area with `style`
fn fill(panel: &mut Panel, style: Style) {
    let inner = panel.inner();
    panel.buffer.set_style(inner, style);
}
