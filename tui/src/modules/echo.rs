//! Echo module: shows accepted text lines and mouse clicks

use std::collections::VecDeque;

use deskapp_core::keycodes::{mouse, Keycode, MouseClick};
use serde_json::json;

use crate::compositor::Panel;
use crate::module::{Context, KeyBinder, Module, Render, Subscriber};

/// Event emitted for every accepted line
pub const ECHO_TEXT: &str = "echo.text";

const HISTORY: usize = 200;

/// Shows what was typed and where the mouse clicked
#[derive(Debug, Default)]
pub struct Echo {
    history: VecDeque<String>,
    echoed: u64,
}

impl Echo {
    /// Lines shown, oldest first
    pub fn history(&self) -> impl Iterator<Item = &str> + '_ {
        self.history.iter().map(String::as_str)
    }

    /// How many `echo.text` events came back through the bus
    pub fn echoed(&self) -> u64 {
        self.echoed
    }

    fn push(&mut self, line: String) {
        if self.history.len() == HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }
}

fn button_name(button: u32) -> &'static str {
    match button {
        mouse::BUTTON1_PRESSED | mouse::BUTTON1_RELEASED | mouse::BUTTON1_CLICKED => "left",
        mouse::BUTTON2_PRESSED | mouse::BUTTON2_RELEASED | mouse::BUTTON2_CLICKED => "middle",
        mouse::BUTTON3_PRESSED | mouse::BUTTON3_RELEASED | mouse::BUTTON3_CLICKED => "right",
        mouse::BUTTON4_PRESSED => "wheel up",
        mouse::BUTTON5_PRESSED => "wheel down",
        _ => "other",
    }
}

impl Module for Echo {
    fn name(&self) -> &str {
        "Echo"
    }

    fn render(&mut self, panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        if self.history.is_empty() {
            return Ok(Render::text("press / to type, enter to send"));
        }
        let rows = usize::from(panel.inner().height);
        let skip = self.history.len().saturating_sub(rows);
        Ok(Render::lines(self.history.iter().skip(skip).cloned()))
    }

    fn on_text_submitted(&mut self, text: &str, ctx: &mut Context) -> anyhow::Result<()> {
        if text.trim().is_empty() {
            anyhow::bail!("nothing to echo");
        }
        self.push(format!("> {text}"));
        ctx.emit(ECHO_TEXT, json!({ "text": text }), self.name());
        Ok(())
    }

    fn on_mouse(&mut self, click: MouseClick, _ctx: &mut Context) -> anyhow::Result<()> {
        self.push(format!(
            "{} click at ({}, {})",
            button_name(click.button),
            click.x,
            click.y
        ));
        Ok(())
    }

    fn bind_keys(&self, keys: &mut KeyBinder<'_, Self>) {
        keys.bind(Keycode::char('c'), "clear", "clear history", |echo, ctx| {
            let cleared = echo.history.len();
            echo.history.clear();
            ctx.state.messages.info(format!("cleared {cleared} lines"));
            Ok(())
        });
    }

    fn subscribe(&self, events: &mut Subscriber<'_, Self>) {
        events.on(ECHO_TEXT, |echo, event, ctx| {
            echo.echoed += 1;
            if let Some(text) = event.str_field("text") {
                ctx.state.messages.info(format!("echo: {text}"));
            }
            Ok(())
        });
    }
}
