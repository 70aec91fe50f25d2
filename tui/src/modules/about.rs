//! About screen with a short description of the framework

use ratatui::widgets::{Paragraph, Wrap};

use crate::compositor::Panel;
use crate::module::{Capabilities, Context, Module, Render};
use crate::theme::Pair;

const ABOUT: &str = "\
deskapp: a panel framework for the terminal

Every screen is a module. Modules render into their own panel, register their own keys and listen to events from the bus.

Switch modules with tab, type with /, toggle panels with F1-F7.";

/// Static description of the framework
#[derive(Debug, Default)]
pub struct About;

impl Module for About {
    fn name(&self) -> &str {
        "About"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PRIMARY | Capabilities::INFO
    }

    fn render(&mut self, panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        panel.render_widget(
            Paragraph::new(ABOUT)
                .style(Pair::Text.style())
                .wrap(Wrap { trim: false }),
        );
        Ok(Render::Handled)
    }

    fn render_info(&mut self, _panel: &mut Panel, ctx: &Context) -> anyhow::Result<Render> {
        Ok(Render::lines([
            format!("{} modules", ctx.view.module_count()),
            format!("{} messages", ctx.state.messages.len()),
        ]))
    }
}
