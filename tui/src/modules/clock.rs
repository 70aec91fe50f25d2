//! Wall clock module driven by a background worker

use std::time::Duration;

use chrono::Local;
use serde_json::json;

use crate::compositor::Panel;
use crate::module::{Capabilities, Context, Module, Render, Subscriber};
use crate::theme::Pair;

/// Event the clock worker emits every interval
pub const CLOCK_TICK: &str = "clock.tick";

/// Wall clock fed by a background worker
///
/// The worker only emits events; the module updates when the loop drains
/// them.
#[derive(Debug)]
pub struct Clock {
    interval: Duration,
    now: Option<String>,
    ticks: u64,
}

impl Clock {
    /// Clock ticking every `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            now: None,
            ticks: 0,
        }
    }

    /// Ticks received so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Last time received
    pub fn now(&self) -> Option<&str> {
        self.now.as_deref()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Module for Clock {
    fn name(&self) -> &str {
        "Clock"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PRIMARY | Capabilities::RIGHT
    }

    fn render(&mut self, panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        let rows = panel.inner().height;
        let text = self.now.as_deref().unwrap_or("--:--:--");
        panel.put_centered(rows / 2, text, Pair::Title.style());
        Ok(Render::Handled)
    }

    fn render_right(&mut self, _panel: &mut Panel, ctx: &Context) -> anyhow::Result<Render> {
        Ok(Render::lines([
            format!("ticks   {}", self.ticks),
            format!("every   {:?}", self.interval),
            format!("workers {}", ctx.running_workers()),
        ]))
    }

    fn on_start(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        ctx.spawn_worker("clock", self.interval, |worker| {
            let now = Local::now().format("%H:%M:%S").to_string();
            worker.emit(CLOCK_TICK, json!({ "time": now }));
            Ok(())
        })?;
        Ok(())
    }

    fn subscribe(&self, events: &mut Subscriber<'_, Self>) {
        events.on(CLOCK_TICK, |clock, event, _ctx| {
            clock.ticks += 1;
            clock.now = event.str_field("time").map(str::to_string);
            Ok(())
        });
    }
}
