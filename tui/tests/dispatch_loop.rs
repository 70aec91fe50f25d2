//! Dispatch loop tests
//!
//! The whole application runs headless on a `TestBackend` with scripted
//! input, one `step()` per frame.

use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use ratatui::backend::TestBackend;

use deskapp_core::keycodes::{mouse, Keycode, MouseClick};
use deskapp_core::layout::PanelKind;
use deskapp_core::DeskConfig;
use deskapp_tui::modules::{Clock, Echo};
use deskapp_tui::surface::TEXT_INPUT_KEY;
use deskapp_tui::{
    App, Capabilities, Context, Input, KeyBinder, Module, Outcome, Panel, Render, ScriptedInput,
    Surface,
};

// ============================================================================
// Helpers
// ============================================================================

fn app_with(inputs: Vec<Input>) -> App<TestBackend> {
    let surface = Surface::new(TestBackend::new(80, 24), Box::new(ScriptedInput::new(inputs)))
        .unwrap();
    App::new(surface, &DeskConfig::default())
}

fn keys(keys: &[Keycode]) -> Vec<Input> {
    keys.iter().map(|k| Input::Key(*k)).collect()
}

fn screen(app: &App<TestBackend>) -> String {
    let buffer = app.surface().terminal().backend().buffer();
    let area = buffer.area;
    (0..area.height)
        .map(|y| {
            (0..area.width)
                .map(|x| buffer[(x, y)].symbol())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn logged(app: &App<TestBackend>, needle: &str) -> bool {
    app.context()
        .state
        .messages
        .iter()
        .any(|entry| entry.text.contains(needle))
}

/// Renders fixed lines, optionally fails on `x`, counts lifecycle calls
struct Probe {
    name: &'static str,
    starts: Rc<Cell<u32>>,
    fail_render: bool,
}

impl Probe {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            starts: Rc::new(Cell::new(0)),
            fail_render: false,
        }
    }
}

impl Module for Probe {
    fn name(&self) -> &str {
        self.name
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::PRIMARY | Capabilities::INFO
    }

    fn render(&mut self, _panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        if self.fail_render {
            anyhow::bail!("render exploded");
        }
        Ok(Render::lines([format!("hello from {}", self.name)]))
    }

    fn render_info(&mut self, _panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        Ok(Render::text("probe info"))
    }

    fn on_start(&mut self, _ctx: &mut Context) -> anyhow::Result<()> {
        self.starts.set(self.starts.get() + 1);
        Ok(())
    }

    fn bind_keys(&self, keys: &mut KeyBinder<'_, Self>) {
        keys.bind('x', "explode", "always fails", |_probe, _ctx| {
            anyhow::bail!("boom")
        });
        keys.bind('y', "fine", "always works", |probe, ctx| {
            ctx.state.messages.info(format!("{} is fine", probe.name));
            Ok(())
        });
    }
}

/// Binds `q` itself, shadowing the application quit key, and tries the same
/// with ctrl+c
struct Greedy;

impl Module for Greedy {
    fn name(&self) -> &str {
        "Greedy"
    }

    fn render(&mut self, _panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        Ok(Render::Handled)
    }

    fn bind_keys(&self, keys: &mut KeyBinder<'_, Self>) {
        keys.bind('q', "keep_q", "", |_greedy, ctx| {
            ctx.state.messages.info("q kept");
            Ok(())
        });
        keys.bind(Keycode::CTRL_C, "keep_ctrl_c", "", |_greedy, ctx| {
            ctx.state.messages.info("ctrl+c kept");
            Ok(())
        });
    }
}

// ============================================================================
// Rendering and layout
// ============================================================================

#[test]
fn test_module_lines_reach_the_screen() {
    let mut app = app_with(vec![]);
    app.add_module(Probe::new("probe"));

    let report = app.step().unwrap();
    assert_eq!(report.frame, 1);
    assert!(report.recomputed);
    assert_eq!(report.outcome, Outcome::Idle);

    let screen = screen(&app);
    assert!(screen.contains("hello from probe"));
    assert!(screen.contains("deskapp"));
}

#[test]
fn test_layout_recomputes_only_on_change() {
    let mut app = app_with(keys(&[Keycode::f(5)]));
    app.add_module(Probe::new("probe"));
    app.step().unwrap();
    assert!(app.chrome_panel(PanelKind::Right).is_none());

    let report = app.step().unwrap();
    assert!(report.recomputed);
    assert_eq!(report.outcome, Outcome::Handled("toggle_right".to_string()));
    assert!(app.chrome_panel(PanelKind::Right).is_some());

    let report = app.step().unwrap();
    assert!(!report.recomputed);
    assert_eq!(app.layout_passes(), 2);
}

#[test]
fn test_split_keys_resize_the_menu() {
    let mut app = app_with(keys(&[Keycode::char(']')]));
    app.add_module(Probe::new("probe"));
    app.step().unwrap();
    let before = app.chrome_panel(PanelKind::Menu).unwrap().region.width;

    let report = app.step().unwrap();
    assert!(report.recomputed);
    let after = app.chrome_panel(PanelKind::Menu).unwrap().region.width;
    assert_eq!(before, 16);
    assert_eq!(after, 20);
}

#[test]
fn test_resize_recreates_panels() {
    let mut app = app_with(vec![Input::None, Input::Resize(100, 30)]);
    let probe = app.add_module(Probe::new("probe"));
    app.step().unwrap();
    let narrow = app.module_panel(probe).unwrap().region;

    app.surface_mut().terminal_mut().backend_mut().resize(100, 30);
    let report = app.step().unwrap();
    assert_eq!(report.outcome, Outcome::Resized);
    assert!(report.recomputed);

    let wide = app.module_panel(probe).unwrap().region;
    assert!(wide.width > narrow.width);
    assert!(wide.height > narrow.height);
}

#[test]
fn test_secondary_panels_use_module_hooks_or_defaults() {
    let mut app = app_with(keys(&[Keycode::f(6)]));
    app.add_module(Probe::new("probe"));
    app.step().unwrap();
    app.step().unwrap();
    assert!(screen(&app).contains("probe info"));
}

#[test]
fn test_empty_app_still_runs() {
    let mut app = app_with(keys(&[Keycode::TAB, Keycode::char('q')]));
    assert_eq!(app.step().unwrap().outcome, Outcome::Handled("next_module".to_string()));
    assert!(screen(&app).contains("no modules"));
    app.run().unwrap();
    assert!(!app.is_running());
}

// ============================================================================
// Keys
// ============================================================================

#[test]
fn test_quit_stops_run() {
    let mut app = app_with(keys(&[Keycode::char('q')]));
    app.add_module(Probe::new("probe"));
    app.run().unwrap();
    assert!(!app.is_running());
    assert_eq!(app.stats().frames, 1);
}

#[test]
fn test_unbound_key_is_logged_not_fatal() {
    let mut app = app_with(keys(&[Keycode::char('z'), Keycode::char('y')]));
    app.add_module(Probe::new("probe"));

    let report = app.step().unwrap();
    assert_eq!(report.outcome, Outcome::NoHandler(Keycode::char('z')));
    assert!(logged(&app, "has no function"));

    let report = app.step().unwrap();
    assert_eq!(report.outcome, Outcome::Handled("fine".to_string()));
    assert!(logged(&app, "probe is fine"));
}

#[test]
fn test_failing_handler_is_contained() {
    let mut app = app_with(keys(&[Keycode::char('x'), Keycode::char('x'), Keycode::char('y')]));
    app.add_module(Probe::new("probe"));

    for _ in 0..2 {
        match app.step().unwrap().outcome {
            Outcome::Raised(text) => assert_eq!(text, "explode | boom"),
            other => panic!("expected a raised handler, got {other:?}"),
        }
    }
    assert_eq!(app.step().unwrap().outcome, Outcome::Handled("fine".to_string()));
    assert!(app.is_running());
    assert!(logged(&app, "explode | boom"));
}

#[test]
fn test_failing_render_is_logged_once() {
    let mut app = app_with(vec![]);
    let mut bad = Probe::new("bad");
    bad.fail_render = true;
    app.add_module(bad);
    app.add_module(Probe::new("good"));

    for _ in 0..5 {
        app.step().unwrap();
    }
    let failures = app
        .context()
        .state
        .messages
        .iter()
        .filter(|e| e.text.contains("render exploded"))
        .count();
    assert_eq!(failures, 1);
    assert_eq!(app.stats().frames, 5);
}

#[test]
fn test_module_switching_wraps() {
    let mut app = app_with(keys(&[
        Keycode::TAB,
        Keycode::TAB,
        Keycode::TAB,
        Keycode::BACKTAB,
        Keycode::PAGE_DOWN,
    ]));
    let a = app.add_module(Probe::new("a"));
    let b = app.add_module(Probe::new("b"));
    let c = app.add_module(Probe::new("c"));

    let mut seen = Vec::new();
    for _ in 0..5 {
        app.step().unwrap();
        seen.push(app.current_handle().unwrap());
    }
    assert_eq!(seen, vec![b, c, a, c, a]);
}

#[test]
fn test_module_binding_shadows_global_only_while_current() {
    let mut app = app_with(keys(&[Keycode::char('q'), Keycode::TAB, Keycode::char('q')]));
    app.add_module(Greedy);
    app.add_module(Probe::new("probe"));

    assert_eq!(app.step().unwrap().outcome, Outcome::Handled("keep_q".to_string()));
    assert!(app.is_running());
    app.step().unwrap();
    assert_eq!(app.step().unwrap().outcome, Outcome::Handled("quit".to_string()));
    assert!(!app.is_running());
}

#[test]
fn test_ctrl_c_quits_even_when_shadowed() {
    let mut app = app_with(keys(&[Keycode::char('q'), Keycode::CTRL_C, Keycode::char('y')]));
    app.add_module(Greedy);

    assert_eq!(app.step().unwrap().outcome, Outcome::Handled("keep_q".to_string()));
    assert_eq!(app.step().unwrap().outcome, Outcome::Handled("interrupt".to_string()));
    assert!(!app.is_running());
    assert!(!logged(&app, "ctrl+c kept"));
}

#[test]
fn test_raised_stop_flag_ends_run() {
    let mut app = app_with(vec![]);
    app.add_module(Probe::new("probe"));
    let flag = Arc::new(AtomicBool::new(false));
    app.stop_on(Arc::clone(&flag));

    app.step().unwrap();
    assert!(app.is_running());

    flag.store(true, Ordering::Relaxed);
    app.run().unwrap();
    assert!(!app.is_running());
    assert_eq!(app.stats().frames, 1);
}

#[test]
fn test_global_binding_added_by_app() {
    let mut app = app_with(keys(&[Keycode::char('g')]));
    app.add_module(Probe::new("probe"));
    let id = app.bind_global('g', "greet", "say hello", |ctx| {
        ctx.state.messages.info("hello");
        Ok(())
    });

    assert_eq!(app.step().unwrap().outcome, Outcome::Handled("greet".to_string()));
    assert!(app.unbind(id));
    assert!(!app.unbind(id));
}

// ============================================================================
// Text and mouse routing
// ============================================================================

#[test]
fn test_text_reaches_the_current_module() {
    let mut inputs = vec![Input::Key(TEXT_INPUT_KEY)];
    inputs.extend(keys(&[Keycode::char('h'), Keycode::char('i'), Keycode::ENTER]));
    let mut app = app_with(inputs);
    let echo = app.add_module(Echo::default());

    for _ in 0..3 {
        assert_eq!(app.step().unwrap().outcome, Outcome::Idle);
    }
    assert!(screen(&app).contains("> hi_"));

    let report = app.step().unwrap();
    assert_eq!(report.input, Input::Text("hi".to_string()));
    assert_eq!(report.outcome, Outcome::Routed);
    assert_eq!(report.events, 1);

    let echo = app.modules().get_as::<Echo>(echo).unwrap();
    assert_eq!(echo.history().collect::<Vec<_>>(), vec!["> hi"]);
    assert_eq!(echo.echoed(), 1);
    assert!(logged(&app, "echo: hi"));
}

#[test]
fn test_empty_text_is_a_contained_error() {
    let mut app = app_with(keys(&[TEXT_INPUT_KEY, Keycode::ENTER]));
    app.add_module(Echo::default());
    app.step().unwrap();
    match app.step().unwrap().outcome {
        Outcome::Raised(text) => assert_eq!(text, "Echo | nothing to echo"),
        other => panic!("expected a raised hook, got {other:?}"),
    }
}

#[test]
fn test_menu_click_selects_module() {
    // Classic 80x24 layout: the menu starts below the 3-row header
    let click = MouseClick::new(1, 5, mouse::BUTTON1_PRESSED);
    let mut app = app_with(vec![Input::None, Input::Mouse(click)]);
    app.add_module(Probe::new("a"));
    let b = app.add_module(Probe::new("b"));
    app.step().unwrap();

    let menu = app.chrome_panel(PanelKind::Menu).unwrap().region;
    assert_eq!((menu.x, menu.y), (0, 3));

    let report = app.step().unwrap();
    assert_eq!(report.outcome, Outcome::Handled("menu".to_string()));
    assert_eq!(app.current_handle(), Some(b));
}

#[test]
fn test_click_outside_menu_goes_to_module() {
    let click = MouseClick::new(40, 10, mouse::BUTTON3_PRESSED);
    let mut app = app_with(vec![Input::None, Input::Mouse(click)]);
    let echo = app.add_module(Echo::default());
    app.step().unwrap();

    assert_eq!(app.step().unwrap().outcome, Outcome::Routed);
    let echo = app.modules().get_as::<Echo>(echo).unwrap();
    assert_eq!(echo.history().last(), Some("right click at (40, 10)"));
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_on_start_runs_once_per_module() {
    let mut app = app_with(vec![]);
    let early = Probe::new("early");
    let early_starts = Rc::clone(&early.starts);
    app.add_module(early);
    assert_eq!(early_starts.get(), 0);

    app.step().unwrap();
    app.step().unwrap();
    assert_eq!(early_starts.get(), 1);

    let late = Probe::new("late");
    let late_starts = Rc::clone(&late.starts);
    app.add_module(late);
    assert_eq!(late_starts.get(), 1);
}

#[test]
fn test_retire_removes_bindings_and_keeps_selection() {
    let mut app = app_with(keys(&[Keycode::char('c')]));
    let echo = app.add_module(Echo::default());
    let probe = app.add_module(Probe::new("probe"));
    assert!(app.select(echo));
    let bindings_before = app.keymap().len();

    assert!(app.retire(echo));
    assert!(!app.retire(echo));
    assert_eq!(app.keymap().len(), bindings_before - 1);
    assert_eq!(app.current_handle(), Some(probe));
    assert_eq!(app.modules().names(), vec!["probe"]);

    let report = app.step().unwrap();
    assert_eq!(report.outcome, Outcome::NoHandler(Keycode::char('c')));
    assert!(report.recomputed);
}

#[test]
fn test_retire_other_module_keeps_current() {
    let mut app = app_with(vec![]);
    let a = app.add_module(Probe::new("a"));
    app.add_module(Probe::new("b"));
    let c = app.add_module(Probe::new("c"));
    assert!(app.select(c));

    app.retire(a);
    assert_eq!(app.current_handle(), Some(c));
    assert_eq!(app.context().view.current(), 1);
}

#[test]
fn test_retire_stops_module_workers() {
    let mut app = app_with(vec![]);
    let retiring = app.add_module(Clock::new(Duration::from_millis(5)));
    app.add_module(Clock::new(Duration::from_millis(5)));
    app.step().unwrap();
    assert_eq!(app.context().running_workers(), 2);

    assert!(app.retire(retiring));
    assert_eq!(app.context().running_workers(), 1);

    std::thread::sleep(Duration::from_millis(50));
    for _ in 0..3 {
        app.step().unwrap();
    }
    assert_eq!(app.context().running_workers(), 1);

    app.shutdown();
    assert_eq!(app.context().running_workers(), 0);
}

// ============================================================================
// Bus and workers
// ============================================================================

#[test]
fn test_failing_listener_reports_system_error() {
    let mut app = app_with(vec![]);
    app.add_module(Probe::new("probe"));
    app.on_event("custom", |_event, _host| anyhow::bail!("listener broke"));
    app.emitter().emit("custom", serde_json::Value::Null, "test");

    let report = app.step().unwrap();
    assert_eq!(report.events, 2);
    assert!(logged(&app, "listener for custom failed: listener broke"));
    assert_eq!(app.bus_metrics().handler_errors, 1);
}

#[test]
fn test_clock_worker_ticks_through_the_bus() {
    let mut app = app_with(vec![]);
    let clock = app.add_module(Clock::new(Duration::from_millis(5)));

    let mut ticked = false;
    for _ in 0..400 {
        app.step().unwrap();
        if app.modules().get_as::<Clock>(clock).unwrap().ticks() > 0 {
            ticked = true;
            break;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(ticked);
    assert!(logged(&app, "worker clock started"));
    assert_eq!(app.context().running_workers(), 1);

    app.shutdown();
    assert_eq!(app.context().running_workers(), 0);
    assert!(logged(&app, "worker clock stopped"));
}

#[test]
fn test_demo_modules_run_clean() {
    let mut inputs = keys(&[Keycode::f(6), Keycode::f(5), Keycode::f(7)]);
    for _ in 0..4 {
        inputs.push(Input::Key(Keycode::TAB));
        inputs.push(Input::Key(Keycode::UP));
        inputs.push(Input::None);
    }
    let mut app = app_with(inputs);
    app.add_module(deskapp_tui::modules::About);
    app.add_module(deskapp_tui::modules::Fire::default());
    app.add_module(Echo::default());
    app.add_module(Clock::new(Duration::from_millis(50)));

    for _ in 0..20 {
        let report = app.step().unwrap();
        assert!(!matches!(report.outcome, Outcome::Raised(_)), "{report:?}");
    }
    assert!(app.is_running());
    let screen = screen(&app);
    assert!(screen.contains("4 modules"));
    assert!(screen.contains("frames"));
    app.shutdown();
    assert_eq!(app.context().running_workers(), 0);
}
