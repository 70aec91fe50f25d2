//! Main Application
//!
//! The App owns every piece of the framework and runs the dispatch loop:
//!
//! ```text
//!  ┌──────────────────────────── one frame (App::step) ────────────────────────────┐
//!  │ 1. poll one input (never blocks)                                              │
//!  │ 2. resize  → refit surface, mark layout dirty                                 │
//!  │    key     → keymap.resolve(key, current owner) → handler (errors contained)  │
//!  │              (ctrl+c always resolves as the app itself)                       │
//!  │    text    → current module on_text_submitted                                 │
//!  │    mouse   → menu selection or current module on_mouse                        │
//!  │ 3. drain the event bus within the per-frame budget                            │
//!  │ 4. layout key changed or dirty → recompute, recreate every panel              │
//!  │ 5. render every module, raise the current one, render secondary panels        │
//!  │ 6. repaint chrome (header, footer, menu, messages), draw                      │
//!  └───────────────────────────────────────────────────────────────────────────────┘
//!  App::run: step, then sleep out the frame budget, until a handler asks to stop;
//!  then shutdown hooks, workers stopped, terminal restored.
//! ```
//!
//! Nothing a module or handler does can end the loop except asking it to
//! stop. Errors from handlers and hooks land in the message log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use deskapp_core::bus::{
    BusMetrics, Emitter, Event, EventBus, ListenerId, SYSTEM_ERROR, WORKER_ERROR, WORKER_STARTED,
    WORKER_STOPPED,
};
use deskapp_core::config::DeskConfig;
use deskapp_core::frame::{FramePacer, FrameStats};
use deskapp_core::keycodes::{Keycode, MouseClick};
use deskapp_core::keymap::{BindingId, Keymap, OwnerId};
use deskapp_core::layout::{LayoutEngine, LayoutKey, PanelKind};
use deskapp_core::state::SharedState;
use deskapp_core::worker::StopOutcome;
use deskapp_core::DeskError;
use ratatui::backend::Backend;

use crate::chrome;
use crate::compositor::{Compositor, Panel, PanelId};
use crate::module::{
    Capabilities, Context, Host, KeyAction, KeyBinder, Module, ModuleArena, ModuleHandle, Render,
    Subscriber, ViewState,
};
use crate::surface::{Input, Surface, TerminalGuard};
use crate::theme::Pair;

/// Stacking bands
const Z_CHROME: i32 = 0;
const Z_MODULE: i32 = 1;
const Z_SECONDARY: i32 = 2;
const Z_FLOATING: i32 = 10;

/// Menu split step for `[` and `]`
const H_SPLIT_STEP: f64 = 0.05;
/// Messages split step for `-` and `+`
const V_SPLIT_STEP: f64 = 0.02;

/// How long shutdown waits for each worker
const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// Frame reports
// ============================================================================

/// What the input of a frame led to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// No input
    Idle,
    /// A binding ran; its name
    Handled(String),
    /// A key had no binding for the current module
    NoHandler(Keycode),
    /// A binding or hook returned an error; the logged message
    Raised(String),
    /// Text or a click was delivered to a module
    Routed,
    /// The terminal was resized
    Resized,
}

/// Summary of one frame
#[derive(Clone, Debug)]
pub struct FrameReport {
    /// Frame number, starting at 1
    pub frame: u64,
    /// The input polled this frame
    pub input: Input,
    /// What the input did
    pub outcome: Outcome,
    /// Events drained from the bus
    pub events: usize,
    /// Whether the layout was recomputed and panels recreated
    pub recomputed: bool,
    /// Time spent in the frame body
    pub elapsed: Duration,
    /// Sleep owed to the frame budget
    pub sleep: Duration,
}

// ============================================================================
// App
// ============================================================================

/// Panels of the current layout
#[derive(Debug, Default)]
struct PanelMap {
    chrome: HashMap<PanelKind, PanelId>,
    modules: HashMap<ModuleHandle, PanelId>,
}

/// The application: surface, modules, keymap, bus and loop state
pub struct App<B: Backend> {
    surface: Surface<B>,
    compositor: Compositor,
    layout: LayoutEngine,
    keymap: Keymap<KeyAction>,
    bus: EventBus<Host>,
    host: Host,
    panels: PanelMap,
    pacer: FramePacer,
    stats: FrameStats,
    title: String,
    max_events_per_frame: usize,
    max_time_per_frame: Duration,
    guard: Option<TerminalGuard>,
    started: bool,
    shut_down: bool,
    stop_flag: Option<Arc<AtomicBool>>,
    hook_errors: HashMap<(ModuleHandle, &'static str), String>,
}

impl<B: Backend> App<B> {
    /// Create an application drawing on `surface`
    pub fn new(surface: Surface<B>, config: &DeskConfig) -> Self {
        let mut bus = EventBus::new(config.bus_capacity);
        let ctx = Context::new(
            SharedState::new(config.message_log_capacity),
            ViewState::new(config.visibility, config.splits),
            bus.emitter(),
        );

        let mut keymap = Keymap::new();
        register_core_bindings(&mut keymap);
        register_core_listeners(&mut bus);

        Self {
            surface,
            compositor: Compositor::new(),
            layout: LayoutEngine::new(),
            keymap,
            bus,
            host: Host {
                ctx,
                modules: ModuleArena::new(),
            },
            panels: PanelMap::default(),
            pacer: FramePacer::from_fps(config.fps),
            stats: FrameStats::default(),
            title: config.title.clone(),
            max_events_per_frame: config.max_events_per_frame,
            max_time_per_frame: config.max_time_per_frame,
            guard: None,
            started: false,
            shut_down: false,
            stop_flag: None,
            hook_errors: HashMap::new(),
        }
    }

    /// Restore the terminal through `guard` when the app shuts down
    pub fn attach_guard(&mut self, guard: TerminalGuard) {
        self.guard = Some(guard);
    }

    /// Stop after the current frame once `flag` is raised
    ///
    /// Meant for the flag returned by
    /// [`install_signal_handlers`](crate::surface::install_signal_handlers).
    pub fn stop_on(&mut self, flag: Arc<AtomicBool>) {
        self.stop_flag = Some(flag);
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// Add a module at the end of the menu
    ///
    /// Its keybindings and listeners are registered now, under a fresh owner.
    pub fn add_module<M: Module>(&mut self, module: M) -> ModuleHandle {
        let owner = OwnerId::next();
        let handle = self.host.modules.next_handle();

        let mut keys = KeyBinder::new(&mut self.keymap, owner);
        module.bind_keys(&mut keys);
        let bindings = keys.into_ids();

        let mut events = Subscriber::new(&mut self.bus, handle);
        module.subscribe(&mut events);
        let listeners = events.into_ids();

        let caps = module.capabilities();
        if !caps.contains(Capabilities::PRIMARY) {
            tracing::warn!(module = module.name(), "module does not render a primary panel");
        }
        tracing::info!(
            module = module.name(),
            %owner,
            bindings = bindings.len(),
            listeners = listeners.len(),
            "module added"
        );

        let inserted = self
            .host
            .modules
            .insert(Box::new(module), owner, bindings, listeners);
        debug_assert_eq!(inserted, handle);

        self.host.ctx.view.set_module_count(self.host.modules.len());
        self.layout.mark_dirty();

        if self.started {
            self.start_module(handle);
        }
        handle
    }

    /// Remove a module with its bindings, listeners and workers
    ///
    /// Other handles stay valid; the current module stays current if it was
    /// not the one retired.
    pub fn retire(&mut self, handle: ModuleHandle) -> bool {
        let current = self.current_handle();
        let Some(mut retired) = self.host.modules.remove(handle) else {
            return false;
        };

        let mut removed = 0;
        for id in &retired.bindings {
            removed += usize::from(self.keymap.unregister(*id));
        }
        removed += self.keymap.unregister_owner(retired.owner);
        for (kind, id) in &retired.listeners {
            self.bus.off(kind, *id);
        }

        let module = &mut retired.module;
        let result = self
            .host
            .ctx
            .acting_as(Some(retired.owner), |ctx| module.on_shutdown(ctx));
        if let Err(e) = result {
            self.report_error(retired.module.name(), "on_shutdown", &e);
        }
        let workers = self.host.ctx.stop_workers_of(retired.owner, WORKER_STOP_TIMEOUT);
        for (worker, outcome) in &workers {
            if *outcome == StopOutcome::Abandoned {
                tracing::warn!(worker = %worker, "worker abandoned on retire");
            }
        }
        tracing::info!(
            module = retired.module.name(),
            bindings = removed,
            listeners = retired.listeners.len(),
            workers = workers.len(),
            "module retired"
        );

        let view = &mut self.host.ctx.view;
        view.set_module_count(self.host.modules.len());
        if let Some(index) = current.and_then(|h| self.host.modules.index_of(h)) {
            view.select(index);
        }
        self.hook_errors.retain(|(h, _), _| *h != handle);
        self.layout.mark_dirty();
        true
    }

    /// Handle of the current module
    pub fn current_handle(&self) -> Option<ModuleHandle> {
        self.host.modules.handle_at(self.host.ctx.view.current())
    }

    /// Make the module current
    pub fn select(&mut self, handle: ModuleHandle) -> bool {
        match self.host.modules.index_of(handle) {
            Some(index) => self.host.ctx.view.select(index),
            None => false,
        }
    }

    // ========================================================================
    // Application-level registration
    // ========================================================================

    /// Bind a key for every module
    pub fn bind_global<F>(&mut self, key: impl Into<Keycode>, name: &str, doc: &str, handler: F) -> BindingId
    where
        F: FnMut(&mut Context) -> anyhow::Result<()> + 'static,
    {
        let doc = (!doc.is_empty()).then(|| doc.to_string());
        self.keymap
            .register(OwnerId::GLOBAL, key.into(), name, doc, KeyAction::App(Box::new(handler)))
    }

    /// Remove a binding
    pub fn unbind(&mut self, id: BindingId) -> bool {
        self.keymap.unregister(id)
    }

    /// Listen for an event type with access to the context and modules
    pub fn on_event<F>(&mut self, kind: &str, listener: F) -> ListenerId
    where
        F: FnMut(&Event, &mut Host) -> anyhow::Result<()> + 'static,
    {
        self.bus.on(kind, listener)
    }

    /// Remove an event listener
    pub fn off_event(&mut self, kind: &str, id: ListenerId) -> bool {
        self.bus.off(kind, id)
    }

    /// A producer handle for workers and other threads
    pub fn emitter(&self) -> Emitter {
        self.bus.emitter()
    }

    // ========================================================================
    // Loop
    // ========================================================================

    /// Play the splash animation
    pub fn splash(&mut self) -> Result<(), DeskError> {
        self.surface.splash(&self.title, &self.pacer)?;
        Ok(())
    }

    /// Whether the loop should keep going
    pub fn is_running(&self) -> bool {
        !self.shut_down && !self.host.ctx.stop_requested() && !self.signalled()
    }

    fn signalled(&self) -> bool {
        self.stop_flag
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Run frames until a handler asks to stop, then shut down
    ///
    /// Shutdown runs even when a frame fails.
    pub fn run(&mut self) -> Result<(), DeskError> {
        let result = self.run_frames();
        if let Err(e) = &result {
            tracing::error!(error = %e, "dispatch loop failed");
        }
        self.shutdown();
        result
    }

    fn run_frames(&mut self) -> Result<(), DeskError> {
        while self.is_running() {
            let frame_start = Instant::now();
            self.step()?;
            if !self.is_running() {
                break;
            }
            self.pacer.pace(frame_start);
        }
        Ok(())
    }

    /// Run exactly one frame
    pub fn step(&mut self) -> Result<FrameReport, DeskError> {
        let frame_start = Instant::now();
        if !self.started {
            self.start();
        }

        let input = self.surface.poll()?;
        let outcome = self.dispatch(&input)?;
        if self.signalled() && !self.host.ctx.stop_requested() {
            tracing::info!("stop signal received");
            self.host.ctx.request_stop();
        }

        let events = self.bus.process_events(
            &mut self.host,
            self.max_events_per_frame,
            self.max_time_per_frame,
        );

        let recomputed = self.refresh_layout()?;
        self.render()?;

        let elapsed = frame_start.elapsed();
        self.stats.record(elapsed, self.pacer.budget());
        Ok(FrameReport {
            frame: self.stats.frames,
            input,
            outcome,
            events,
            recomputed,
            elapsed,
            sleep: self.pacer.sleep_for(elapsed),
        })
    }

    /// Run shutdown hooks, stop workers, restore the terminal
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.host.ctx.request_stop();

        for handle in self.host.modules.handles().to_vec() {
            let Some(module) = self.host.modules.get_mut(handle) else {
                continue;
            };
            if let Err(e) = module.on_shutdown(&mut self.host.ctx) {
                let name = module.name().to_string();
                self.report_error(&name, "on_shutdown", &e);
            }
        }

        for (worker, outcome) in self.host.ctx.stop_workers(WORKER_STOP_TIMEOUT) {
            if outcome == StopOutcome::Abandoned {
                tracing::warn!(worker = %worker, "worker abandoned at shutdown");
            }
        }
        // Deliver the last worker.stopped events to the log
        self.bus.process_events(
            &mut self.host,
            self.max_events_per_frame,
            self.max_time_per_frame,
        );

        if let Some(mut guard) = self.guard.take() {
            guard.restore();
        }
        tracing::info!(
            frames = self.stats.frames,
            overruns = self.stats.overruns,
            "deskapp stopped"
        );
    }

    fn start(&mut self) {
        self.started = true;
        for handle in self.host.modules.handles().to_vec() {
            self.start_module(handle);
        }
        self.host.ctx.state.messages.info(format!("{} ready", self.title));
    }

    fn start_module(&mut self, handle: ModuleHandle) {
        let owner = self.host.modules.owner(handle);
        let Some(module) = self.host.modules.get_mut(handle) else {
            return;
        };
        let result = self.host.ctx.acting_as(owner, |ctx| module.on_start(ctx));
        if let Err(e) = result {
            let name = module.name().to_string();
            self.report_error(&name, "on_start", &e);
        }
    }

    // ========================================================================
    // Input dispatch
    // ========================================================================

    fn dispatch(&mut self, input: &Input) -> Result<Outcome, DeskError> {
        let outcome = match input {
            Input::None => Outcome::Idle,
            Input::Resize(width, height) => {
                tracing::debug!(width, height, "terminal resized");
                self.surface.refit()?;
                self.layout.mark_dirty();
                Outcome::Resized
            }
            Input::Key(key) => self.dispatch_key(*key),
            Input::Text(text) => self.route_text(text),
            Input::Mouse(click) => self.route_mouse(*click),
        };
        Ok(outcome)
    }

    fn dispatch_key(&mut self, key: Keycode) -> Outcome {
        let current = self.current_handle();
        // Interrupt keys resolve as the app so no module can shadow them
        let owner = if key == Keycode::CTRL_C {
            OwnerId::APP
        } else {
            current
                .and_then(|h| self.host.modules.owner(h))
                .unwrap_or(OwnerId::APP)
        };

        let binding = match self.keymap.resolve_mut(key, owner) {
            Ok(binding) => binding,
            Err(e) => {
                tracing::debug!(%key, %owner, "no handler for key");
                self.host.ctx.state.messages.info(e.to_string());
                return Outcome::NoHandler(key);
            }
        };

        let name = binding.name.clone();
        let result = match &mut binding.handler {
            KeyAction::App(handler) => handler(&mut self.host.ctx),
            KeyAction::Module(handler) => match current.and_then(|h| self.host.modules.get_mut(h)) {
                Some(module) => self
                    .host
                    .ctx
                    .acting_as(Some(owner), |ctx| handler(module, ctx)),
                None => Err(anyhow::anyhow!("no current module")),
            },
        };

        match result {
            Ok(()) => {
                tracing::debug!(%key, handler = %name, "key handled");
                Outcome::Handled(name)
            }
            Err(e) => Outcome::Raised(self.report_error(&name, "handler", &e)),
        }
    }

    fn route_text(&mut self, text: &str) -> Outcome {
        let current = self.current_handle();
        let owner = current.and_then(|h| self.host.modules.owner(h));
        let Some(module) = current.and_then(|h| self.host.modules.get_mut(h)) else {
            self.host.ctx.state.messages.info("no module to receive text");
            return Outcome::Idle;
        };

        let result = self
            .host
            .ctx
            .acting_as(owner, |ctx| module.on_text_submitted(text, ctx));
        match result {
            Ok(()) => Outcome::Routed,
            Err(e) => {
                let name = module.name().to_string();
                Outcome::Raised(self.report_error(&name, "on_text_submitted", &e))
            }
        }
    }

    fn route_mouse(&mut self, click: MouseClick) -> Outcome {
        if let Some(index) = self.menu_entry_at(click) {
            if self.host.ctx.view.select(index) {
                return Outcome::Handled("menu".to_string());
            }
        }

        let current = self.current_handle();
        let owner = current.and_then(|h| self.host.modules.owner(h));
        let Some(module) = current.and_then(|h| self.host.modules.get_mut(h)) else {
            return Outcome::Idle;
        };
        let result = self
            .host
            .ctx
            .acting_as(owner, |ctx| module.on_mouse(click, ctx));
        match result {
            Ok(()) => Outcome::Routed,
            Err(e) => {
                let name = module.name().to_string();
                Outcome::Raised(self.report_error(&name, "on_mouse", &e))
            }
        }
    }

    fn menu_entry_at(&self, click: MouseClick) -> Option<usize> {
        let id = self.panels.chrome.get(&PanelKind::Menu)?;
        let panel = self.compositor.panel(*id)?;
        let (_, row) = panel.to_inner(click.x, click.y)?;
        Some(chrome::menu_index_at(
            row,
            panel.inner().height,
            self.host.ctx.view.current(),
        ))
    }

    /// Log a contained failure and return the logged text
    fn report_error(&mut self, handler: &str, hook: &str, error: &anyhow::Error) -> String {
        let err = DeskError::handler_raised(handler, error);
        let text = err.to_string();
        tracing::warn!(handler, hook, error = %format!("{error:#}"), "handler failed");
        self.host.ctx.state.messages.error(text.clone());
        text
    }

    // ========================================================================
    // Layout and rendering
    // ========================================================================

    fn refresh_layout(&mut self) -> Result<bool, DeskError> {
        let (width, height) = self.surface.size()?;
        let view = &self.host.ctx.view;
        let key = LayoutKey {
            width,
            height,
            visibility: view.visibility,
            splits: view.splits,
        };
        if !self.layout.refresh(key) {
            return Ok(false);
        }
        self.rebuild_panels();
        Ok(true)
    }

    /// Discard every panel and create the set the current plan calls for
    fn rebuild_panels(&mut self) {
        self.compositor.clear();
        self.panels = PanelMap::default();
        let plan = *self.layout.plan();

        for (kind, region) in plan.iter() {
            if kind == PanelKind::Main && !self.host.modules.is_empty() {
                for handle in self.host.modules.handles() {
                    let label = self
                        .host
                        .modules
                        .get(*handle)
                        .map(|m| m.name().to_string())
                        .unwrap_or_default();
                    let id = self.compositor.create_panel(label, region, Z_MODULE, true);
                    self.panels.modules.insert(*handle, id);
                }
                continue;
            }

            let (z_index, bordered) = match kind {
                PanelKind::Header => (Z_CHROME, false),
                PanelKind::Info | PanelKind::Right => (Z_SECONDARY, true),
                PanelKind::Floating => (Z_FLOATING, true),
                _ => (Z_CHROME, true),
            };
            let id = self
                .compositor
                .create_panel(kind.label(), region, z_index, bordered);
            self.panels.chrome.insert(kind, id);
        }
        tracing::debug!(panels = self.compositor.len(), "panels recreated");
    }

    fn render(&mut self) -> Result<(), DeskError> {
        let current = self.current_handle();
        let mut failures = Vec::new();

        // Every module renders into its own panel
        for handle in self.host.modules.handles().to_vec() {
            let Some(id) = self.panels.modules.get(&handle) else {
                continue;
            };
            let (Some(panel), Some(module)) = (
                self.compositor.panel_mut(*id),
                self.host.modules.get_mut(handle),
            ) else {
                continue;
            };
            panel.clear();
            let result = module.render(panel, &self.host.ctx);
            if let Some(failure) = apply_render(panel, result) {
                failures.push((handle, module.name().to_string(), "render", failure));
            } else {
                self.hook_errors.remove(&(handle, "render"));
            }
        }
        if let Some(id) = current.and_then(|h| self.panels.modules.get(&h)) {
            self.compositor.raise(*id);
        }

        self.render_secondary(current, &mut failures);
        self.render_chrome(current);

        for (handle, name, hook, error) in failures {
            self.report_render_failure(handle, &name, hook, &error);
        }

        self.surface.draw(&self.compositor)?;
        Ok(())
    }

    fn render_secondary(
        &mut self,
        current: Option<ModuleHandle>,
        failures: &mut Vec<(ModuleHandle, String, &'static str, anyhow::Error)>,
    ) {
        let owner = current.and_then(|h| self.host.modules.owner(h));
        let module_keys = owner.map(|o| self.keymap.bindings_for(o)).unwrap_or_default();

        for (kind, cap, hook) in [
            (PanelKind::Info, Capabilities::INFO, "render_info"),
            (PanelKind::Right, Capabilities::RIGHT, "render_right"),
            (PanelKind::Floating, Capabilities::FLOATING, "render_floating"),
        ] {
            let Some(id) = self.panels.chrome.get(&kind) else {
                continue;
            };
            let Some(panel) = self.compositor.panel_mut(*id) else {
                continue;
            };
            panel.clear();

            let module = current.and_then(|h| self.host.modules.get_mut(h).map(|m| (h, m)));
            match module {
                Some((handle, module)) if module.capabilities().contains(cap) => {
                    let result = match kind {
                        PanelKind::Info => module.render_info(panel, &self.host.ctx),
                        PanelKind::Right => module.render_right(panel, &self.host.ctx),
                        _ => module.render_floating(panel, &self.host.ctx),
                    };
                    if let Some(failure) = apply_render(panel, result) {
                        failures.push((handle, module.name().to_string(), hook, failure));
                    }
                }
                other => {
                    let name = other.map(|(_, m)| m.name().to_string());
                    match kind {
                        PanelKind::Info => chrome::default_info(panel, name.as_deref(), &module_keys),
                        PanelKind::Right => {
                            let mut keys = module_keys.clone();
                            keys.extend(self.keymap.bindings_for(OwnerId::APP));
                            chrome::default_right(panel, &keys);
                        }
                        _ => chrome::default_floating(panel, &self.stats, &self.bus.metrics()),
                    }
                }
            }
        }
    }

    fn render_chrome(&mut self, current: Option<ModuleHandle>) {
        let module_name = current
            .and_then(|h| self.host.modules.get(h))
            .map(|m| m.name().to_string());
        let typing = self
            .surface
            .line()
            .is_active()
            .then(|| self.surface.line().text().to_string());

        for (kind, id) in &self.panels.chrome {
            let Some(panel) = self.compositor.panel_mut(*id) else {
                continue;
            };
            match kind {
                PanelKind::Header => {
                    panel.clear();
                    chrome::header(panel, &self.title, module_name.as_deref());
                }
                PanelKind::Footer => {
                    panel.clear();
                    chrome::footer(panel, typing.as_deref());
                }
                PanelKind::Menu => {
                    panel.clear();
                    chrome::menu(panel, &self.host.modules.names(), self.host.ctx.view.current());
                }
                PanelKind::Messages => {
                    panel.clear();
                    chrome::messages(panel, &self.host.ctx.state.messages);
                }
                PanelKind::Main => {
                    panel.clear();
                    panel.put_line(0, "no modules", Pair::Dim.style());
                }
                _ => {}
            }
        }
    }

    /// Log a render failure once until the error changes or the hook recovers
    fn report_render_failure(&mut self, handle: ModuleHandle, name: &str, hook: &'static str, error: &anyhow::Error) {
        let text = format!("{error:#}");
        if self.hook_errors.get(&(handle, hook)) == Some(&text) {
            return;
        }
        self.report_error(name, hook, error);
        self.hook_errors.insert((handle, hook), text);
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The render surface
    pub fn surface(&self) -> &Surface<B> {
        &self.surface
    }

    /// The render surface, mutably
    pub fn surface_mut(&mut self) -> &mut Surface<B> {
        &mut self.surface
    }

    /// Shared context
    pub fn context(&self) -> &Context {
        &self.host.ctx
    }

    /// Shared context, mutably
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.host.ctx
    }

    /// The modules
    pub fn modules(&self) -> &ModuleArena {
        &self.host.modules
    }

    /// The keymap
    pub fn keymap(&self) -> &Keymap<KeyAction> {
        &self.keymap
    }

    /// The compositor
    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Panel of a module in the current layout
    pub fn module_panel(&self, handle: ModuleHandle) -> Option<&Panel> {
        self.panels
            .modules
            .get(&handle)
            .and_then(|id| self.compositor.panel(*id))
    }

    /// Built-in panel in the current layout
    pub fn chrome_panel(&self, kind: PanelKind) -> Option<&Panel> {
        self.panels
            .chrome
            .get(&kind)
            .and_then(|id| self.compositor.panel(*id))
    }

    /// Layout passes run so far
    pub fn layout_passes(&self) -> u64 {
        self.layout.passes()
    }

    /// Bus counters
    pub fn bus_metrics(&self) -> BusMetrics {
        self.bus.metrics()
    }

    /// Frame counters
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// The frame pacer
    pub fn pacer(&self) -> FramePacer {
        self.pacer
    }
}

/// Blit `Render::Lines`; hand back the error of a failed hook
fn apply_render(panel: &mut Panel, result: anyhow::Result<Render>) -> Option<anyhow::Error> {
    match result {
        Ok(Render::Handled) => None,
        Ok(Render::Lines(lines)) => {
            panel.write_lines(&lines, Pair::Text.style());
            None
        }
        Err(e) => Some(e),
    }
}

// ============================================================================
// Built-in bindings and listeners
// ============================================================================

fn core_binding<F>(keymap: &mut Keymap<KeyAction>, key: Keycode, name: &str, doc: &str, handler: F)
where
    F: FnMut(&mut Context) -> anyhow::Result<()> + 'static,
{
    keymap.register(
        OwnerId::APP,
        key,
        name,
        Some(doc.to_string()),
        KeyAction::App(Box::new(handler)),
    );
}

fn register_core_bindings(keymap: &mut Keymap<KeyAction>) {
    core_binding(keymap, Keycode::char('q'), "quit", "quit", |ctx| {
        ctx.request_stop();
        Ok(())
    });
    core_binding(keymap, Keycode::CTRL_C, "interrupt", "quit now", |ctx| {
        ctx.request_stop();
        Ok(())
    });

    for key in [Keycode::TAB, Keycode::PAGE_DOWN] {
        core_binding(keymap, key, "next_module", "next module", |ctx| {
            ctx.view.next_module();
            Ok(())
        });
    }
    for key in [Keycode::BACKTAB, Keycode::PAGE_UP] {
        core_binding(keymap, key, "prev_module", "previous module", |ctx| {
            ctx.view.prev_module();
            Ok(())
        });
    }

    let toggles = [
        PanelKind::Header,
        PanelKind::Footer,
        PanelKind::Menu,
        PanelKind::Messages,
        PanelKind::Right,
        PanelKind::Info,
        PanelKind::Floating,
    ];
    for (n, kind) in (1u8..).zip(toggles) {
        let name = format!("toggle_{}", kind.label());
        let doc = format!("toggle {}", kind.label());
        core_binding(keymap, Keycode::f(n), &name, &doc, move |ctx| {
            let shown = ctx.view.visibility.toggle(kind);
            tracing::debug!(panel = kind.label(), shown, "panel toggled");
            Ok(())
        });
    }

    core_binding(keymap, Keycode::char('['), "shrink_menu", "narrower menu", |ctx| {
        ctx.view.splits.adjust_h(-H_SPLIT_STEP);
        Ok(())
    });
    core_binding(keymap, Keycode::char(']'), "grow_menu", "wider menu", |ctx| {
        ctx.view.splits.adjust_h(H_SPLIT_STEP);
        Ok(())
    });
    core_binding(keymap, Keycode::char('-'), "shrink_messages", "fewer message rows", |ctx| {
        ctx.view.splits.adjust_v(-V_SPLIT_STEP);
        Ok(())
    });
    core_binding(keymap, Keycode::char('+'), "grow_messages", "more message rows", |ctx| {
        ctx.view.splits.adjust_v(V_SPLIT_STEP);
        Ok(())
    });
}

fn register_core_listeners(bus: &mut EventBus<Host>) {
    bus.on(SYSTEM_ERROR, |event, host: &mut Host| {
        let error = event.str_field("error").unwrap_or("unknown error");
        let failed = event.str_field("event_type").unwrap_or("?");
        host.ctx
            .state
            .messages
            .error(format!("listener for {failed} failed: {error}"));
        Ok(())
    });

    bus.on(WORKER_ERROR, |event, host: &mut Host| {
        let worker = event.str_field("worker").unwrap_or(&event.source);
        let error = event.str_field("error").unwrap_or("unknown error");
        let err = DeskError::Worker {
            worker: worker.to_string(),
            error: error.to_string(),
        };
        host.ctx.state.messages.error(err.to_string());
        Ok(())
    });

    bus.on(WORKER_STARTED, |event, host: &mut Host| {
        host.ctx
            .state
            .messages
            .info(format!("worker {} started", event.source));
        Ok(())
    });

    bus.on(WORKER_STOPPED, |event, host: &mut Host| {
        host.ctx
            .state
            .messages
            .info(format!("worker {} stopped", event.source));
        Ok(())
    });
}
