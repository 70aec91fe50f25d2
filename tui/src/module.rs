//! Module Contract
//!
//! A module is one pluggable screen: it renders into its own panel in the
//! main region, may render the secondary panels (info strip, right sidebar,
//! floating overlay) while it is the current module, and receives text
//! input, mouse clicks and its own keybindings.
//!
//! # Rendering
//!
//! Each render hook returns a [`Render`]:
//! - `Render::Handled` - the module drew into the panel itself
//! - `Render::Lines(..)` - the loop blits these lines into the panel
//!
//! Secondary hooks are only called for capabilities the module declares in
//! [`Module::capabilities`]; otherwise the application draws a default.
//!
//! # Ownership
//!
//! Modules live in a [`ModuleArena`]. Handles stay valid until the module is
//! retired, and retiring one never shifts the others. All state a module
//! shares with the rest of the application goes through [`Context`], which
//! is handed to every hook by reference.

use std::any::Any;
use std::io;
use std::marker::PhantomData;
use std::ops::BitOr;
use std::time::Duration;

use deskapp_core::bus::{Emitter, Event, EventBus, ListenerId};
use deskapp_core::keycodes::{Keycode, MouseClick};
use deskapp_core::keymap::{BindingId, Keymap, OwnerId};
use deskapp_core::layout::{PanelVisibility, SplitRatios};
use deskapp_core::state::SharedState;
use deskapp_core::worker::{StopOutcome, Worker, WorkerContext, WorkerSet};
use serde_json::Value;

use crate::compositor::Panel;

// ============================================================================
// Capabilities and render results
// ============================================================================

/// Panels a module can render into
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Nothing
    pub const NONE: Self = Self(0);
    /// Its own panel in the main region
    pub const PRIMARY: Self = Self(1);
    /// The 3-row info strip
    pub const INFO: Self = Self(1 << 1);
    /// The right sidebar
    pub const RIGHT: Self = Self(1 << 2);
    /// The floating overlay
    pub const FLOATING: Self = Self(1 << 3);

    /// Whether every capability in `other` is present
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::PRIMARY
    }
}

/// What a render hook produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Render {
    /// The hook drew into the panel itself
    Handled,
    /// Lines for the loop to draw, top to bottom
    Lines(Vec<String>),
}

impl Render {
    /// Lines from anything displayable
    pub fn lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Lines(lines.into_iter().map(Into::into).collect())
    }

    /// Split a block of text on newlines
    pub fn text(text: &str) -> Self {
        Self::lines(text.lines())
    }
}

// ============================================================================
// Context
// ============================================================================

/// Which module is current, which panels are shown, how the screen is split
#[derive(Clone, Debug, Default)]
pub struct ViewState {
    /// Panel toggles
    pub visibility: PanelVisibility,
    /// Split ratios
    pub splits: SplitRatios,
    current: usize,
    module_count: usize,
}

impl ViewState {
    /// View with the given toggles and splits and no modules
    pub fn new(visibility: PanelVisibility, splits: SplitRatios) -> Self {
        Self {
            visibility,
            splits,
            current: 0,
            module_count: 0,
        }
    }

    /// Index of the current module in menu order
    pub fn current(&self) -> usize {
        self.current
    }

    /// Number of modules
    pub fn module_count(&self) -> usize {
        self.module_count
    }

    /// Make the module at `index` current; `false` if out of range
    pub fn select(&mut self, index: usize) -> bool {
        if index < self.module_count {
            self.current = index;
            true
        } else {
            false
        }
    }

    /// Advance to the next module, wrapping around
    pub fn next_module(&mut self) {
        if self.module_count > 0 {
            self.current = (self.current + 1) % self.module_count;
        }
    }

    /// Go back to the previous module, wrapping around
    pub fn prev_module(&mut self) {
        if self.module_count > 0 {
            self.current = (self.current + self.module_count - 1) % self.module_count;
        }
    }

    /// Keep `current` in range after the module list changed
    pub(crate) fn set_module_count(&mut self, count: usize) {
        self.module_count = count;
        if self.current >= count {
            self.current = count.saturating_sub(1);
        }
    }
}

/// Everything hooks, handlers and listeners may touch
#[derive(Debug)]
pub struct Context {
    /// Message log and shared values
    pub state: SharedState,
    /// Current module and panel geometry
    pub view: ViewState,
    emitter: Emitter,
    workers: WorkerSet,
    acting: Option<OwnerId>,
    stop: bool,
}

impl Context {
    /// Create a context emitting onto `emitter`
    pub fn new(state: SharedState, view: ViewState, emitter: Emitter) -> Self {
        Self {
            state,
            view,
            emitter,
            workers: WorkerSet::new(),
            acting: None,
            stop: false,
        }
    }

    /// Ask the dispatch loop to stop after this frame
    pub fn request_stop(&mut self) {
        self.stop = true;
    }

    /// Whether a stop was requested
    pub fn stop_requested(&self) -> bool {
        self.stop
    }

    /// Emit an event; it is delivered on a later drain
    pub fn emit(&self, kind: &str, data: Value, source: &str) -> bool {
        self.emitter.emit(kind, data, source)
    }

    /// A producer handle for code that outlives this borrow
    pub fn emitter(&self) -> Emitter {
        self.emitter.clone()
    }

    /// Start a background worker
    ///
    /// A worker started from a module hook, handler or listener belongs to
    /// that module and is stopped when it is retired. All workers are
    /// stopped at shutdown.
    pub fn spawn_worker<F>(&mut self, name: &str, interval: Duration, body: F) -> io::Result<()>
    where
        F: FnMut(&WorkerContext) -> anyhow::Result<()> + Send + 'static,
    {
        let worker = Worker::spawn(name, self.emitter.clone(), interval, body)?;
        match self.acting {
            Some(owner) => {
                tracing::debug!(worker = name, %owner, ?interval, "worker spawned");
                self.workers.add_owned(owner, worker);
            }
            None => {
                tracing::debug!(worker = name, ?interval, "worker spawned");
                self.workers.add(worker);
            }
        }
        Ok(())
    }

    /// Workers still running
    pub fn running_workers(&self) -> usize {
        self.workers.running()
    }

    /// Run `f` on behalf of the module registered under `owner`
    pub(crate) fn acting_as<R>(&mut self, owner: Option<OwnerId>, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.acting, owner);
        let result = f(self);
        self.acting = previous;
        result
    }

    /// Stop the workers a module started
    pub(crate) fn stop_workers_of(&mut self, owner: OwnerId, timeout: Duration) -> Vec<(String, StopOutcome)> {
        self.workers.stop_owned(owner, timeout)
    }

    /// Stop every worker
    pub(crate) fn stop_workers(&mut self, timeout: Duration) -> Vec<(String, StopOutcome)> {
        self.workers.stop_all(timeout)
    }
}

// ============================================================================
// The Module trait
// ============================================================================

/// Access to the concrete type behind `dyn Module`
pub trait AsAny: Any {
    /// `&self` as `&dyn Any`
    fn as_any(&self) -> &dyn Any;
    /// `&mut self` as `&mut dyn Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A pluggable screen
pub trait Module: AsAny {
    /// Name shown in the menu and used as event source
    fn name(&self) -> &str;

    /// Panels this module renders
    fn capabilities(&self) -> Capabilities {
        Capabilities::PRIMARY
    }

    /// Render the module's own panel
    fn render(&mut self, panel: &mut Panel, ctx: &Context) -> anyhow::Result<Render>;

    /// Render the info strip while current
    fn render_info(&mut self, _panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        Ok(Render::Handled)
    }

    /// Render the right sidebar while current
    fn render_right(&mut self, _panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        Ok(Render::Handled)
    }

    /// Render the floating overlay while current
    fn render_floating(&mut self, _panel: &mut Panel, _ctx: &Context) -> anyhow::Result<Render> {
        Ok(Render::Handled)
    }

    /// A line was accepted in text input mode while this module was current
    fn on_text_submitted(&mut self, _text: &str, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// A mouse click arrived while this module was current
    fn on_mouse(&mut self, _click: MouseClick, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once before the first frame
    fn on_start(&mut self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Called once when the application stops or the module is retired
    fn on_shutdown(&mut self, _ctx: &mut Context) -> anyhow::Result<()> {
        Ok(())
    }

    /// Register keybindings scoped to this module
    fn bind_keys(&self, _keys: &mut KeyBinder<'_, Self>)
    where
        Self: Sized,
    {
    }

    /// Register event listeners
    fn subscribe(&self, _events: &mut Subscriber<'_, Self>)
    where
        Self: Sized,
    {
    }
}

// ============================================================================
// Keybinding handlers
// ============================================================================

/// Handler for a module-scoped binding
pub type ModuleHandlerFn = Box<dyn FnMut(&mut dyn Module, &mut Context) -> anyhow::Result<()>>;

/// Handler for an application-wide binding
pub type AppHandlerFn = Box<dyn FnMut(&mut Context) -> anyhow::Result<()>>;

/// What the keymap stores
pub enum KeyAction {
    /// Runs with the current module
    Module(ModuleHandlerFn),
    /// Runs without a module
    App(AppHandlerFn),
}

/// Registers keybindings for one module with typed access to it
pub struct KeyBinder<'a, M> {
    keymap: &'a mut Keymap<KeyAction>,
    owner: OwnerId,
    ids: Vec<BindingId>,
    _module: PhantomData<fn(&mut M)>,
}

impl<'a, M: Module> KeyBinder<'a, M> {
    pub(crate) fn new(keymap: &'a mut Keymap<KeyAction>, owner: OwnerId) -> Self {
        Self {
            keymap,
            owner,
            ids: Vec::new(),
            _module: PhantomData,
        }
    }

    /// The owner id bindings are registered under
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Bind `key` while this module is current
    pub fn bind<F>(&mut self, key: impl Into<Keycode>, name: &str, doc: &str, mut handler: F) -> BindingId
    where
        F: FnMut(&mut M, &mut Context) -> anyhow::Result<()> + 'static,
    {
        let label = name.to_string();
        let action = KeyAction::Module(Box::new(move |module: &mut dyn Module, ctx: &mut Context| {
            let module = module
                .as_any_mut()
                .downcast_mut::<M>()
                .ok_or_else(|| anyhow::anyhow!("{label} is bound to a different module"))?;
            handler(module, ctx)
        }));
        let doc = (!doc.is_empty()).then(|| doc.to_string());
        let id = self.keymap.register(self.owner, key.into(), name, doc, action);
        self.ids.push(id);
        id
    }

    /// Bind `key` for every module
    pub fn bind_global<F>(&mut self, key: impl Into<Keycode>, name: &str, doc: &str, handler: F) -> BindingId
    where
        F: FnMut(&mut Context) -> anyhow::Result<()> + 'static,
    {
        let doc = (!doc.is_empty()).then(|| doc.to_string());
        let id = self
            .keymap
            .register(OwnerId::GLOBAL, key.into(), name, doc, KeyAction::App(Box::new(handler)));
        self.ids.push(id);
        id
    }

    pub(crate) fn into_ids(self) -> Vec<BindingId> {
        self.ids
    }
}

// ============================================================================
// Event listeners
// ============================================================================

/// What bus listeners get: the context plus the modules
pub struct Host {
    /// Shared context
    pub ctx: Context,
    /// All modules
    pub modules: ModuleArena,
}

/// Registers event listeners for one module with typed access to it
pub struct Subscriber<'a, M> {
    bus: &'a mut EventBus<Host>,
    handle: ModuleHandle,
    ids: Vec<(String, ListenerId)>,
    _module: PhantomData<fn(&mut M)>,
}

impl<'a, M: Module> Subscriber<'a, M> {
    pub(crate) fn new(bus: &'a mut EventBus<Host>, handle: ModuleHandle) -> Self {
        Self {
            bus,
            handle,
            ids: Vec::new(),
            _module: PhantomData,
        }
    }

    /// Listen for `kind` (or `"*"`) with access to this module
    pub fn on<F>(&mut self, kind: &str, mut listener: F) -> ListenerId
    where
        F: FnMut(&mut M, &Event, &mut Context) -> anyhow::Result<()> + 'static,
    {
        let handle = self.handle;
        let id = self.bus.on(kind, move |event, host: &mut Host| {
            let Host { ctx, modules } = host;
            let owner = modules.owner(handle);
            match modules
                .get_mut(handle)
                .and_then(|m| m.as_any_mut().downcast_mut::<M>())
            {
                Some(module) => ctx.acting_as(owner, |ctx| listener(module, event, ctx)),
                None => Ok(()),
            }
        });
        self.ids.push((kind.to_string(), id));
        id
    }

    pub(crate) fn into_ids(self) -> Vec<(String, ListenerId)> {
        self.ids
    }
}

// ============================================================================
// Arena
// ============================================================================

/// Stable handle to a module
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleHandle(usize);

struct Slot {
    module: Box<dyn Module>,
    owner: OwnerId,
    bindings: Vec<BindingId>,
    listeners: Vec<(String, ListenerId)>,
}

/// A module taken out of the arena
pub struct Retired {
    /// The module
    pub module: Box<dyn Module>,
    /// Its keybinding owner
    pub owner: OwnerId,
    /// Its bindings
    pub bindings: Vec<BindingId>,
    /// Its listeners
    pub listeners: Vec<(String, ListenerId)>,
}

/// Modules in menu order with handles that survive removals
#[derive(Default)]
pub struct ModuleArena {
    slots: Vec<Option<Slot>>,
    order: Vec<ModuleHandle>,
}

impl ModuleArena {
    /// Empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a handle for a module about to be inserted
    pub(crate) fn next_handle(&self) -> ModuleHandle {
        ModuleHandle(self.slots.len())
    }

    pub(crate) fn insert(
        &mut self,
        module: Box<dyn Module>,
        owner: OwnerId,
        bindings: Vec<BindingId>,
        listeners: Vec<(String, ListenerId)>,
    ) -> ModuleHandle {
        let handle = self.next_handle();
        self.slots.push(Some(Slot {
            module,
            owner,
            bindings,
            listeners,
        }));
        self.order.push(handle);
        handle
    }

    pub(crate) fn remove(&mut self, handle: ModuleHandle) -> Option<Retired> {
        let slot = self.slots.get_mut(handle.0)?.take()?;
        self.order.retain(|h| *h != handle);
        Some(Retired {
            module: slot.module,
            owner: slot.owner,
            bindings: slot.bindings,
            listeners: slot.listeners,
        })
    }

    /// A module by handle
    pub fn get(&self, handle: ModuleHandle) -> Option<&dyn Module> {
        self.slots
            .get(handle.0)
            .and_then(Option::as_ref)
            .map(|slot| &*slot.module)
    }

    /// A module by handle, mutably
    pub fn get_mut(&mut self, handle: ModuleHandle) -> Option<&mut dyn Module> {
        match self.slots.get_mut(handle.0) {
            Some(Some(slot)) => Some(&mut *slot.module),
            _ => None,
        }
    }

    /// A module by handle, downcast to its concrete type
    pub fn get_as<M: Module>(&self, handle: ModuleHandle) -> Option<&M> {
        self.get(handle).and_then(|m| m.as_any().downcast_ref::<M>())
    }

    /// Keybinding owner of a module
    pub fn owner(&self, handle: ModuleHandle) -> Option<OwnerId> {
        self.slots.get(handle.0).and_then(Option::as_ref).map(|s| s.owner)
    }

    /// Handle at a menu position
    pub fn handle_at(&self, index: usize) -> Option<ModuleHandle> {
        self.order.get(index).copied()
    }

    /// Menu position of a handle
    pub fn index_of(&self, handle: ModuleHandle) -> Option<usize> {
        self.order.iter().position(|h| *h == handle)
    }

    /// Handles in menu order
    pub fn handles(&self) -> &[ModuleHandle] {
        &self.order
    }

    /// Names in menu order
    pub fn names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter_map(|h| self.get(*h).map(|m| m.name().to_string()))
            .collect()
    }

    /// Number of live modules
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether there are no modules
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
