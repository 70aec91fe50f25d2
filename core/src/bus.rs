//! Event Bus
//!
//! A bounded FIFO that decouples background workers from the single-threaded
//! dispatch loop.
//!
//! # Architecture
//!
//! ```text
//!   worker thread ──┐
//!   worker thread ──┼── Emitter::emit ──► [ bounded queue ] ──► EventBus::process_events
//!   main thread   ──┘      (Send + Sync)     (drop on full)      (main thread only,
//!                                                                  budgeted per frame)
//! ```
//!
//! Producers hold a cloneable [`Emitter`]; emitting never blocks and a full
//! queue drops the event and counts it. Listeners live on the [`EventBus`]
//! itself, which is owned by the dispatch loop, so they can take the loop's
//! context by `&mut` without any locking.
//!
//! # Listener failures
//!
//! A listener returning an error is counted and reported as a
//! [`SYSTEM_ERROR`] event. Failures while handling a `system.error` event are
//! only counted, never re-emitted, so a broken error listener cannot loop.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default queue capacity
pub const DEFAULT_CAPACITY: usize = 1000;
/// Default number of events drained per frame
pub const DEFAULT_MAX_EVENTS_PER_FRAME: usize = 100;
/// Default time budget for draining per frame
pub const DEFAULT_MAX_TIME_PER_FRAME: Duration = Duration::from_millis(5);

/// Emitted when a listener fails
pub const SYSTEM_ERROR: &str = "system.error";
/// Emitted when a worker body fails or panics
pub const WORKER_ERROR: &str = "error";
/// Emitted when a worker thread starts
pub const WORKER_STARTED: &str = "worker.started";
/// Emitted when a worker thread exits
pub const WORKER_STOPPED: &str = "worker.stopped";
/// Listener key that receives every event
pub const WILDCARD: &str = "*";

/// An event on the bus; immutable once emitted
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event type, dotted by convention (`clock.tick`)
    #[serde(rename = "type")]
    pub kind: String,
    /// Who emitted it
    pub source: String,
    /// Payload
    pub data: Map<String, Value>,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl Event {
    /// Build an event stamped with the current time
    ///
    /// Non-object payloads are wrapped as `{"value": data}`; `null` becomes
    /// an empty map.
    pub fn new(kind: impl Into<String>, data: Value, source: impl Into<String>) -> Self {
        let data = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            kind: kind.into(),
            source: source.into(),
            data,
            timestamp: chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0,
        }
    }

    /// A string field of the payload
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Identifier returned by [`EventBus::on`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Counters exposed by [`EventBus::metrics`]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BusMetrics {
    /// Events accepted into the queue
    pub emitted: u64,
    /// Events taken off the queue and dispatched
    pub processed: u64,
    /// Events refused because the queue was full
    pub dropped: u64,
    /// Listener invocations that returned an error
    pub handler_errors: u64,
    /// Events waiting right now
    pub queued: usize,
    /// Registered listeners
    pub listeners: usize,
    /// Event types with at least one listener
    pub event_types: usize,
}

#[derive(Debug)]
struct Queue {
    events: Mutex<VecDeque<Event>>,
    capacity: usize,
    emitted: AtomicU64,
    dropped: AtomicU64,
}

impl Queue {
    fn push(&self, event: Event) -> bool {
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            drop(events);
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::trace!(dropped, "event queue full, event dropped");
            return false;
        }
        events.push_back(event);
        self.emitted.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn pop(&self) -> Option<Event> {
        self.events.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.events.lock().len()
    }
}

/// Producer handle, cheap to clone and safe to move to other threads
#[derive(Clone, Debug)]
pub struct Emitter {
    queue: Arc<Queue>,
}

impl Emitter {
    /// Enqueue an event without blocking
    ///
    /// Returns `false` if the queue was full and the event was dropped.
    pub fn emit(&self, kind: &str, data: Value, source: &str) -> bool {
        self.queue.push(Event::new(kind, data, source))
    }

    /// Enqueue an already built event
    pub fn emit_event(&self, event: Event) -> bool {
        self.queue.push(event)
    }

    /// Events currently waiting
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Queue capacity
    pub fn capacity(&self) -> usize {
        self.queue.capacity
    }
}

/// Listener callback; `C` is whatever context the owner of the bus passes in
pub type ListenerFn<C> = Box<dyn FnMut(&Event, &mut C) -> anyhow::Result<()>>;

struct Listener<C> {
    id: ListenerId,
    handler: ListenerFn<C>,
}

/// The bus: queue plus main-thread listener table
pub struct EventBus<C> {
    queue: Arc<Queue>,
    listeners: HashMap<String, Vec<Listener<C>>>,
    next_listener: u64,
    processed: u64,
    handler_errors: u64,
}

impl<C> EventBus<C> {
    /// Create a bus holding at most `capacity` pending events
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Arc::new(Queue {
                events: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
                capacity,
                emitted: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
            listeners: HashMap::new(),
            next_listener: 0,
            processed: 0,
            handler_errors: 0,
        }
    }

    /// A producer handle for this bus
    pub fn emitter(&self) -> Emitter {
        Emitter {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Enqueue an event from the owning thread
    pub fn emit(&self, kind: &str, data: Value, source: &str) -> bool {
        self.queue.push(Event::new(kind, data, source))
    }

    /// Register a listener for an event type ([`WILDCARD`] for all)
    pub fn on<F>(&mut self, kind: &str, handler: F) -> ListenerId
    where
        F: FnMut(&Event, &mut C) -> anyhow::Result<()> + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners
            .entry(kind.to_string())
            .or_default()
            .push(Listener {
                id,
                handler: Box::new(handler),
            });
        id
    }

    /// Remove a listener, pruning the type bucket when it empties
    pub fn off(&mut self, kind: &str, id: ListenerId) -> bool {
        let Some(bucket) = self.listeners.get_mut(kind) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|l| l.id != id);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            self.listeners.remove(kind);
        }
        removed
    }

    /// Whether anything listens to an event type
    pub fn has_listeners(&self, kind: &str) -> bool {
        self.listeners.contains_key(kind)
    }

    /// Drain up to `max_events` events or until `max_time` has elapsed
    ///
    /// Must be called from the thread that owns the bus. At least one event
    /// is processed if any is pending, so a zero budget still makes progress.
    /// Returns the number of events dispatched.
    pub fn process_events(&mut self, ctx: &mut C, max_events: usize, max_time: Duration) -> usize {
        let start = Instant::now();
        let mut handled = 0;

        while handled < max_events {
            if handled > 0 && start.elapsed() >= max_time {
                break;
            }
            let Some(event) = self.queue.pop() else {
                break;
            };
            self.dispatch(&event, ctx);
            handled += 1;
        }

        self.processed += handled as u64;
        handled
    }

    fn dispatch(&mut self, event: &Event, ctx: &mut C) {
        for key in [event.kind.as_str(), WILDCARD] {
            let Some(bucket) = self.listeners.get_mut(key) else {
                continue;
            };
            for listener in bucket.iter_mut() {
                if let Err(e) = (listener.handler)(event, ctx) {
                    self.handler_errors += 1;
                    tracing::warn!(event = %event.kind, error = %e, "event listener failed");

                    if event.kind != SYSTEM_ERROR {
                        self.queue.push(Event::new(
                            SYSTEM_ERROR,
                            serde_json::json!({
                                "error": format!("{e:#}"),
                                "event_type": event.kind,
                                "event_source": event.source,
                            }),
                            "bus",
                        ));
                    }
                }
            }
        }
    }

    /// Drop every pending event
    pub fn clear(&self) -> usize {
        let mut events = self.queue.events.lock();
        let n = events.len();
        events.clear();
        n
    }

    /// Snapshot of the counters
    pub fn metrics(&self) -> BusMetrics {
        BusMetrics {
            emitted: self.queue.emitted.load(Ordering::Relaxed),
            processed: self.processed,
            dropped: self.queue.dropped.load(Ordering::Relaxed),
            handler_errors: self.handler_errors,
            queued: self.queue.len(),
            listeners: self.listeners.values().map(Vec::len).sum(),
            event_types: self.listeners.len(),
        }
    }
}

impl<C> Default for EventBus<C> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
