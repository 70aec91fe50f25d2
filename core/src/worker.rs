//! Background Workers
//!
//! A worker is an OS thread that runs a body function in a loop, sleeping
//! `interval` between iterations, and talks to the rest of the application
//! only through an [`Emitter`]. Workers never receive anything that can draw
//! to the terminal; this crate does not depend on a terminal library at all.
//!
//! Cancellation is cooperative: [`Worker::stop`] raises a flag and waits up
//! to a timeout for the thread to notice. A thread that does not exit in
//! time is abandoned (detached), since threads cannot be killed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::bus::{Emitter, WORKER_ERROR, WORKER_STARTED, WORKER_STOPPED};
use crate::keymap::OwnerId;

/// Longest single sleep slice while waiting between iterations
const STOP_POLL_SLICE: Duration = Duration::from_millis(10);

/// What a worker body sees
#[derive(Debug)]
pub struct WorkerContext {
    name: String,
    emitter: Emitter,
    stop: Arc<AtomicBool>,
}

impl WorkerContext {
    /// Worker name, used as the event source
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the owner asked this worker to stop
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Emit an event with this worker as source
    pub fn emit(&self, kind: &str, data: Value) -> bool {
        self.emitter.emit(kind, data, &self.name)
    }

    /// Wait for `duration` in short slices
    ///
    /// Returns `false` as soon as a stop is requested.
    pub fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.should_stop() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(STOP_POLL_SLICE));
        }
    }
}

/// How a stop request ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopOutcome {
    /// The thread exited and was joined
    Joined,
    /// The thread did not exit before the timeout and was detached
    Abandoned,
    /// The worker had already been stopped
    AlreadyStopped,
}

/// Handle to a running worker thread
#[derive(Debug)]
pub struct Worker {
    name: String,
    stop: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    done_rx: mpsc::Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a worker calling `body` every `interval` until stopped
    ///
    /// A body error or panic is reported as a [`WORKER_ERROR`] event and
    /// ends the thread; it never propagates to the caller.
    pub fn spawn<F>(
        name: impl Into<String>,
        emitter: Emitter,
        interval: Duration,
        mut body: F,
    ) -> std::io::Result<Self>
    where
        F: FnMut(&WorkerContext) -> anyhow::Result<()> + Send + 'static,
    {
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = mpsc::channel();

        let ctx = WorkerContext {
            name: name.clone(),
            emitter,
            stop: Arc::clone(&stop),
        };
        let running_flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name(format!("worker-{name}"))
            .spawn(move || {
                ctx.emit(WORKER_STARTED, Value::Null);
                tracing::debug!(worker = %ctx.name, "worker started");

                while !ctx.should_stop() {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| body(&ctx)));
                    let failure = match outcome {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(format!("{e:#}")),
                        Err(payload) => Some(panic_message(payload.as_ref())),
                    };
                    if let Some(error) = failure {
                        tracing::error!(worker = %ctx.name, %error, "worker failed");
                        ctx.emit(WORKER_ERROR, json!({ "worker": ctx.name, "error": error }));
                        break;
                    }
                    if !ctx.wait(interval) {
                        break;
                    }
                }

                running_flag.store(false, Ordering::Release);
                ctx.emit(WORKER_STOPPED, Value::Null);
                tracing::debug!(worker = %ctx.name, "worker stopped");
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            name,
            stop,
            running,
            done_rx,
            handle: Some(handle),
        })
    }

    /// Worker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread is still inside its loop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Ask the worker to stop without waiting
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Ask the worker to stop and wait up to `timeout` for it to exit
    pub fn stop(&mut self, timeout: Duration) -> StopOutcome {
        let Some(handle) = self.handle.take() else {
            return StopOutcome::AlreadyStopped;
        };
        self.request_stop();

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    tracing::warn!(worker = %self.name, "worker thread panicked on exit");
                }
                StopOutcome::Joined
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(worker = %self.name, ?timeout, "worker did not stop in time, abandoning");
                StopOutcome::Abandoned
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.request_stop();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// All workers of an application, stopped together on shutdown
///
/// A worker may be tagged with the owner that started it so it can be
/// stopped on its own when that owner goes away.
#[derive(Debug, Default)]
pub struct WorkerSet {
    workers: Vec<(Option<OwnerId>, Worker)>,
}

impl WorkerSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a spawned worker
    pub fn add(&mut self, worker: Worker) {
        self.workers.push((None, worker));
    }

    /// Take ownership of a worker started on behalf of `owner`
    pub fn add_owned(&mut self, owner: OwnerId, worker: Worker) {
        self.workers.push((Some(owner), worker));
    }

    /// Number of workers still running
    pub fn running(&self) -> usize {
        self.workers.iter().filter(|(_, w)| w.is_running()).count()
    }

    /// Number of workers started by `owner` that are still running
    pub fn running_for(&self, owner: OwnerId) -> usize {
        self.workers
            .iter()
            .filter(|(tag, w)| *tag == Some(owner) && w.is_running())
            .count()
    }

    /// Number of workers held
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Stop the workers started by `owner`, leaving the rest running
    pub fn stop_owned(&mut self, owner: OwnerId, timeout: Duration) -> Vec<(String, StopOutcome)> {
        let (owned, rest): (Vec<_>, Vec<_>) = self
            .workers
            .drain(..)
            .partition(|(tag, _)| *tag == Some(owner));
        self.workers = rest;
        Self::stop_each(owned.into_iter().map(|(_, w)| w).collect(), timeout)
    }

    /// Stop every worker, giving each up to `timeout`
    pub fn stop_all(&mut self, timeout: Duration) -> Vec<(String, StopOutcome)> {
        let workers = self.workers.drain(..).map(|(_, w)| w).collect();
        Self::stop_each(workers, timeout)
    }

    // All stop flags are raised first so the workers wind down in parallel.
    fn stop_each(workers: Vec<Worker>, timeout: Duration) -> Vec<(String, StopOutcome)> {
        for worker in &workers {
            worker.request_stop();
        }
        workers
            .into_iter()
            .map(|mut w| {
                let outcome = w.stop(timeout);
                (w.name.clone(), outcome)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use std::sync::atomic::AtomicUsize;

    fn drain_kinds(bus: &mut EventBus<Vec<String>>) -> Vec<String> {
        let mut kinds = Vec::new();
        bus.on(crate::bus::WILDCARD, |e, kinds: &mut Vec<String>| {
            kinds.push(e.kind.clone());
            Ok(())
        });
        bus.process_events(&mut kinds, 1000, Duration::from_secs(5));
        kinds
    }

    #[test]
    fn test_worker_emits_and_stops() {
        let mut bus: EventBus<Vec<String>> = EventBus::new(1000);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);

        let mut worker = Worker::spawn("ticker", bus.emitter(), Duration::from_millis(1), move |ctx| {
            counter.fetch_add(1, Ordering::SeqCst);
            ctx.emit("tick", Value::Null);
            Ok(())
        })
        .unwrap();

        while ticks.load(Ordering::SeqCst) < 3 {
            thread::yield_now();
        }
        assert_eq!(worker.stop(Duration::from_secs(5)), StopOutcome::Joined);
        assert!(!worker.is_running());
        assert_eq!(worker.stop(Duration::from_secs(1)), StopOutcome::AlreadyStopped);

        let kinds = drain_kinds(&mut bus);
        assert_eq!(kinds.first().map(String::as_str), Some(WORKER_STARTED));
        assert_eq!(kinds.last().map(String::as_str), Some(WORKER_STOPPED));
        assert!(kinds.iter().filter(|k| *k == "tick").count() >= 3);
    }

    #[test]
    fn test_worker_error_becomes_event() {
        let mut bus: EventBus<Vec<String>> = EventBus::new(100);
        let mut worker = Worker::spawn("broken", bus.emitter(), Duration::from_millis(1), |_| {
            anyhow::bail!("disk on fire")
        })
        .unwrap();

        assert_eq!(worker.stop(Duration::from_secs(5)), StopOutcome::Joined);
        let kinds = drain_kinds(&mut bus);
        assert!(kinds.contains(&WORKER_ERROR.to_string()));
    }

    #[test]
    fn test_worker_panic_is_contained() {
        let mut bus: EventBus<Vec<String>> = EventBus::new(100);
        let emitter = bus.emitter();
        let mut worker =
            Worker::spawn("panicky", emitter, Duration::from_millis(1), |_| panic!("nope")).unwrap();

        assert_eq!(worker.stop(Duration::from_secs(5)), StopOutcome::Joined);
        let kinds = drain_kinds(&mut bus);
        assert!(kinds.contains(&WORKER_ERROR.to_string()));
    }

    #[test]
    fn test_stuck_worker_is_abandoned() {
        let bus: EventBus<()> = EventBus::new(100);
        let release = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&release);

        let mut worker = Worker::spawn("stuck", bus.emitter(), Duration::from_millis(1), move |_| {
            while !gate.load(Ordering::SeqCst) {
                thread::yield_now();
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(worker.stop(Duration::from_millis(20)), StopOutcome::Abandoned);
        release.store(true, Ordering::SeqCst);
    }

    #[test]
    fn test_worker_set_stops_everything() {
        let bus: EventBus<()> = EventBus::new(100);
        let mut set = WorkerSet::new();
        for name in ["a", "b", "c"] {
            set.add(
                Worker::spawn(name, bus.emitter(), Duration::from_millis(5), |_| Ok(())).unwrap(),
            );
        }
        assert_eq!(set.len(), 3);

        let outcomes = set.stop_all(Duration::from_secs(5));
        assert!(outcomes.iter().all(|(_, o)| *o == StopOutcome::Joined));
        assert!(set.is_empty());
    }

    #[test]
    fn test_stop_owned_leaves_other_workers_running() {
        let bus: EventBus<()> = EventBus::new(100);
        let mut set = WorkerSet::new();
        let (mine, theirs) = (OwnerId(40), OwnerId(41));
        for (owner, name) in [(mine, "a"), (mine, "b"), (theirs, "c")] {
            let worker = Worker::spawn(name, bus.emitter(), Duration::from_millis(5), |_| Ok(())).unwrap();
            set.add_owned(owner, worker);
        }
        set.add(Worker::spawn("app", bus.emitter(), Duration::from_millis(5), |_| Ok(())).unwrap());
        assert_eq!(set.running_for(mine), 2);

        let outcomes = set.stop_owned(mine, Duration::from_secs(5));
        let mut names: Vec<_> = outcomes.iter().map(|(n, _)| n.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, ["a", "b"]);
        assert!(outcomes.iter().all(|(_, o)| *o == StopOutcome::Joined));
        assert_eq!(set.running_for(mine), 0);
        assert_eq!(set.running_for(theirs), 1);
        assert_eq!(set.len(), 2);

        set.stop_all(Duration::from_secs(5));
    }
}
