use crate::backend::{FileWatcher, WatchEvent, WatchMessage};
use crate::filter::WatchTarget;
use crate::scheduler::SerialScheduler;
use crossbeam_channel as channel;
use kiln_build::InputElement;
use parking_lot::Mutex;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

type Action = Box<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone)]
pub struct WatcherSettings {
    pub debounce: Duration,
    /// Name of the thread rebuilds run on.
    pub thread_name: String,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            thread_name: "kiln-watch".to_string(),
        }
    }
}

struct Dispatcher {
    stop: channel::Sender<()>,
    thread: JoinHandle<()>,
}

struct Inner {
    debounce: Duration,
    pending: AtomicBool,
    disposed: AtomicBool,
    scheduler: SerialScheduler,
    action: Action,
    backend: Mutex<Option<Box<dyn FileWatcher>>>,
    targets: Vec<WatchTarget>,
    dispatcher: Mutex<Option<Dispatcher>>,
    dispatcher_thread: Mutex<Option<ThreadId>>,
}

/// Watches a set of input elements and runs an action once per burst of
/// relevant changes.
///
/// At most one run is pending at any time. Runs happen on a single thread, so
/// they never overlap. Events arriving while a run is in progress schedule
/// exactly one follow-up run.
///
/// Handles are cheap clones. Dropping the last one disposes the watcher; the
/// event thread and pending timers only hold weak references.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("targets", &self.inner.targets)
            .field("pending", &self.is_pending())
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}

impl Watcher {
    /// Registers every element with `backend` and starts dispatching events.
    ///
    /// The action is not run until the first relevant change.
    pub fn start<W, F>(
        backend: W,
        elements: &[InputElement],
        settings: WatcherSettings,
        action: F,
    ) -> io::Result<Self>
    where
        W: FileWatcher + 'static,
        F: Fn() + Send + Sync + 'static,
    {
        let mut backend: Box<dyn FileWatcher> = Box::new(backend);
        let targets: Vec<WatchTarget> = elements.iter().map(WatchTarget::for_element).collect();
        for target in &targets {
            backend.watch_path(target.path(), target.mode())?;
        }
        let events = backend.receiver().clone();

        let inner = Arc::new(Inner {
            debounce: settings.debounce,
            pending: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            scheduler: SerialScheduler::new(&settings.thread_name)?,
            action: Box::new(action),
            backend: Mutex::new(Some(backend)),
            targets,
            dispatcher: Mutex::new(None),
            dispatcher_thread: Mutex::new(None),
        });
        let watcher = Watcher { inner };

        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let for_thread = Arc::downgrade(&watcher.inner);
        let thread = thread::Builder::new()
            .name(format!("{}-events", settings.thread_name))
            .spawn(move || dispatch(for_thread, events, stop_rx))?;
        *watcher.inner.dispatcher_thread.lock() = Some(thread.thread().id());
        *watcher.inner.dispatcher.lock() = Some(Dispatcher {
            stop: stop_tx,
            thread,
        });

        tracing::debug!(
            target: "kiln.watch",
            inputs = watcher.inner.targets.len(),
            "watching inputs"
        );
        Ok(watcher)
    }

    /// Requests a run after the debounce delay. Does nothing if one is
    /// already pending or the watcher has been disposed.
    pub fn schedule(&self) {
        let inner = &self.inner;
        if inner.disposed.load(Ordering::Acquire) {
            return;
        }
        if inner.pending.load(Ordering::Acquire) {
            return;
        }
        if inner
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let for_job = Arc::downgrade(inner);
        inner.scheduler.spawn_after(inner.debounce, move || {
            if let Some(watcher) = Watcher::upgrade(&for_job) {
                watcher.run_action();
            }
        });
    }

    fn upgrade(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Watcher { inner })
    }

    fn run_action(&self) {
        // Cleared first so changes made during the run schedule another one.
        self.inner.pending.store(false, Ordering::Release);
        if self.is_disposed() {
            return;
        }
        run_guarded(self.inner.action.as_ref());
    }

    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Stops watching and releases every resource. Idempotent, and safe to
    /// call from inside the action.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    fn handle_event(&self, event: WatchEvent) {
        match event {
            WatchEvent::Rescan => self.schedule(),
            WatchEvent::Changed { paths } => {
                let relevant = paths
                    .iter()
                    .any(|path| self.inner.targets.iter().any(|target| target.accepts(path)));
                if relevant {
                    self.schedule();
                } else {
                    tracing::trace!(target: "kiln.watch", ?paths, "ignoring change");
                }
            }
        }
    }
}

impl Inner {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let backend = self.backend.lock().take();
        if let Some(mut backend) = backend {
            for target in &self.targets {
                if let Err(err) = backend.unwatch_path(target.path()) {
                    tracing::warn!(
                        target: "kiln.watch",
                        path = %target.path().display(),
                        error = %err,
                        "failed to stop watching"
                    );
                }
            }
        }

        let dispatcher = self.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            // Disconnecting the stop channel wakes the dispatcher.
            drop(dispatcher.stop);
            let on_dispatcher = *self.dispatcher_thread.lock() == Some(thread::current().id());
            if !on_dispatcher && dispatcher.thread.join().is_err() {
                tracing::error!(target: "kiln.watch", "watch event thread panicked");
            }
        }

        self.scheduler.shutdown();
        tracing::debug!(target: "kiln.watch", "watch disposed");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn dispatch(
    inner: Weak<Inner>,
    events: channel::Receiver<WatchMessage>,
    stop: channel::Receiver<()>,
) {
    loop {
        channel::select! {
            recv(stop) -> _ => break,
            recv(events) -> message => {
                let Some(watcher) = Watcher::upgrade(&inner) else {
                    break;
                };
                match message {
                    Ok(Ok(event)) => watcher.handle_event(event),
                    Ok(Err(err)) => {
                        tracing::error!(
                            target: "kiln.watch",
                            error = %error_chain(&err),
                            "file watcher reported an error"
                        );
                    }
                    // Backend dropped.
                    Err(_) => break,
                }
            }
        }
    }
}

/// Runs `action`, logging instead of propagating a panic.
pub(crate) fn run_guarded(action: &(dyn Fn() + Send + Sync)) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(action)) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic>".to_string());
        tracing::error!(target: "kiln.watch", panic = %message, "watch action panicked");
    }
}

/// Renders an error and all of its sources on one line.
pub(crate) fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
