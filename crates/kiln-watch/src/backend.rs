//! Watch backends.
//!
//! A [`FileWatcher`] turns OS notifications into a stream of [`WatchEvent`]s
//! on a `crossbeam_channel` receiver. The watch session owns exactly one
//! backend and drains it on a dispatcher thread, so backends never call back
//! into the session themselves.
//!
//! Tests should not rely on real OS watcher timing. [`ManualFileWatcher`] is
//! a deterministic backend whose events are injected by hand.

use crossbeam_channel as channel;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Something happened to these paths. Backends may batch.
    Changed { paths: Vec<PathBuf> },
    /// Events were dropped; treat everything as changed.
    Rescan,
}

impl WatchEvent {
    pub fn changed(path: impl Into<PathBuf>) -> Self {
        WatchEvent::Changed {
            paths: vec![path.into()],
        }
    }
}

/// Whether a directory watch covers descendants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchMode {
    Recursive,
    NonRecursive,
}

/// Backends surface asynchronous errors on the same stream as events.
pub type WatchMessage = io::Result<WatchEvent>;

pub trait FileWatcher: Send {
    fn watch_path(&mut self, path: &Path, mode: WatchMode) -> io::Result<()>;

    fn unwatch_path(&mut self, path: &Path) -> io::Result<()>;

    fn receiver(&self) -> &channel::Receiver<WatchMessage>;
}

impl<W: ?Sized + FileWatcher> FileWatcher for Box<W> {
    fn watch_path(&mut self, path: &Path, mode: WatchMode) -> io::Result<()> {
        self.as_mut().watch_path(path, mode)
    }

    fn unwatch_path(&mut self, path: &Path) -> io::Result<()> {
        self.as_mut().unwatch_path(path)
    }

    fn receiver(&self) -> &channel::Receiver<WatchMessage> {
        self.as_ref().receiver()
    }
}

const MANUAL_WATCH_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct ManualState {
    watch_calls: Vec<(PathBuf, WatchMode)>,
    unwatch_calls: Vec<PathBuf>,
    watched: HashMap<PathBuf, WatchMode>,
}

/// Deterministic backend for tests. Never touches the OS.
#[derive(Debug)]
pub struct ManualFileWatcher {
    tx: channel::Sender<WatchMessage>,
    rx: channel::Receiver<WatchMessage>,
    state: Arc<Mutex<ManualState>>,
}

/// Cloneable handle that keeps working after the watcher has been boxed and
/// moved into a watch session.
#[derive(Debug, Clone)]
pub struct ManualFileWatcherHandle {
    tx: channel::Sender<WatchMessage>,
    state: Arc<Mutex<ManualState>>,
}

impl ManualFileWatcherHandle {
    /// Injects an event. Fails with `BrokenPipe` once the session is gone.
    pub fn push(&self, event: WatchEvent) -> io::Result<()> {
        self.send(Ok(event))
    }

    pub fn push_error(&self, error: io::Error) -> io::Result<()> {
        self.send(Err(error))
    }

    fn send(&self, message: WatchMessage) -> io::Result<()> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(channel::TrySendError::Full(_)) => Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "watch queue is full",
            )),
            Err(channel::TrySendError::Disconnected(_)) => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "watch receiver dropped",
            )),
        }
    }

    /// Currently watched paths, sorted.
    pub fn watched_paths(&self) -> Vec<(PathBuf, WatchMode)> {
        let mut out: Vec<_> = self
            .state
            .lock()
            .watched
            .iter()
            .map(|(path, mode)| (path.clone(), *mode))
            .collect();
        out.sort_by(|(a, _), (b, _)| a.cmp(b));
        out
    }

    pub fn watch_calls(&self) -> Vec<(PathBuf, WatchMode)> {
        self.state.lock().watch_calls.clone()
    }

    pub fn unwatch_calls(&self) -> Vec<PathBuf> {
        self.state.lock().unwatch_calls.clone()
    }
}

impl Default for ManualFileWatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualFileWatcher {
    pub fn new() -> Self {
        let (tx, rx) = channel::bounded(MANUAL_WATCH_QUEUE_CAPACITY);
        Self {
            tx,
            rx,
            state: Arc::default(),
        }
    }

    pub fn handle(&self) -> ManualFileWatcherHandle {
        ManualFileWatcherHandle {
            tx: self.tx.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

impl FileWatcher for ManualFileWatcher {
    fn watch_path(&mut self, path: &Path, mode: WatchMode) -> io::Result<()> {
        let mut state = self.state.lock();
        state.watch_calls.push((path.to_path_buf(), mode));
        // Never downgrade a recursive watch.
        let mode = match state.watched.get(path) {
            Some(WatchMode::Recursive) => WatchMode::Recursive,
            _ => mode,
        };
        state.watched.insert(path.to_path_buf(), mode);
        Ok(())
    }

    fn unwatch_path(&mut self, path: &Path) -> io::Result<()> {
        let mut state = self.state.lock();
        state.unwatch_calls.push(path.to_path_buf());
        state.watched.remove(path);
        Ok(())
    }

    fn receiver(&self) -> &channel::Receiver<WatchMessage> {
        &self.rx
    }
}
