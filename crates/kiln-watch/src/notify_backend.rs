//! OS-backed [`FileWatcher`] built on `notify`.

use crate::backend::{FileWatcher, WatchEvent, WatchMessage, WatchMode};
use crossbeam_channel as channel;
use notify::{RecursiveMode, Watcher as _};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

const EVENTS_QUEUE_CAPACITY: usize = 1024;

fn notify_error_to_io(err: notify::Error) -> io::Error {
    io::Error::other(err)
}

fn to_recursive_mode(mode: WatchMode) -> RecursiveMode {
    match mode {
        WatchMode::Recursive => RecursiveMode::Recursive,
        WatchMode::NonRecursive => RecursiveMode::NonRecursive,
    }
}

fn convert(event: notify::Event) -> Option<WatchEvent> {
    if matches!(event.attrs.flag(), Some(notify::event::Flag::Rescan)) {
        return Some(WatchEvent::Rescan);
    }
    if matches!(event.kind, notify::EventKind::Access(_)) || event.paths.is_empty() {
        return None;
    }
    Some(WatchEvent::Changed { paths: event.paths })
}

#[derive(Debug, Clone, Copy)]
struct ActualWatch {
    mode: WatchMode,
    ref_count: usize,
}

pub struct NotifyFileWatcher {
    watcher: notify::RecommendedWatcher,
    events_rx: channel::Receiver<WatchMessage>,
    /// Requested path to the path registered with the OS. Files are watched
    /// through their parent directory so editors that save by renaming keep
    /// producing events.
    requested: HashMap<PathBuf, PathBuf>,
    actual: HashMap<PathBuf, ActualWatch>,
}

impl std::fmt::Debug for NotifyFileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyFileWatcher")
            .field("requested", &self.requested)
            .finish_non_exhaustive()
    }
}

impl NotifyFileWatcher {
    pub fn new() -> io::Result<Self> {
        let (events_tx, events_rx) = channel::bounded::<WatchMessage>(EVENTS_QUEUE_CAPACITY);
        let mut overflowed = false;

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // A dropped event can only be recovered from with a full rebuild.
            if overflowed && events_tx.try_send(Ok(WatchEvent::Rescan)).is_ok() {
                overflowed = false;
            }
            let message = match res {
                Ok(event) => match convert(event) {
                    Some(event) => Ok(event),
                    None => return,
                },
                Err(err) => Err(notify_error_to_io(err)),
            };
            if let Err(channel::TrySendError::Full(_)) = events_tx.try_send(message) {
                overflowed = true;
            }
        })
        .map_err(notify_error_to_io)?;

        Ok(Self {
            watcher,
            events_rx,
            requested: HashMap::new(),
            actual: HashMap::new(),
        })
    }

    fn actual_target(path: &Path, mode: WatchMode) -> (PathBuf, WatchMode) {
        if path.is_file() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                return (parent.to_path_buf(), WatchMode::NonRecursive);
            }
        }
        (path.to_path_buf(), mode)
    }
}

impl FileWatcher for NotifyFileWatcher {
    fn watch_path(&mut self, path: &Path, mode: WatchMode) -> io::Result<()> {
        if self.requested.contains_key(path) {
            return Ok(());
        }
        let (actual, mode) = Self::actual_target(path, mode);
        match self.actual.get_mut(&actual) {
            Some(existing) if existing.mode == WatchMode::Recursive || mode == existing.mode => {
                existing.ref_count += 1;
            }
            Some(existing) => {
                // Upgrade to recursive.
                self.watcher
                    .watch(&actual, to_recursive_mode(mode))
                    .map_err(notify_error_to_io)?;
                existing.mode = mode;
                existing.ref_count += 1;
            }
            None => {
                self.watcher
                    .watch(&actual, to_recursive_mode(mode))
                    .map_err(notify_error_to_io)?;
                self.actual
                    .insert(actual.clone(), ActualWatch { mode, ref_count: 1 });
            }
        }
        self.requested.insert(path.to_path_buf(), actual);
        Ok(())
    }

    fn unwatch_path(&mut self, path: &Path) -> io::Result<()> {
        let Some(actual) = self.requested.remove(path) else {
            return Ok(());
        };
        let Some(watch) = self.actual.get_mut(&actual) else {
            return Ok(());
        };
        watch.ref_count -= 1;
        if watch.ref_count == 0 {
            self.actual.remove(&actual);
            self.watcher.unwatch(&actual).map_err(notify_error_to_io)?;
        }
        Ok(())
    }

    fn receiver(&self) -> &channel::Receiver<WatchMessage> {
        &self.events_rx
    }
}
