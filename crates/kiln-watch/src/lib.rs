//! Continuous rebuilds.
//!
//! A [`Watcher`] registers every input element with a [`FileWatcher`]
//! backend, filters what the backend reports, and collapses bursts of
//! relevant changes into a single rebuild run on one dedicated thread.
//!
//! The OS backend lives behind the `watch-notify` feature so library users
//! and tests can stay on [`ManualFileWatcher`].

mod backend;
mod filter;
#[cfg(feature = "watch-notify")]
mod notify_backend;
mod scheduler;
mod session;
mod watcher;

pub use backend::{
    FileWatcher, ManualFileWatcher, ManualFileWatcherHandle, WatchEvent, WatchMessage, WatchMode,
};
pub use filter::{EventFilter, WatchTarget};
#[cfg(feature = "watch-notify")]
pub use notify_backend::NotifyFileWatcher;
#[cfg(feature = "watch-notify")]
pub use session::watch;
pub use session::WatchSession;
pub use watcher::{Watcher, WatcherSettings, DEFAULT_DEBOUNCE};
