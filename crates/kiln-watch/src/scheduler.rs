use parking_lot::Mutex;
use std::io;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs delayed jobs one at a time on a single dedicated thread.
///
/// Jobs never overlap, so whatever they touch needs no further locking
/// against other jobs from the same scheduler.
#[derive(Debug)]
pub struct SerialScheduler {
    handle: tokio::runtime::Handle,
    token: CancellationToken,
    thread_id: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SerialScheduler {
    pub fn new(name: &str) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();
        let token = CancellationToken::new();

        let thread_token = token.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || runtime.block_on(thread_token.cancelled()))?;

        Ok(Self {
            handle,
            token,
            thread_id: thread.thread().id(),
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Runs `job` after `delay` unless the scheduler shuts down first.
    pub fn spawn_after<F>(&self, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.token.clone();
        self.handle.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => job(),
            }
        });
    }

    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels pending jobs and waits for the thread to exit.
    ///
    /// When called from a job the thread is only signalled; it exits as soon
    /// as that job returns.
    pub fn shutdown(&self) {
        self.token.cancel();
        if self.is_current() {
            return;
        }
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                tracing::error!(target: "kiln.watch", "scheduler thread panicked");
            }
        }
    }
}

impl Drop for SerialScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
