use crate::backend::FileWatcher;
use crate::watcher::{error_chain, run_guarded, Watcher, WatcherSettings};
use kiln_build::{BuildResult, Builder, Inputs, Options};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

type Hook = Arc<dyn Fn() + Send + Sync>;

/// Configures a continuous rebuild of one set of inputs.
///
/// ```no_run
/// # use kiln_build::{Builder, Inputs, Options};
/// # use kiln_watch::{ManualFileWatcher, WatchSession};
/// # fn demo(builder: Builder, inputs: Inputs) -> std::io::Result<()> {
/// let watcher = WatchSession::new(builder, inputs, Options::default())
///     .start(ManualFileWatcher::new(), |result| {
///         println!("build finished, success = {}", result.is_success());
///     })?;
/// watcher.dispose();
/// # Ok(())
/// # }
/// ```
pub struct WatchSession {
    builder: Builder,
    inputs: Inputs,
    options: Options,
    cwd: PathBuf,
    settings: WatcherSettings,
    on_iteration: Option<Hook>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("project", &self.inputs.project_name())
            .field("cwd", &self.cwd)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    pub fn new(builder: Builder, inputs: Inputs, options: Options) -> Self {
        let cwd = inputs.workspace().to_path_buf();
        Self {
            builder,
            inputs,
            options,
            cwd,
            settings: WatcherSettings::default(),
            on_iteration: None,
        }
    }

    /// Working directory for the benchmark generator. Defaults to the
    /// workspace.
    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn debounce(mut self, delay: Duration) -> Self {
        self.settings.debounce = delay;
        self
    }

    /// Called after every rebuild, whatever its outcome.
    pub fn on_iteration(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_iteration = Some(Arc::new(hook));
        self
    }

    /// Builds once on the calling thread, then watches the inputs and
    /// rebuilds on change until the returned [`Watcher`] is disposed or its
    /// last handle is dropped.
    pub fn start<W, R>(self, backend: W, on_result: R) -> io::Result<Watcher>
    where
        W: FileWatcher + 'static,
        R: Fn(&BuildResult) + Send + Sync + 'static,
    {
        let WatchSession {
            builder,
            inputs,
            options,
            cwd,
            settings,
            on_iteration,
        } = self;
        let elements = inputs.elements().to_vec();

        let action: Hook = Arc::new(move || {
            match builder.build(&inputs, &options, &cwd) {
                Ok(result) => on_result(&result),
                Err(err) => {
                    tracing::error!(
                        target: "kiln.watch",
                        error = %error_chain(&err),
                        "build failed"
                    );
                }
            }
            if let Some(hook) = &on_iteration {
                hook();
            }
        });

        run_guarded(action.as_ref());
        Watcher::start(backend, &elements, settings, move || action())
    }
}

/// Watches `inputs` with the OS file watcher.
///
/// See [`WatchSession`] for the knobs this leaves at their defaults.
#[cfg(feature = "watch-notify")]
pub fn watch<R, I>(
    builder: Builder,
    inputs: Inputs,
    options: Options,
    on_result: R,
    on_iteration: Option<I>,
) -> io::Result<Watcher>
where
    R: Fn(&BuildResult) + Send + Sync + 'static,
    I: Fn() + Send + Sync + 'static,
{
    let mut session = WatchSession::new(builder, inputs, options);
    if let Some(hook) = on_iteration {
        session = session.on_iteration(hook);
    }
    session.start(crate::NotifyFileWatcher::new()?, on_result)
}
