//! Delivery of transport notifications to client handlers.
//!
//! Transport listeners hand every notification to a [`Dispatcher`] as a job.
//! Depending on the [`DispatchMode`] the job runs on the transport's own
//! thread, on a fresh thread, or on a single worker thread that preserves
//! delivery order. A panicking handler is caught and logged in every mode.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

/// How notifications are delivered to client handlers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Run the handler on the transport's callback thread
    Inline,
    /// Spawn one thread per notification; no ordering between notifications
    #[default]
    Detached,
    /// Queue notifications to one worker thread, in delivery order
    Serialized,
}

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct Dispatcher {
    mode: DispatchMode,
    worker: Option<mpsc::Sender<(&'static str, Job)>>,
}

impl Dispatcher {
    pub fn new(mode: DispatchMode) -> Self {
        let worker = match mode {
            DispatchMode::Serialized => spawn_worker(),
            DispatchMode::Inline | DispatchMode::Detached => None,
        };
        Self { mode, worker }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn dispatch(&self, label: &'static str, job: Job) {
        match self.mode {
            DispatchMode::Inline => run(label, job),
            DispatchMode::Detached => {
                // The job is moved into the closure; a failed spawn drops it undelivered
                let spawned = thread::Builder::new()
                    .name(format!("upnp-cp-{label}"))
                    .spawn(move || run(label, job));
                if let Err(e) = spawned {
                    tracing::error!("Failed to spawn {} handler thread: {}", label, e);
                }
            }
            DispatchMode::Serialized => {
                let undelivered = match &self.worker {
                    Some(worker) => worker.send((label, job)).err().map(|e| e.0 .1),
                    None => Some(job),
                };
                if let Some(job) = undelivered {
                    tracing::warn!("Dispatch worker unavailable, running {} inline", label);
                    run(label, job);
                }
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("mode", &self.mode).finish()
    }
}

fn spawn_worker() -> Option<mpsc::Sender<(&'static str, Job)>> {
    let (tx, rx) = mpsc::channel::<(&'static str, Job)>();
    let spawned = thread::Builder::new()
        .name("upnp-cp-dispatch".to_string())
        .spawn(move || {
            tracing::debug!("Dispatch worker started");
            for (label, job) in rx {
                run(label, job);
            }
            tracing::debug!("Dispatch worker stopped");
        });

    match spawned {
        Ok(_) => Some(tx),
        Err(e) => {
            tracing::error!("Failed to spawn dispatch worker: {}", e);
            None
        }
    }
}

fn run(label: &'static str, job: Job) {
    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
        tracing::error!("Handler for {} panicked", label);
    }
}
