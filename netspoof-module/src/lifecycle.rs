//! Run-state machine shared by every module
//!
//! A module embeds a [`Lifecycle`] and routes its `start`/`stop` through it:
//!
//! ```text
//! Idle -> Configuring -> Running -> Stopping -> Idle
//!            |
//!            +-- configure failed --> Idle
//! ```
//!
//! `start` returns as soon as the worker task is spawned. `stop` flips the
//! running flag, fires the worker's cancellation token, joins the worker and
//! then runs the module's teardown before the state returns to `Idle`. A
//! `stop` future dropped halfway still leaves the module `Idle`.

use netspoof_core::{CancelToken, Error, Result};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where a module is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Configuring,
    Running,
    Stopping,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Configuring => "configuring",
            Phase::Running => "running",
            Phase::Stopping => "stopping",
        };
        write!(f, "{}", s)
    }
}

/// What a worker task gets to observe shutdown
#[derive(Debug, Clone)]
pub struct WorkerContext {
    running: Arc<AtomicBool>,
    cancel: CancelToken,
}

impl WorkerContext {
    /// Cheap flag read, meant to be polled before every send
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Sleep for `period` or until the module is stopped, whichever comes
    /// first. Returns whether the module is still running.
    pub async fn tick(&self, period: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = self.cancel.cancelled() => {}
        }
        self.is_running()
    }
}

struct Worker {
    id: Uuid,
    started_at: SystemTime,
    cancel: CancelToken,
    task: JoinHandle<Result<()>>,
}

/// Lifecycle controller embedded in a module
pub struct Lifecycle {
    name: String,
    running: Arc<AtomicBool>,
    phase: Mutex<Phase>,
    worker: Mutex<Option<Worker>>,
}

impl Lifecycle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            running: Arc::new(AtomicBool::new(false)),
            phase: Mutex::new(Phase::Idle),
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock()
    }

    /// When the current worker was spawned
    pub fn started_at(&self) -> Option<SystemTime> {
        self.worker.lock().as_ref().map(|w| w.started_at)
    }

    /// Guard for a module's `configure`: refuses while the module is active
    pub fn ensure_stopped(&self) -> Result<()> {
        if self.is_running() {
            return Err(Error::AlreadyStarted(self.name.clone()));
        }
        Ok(())
    }

    /// Run `configure`, then spawn the worker built by `worker`.
    ///
    /// Fails with `AlreadyStarted` unless the module is idle. A configure
    /// error leaves the module idle and is returned as is.
    pub async fn start<C, W, Fut>(&self, configure: C, worker: W) -> Result<Uuid>
    where
        C: Future<Output = Result<()>>,
        W: FnOnce(WorkerContext) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.try_start(configure, |ctx| Ok(worker(ctx))).await
    }

    /// Like [`start`](Self::start), for workers that acquire resources
    /// before they can run. An error from `worker` is handled like a
    /// configure error: nothing is spawned and the module stays idle.
    pub async fn try_start<C, W, Fut>(&self, configure: C, worker: W) -> Result<Uuid>
    where
        C: Future<Output = Result<()>>,
        W: FnOnce(WorkerContext) -> Result<Fut>,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Idle {
                debug!(module = %self.name, phase = %*phase, "Start refused");
                return Err(Error::AlreadyStarted(self.name.clone()));
            }
            *phase = Phase::Configuring;
        }
        let mut guard = PhaseGuard::new(&self.phase);

        configure.await?;

        let id = Uuid::now_v7();
        let cancel = CancelToken::new();
        let ctx = WorkerContext {
            running: Arc::clone(&self.running),
            cancel: cancel.clone(),
        };

        let fut = worker(ctx)?;
        self.running.store(true, Ordering::Release);
        let name = self.name.clone();
        let task = tokio::spawn(async move {
            let result = fut.await;
            match &result {
                Ok(()) => debug!(id = %id, module = %name, "Worker exited"),
                Err(e) => error!(id = %id, module = %name, error = %e, "Worker failed"),
            }
            result
        });

        *self.worker.lock() = Some(Worker {
            id,
            started_at: SystemTime::now(),
            cancel,
            task,
        });
        guard.finish(Phase::Running);

        info!(id = %id, module = %self.name, "Module started");
        Ok(id)
    }

    /// Signal the worker, wait for it to exit, then await `teardown`.
    ///
    /// Fails with `AlreadyStopped` unless the module is running. Returns
    /// only once the teardown has completed.
    pub async fn stop<T>(&self, teardown: T) -> Result<()>
    where
        T: Future<Output = ()>,
    {
        {
            let mut phase = self.phase.lock();
            if *phase != Phase::Running {
                debug!(module = %self.name, phase = %*phase, "Stop refused");
                return Err(Error::AlreadyStopped(self.name.clone()));
            }
            *phase = Phase::Stopping;
        }

        let mut guard = PhaseGuard::new(&self.phase);

        self.running.store(false, Ordering::Release);
        let worker = self.worker.lock().take();

        if let Some(worker) = worker {
            worker.cancel.cancel();
            match worker.task.await {
                Ok(_) => {}
                Err(e) if e.is_panic() => {
                    error!(id = %worker.id, module = %self.name, "Worker panicked")
                }
                Err(e) => {
                    warn!(id = %worker.id, module = %self.name, error = %e, "Failed to join worker")
                }
            }
        }

        teardown.await;

        guard.finish(Phase::Idle);
        info!(module = %self.name, "Module stopped");
        Ok(())
    }
}

/// Puts the phase back to `Idle` unless `finish` is reached, so an error
/// or a dropped future never leaves a module half started or half stopped.
struct PhaseGuard<'a> {
    phase: &'a Mutex<Phase>,
    done: bool,
}

impl<'a> PhaseGuard<'a> {
    fn new(phase: &'a Mutex<Phase>) -> Self {
        Self { phase, done: false }
    }

    fn finish(&mut self, phase: Phase) {
        *self.phase.lock() = phase;
        self.done = true;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            let mut phase = self.phase.lock();
            if *phase == Phase::Stopping {
                warn!("Stop interrupted, module left idle");
            }
            *phase = Phase::Idle;
        }
    }
}
