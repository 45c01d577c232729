//! Worker thread pool.
//!
//! A worker owns a multi-thread tokio runtime. It runs one dispatch loop
//! per endpoint plus any task handed to [`Worker::execute`], and tracks
//! all of them so [`Worker::await_termination`] can tell when the pool is
//! idle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use futures::future::BoxFuture;
use parking_lot::{Condvar, Mutex};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::dispatch::DispatchContext;
use crate::error::{Error, ErrorKind, Result};
use crate::listener::guarded;

/// Worker lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Accepting pipes and tasks.
    Running,

    /// `shutdown` was called; live endpoints are being closed.
    ShuttingDown,

    /// Everything finished and the threads were released.
    Terminated,
}

struct ProblemListener {
    handler: Box<dyn Fn(&Error) + Send + Sync>,
}

/// Collects faults escaping listeners and tasks.
pub(crate) struct Problems {
    listener: ArcSwapOption<ProblemListener>,
}

impl Problems {
    fn new() -> Self {
        Self {
            listener: ArcSwapOption::empty(),
        }
    }

    pub(crate) fn report(&self, err: &Error) {
        let Some(listener) = self.listener.load_full() else {
            return;
        };
        if let Err(fault) = guarded(|| (listener.handler)(err)) {
            log::error!("Problem listener failed: {}", fault);
        }
    }
}

/// Counts running dispatch loops and tasks.
struct Tracker {
    active: Mutex<usize>,
    idle: Condvar,
}

impl Tracker {
    fn new() -> Self {
        Self {
            active: Mutex::new(0),
            idle: Condvar::new(),
        }
    }

    fn enter(self: &Arc<Self>) -> TrackerGuard {
        *self.active.lock() += 1;
        TrackerGuard {
            tracker: Arc::clone(self),
        }
    }

    /// Returns `true` if the count dropped to zero within `timeout`.
    fn wait_idle(&self, timeout: Duration) -> bool {
        let mut active = self.active.lock();
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            while *active > 0 {
                self.idle.wait(&mut active);
            }
            return true;
        };
        while *active > 0 {
            if self.idle.wait_until(&mut active, deadline).timed_out() {
                return *active == 0;
            }
        }
        true
    }
}

struct TrackerGuard {
    tracker: Arc<Tracker>,
}

impl Drop for TrackerGuard {
    fn drop(&mut self) {
        let mut active = self.tracker.active.lock();
        *active -= 1;
        if *active == 0 {
            self.tracker.idle.notify_all();
        }
    }
}

struct WorkerInner {
    config: WorkerConfig,
    state: Mutex<WorkerState>,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    shutdown: CancellationToken,
    tracker: Arc<Tracker>,
    /// Keeps the tracker busy until `shutdown` is called.
    running: Mutex<Option<TrackerGuard>>,
    problems: Arc<Problems>,
    next_id: AtomicU64,
}

impl Drop for WorkerInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.get_mut().take() {
            runtime.shutdown_background();
        }
    }
}

/// A shared pool that executes listener dispatch for the pipes it created.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<WorkerInner>,
}

impl Worker {
    /// Starts the pool described by `config`.
    pub fn new(config: WorkerConfig) -> Result<Worker> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name(config.thread_name.clone())
            .build()
            .map_err(|err| Error::with_context(ErrorKind::Io, err.to_string()))?;
        let handle = runtime.handle().clone();
        let tracker = Arc::new(Tracker::new());
        let running = tracker.enter();

        log::info!(
            "Worker {} started with {} threads",
            config.thread_name,
            config.worker_threads
        );

        Ok(Worker {
            inner: Arc::new(WorkerInner {
                config,
                state: Mutex::new(WorkerState::Running),
                runtime: Mutex::new(Some(runtime)),
                handle,
                shutdown: CancellationToken::new(),
                tracker,
                running: Mutex::new(Some(running)),
                problems: Arc::new(Problems::new()),
                next_id: AtomicU64::new(1),
            }),
        })
    }

    /// The configuration the worker was started with.
    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    pub fn state(&self) -> WorkerState {
        *self.inner.state.lock()
    }

    /// Returns `true` once `shutdown` was called.
    pub fn is_shutdown(&self) -> bool {
        self.state() != WorkerState::Running
    }

    /// Returns `true` once termination completed.
    pub fn is_terminated(&self) -> bool {
        self.state() == WorkerState::Terminated
    }

    /// Installs the listener that receives every fault caught on the pool.
    pub fn set_problem_listener<F>(&self, handler: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.inner.problems.listener.store(Some(Arc::new(ProblemListener {
            handler: Box::new(handler),
        })));
    }

    /// Runs `task` on a pool thread. A panic is reported as a problem.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let state = self.inner.state.lock();
        if *state != WorkerState::Running {
            return Err(Error::with_context(ErrorKind::WorkerShutdown, "task rejected"));
        }
        let guard = self.inner.tracker.enter();
        let problems = Arc::clone(&self.inner.problems);
        self.inner.handle.spawn(async move {
            if let Err(err) = guarded(task) {
                log::error!("Task failed: {}", err);
                problems.report(&err);
            }
            drop(guard);
        });
        Ok(())
    }

    /// Stops accepting work and closes every live endpoint.
    ///
    /// Close listeners still run. Calling this again does nothing.
    pub fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state != WorkerState::Running {
                return;
            }
            *state = WorkerState::ShuttingDown;
        }
        log::info!("Worker {} shutting down", self.inner.config.thread_name);
        self.inner.running.lock().take();
        self.inner.shutdown.cancel();
    }

    /// Blocks until every dispatch loop and task finished.
    ///
    /// Returns `false` if `timeout` elapsed first, which is always the case
    /// while the worker was not shut down.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        if !self.inner.tracker.wait_idle(timeout) {
            return false;
        }
        let runtime = {
            let mut state = self.inner.state.lock();
            *state = WorkerState::Terminated;
            self.inner.runtime.lock().take()
        };
        if let Some(runtime) = runtime {
            runtime.shutdown_background();
            log::info!("Worker {} terminated", self.inner.config.thread_name);
        }
        true
    }

    pub(crate) fn next_channel_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn dispatch_context(&self) -> DispatchContext {
        DispatchContext {
            shutdown: self.inner.shutdown.clone(),
            problems: Arc::clone(&self.inner.problems),
        }
    }

    /// Starts dispatch loops, all or none.
    pub(crate) fn spawn_dispatchers(&self, loops: Vec<BoxFuture<'static, ()>>) -> Result<()> {
        let state = self.inner.state.lock();
        if *state != WorkerState::Running {
            return Err(Error::with_context(
                ErrorKind::WorkerShutdown,
                "cannot register channels",
            ));
        }
        for dispatch in loops {
            let guard = self.inner.tracker.enter();
            self.inner.handle.spawn(async move {
                dispatch.await;
                drop(guard);
            });
        }
        Ok(())
    }
}
