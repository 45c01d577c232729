//! Worker configuration.

use crate::{DEFAULT_PIPE_BUFFER_SIZE, DEFAULT_THREAD_NAME, DEFAULT_WORKER_THREADS};

/// Worker pool configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of pool threads.
    pub worker_threads: usize,
    /// Name given to every pool thread.
    pub thread_name: String,
    /// Capacity in bytes of each pipe direction.
    pub pipe_buffer_size: usize,
}

impl WorkerConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            pipe_buffer_size: DEFAULT_PIPE_BUFFER_SIZE,
        }
    }

    /// Sets the number of pool threads (at least one).
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads.max(1);
        self
    }

    /// Sets the pool thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Sets the per-direction buffer capacity (at least one byte).
    pub fn with_pipe_buffer_size(mut self, size: usize) -> Self {
        self.pipe_buffer_size = size.max(1);
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new()
    }
}
