//! # XPipe - In-process channel pipes
//!
//! XPipe connects two endpoints inside one process with a non-blocking,
//! listener driven byte stream:
//!
//! - **Full duplex pipes**: two independent directions, one per side
//! - **Half duplex pipes**: a source on the left fed by a sink on the right
//! - **Level-triggered listeners**: read, write and close callbacks run on a
//!   shared worker pool, serialized per endpoint
//! - **Backpressure**: writes accept only what fits and never block
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Layer                     │
//! │          listeners, read / write / close calls           │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Endpoint Layer                        │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │ State       │ │ Interest    │ │ Listener slots  │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Segment Layer                         │
//! │  ┌─────────────────────────────────────────────────┐   │
//! │  │        Ring buffer per direction + readiness     │   │
//! │  └─────────────────────────────────────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Worker                                │
//! │  ┌─────────────────────────────────────────────────┐   │
//! │  │     tokio runtime running one dispatch loop      │   │
//! │  │                 per endpoint                     │   │
//! │  └─────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use xpipe::{SinkChannel, SourceChannel, Worker, WorkerConfig};
//!
//! let worker = Worker::new(WorkerConfig::default())?;
//! let (source, sink) = worker.create_half_duplex_pipe()?.into_sides();
//!
//! source.read_setter().set(|channel| {
//!     let mut buf = [0u8; 1024];
//!     while let Ok(Some(n)) = channel.read(&mut buf) {
//!         if n == 0 {
//!             break;
//!         }
//!     }
//! });
//! source.resume_reads();
//!
//! sink.write(b"Hello, World!")?;
//! sink.close()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod buffer;
pub mod channel;
pub mod config;
pub mod error;
pub mod io;
pub mod listener;
pub mod pipe;
pub mod worker;

mod dispatch;

#[cfg(test)]
mod testing;

pub use channel::{ChannelState, StreamChannel, StreamSinkChannel, StreamSourceChannel};
pub use config::WorkerConfig;
pub use error::{Error, ErrorKind, Result};
pub use io::{CloseableChannel, SinkChannel, SourceChannel};
pub use listener::{
    ChannelListener, Setter, closing_channel_listener, invoke_channel_listener, safe_close,
};
pub use pipe::{ChannelPipe, create_pipe};
pub use worker::{Worker, WorkerState};

/// Default number of pool threads.
pub const DEFAULT_WORKER_THREADS: usize = 2;

/// Default name of the pool threads.
pub const DEFAULT_THREAD_NAME: &str = "xpipe-worker";

/// Default capacity in bytes of one pipe direction.
pub const DEFAULT_PIPE_BUFFER_SIZE: usize = 8192;
