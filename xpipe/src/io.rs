//! Channel traits.
//!
//! The traits are implemented by the endpoint handles of this crate only.
//! Every method has a default body that forwards to the shared endpoint
//! core, so the handles themselves stay empty wrappers.

use crate::channel::sealed::Endpoint;
use crate::channel::{ChannelState, Direction};
use crate::error::Result;
use crate::listener::Setter;

/// Operations common to every endpoint.
pub trait CloseableChannel: Endpoint {
    /// Identifier, unique within the worker that created the pipe.
    fn id(&self) -> u64 {
        self.core().id()
    }

    /// Current endpoint state.
    fn state(&self) -> ChannelState {
        self.core().state()
    }

    /// Returns `true` until the endpoint is closed.
    fn is_open(&self) -> bool {
        self.state() != ChannelState::Closed
    }

    /// Closes the endpoint.
    ///
    /// The close listener runs once, later, on a pool thread. Closing an
    /// already closed endpoint does nothing.
    fn close(&self) -> Result<()> {
        self.core().close();
        Ok(())
    }

    /// Setter for the close listener.
    fn close_setter(&self) -> Setter<'_, Self> {
        Setter::new(&self.core().listeners().close)
    }
}

/// The read side of an endpoint.
pub trait SourceChannel: CloseableChannel {
    /// Reads buffered bytes without blocking.
    ///
    /// `Ok(Some(0))` means nothing is available yet, `Ok(None)` means
    /// end-of-stream.
    fn read(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        self.core().read(buf)
    }

    /// Asks for read listener invocations while data or end-of-stream is available.
    fn resume_reads(&self) {
        self.core().resume(Direction::Read);
    }

    /// Stops scheduling read listener invocations.
    fn suspend_reads(&self) {
        self.core().suspend(Direction::Read);
    }

    /// Returns `true` while read interest is resumed.
    fn is_reading_resumed(&self) -> bool {
        self.core().is_resumed(Direction::Read)
    }

    /// Stops reading for good. Buffered inbound bytes are discarded.
    fn shutdown_reads(&self) -> Result<()> {
        self.core().shutdown(Direction::Read);
        Ok(())
    }

    /// Setter for the read listener.
    fn read_setter(&self) -> Setter<'_, Self> {
        Setter::new(&self.core().listeners().read)
    }
}

/// The write side of an endpoint.
pub trait SinkChannel: CloseableChannel {
    /// Writes as many bytes as the pipe accepts right now.
    ///
    /// Zero means the pipe is full; wait for the write listener.
    fn write(&self, data: &[u8]) -> Result<usize> {
        self.core().write(data)
    }

    /// Written bytes are handed to the pipe immediately, so this only fails
    /// on a closed endpoint.
    fn flush(&self) -> Result<bool> {
        self.core().flush()
    }

    /// Asks for write listener invocations while the pipe has room.
    fn resume_writes(&self) {
        self.core().resume(Direction::Write);
    }

    /// Stops scheduling write listener invocations.
    fn suspend_writes(&self) {
        self.core().suspend(Direction::Write);
    }

    /// Returns `true` while write interest is resumed.
    fn is_writing_resumed(&self) -> bool {
        self.core().is_resumed(Direction::Write)
    }

    /// Half-closes the endpoint. The peer reads end-of-stream after draining.
    fn shutdown_writes(&self) -> Result<()> {
        self.core().shutdown(Direction::Write);
        Ok(())
    }

    /// Setter for the write listener.
    fn write_setter(&self) -> Setter<'_, Self> {
        Setter::new(&self.core().listeners().write)
    }
}
