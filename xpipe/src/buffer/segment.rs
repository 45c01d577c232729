//! One direction of a pipe.
//!
//! A segment is written by exactly one endpoint and read by exactly one
//! endpoint. Both ends are attached as [`Readiness`] observers and get
//! poked whenever an operation may have changed what they can do.

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;

use super::RingBuffer;
use crate::error::{Error, ErrorKind, Result};

/// Observer of a segment's readiness changes.
pub(crate) trait Readiness: Send + Sync {
    /// Bytes or end-of-stream may have become available.
    fn readable_changed(&self);

    /// Capacity may have been freed, or the reader went away.
    fn writable_changed(&self);
}

#[derive(Debug)]
struct SegmentState {
    ring: RingBuffer,
    /// The writer will never write again; drained means end-of-stream.
    writer_shut: bool,
    /// The reader will never read again; writes fail.
    reader_gone: bool,
}

pub(crate) struct Segment {
    state: Mutex<SegmentState>,
    reader: OnceLock<Weak<dyn Readiness>>,
    writer: OnceLock<Weak<dyn Readiness>>,
}

impl Segment {
    pub(crate) fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SegmentState {
                ring: RingBuffer::new(capacity),
                writer_shut: false,
                reader_gone: false,
            }),
            reader: OnceLock::new(),
            writer: OnceLock::new(),
        })
    }

    /// Attaches the two endpoints. Only the first call has an effect.
    pub(crate) fn attach(&self, reader: Weak<dyn Readiness>, writer: Weak<dyn Readiness>) {
        let _ = self.reader.set(reader);
        let _ = self.writer.set(writer);
    }

    /// Copies buffered bytes into `buf`.
    ///
    /// Returns `None` once the writer is shut and everything was drained.
    pub(crate) fn read(&self, buf: &mut [u8]) -> Option<usize> {
        let (read, eof) = {
            let mut state = self.state.lock();
            let read = state.ring.read(buf);
            (read, read == 0 && state.ring.is_empty() && state.writer_shut)
        };
        if read > 0 {
            self.notify_writer();
        }
        if eof { None } else { Some(read) }
    }

    /// Accepts as many bytes as fit. Zero means the segment is full.
    pub(crate) fn write(&self, data: &[u8]) -> Result<usize> {
        let written = {
            let mut state = self.state.lock();
            if state.reader_gone {
                return Err(Error::with_context(
                    ErrorKind::BrokenPipe,
                    "peer no longer reads",
                ));
            }
            if state.writer_shut {
                return Err(Error::with_context(ErrorKind::Closed, "writes are shut down"));
            }
            state.ring.write(data)
        };
        if written > 0 {
            self.notify_reader();
        }
        Ok(written)
    }

    /// Marks the write end as finished. Buffered bytes stay readable.
    pub(crate) fn shut_writer(&self) {
        {
            let mut state = self.state.lock();
            if state.writer_shut {
                return;
            }
            state.writer_shut = true;
        }
        self.notify_reader();
    }

    /// Marks the read end as gone and discards whatever is still buffered.
    pub(crate) fn shut_reader(&self) {
        {
            let mut state = self.state.lock();
            if state.reader_gone {
                return;
            }
            state.reader_gone = true;
            state.ring.clear();
        }
        self.notify_writer();
    }

    pub(crate) fn is_readable(&self) -> bool {
        let state = self.state.lock();
        !state.ring.is_empty() || state.writer_shut
    }

    pub(crate) fn is_writable(&self) -> bool {
        let state = self.state.lock();
        state.ring.remaining() > 0 || state.reader_gone
    }

    fn notify_reader(&self) {
        if let Some(reader) = self.reader.get().and_then(Weak::upgrade) {
            reader.readable_changed();
        }
    }

    fn notify_writer(&self) {
        if let Some(writer) = self.writer.get().and_then(Weak::upgrade) {
            writer.writable_changed();
        }
    }
}
