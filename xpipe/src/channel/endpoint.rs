//! Shared state behind an endpoint handle.
//!
//! Readiness is level-triggered. Whenever something may have changed what
//! an endpoint can do, [`ChannelCore::schedule`] checks interest and
//! readiness and enqueues at most one pending event per direction. The
//! endpoint's dispatch loop pops events one at a time, so invocations for
//! one endpoint never overlap.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::sealed::Endpoint;
use super::{ChannelState, Direction};
use crate::buffer::{Readiness, Segment};
use crate::dispatch::Event;
use crate::error::{Error, ErrorKind, Result};
use crate::listener::{ChannelListener, ListenerSlot, Listeners, guarded};
use crate::worker::Problems;

/// Interest bookkeeping for one direction.
struct Interest {
    /// The user asked for listener invocations.
    resumed: AtomicBool,
    /// An event for this direction sits in the queue.
    scheduled: AtomicBool,
}

impl Interest {
    fn new() -> Self {
        Self {
            resumed: AtomicBool::new(false),
            scheduled: AtomicBool::new(false),
        }
    }
}

/// State shared by every handle of one endpoint.
pub struct ChannelCore<C> {
    id: u64,
    state: Mutex<ChannelState>,
    /// Segment this endpoint reads from.
    inbound: Option<Arc<Segment>>,
    /// Segment this endpoint writes to.
    outbound: Option<Arc<Segment>>,
    /// Reads were shut down locally; they report end-of-stream from now on.
    reads_shut: AtomicBool,
    read_interest: Interest,
    write_interest: Interest,
    listeners: Listeners<C>,
    events: UnboundedSender<Event>,
}

impl<C: Endpoint> ChannelCore<C> {
    pub(crate) fn create(
        id: u64,
        inbound: Option<Arc<Segment>>,
        outbound: Option<Arc<Segment>>,
    ) -> (Arc<Self>, UnboundedReceiver<Event>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let core = Arc::new(Self {
            id,
            state: Mutex::new(ChannelState::Open),
            inbound,
            outbound,
            reads_shut: AtomicBool::new(false),
            read_interest: Interest::new(),
            write_interest: Interest::new(),
            listeners: Listeners::new(),
            events,
        });
        (core, receiver)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn state(&self) -> ChannelState {
        *self.state.lock()
    }

    pub(crate) fn listeners(&self) -> &Listeners<C> {
        &self.listeners
    }

    pub(crate) fn read(&self, buf: &mut [u8]) -> Result<Option<usize>> {
        let Some(segment) = &self.inbound else {
            return Err(Error::with_context(ErrorKind::Closed, "endpoint cannot read"));
        };
        if self.reads_shut.load(Ordering::SeqCst) {
            return Ok(None);
        }
        match self.state() {
            ChannelState::Closed => Err(closed()),
            ChannelState::ReadShutdown => Ok(None),
            _ => Ok(segment.read(buf)),
        }
    }

    pub(crate) fn write(&self, data: &[u8]) -> Result<usize> {
        let Some(segment) = &self.outbound else {
            return Err(Error::with_context(ErrorKind::Closed, "endpoint cannot write"));
        };
        match self.state() {
            ChannelState::Closed => Err(closed()),
            ChannelState::WriteShutdown => {
                Err(Error::with_context(ErrorKind::Closed, "writes are shut down"))
            }
            _ => segment.write(data),
        }
    }

    pub(crate) fn flush(&self) -> Result<bool> {
        match self.state() {
            ChannelState::Closed => Err(closed()),
            _ => Ok(true),
        }
    }

    pub(crate) fn resume(&self, direction: Direction) {
        self.interest(direction).resumed.store(true, Ordering::SeqCst);
        self.schedule(direction);
    }

    pub(crate) fn suspend(&self, direction: Direction) {
        self.interest(direction).resumed.store(false, Ordering::SeqCst);
    }

    pub(crate) fn is_resumed(&self, direction: Direction) -> bool {
        self.interest(direction).resumed.load(Ordering::SeqCst)
    }

    pub(crate) fn shutdown(&self, direction: Direction) {
        let duplex = self.inbound.is_some() && self.outbound.is_some();
        let next = {
            let mut state = self.state.lock();
            let next = state.after_shutdown(direction, duplex);
            if next == *state {
                return;
            }
            *state = next;
            if direction == Direction::Read {
                self.reads_shut.store(true, Ordering::SeqCst);
            }
            next
        };
        log::debug!("Channel {} shut down {:?}, now {:?}", self.id, direction, next);

        match direction {
            Direction::Read => self.shut_inbound(),
            Direction::Write => self.shut_outbound(),
        }
        if next == ChannelState::Closed {
            self.finish_close();
        }
    }

    pub(crate) fn close(&self) {
        {
            let mut state = self.state.lock();
            if *state == ChannelState::Closed {
                return;
            }
            *state = ChannelState::Closed;
        }
        log::debug!("Channel {} closed", self.id);
        self.finish_close();
    }

    /// Runs once, right after the transition to `Closed`.
    fn finish_close(&self) {
        self.shut_inbound();
        self.shut_outbound();
        if self.events.send(Event::Closed).is_err() {
            log::trace!("Channel {} has no dispatcher left for its close event", self.id);
        }
    }

    fn shut_inbound(&self) {
        if let Some(segment) = &self.inbound {
            segment.shut_reader();
        }
    }

    fn shut_outbound(&self) {
        if let Some(segment) = &self.outbound {
            segment.shut_writer();
        }
    }

    fn interest(&self, direction: Direction) -> &Interest {
        match direction {
            Direction::Read => &self.read_interest,
            Direction::Write => &self.write_interest,
        }
    }

    fn slot(&self, direction: Direction) -> &ListenerSlot<C> {
        match direction {
            Direction::Read => &self.listeners.read,
            Direction::Write => &self.listeners.write,
        }
    }

    fn is_ready(&self, direction: Direction) -> bool {
        let state = self.state();
        match direction {
            Direction::Read => {
                state.reads_open() && self.inbound.as_ref().is_some_and(|s| s.is_readable())
            }
            Direction::Write => {
                state.writes_open() && self.outbound.as_ref().is_some_and(|s| s.is_writable())
            }
        }
    }

    /// Enqueues a readiness event if interest is resumed, the condition
    /// holds and no event for `direction` is pending yet.
    pub(crate) fn schedule(&self, direction: Direction) {
        let interest = self.interest(direction);
        if !interest.resumed.load(Ordering::SeqCst) || !self.is_ready(direction) {
            return;
        }
        if interest.scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let event = match direction {
            Direction::Read => Event::ReadReady,
            Direction::Write => Event::WriteReady,
        };
        if self.events.send(event).is_err() {
            interest.scheduled.store(false, Ordering::SeqCst);
            return;
        }
        log::trace!("Channel {} scheduled {:?}", self.id, event);
    }

    /// Handles one event on the endpoint's dispatch loop.
    ///
    /// Returns `false` once the close event was handled and the loop must
    /// stop.
    pub(crate) fn dispatch(self: &Arc<Self>, event: Event, problems: &Problems) -> bool {
        let direction = match event {
            Event::ReadReady => Direction::Read,
            Event::WriteReady => Direction::Write,
            Event::Closed => {
                let listener = self.listeners.close.take();
                self.listeners.read.store(None);
                self.listeners.write.store(None);
                if let Some(listener) = listener {
                    self.invoke(&listener, problems);
                }
                return false;
            }
        };

        let interest = self.interest(direction);
        interest.scheduled.store(false, Ordering::SeqCst);
        if !interest.resumed.load(Ordering::SeqCst) || !self.is_ready(direction) {
            return true;
        }
        let Some(listener) = self.slot(direction).load() else {
            return true;
        };
        self.invoke(&listener, problems);
        self.schedule(direction);
        true
    }

    fn invoke(self: &Arc<Self>, listener: &ChannelListener<C>, problems: &Problems) {
        let channel = C::from_core(Arc::clone(self));
        if let Err(err) = guarded(|| listener.handle_event(&channel)) {
            log::error!("Listener on channel {} failed: {}", self.id, err);
            problems.report(&err);
        }
    }
}

fn closed() -> Error {
    Error::with_context(ErrorKind::Closed, "channel is closed")
}

impl<C: Endpoint> Readiness for ChannelCore<C> {
    fn readable_changed(&self) {
        self.schedule(Direction::Read);
    }

    fn writable_changed(&self) {
        self.schedule(Direction::Write);
    }
}

impl<C> Drop for ChannelCore<C> {
    fn drop(&mut self) {
        if *self.state.get_mut() != ChannelState::Closed {
            log::debug!("Channel {} abandoned without close", self.id);
        }
        if let Some(segment) = &self.inbound {
            segment.shut_reader();
        }
        if let Some(segment) = &self.outbound {
            segment.shut_writer();
        }
    }
}
