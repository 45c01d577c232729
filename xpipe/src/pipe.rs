//! Pipe factories.

use std::sync::{Arc, Weak};

use futures::FutureExt;

use crate::buffer::{Readiness, Segment};
use crate::channel::sealed::Endpoint;
use crate::channel::{ChannelCore, StreamChannel, StreamSinkChannel, StreamSourceChannel};
use crate::dispatch::dispatch_loop;
use crate::error::Result;
use crate::worker::Worker;

/// The two connected sides of a pipe.
#[derive(Debug)]
pub struct ChannelPipe<L, R> {
    left: L,
    right: R,
}

impl<L, R> ChannelPipe<L, R> {
    /// The left endpoint.
    pub fn left_side(&self) -> &L {
        &self.left
    }

    /// The right endpoint.
    pub fn right_side(&self) -> &R {
        &self.right
    }

    /// Splits the pipe into its two endpoints.
    pub fn into_sides(self) -> (L, R) {
        (self.left, self.right)
    }
}

/// Creates a full duplex pipe on `worker`.
pub fn create_pipe(worker: &Worker) -> Result<ChannelPipe<StreamChannel, StreamChannel>> {
    worker.create_full_duplex_pipe()
}

fn observer<C: Endpoint>(core: &Arc<ChannelCore<C>>) -> Weak<dyn Readiness> {
    let weak: Weak<ChannelCore<C>> = Arc::downgrade(core);
    weak
}

impl Worker {
    /// Creates two duplex endpoints; what one side writes the other reads.
    pub fn create_full_duplex_pipe(&self) -> Result<ChannelPipe<StreamChannel, StreamChannel>> {
        let capacity = self.config().pipe_buffer_size;
        let left_to_right = Segment::new(capacity);
        let right_to_left = Segment::new(capacity);

        let (left, left_events) = ChannelCore::<StreamChannel>::create(
            self.next_channel_id(),
            Some(Arc::clone(&right_to_left)),
            Some(Arc::clone(&left_to_right)),
        );
        let (right, right_events) = ChannelCore::<StreamChannel>::create(
            self.next_channel_id(),
            Some(Arc::clone(&left_to_right)),
            Some(Arc::clone(&right_to_left)),
        );
        left_to_right.attach(observer(&right), observer(&left));
        right_to_left.attach(observer(&left), observer(&right));

        let ctx = self.dispatch_context();
        self.spawn_dispatchers(vec![
            dispatch_loop(Arc::downgrade(&left), left_events, ctx.clone()).boxed(),
            dispatch_loop(Arc::downgrade(&right), right_events, ctx).boxed(),
        ])?;

        log::debug!("Created full duplex pipe {} <-> {}", left.id(), right.id());
        Ok(ChannelPipe {
            left: StreamChannel::from_core(left),
            right: StreamChannel::from_core(right),
        })
    }

    /// Creates a one-way pipe: the right side writes, the left side reads.
    pub fn create_half_duplex_pipe(
        &self,
    ) -> Result<ChannelPipe<StreamSourceChannel, StreamSinkChannel>> {
        let segment = Segment::new(self.config().pipe_buffer_size);

        let (source, source_events) = ChannelCore::<StreamSourceChannel>::create(
            self.next_channel_id(),
            Some(Arc::clone(&segment)),
            None,
        );
        let (sink, sink_events) = ChannelCore::<StreamSinkChannel>::create(
            self.next_channel_id(),
            None,
            Some(Arc::clone(&segment)),
        );
        segment.attach(observer(&source), observer(&sink));

        let ctx = self.dispatch_context();
        self.spawn_dispatchers(vec![
            dispatch_loop(Arc::downgrade(&source), source_events, ctx.clone()).boxed(),
            dispatch_loop(Arc::downgrade(&sink), sink_events, ctx).boxed(),
        ])?;

        log::debug!("Created half duplex pipe {} <- {}", source.id(), sink.id());
        Ok(ChannelPipe {
            left: StreamSourceChannel::from_core(source),
            right: StreamSinkChannel::from_core(sink),
        })
    }
}
