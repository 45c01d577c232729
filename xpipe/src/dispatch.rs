//! Per-endpoint dispatch loops.
//!
//! Each endpoint gets one loop on the worker's runtime. The loop owns the
//! receiving half of the endpoint's event queue and holds only a weak
//! reference to the endpoint, so dropping every handle ends the loop.

use std::sync::{Arc, Weak};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::channel::ChannelCore;
use crate::channel::sealed::Endpoint;
use crate::worker::Problems;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    ReadReady,
    WriteReady,
    Closed,
}

/// What a dispatch loop needs from its worker.
#[derive(Clone)]
pub(crate) struct DispatchContext {
    pub(crate) shutdown: CancellationToken,
    pub(crate) problems: Arc<Problems>,
}

pub(crate) async fn dispatch_loop<C: Endpoint>(
    endpoint: Weak<ChannelCore<C>>,
    mut events: UnboundedReceiver<Event>,
    ctx: DispatchContext,
) {
    let mut draining = false;
    loop {
        let event = tokio::select! {
            biased;

            _ = ctx.shutdown.cancelled(), if !draining => {
                draining = true;
                match endpoint.upgrade() {
                    Some(core) => {
                        log::trace!("Worker shutdown closes channel {}", core.id());
                        core.close();
                        continue;
                    }
                    None => break,
                }
            }
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(core) = endpoint.upgrade() else {
            break;
        };
        if !core.dispatch(event, &ctx.problems) {
            log::trace!("Dispatch loop of channel {} finished", core.id());
            break;
        }
    }
}
