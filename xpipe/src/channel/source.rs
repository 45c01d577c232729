//! Read-only endpoint of a half duplex pipe.

use std::fmt;
use std::sync::Arc;

use super::ChannelCore;
use super::sealed::Endpoint;
use crate::io::{CloseableChannel, SourceChannel};

/// The left side of a half duplex pipe.
#[derive(Clone)]
pub struct StreamSourceChannel {
    core: Arc<ChannelCore<StreamSourceChannel>>,
}

impl Endpoint for StreamSourceChannel {
    fn core(&self) -> &Arc<ChannelCore<Self>> {
        &self.core
    }

    fn from_core(core: Arc<ChannelCore<Self>>) -> Self {
        Self { core }
    }
}

impl CloseableChannel for StreamSourceChannel {}
impl SourceChannel for StreamSourceChannel {}

impl fmt::Debug for StreamSourceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSourceChannel")
            .field("id", &self.core.id())
            .field("state", &self.core.state())
            .finish()
    }
}
