//! Write-only endpoint of a half duplex pipe.

use std::fmt;
use std::sync::Arc;

use super::ChannelCore;
use super::sealed::Endpoint;
use crate::io::{CloseableChannel, SinkChannel};

/// The right side of a half duplex pipe.
#[derive(Clone)]
pub struct StreamSinkChannel {
    core: Arc<ChannelCore<StreamSinkChannel>>,
}

impl Endpoint for StreamSinkChannel {
    fn core(&self) -> &Arc<ChannelCore<Self>> {
        &self.core
    }

    fn from_core(core: Arc<ChannelCore<Self>>) -> Self {
        Self { core }
    }
}

impl CloseableChannel for StreamSinkChannel {}
impl SinkChannel for StreamSinkChannel {}

impl fmt::Debug for StreamSinkChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSinkChannel")
            .field("id", &self.core.id())
            .field("state", &self.core.state())
            .finish()
    }
}
