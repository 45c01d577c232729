//! Pipe endpoints.
//!
//! This module provides the three endpoint handles and the state machine
//! they share. A handle is a cheap clone of an `Arc` around the endpoint
//! core; the endpoint lives as long as any handle does.

mod endpoint;
mod sink;
mod source;
mod stream;

pub(crate) use endpoint::ChannelCore;
pub use sink::StreamSinkChannel;
pub use source::StreamSourceChannel;
pub use stream::StreamChannel;

pub(crate) mod sealed {
    use std::sync::Arc;

    use super::ChannelCore;

    /// Access to the core behind a handle. Not implementable outside the crate.
    pub trait Endpoint: Sized + Send + Sync + 'static {
        fn core(&self) -> &Arc<ChannelCore<Self>>;

        fn from_core(core: Arc<ChannelCore<Self>>) -> Self;
    }
}

/// Endpoint state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Both available directions are usable.
    Open,

    /// Reads were shut down; writes still work.
    ReadShutdown,

    /// Writes were shut down; reads still work.
    WriteShutdown,

    /// Terminal.
    Closed,
}

impl ChannelState {
    /// Returns `true` if reads are still allowed.
    pub fn reads_open(self) -> bool {
        matches!(self, ChannelState::Open | ChannelState::WriteShutdown)
    }

    /// Returns `true` if writes are still allowed.
    pub fn writes_open(self) -> bool {
        matches!(self, ChannelState::Open | ChannelState::ReadShutdown)
    }

    /// State after shutting `direction`.
    ///
    /// `duplex` endpoints keep the other direction open; single direction
    /// endpoints have nothing left and close.
    pub(crate) fn after_shutdown(self, direction: Direction, duplex: bool) -> ChannelState {
        match (self, direction) {
            (ChannelState::Open, Direction::Read) if duplex => ChannelState::ReadShutdown,
            (ChannelState::Open, Direction::Write) if duplex => ChannelState::WriteShutdown,
            (ChannelState::ReadShutdown, Direction::Read) => ChannelState::ReadShutdown,
            (ChannelState::WriteShutdown, Direction::Write) => ChannelState::WriteShutdown,
            _ => ChannelState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Read,
    Write,
}
