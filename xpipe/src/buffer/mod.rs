//! Buffer management for pipes.
//!
//! - RingBuffer: circular byte store
//! - Segment: one direction of a pipe, shared by its writer and reader

mod ring;
mod segment;

pub use ring::RingBuffer;
pub(crate) use segment::{Readiness, Segment};
