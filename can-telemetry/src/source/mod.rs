//! Frame sources
//!
//! A frame source is whatever hands received CAN frames to the ingestion
//! loop: a candump log replayed from disk, a live `candump -L` stream piped
//! through stdin, or frames forwarded over a channel by a bus-reading thread.

use crate::types::{CanFrame, SourceError};

pub mod candump;
pub mod channel;

// Re-export source types
pub use candump::{parse_candump_line, CandumpSource};
pub use channel::ChannelSource;

/// Common trait for all frame sources
///
/// `receive` blocks until the next frame is available. `Ok(None)` marks a
/// clean end of stream; an error is terminal for the stream.
pub trait FrameSource {
    /// Human-readable name for logs and errors (e.g. a path or interface)
    fn describe(&self) -> String;

    /// Acquire the underlying resource
    fn connect(&mut self) -> Result<(), SourceError>;

    /// Receive the next frame
    fn receive(&mut self) -> Result<Option<CanFrame>, SourceError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        (**self).connect()
    }

    fn receive(&mut self) -> Result<Option<CanFrame>, SourceError> {
        (**self).receive()
    }
}
