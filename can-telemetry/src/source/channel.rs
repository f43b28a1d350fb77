//! Channel-fed frame source
//!
//! Lets a bus-reading thread forward frames to the ingestion loop. The
//! stream ends cleanly once every sender has been dropped.

use crate::source::FrameSource;
use crate::types::{CanFrame, SourceError};
use std::sync::mpsc::{self, Receiver, Sender};

/// Frame source backed by a std mpsc channel
pub struct ChannelSource {
    name: String,
    rx: Receiver<CanFrame>,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it
    pub fn new(name: impl Into<String>) -> (Sender<CanFrame>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::from_receiver(name, rx))
    }

    pub fn from_receiver(name: impl Into<String>, rx: Receiver<CanFrame>) -> Self {
        Self { name: name.into(), rx }
    }
}

impl FrameSource for ChannelSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<CanFrame>, SourceError> {
        // A disconnected channel is the end of the stream
        Ok(self.rx.recv().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_channel_source_ends_when_senders_drop() {
        let (tx, mut source) = ChannelSource::new("bus-thread");
        source.connect().unwrap();

        let producer = thread::spawn(move || {
            for id in 0..3u32 {
                tx.send(CanFrame::new(id, &[id as u8]).unwrap()).unwrap();
            }
        });

        let mut ids = Vec::new();
        while let Some(frame) = source.receive().unwrap() {
            ids.push(frame.can_id);
        }
        producer.join().unwrap();

        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(source.describe(), "bus-thread");
    }
}
