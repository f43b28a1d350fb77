//! Ingestion configuration types
//!
//! This module defines the minimal configuration needed by the ingestion loop
//! and the telemetry store. Source selection and output rendering are handled
//! by the application layer.

use serde::{Deserialize, Serialize};

/// Default number of raw frames retained by the store
pub const DEFAULT_RAW_CAPACITY: usize = 200;

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Number of raw frames kept in the history FIFO
    #[serde(default = "default_raw_capacity")]
    pub raw_capacity: usize,

    /// Optional: stop streaming after this many frames (replay/testing aid)
    #[serde(default)]
    pub max_frames: Option<u64>,
}

fn default_raw_capacity() -> usize {
    DEFAULT_RAW_CAPACITY
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            raw_capacity: DEFAULT_RAW_CAPACITY,
            max_frames: None,
        }
    }
}

impl IngestConfig {
    /// Create a new ingestion configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set raw frame history capacity
    pub fn with_raw_capacity(mut self, capacity: usize) -> Self {
        self.raw_capacity = capacity;
        self
    }

    /// Builder method: stop after a fixed number of frames
    pub fn with_max_frames(mut self, max_frames: u64) -> Self {
        self.max_frames = Some(max_frames);
        self
    }

    /// Check whether the frame budget has been used up
    pub fn frame_limit_reached(&self, frames_seen: u64) -> bool {
        match self.max_frames {
            Some(limit) => frames_seen >= limit,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_config_builder() {
        let config = IngestConfig::new().with_raw_capacity(16).with_max_frames(100);

        assert_eq!(config.raw_capacity, 16);
        assert_eq!(config.max_frames, Some(100));
        assert!(!config.frame_limit_reached(99));
        assert!(config.frame_limit_reached(100));
    }

    #[test]
    fn test_no_frame_limit() {
        let config = IngestConfig::new();

        assert_eq!(config.raw_capacity, DEFAULT_RAW_CAPACITY);
        assert!(!config.frame_limit_reached(u64::MAX));
    }
}
