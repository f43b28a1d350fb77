//! Core types for the CAN telemetry library
//!
//! This module defines the frame type handed over by frame sources, the error
//! taxonomy shared by every stage of the pipeline, and the small formatting
//! helpers used when rendering identifiers and payloads.

use chrono::{DateTime, Utc};
use std::fmt;

/// Timestamp type used throughout the library
pub type Timestamp = DateTime<Utc>;

/// Result type for library operations
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Maximum payload length of a classic CAN frame
pub const MAX_PAYLOAD_LEN: usize = 8;

/// Raw CAN frame as received from a frame source
///
/// Only classic CAN is supported: the payload is 0-8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// True if this is an extended (29-bit) CAN ID
    pub is_extended: bool,
    data: Vec<u8>,
}

impl CanFrame {
    /// Create a frame from an identifier and a payload of at most 8 bytes
    pub fn new(can_id: u32, data: &[u8]) -> Result<Self> {
        if data.len() > MAX_PAYLOAD_LEN {
            return Err(TelemetryError::InvalidFrame(format!(
                "CAN ID 0x{:X} carries {} bytes (max {})",
                can_id,
                data.len(),
                MAX_PAYLOAD_LEN
            )));
        }

        Ok(Self {
            can_id,
            is_extended: can_id > 0x7FF,
            data: data.to_vec(),
        })
    }

    /// Builder method: mark the identifier as extended (29-bit)
    pub fn with_extended(mut self, extended: bool) -> Self {
        self.is_extended = extended;
        self
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.data.len()
    }

    /// The declared payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Payload zero-padded to the full 8-byte buffer the decoder reads
    pub fn payload(&self) -> [u8; MAX_PAYLOAD_LEN] {
        let mut buf = [0u8; MAX_PAYLOAD_LEN];
        buf[..self.data.len()].copy_from_slice(&self.data);
        buf
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", format_frame_id(self.can_id), hex_upper(&self.data))
    }
}

/// Errors raised while compiling a signal map
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("invalid row {row}: bad {field}: {reason}")]
    InvalidRow {
        /// Line number in the signal map (the header is line 1)
        row: u64,
        /// Column whose value failed to parse or validate
        field: String,
        reason: String,
    },

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("signal map has no data rows")]
    Empty,

    #[error("malformed signal map: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by frame source implementations
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame at line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

/// Errors that can occur in the telemetry pipeline
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("signal map error: {0}")]
    Schema(#[from] SchemaError),

    #[error("failed to connect to frame source {source_name}: {error}")]
    SourceConnection {
        source_name: String,
        error: SourceError,
    },

    #[error("frame source {source_name} failed: {error}")]
    SourceStream {
        source_name: String,
        error: SourceError,
    },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Render a frame identifier the way every snapshot shows it (`0x1A3`)
pub fn format_frame_id(can_id: u32) -> String {
    format!("0x{:03X}", can_id)
}

/// Render bytes as contiguous uppercase hex
pub fn hex_upper(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Render bytes as printable ASCII, substituting '.' for anything else
pub fn printable_ascii(data: &[u8]) -> String {
    data.iter()
        .map(|&b| if (32..=126).contains(&b) { b as char } else { '.' })
        .collect()
}
