//! Compiled signal map
//!
//! Frame-indexed signal layout produced by the signal map compiler and read
//! by the ingestion loop. Immutable once compiled.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Bit-addressing convention of a signal within the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    /// Little-endian (Intel format)
    Little,
    /// Big-endian (Motorola format)
    Big,
}

impl FromStr for Endianness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "little" => Ok(Endianness::Little),
            "big" => Ok(Endianness::Big),
            other => Err(format!("expected 'little' or 'big', got '{}'", other)),
        }
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "little"),
            Endianness::Big => write!(f, "big"),
        }
    }
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Two's complement signed integer
    Signed,
    /// Zero-extended unsigned integer
    Unsigned,
}

/// A CAN signal definition
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDefinition {
    /// CAN ID of the frame carrying this signal
    pub frame_id: u32,
    /// Frame name as written on this signal's row
    pub frame_name: String,
    /// Signal name
    pub name: String,
    /// Start bit in the payload (LSB for little-endian, MSB for big-endian)
    pub start_bit: u8,
    /// Length in bits
    pub bit_length: u8,
    pub endianness: Endianness,
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Engineering unit (e.g., "km/h", "°C", "V")
    pub unit: String,
    /// Lower-cased traffic direction (e.g., "rx", "tx")
    pub direction: String,
    pub comment: String,
}

/// A complete CAN frame definition
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDefinition {
    /// CAN message ID
    pub id: u32,
    /// Display name, taken from the first row seen for this ID
    pub name: String,
    /// Declared data length, taken from the first row seen for this ID
    pub dlc: Option<u8>,
    /// Signals sorted by ascending start bit
    pub signals: Vec<SignalDefinition>,
}

/// The compiled signal map: frame definitions keyed by CAN ID
///
/// IDs absent from the table are unmapped and only ever recorded raw.
#[derive(Debug, Clone, Default)]
pub struct FrameTable {
    frames: HashMap<u32, FrameDefinition>,
}

impl FrameTable {
    pub(crate) fn from_frames(frames: HashMap<u32, FrameDefinition>) -> Self {
        Self { frames }
    }

    /// Get the frame definition for a CAN ID
    pub fn get(&self, can_id: u32) -> Option<&FrameDefinition> {
        self.frames.get(&can_id)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get all CAN IDs in the table, ascending
    pub fn frame_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.frames.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Get table statistics
    pub fn stats(&self) -> TableStats {
        TableStats {
            num_frames: self.frames.len(),
            num_signals: self.frames.values().map(|f| f.signals.len()).sum(),
        }
    }
}

/// Signal map statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableStats {
    /// Total number of frame definitions
    pub num_frames: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
}
