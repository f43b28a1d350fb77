//! Telemetry state store
//!
//! Holds the latest decoded value per signal plus a bounded history of raw
//! frames. The ingestion loop is the only writer; any number of consumers may
//! take snapshots concurrently. Both collections sit behind one reader/writer
//! lock so a snapshot always observes a consistent pairing.

use crate::config::{IngestConfig, DEFAULT_RAW_CAPACITY};
use crate::types::{format_frame_id, hex_upper, printable_ascii, CanFrame, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Latest known decoded value of one signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalValue {
    /// Signal name
    pub name: String,
    /// Physical value (raw * factor + offset)
    pub value: f64,
    pub unit: String,
    /// Source frame ID rendered as `0x1A3`
    pub frame_id: String,
    pub frame_name: String,
    pub updated_at: Timestamp,
    pub direction: String,
    pub comment: String,
}

impl SignalValue {
    /// Identity key: `frame_name.signal_name`
    pub fn key(&self) -> String {
        format!("{}.{}", self.frame_name, self.name)
    }
}

/// One received frame, rendered for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrameRecord {
    pub ts: Timestamp,
    /// Frame ID rendered as `0x1A3`
    pub id: String,
    /// Declared data length
    pub dlc: usize,
    /// Payload as contiguous uppercase hex
    pub data_hex: String,
    /// Payload as printable ASCII, '.' for anything else
    pub data_ascii: String,
}

impl RawFrameRecord {
    /// Build the record for a frame received at `ts`
    pub fn from_frame(frame: &CanFrame, ts: Timestamp) -> Self {
        Self {
            ts,
            id: format_frame_id(frame.can_id),
            dlc: frame.dlc(),
            data_hex: hex_upper(frame.data()),
            data_ascii: printable_ascii(frame.data()),
        }
    }
}

/// Point-in-time copy of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Sorted by frame name, then signal name
    pub signals: Vec<SignalValue>,
    /// Insertion order, oldest first
    pub raw_frames: Vec<RawFrameRecord>,
}

#[derive(Debug, Default)]
struct StoreInner {
    signals: HashMap<String, SignalValue>,
    raw_frames: VecDeque<RawFrameRecord>,
}

/// Concurrent store of decoded signal values and raw frame history
#[derive(Debug)]
pub struct TelemetryStore {
    raw_capacity: usize,
    inner: RwLock<StoreInner>,
}

impl TelemetryStore {
    /// Create a store keeping at most `raw_capacity` raw frames
    pub fn new(raw_capacity: usize) -> Self {
        Self {
            raw_capacity,
            inner: RwLock::new(StoreInner {
                signals: HashMap::new(),
                raw_frames: VecDeque::with_capacity(raw_capacity),
            }),
        }
    }

    /// Create a store sized by an ingestion configuration
    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.raw_capacity)
    }

    pub fn raw_capacity(&self) -> usize {
        self.raw_capacity
    }

    /// Insert or overwrite the value stored under `frame_name.signal_name`
    pub fn upsert_signal(&self, value: SignalValue) {
        let key = value.key();
        self.write().signals.insert(key, value);
    }

    /// Append a raw frame, evicting the oldest beyond capacity
    pub fn push_raw(&self, record: RawFrameRecord) {
        let mut inner = self.write();
        inner.raw_frames.push_back(record);
        while inner.raw_frames.len() > self.raw_capacity {
            inner.raw_frames.pop_front();
        }
    }

    /// Take a consistent copy of all signal values and raw frames
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.read();

        let mut signals: Vec<SignalValue> = inner.signals.values().cloned().collect();
        let raw_frames: Vec<RawFrameRecord> = inner.raw_frames.iter().cloned().collect();
        drop(inner);

        signals.sort_by(|a, b| {
            a.frame_name
                .cmp(&b.frame_name)
                .then_with(|| a.name.cmp(&b.name))
        });

        Snapshot { signals, raw_frames }
    }

    /// Number of distinct signals currently held
    pub fn signal_count(&self) -> usize {
        self.read().signals.len()
    }

    /// Number of raw frames currently held
    pub fn raw_len(&self) -> usize {
        self.read().raw_frames.len()
    }

    // Poisoning is ignored; the guarded collections stay valid after a panic.
    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(DEFAULT_RAW_CAPACITY)
    }
}
