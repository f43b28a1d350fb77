//! CAN Telemetry Library
//!
//! Decodes a live stream of classic CAN frames against a CSV signal map and
//! keeps the latest engineering value of every signal, plus a bounded history
//! of raw frames, for polling consumers.
//!
//! # Architecture
//!
//! - [`schema`] compiles the signal map into a frame-indexed table
//! - [`bitfield`] extracts and scales signal bit-fields (pure functions)
//! - [`store`] holds the latest values and raw history behind one RwLock
//! - [`ingest`] runs the single-writer loop that ties them together
//! - [`source`] defines where frames come from (candump logs, channels)
//!
//! The library does NOT:
//! - Reassemble multi-frame (ISO-TP) messages
//! - Validate checksums or CRCs
//! - Serve snapshots over HTTP (that is left to the application layer)
//!
//! # Example Usage
//!
//! ```no_run
//! use can_telemetry::{
//!     load_signal_map, CancellationToken, CandumpSource, FrameIngestionLoop, TelemetryStore,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let table = Arc::new(load_signal_map(Path::new("canmap.csv")).unwrap());
//! let store = Arc::new(TelemetryStore::default());
//!
//! let cancel = CancellationToken::new();
//! let ingest = FrameIngestionLoop::new(table, Arc::clone(&store));
//! let handle = ingest.spawn(CandumpSource::stdin(), cancel.clone()).unwrap();
//!
//! // Any thread may poll while ingestion runs
//! let snapshot = store.snapshot();
//! for signal in &snapshot.signals {
//!     println!("{}.{} = {} {}", signal.frame_name, signal.name, signal.value, signal.unit);
//! }
//!
//! cancel.cancel();
//! let _summary = handle.join();
//! ```

// Public modules
pub mod bitfield;
pub mod config;
pub mod ingest;
pub mod schema;
pub mod source;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::{IngestConfig, DEFAULT_RAW_CAPACITY};
pub use ingest::{CancellationToken, FrameIngestionLoop, IngestState, IngestSummary};
pub use schema::{
    compile, compile_str, load_signal_map, Endianness, FrameDefinition, FrameTable,
    SignalDefinition, ValueType,
};
pub use source::{CandumpSource, ChannelSource, FrameSource};
pub use store::{RawFrameRecord, SignalValue, Snapshot, TelemetryStore};
pub use types::{CanFrame, Result, SchemaError, SourceError, TelemetryError, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
