//! Frame ingestion loop
//!
//! Pulls frames from a [`FrameSource`], records every frame raw, decodes the
//! frames the signal map knows about, and commits the results to the
//! [`TelemetryStore`]. The loop is the store's only writer.
//!
//! State machine: `Connecting` → `Streaming` → `Stopped`. A source that cannot
//! be acquired goes straight to `Stopped` with a connection error; a source
//! that fails mid-stream stops the loop and the error is handed back to the
//! caller. Neither is retried here.

use crate::bitfield;
use crate::config::IngestConfig;
use crate::schema::FrameTable;
use crate::source::FrameSource;
use crate::store::{RawFrameRecord, SignalValue, TelemetryStore};
use crate::types::{format_frame_id, CanFrame, Result, TelemetryError};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Cooperative stop signal shared between the loop and whoever controls it
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop to stop before it waits for the next frame
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Lifecycle of an ingestion run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Connecting,
    Streaming,
    Stopped,
}

/// Counters for one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Every frame received, mapped or not
    pub frames_received: u64,
    /// Frames found in the signal map and decoded
    pub frames_decoded: u64,
    /// Frames recorded raw only
    pub frames_unmapped: u64,
    /// Individual signal values written to the store
    pub signals_updated: u64,
}

/// The ingestion loop - single writer of a telemetry store
pub struct FrameIngestionLoop {
    table: Arc<FrameTable>,
    store: Arc<TelemetryStore>,
    config: IngestConfig,
    state: IngestState,
    summary: IngestSummary,
}

impl FrameIngestionLoop {
    /// Create a loop decoding against `table` and writing into `store`
    pub fn new(table: Arc<FrameTable>, store: Arc<TelemetryStore>) -> Self {
        Self {
            table,
            store,
            config: IngestConfig::default(),
            state: IngestState::Stopped,
            summary: IngestSummary::default(),
        }
    }

    /// Builder method: set ingestion configuration
    pub fn with_config(mut self, config: IngestConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    pub fn summary(&self) -> IngestSummary {
        self.summary
    }

    /// Run until end of stream, cancellation, frame limit or source failure
    ///
    /// # Returns
    /// * `Ok(IngestSummary)` on a clean stop
    /// * `Err(TelemetryError::SourceConnection)` if the source cannot be acquired
    /// * `Err(TelemetryError::SourceStream)` if the source fails mid-stream
    pub fn run<S>(&mut self, source: &mut S, cancel: &CancellationToken) -> Result<IngestSummary>
    where
        S: FrameSource + ?Sized,
    {
        let source_name = source.describe();
        self.transition(IngestState::Connecting, &source_name);

        if let Err(error) = source.connect() {
            self.transition(IngestState::Stopped, &source_name);
            return Err(TelemetryError::SourceConnection { source_name, error });
        }

        self.transition(IngestState::Streaming, &source_name);

        loop {
            if cancel.is_cancelled() {
                log::info!("Ingestion from {} cancelled", source_name);
                break;
            }

            if self.config.frame_limit_reached(self.summary.frames_received) {
                log::info!(
                    "Frame limit of {} reached on {}",
                    self.summary.frames_received,
                    source_name
                );
                break;
            }

            match source.receive() {
                Ok(Some(frame)) => self.process_frame(&frame),
                Ok(None) => {
                    log::info!("End of stream on {}", source_name);
                    break;
                }
                Err(error) => {
                    self.transition(IngestState::Stopped, &source_name);
                    return Err(TelemetryError::SourceStream { source_name, error });
                }
            }
        }

        self.transition(IngestState::Stopped, &source_name);
        log::info!(
            "Ingestion summary: {} frames ({} decoded, {} unmapped), {} signal updates",
            self.summary.frames_received,
            self.summary.frames_decoded,
            self.summary.frames_unmapped,
            self.summary.signals_updated
        );
        Ok(self.summary)
    }

    /// Run on a dedicated, named thread
    pub fn spawn<S>(mut self, mut source: S, cancel: CancellationToken) -> Result<JoinHandle<Result<IngestSummary>>>
    where
        S: FrameSource + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("can-ingest".to_string())
            .spawn(move || self.run(&mut source, &cancel))?;
        Ok(handle)
    }

    /// Record one frame raw and, if mapped, decode and store its signals
    pub fn process_frame(&mut self, frame: &CanFrame) {
        self.store.push_raw(RawFrameRecord::from_frame(frame, Utc::now()));
        self.summary.frames_received += 1;

        let Some(frame_def) = self.table.get(frame.can_id) else {
            log::trace!("Unmapped CAN ID 0x{:X}, recorded raw only", frame.can_id);
            self.summary.frames_unmapped += 1;
            return;
        };

        log::debug!("Decoding frame: {} (ID 0x{:X})", frame_def.name, frame.can_id);

        let payload = frame.payload();
        let frame_id = format_frame_id(frame.can_id);

        for signal in &frame_def.signals {
            let value = bitfield::decode(&payload, signal);
            self.store.upsert_signal(SignalValue {
                name: signal.name.clone(),
                value,
                unit: signal.unit.clone(),
                frame_id: frame_id.clone(),
                frame_name: frame_def.name.clone(),
                updated_at: Utc::now(),
                direction: signal.direction.clone(),
                comment: signal.comment.clone(),
            });
            self.summary.signals_updated += 1;
        }

        self.summary.frames_decoded += 1;
    }

    fn transition(&mut self, next: IngestState, source_name: &str) {
        if self.state != next {
            log::info!("Ingestion {:?} -> {:?} ({})", self.state, next, source_name);
            self.state = next;
        }
    }
}
