//! Snapshot rendering
//!
//! Turns a store snapshot into the JSON state document or a plain text table.

use anyhow::Result;
use can_telemetry::{RawFrameRecord, SignalValue, Snapshot, Timestamp};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fmt::Write;

/// JSON body: `{ts, source, signals, raw}`
#[derive(Debug, Serialize)]
pub struct StateDocument<'a> {
    pub ts: Timestamp,
    pub source: &'a str,
    pub signals: &'a [SignalValue],
    pub raw: Vec<&'a RawFrameRecord>,
}

impl<'a> StateDocument<'a> {
    pub fn new(snapshot: &'a Snapshot, source: &'a str, raw_latest_first: bool) -> Self {
        Self {
            ts: Utc::now(),
            source,
            signals: &snapshot.signals,
            raw: raw_in_display_order(snapshot, raw_latest_first),
        }
    }
}

/// Raw frames as the consumer wants them; the store always keeps oldest first
pub fn raw_in_display_order(snapshot: &Snapshot, latest_first: bool) -> Vec<&RawFrameRecord> {
    if latest_first {
        snapshot.raw_frames.iter().rev().collect()
    } else {
        snapshot.raw_frames.iter().collect()
    }
}

pub fn render_json(snapshot: &Snapshot, source: &str, raw_latest_first: bool) -> Result<String> {
    let document = StateDocument::new(snapshot, source, raw_latest_first);
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn render_txt(snapshot: &Snapshot, source: &str, raw_latest_first: bool) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Source: {}", source);
    let _ = writeln!(out, "\nSignals ({})", snapshot.signals.len());
    let _ = writeln!(
        out,
        "{:<16} {:<10} {:<20} {:>14} {:<8} {:<4} {:<24} {}",
        "FRAME", "ID", "SIGNAL", "VALUE", "UNIT", "DIR", "UPDATED", "COMMENT"
    );
    for s in &snapshot.signals {
        let _ = writeln!(
            out,
            "{:<16} {:<10} {:<20} {:>14.3} {:<8} {:<4} {:<24} {}",
            s.frame_name,
            s.frame_id,
            s.name,
            s.value,
            s.unit,
            s.direction,
            s.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            s.comment
        );
    }

    let raw = raw_in_display_order(snapshot, raw_latest_first);
    let _ = writeln!(out, "\nRaw frames ({})", raw.len());
    let _ = writeln!(out, "{:<24} {:<10} {:>3} {:<16} {}", "TS", "ID", "DLC", "DATA", "ASCII");
    for r in raw {
        let _ = writeln!(
            out,
            "{:<24} {:<10} {:>3} {:<16} {}",
            r.ts.to_rfc3339_opts(SecondsFormat::Millis, true),
            r.id,
            r.dlc,
            r.data_hex,
            r.data_ascii
        );
    }

    out
}
