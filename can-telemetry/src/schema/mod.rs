//! Signal map definitions and compiler
//!
//! This module contains the CSV signal map compiler and the compiled,
//! frame-indexed table it produces.

pub mod csv_map;
pub mod database;

// Re-export key types for convenience
pub use csv_map::{compile, compile_str, load_signal_map, REQUIRED_COLUMNS};
pub use database::{
    Endianness, FrameDefinition, FrameTable, SignalDefinition, TableStats, ValueType,
};
