//! candump log source
//!
//! Reads frames in the `candump -L` text format, one per line:
//!
//! ```text
//! (1436509052.249713) vcan0 044#2A366C2BBA
//! (1436509053.050284) vcan0 17F#C7
//! (1436509053.250417) vcan0 18FF50E5#R
//! ```
//!
//! Only classic CAN frames are accepted; CAN-FD (`##`) lines are rejected.

use crate::source::FrameSource;
use crate::types::{CanFrame, SourceError, MAX_PAYLOAD_LEN};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

/// Frame source reading candump text from a file or any buffered reader
pub struct CandumpSource {
    name: String,
    path: Option<PathBuf>,
    reader: Option<Box<dyn BufRead + Send>>,
    line_no: u64,
    buf: String,
}

impl CandumpSource {
    /// Replay a candump log file (opened on `connect`)
    pub fn open_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path: Some(path),
            reader: None,
            line_no: 0,
            buf: String::new(),
        }
    }

    /// Read a live `candump -L` stream from standard input
    pub fn stdin() -> Self {
        Self::from_reader("stdin", BufReader::new(io::stdin()))
    }

    /// Read candump text from an already open reader
    pub fn from_reader(name: impl Into<String>, reader: impl BufRead + Send + 'static) -> Self {
        Self {
            name: name.into(),
            path: None,
            reader: Some(Box::new(reader)),
            line_no: 0,
            buf: String::new(),
        }
    }
}

impl FrameSource for CandumpSource {
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        if self.reader.is_some() {
            return Ok(());
        }

        let path = self.path.as_ref().ok_or_else(|| {
            SourceError::Io(io::Error::new(io::ErrorKind::NotFound, "no candump input"))
        })?;
        let file = File::open(path)?;
        self.reader = Some(Box::new(BufReader::new(file)));

        log::debug!("Opened candump log {:?}", path);
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<CanFrame>, SourceError> {
        let reader = self.reader.as_mut().ok_or_else(|| {
            SourceError::Io(io::Error::new(io::ErrorKind::NotConnected, "source not connected"))
        })?;

        loop {
            self.buf.clear();
            if reader.read_line(&mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }

            return parse_candump_line(line)
                .map(Some)
                .map_err(|reason| SourceError::Malformed {
                    line: self.line_no,
                    reason,
                });
        }
    }
}

/// Parse one candump line into a frame
///
/// The `(timestamp)` and interface columns are optional; the frame is the
/// last `ID#DATA` token on the line.
pub fn parse_candump_line(line: &str) -> Result<CanFrame, String> {
    let token = line
        .split_whitespace()
        .last()
        .ok_or_else(|| "empty line".to_string())?;

    let (id_str, data_str) = token
        .split_once('#')
        .ok_or_else(|| format!("missing '#' in '{}'", token))?;

    if data_str.starts_with('#') {
        return Err(format!("CAN-FD frame '{}' is not supported", token));
    }

    if id_str.is_empty() || !id_str.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("bad CAN ID '{}'", id_str));
    }
    let can_id = u32::from_str_radix(id_str, 16).map_err(|e| format!("bad CAN ID '{}': {}", id_str, e))?;
    let is_extended = id_str.len() > 3;

    // Remote frames carry no payload
    let data = if data_str.starts_with(['R', 'r']) {
        Vec::new()
    } else {
        decode_hex(data_str)?
    };

    if data.len() > MAX_PAYLOAD_LEN {
        return Err(format!("{} data bytes in '{}' (max {})", data.len(), token, MAX_PAYLOAD_LEN));
    }

    CanFrame::new(can_id, &data)
        .map(|frame| frame.with_extended(is_extended))
        .map_err(|e| e.to_string())
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, String> {
    if hex.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{}'", hex));
    }
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("bad hex data '{}'", hex));
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or_else(|| format!("bad hex data '{}'", hex))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    #[test]
    fn test_parse_candump_line() {
        let frame = parse_candump_line("(1436509053.850870) vcan0 1A0#9C20407F96EA167B").unwrap();
        assert_eq!(frame.can_id, 0x1A0);
        assert!(!frame.is_extended);
        assert_eq!(frame.data(), &[0x9C, 0x20, 0x40, 0x7F, 0x96, 0xEA, 0x16, 0x7B]);
    }

    #[test]
    fn test_parse_short_and_bare_lines() {
        let frame = parse_candump_line("(1436509053.050284) vcan0 17F#C7").unwrap();
        assert_eq!(frame.dlc(), 1);

        let frame = parse_candump_line("300#1027").unwrap();
        assert_eq!(frame.can_id, 0x300);
        assert_eq!(frame.data(), &[0x10, 0x27]);

        let empty = parse_candump_line("can0 123#").unwrap();
        assert_eq!(empty.dlc(), 0);
    }

    #[test]
    fn test_parse_extended_and_remote() {
        let frame = parse_candump_line("(0.0) can1 00000123#R").unwrap();
        assert_eq!(frame.can_id, 0x123);
        assert!(frame.is_extended);
        assert_eq!(frame.dlc(), 0);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_candump_line("(0.0) vcan0 1A0").is_err());
        assert!(parse_candump_line("(0.0) vcan0 XYZ#00").is_err());
        assert!(parse_candump_line("(0.0) vcan0 1A0#ABC").is_err());
        assert!(parse_candump_line("(0.0) vcan0 1A0#GG").is_err());
        assert!(parse_candump_line("(0.0) vcan0 1A0#000102030405060708").is_err());
        assert!(parse_candump_line("(0.0) vcan0 1A0##1AABB").is_err());
        assert!(parse_candump_line("(0.0) vcan0 #00").is_err());
    }

    #[test]
    fn test_parse_rejects_signs() {
        assert!(parse_candump_line("(0.0) vcan0 +1A#00").is_err());
        assert!(parse_candump_line("(0.0) vcan0 1A0#+1").is_err());
        assert!(parse_candump_line("(0.0) vcan0 1A0#00-1").is_err());
    }

    #[test]
    fn test_reader_source_streams_frames() {
        let text = "(0.1) vcan0 100#01\n\n(0.2) vcan0 200#0203\n";
        let mut source = CandumpSource::from_reader("memory", Cursor::new(text));
        source.connect().unwrap();

        assert_eq!(source.receive().unwrap().unwrap().can_id, 0x100);
        assert_eq!(source.receive().unwrap().unwrap().can_id, 0x200);
        assert!(source.receive().unwrap().is_none());
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let text = "(0.1) vcan0 100#01\n(0.2) vcan0 garbage\n";
        let mut source = CandumpSource::from_reader("memory", Cursor::new(text));
        source.connect().unwrap();

        source.receive().unwrap();
        match source.receive() {
            Err(SourceError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected Malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "(1436509052.249713) vcan0 044#2A366C2BBA").unwrap();

        let mut source = CandumpSource::open_path(file.path());
        assert!(matches!(source.receive(), Err(SourceError::Io(_))));

        source.connect().unwrap();
        let frame = source.receive().unwrap().unwrap();
        assert_eq!(frame.can_id, 0x044);
        assert_eq!(frame.dlc(), 5);
        assert!(source.receive().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_fails_to_connect() {
        let mut source = CandumpSource::open_path("/nonexistent/trace.log");
        assert!(matches!(source.connect(), Err(SourceError::Io(_))));
    }
}
