//! CSV signal map compiler
//!
//! Parses a comma-separated signal map (one row per signal) and compiles it
//! into a [`FrameTable`]. Compilation is all-or-nothing: a missing column or
//! a single bad row aborts the whole compile.

use crate::bitfield;
use crate::schema::database::{Endianness, FrameDefinition, FrameTable, SignalDefinition, ValueType};
use crate::types::{SchemaError, MAX_PAYLOAD_LEN};
use csv::StringRecord;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Columns every signal map must declare in its header row
pub const REQUIRED_COLUMNS: [&str; 13] = [
    "direction",
    "frame_id",
    "frame_name",
    "dlc",
    "signal_name",
    "start_bit",
    "bit_length",
    "endianness",
    "signed",
    "factor",
    "offset",
    "unit",
    "comment",
];

/// Load and compile a signal map file
pub fn load_signal_map(path: &Path) -> Result<FrameTable, SchemaError> {
    log::info!("Loading signal map: {:?}", path);

    let file = File::open(path)?;
    let table = compile(file)?;

    let stats = table.stats();
    log::info!(
        "Signal map loaded: {} frames, {} signals from {:?}",
        stats.num_frames,
        stats.num_signals,
        path
    );
    Ok(table)
}

/// Compile signal map text already held in memory
pub fn compile_str(text: &str) -> Result<FrameTable, SchemaError> {
    compile(text.as_bytes())
}

/// Compile a signal map from any reader
pub fn compile<R: Read>(reader: R) -> Result<FrameTable, SchemaError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let columns = column_index(csv_reader.headers()?)?;

    let mut frames: HashMap<u32, FrameDefinition> = HashMap::new();
    let mut num_rows = 0usize;

    for record in csv_reader.records() {
        let record = record?;
        let row = RowReader {
            record: &record,
            columns: &columns,
            line: record.position().map(|p| p.line()).unwrap_or(0),
        };

        let (signal, dlc) = row.parse_signal()?;
        num_rows += 1;

        match frames.entry(signal.frame_id) {
            Entry::Vacant(entry) => {
                entry.insert(FrameDefinition {
                    id: signal.frame_id,
                    name: signal.frame_name.clone(),
                    dlc,
                    signals: vec![signal],
                });
            }
            Entry::Occupied(mut entry) => entry.get_mut().signals.push(signal),
        }
    }

    if num_rows == 0 {
        return Err(SchemaError::Empty);
    }

    for frame in frames.values_mut() {
        frame.signals.sort_by_key(|s| s.start_bit);
        warn_signals_past_dlc(frame);
    }

    Ok(FrameTable::from_frames(frames))
}

/// Map header names to column positions, requiring every known column once
fn column_index(headers: &StringRecord) -> Result<HashMap<String, usize>, SchemaError> {
    let mut columns = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        match columns.entry(name.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(idx);
            }
            Entry::Occupied(_) if REQUIRED_COLUMNS.contains(&name) => {
                return Err(SchemaError::DuplicateColumn(name.to_string()));
            }
            Entry::Occupied(_) => {}
        }
    }

    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !columns.contains_key(**c)) {
        return Err(SchemaError::MissingColumn(missing.to_string()));
    }

    Ok(columns)
}

fn warn_signals_past_dlc(frame: &FrameDefinition) {
    let Some(dlc) = frame.dlc else {
        return;
    };

    for signal in &frame.signals {
        let needed = bitfield::byte_span(signal.start_bit, signal.bit_length, signal.endianness);
        if needed > dlc as usize {
            log::warn!(
                "Signal '{}' in frame '{}' (0x{:X}) needs {} bytes but DLC is {}",
                signal.name,
                frame.name,
                frame.id,
                needed,
                dlc
            );
        }
    }
}

/// One data row of the signal map
struct RowReader<'a> {
    record: &'a StringRecord,
    columns: &'a HashMap<String, usize>,
    line: u64,
}

impl<'a> RowReader<'a> {
    /// Cell for a column; short rows read as empty
    fn get(&self, column: &str) -> &'a str {
        self.columns
            .get(column)
            .and_then(|&idx| self.record.get(idx))
            .unwrap_or("")
    }

    fn invalid(&self, field: &str, reason: impl Into<String>) -> SchemaError {
        SchemaError::InvalidRow {
            row: self.line,
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    fn parse_signal(&self) -> Result<(SignalDefinition, Option<u8>), SchemaError> {
        let frame_id = parse_hex_id(self.get("frame_id")).map_err(|e| self.invalid("frame_id", e))?;

        let start_bit = self.parse_u8("start_bit")?;
        let bit_length = self.parse_u8("bit_length")?;

        let endianness = self
            .get("endianness")
            .parse::<Endianness>()
            .map_err(|e: String| self.invalid("endianness", e))?;

        let value_type = if self.get("signed").eq_ignore_ascii_case("true") {
            ValueType::Signed
        } else {
            ValueType::Unsigned
        };

        let factor = self
            .get("factor")
            .parse::<f64>()
            .map_err(|e| self.invalid("factor", format!("{}", e)))?;
        let offset = self
            .get("offset")
            .parse::<f64>()
            .map_err(|e| self.invalid("offset", format!("{}", e)))?;

        let dlc = self.parse_dlc()?;
        self.check_geometry(start_bit, bit_length, endianness)?;

        let signal = SignalDefinition {
            frame_id,
            frame_name: self.get("frame_name").to_string(),
            name: self.get("signal_name").to_string(),
            start_bit,
            bit_length,
            endianness,
            value_type,
            factor,
            offset,
            unit: self.get("unit").to_string(),
            direction: self.get("direction").to_lowercase(),
            comment: self.get("comment").to_string(),
        };

        Ok((signal, dlc))
    }

    fn parse_dlc(&self) -> Result<Option<u8>, SchemaError> {
        let raw = self.get("dlc");
        if raw.is_empty() {
            return Ok(None);
        }

        let dlc = self.parse_u8("dlc")?;
        if dlc as usize > MAX_PAYLOAD_LEN {
            return Err(self.invalid("dlc", format!("{} exceeds {} bytes", dlc, MAX_PAYLOAD_LEN)));
        }
        Ok(Some(dlc))
    }

    /// Plain decimal digits only; `str::parse` would also take a leading '+'
    fn parse_u8(&self, field: &str) -> Result<u8, SchemaError> {
        let raw = self.get(field);
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.invalid(field, format!("'{}' is not an unsigned decimal", raw)));
        }
        raw.parse::<u8>().map_err(|e| self.invalid(field, format!("'{}': {}", raw, e)))
    }

    fn check_geometry(&self, start_bit: u8, bit_length: u8, endianness: Endianness) -> Result<(), SchemaError> {
        if start_bit > 63 {
            return Err(self.invalid("start_bit", format!("{} is outside 0..=63", start_bit)));
        }
        if bit_length == 0 || bit_length > 64 {
            return Err(self.invalid("bit_length", format!("{} is outside 1..=64", bit_length)));
        }
        if !bitfield::fits_payload(start_bit, bit_length, endianness) {
            return Err(self.invalid(
                "bit_length",
                format!(
                    "{}-bit {}-endian field at start bit {} does not fit in {} bytes",
                    bit_length, endianness, start_bit, MAX_PAYLOAD_LEN
                ),
            ));
        }
        Ok(())
    }
}

/// Parse a hexadecimal frame ID with optional `0x` prefix
pub fn parse_hex_id(s: &str) -> Result<u32, String> {
    let lower = s.trim().to_lowercase();
    let digits = lower.strip_prefix("0x").unwrap_or(&lower);
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("'{}' is not a hexadecimal ID", s));
    }
    u32::from_str_radix(digits, 16).map_err(|e| format!("'{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str =
        "direction,frame_id,frame_name,dlc,signal_name,start_bit,bit_length,endianness,signed,factor,offset,unit,comment";

    fn map(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    #[test]
    fn test_compile_single_signal() {
        let text = map(&["RX,0x300,Battery,8,PackVoltage,0,16,little,false,0.1,0,V,Pack voltage"]);
        let table = compile_str(&text).unwrap();

        let frame = table.get(0x300).unwrap();
        assert_eq!(frame.name, "Battery");
        assert_eq!(frame.dlc, Some(8));
        assert_eq!(frame.signals.len(), 1);

        let signal = &frame.signals[0];
        assert_eq!(signal.name, "PackVoltage");
        assert_eq!(signal.start_bit, 0);
        assert_eq!(signal.bit_length, 16);
        assert_eq!(signal.endianness, Endianness::Little);
        assert_eq!(signal.value_type, ValueType::Unsigned);
        assert_eq!(signal.factor, 0.1);
        assert_eq!(signal.unit, "V");
        assert_eq!(signal.direction, "rx");
        assert_eq!(signal.comment, "Pack voltage");

        let value = bitfield::decode(&[0x10, 0x27, 0, 0, 0, 0, 0, 0], signal);
        assert!((value - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_rows_accumulate_and_sort_by_start_bit() {
        let text = map(&[
            "rx,1A3,Motor,8,Current,16,16,little,true,0.01,0,A,",
            "rx,0x1a3,MotorRenamed,8,Speed,0,16,little,false,1,0,rpm,",
            "tx,0x200,Other,2,Flag,0,1,little,false,1,0,,",
            "rx,0X1A3,Motor,8,Temp,32,8,big,TRUE,1,-40,degC,",
        ]);
        let table = compile_str(&text).unwrap();

        assert_eq!(table.len(), 2);
        let motor = table.get(0x1A3).unwrap();
        assert_eq!(motor.name, "Motor");
        let names: Vec<&str> = motor.signals.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Speed", "Current", "Temp"]);
        assert_eq!(motor.signals[2].value_type, ValueType::Signed);
        assert_eq!(motor.signals[2].endianness, Endianness::Big);

        let stats = table.stats();
        assert_eq!(stats.num_frames, 2);
        assert_eq!(stats.num_signals, 4);
    }

    #[test]
    fn test_frame_id_zero_is_a_real_frame() {
        let text = map(&[
            "rx,0x0,Zero,8,A,0,8,little,false,1,0,,",
            "rx,0x0,Ignored,8,B,8,8,little,false,1,0,,",
        ]);
        let table = compile_str(&text).unwrap();

        let frame = table.get(0).unwrap();
        assert_eq!(frame.name, "Zero");
        assert_eq!(frame.signals.len(), 2);
    }

    #[test]
    fn test_missing_column_fails() {
        let text = "direction,frame_id,frame_name,dlc,signal_name,start_bit,bit_length,endianness,signed,factor,offset,unit\n\
                    rx,0x300,Battery,8,PackVoltage,0,16,little,false,0.1,0,V";
        match compile_str(text) {
            Err(SchemaError::MissingColumn(column)) => assert_eq!(column, "comment"),
            other => panic!("expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_row_aborts_compile() {
        let text = map(&[
            "rx,0x300,Battery,8,PackVoltage,0,16,little,false,0.1,0,V,",
            "rx,0x301,Battery2,8,PackCurrent,0,16,little,false,abc,0,A,",
        ]);
        match compile_str(&text) {
            Err(SchemaError::InvalidRow { row, field, .. }) => {
                assert_eq!(row, 3);
                assert_eq!(field, "factor");
            }
            other => panic!("expected InvalidRow, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_offset_is_an_error() {
        let text = map(&["rx,0x300,Battery,8,PackVoltage,0,16,little,false,0.1,,V,"]);
        assert!(matches!(
            compile_str(&text),
            Err(SchemaError::InvalidRow { ref field, .. }) if field == "offset"
        ));
    }

    #[test]
    fn test_unknown_endianness_is_rejected() {
        let text = map(&["rx,0x300,Battery,8,PackVoltage,0,16,motorola,false,1,0,V,"]);
        assert!(matches!(
            compile_str(&text),
            Err(SchemaError::InvalidRow { ref field, .. }) if field == "endianness"
        ));
    }

    #[test]
    fn test_field_outside_payload_is_rejected() {
        let little = map(&["rx,0x300,F,8,S,60,8,little,false,1,0,,"]);
        assert!(matches!(
            compile_str(&little),
            Err(SchemaError::InvalidRow { ref field, .. }) if field == "bit_length"
        ));

        let big = map(&["rx,0x300,F,8,S,56,8,big,false,1,0,,"]);
        assert!(matches!(
            compile_str(&big),
            Err(SchemaError::InvalidRow { ref field, .. }) if field == "bit_length"
        ));

        let zero = map(&["rx,0x300,F,8,S,0,0,little,false,1,0,,"]);
        assert!(compile_str(&zero).is_err());

        let wide = map(&["rx,0x300,F,8,S,300,8,little,false,1,0,,"]);
        assert!(matches!(
            compile_str(&wide),
            Err(SchemaError::InvalidRow { ref field, .. }) if field == "start_bit"
        ));
    }

    #[test]
    fn test_bad_frame_id_and_dlc() {
        let id = map(&["rx,0xZZ,F,8,S,0,8,little,false,1,0,,"]);
        assert!(matches!(
            compile_str(&id),
            Err(SchemaError::InvalidRow { ref field, .. }) if field == "frame_id"
        ));

        let dlc = map(&["rx,0x10,F,9,S,0,8,little,false,1,0,,"]);
        assert!(matches!(
            compile_str(&dlc),
            Err(SchemaError::InvalidRow { ref field, .. }) if field == "dlc"
        ));
    }

    #[test]
    fn test_signed_numbers_are_rejected() {
        for (row, field) in [
            ("rx,+1A3,F,8,S,0,8,little,false,1,0,,", "frame_id"),
            ("rx,0x-1,F,8,S,0,8,little,false,1,0,,", "frame_id"),
            ("rx,0x1A3,F,8,S,+0,8,little,false,1,0,,", "start_bit"),
            ("rx,0x1A3,F,8,S,0,+8,little,false,1,0,,", "bit_length"),
            ("rx,0x1A3,F,+8,S,0,8,little,false,1,0,,", "dlc"),
        ] {
            match compile_str(&map(&[row])) {
                Err(SchemaError::InvalidRow { field: got, .. }) => assert_eq!(got, field, "row {}", row),
                other => panic!("expected InvalidRow for {}, got {:?}", row, other),
            }
        }
    }

    #[test]
    fn test_duplicate_required_column_is_rejected() {
        let text = format!("{},signal_name\nrx,0x300,F,8,A,0,8,little,false,1,0,,,B", HEADER);
        match compile_str(&text) {
            Err(SchemaError::DuplicateColumn(column)) => assert_eq!(column, "signal_name"),
            other => panic!("expected DuplicateColumn, got {:?}", other),
        }

        // Extra columns outside the map contract may repeat
        let extra = format!("{},note,note\nrx,0x300,F,8,A,0,8,little,false,1,0,,,x,y", HEADER);
        assert!(compile_str(&extra).is_ok());
    }

    #[test]
    fn test_header_only_is_empty() {
        assert!(matches!(compile_str(HEADER), Err(SchemaError::Empty)));
    }

    #[test]
    fn test_whitespace_quotes_and_column_order() {
        let text = "frame_id, frame_name, signal_name, start_bit, bit_length, endianness, signed, factor, offset, unit, comment, direction, dlc\n\
                    0x10 , Body , Door , 3 , 1 , little , false , 1 , 0 , ,\"open, or closed\", TX ,";
        let table = compile_str(text).unwrap();

        let frame = table.get(0x10).unwrap();
        assert_eq!(frame.dlc, None);
        let door = &frame.signals[0];
        assert_eq!(door.name, "Door");
        assert_eq!(door.start_bit, 3);
        assert_eq!(door.direction, "tx");
        assert_eq!(door.comment, "open, or closed");
    }

    #[test]
    fn test_load_signal_map_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", map(&["rx,0x7E8,Diag,8,Rpm,7,16,big,false,0.25,0,rpm,"])).unwrap();

        let table = load_signal_map(file.path()).unwrap();
        assert_eq!(table.frame_ids(), vec![0x7E8]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_signal_map(Path::new("/nonexistent/canmap.csv"));
        assert!(matches!(result, Err(SchemaError::Io(_))));
    }

    #[test]
    fn test_parse_hex_id() {
        assert_eq!(parse_hex_id("0x1A3"), Ok(0x1A3));
        assert_eq!(parse_hex_id("1a3"), Ok(0x1A3));
        assert_eq!(parse_hex_id("0X18FF50E5"), Ok(0x18FF50E5));
        assert!(parse_hex_id("").is_err());
        assert!(parse_hex_id("0x1FFFFFFFF").is_err());
        assert!(parse_hex_id("+1A3").is_err());
        assert!(parse_hex_id("0x+1A3").is_err());
    }
}
