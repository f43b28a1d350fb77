//! Bit-field decoding engine
//!
//! Extracts signal values from an 8-byte CAN payload based on signal
//! definitions from the signal map. Handles bit extraction, both byte orders,
//! sign extension and physical value conversion.
//!
//! Bit numbering is shared by both byte orders: bit `n` lives in byte `n / 8`
//! at position `n % 8`, where position 0 is the least significant bit.
//!
//! - Little-endian (Intel): `start_bit` is the LSB of the field and the field
//!   grows towards higher bit numbers across bytes.
//! - Big-endian (Motorola): `start_bit` is the MSB of the field. The field
//!   walks down to bit 0 of that byte, then continues at bit 7 of the next
//!   byte.

use crate::schema::{Endianness, SignalDefinition, ValueType};
use crate::types::MAX_PAYLOAD_LEN;
use byteorder::{BigEndian, ByteOrder, LittleEndian};

/// Integer extracted from a payload, before scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValue {
    Unsigned(u64),
    Signed(i64),
}

impl RawValue {
    /// Convert raw value to f64 for scaling
    pub fn as_f64(&self) -> f64 {
        match self {
            RawValue::Unsigned(v) => *v as f64,
            RawValue::Signed(v) => *v as f64,
        }
    }
}

/// Check whether a field fits inside the 64-bit payload under its byte order
pub fn fits_payload(start_bit: u8, bit_length: u8, endianness: Endianness) -> bool {
    let start = start_bit as u32;
    let length = bit_length as u32;

    if length == 0 || length > 64 || start > 63 {
        return false;
    }

    match endianness {
        Endianness::Little => start + length <= 64,
        Endianness::Big => big_endian_msb(start) + 1 >= length,
    }
}

/// Number of leading payload bytes a field touches
pub fn byte_span(start_bit: u8, bit_length: u8, endianness: Endianness) -> usize {
    let start = start_bit as usize;
    let length = bit_length as usize;

    match endianness {
        Endianness::Little => (start + length + 7) / 8,
        Endianness::Big => {
            let rest = length.saturating_sub(start % 8 + 1);
            start / 8 + 1 + (rest + 7) / 8
        }
    }
}

/// Decode a signal from a payload, returning the physical value
///
/// Computes `raw * factor + offset`. A non-finite result can only come from a
/// pathological factor/offset and is clamped to 0.0.
pub fn decode(payload: &[u8; MAX_PAYLOAD_LEN], signal: &SignalDefinition) -> f64 {
    debug_assert!(
        fits_payload(signal.start_bit, signal.bit_length, signal.endianness),
        "signal '{}' does not fit the payload",
        signal.name
    );

    let raw = extract(payload, signal);
    let physical = raw.as_f64() * signal.factor + signal.offset;

    if physical.is_finite() {
        physical
    } else {
        log::warn!(
            "Signal '{}.{}' decoded to a non-finite value, clamping to 0",
            signal.frame_name,
            signal.name
        );
        0.0
    }
}

/// Extract the raw integer of a signal, honouring byte order and signedness
pub fn extract(payload: &[u8; MAX_PAYLOAD_LEN], signal: &SignalDefinition) -> RawValue {
    let bits = match signal.endianness {
        Endianness::Little => extract_little_endian(payload, signal.start_bit, signal.bit_length),
        Endianness::Big => extract_big_endian(payload, signal.start_bit, signal.bit_length),
    };

    match signal.value_type {
        ValueType::Unsigned => RawValue::Unsigned(bits),
        ValueType::Signed => RawValue::Signed(sign_extend(bits, signal.bit_length)),
    }
}

/// Extract an unsigned field with little-endian (Intel) byte order
pub fn extract_little_endian(payload: &[u8; MAX_PAYLOAD_LEN], start_bit: u8, length: u8) -> u64 {
    let packed = LittleEndian::read_u64(payload);
    packed.checked_shr(start_bit as u32).unwrap_or(0) & field_mask(length)
}

/// Extract an unsigned field with big-endian (Motorola) byte order
///
/// Packing the payload big-endian lines the sawtooth bit order up into one
/// contiguous run, so the field is a single shift once the MSB position is
/// translated.
pub fn extract_big_endian(payload: &[u8; MAX_PAYLOAD_LEN], start_bit: u8, length: u8) -> u64 {
    let packed = BigEndian::read_u64(payload);
    let lsb = (big_endian_msb(start_bit as u32) + 1).wrapping_sub(length as u32);
    packed.checked_shr(lsb).unwrap_or(0) & field_mask(length)
}

/// Sign-extend a two's complement value from N bits to 64 bits
pub fn sign_extend(value: u64, bit_length: u8) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return value as i64;
    }

    let shift = 64 - bit_length as u32;
    ((value << shift) as i64) >> shift
}

/// Position of a Motorola start bit inside the big-endian packed payload
fn big_endian_msb(start_bit: u32) -> u32 {
    7u32.saturating_sub(start_bit / 8) * 8 + start_bit % 8
}

fn field_mask(length: u8) -> u64 {
    if length >= 64 {
        u64::MAX
    } else {
        (1u64 << length) - 1
    }
}
