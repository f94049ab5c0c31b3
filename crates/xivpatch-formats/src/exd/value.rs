//! Patch value decoding
//!
//! Patch tables carry every value as text. Strings may embed raw byte runs as
//! `<hex:0A1B>`; numerics are decimal and are written big-endian.

use crate::exh::ColumnKind;

const HEX_OPEN: &str = "<hex:";

/// Encode a patch string as sheet bytes
///
/// `<hex:...>` runs become raw bytes (an odd digit count is left-padded with
/// `0`); a run that is not valid hex is kept as literal text.
pub fn encode_game_string(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find(HEX_OPEN) {
        out.extend_from_slice(rest[..start].as_bytes());
        let tail = &rest[start..];
        let Some(close) = tail.find('>') else {
            out.extend_from_slice(tail.as_bytes());
            return out;
        };

        let digits = &tail[HEX_OPEN.len()..close];
        let decoded = if digits.len() % 2 == 1 {
            hex::decode(format!("0{digits}"))
        } else {
            hex::decode(digits)
        };
        match decoded {
            Ok(bytes) => out.extend_from_slice(&bytes),
            Err(_) => out.extend_from_slice(tail[..=close].as_bytes()),
        }
        rest = &tail[close + 1..];
    }

    out.extend_from_slice(rest.as_bytes());
    out
}

/// Parsed numeric patch value
#[derive(Debug, Clone, Copy, PartialEq)]
enum Number {
    Integer(i128),
    Decimal(f64),
}

impl Number {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(value) = text.parse::<i128>() {
            return Some(Self::Integer(value));
        }
        let value = text.parse::<f64>().ok()?;
        value.is_finite().then_some(Self::Decimal(value))
    }

    /// Integer value, decimals truncated toward zero
    fn integer(self) -> i128 {
        match self {
            Self::Integer(value) => value,
            Self::Decimal(value) => value.trunc() as i128,
        }
    }

    fn float(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Decimal(value) => value,
        }
    }
}

/// Write `text` into `field` as a value of `kind`
///
/// `field` starts at the column's offset. Returns `false`, leaving `field`
/// untouched, when the text does not parse or the field is too short.
/// String columns are never written here.
pub fn write_numeric(kind: ColumnKind, text: &str, field: &mut [u8]) -> bool {
    if kind == ColumnKind::String || field.len() < kind.width() {
        return false;
    }

    if let ColumnKind::PackedBool(bit) = kind {
        let Some(set) = parse_flag(text) else {
            return false;
        };
        if set {
            field[0] |= 1 << bit;
        } else {
            field[0] &= !(1 << bit);
        }
        return true;
    }

    let Some(number) = Number::parse(text) else {
        return false;
    };
    let value = number.integer();
    match kind {
        ColumnKind::Bool | ColumnKind::Int8 | ColumnKind::UInt8 => field[0] = value as u8,
        ColumnKind::Int16 | ColumnKind::UInt16 => {
            field[..2].copy_from_slice(&(value as u16).to_be_bytes());
        }
        ColumnKind::Int32 | ColumnKind::UInt32 => {
            field[..4].copy_from_slice(&(value as u32).to_be_bytes());
        }
        ColumnKind::Int64 | ColumnKind::UInt64 => {
            field[..8].copy_from_slice(&(value as u64).to_be_bytes());
        }
        ColumnKind::Float32 => {
            field[..4].copy_from_slice(&(number.float() as f32).to_be_bytes());
        }
        ColumnKind::Float64 => field[..8].copy_from_slice(&number.float().to_be_bytes()),
        ColumnKind::String | ColumnKind::PackedBool(_) => return false,
    }
    true
}

fn parse_flag(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        return Some(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Some(false);
    }
    Number::parse(text).map(|n| n.integer() != 0)
}
