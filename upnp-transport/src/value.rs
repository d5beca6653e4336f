//! Typed values exchanged with services.
//!
//! Declared UPnP data types (`ui4`, `boolean`, `dateTime`, ...) map onto a smaller
//! set of wire types. Text is converted into a [`WireValue`] according to the
//! declared type before invocation, and rendered back to text for display.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rust_decimal::Decimal;

use crate::error::{Result, TransportError};

/// Wire representation selected by a declared data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Empty,
    String,
    Bool,
    Ui1,
    Ui2,
    Ui4,
    I1,
    I2,
    I4,
    Int,
    R4,
    R8,
    DateTime,
    Bytes,
    Currency,
}

impl WireType {
    /// Map a declared data type; unknown types map to [`WireType::String`].
    ///
    /// Matching is case-insensitive, so `dateTime` and `datetime` are the same type.
    pub fn from_declared(declared: &str) -> Self {
        match declared.trim().to_ascii_lowercase().as_str() {
            "string" | "uri" | "uuid" => Self::String,
            "boolean" => Self::Bool,
            "ui1" => Self::Ui1,
            "ui2" | "char" => Self::Ui2,
            "ui4" => Self::Ui4,
            "i1" => Self::I1,
            "i2" => Self::I2,
            "i4" => Self::I4,
            "int" => Self::Int,
            "r4" | "float" => Self::R4,
            "r8" | "number" => Self::R8,
            "date" | "datetime" | "datetime.tz" | "time" | "time.tz" => Self::DateTime,
            "bin.base64" | "bin.hex" => Self::Bytes,
            "fixed.14.4" => Self::Currency,
            _ => Self::String,
        }
    }

    /// Short type tag shown next to values, e.g. `ui4` or `bin.base64`
    pub fn description(self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::String => "string",
            Self::Bool => "boolean",
            Self::Ui1 => "ui1",
            Self::Ui2 => "ui2",
            Self::Ui4 => "ui4",
            Self::I1 => "i1",
            Self::I2 => "i2",
            Self::I4 => "i4",
            Self::Int => "int",
            Self::R4 => "r4",
            Self::R8 => "r8",
            Self::DateTime => "date",
            Self::Bytes => "bin.base64",
            Self::Currency => "fixed.14.4",
        }
    }
}

/// Map a declared data type to its wire type
pub fn wire_type(declared: &str) -> WireType {
    WireType::from_declared(declared)
}

/// Type tag of a wire type
pub fn type_description(wire: WireType) -> &'static str {
    wire.description()
}

/// Text encoding used for binary values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BinaryEncoding {
    #[default]
    Base64,
    Hex,
}

/// A value in its wire representation
#[derive(Debug, Clone, PartialEq, Default)]
pub enum WireValue {
    #[default]
    Empty,
    String(String),
    Bool(bool),
    Ui1(u8),
    Ui2(u16),
    Ui4(u32),
    I1(i8),
    I2(i16),
    I4(i32),
    Int(i32),
    R4(f32),
    R8(f64),
    /// Dates, times and date-times; a time of day alone sits on 1899-12-30
    DateTime(NaiveDateTime),
    Bytes { data: Vec<u8>, encoding: BinaryEncoding },
    Currency(Decimal),
}

fn time_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

fn strip_offset(text: &str) -> &str {
    if let Some(stripped) = text.strip_suffix(['Z', 'z']) {
        return stripped;
    }
    let split = text.len().saturating_sub(6);
    match text.get(split..) {
        Some(tail) if split > 0 && (tail.starts_with('+') || tail.starts_with('-')) && tail.as_bytes()[3] == b':' => {
            &text[..split]
        }
        _ => text,
    }
}

fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    let local = strip_offset(text);
    if let Ok(dt) = NaiveDateTime::parse_from_str(local, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(local, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    let time = NaiveTime::parse_from_str(local, "%H:%M:%S%.f").ok()?;
    Some(time_epoch()?.and_time(time))
}

impl WireValue {
    /// Convert `text` to the wire type selected by `declared`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidValue` when the text does not fit the type.
    pub fn parse(declared: &str, text: &str) -> Result<Self> {
        let invalid = || TransportError::InvalidValue {
            value: text.to_string(),
            data_type: declared.to_string(),
        };
        let trimmed = text.trim();

        let value = match WireType::from_declared(declared) {
            WireType::Empty => Self::Empty,
            WireType::String => Self::String(text.to_string()),
            WireType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Self::Bool(true),
                "0" | "false" | "no" => Self::Bool(false),
                _ => return Err(invalid()),
            },
            WireType::Ui1 => Self::Ui1(trimmed.parse().map_err(|_| invalid())?),
            WireType::Ui2 => Self::Ui2(trimmed.parse().map_err(|_| invalid())?),
            WireType::Ui4 => Self::Ui4(trimmed.parse().map_err(|_| invalid())?),
            WireType::I1 => Self::I1(trimmed.parse().map_err(|_| invalid())?),
            WireType::I2 => Self::I2(trimmed.parse().map_err(|_| invalid())?),
            WireType::I4 => Self::I4(trimmed.parse().map_err(|_| invalid())?),
            WireType::Int => Self::Int(trimmed.parse().map_err(|_| invalid())?),
            WireType::R4 => Self::R4(trimmed.parse().map_err(|_| invalid())?),
            WireType::R8 => Self::R8(trimmed.parse().map_err(|_| invalid())?),
            WireType::DateTime => Self::DateTime(parse_date_time(trimmed).ok_or_else(invalid)?),
            WireType::Bytes if declared.trim().eq_ignore_ascii_case("bin.hex") => Self::Bytes {
                data: hex::decode(trimmed).map_err(|_| invalid())?,
                encoding: BinaryEncoding::Hex,
            },
            WireType::Bytes => Self::Bytes {
                data: STANDARD.decode(trimmed).map_err(|_| invalid())?,
                encoding: BinaryEncoding::Base64,
            },
            WireType::Currency => {
                Self::Currency(Decimal::from_str(trimmed).map_err(|_| invalid())?.round_dp(4))
            }
        };
        Ok(value)
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            Self::Empty => WireType::Empty,
            Self::String(_) => WireType::String,
            Self::Bool(_) => WireType::Bool,
            Self::Ui1(_) => WireType::Ui1,
            Self::Ui2(_) => WireType::Ui2,
            Self::Ui4(_) => WireType::Ui4,
            Self::I1(_) => WireType::I1,
            Self::I2(_) => WireType::I2,
            Self::I4(_) => WireType::I4,
            Self::Int(_) => WireType::Int,
            Self::R4(_) => WireType::R4,
            Self::R8(_) => WireType::R8,
            Self::DateTime(_) => WireType::DateTime,
            Self::Bytes { .. } => WireType::Bytes,
            Self::Currency(_) => WireType::Currency,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl fmt::Display for WireValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::String(s) => f.write_str(s),
            Self::Bool(b) => f.write_str(if *b { "1" } else { "0" }),
            Self::Ui1(v) => write!(f, "{v}"),
            Self::Ui2(v) => write!(f, "{v}"),
            Self::Ui4(v) => write!(f, "{v}"),
            Self::I1(v) => write!(f, "{v}"),
            Self::I2(v) => write!(f, "{v}"),
            Self::I4(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::R4(v) => write!(f, "{v}"),
            Self::R8(v) => write!(f, "{v}"),
            Self::DateTime(dt) => {
                let time = dt.time();
                if Some(dt.date()) == time_epoch() {
                    write!(f, "{}", dt.format("%H:%M:%S"))
                } else if time.num_seconds_from_midnight() == 0 && time.nanosecond() == 0 {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S"))
                }
            }
            Self::Bytes { data, encoding: BinaryEncoding::Base64 } => f.write_str(&STANDARD.encode(data)),
            Self::Bytes { data, encoding: BinaryEncoding::Hex } => f.write_str(&hex::encode(data)),
            Self::Currency(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("string", WireType::String)]
    #[case("uuid", WireType::String)]
    #[case("boolean", WireType::Bool)]
    #[case("char", WireType::Ui2)]
    #[case("int", WireType::Int)]
    #[case("float", WireType::R4)]
    #[case("number", WireType::R8)]
    #[case("dateTime", WireType::DateTime)]
    #[case("time.tz", WireType::DateTime)]
    #[case("bin.hex", WireType::Bytes)]
    #[case("fixed.14.4", WireType::Currency)]
    #[case("UI4", WireType::Ui4)]
    #[case("mystery", WireType::String)]
    fn test_wire_type_mapping(#[case] declared: &str, #[case] expected: WireType) {
        assert_eq!(wire_type(declared), expected);
    }

    #[test]
    fn test_type_descriptions() {
        assert_eq!(type_description(WireType::Bool), "boolean");
        assert_eq!(type_description(WireType::DateTime), "date");
        assert_eq!(type_description(WireType::Bytes), "bin.base64");
        assert_eq!(type_description(WireType::Currency), "fixed.14.4");
        assert_eq!(type_description(wire_type("uri")), "string");
    }

    #[rstest]
    #[case("boolean", "yes", "1")]
    #[case("boolean", "False", "0")]
    #[case("ui2", " 42 ", "42")]
    #[case("i1", "-128", "-128")]
    #[case("r8", "2.5", "2.5")]
    #[case("date", "2024-02-29", "2024-02-29")]
    #[case("dateTime", "2024-02-29T13:45:10", "2024-02-29T13:45:10")]
    #[case("dateTime.tz", "2024-02-29T13:45:10+02:00", "2024-02-29T13:45:10")]
    #[case("time", "08:30:00", "08:30:00")]
    #[case("time.tz", "08:30:00Z", "08:30:00")]
    #[case("bin.base64", "aGVsbG8=", "aGVsbG8=")]
    #[case("bin.hex", "0aff", "0aff")]
    #[case("fixed.14.4", "12.345678", "12.3457")]
    #[case("uri", "http://x/y", "http://x/y")]
    fn test_parse_and_render(#[case] declared: &str, #[case] text: &str, #[case] rendered: &str) {
        let value = WireValue::parse(declared, text).unwrap();
        assert_eq!(value.wire_type(), wire_type(declared));
        assert_eq!(value.to_string(), rendered);
    }

    #[rstest]
    #[case("boolean", "maybe")]
    #[case("ui1", "256")]
    #[case("ui4", "-1")]
    #[case("i2", "forty")]
    #[case("date", "yesterday")]
    #[case("bin.hex", "xyz")]
    #[case("fixed.14.4", "1.2.3")]
    fn test_parse_rejects(#[case] declared: &str, #[case] text: &str) {
        assert!(matches!(
            WireValue::parse(declared, text),
            Err(TransportError::InvalidValue { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_ui2_accepts_exactly_its_range(n in 0u32..200_000) {
            let parsed = WireValue::parse("ui2", &n.to_string());
            prop_assert_eq!(parsed.is_ok(), n <= u32::from(u16::MAX));
        }

        #[test]
        fn prop_string_types_keep_text(text in "\\PC*") {
            let value = WireValue::parse("string", &text).unwrap();
            prop_assert_eq!(value.to_string(), text);
        }
    }
}
