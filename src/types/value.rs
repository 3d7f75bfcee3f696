//! Physical column types and scalar values.

use std::fmt;
use std::str::FromStr;

use arrow::datatypes::{Decimal128Type, DecimalType, DECIMAL128_MAX_PRECISION};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VexecError};

/// Physical buffer type of a column vector.
///
/// Several semantic types share one representation (date, boolean and the
/// integer family are all stored as `Int64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnVectorType {
    /// 64-bit signed integer slots.
    Int64,
    /// 64-bit floating point slots.
    Float64,
    /// Variable-length byte sequences backed by a shared arena.
    Bytes,
    /// Fixed-point decimals with column-level precision and scale.
    Decimal,
    /// Timestamps with nanosecond precision.
    Timestamp,
    /// Day-time intervals (seconds plus nanoseconds).
    IntervalDayTime,
}

impl ColumnVectorType {
    /// Returns the display name of the buffer type.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ColumnVectorType::Int64 => "INT64",
            ColumnVectorType::Float64 => "FLOAT64",
            ColumnVectorType::Bytes => "BYTES",
            ColumnVectorType::Decimal => "DECIMAL",
            ColumnVectorType::Timestamp => "TIMESTAMP",
            ColumnVectorType::IntervalDayTime => "INTERVAL_DAY_TIME",
        }
    }

    /// Returns whether slots are fixed width (pre-sized at construction).
    #[must_use]
    pub fn is_fixed_width(&self) -> bool {
        !matches!(self, ColumnVectorType::Bytes)
    }
}

impl fmt::Display for ColumnVectorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-point decimal stored as an unscaled 128-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Decimal {
    value: i128,
    precision: u8,
    scale: i8,
}

impl Decimal {
    /// Creates a decimal from its unscaled value.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDecimal` if the precision/scale pair is illegal or the
    /// value has more digits than `precision` allows.
    pub fn try_new(value: i128, precision: u8, scale: i8) -> Result<Self> {
        validate_precision_scale(precision, scale)?;
        Decimal128Type::validate_decimal_precision(value, precision)
            .map_err(|e| VexecError::InvalidDecimal(e.to_string()))?;
        Ok(Decimal {
            value,
            precision,
            scale,
        })
    }

    /// Returns the unscaled value.
    #[must_use]
    pub fn unscaled(&self) -> i128 {
        self.value
    }

    /// Returns the number of significant digits.
    #[must_use]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Returns the number of digits after the decimal point.
    #[must_use]
    pub fn scale(&self) -> i8 {
        self.scale
    }

    /// Converts to the given precision and scale, rounding half away from zero.
    ///
    /// Returns None when the result does not fit `precision`.
    #[must_use]
    pub fn rescale(&self, precision: u8, scale: i8) -> Option<Decimal> {
        validate_precision_scale(precision, scale).ok()?;
        let diff = i32::from(scale) - i32::from(self.scale);
        let value = if diff >= 0 {
            self.value.checked_mul(10i128.checked_pow(diff.unsigned_abs())?)?
        } else {
            let divisor = 10i128.checked_pow(diff.unsigned_abs())?;
            let quotient = self.value / divisor;
            let remainder = (self.value % divisor).abs();
            if remainder >= divisor - remainder {
                quotient + self.value.signum()
            } else {
                quotient
            }
        };
        Decimal128Type::validate_decimal_precision(value, precision).ok()?;
        Some(Decimal {
            value,
            precision,
            scale,
        })
    }
}

fn validate_precision_scale(precision: u8, scale: i8) -> Result<()> {
    if precision == 0 || precision > DECIMAL128_MAX_PRECISION {
        return Err(VexecError::InvalidDecimal(format!(
            "precision {precision} outside 1..={DECIMAL128_MAX_PRECISION}"
        )));
    }
    if scale < 0 || scale.unsigned_abs() > precision {
        return Err(VexecError::InvalidDecimal(format!(
            "scale {scale} outside 0..={precision}"
        )));
    }
    Ok(())
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Decimal128Type::format_decimal(
            self.value,
            self.precision,
            self.scale,
        ))
    }
}

impl FromStr for Decimal {
    type Err = VexecError;

    /// Parses a plain decimal literal such as `-123.45`.
    ///
    /// Precision is the number of significant digits and scale the number of
    /// fractional digits written.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || VexecError::InvalidDecimal(format!("'{s}' is not a decimal literal"));
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let significant = int_part.trim_start_matches('0').len() + frac_part.len();
        let precision = u8::try_from(significant.max(1)).map_err(|_| invalid())?;
        let scale = i8::try_from(frac_part.len()).map_err(|_| invalid())?;

        let mut value: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(i128::from(b - b'0')))
                .ok_or_else(invalid)?;
        }
        if negative {
            value = -value;
        }
        Decimal::try_new(value, precision, scale)
    }
}

const NANOS_PER_SECOND: i32 = 1_000_000_000;
const SECONDS_PER_DAY: i64 = 86_400;

/// Day-time interval stored as total seconds plus a nanosecond adjustment.
///
/// Values are kept normalized: `nanos` has the same sign as `total_seconds`
/// and its magnitude is below one second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntervalDayTime {
    total_seconds: i64,
    nanos: i32,
}

impl IntervalDayTime {
    /// Creates a normalized interval, or None if it is out of range.
    #[must_use]
    pub fn new(total_seconds: i64, nanos: i32) -> Option<Self> {
        let mut seconds = total_seconds.checked_add(i64::from(nanos / NANOS_PER_SECOND))?;
        let mut nanos = nanos % NANOS_PER_SECOND;
        if seconds > 0 && nanos < 0 {
            seconds -= 1;
            nanos += NANOS_PER_SECOND;
        } else if seconds < 0 && nanos > 0 {
            seconds += 1;
            nanos -= NANOS_PER_SECOND;
        }
        Some(IntervalDayTime {
            total_seconds: seconds,
            nanos,
        })
    }

    /// Creates an interval from day/hour/minute/second/nanosecond fields.
    ///
    /// Returns None if the total does not fit in `i64` seconds.
    #[must_use]
    pub fn from_fields(days: i64, hours: i64, minutes: i64, seconds: i64, nanos: i32) -> Option<Self> {
        let total = days
            .checked_mul(SECONDS_PER_DAY)?
            .checked_add(hours.checked_mul(3600)?)?
            .checked_add(minutes.checked_mul(60)?)?
            .checked_add(seconds)?;
        Self::new(total, nanos)
    }

    /// Creates an interval from a chrono duration.
    #[must_use]
    pub fn from_time_delta(delta: TimeDelta) -> Self {
        // chrono keeps both parts on the same side of zero.
        IntervalDayTime {
            total_seconds: delta.num_seconds(),
            nanos: delta.subsec_nanos(),
        }
    }

    /// Converts to a chrono duration, or None if out of chrono's range.
    #[must_use]
    pub fn to_time_delta(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.total_seconds)?
            .checked_add(&TimeDelta::nanoseconds(i64::from(self.nanos)))
    }

    /// Total length in nanoseconds, or None on overflow.
    #[must_use]
    pub fn total_nanos(&self) -> Option<i64> {
        self.total_seconds
            .checked_mul(i64::from(NANOS_PER_SECOND))?
            .checked_add(i64::from(self.nanos))
    }

    #[must_use]
    pub fn total_seconds(&self) -> i64 {
        self.total_seconds
    }

    #[must_use]
    pub fn nanos(&self) -> i32 {
        self.nanos
    }

    #[must_use]
    pub fn days(&self) -> i64 {
        self.total_seconds / SECONDS_PER_DAY
    }
}

impl fmt::Display for IntervalDayTime {
    /// Renders as `[-]D HH:MM:SS.NNNNNNNNN`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let negative = self.total_seconds < 0 || self.nanos < 0;
        let secs = self.total_seconds.unsigned_abs();
        write!(
            f,
            "{}{} {:02}:{:02}:{:02}.{:09}",
            if negative { "-" } else { "" },
            secs / SECONDS_PER_DAY.unsigned_abs(),
            (secs / 3600) % 24,
            (secs / 60) % 60,
            secs % 60,
            self.nanos.unsigned_abs()
        )
    }
}

/// Renders bytes as UTF-8 for diagnostics, replacing invalid sequences.
#[must_use]
pub fn display_utf8_bytes(bytes: Option<&[u8]>) -> String {
    match bytes {
        Some(b) => String::from_utf8_lossy(b).into_owned(),
        None => "NULL".to_string(),
    }
}

/// Renders a list of byte sequences as comma-separated UTF-8.
#[must_use]
pub fn display_utf8_byte_list(list: &[&[u8]]) -> String {
    list.iter()
        .map(|b| display_utf8_bytes(Some(b)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Scalar value read from or written to a single column slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// 64-bit signed integer value.
    Int64(i64),
    /// 64-bit floating point value.
    Float64(f64),
    /// Byte-sequence value (strings are UTF-8 bytes).
    Bytes(Vec<u8>),
    /// Decimal value.
    Decimal(Decimal),
    /// Timestamp value.
    Timestamp(NaiveDateTime),
    /// Day-time interval value.
    IntervalDayTime(IntervalDayTime),
}

impl Value {
    /// Returns true if this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the buffer type this value is written to, or None for Null.
    #[must_use]
    pub fn column_vector_type(&self) -> Option<ColumnVectorType> {
        match self {
            Value::Null => None,
            Value::Int64(_) => Some(ColumnVectorType::Int64),
            Value::Float64(_) => Some(ColumnVectorType::Float64),
            Value::Bytes(_) => Some(ColumnVectorType::Bytes),
            Value::Decimal(_) => Some(ColumnVectorType::Decimal),
            Value::Timestamp(_) => Some(ColumnVectorType::Timestamp),
            Value::IntervalDayTime(_) => Some(ColumnVectorType::IntervalDayTime),
        }
    }

    /// Name of the value's kind, used in mismatch errors.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.column_vector_type().map_or("NULL", |t| t.name())
    }

    #[must_use]
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Decimal(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_interval_day_time(&self) -> Option<IntervalDayTime> {
        match self {
            Value::IntervalDayTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v:?}"),
            Value::Bytes(v) => f.write_str(&display_utf8_bytes(Some(v))),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::IntervalDayTime(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_parse_and_display() {
        let d: Decimal = "-123.45".parse().unwrap();
        assert_eq!(d.unscaled(), -12345);
        assert_eq!(d.precision(), 5);
        assert_eq!(d.scale(), 2);
        assert_eq!(d.to_string(), "-123.45");
    }

    #[test]
    fn test_decimal_parse_rejects_garbage() {
        assert!("12a.5".parse::<Decimal>().is_err());
        assert!(".".parse::<Decimal>().is_err());
        assert!("".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_decimal_try_new_checks_precision() {
        assert!(Decimal::try_new(999, 3, 0).is_ok());
        assert!(Decimal::try_new(1000, 3, 0).is_err());
        assert!(Decimal::try_new(1, 0, 0).is_err());
        assert!(Decimal::try_new(1, 5, 6).is_err());
    }

    #[test]
    fn test_decimal_rescale_rounds_half_up() {
        let d: Decimal = "1.25".parse().unwrap();
        let r = d.rescale(10, 1).unwrap();
        assert_eq!(r.unscaled(), 13);
        assert_eq!(r.to_string(), "1.3");

        let n: Decimal = "-1.25".parse().unwrap();
        assert_eq!(n.rescale(10, 1).unwrap().unscaled(), -13);

        let widened = d.rescale(10, 4).unwrap();
        assert_eq!(widened.unscaled(), 12500);
    }

    #[test]
    fn test_decimal_rescale_overflow_is_none() {
        let d: Decimal = "12345.6".parse().unwrap();
        assert!(d.rescale(4, 0).is_none());
    }

    #[test]
    fn test_interval_normalization() {
        let i = IntervalDayTime::new(5, -1).unwrap();
        assert_eq!(i.total_seconds(), 4);
        assert_eq!(i.nanos(), 999_999_999);

        let j = IntervalDayTime::new(-5, 1).unwrap();
        assert_eq!(j.total_seconds(), -4);
        assert_eq!(j.nanos(), -999_999_999);

        let k = IntervalDayTime::new(1, 1_500_000_000).unwrap();
        assert_eq!(k.total_seconds(), 2);
        assert_eq!(k.nanos(), 500_000_000);
    }

    #[test]
    fn test_interval_display() {
        let i = IntervalDayTime::from_fields(1, 2, 3, 4, 5).unwrap();
        assert_eq!(i.to_string(), "1 02:03:04.000000005");
        let n = IntervalDayTime::new(-90_061, 0).unwrap();
        assert_eq!(n.to_string(), "-1 01:01:01.000000000");
    }

    #[test]
    fn test_interval_out_of_range_is_none() {
        assert!(IntervalDayTime::from_fields(i64::MAX / 1000, 0, 0, 0, 0).is_none());
        assert!(IntervalDayTime::from_fields(0, i64::MIN, 0, 0, 0).is_none());
        assert!(IntervalDayTime::from_fields(0, 0, 0, i64::MAX, 0).is_some());
        assert!(IntervalDayTime::new(i64::MAX, 1_000_000_000).is_none());
        assert!(IntervalDayTime::new(i64::MIN, -1_000_000_000).is_none());

        let edge = IntervalDayTime::new(i64::MAX, -1).unwrap();
        assert_eq!(edge.total_seconds(), i64::MAX - 1);
        assert_eq!(edge.nanos(), 999_999_999);
    }

    #[test]
    fn test_interval_time_delta_conversion() {
        let delta = TimeDelta::milliseconds(-1500);
        let i = IntervalDayTime::from_time_delta(delta);
        assert_eq!(i.total_seconds(), -1);
        assert_eq!(i.nanos(), -500_000_000);
        assert_eq!(i.to_time_delta(), Some(delta));
        assert_eq!(i.total_nanos(), Some(-1_500_000_000));
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Int64(1).column_vector_type(), Some(ColumnVectorType::Int64));
        assert_eq!(Value::Null.column_vector_type(), None);
        assert_eq!(Value::Null.kind_name(), "NULL");
        assert_eq!(Value::Bytes(b"abc".to_vec()).to_string(), "abc");
    }

    #[test]
    fn test_display_utf8_bytes() {
        assert_eq!(display_utf8_bytes(None), "NULL");
        assert_eq!(display_utf8_byte_list(&[b"a".as_slice(), b"bc".as_slice()]), "a, bc");
    }
}
