//! Semantic type descriptors supplied by the expression builder.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VexecError};

use super::value::ColumnVectorType;

/// Default precision for a bare `decimal` type name.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 10;
/// Default scale for a bare `decimal` type name.
pub const DEFAULT_DECIMAL_SCALE: i8 = 0;
/// Maximum length of `char(n)`.
pub const MAX_CHAR_LENGTH: u32 = 255;
/// Maximum length of `varchar(n)`.
pub const MAX_VARCHAR_LENGTH: u32 = 65_535;

/// Semantic type of an expression's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeInfo {
    Boolean,
    TinyInt,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    String,
    /// Fixed-length character string.
    Char(u32),
    /// Bounded variable-length character string.
    Varchar(u32),
    Binary,
    Date,
    Timestamp,
    Decimal { precision: u8, scale: i8 },
    IntervalYearMonth,
    IntervalDayTime,
    /// Type of an untyped NULL literal.
    Void,
}

impl TypeInfo {
    /// Returns the physical buffer type values of this type are stored in.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for `void`, which has no buffer.
    pub fn column_vector_type(&self) -> Result<ColumnVectorType> {
        match self {
            TypeInfo::Boolean
            | TypeInfo::TinyInt
            | TypeInfo::SmallInt
            | TypeInfo::Int
            | TypeInfo::BigInt
            | TypeInfo::Date
            | TypeInfo::IntervalYearMonth => Ok(ColumnVectorType::Int64),
            TypeInfo::Float | TypeInfo::Double => Ok(ColumnVectorType::Float64),
            TypeInfo::String | TypeInfo::Char(_) | TypeInfo::Varchar(_) | TypeInfo::Binary => {
                Ok(ColumnVectorType::Bytes)
            }
            TypeInfo::Decimal { .. } => Ok(ColumnVectorType::Decimal),
            TypeInfo::Timestamp => Ok(ColumnVectorType::Timestamp),
            TypeInfo::IntervalDayTime => Ok(ColumnVectorType::IntervalDayTime),
            TypeInfo::Void => Err(VexecError::UnsupportedType(
                "void has no column vector representation".to_string(),
            )),
        }
    }

    /// Returns the refined expression type used to tell apart types that
    /// share a buffer representation.
    #[must_use]
    pub fn expression_type(&self) -> ExpressionType {
        match self {
            TypeInfo::TinyInt | TypeInfo::SmallInt | TypeInfo::Int | TypeInfo::BigInt => {
                ExpressionType::Long
            }
            TypeInfo::Float | TypeInfo::Double => ExpressionType::Double,
            TypeInfo::String => ExpressionType::String,
            TypeInfo::Char(_) => ExpressionType::Char,
            TypeInfo::Varchar(_) => ExpressionType::Varchar,
            TypeInfo::Date => ExpressionType::Date,
            TypeInfo::Timestamp => ExpressionType::Timestamp,
            TypeInfo::Decimal { .. } => ExpressionType::Decimal,
            TypeInfo::IntervalYearMonth => ExpressionType::IntervalYearMonth,
            TypeInfo::IntervalDayTime => ExpressionType::IntervalDayTime,
            TypeInfo::Boolean | TypeInfo::Binary | TypeInfo::Void => ExpressionType::Other,
        }
    }

    /// Returns the decimal precision and scale, if this is a decimal type.
    #[must_use]
    pub fn decimal_precision_scale(&self) -> Option<(u8, i8)> {
        match self {
            TypeInfo::Decimal { precision, scale } => Some((*precision, *scale)),
            _ => None,
        }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeInfo::Boolean => f.write_str("boolean"),
            TypeInfo::TinyInt => f.write_str("tinyint"),
            TypeInfo::SmallInt => f.write_str("smallint"),
            TypeInfo::Int => f.write_str("int"),
            TypeInfo::BigInt => f.write_str("bigint"),
            TypeInfo::Float => f.write_str("float"),
            TypeInfo::Double => f.write_str("double"),
            TypeInfo::String => f.write_str("string"),
            TypeInfo::Char(n) => write!(f, "char({n})"),
            TypeInfo::Varchar(n) => write!(f, "varchar({n})"),
            TypeInfo::Binary => f.write_str("binary"),
            TypeInfo::Date => f.write_str("date"),
            TypeInfo::Timestamp => f.write_str("timestamp"),
            TypeInfo::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            TypeInfo::IntervalYearMonth => f.write_str("interval_year_month"),
            TypeInfo::IntervalDayTime => f.write_str("interval_day_time"),
            TypeInfo::Void => f.write_str("void"),
        }
    }
}

impl FromStr for TypeInfo {
    type Err = VexecError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let (base, params) = match lower.split_once('(') {
            Some((base, rest)) => {
                let inner = rest.strip_suffix(')').ok_or_else(|| {
                    VexecError::TypeParse(format!("unbalanced parentheses in '{s}'"))
                })?;
                (base.trim(), Some(inner))
            }
            None => (lower.as_str(), None),
        };

        let type_info = match (base, params) {
            ("boolean", None) => TypeInfo::Boolean,
            ("tinyint", None) => TypeInfo::TinyInt,
            ("smallint", None) => TypeInfo::SmallInt,
            ("int" | "integer", None) => TypeInfo::Int,
            ("bigint", None) => TypeInfo::BigInt,
            ("float", None) => TypeInfo::Float,
            ("double", None) => TypeInfo::Double,
            ("string", None) => TypeInfo::String,
            ("char", Some(p)) => TypeInfo::Char(parse_length(s, p, MAX_CHAR_LENGTH)?),
            ("varchar", Some(p)) => TypeInfo::Varchar(parse_length(s, p, MAX_VARCHAR_LENGTH)?),
            ("binary", None) => TypeInfo::Binary,
            ("date", None) => TypeInfo::Date,
            ("timestamp", None) => TypeInfo::Timestamp,
            ("decimal", None) => TypeInfo::Decimal {
                precision: DEFAULT_DECIMAL_PRECISION,
                scale: DEFAULT_DECIMAL_SCALE,
            },
            ("decimal", Some(p)) => parse_decimal_params(s, p)?,
            ("interval_year_month", None) => TypeInfo::IntervalYearMonth,
            ("interval_day_time", None) => TypeInfo::IntervalDayTime,
            ("void", None) => TypeInfo::Void,
            _ => return Err(VexecError::TypeParse(format!("unknown type '{s}'"))),
        };
        Ok(type_info)
    }
}

fn parse_length(original: &str, param: &str, max: u32) -> Result<u32> {
    let len: u32 = param
        .trim()
        .parse()
        .map_err(|_| VexecError::TypeParse(format!("invalid length in '{original}'")))?;
    if len == 0 || len > max {
        return Err(VexecError::TypeParse(format!(
            "length {len} in '{original}' outside 1..={max}"
        )));
    }
    Ok(len)
}

fn parse_decimal_params(original: &str, params: &str) -> Result<TypeInfo> {
    let invalid = || VexecError::TypeParse(format!("invalid decimal parameters in '{original}'"));
    let (p, s) = match params.split_once(',') {
        Some((p, s)) => (p, Some(s)),
        None => (params, None),
    };
    let precision: u8 = p.trim().parse().map_err(|_| invalid())?;
    let scale: i8 = match s {
        Some(s) => s.trim().parse().map_err(|_| invalid())?,
        None => DEFAULT_DECIMAL_SCALE,
    };
    if precision == 0
        || precision > arrow::datatypes::DECIMAL128_MAX_PRECISION
        || scale < 0
        || scale.unsigned_abs() > precision
    {
        return Err(invalid());
    }
    Ok(TypeInfo::Decimal { precision, scale })
}

/// Refined input type of an expression argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpressionType {
    String,
    Char,
    Varchar,
    Timestamp,
    Date,
    Long,
    Double,
    Decimal,
    IntervalYearMonth,
    IntervalDayTime,
    Other,
}

impl ExpressionType {
    /// Looks up a type by name, ignoring case. Unknown names map to `Other`.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => ExpressionType::String,
            "char" => ExpressionType::Char,
            "varchar" => ExpressionType::Varchar,
            "timestamp" => ExpressionType::Timestamp,
            "date" => ExpressionType::Date,
            "long" => ExpressionType::Long,
            "double" => ExpressionType::Double,
            "decimal" => ExpressionType::Decimal,
            "interval_year_month" => ExpressionType::IntervalYearMonth,
            "interval_day_time" => ExpressionType::IntervalDayTime,
            _ => ExpressionType::Other,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ExpressionType::String => "STRING",
            ExpressionType::Char => "CHAR",
            ExpressionType::Varchar => "VARCHAR",
            ExpressionType::Timestamp => "TIMESTAMP",
            ExpressionType::Date => "DATE",
            ExpressionType::Long => "LONG",
            ExpressionType::Double => "DOUBLE",
            ExpressionType::Decimal => "DECIMAL",
            ExpressionType::IntervalYearMonth => "INTERVAL_YEAR_MONTH",
            ExpressionType::IntervalDayTime => "INTERVAL_DAY_TIME",
            ExpressionType::Other => "OTHER",
        }
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_names() {
        assert_eq!("BIGINT".parse::<TypeInfo>().unwrap(), TypeInfo::BigInt);
        assert_eq!(" double ".parse::<TypeInfo>().unwrap(), TypeInfo::Double);
        assert_eq!("integer".parse::<TypeInfo>().unwrap(), TypeInfo::Int);
    }

    #[test]
    fn test_parse_parameterized_names() {
        assert_eq!(
            "decimal(12, 3)".parse::<TypeInfo>().unwrap(),
            TypeInfo::Decimal {
                precision: 12,
                scale: 3
            }
        );
        assert_eq!(
            "decimal".parse::<TypeInfo>().unwrap(),
            TypeInfo::Decimal {
                precision: 10,
                scale: 0
            }
        );
        assert_eq!("char(5)".parse::<TypeInfo>().unwrap(), TypeInfo::Char(5));
        assert_eq!(
            "VARCHAR(20)".parse::<TypeInfo>().unwrap(),
            TypeInfo::Varchar(20)
        );
    }

    #[test]
    fn test_parse_rejects_invalid() {
        assert!("decimal(40,2)".parse::<TypeInfo>().is_err());
        assert!("decimal(5,6)".parse::<TypeInfo>().is_err());
        assert!("char(0)".parse::<TypeInfo>().is_err());
        assert!("varchar(10".parse::<TypeInfo>().is_err());
        assert!("map<string,int>".parse::<TypeInfo>().is_err());
        assert!("char".parse::<TypeInfo>().is_err());
    }

    #[test]
    fn test_display_parse_roundtrip_names() {
        for name in ["bigint", "char(7)", "decimal(38,10)", "interval_day_time", "void"] {
            assert_eq!(name.parse::<TypeInfo>().unwrap().to_string(), name);
        }
    }

    #[test]
    fn test_column_vector_type_mapping() {
        assert_eq!(
            TypeInfo::Date.column_vector_type().unwrap(),
            ColumnVectorType::Int64
        );
        assert_eq!(
            TypeInfo::Varchar(3).column_vector_type().unwrap(),
            ColumnVectorType::Bytes
        );
        assert_eq!(
            TypeInfo::IntervalDayTime.column_vector_type().unwrap(),
            ColumnVectorType::IntervalDayTime
        );
        assert!(TypeInfo::Void.column_vector_type().is_err());
    }

    #[test]
    fn test_expression_type_lookup() {
        assert_eq!(ExpressionType::from_name("LONG"), ExpressionType::Long);
        assert_eq!(
            ExpressionType::from_name("Interval_Day_Time"),
            ExpressionType::IntervalDayTime
        );
        assert_eq!(ExpressionType::from_name("struct"), ExpressionType::Other);
        assert_eq!(TypeInfo::Date.expression_type(), ExpressionType::Date);
        assert_eq!(TypeInfo::Int.expression_type(), ExpressionType::Long);
    }
}
