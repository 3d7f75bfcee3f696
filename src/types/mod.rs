//! Type system: physical buffer types, semantic type descriptors and values.

mod type_info;
mod value;

pub use type_info::{
    ExpressionType, TypeInfo, DEFAULT_DECIMAL_PRECISION, DEFAULT_DECIMAL_SCALE, MAX_CHAR_LENGTH,
    MAX_VARCHAR_LENGTH,
};
pub use value::{
    display_utf8_byte_list, display_utf8_bytes, ColumnVectorType, Decimal, IntervalDayTime, Value,
};
