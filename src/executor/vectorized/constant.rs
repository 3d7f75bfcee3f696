//! Constant expressions broadcast as repeating columns.

use std::fmt;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::error::{Result, VexecError};
use crate::types::{ColumnVectorType, Decimal, IntervalDayTime, TypeInfo, Value};

use super::batch::VectorizedRowBatch;
use super::expression::{fmt_expression, Descriptor, VectorExpression};

/// Leaf expression that writes one literal into slot 0 of its output column
/// and marks the column repeating.
///
/// Built through [`ConstantBuilder`], which checks the literal against the
/// declared type so a node can never exist without a usable literal.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantVectorExpression {
    output_column: usize,
    output_type_info: TypeInfo,
    column_type: ColumnVectorType,
    /// `Value::Null` for a null constant.
    value: Value,
}

impl ConstantVectorExpression {
    /// Starts building a constant for `output_column` of the given type.
    #[must_use]
    pub fn builder(output_column: usize, output_type_info: TypeInfo) -> ConstantBuilder {
        ConstantBuilder {
            output_column,
            output_type_info,
            value: None,
        }
    }

    /// Builds a constant holding `value`.
    ///
    /// # Errors
    ///
    /// Returns `TypeDispatch` if the value does not match the declared type.
    pub fn new(output_column: usize, output_type_info: TypeInfo, value: Value) -> Result<Self> {
        Self::builder(output_column, output_type_info)
            .value(value)
            .build()
    }

    /// Builds a null constant.
    ///
    /// # Errors
    ///
    /// Returns an error if the type has no column representation.
    pub fn null(output_column: usize, output_type_info: TypeInfo) -> Result<Self> {
        Self::builder(output_column, output_type_info).null().build()
    }

    /// The literal, `Value::Null` for a null constant.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn is_null_value(&self) -> bool {
        self.value.is_null()
    }

    /// Physical buffer type the literal is written to.
    #[must_use]
    pub fn column_type(&self) -> ColumnVectorType {
        self.column_type
    }
}

impl VectorExpression for ConstantVectorExpression {
    fn evaluate(&self, batch: &mut VectorizedRowBatch) -> Result<()> {
        let column = batch.column_mut(self.output_column)?;
        if column.column_type() != self.column_type {
            return Err(VexecError::buffer_mismatch(
                self.column_type,
                column.column_type(),
            ));
        }

        // Scratch columns are reused, so the null state of slot 0 is always
        // written explicitly.
        column.set_repeating(true);
        match &self.value {
            Value::Null => {
                column.init_buffer();
                column.set_null(0)?;
            }
            Value::Int64(v) => column.set_long(0, *v)?,
            Value::Float64(v) => column.set_double(0, *v)?,
            Value::Bytes(v) => {
                column.init_buffer();
                column.set_bytes(0, v)?;
            }
            Value::Decimal(v) => column.set_decimal(0, *v)?,
            Value::Timestamp(v) => column.set_timestamp(0, *v)?,
            Value::IntervalDayTime(v) => column.set_interval_day_time(0, *v)?,
        }
        Ok(())
    }

    fn output_column(&self) -> Option<usize> {
        Some(self.output_column)
    }

    fn output_type_info(&self) -> Option<&TypeInfo> {
        Some(&self.output_type_info)
    }

    fn name(&self) -> &'static str {
        "ConstantVectorExpression"
    }

    fn parameters(&self) -> Option<String> {
        match &self.value {
            Value::Null => Some("val null".to_string()),
            v => Some(format!("val {v}")),
        }
    }

    fn descriptor(&self) -> Descriptor {
        Descriptor::builder().build()
    }
}

impl fmt::Display for ConstantVectorExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expression(self, f)
    }
}

/// Two-phase builder for [`ConstantVectorExpression`].
#[derive(Debug, Clone)]
pub struct ConstantBuilder {
    output_column: usize,
    output_type_info: TypeInfo,
    value: Option<Value>,
}

impl ConstantBuilder {
    #[must_use]
    pub fn long(self, value: i64) -> Self {
        self.value(Value::Int64(value))
    }

    #[must_use]
    pub fn double(self, value: f64) -> Self {
        self.value(Value::Float64(value))
    }

    /// Sets a byte-sequence literal. The bytes are copied, so the caller's
    /// buffer may be reused afterwards.
    ///
    /// Raw bytes are stored as given, even for `char`/`varchar` outputs.
    #[must_use]
    pub fn bytes(self, value: &[u8]) -> Self {
        self.value(Value::Bytes(value.to_vec()))
    }

    /// Sets a string literal (stored as UTF-8 bytes).
    ///
    /// For `char(n)` and `varchar(n)` outputs the text is truncated to `n`
    /// characters; `char` also drops trailing spaces.
    #[must_use]
    pub fn string(self, value: &str) -> Self {
        let bytes = enforce_length(value, &self.output_type_info);
        self.value(Value::Bytes(bytes))
    }

    #[must_use]
    pub fn decimal(self, value: Decimal) -> Self {
        self.value(Value::Decimal(value))
    }

    #[must_use]
    pub fn timestamp(self, value: NaiveDateTime) -> Self {
        self.value(Value::Timestamp(value))
    }

    #[must_use]
    pub fn interval_day_time(self, value: IntervalDayTime) -> Self {
        self.value(Value::IntervalDayTime(value))
    }

    /// Makes the constant a typed NULL.
    #[must_use]
    pub fn null(self) -> Self {
        self.value(Value::Null)
    }

    #[must_use]
    pub fn value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Validates the literal against the declared type and builds the node.
    ///
    /// # Errors
    ///
    /// Returns `TypeDispatch` if no literal was set or its kind does not
    /// match the declared type, and `UnsupportedType` for types without a
    /// column representation.
    pub fn build(self) -> Result<ConstantVectorExpression> {
        let column_type = self.output_type_info.column_vector_type()?;
        let value = match self.value {
            None => {
                return Err(VexecError::TypeDispatch {
                    expected: column_type.name().to_string(),
                    actual: "no literal".to_string(),
                })
            }
            Some(v) if v.is_null() || v.column_vector_type() == Some(column_type) => v,
            Some(v) => {
                return Err(VexecError::TypeDispatch {
                    expected: column_type.name().to_string(),
                    actual: v.kind_name().to_string(),
                })
            }
        };

        debug!(
            output_column = self.output_column,
            type_info = %self.output_type_info,
            literal = %value,
            "built constant expression"
        );
        Ok(ConstantVectorExpression {
            output_column: self.output_column,
            output_type_info: self.output_type_info,
            column_type,
            value,
        })
    }
}

/// Applies char/varchar length rules to a string literal. Other types keep
/// the text unchanged.
fn enforce_length(text: &str, type_info: &TypeInfo) -> Vec<u8> {
    let (max_len, strip) = match type_info {
        TypeInfo::Char(n) => (*n as usize, true),
        TypeInfo::Varchar(n) => (*n as usize, false),
        _ => return text.as_bytes().to_vec(),
    };
    let truncated = match text.char_indices().nth(max_len) {
        Some((end, _)) => &text[..end],
        None => text,
    };
    let adjusted = if strip {
        truncated.trim_end_matches(' ')
    } else {
        truncated
    };
    adjusted.as_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::vectorized::batch::SelectionVector;

    fn batch_with(types: &[TypeInfo], size: usize) -> VectorizedRowBatch {
        let mut batch = VectorizedRowBatch::new(types, 16).unwrap();
        batch.set_size(size).unwrap();
        batch
    }

    #[test]
    fn test_long_constant() {
        let expr = ConstantVectorExpression::builder(0, TypeInfo::BigInt)
            .long(42)
            .build()
            .unwrap();
        let mut batch = batch_with(&[TypeInfo::BigInt], 5);
        expr.evaluate(&mut batch).unwrap();

        let col = batch.column(0).unwrap();
        assert!(col.is_repeating());
        assert!(!col.null_flags()[0]);
        assert_eq!(col.value(4).unwrap(), Value::Int64(42));
    }

    #[test]
    fn test_null_constant_overrides_scratch_state() {
        let expr = ConstantVectorExpression::null(0, TypeInfo::Double).unwrap();
        let mut batch = batch_with(&[TypeInfo::Double], 3);
        batch.column_mut(0).unwrap().set_double(0, 1.0).unwrap();
        expr.evaluate(&mut batch).unwrap();

        let col = batch.column(0).unwrap();
        assert!(col.is_repeating());
        assert!(col.null_flags()[0]);
        assert!(!col.no_nulls());
    }

    #[test]
    fn test_non_null_after_null_in_reused_column() {
        let mut batch = batch_with(&[TypeInfo::BigInt], 3);
        ConstantVectorExpression::null(0, TypeInfo::BigInt)
            .unwrap()
            .evaluate(&mut batch)
            .unwrap();
        ConstantVectorExpression::new(0, TypeInfo::BigInt, Value::Int64(1))
            .unwrap()
            .evaluate(&mut batch)
            .unwrap();
        let col = batch.column(0).unwrap();
        assert!(!col.is_null(0));
        assert_eq!(col.value(2).unwrap(), Value::Int64(1));
    }

    #[test]
    fn test_build_without_literal_fails() {
        let err = ConstantVectorExpression::builder(
            0,
            TypeInfo::Decimal {
                precision: 10,
                scale: 2,
            },
        )
        .build()
        .unwrap_err();
        assert!(matches!(err, VexecError::TypeDispatch { .. }));
    }

    #[test]
    fn test_build_with_wrong_literal_fails() {
        let err = ConstantVectorExpression::builder(0, TypeInfo::Timestamp)
            .long(1)
            .build()
            .unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_evaluate_against_wrong_buffer_fails() {
        let expr = ConstantVectorExpression::new(0, TypeInfo::BigInt, Value::Int64(1)).unwrap();
        let mut batch = batch_with(&[TypeInfo::Double], 1);
        let err = expr.evaluate(&mut batch).unwrap_err();
        assert!(matches!(err, VexecError::TypeDispatch { .. }));
        assert!(!batch.column(0).unwrap().is_repeating());
    }

    #[test]
    fn test_char_literal_truncated_and_stripped() {
        let expr = ConstantVectorExpression::builder(0, TypeInfo::Char(5))
            .string("ab   xyz")
            .build()
            .unwrap();
        assert_eq!(expr.value().as_bytes(), Some(&b"ab"[..]));
    }

    #[test]
    fn test_varchar_literal_truncated_by_chars() {
        let expr = ConstantVectorExpression::builder(0, TypeInfo::Varchar(2))
            .string("héllo")
            .build()
            .unwrap();
        assert_eq!(expr.value().as_bytes(), Some("hé".as_bytes()));
    }

    #[test]
    fn test_raw_bytes_kept_for_char_type() {
        let expr = ConstantVectorExpression::builder(0, TypeInfo::Char(2))
            .bytes(b"ab   x")
            .build()
            .unwrap();
        assert_eq!(expr.value().as_bytes(), Some(&b"ab   x"[..]));

        let expr = ConstantVectorExpression::new(0, TypeInfo::Varchar(1), Value::Bytes(vec![0xff, 0xfe]))
            .unwrap();
        assert_eq!(expr.value().as_bytes(), Some(&[0xff, 0xfe][..]));
    }

    #[test]
    fn test_selection_does_not_change_result() {
        let expr = ConstantVectorExpression::builder(0, TypeInfo::String)
            .string("abc")
            .build()
            .unwrap();
        let mut plain = batch_with(&[TypeInfo::String], 8);
        let mut selected = batch_with(&[TypeInfo::String], 8);
        selected
            .set_selection(SelectionVector::new(vec![2, 5]))
            .unwrap();

        expr.evaluate(&mut plain).unwrap();
        expr.evaluate(&mut selected).unwrap();
        assert_eq!(
            plain.column(0).unwrap().bytes_at(0),
            selected.column(0).unwrap().bytes_at(0)
        );
        assert_eq!(selected.column(0).unwrap().bytes_at(5), Some(&b"abc"[..]));
    }

    #[test]
    fn test_explain_rendering() {
        let expr = ConstantVectorExpression::new(3, TypeInfo::BigInt, Value::Int64(42)).unwrap();
        assert_eq!(expr.to_string(), "ConstantVectorExpression(val 42) -> 3:bigint");

        let null = ConstantVectorExpression::null(1, TypeInfo::String).unwrap();
        assert_eq!(
            null.to_string(),
            "ConstantVectorExpression(val null) -> 1:string"
        );
    }
}
