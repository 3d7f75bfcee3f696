//! Integer column arithmetic.

use std::fmt;

use crate::error::{Result, VexecError};
use crate::types::{ExpressionType, TypeInfo};

use super::batch::VectorizedRowBatch;
use super::column::ColumnVector;
use super::expression::{
    column_param_string, fmt_expression, Descriptor, InputKind, VectorExpression,
};

/// Binary operator applied by [`LongColumnArithmetic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
}

impl ArithmeticOp {
    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
        }
    }

    fn wrapping(self, left: i64, right: i64) -> i64 {
        match self {
            ArithmeticOp::Add => left.wrapping_add(right),
            ArithmeticOp::Subtract => left.wrapping_sub(right),
            ArithmeticOp::Multiply => left.wrapping_mul(right),
        }
    }

    fn checked(self, left: i64, right: i64) -> Result<i64> {
        let result = match self {
            ArithmeticOp::Add => left.checked_add(right),
            ArithmeticOp::Subtract => left.checked_sub(right),
            ArithmeticOp::Multiply => left.checked_mul(right),
        };
        result.ok_or(VexecError::ArithmeticOverflow {
            op: self.symbol(),
            left,
            right,
        })
    }
}

/// `left <op> right` over two `Int64` columns.
///
/// A null on either side makes the row null. The unchecked form wraps on
/// overflow; the checked form fails the batch with `ArithmeticOverflow`.
#[derive(Debug)]
pub struct LongColumnArithmetic {
    op: ArithmeticOp,
    left_column: usize,
    right_column: usize,
    output_column: usize,
    output_type_info: TypeInfo,
    checked: bool,
    input_types: [ExpressionType; 2],
    children: Vec<Box<dyn VectorExpression>>,
}

impl LongColumnArithmetic {
    #[must_use]
    pub fn new(op: ArithmeticOp, left_column: usize, right_column: usize, output_column: usize) -> Self {
        Self {
            op,
            left_column,
            right_column,
            output_column,
            output_type_info: TypeInfo::BigInt,
            checked: false,
            input_types: [ExpressionType::Long, ExpressionType::Long],
            children: Vec::new(),
        }
    }

    /// Switches to the overflow-checked variant.
    #[must_use]
    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<Box<dyn VectorExpression>>) -> Self {
        self.children = children;
        self
    }

    #[must_use]
    pub fn op(&self) -> ArithmeticOp {
        self.op
    }

    #[must_use]
    pub fn is_checked(&self) -> bool {
        self.checked
    }

    fn apply(&self, left: i64, right: i64) -> Result<i64> {
        if self.checked {
            self.op.checked(left, right)
        } else {
            Ok(self.op.wrapping(left, right))
        }
    }
}

impl VectorExpression for LongColumnArithmetic {
    fn evaluate(&self, batch: &mut VectorizedRowBatch) -> Result<()> {
        self.evaluate_children(batch)?;

        let (view, output) = batch.split_output(self.output_column)?;
        let size = view.size();
        if size == 0 {
            return Ok(());
        }
        let left = view.column(self.left_column)?;
        let right = view.column(self.right_column)?;
        let left_values = left.int64_values()?;
        let right_values = right.int64_values()?;
        // Verify the output buffer type before touching any flags.
        output.int64_values()?;

        if left.is_repeating() && right.is_repeating() {
            output.set_repeating(true);
            if left.is_null(0) || right.is_null(0) {
                return output.set_null(0);
            }
            let value = self.apply(left_values[0], right_values[0])?;
            return output.set_long(0, value);
        }
        if (left.is_repeating() && left.is_null(0)) || (right.is_repeating() && right.is_null(0)) {
            output.fill_with_nulls();
            return Ok(());
        }

        output.set_repeating(false);
        let rows = view.live_rows();
        let has_nulls = !left.no_nulls() || !right.no_nulls();
        let row_is_null = |row: usize| left.is_null(row) || right.is_null(row);
        if has_nulls {
            output.no_nulls = false;
            for row in rows.clone() {
                output.is_null[row] = row_is_null(row);
            }
        } else {
            output.mark_no_nulls();
        }

        let l = |row: usize| left_values[slot(left, row)];
        let r = |row: usize| right_values[slot(right, row)];
        let out = output.int64_values_mut()?;
        for row in rows {
            if has_nulls && row_is_null(row) {
                continue;
            }
            out[row] = self.apply(l(row), r(row))?;
        }
        Ok(())
    }

    fn output_column(&self) -> Option<usize> {
        Some(self.output_column)
    }

    fn output_type_info(&self) -> Option<&TypeInfo> {
        Some(&self.output_type_info)
    }

    fn children(&self) -> &[Box<dyn VectorExpression>] {
        &self.children
    }

    fn input_types(&self) -> Option<&[ExpressionType]> {
        Some(&self.input_types)
    }

    fn name(&self) -> &'static str {
        match (self.op, self.checked) {
            (ArithmeticOp::Add, false) => "LongColAddLongColumn",
            (ArithmeticOp::Add, true) => "LongColAddLongColumnChecked",
            (ArithmeticOp::Subtract, false) => "LongColSubtractLongColumn",
            (ArithmeticOp::Subtract, true) => "LongColSubtractLongColumnChecked",
            (ArithmeticOp::Multiply, false) => "LongColMultiplyLongColumn",
            (ArithmeticOp::Multiply, true) => "LongColMultiplyLongColumnChecked",
        }
    }

    fn parameters(&self) -> Option<String> {
        Some(format!(
            "{}, {}",
            column_param_string(self.input_types(), 0, self.left_column),
            column_param_string(self.input_types(), 1, self.right_column)
        ))
    }

    fn descriptor(&self) -> Descriptor {
        Descriptor::builder()
            .argument(ExpressionType::Long, InputKind::Column)
            .argument(ExpressionType::Long, InputKind::Column)
            .build()
    }

    fn supports_checked_execution(&self) -> bool {
        true
    }
}

impl fmt::Display for LongColumnArithmetic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expression(self, f)
    }
}

fn slot(column: &ColumnVector, row: usize) -> usize {
    if column.is_repeating() {
        0
    } else {
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::vectorized::batch::SelectionVector;
    use crate::executor::vectorized::constant::ConstantVectorExpression;
    use crate::types::Value;

    fn long_batch(left: &[Option<i64>], right: &[Option<i64>]) -> VectorizedRowBatch {
        let types = [TypeInfo::BigInt, TypeInfo::BigInt, TypeInfo::BigInt];
        let mut batch = VectorizedRowBatch::new(&types, 8).unwrap();
        batch.set_size(left.len()).unwrap();
        for (col, values) in [left, right].into_iter().enumerate() {
            let column = batch.column_mut(col).unwrap();
            for (row, v) in values.iter().enumerate() {
                match v {
                    Some(v) => column.set_long(row, *v).unwrap(),
                    None => column.set_null(row).unwrap(),
                }
            }
        }
        batch
    }

    #[test]
    fn test_add_columns() {
        let mut batch = long_batch(&[Some(1), Some(2), Some(3)], &[Some(10), Some(20), Some(30)]);
        LongColumnArithmetic::new(ArithmeticOp::Add, 0, 1, 2)
            .evaluate(&mut batch)
            .unwrap();
        let out = batch.column(2).unwrap();
        assert!(out.no_nulls());
        assert_eq!(out.value(2).unwrap(), Value::Int64(33));
    }

    #[test]
    fn test_null_propagates() {
        let mut batch = long_batch(&[Some(1), None, Some(3)], &[Some(1), Some(1), None]);
        LongColumnArithmetic::new(ArithmeticOp::Multiply, 0, 1, 2)
            .evaluate(&mut batch)
            .unwrap();
        let out = batch.column(2).unwrap();
        assert_eq!(out.value(0).unwrap(), Value::Int64(1));
        assert!(out.is_null(1));
        assert!(out.is_null(2));
    }

    #[test]
    fn test_repeating_constant_operand() {
        let mut batch = long_batch(&[Some(5), Some(6)], &[Some(0), Some(0)]);
        let constant = ConstantVectorExpression::new(1, TypeInfo::BigInt, Value::Int64(2)).unwrap();
        LongColumnArithmetic::new(ArithmeticOp::Subtract, 0, 1, 2)
            .with_children(vec![Box::new(constant)])
            .evaluate(&mut batch)
            .unwrap();
        let out = batch.column(2).unwrap();
        assert_eq!(out.value(0).unwrap(), Value::Int64(3));
        assert_eq!(out.value(1).unwrap(), Value::Int64(4));
    }

    #[test]
    fn test_repeating_null_operand_makes_repeating_null() {
        let mut batch = long_batch(&[Some(5), Some(6)], &[Some(0), Some(0)]);
        let null = ConstantVectorExpression::null(1, TypeInfo::BigInt).unwrap();
        LongColumnArithmetic::new(ArithmeticOp::Add, 0, 1, 2)
            .with_children(vec![Box::new(null)])
            .evaluate(&mut batch)
            .unwrap();
        let out = batch.column(2).unwrap();
        assert!(out.is_repeating());
        assert!(out.is_null(1));
    }

    #[test]
    fn test_unchecked_wraps() {
        let mut batch = long_batch(&[Some(i64::MAX)], &[Some(1)]);
        LongColumnArithmetic::new(ArithmeticOp::Add, 0, 1, 2)
            .evaluate(&mut batch)
            .unwrap();
        assert_eq!(
            batch.column(2).unwrap().value(0).unwrap(),
            Value::Int64(i64::MIN)
        );
    }

    #[test]
    fn test_checked_overflow_fails() {
        let mut batch = long_batch(&[Some(i64::MAX)], &[Some(1)]);
        let err = LongColumnArithmetic::new(ArithmeticOp::Add, 0, 1, 2)
            .checked()
            .evaluate(&mut batch)
            .unwrap_err();
        assert!(matches!(err, VexecError::ArithmeticOverflow { op: "+", .. }));
    }

    #[test]
    fn test_checked_skips_null_rows() {
        let mut batch = long_batch(&[Some(1), None], &[Some(1), Some(i64::MAX)]);
        batch.column_mut(0).unwrap().set_long(1, i64::MAX).unwrap();
        batch.column_mut(0).unwrap().set_null(1).unwrap();
        LongColumnArithmetic::new(ArithmeticOp::Add, 0, 1, 2)
            .checked()
            .evaluate(&mut batch)
            .unwrap();
        assert!(batch.column(2).unwrap().is_null(1));
    }

    #[test]
    fn test_only_selected_rows_written() {
        let mut batch = long_batch(&[Some(1), Some(2), Some(3)], &[Some(1), Some(1), Some(1)]);
        batch.column_mut(2).unwrap().set_long(1, -1).unwrap();
        batch
            .set_selection(SelectionVector::new(vec![0, 2]))
            .unwrap();
        LongColumnArithmetic::new(ArithmeticOp::Add, 0, 1, 2)
            .evaluate(&mut batch)
            .unwrap();
        let out = batch.column(2).unwrap();
        assert_eq!(out.value(0).unwrap(), Value::Int64(2));
        assert_eq!(out.value(1).unwrap(), Value::Int64(-1));
        assert_eq!(out.value(2).unwrap(), Value::Int64(4));
    }

    #[test]
    fn test_output_aliasing_input_is_rejected() {
        let mut batch = long_batch(&[Some(1)], &[Some(1)]);
        let err = LongColumnArithmetic::new(ArithmeticOp::Add, 0, 1, 0)
            .evaluate(&mut batch)
            .unwrap_err();
        assert!(matches!(err, VexecError::ColumnAliasing(0)));
    }

    #[test]
    fn test_explain() {
        let expr = LongColumnArithmetic::new(ArithmeticOp::Add, 0, 1, 2).checked();
        assert!(expr.supports_checked_execution());
        assert_eq!(
            expr.to_string(),
            "LongColAddLongColumnChecked(col 0:LONG, col 1:LONG) -> 2:bigint"
        );
    }
}
