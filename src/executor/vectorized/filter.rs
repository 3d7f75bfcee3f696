//! Filter expressions narrow the batch selection instead of writing a column.

use std::fmt;

use crate::error::Result;
use crate::types::{ExpressionType, TypeInfo};

use super::batch::{SelectionVector, VectorizedRowBatch};
use super::expression::{
    column_param_string, fmt_expression, Descriptor, InputKind, Mode, VectorExpression,
};

/// Keeps only the live rows where `column` is not null.
#[derive(Debug)]
pub struct SelectColumnIsNotNull {
    column: usize,
    input_types: Option<[ExpressionType; 1]>,
    children: Vec<Box<dyn VectorExpression>>,
}

impl SelectColumnIsNotNull {
    #[must_use]
    pub fn new(column: usize) -> Self {
        Self {
            column,
            input_types: None,
            children: Vec::new(),
        }
    }

    /// Records the refined input type for explain output.
    #[must_use]
    pub fn with_input_type(mut self, input_type: ExpressionType) -> Self {
        self.input_types = Some([input_type]);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Box<dyn VectorExpression>) -> Self {
        self.children.push(child);
        self
    }
}

impl VectorExpression for SelectColumnIsNotNull {
    fn evaluate(&self, batch: &mut VectorizedRowBatch) -> Result<()> {
        self.evaluate_children(batch)?;

        let column = batch.column(self.column)?;
        if column.no_nulls() {
            return Ok(());
        }
        let kept: Vec<usize> = if column.is_repeating() {
            if column.is_null(0) {
                Vec::new()
            } else {
                return Ok(());
            }
        } else {
            batch.live_rows().filter(|&row| !column.is_null(row)).collect()
        };
        if kept.len() == batch.num_rows() {
            return Ok(());
        }
        batch.set_selection(SelectionVector::new(kept))
    }

    fn output_column(&self) -> Option<usize> {
        None
    }

    fn output_type_info(&self) -> Option<&TypeInfo> {
        None
    }

    fn children(&self) -> &[Box<dyn VectorExpression>] {
        &self.children
    }

    fn input_types(&self) -> Option<&[ExpressionType]> {
        self.input_types.as_ref().map(|types| types.as_slice())
    }

    fn name(&self) -> &'static str {
        "SelectColumnIsNotNull"
    }

    fn parameters(&self) -> Option<String> {
        Some(column_param_string(self.input_types(), 0, self.column))
    }

    fn descriptor(&self) -> Descriptor {
        Descriptor::builder()
            .mode(Mode::Filter)
            .argument(ExpressionType::Other, InputKind::Column)
            .build()
    }
}

impl fmt::Display for SelectColumnIsNotNull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expression(self, f)
    }
}
