//! Column pass-through.

use std::fmt;

use crate::error::Result;
use crate::types::{ExpressionType, TypeInfo};

use super::batch::VectorizedRowBatch;
use super::expression::{
    column_param_string, fmt_expression, Descriptor, InputKind, VectorExpression,
};

/// Passes an input column through, copying it when the output column
/// differs from the input.
#[derive(Debug)]
pub struct IdentityExpression {
    input_column: usize,
    output_column: usize,
    output_type_info: TypeInfo,
    input_types: [ExpressionType; 1],
    children: Vec<Box<dyn VectorExpression>>,
}

impl IdentityExpression {
    /// An identity that reads and "writes" the same column.
    #[must_use]
    pub fn new(column: usize, type_info: TypeInfo) -> Self {
        Self::with_output(column, column, type_info)
    }

    /// An identity that copies `input_column` into `output_column`.
    #[must_use]
    pub fn with_output(input_column: usize, output_column: usize, type_info: TypeInfo) -> Self {
        Self {
            input_column,
            output_column,
            output_type_info: type_info,
            input_types: [type_info.expression_type()],
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_child(mut self, child: Box<dyn VectorExpression>) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn input_column(&self) -> usize {
        self.input_column
    }
}

impl VectorExpression for IdentityExpression {
    fn evaluate(&self, batch: &mut VectorizedRowBatch) -> Result<()> {
        self.evaluate_children(batch)?;
        if self.input_column == self.output_column {
            return Ok(());
        }
        let (view, output) = batch.split_output(self.output_column)?;
        let input = view.column(self.input_column)?;
        output.copy_from(input, view.size(), view.selection())
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
        "IdentityExpression"
    }

    fn parameters(&self) -> Option<String> {
        Some(column_param_string(
            self.input_types(),
            0,
            self.input_column,
        ))
    }

    fn descriptor(&self) -> Descriptor {
        Descriptor::builder()
            .argument(ExpressionType::Other, InputKind::Column)
            .build()
    }

    fn is_identity(&self) -> bool {
        true
    }
}

impl fmt::Display for IdentityExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expression(self, f)
    }
}
