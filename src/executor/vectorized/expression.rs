//! The vectorized expression contract.
//!
//! Every node evaluates its children first (post-order), then writes its own
//! result into its output column of the shared batch. Nodes never hold state
//! across batches, so one tree can be evaluated by several pipeline
//! instances at once as long as each has its own batch.

use std::fmt;

use crate::error::Result;
use crate::types::{ExpressionType, TypeInfo};

use super::batch::VectorizedRowBatch;

/// An expression evaluated one batch at a time.
pub trait VectorExpression: fmt::Debug + Send + Sync {
    /// Evaluates the children, then writes this node's result into its
    /// output column.
    ///
    /// # Errors
    ///
    /// Returns an error when the batch cannot be evaluated (checked
    /// arithmetic overflow, or a type mismatch between the node and the
    /// batch). The rest of the batch must then be discarded.
    fn evaluate(&self, batch: &mut VectorizedRowBatch) -> Result<()>;

    /// Index of the column this node writes, or None for nodes without a
    /// column output (filters).
    fn output_column(&self) -> Option<usize>;

    /// Semantic type of the output column.
    fn output_type_info(&self) -> Option<&TypeInfo>;

    /// Child expressions, evaluated in order before this node.
    fn children(&self) -> &[Box<dyn VectorExpression>] {
        &[]
    }

    /// Refined per-argument input types, if the builder supplied them.
    fn input_types(&self) -> Option<&[ExpressionType]> {
        None
    }

    /// Short node name used in plan explain output.
    fn name(&self) -> &'static str;

    /// Human-readable rendering of the node's own parameters.
    fn parameters(&self) -> Option<String> {
        None
    }

    /// Describes the node's mode and argument shape.
    fn descriptor(&self) -> Descriptor;

    /// Whether this node has an overflow-checked variant.
    fn supports_checked_execution(&self) -> bool {
        false
    }

    /// Identity nodes render only their parameters in explain output.
    fn is_identity(&self) -> bool {
        false
    }

    /// Evaluates every child in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Propagates the first child failure unchanged.
    fn evaluate_children(&self, batch: &mut VectorizedRowBatch) -> Result<()> {
        for child in self.children() {
            child.evaluate(batch)?;
        }
        Ok(())
    }
}

impl fmt::Display for dyn VectorExpression + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_expression(self, f)
    }
}

/// Writes the explain rendering of an expression tree.
///
/// Format: `Name(params)(children: c1, c2) -> col:type`; identity nodes
/// render only their parameters.
///
/// # Errors
///
/// Propagates formatter errors.
pub fn fmt_expression(expr: &dyn VectorExpression, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if expr.is_identity() {
        return f.write_str(expr.parameters().as_deref().unwrap_or(""));
    }

    f.write_str(expr.name())?;
    if let Some(params) = expr.parameters() {
        write!(f, "({params})")?;
    }
    let children = expr.children();
    if !children.is_empty() {
        f.write_str("(children: ")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            fmt_expression(child.as_ref(), f)?;
        }
        f.write_str(")")?;
    }
    if let Some(column) = expr.output_column() {
        write!(f, " -> {column}")?;
        match expr.output_type_info() {
            Some(type_info) => write!(f, ":{type_info}")?,
            None => f.write_str(":null")?,
        }
    }
    Ok(())
}

/// Renders an input column as `col N:<type>`.
#[must_use]
pub fn column_param_string(
    input_types: Option<&[ExpressionType]>,
    type_num: usize,
    column: usize,
) -> String {
    let type_name = match input_types {
        None => "<input types is null>".to_string(),
        Some(types) => types
            .get(type_num)
            .map_or_else(|| "<input type missing>".to_string(), ToString::to_string),
    };
    format!("col {column}:{type_name}")
}

/// Whether an expression produces a column or filters the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Projection,
    Filter,
}

/// How an argument reaches the expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Column,
    Scalar,
    NullScalar,
}

/// Shape of an expression: its mode and each argument's type and kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    mode: Mode,
    arguments: Vec<(ExpressionType, InputKind)>,
}

impl Descriptor {
    #[must_use]
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder::default()
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[must_use]
    pub fn num_arguments(&self) -> usize {
        self.arguments.len()
    }

    #[must_use]
    pub fn arguments(&self) -> &[(ExpressionType, InputKind)] {
        &self.arguments
    }
}

/// Builder for [`Descriptor`]. Defaults to a projection with no arguments.
#[derive(Debug, Default)]
pub struct DescriptorBuilder {
    mode: Option<Mode>,
    arguments: Vec<(ExpressionType, InputKind)>,
}

impl DescriptorBuilder {
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn argument(mut self, arg_type: ExpressionType, kind: InputKind) -> Self {
        self.arguments.push((arg_type, kind));
        self
    }

    #[must_use]
    pub fn build(self) -> Descriptor {
        Descriptor {
            mode: self.mode.unwrap_or(Mode::Projection),
            arguments: self.arguments,
        }
    }
}
