//! Error types for vectorized expression evaluation.

use thiserror::Error;

use crate::types::ColumnVectorType;

/// Result type alias using [`VexecError`].
pub type Result<T> = std::result::Result<T, VexecError>;

/// Error types for batch construction and expression evaluation.
///
/// Null values are never reported through this type; they live in the
/// column null bitmaps.
#[derive(Debug, Error)]
pub enum VexecError {
    // ==================== Evaluation Failures ====================
    /// General evaluation failure that aborts the current batch.
    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    /// Checked arithmetic overflowed.
    #[error("Arithmetic overflow: {left} {op} {right}")]
    ArithmeticOverflow {
        op: &'static str,
        left: i64,
        right: i64,
    },

    // ==================== Invariant Violations ====================
    /// Declared type and literal (or output buffer) type disagree.
    #[error("Type dispatch mismatch: expected {expected}, got {actual}")]
    TypeDispatch { expected: String, actual: String },

    /// A byte-sequence slot was written before `init_buffer`.
    #[error("Bytes buffer written at slot {0} before initialization")]
    BufferNotInitialized(usize),

    /// An expression tried to read the column it is writing.
    #[error("Column {0} is both an input and the output of the same write")]
    ColumnAliasing(usize),

    // ==================== Batch Layout Errors ====================
    /// Column index outside the batch.
    #[error("Column index {index} out of range (batch has {num_columns} columns)")]
    ColumnIndexOutOfRange { index: usize, num_columns: usize },

    /// Row index outside the buffer capacity.
    #[error("Row {row} out of range (capacity {capacity})")]
    RowOutOfRange { row: usize, capacity: usize },

    /// Selection vector is not a valid ordered subset of the batch rows.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Invalid executor configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ==================== Type Errors ====================
    /// Type has no column vector representation.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Type name could not be parsed.
    #[error("Type parse error: {0}")]
    TypeParse(String),

    /// Decimal value or literal is malformed or out of range.
    #[error("Invalid decimal: {0}")]
    InvalidDecimal(String),

    // ==================== Interchange ====================
    /// Arrow conversion failure.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl VexecError {
    /// Builds a [`VexecError::TypeDispatch`] for a buffer of the wrong type.
    pub(crate) fn buffer_mismatch(expected: ColumnVectorType, actual: ColumnVectorType) -> Self {
        VexecError::TypeDispatch {
            expected: expected.name().to_string(),
            actual: actual.name().to_string(),
        }
    }

    /// Returns true for errors that indicate a defect in tree construction
    /// rather than a data condition.
    #[must_use]
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            VexecError::TypeDispatch { .. }
                | VexecError::BufferNotInitialized(_)
                | VexecError::ColumnAliasing(_)
                | VexecError::ColumnIndexOutOfRange { .. }
        )
    }
}
