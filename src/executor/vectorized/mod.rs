//! Vectorized execution module.
//!
//! Column buffers, row batches and the expression nodes that evaluate over
//! them one batch at a time.

pub mod arithmetic;
pub mod batch;
pub mod column;
pub mod constant;
pub mod expression;
pub mod filter;
pub mod identity;

pub use arithmetic::{ArithmeticOp, LongColumnArithmetic};
pub use batch::{BatchView, LiveRows, SelectionVector, VectorizedRowBatch, DEFAULT_BATCH_SIZE};
pub use column::ColumnVector;
pub use constant::{ConstantBuilder, ConstantVectorExpression};
pub use expression::{
    column_param_string, fmt_expression, Descriptor, DescriptorBuilder, InputKind, Mode,
    VectorExpression,
};
pub use filter::SelectColumnIsNotNull;
pub use identity::IdentityExpression;
