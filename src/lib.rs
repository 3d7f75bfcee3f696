//! vexec - vectorized expression evaluation
//!
//! Expressions are evaluated a batch of rows at a time over typed column
//! buffers. Each batch carries per-column null flags, a repeating flag that
//! lets one slot stand for every row, and an optional selection vector of
//! live rows.
//!
//! ```
//! use vexec::{ConstantVectorExpression, TypeInfo, Value, VectorExpression, VectorizedRowBatch};
//!
//! let mut batch = VectorizedRowBatch::new(&[TypeInfo::BigInt], 1024)?;
//! batch.set_size(5)?;
//!
//! let expr = ConstantVectorExpression::builder(0, TypeInfo::BigInt).long(42).build()?;
//! expr.evaluate(&mut batch)?;
//!
//! let column = batch.column(0)?;
//! assert!(column.is_repeating());
//! assert_eq!(column.value(4)?, Value::Int64(42));
//! # Ok::<(), vexec::VexecError>(())
//! ```

pub mod error;
pub mod executor;
pub mod types;

pub use error::{Result, VexecError};
pub use executor::vectorized::{
    ArithmeticOp, ColumnVector, ConstantBuilder, ConstantVectorExpression, Descriptor,
    IdentityExpression, InputKind, LongColumnArithmetic, Mode, SelectColumnIsNotNull,
    SelectionVector, VectorExpression, VectorizedRowBatch, DEFAULT_BATCH_SIZE,
};
pub use executor::{BatchPipeline, ExecutorConfig};
pub use types::{
    ColumnVectorType, Decimal, ExpressionType, IntervalDayTime, TypeInfo, Value,
};
