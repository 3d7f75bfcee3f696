//! Executor module for batch evaluation.
//!
//! Holds the executor configuration and the [`BatchPipeline`], which runs a
//! list of vectorized expressions over row batches. Partitions are evaluated
//! in parallel, each batch owned by exactly one worker.

pub mod vectorized;

use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{Result, VexecError};
use crate::types::TypeInfo;

use self::vectorized::column::{ColumnVector, DEFAULT_BYTES_ESTIMATE, MAX_INITIAL_ARENA_BYTES};
use self::vectorized::{VectorExpression, VectorizedRowBatch, DEFAULT_BATCH_SIZE};

/// Configuration for the batch executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Number of rows per batch.
    pub batch_size: usize,
    /// Number of partitions evaluated in parallel.
    pub partitions: usize,
    /// Expected bytes per value when sizing byte-sequence arenas.
    pub bytes_buffer_estimate: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            partitions: 1,
            bytes_buffer_estimate: DEFAULT_BYTES_ESTIMATE,
        }
    }
}

impl ExecutorConfig {
    /// Creates a new executor configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the number of partitions.
    #[must_use]
    pub fn with_partitions(mut self, partitions: usize) -> Self {
        self.partitions = partitions;
        self
    }

    /// Sets the per-value byte estimate for byte-sequence columns.
    #[must_use]
    pub fn with_bytes_buffer_estimate(mut self, estimate: usize) -> Self {
        self.bytes_buffer_estimate = estimate;
        self
    }

    /// Checks the configuration for values the executor cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the batch size or partition count is zero,
    /// or if a full batch of byte values at the configured estimate would
    /// exceed [`MAX_INITIAL_ARENA_BYTES`].
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(VexecError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }
        if self.partitions == 0 {
            return Err(VexecError::InvalidConfig(
                "partitions must be greater than 0".into(),
            ));
        }
        match self.batch_size.checked_mul(self.bytes_buffer_estimate) {
            Some(bytes) if bytes <= MAX_INITIAL_ARENA_BYTES => Ok(()),
            _ => Err(VexecError::InvalidConfig(format!(
                "bytes_buffer_estimate {} too large for batch_size {} (arena limit {MAX_INITIAL_ARENA_BYTES} bytes)",
                self.bytes_buffer_estimate, self.batch_size
            ))),
        }
    }
}

/// An ordered list of expressions evaluated against each batch.
///
/// The expression trees are shared and read-only; batches are not. Each
/// partition needs its own batch, created with [`BatchPipeline::create_batch`].
#[derive(Debug, Clone)]
pub struct BatchPipeline {
    config: ExecutorConfig,
    column_types: Vec<TypeInfo>,
    expressions: Vec<Arc<dyn VectorExpression>>,
}

impl BatchPipeline {
    /// Creates a pipeline over batches laid out as `column_types` (input
    /// columns followed by scratch columns).
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or a column type has
    /// no buffer representation.
    pub fn new(
        config: ExecutorConfig,
        column_types: Vec<TypeInfo>,
        expressions: Vec<Arc<dyn VectorExpression>>,
    ) -> Result<Self> {
        config.validate()?;
        for type_info in &column_types {
            type_info.column_vector_type()?;
        }
        let pipeline = Self {
            config,
            column_types,
            expressions,
        };
        debug!(
            columns = pipeline.column_types.len(),
            expressions = pipeline.expressions.len(),
            batch_size = pipeline.config.batch_size,
            plan = %pipeline.explain(),
            "built batch pipeline"
        );
        Ok(pipeline)
    }

    /// Returns the executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    #[must_use]
    pub fn column_types(&self) -> &[TypeInfo] {
        &self.column_types
    }

    #[must_use]
    pub fn expressions(&self) -> &[Arc<dyn VectorExpression>] {
        &self.expressions
    }

    /// Allocates an empty batch with the pipeline's column layout.
    ///
    /// # Errors
    ///
    /// Returns an error if a column cannot be allocated for its type.
    pub fn create_batch(&self) -> Result<VectorizedRowBatch> {
        let capacity = self.config.batch_size;
        let columns = self
            .column_types
            .iter()
            .map(|type_info| {
                ColumnVector::for_type_info(type_info, capacity)
                    .map(|c| c.with_bytes_estimate(self.config.bytes_buffer_estimate))
            })
            .collect::<Result<Vec<_>>>()?;
        VectorizedRowBatch::with_columns(columns, capacity)
    }

    /// Allocates one batch per configured partition.
    ///
    /// # Errors
    ///
    /// Returns an error if a batch cannot be allocated.
    pub fn create_partition_batches(&self) -> Result<Vec<VectorizedRowBatch>> {
        (0..self.config.partitions)
            .map(|_| self.create_batch())
            .collect()
    }

    /// Evaluates every expression, in order, against one batch.
    ///
    /// # Errors
    ///
    /// Returns the first expression failure unchanged; the batch contents
    /// are then unspecified and must be discarded.
    pub fn evaluate(&self, batch: &mut VectorizedRowBatch) -> Result<()> {
        trace!(
            rows = batch.size(),
            selected_in_use = batch.selected_in_use(),
            "evaluating batch"
        );
        for expr in &self.expressions {
            if let Err(e) = expr.evaluate(batch) {
                warn!(expression = %expr.as_ref(), error = %e, "batch evaluation failed");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Evaluates independent partition batches in parallel.
    ///
    /// Every batch is evaluated; if any fail, the failure of the lowest
    /// partition index is returned.
    ///
    /// # Errors
    ///
    /// Returns the first failing partition's error.
    pub fn evaluate_partitions(&self, batches: &mut [VectorizedRowBatch]) -> Result<()> {
        let results: Vec<Result<()>> = batches
            .par_iter_mut()
            .map(|batch| self.evaluate(batch))
            .collect();
        results.into_iter().collect()
    }

    /// One explain line per expression.
    #[must_use]
    pub fn explain(&self) -> String {
        self.expressions
            .iter()
            .map(|expr| expr.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
