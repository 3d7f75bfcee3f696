//! Row batch: a fixed-capacity set of column vectors plus a selection vector.

use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{Field, Schema};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};

use crate::error::{Result, VexecError};
use crate::types::TypeInfo;

use super::column::ColumnVector;

/// Default batch capacity for vectorized execution (rows per batch).
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Selection vector for filtered batches.
///
/// Instead of compacting buffers after a filter, we keep the ordered list of
/// row positions that are still live.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionVector {
    /// Indices of selected rows, strictly ascending.
    pub indices: Vec<usize>,
}

impl SelectionVector {
    /// Creates a new selection vector with the given indices.
    #[must_use]
    pub fn new(indices: Vec<usize>) -> Self {
        SelectionVector { indices }
    }

    /// Creates a selection vector selecting all rows up to count.
    #[must_use]
    pub fn all(count: usize) -> Self {
        SelectionVector {
            indices: (0..count).collect(),
        }
    }

    /// Returns the number of selected rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns true if no rows are selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Returns the index at the given position.
    #[must_use]
    pub fn get(&self, pos: usize) -> Option<usize> {
        self.indices.get(pos).copied()
    }

    /// Checks that the selection is an ordered subset of `0..size`.
    fn validate(&self, size: usize) -> Result<()> {
        if self.indices.len() > size {
            return Err(VexecError::InvalidSelection(format!(
                "{} rows selected from a batch of {size}",
                self.indices.len()
            )));
        }
        if let Some(&last) = self.indices.last() {
            if last >= size {
                return Err(VexecError::InvalidSelection(format!(
                    "row {last} selected from a batch of {size}"
                )));
            }
        }
        if self.indices.windows(2).any(|w| w[0] >= w[1]) {
            return Err(VexecError::InvalidSelection(
                "indices must be strictly ascending".to_string(),
            ));
        }
        Ok(())
    }
}

/// Iterator over the live row indices of a batch.
#[derive(Debug, Clone)]
pub enum LiveRows<'a> {
    /// Every row in `0..size`.
    All(std::ops::Range<usize>),
    /// Rows listed in a selection vector.
    Selected(std::iter::Copied<std::slice::Iter<'a, usize>>),
}

impl<'a> LiveRows<'a> {
    /// Live rows for a batch of `size` rows with an optional selection.
    #[must_use]
    pub fn new(size: usize, selection: Option<&'a SelectionVector>) -> Self {
        match selection {
            Some(sel) => LiveRows::Selected(sel.indices.iter().copied()),
            None => LiveRows::All(0..size),
        }
    }
}

impl Iterator for LiveRows<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self {
            LiveRows::All(range) => range.next(),
            LiveRows::Selected(iter) => iter.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            LiveRows::All(range) => range.size_hint(),
            LiveRows::Selected(iter) => iter.size_hint(),
        }
    }
}

/// A batch of rows in columnar form.
///
/// The batch owns all of its column vectors. Columns are scratch space
/// reused across successive batches of one pipeline instance; nothing read
/// from them should be retained past the next evaluation.
#[derive(Debug, Clone)]
pub struct VectorizedRowBatch {
    columns: Vec<ColumnVector>,
    size: usize,
    selection: Option<SelectionVector>,
    capacity: usize,
}

impl VectorizedRowBatch {
    /// Creates a batch with one column per type descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if a type has no column vector representation.
    pub fn new(types: &[TypeInfo], capacity: usize) -> Result<Self> {
        let columns = types
            .iter()
            .map(|t| ColumnVector::for_type_info(t, capacity))
            .collect::<Result<Vec<_>>>()?;
        Ok(VectorizedRowBatch {
            columns,
            size: 0,
            selection: None,
            capacity,
        })
    }

    /// Creates a batch from pre-built columns.
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` if any column is smaller than `capacity`.
    pub fn with_columns(columns: Vec<ColumnVector>, capacity: usize) -> Result<Self> {
        if let Some(small) = columns.iter().find(|c| c.capacity() < capacity) {
            return Err(VexecError::RowOutOfRange {
                row: capacity,
                capacity: small.capacity(),
            });
        }
        Ok(VectorizedRowBatch {
            columns,
            size: 0,
            selection: None,
            capacity,
        })
    }

    /// Maximum number of rows the batch holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of valid rows, ignoring the selection.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Sets the number of valid rows and drops any selection.
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` if `size` exceeds the capacity.
    pub fn set_size(&mut self, size: usize) -> Result<()> {
        if size > self.capacity {
            return Err(VexecError::RowOutOfRange {
                row: size,
                capacity: self.capacity,
            });
        }
        self.size = size;
        self.selection = None;
        Ok(())
    }

    /// Returns the number of live rows.
    ///
    /// If there's a selection vector, returns the number of selected rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.selection
            .as_ref()
            .map_or(self.size, SelectionVector::len)
    }

    /// Returns the number of columns in this batch.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Returns the selection vector, if any.
    #[must_use]
    pub fn selection(&self) -> Option<&SelectionVector> {
        self.selection.as_ref()
    }

    #[must_use]
    pub fn selected_in_use(&self) -> bool {
        self.selection.is_some()
    }

    /// Installs a selection vector.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelection` unless the indices are a strictly ascending
    /// subset of `0..size`.
    pub fn set_selection(&mut self, selection: SelectionVector) -> Result<()> {
        selection.validate(self.size)?;
        self.selection = Some(selection);
        Ok(())
    }

    /// Marks every row in `0..size` live again.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Iterates the live row indices.
    #[must_use]
    pub fn live_rows(&self) -> LiveRows<'_> {
        LiveRows::new(self.size, self.selection.as_ref())
    }

    /// Returns a column by index.
    ///
    /// # Errors
    ///
    /// Returns `ColumnIndexOutOfRange` for an unknown index.
    pub fn column(&self, index: usize) -> Result<&ColumnVector> {
        let num_columns = self.columns.len();
        self.columns
            .get(index)
            .ok_or(VexecError::ColumnIndexOutOfRange { index, num_columns })
    }

    /// Returns a column by index for writing.
    ///
    /// # Errors
    ///
    /// Returns `ColumnIndexOutOfRange` for an unknown index.
    pub fn column_mut(&mut self, index: usize) -> Result<&mut ColumnVector> {
        let num_columns = self.columns.len();
        self.columns
            .get_mut(index)
            .ok_or(VexecError::ColumnIndexOutOfRange { index, num_columns })
    }

    /// Splits the batch into a read-only view of every other column and a
    /// mutable handle on the `output` column.
    ///
    /// # Errors
    ///
    /// Returns `ColumnIndexOutOfRange` for an unknown output index.
    pub fn split_output(&mut self, output: usize) -> Result<(BatchView<'_>, &mut ColumnVector)> {
        let num_columns = self.columns.len();
        if output >= num_columns {
            return Err(VexecError::ColumnIndexOutOfRange {
                index: output,
                num_columns,
            });
        }
        let (before, rest) = self.columns.split_at_mut(output);
        let (out, after) = rest
            .split_first_mut()
            .ok_or(VexecError::ColumnIndexOutOfRange {
                index: output,
                num_columns,
            })?;
        let view = BatchView {
            before,
            after,
            output,
            size: self.size,
            selection: self.selection.as_ref(),
        };
        Ok((view, out))
    }

    /// Resets every column, the size and the selection for reuse.
    pub fn reset(&mut self) {
        for column in &mut self.columns {
            column.reset();
        }
        self.size = 0;
        self.selection = None;
    }

    /// Materializes the live rows of the given columns into an Arrow
    /// RecordBatch, one field per `(name, column index)` pair.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown columns or failed conversions.
    pub fn materialize(&self, projection: &[(&str, usize)]) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(projection.len());
        let mut arrays = Vec::with_capacity(projection.len());
        for (name, index) in projection {
            let array = self
                .column(*index)?
                .to_arrow(self.size, self.selection.as_ref())?;
            fields.push(Field::new(*name, array.data_type().clone(), true));
            arrays.push(array);
        }
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows()));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &options,
        )?)
    }
}

impl fmt::Display for VectorizedRowBatch {
    /// Dumps the live rows, one bracketed row per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.live_rows() {
            let values: Vec<String> = self
                .columns
                .iter()
                .map(|c| c.stringify_value(row))
                .collect();
            writeln!(f, "[{}]", values.join(", "))?;
        }
        Ok(())
    }
}

/// Read-only view of a batch's columns, excluding the column being written.
#[derive(Debug)]
pub struct BatchView<'a> {
    before: &'a [ColumnVector],
    after: &'a [ColumnVector],
    output: usize,
    size: usize,
    selection: Option<&'a SelectionVector>,
}

impl<'a> BatchView<'a> {
    /// Returns an input column.
    ///
    /// # Errors
    ///
    /// Returns `ColumnAliasing` when asked for the output column, or
    /// `ColumnIndexOutOfRange` for an unknown index.
    pub fn column(&self, index: usize) -> Result<&'a ColumnVector> {
        let (before, after): (&'a [ColumnVector], &'a [ColumnVector]) = (self.before, self.after);
        let num_columns = before.len() + 1 + after.len();
        match index.cmp(&self.output) {
            std::cmp::Ordering::Less => Ok(&before[index]),
            std::cmp::Ordering::Equal => Err(VexecError::ColumnAliasing(index)),
            std::cmp::Ordering::Greater => after
                .get(index - self.output - 1)
                .ok_or(VexecError::ColumnIndexOutOfRange { index, num_columns }),
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn selection(&self) -> Option<&'a SelectionVector> {
        self.selection
    }

    #[must_use]
    pub fn live_rows(&self) -> LiveRows<'a> {
        LiveRows::new(self.size, self.selection)
    }
}
