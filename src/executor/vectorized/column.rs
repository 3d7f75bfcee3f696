//! Typed column buffers with null bitmaps and repeating encoding.
//!
//! A [`ColumnVector`] holds one column of a batch. Fixed-width types are
//! pre-sized to the batch capacity; byte sequences live in a lazily
//! allocated arena addressed by per-slot `(start, length)` pairs.
//!
//! Two flags govern how slots are read:
//! - `no_nulls`: when true every slot is non-null and the null flags are not
//!   consulted.
//! - `is_repeating`: when true only slot 0 is meaningful and it stands for
//!   every live row of the batch.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BinaryArray, Decimal128Array, DurationNanosecondArray, Float64Array, Int64Array,
    TimestampNanosecondArray,
};
use chrono::NaiveDateTime;

use crate::error::{Result, VexecError};
use crate::types::{ColumnVectorType, Decimal, IntervalDayTime, TypeInfo, Value};

use super::batch::{LiveRows, SelectionVector};

/// Default per-value size estimate used to pre-size the bytes arena.
pub const DEFAULT_BYTES_ESTIMATE: usize = 16;

/// Upper bound on the bytes reserved up front for a column's arena.
pub const MAX_INITIAL_ARENA_BYTES: usize = 64 * 1024 * 1024;

/// Default precision of a decimal column created without a type descriptor.
pub const DEFAULT_DECIMAL_COLUMN_PRECISION: u8 = 38;
/// Default scale of a decimal column created without a type descriptor.
pub const DEFAULT_DECIMAL_COLUMN_SCALE: i8 = 18;

/// Arena-backed storage for byte-sequence slots.
#[derive(Debug, Clone, Default)]
struct BytesData {
    /// Backing arena, allocated by `init_buffer`.
    arena: Option<Vec<u8>>,
    start: Vec<usize>,
    length: Vec<usize>,
    estimate: usize,
}

impl BytesData {
    fn slot(&self, slot: usize) -> Option<&[u8]> {
        let start = self.start[slot];
        self.arena
            .as_deref()
            .and_then(|arena| arena.get(start..start + self.length[slot]))
    }
}

#[derive(Debug, Clone)]
enum ColumnData {
    Int64(Vec<i64>),
    Float64(Vec<f64>),
    Bytes(BytesData),
    Decimal {
        values: Vec<i128>,
        precision: u8,
        scale: i8,
    },
    Timestamp(Vec<NaiveDateTime>),
    IntervalDayTime(Vec<IntervalDayTime>),
}

impl ColumnData {
    fn column_type(&self) -> ColumnVectorType {
        match self {
            ColumnData::Int64(_) => ColumnVectorType::Int64,
            ColumnData::Float64(_) => ColumnVectorType::Float64,
            ColumnData::Bytes(_) => ColumnVectorType::Bytes,
            ColumnData::Decimal { .. } => ColumnVectorType::Decimal,
            ColumnData::Timestamp(_) => ColumnVectorType::Timestamp,
            ColumnData::IntervalDayTime(_) => ColumnVectorType::IntervalDayTime,
        }
    }
}

/// Typed columnar buffer for one column of a batch.
#[derive(Debug, Clone)]
pub struct ColumnVector {
    pub(crate) is_null: Vec<bool>,
    pub(crate) no_nulls: bool,
    pub(crate) is_repeating: bool,
    data: ColumnData,
}

impl ColumnVector {
    /// Creates a column of the given buffer type sized to `capacity` rows.
    ///
    /// Decimal columns get precision 38 and scale 18; use
    /// [`ColumnVector::new_decimal`] for other shapes.
    #[must_use]
    pub fn new(column_type: ColumnVectorType, capacity: usize) -> Self {
        let data = match column_type {
            ColumnVectorType::Int64 => ColumnData::Int64(vec![0; capacity]),
            ColumnVectorType::Float64 => ColumnData::Float64(vec![0.0; capacity]),
            ColumnVectorType::Bytes => ColumnData::Bytes(BytesData {
                arena: None,
                start: vec![0; capacity],
                length: vec![0; capacity],
                estimate: DEFAULT_BYTES_ESTIMATE,
            }),
            ColumnVectorType::Decimal => ColumnData::Decimal {
                values: vec![0; capacity],
                precision: DEFAULT_DECIMAL_COLUMN_PRECISION,
                scale: DEFAULT_DECIMAL_COLUMN_SCALE,
            },
            ColumnVectorType::Timestamp => {
                ColumnData::Timestamp(vec![NaiveDateTime::default(); capacity])
            }
            ColumnVectorType::IntervalDayTime => {
                ColumnData::IntervalDayTime(vec![IntervalDayTime::default(); capacity])
            }
        };
        ColumnVector {
            is_null: vec![false; capacity],
            no_nulls: true,
            is_repeating: false,
            data,
        }
    }

    /// Creates a decimal column with the given precision and scale.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDecimal` for an illegal precision/scale pair.
    pub fn new_decimal(capacity: usize, precision: u8, scale: i8) -> Result<Self> {
        // Validates the pair.
        Decimal::try_new(0, precision, scale)?;
        let mut column = Self::new(ColumnVectorType::Decimal, capacity);
        column.data = ColumnData::Decimal {
            values: vec![0; capacity],
            precision,
            scale,
        };
        Ok(column)
    }

    /// Creates the column a value of `type_info` is stored in.
    ///
    /// # Errors
    ///
    /// Returns an error for types without a buffer representation.
    pub fn for_type_info(type_info: &TypeInfo, capacity: usize) -> Result<Self> {
        match type_info.decimal_precision_scale() {
            Some((precision, scale)) => Self::new_decimal(capacity, precision, scale),
            None => Ok(Self::new(type_info.column_vector_type()?, capacity)),
        }
    }

    /// Sets the per-value size estimate used when the bytes arena is first
    /// allocated. No effect on other column types.
    #[must_use]
    pub fn with_bytes_estimate(mut self, estimate: usize) -> Self {
        if let ColumnData::Bytes(bytes) = &mut self.data {
            bytes.estimate = estimate.max(1);
        }
        self
    }

    #[must_use]
    pub fn column_type(&self) -> ColumnVectorType {
        self.data.column_type()
    }

    /// Number of slots in the buffer.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.is_null.len()
    }

    #[must_use]
    pub fn no_nulls(&self) -> bool {
        self.no_nulls
    }

    #[must_use]
    pub fn is_repeating(&self) -> bool {
        self.is_repeating
    }

    pub fn set_repeating(&mut self, repeating: bool) {
        self.is_repeating = repeating;
    }

    /// Raw per-slot null flags. Only authoritative when `no_nulls` is false.
    #[must_use]
    pub fn null_flags(&self) -> &[bool] {
        &self.is_null
    }

    /// Precision and scale of a decimal column.
    #[must_use]
    pub fn decimal_precision_scale(&self) -> Option<(u8, i8)> {
        match self.data {
            ColumnData::Decimal {
                precision, scale, ..
            } => Some((precision, scale)),
            _ => None,
        }
    }

    /// Returns whether logical row `row` is null, honoring the repeating and
    /// no-nulls flags.
    #[must_use]
    pub fn is_null(&self, row: usize) -> bool {
        let slot = self.slot_for(row);
        !self.no_nulls && self.is_null.get(slot).copied().unwrap_or(false)
    }

    /// Marks a slot null.
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` if `slot` is outside the buffer.
    pub fn set_null(&mut self, slot: usize) -> Result<()> {
        self.check_slot(slot)?;
        self.is_null[slot] = true;
        self.no_nulls = false;
        Ok(())
    }

    /// Prepares the bytes arena for writes, allocating it on first use and
    /// rewinding it otherwise. No effect on fixed-width columns.
    ///
    /// Rewinding invalidates every byte slot written before the call.
    pub fn init_buffer(&mut self) {
        let capacity = self.capacity();
        if let ColumnData::Bytes(bytes) = &mut self.data {
            match &mut bytes.arena {
                Some(arena) => arena.clear(),
                None => {
                    let reserve = capacity
                        .saturating_mul(bytes.estimate)
                        .min(MAX_INITIAL_ARENA_BYTES);
                    bytes.arena = Some(Vec::with_capacity(reserve));
                }
            }
        }
    }

    /// Returns whether the bytes arena has been allocated. Always true for
    /// fixed-width columns.
    #[must_use]
    pub fn is_buffer_initialized(&self) -> bool {
        match &self.data {
            ColumnData::Bytes(bytes) => bytes.arena.is_some(),
            _ => true,
        }
    }

    /// Writes an `i64` into `slot` and clears its null flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is out of range or the column is not `Int64`.
    pub fn set_long(&mut self, slot: usize, value: i64) -> Result<()> {
        self.check_slot(slot)?;
        match &mut self.data {
            ColumnData::Int64(values) => values[slot] = value,
            other => {
                return Err(VexecError::buffer_mismatch(
                    ColumnVectorType::Int64,
                    other.column_type(),
                ))
            }
        }
        self.is_null[slot] = false;
        Ok(())
    }

    /// Writes an `f64` into `slot` and clears its null flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is out of range or the column is not `Float64`.
    pub fn set_double(&mut self, slot: usize, value: f64) -> Result<()> {
        self.check_slot(slot)?;
        match &mut self.data {
            ColumnData::Float64(values) => values[slot] = value,
            other => {
                return Err(VexecError::buffer_mismatch(
                    ColumnVectorType::Float64,
                    other.column_type(),
                ))
            }
        }
        self.is_null[slot] = false;
        Ok(())
    }

    /// Copies `value` into the bytes arena and points `slot` at the copy.
    ///
    /// # Errors
    ///
    /// Returns `BufferNotInitialized` if `init_buffer` has not been called,
    /// or an error for an out-of-range slot or a non-bytes column.
    pub fn set_bytes(&mut self, slot: usize, value: &[u8]) -> Result<()> {
        self.check_slot(slot)?;
        match &mut self.data {
            ColumnData::Bytes(bytes) => {
                let arena = bytes
                    .arena
                    .as_mut()
                    .ok_or(VexecError::BufferNotInitialized(slot))?;
                bytes.start[slot] = arena.len();
                bytes.length[slot] = value.len();
                arena.extend_from_slice(value);
            }
            other => {
                return Err(VexecError::buffer_mismatch(
                    ColumnVectorType::Bytes,
                    other.column_type(),
                ))
            }
        }
        self.is_null[slot] = false;
        Ok(())
    }

    /// Writes a decimal into `slot`, converting it to the column's scale.
    ///
    /// A value that does not fit the column precision is stored as null.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is out of range or the column is not `Decimal`.
    pub fn set_decimal(&mut self, slot: usize, value: Decimal) -> Result<()> {
        self.check_slot(slot)?;
        let fitted = match &mut self.data {
            ColumnData::Decimal {
                values,
                precision,
                scale,
            } => match value.rescale(*precision, *scale) {
                Some(d) => {
                    values[slot] = d.unscaled();
                    true
                }
                None => false,
            },
            other => {
                return Err(VexecError::buffer_mismatch(
                    ColumnVectorType::Decimal,
                    other.column_type(),
                ))
            }
        };
        if fitted {
            self.is_null[slot] = false;
            Ok(())
        } else {
            self.set_null(slot)
        }
    }

    /// Writes a timestamp into `slot` and clears its null flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is out of range or the column is not `Timestamp`.
    pub fn set_timestamp(&mut self, slot: usize, value: NaiveDateTime) -> Result<()> {
        self.check_slot(slot)?;
        match &mut self.data {
            ColumnData::Timestamp(values) => values[slot] = value,
            other => {
                return Err(VexecError::buffer_mismatch(
                    ColumnVectorType::Timestamp,
                    other.column_type(),
                ))
            }
        }
        self.is_null[slot] = false;
        Ok(())
    }

    /// Writes a day-time interval into `slot` and clears its null flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the slot is out of range or the column is not
    /// `IntervalDayTime`.
    pub fn set_interval_day_time(&mut self, slot: usize, value: IntervalDayTime) -> Result<()> {
        self.check_slot(slot)?;
        match &mut self.data {
            ColumnData::IntervalDayTime(values) => values[slot] = value,
            other => {
                return Err(VexecError::buffer_mismatch(
                    ColumnVectorType::IntervalDayTime,
                    other.column_type(),
                ))
            }
        }
        self.is_null[slot] = false;
        Ok(())
    }

    /// Writes any scalar into `slot` through the matching typed setter.
    /// `Value::Null` marks the slot null.
    ///
    /// # Errors
    ///
    /// Returns `TypeDispatch` if the value kind does not match the column.
    pub fn set_value(&mut self, slot: usize, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.set_null(slot),
            Value::Int64(v) => self.set_long(slot, *v),
            Value::Float64(v) => self.set_double(slot, *v),
            Value::Bytes(v) => self.set_bytes(slot, v),
            Value::Decimal(v) => self.set_decimal(slot, *v),
            Value::Timestamp(v) => self.set_timestamp(slot, *v),
            Value::IntervalDayTime(v) => self.set_interval_day_time(slot, *v),
        }
    }

    /// Reads logical row `row`, honoring the repeating and no-nulls flags.
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` if `row` is outside the buffer.
    pub fn value(&self, row: usize) -> Result<Value> {
        self.check_slot(row)?;
        if self.is_null(row) {
            return Ok(Value::Null);
        }
        let slot = self.slot_for(row);
        let value = match &self.data {
            ColumnData::Int64(values) => Value::Int64(values[slot]),
            ColumnData::Float64(values) => Value::Float64(values[slot]),
            ColumnData::Bytes(bytes) => Value::Bytes(bytes.slot(slot).unwrap_or_default().to_vec()),
            ColumnData::Decimal {
                values,
                precision,
                scale,
            } => Value::Decimal(Decimal::try_new(values[slot], *precision, *scale)?),
            ColumnData::Timestamp(values) => Value::Timestamp(values[slot]),
            ColumnData::IntervalDayTime(values) => Value::IntervalDayTime(values[slot]),
        };
        Ok(value)
    }

    /// Borrows the bytes of logical row `row` without copying.
    ///
    /// Returns None for null rows, out-of-range rows and non-bytes columns.
    #[must_use]
    pub fn bytes_at(&self, row: usize) -> Option<&[u8]> {
        if row >= self.capacity() || self.is_null(row) {
            return None;
        }
        match &self.data {
            ColumnData::Bytes(bytes) => bytes.slot(self.slot_for(row)),
            _ => None,
        }
    }

    /// Renders logical row `row` for diagnostics: `null`, quoted text for
    /// byte sequences, the plain value otherwise.
    #[must_use]
    pub fn stringify_value(&self, row: usize) -> String {
        match self.value(row) {
            Ok(Value::Null) => "null".to_string(),
            Ok(v @ Value::Bytes(_)) => format!("\"{v}\""),
            Ok(v) => v.to_string(),
            Err(e) => format!("<{e}>"),
        }
    }

    /// Restores the column to a clean state for the next batch.
    pub fn reset(&mut self) {
        self.mark_no_nulls();
        self.is_repeating = false;
        if let ColumnData::Bytes(BytesData {
            arena: Some(arena), ..
        }) = &mut self.data
        {
            arena.clear();
        }
    }

    /// Broadcasts a single value to every row as a repeating column.
    ///
    /// # Errors
    ///
    /// Returns `TypeDispatch` if the value kind does not match the column.
    pub fn fill(&mut self, value: &Value) -> Result<()> {
        if value.is_null() {
            self.fill_with_nulls();
            return Ok(());
        }
        self.init_buffer();
        self.set_value(0, value)?;
        self.is_repeating = true;
        if self.is_null[0] {
            // Decimal that did not fit the column.
            self.no_nulls = false;
        } else {
            self.mark_no_nulls();
        }
        Ok(())
    }

    /// Makes the column a repeating null.
    pub fn fill_with_nulls(&mut self) {
        self.no_nulls = false;
        self.is_repeating = true;
        if let Some(first) = self.is_null.first_mut() {
            *first = true;
        }
    }

    /// Expands a repeating column so every live row holds slot 0's value,
    /// after which individual rows may be written.
    ///
    /// # Errors
    ///
    /// Returns `RowOutOfRange` if the selection names a row outside the
    /// buffer.
    pub fn flatten(&mut self, size: usize, selection: Option<&SelectionVector>) -> Result<()> {
        if !self.is_repeating {
            return Ok(());
        }
        let rows = bounded_rows(size, selection, self.capacity())?;
        self.is_repeating = false;
        if !self.no_nulls {
            let first_null = self.is_null[0];
            for row in rows.clone() {
                self.is_null[row] = first_null;
            }
        }
        match &mut self.data {
            ColumnData::Int64(values) => rows.for_each(|r| values[r] = values[0]),
            ColumnData::Float64(values) => rows.for_each(|r| values[r] = values[0]),
            ColumnData::Bytes(bytes) => {
                for r in rows {
                    bytes.start[r] = bytes.start[0];
                    bytes.length[r] = bytes.length[0];
                }
            }
            ColumnData::Decimal { values, .. } => rows.for_each(|r| values[r] = values[0]),
            ColumnData::Timestamp(values) => rows.for_each(|r| values[r] = values[0]),
            ColumnData::IntervalDayTime(values) => rows.for_each(|r| values[r] = values[0]),
        }
        Ok(())
    }

    /// Copies the live rows of `source` into this column, preserving its
    /// repeating and null state. Byte sequences are copied into this
    /// column's own arena.
    ///
    /// # Errors
    ///
    /// Returns `TypeDispatch` if the columns differ in type (or in decimal
    /// precision/scale), and `RowOutOfRange` if the selection names a row
    /// outside either buffer.
    pub fn copy_from(
        &mut self,
        source: &ColumnVector,
        size: usize,
        selection: Option<&SelectionVector>,
    ) -> Result<()> {
        if self.column_type() != source.column_type()
            || self.decimal_precision_scale() != source.decimal_precision_scale()
        {
            return Err(VexecError::buffer_mismatch(
                self.column_type(),
                source.column_type(),
            ));
        }
        let capacity = self.capacity().min(source.capacity());
        if source.is_repeating {
            // Slot 0 stands for every row, even in an empty batch.
            self.is_repeating = true;
            return self.copy_slots(source, LiveRows::new(capacity.min(1), None));
        }
        let rows = bounded_rows(size, selection, capacity)?;
        self.is_repeating = false;
        self.copy_slots(source, rows)
    }

    fn copy_slots(&mut self, source: &ColumnVector, rows: LiveRows<'_>) -> Result<()> {
        if source.no_nulls {
            self.mark_no_nulls();
        } else {
            self.no_nulls = false;
            for row in rows.clone() {
                self.is_null[row] = source.is_null[row];
            }
        }
        if let ColumnData::Bytes(src) = &source.data {
            self.init_buffer();
            for r in rows {
                if source.no_nulls || !source.is_null[r] {
                    self.set_bytes(r, src.slot(r).unwrap_or_default())?;
                }
            }
            return Ok(());
        }
        match (&mut self.data, &source.data) {
            (ColumnData::Int64(dst), ColumnData::Int64(src)) => rows.for_each(|r| dst[r] = src[r]),
            (ColumnData::Float64(dst), ColumnData::Float64(src)) => {
                rows.for_each(|r| dst[r] = src[r]);
            }
            (ColumnData::Decimal { values: dst, .. }, ColumnData::Decimal { values: src, .. }) => {
                rows.for_each(|r| dst[r] = src[r]);
            }
            (ColumnData::Timestamp(dst), ColumnData::Timestamp(src)) => {
                rows.for_each(|r| dst[r] = src[r]);
            }
            (ColumnData::IntervalDayTime(dst), ColumnData::IntervalDayTime(src)) => {
                rows.for_each(|r| dst[r] = src[r]);
            }
            (dst, src) => {
                return Err(VexecError::buffer_mismatch(
                    dst.column_type(),
                    src.column_type(),
                ))
            }
        }
        Ok(())
    }

    /// Materializes the live rows as an Arrow array, expanding repeating
    /// columns.
    ///
    /// Timestamps become nanosecond timestamps, day-time intervals become
    /// nanosecond durations and byte sequences become binary.
    ///
    /// # Errors
    ///
    /// Returns an error if a timestamp or interval does not fit 64-bit
    /// nanoseconds, or `RowOutOfRange` if the selection names a row outside
    /// the buffer.
    pub fn to_arrow(&self, size: usize, selection: Option<&SelectionVector>) -> Result<ArrayRef> {
        let rows = bounded_rows(size, selection, self.capacity())?;
        let present = |r: usize| !self.is_null(r);
        let slot = |r: usize| self.slot_for(r);

        let array: ArrayRef = match &self.data {
            ColumnData::Int64(values) => Arc::new(Int64Array::from(
                rows.map(|r| present(r).then(|| values[slot(r)]))
                    .collect::<Vec<_>>(),
            )),
            ColumnData::Float64(values) => Arc::new(Float64Array::from(
                rows.map(|r| present(r).then(|| values[slot(r)]))
                    .collect::<Vec<_>>(),
            )),
            ColumnData::Bytes(bytes) => Arc::new(BinaryArray::from(
                rows.map(|r| if present(r) { bytes.slot(slot(r)) } else { None })
                    .collect::<Vec<_>>(),
            )),
            ColumnData::Decimal {
                values,
                precision,
                scale,
            } => Arc::new(
                Decimal128Array::from(
                    rows.map(|r| present(r).then(|| values[slot(r)]))
                        .collect::<Vec<_>>(),
                )
                .with_precision_and_scale(*precision, *scale)?,
            ),
            ColumnData::Timestamp(values) => {
                let nanos = rows
                    .map(|r| {
                        if !present(r) {
                            return Ok(None);
                        }
                        values[slot(r)]
                            .and_utc()
                            .timestamp_nanos_opt()
                            .map(Some)
                            .ok_or_else(|| {
                                VexecError::EvaluationError(format!(
                                    "timestamp {} out of nanosecond range",
                                    values[slot(r)]
                                ))
                            })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Arc::new(TimestampNanosecondArray::from(nanos))
            }
            ColumnData::IntervalDayTime(values) => {
                let nanos = rows
                    .map(|r| {
                        if !present(r) {
                            return Ok(None);
                        }
                        values[slot(r)].total_nanos().map(Some).ok_or_else(|| {
                            VexecError::EvaluationError(format!(
                                "interval {} out of nanosecond range",
                                values[slot(r)]
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Arc::new(DurationNanosecondArray::from(nanos))
            }
        };
        Ok(array)
    }

    // ==================== Kernel access ====================

    pub(crate) fn int64_values(&self) -> Result<&[i64]> {
        match &self.data {
            ColumnData::Int64(values) => Ok(values),
            other => Err(VexecError::buffer_mismatch(
                ColumnVectorType::Int64,
                other.column_type(),
            )),
        }
    }

    pub(crate) fn int64_values_mut(&mut self) -> Result<&mut [i64]> {
        match &mut self.data {
            ColumnData::Int64(values) => Ok(values),
            other => Err(VexecError::buffer_mismatch(
                ColumnVectorType::Int64,
                other.column_type(),
            )),
        }
    }

    /// Sets `no_nulls`, clearing any stale null flags first so that no slot
    /// claims null while the flag is set.
    pub(crate) fn mark_no_nulls(&mut self) {
        if !self.no_nulls {
            self.is_null.fill(false);
        }
        self.no_nulls = true;
    }

    fn slot_for(&self, row: usize) -> usize {
        if self.is_repeating {
            0
        } else {
            row
        }
    }

    fn check_slot(&self, slot: usize) -> Result<()> {
        if slot >= self.capacity() {
            return Err(VexecError::RowOutOfRange {
                row: slot,
                capacity: self.capacity(),
            });
        }
        Ok(())
    }
}

/// Live rows clipped to `capacity`; a selection reaching past it is rejected.
fn bounded_rows(
    size: usize,
    selection: Option<&SelectionVector>,
    capacity: usize,
) -> Result<LiveRows<'_>> {
    if let Some(&row) = selection.and_then(|sel| sel.indices.iter().find(|&&r| r >= capacity)) {
        return Err(VexecError::RowOutOfRange { row, capacity });
    }
    Ok(LiveRows::new(size.min(capacity), selection))
}
