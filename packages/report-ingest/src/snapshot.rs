//! Parquet snapshots of report datasets.
//!
//! A snapshot is one Parquet file holding every record of one dataset. Column
//! order is the union of record columns in first-seen order; each column gets
//! the narrowest Arrow type that holds every non-null value, falling back to
//! text for mixed columns. The capture-date column is always written as
//! `DATE` when its values parse as dates.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Date32Array, Date64Array, Float64Array, Int64Array,
    LargeStringArray, StringArray,
};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::NaiveDate;
use indexmap::IndexMap;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;

use crate::error::SnapshotError;
use crate::types::{FieldValue, ReportRecord, CAPTURE_DATE_COLUMN};

type Result<T> = std::result::Result<T, SnapshotError>;

/// Columns pandas adds for a non-default index.
const INDEX_COLUMN_PREFIX: &str = "__index_level_";

// ============================================================================
// Encoding
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Integer,
    Float,
    Bool,
    Date,
}

impl ColumnKind {
    fn data_type(&self) -> DataType {
        match self {
            ColumnKind::Text => DataType::Utf8,
            ColumnKind::Integer => DataType::Int64,
            ColumnKind::Float => DataType::Float64,
            ColumnKind::Bool => DataType::Boolean,
            ColumnKind::Date => DataType::Date32,
        }
    }
}

fn value_kind(value: &FieldValue) -> Option<ColumnKind> {
    match value {
        FieldValue::Null => None,
        FieldValue::Text(_) => Some(ColumnKind::Text),
        FieldValue::Integer(_) => Some(ColumnKind::Integer),
        FieldValue::Float(_) => Some(ColumnKind::Float),
        FieldValue::Bool(_) => Some(ColumnKind::Bool),
        FieldValue::Date(_) => Some(ColumnKind::Date),
    }
}

fn infer_kind<'a>(column: &str, values: impl Iterator<Item = Option<&'a FieldValue>> + Clone) -> ColumnKind {
    let present = values.clone().flatten().filter(|v| !v.is_null());

    if column == CAPTURE_DATE_COLUMN && present.clone().all(|v| v.as_date().is_some()) {
        return ColumnKind::Date;
    }

    let mut kinds = present.filter_map(value_kind);
    let Some(first) = kinds.next() else {
        return ColumnKind::Text;
    };

    let mut kind = first;
    for next in kinds {
        kind = match (kind, next) {
            (a, b) if a == b => a,
            (ColumnKind::Integer, ColumnKind::Float) | (ColumnKind::Float, ColumnKind::Integer) => {
                ColumnKind::Float
            }
            _ => return ColumnKind::Text,
        };
    }
    kind
}

fn build_array<'a>(kind: ColumnKind, values: impl Iterator<Item = Option<&'a FieldValue>>) -> ArrayRef {
    let values = values.map(|v| v.filter(|v| !v.is_null()));

    match kind {
        ColumnKind::Text => Arc::new(
            values
                .map(|v| v.map(ToString::to_string))
                .collect::<StringArray>(),
        ),
        ColumnKind::Integer => Arc::new(
            values
                .map(|v| match v {
                    Some(FieldValue::Integer(i)) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        ColumnKind::Float => Arc::new(
            values
                .map(|v| match v {
                    Some(FieldValue::Float(x)) => Some(*x),
                    Some(FieldValue::Integer(i)) => Some(*i as f64),
                    _ => None,
                })
                .collect::<Float64Array>(),
        ),
        ColumnKind::Bool => Arc::new(
            values
                .map(|v| match v {
                    Some(FieldValue::Bool(b)) => Some(*b),
                    _ => None,
                })
                .collect::<BooleanArray>(),
        ),
        ColumnKind::Date => Arc::new(
            values
                .map(|v| v.and_then(FieldValue::as_date).map(days_since_epoch))
                .collect::<Date32Array>(),
        ),
    }
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("report-ingest".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Encode records as a single-batch Parquet file.
pub fn encode(records: &[ReportRecord]) -> Result<Bytes> {
    let mut columns: Vec<&str> = Vec::new();
    for record in records {
        for column in record.columns() {
            if !columns.contains(&column) {
                columns.push(column);
            }
        }
    }
    if columns.is_empty() {
        columns.push(CAPTURE_DATE_COLUMN);
    }

    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());
    for column in &columns {
        let values = records.iter().map(|r| r.get(column));
        let kind = infer_kind(column, values.clone());
        fields.push(Field::new(*column, kind.data_type(), true));
        arrays.push(build_array(kind, values));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), arrays)?;

    let mut cursor = Cursor::new(Vec::<u8>::new());
    let mut writer = ArrowWriter::try_new(&mut cursor, schema, Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(Bytes::from(cursor.into_inner()))
}

// ============================================================================
// Decoding
// ============================================================================

fn read_batches(bytes: &Bytes) -> Result<Vec<RecordBatch>> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(bytes.clone())?.build()?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

fn downcast<'a, T: 'static>(array: &'a ArrayRef, name: &str) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| SnapshotError::UnsupportedColumn {
            name: name.to_string(),
            data_type: array.data_type().to_string(),
        })
}

fn collect_values<A: Array>(array: &A, value: impl Fn(&A, usize) -> FieldValue) -> Vec<FieldValue> {
    (0..array.len())
        .map(|i| if array.is_null(i) { FieldValue::Null } else { value(array, i) })
        .collect()
}

/// Convert one Arrow column to record values.
fn column_values(name: &str, array: &ArrayRef) -> Result<Vec<FieldValue>> {
    let values = match array.data_type() {
        DataType::Null => vec![FieldValue::Null; array.len()],
        DataType::Utf8 => collect_values(downcast::<StringArray>(array, name)?, |a, i| {
            FieldValue::Text(a.value(i).to_string())
        }),
        DataType::LargeUtf8 => collect_values(downcast::<LargeStringArray>(array, name)?, |a, i| {
            FieldValue::Text(a.value(i).to_string())
        }),
        DataType::Boolean => {
            collect_values(downcast::<BooleanArray>(array, name)?, |a, i| FieldValue::Bool(a.value(i)))
        }
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => {
            let widened = cast(array, &DataType::Int64)?;
            collect_values(downcast::<Int64Array>(&widened, name)?, |a, i| FieldValue::Integer(a.value(i)))
        }
        DataType::UInt64 | DataType::Float16 | DataType::Float32 | DataType::Float64 => {
            let widened = cast(array, &DataType::Float64)?;
            collect_values(downcast::<Float64Array>(&widened, name)?, |a, i| FieldValue::Float(a.value(i)))
        }
        DataType::Date32 => collect_values(downcast::<Date32Array>(array, name)?, |a, i| {
            a.value_as_date(i).map(FieldValue::Date).unwrap_or(FieldValue::Null)
        }),
        DataType::Date64 => collect_values(downcast::<Date64Array>(array, name)?, |a, i| {
            a.value_as_date(i).map(FieldValue::Date).unwrap_or(FieldValue::Null)
        }),
        _ => {
            let text = cast(array, &DataType::Utf8).map_err(|_| SnapshotError::UnsupportedColumn {
                name: name.to_string(),
                data_type: array.data_type().to_string(),
            })?;
            collect_values(downcast::<StringArray>(&text, name)?, |a, i| {
                FieldValue::Text(a.value(i).to_string())
            })
        }
    };
    Ok(values)
}

/// Decode a snapshot into records tagged with `report_type`.
///
/// Text capture dates written by older tooling are upgraded to dates.
pub fn decode(bytes: &Bytes, report_type: &str) -> Result<Vec<ReportRecord>> {
    let mut records = Vec::new();

    for batch in read_batches(bytes)? {
        let schema = batch.schema();
        let mut columns: Vec<(&str, Vec<FieldValue>)> = Vec::with_capacity(batch.num_columns());

        for (field, array) in schema.fields().iter().zip(batch.columns()) {
            let name = field.name().as_str();
            if name.starts_with(INDEX_COLUMN_PREFIX) {
                continue;
            }
            columns.push((name, column_values(name, array)?));
        }

        for row in 0..batch.num_rows() {
            let mut fields = IndexMap::with_capacity(columns.len());
            for (name, values) in &columns {
                let mut value = values[row].clone();
                if *name == CAPTURE_DATE_COLUMN {
                    if let Some(date) = value.as_date() {
                        value = FieldValue::Date(date);
                    }
                }
                fields.insert(name.to_string(), value);
            }
            records.push(ReportRecord {
                report_type: report_type.to_string(),
                fields,
            });
        }
    }

    Ok(records)
}
