//! In-memory table passed between pipeline stages.
//!
//! A `Table` is a single Arrow record batch with a logical name. Every
//! transform takes tables by reference and returns a new one.

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::concat_batches;
use arrow::datatypes::{Field, FieldRef, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;

use crate::error::{PipelineError, Result};

/// A named, fully materialised table
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    batch: RecordBatch,
}

impl Table {
    /// Wrap a record batch
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }

    /// Concatenate batches that share a schema into one table
    pub fn from_batches(
        name: impl Into<String>,
        schema: SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<Self> {
        let batch = concat_batches(&schema, batches)?;
        Ok(Self::new(name, batch))
    }

    /// Build a table from named columns
    pub fn from_columns(name: impl Into<String>, columns: Vec<(FieldRef, ArrayRef)>) -> Result<Self> {
        let (fields, arrays): (Vec<FieldRef>, Vec<ArrayRef>) = columns.into_iter().unzip();
        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema, arrays)?;
        Ok(Self::new(name, batch))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    #[must_use]
    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// Column names in schema order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    /// Look up a column by name
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// Look up a column that must exist
    pub fn require_column(&self, name: &str) -> Result<&ArrayRef> {
        self.column(name).ok_or_else(|| {
            PipelineError::Schema(format!(
                "Column '{name}' not found in {} table",
                self.name
            ))
        })
    }

    /// Return a copy with one column renamed; unknown names are ignored
    pub fn rename_column(&self, from: &str, to: &str) -> Result<Self> {
        self.rename_columns(&[(from, to)])
    }

    /// Return a copy with several columns renamed; unknown names are ignored
    pub fn rename_columns(&self, renames: &[(&str, &str)]) -> Result<Self> {
        let schema = self.batch.schema();
        let fields: Vec<FieldRef> = schema
            .fields()
            .iter()
            .map(|field| {
                match renames.iter().find(|(from, _)| field.name() == from) {
                    Some((_, to)) => Arc::new(field.as_ref().clone().with_name(*to)),
                    None => Arc::clone(field),
                }
            })
            .collect();

        let renamed = Schema::new_with_metadata(fields, schema.metadata().clone());
        let batch = RecordBatch::try_new(Arc::new(renamed), self.batch.columns().to_vec())?;
        Ok(Self::new(self.name.clone(), batch))
    }

    /// Return a copy with `name` set to `array`
    ///
    /// An existing column keeps its position; a new one is appended.
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Self> {
        let schema = self.batch.schema();
        let new_field = Arc::new(Field::new(name, array.data_type().clone(), true));

        let mut fields: Vec<FieldRef> = schema.fields().iter().cloned().collect();
        let mut columns = self.batch.columns().to_vec();

        if let Ok(idx) = schema.index_of(name) {
            fields[idx] = new_field;
            columns[idx] = array;
        } else {
            fields.push(new_field);
            columns.push(array);
        }

        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?;
        Ok(Self::new(self.name.clone(), batch))
    }

    /// Return a copy holding only the named columns, in the given order
    ///
    /// Names that do not exist are skipped.
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let schema = self.batch.schema();
        let indices: Vec<usize> = names
            .iter()
            .filter_map(|name| schema.index_of(name).ok())
            .collect();
        let batch = self.batch.project(&indices)?;
        Ok(Self::new(self.name.clone(), batch))
    }

    /// Return the same data under a different logical name
    #[must_use]
    pub fn renamed(self, name: impl Into<String>) -> Self {
        Self::new(name, self.batch)
    }
}
