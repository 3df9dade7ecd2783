//! Column and row descriptors
//!
//! Descriptors are produced by the statement layer when a query is prepared
//! and stay fixed for the statement's lifetime.

use std::sync::Arc;

use crate::constants::{charset, sql_type, DB_KEY_COLUMN_NAME, DB_KEY_LENGTH};
use crate::row::RowValue;

/// Metadata for a projected column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// 0-based position in the row (assigned by [`RowDescriptorBuilder`])
    pub position: usize,
    /// SQL type code (see [`sql_type`])
    pub sql_type: i32,
    /// Sub type; the character set id for text columns
    pub sub_type: i32,
    /// Scale (for exact numerics)
    pub scale: i32,
    /// Length in bytes
    pub length: i32,
    /// Column label as seen by the caller
    pub field_name: String,
    /// Underlying column name, `None` for computed columns
    pub original_name: Option<String>,
    /// Underlying table name, `None` for computed columns
    pub original_table_name: Option<String>,
    /// Table alias used in the query
    pub table_alias: Option<String>,
    /// Whether NULL values are allowed
    pub nullable: bool,
}

impl FieldDescriptor {
    /// Create a new field with minimal info
    pub fn new(field_name: impl Into<String>, sql_type: i32) -> Self {
        Self {
            position: 0,
            sql_type,
            sub_type: 0,
            scale: 0,
            length: 0,
            field_name: field_name.into(),
            original_name: None,
            original_table_name: None,
            table_alias: None,
            nullable: true,
        }
    }

    /// Create a field backed by a table column
    pub fn column(
        table: impl Into<String>,
        column: impl Into<String>,
        sql_type: i32,
    ) -> Self {
        let column = column.into();
        Self::new(column.clone(), sql_type)
            .with_original_name(column)
            .with_original_table_name(table)
    }

    /// Create the row-identity pseudo column of `table`
    pub fn db_key(table: impl Into<String>) -> Self {
        Self::column(table, DB_KEY_COLUMN_NAME, sql_type::SQL_TEXT)
            .with_sub_type(charset::OCTETS)
            .with_length(DB_KEY_LENGTH)
            .with_nullable(false)
    }

    /// Set the sub type
    pub fn with_sub_type(mut self, sub_type: i32) -> Self {
        self.sub_type = sub_type;
        self
    }

    /// Set the scale
    pub fn with_scale(mut self, scale: i32) -> Self {
        self.scale = scale;
        self
    }

    /// Set the length in bytes
    pub fn with_length(mut self, length: i32) -> Self {
        self.length = length;
        self
    }

    /// Set the underlying column name
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    /// Set the underlying table name
    pub fn with_original_table_name(mut self, table: impl Into<String>) -> Self {
        self.original_table_name = Some(table.into());
        self
    }

    /// Set the table alias
    pub fn with_table_alias(mut self, alias: impl Into<String>) -> Self {
        self.table_alias = Some(alias.into());
        self
    }

    /// Set nullability
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Check if this field is the row-identity pseudo column
    ///
    /// The pseudo column is reported as `DB_KEY`, a binary text column whose
    /// length is a multiple of 8 bytes (one key per joined table).
    pub fn is_db_key(&self) -> bool {
        self.original_name.as_deref() == Some(DB_KEY_COLUMN_NAME)
            && self.sql_type == sql_type::SQL_TEXT
            && (self.sub_type & 0xff) == charset::OCTETS
            && self.length > 0
            && self.length % DB_KEY_LENGTH == 0
    }
}

/// Immutable ordered set of field descriptors for one statement
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RowDescriptor {
    fields: Vec<FieldDescriptor>,
}

impl RowDescriptor {
    /// Start building a descriptor
    pub fn builder() -> RowDescriptorBuilder {
        RowDescriptorBuilder::default()
    }

    /// Create a shared descriptor from fields, assigning positions
    pub fn from_fields(fields: impl IntoIterator<Item = FieldDescriptor>) -> Arc<Self> {
        let mut builder = Self::builder();
        for field in fields {
            builder = builder.field(field);
        }
        builder.build()
    }

    /// Number of fields
    pub fn count(&self) -> usize {
        self.fields.len()
    }

    /// Get a field by position
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    /// Iterate over the fields in order
    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }

    /// Position of the first field whose underlying column is `name`
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.original_name.as_deref() == Some(name))
    }

    /// A row of uninitialized NULL fields matching this descriptor
    pub fn create_default_field_values(&self) -> RowValue {
        RowValue::new(self.count())
    }

    /// The deletion marker matching this descriptor
    pub fn deleted_row_marker(&self) -> RowValue {
        RowValue::deleted_row_marker(self.count())
    }
}

impl<'a> IntoIterator for &'a RowDescriptor {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Builder for [`RowDescriptor`]
#[derive(Debug, Default)]
pub struct RowDescriptorBuilder {
    fields: Vec<FieldDescriptor>,
}

impl RowDescriptorBuilder {
    /// Append a field; its position is set to the next index
    pub fn field(mut self, mut field: FieldDescriptor) -> Self {
        field.position = self.fields.len();
        self.fields.push(field);
        self
    }

    /// Finish into a shared descriptor
    pub fn build(self) -> Arc<RowDescriptor> {
        Arc::new(RowDescriptor {
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_assigns_positions() {
        let mut id = FieldDescriptor::column("T", "ID", sql_type::SQL_LONG);
        id.position = 99;
        let descriptor = RowDescriptor::builder()
            .field(id)
            .field(FieldDescriptor::column("T", "NAME", sql_type::SQL_VARYING))
            .build();
        assert_eq!(descriptor.count(), 2);
        assert_eq!(descriptor.field(0).unwrap().position, 0);
        assert_eq!(descriptor.field(1).unwrap().position, 1);
        assert_eq!(descriptor.position_of("NAME"), Some(1));
        assert_eq!(descriptor.position_of("OTHER"), None);
    }

    #[test]
    fn test_db_key_detection() {
        assert!(FieldDescriptor::db_key("T").is_db_key());
        assert!(!FieldDescriptor::db_key("T").with_length(5).is_db_key());
        assert!(!FieldDescriptor::column("T", "DB_KEY", sql_type::SQL_LONG).is_db_key());
        assert!(!FieldDescriptor::new("DB_KEY", sql_type::SQL_TEXT).is_db_key());
    }

    #[test]
    fn test_default_values_and_marker_width() {
        let descriptor = RowDescriptor::from_fields([
            FieldDescriptor::column("T", "A", sql_type::SQL_LONG),
            FieldDescriptor::column("T", "B", sql_type::SQL_LONG),
            FieldDescriptor::db_key("T"),
        ]);
        let row = descriptor.create_default_field_values();
        assert_eq!(row.count(), 3);
        assert_eq!(row.initialized_count(), 0);
        assert!(descriptor.deleted_row_marker().is_deleted_marker());
    }
}
