//! Key derivation for row mutation
//!
//! A row can only be written back if the projection comes from a single
//! table and contains columns that identify the row: either all columns of
//! the table's best row identifier, or the row-identity pseudo column.

use crate::constants::DB_KEY_SQL_NAME;
use crate::error::{Error, Result};
use crate::statement::{FieldDescriptor, RowDescriptor};

/// Check that all fields come from one table and return its name
pub fn require_single_table(descriptor: &RowDescriptor) -> Result<String> {
    let mut table: Option<&str> = None;
    for field in descriptor {
        let field_table = field.original_table_name.as_deref().unwrap_or_default();
        if field_table.is_empty() {
            return Err(Error::not_updatable(format!(
                "column {} is not backed by a table",
                field.field_name
            )));
        }
        match table {
            None => table = Some(field_table),
            Some(t) if t != field_table => {
                return Err(Error::not_updatable(format!(
                    "result set references at least two tables: {} and {}",
                    t, field_table
                )));
            }
            Some(_) => {}
        }
        if !field.is_db_key() && field.original_name.as_deref().unwrap_or_default().is_empty() {
            return Err(Error::not_updatable(format!(
                "column {} is computed",
                field.field_name
            )));
        }
    }
    table
        .map(str::to_string)
        .ok_or_else(|| Error::not_updatable("result set has no columns"))
}

/// Key columns from the best row identifier, if all of them are projected
///
/// When the identifier is the row-identity pseudo column and it is
/// projected, it alone is the key.
pub fn key_columns_of_best_row_identifier(
    descriptor: &RowDescriptor,
    best_row_identifier: &[String],
) -> Option<Vec<FieldDescriptor>> {
    if best_row_identifier.is_empty() {
        return None;
    }
    let mut key_columns = Vec::with_capacity(best_row_identifier.len());
    for column in best_row_identifier {
        if column == DB_KEY_SQL_NAME {
            return key_columns_of_db_key(descriptor);
        }
        let field = descriptor
            .iter()
            .find(|f| !f.is_db_key() && f.original_name.as_deref() == Some(column.as_str()))?;
        key_columns.push(field.clone());
    }
    Some(key_columns)
}

/// The projected row-identity pseudo column as key
pub fn key_columns_of_db_key(descriptor: &RowDescriptor) -> Option<Vec<FieldDescriptor>> {
    descriptor
        .iter()
        .find(|f| f.is_db_key())
        .map(|f| vec![f.clone()])
}

/// Derive the key columns of a single-table projection
pub fn derive_key_columns(
    descriptor: &RowDescriptor,
    best_row_identifier: &[String],
) -> Result<Vec<FieldDescriptor>> {
    key_columns_of_best_row_identifier(descriptor, best_row_identifier)
        .or_else(|| key_columns_of_db_key(descriptor))
        .ok_or_else(|| {
            Error::not_updatable(
                "table has no best row identifier in the projection and RDB$DB_KEY was not selected",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::sql_type;
    use std::sync::Arc;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn table_descriptor(with_db_key: bool) -> Arc<RowDescriptor> {
        let mut builder = RowDescriptor::builder()
            .field(FieldDescriptor::column("EMP", "ID", sql_type::SQL_LONG))
            .field(FieldDescriptor::column("EMP", "NAME", sql_type::SQL_VARYING));
        if with_db_key {
            builder = builder.field(FieldDescriptor::db_key("EMP"));
        }
        builder.build()
    }

    #[test]
    fn test_full_primary_key() {
        let descriptor = table_descriptor(true);
        let keys = derive_key_columns(&descriptor, &ids(&["ID"])).unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].original_name.as_deref(), Some("ID"));
    }

    #[test]
    fn test_partial_primary_key_falls_back_to_db_key() {
        let descriptor = table_descriptor(true);
        let keys = derive_key_columns(&descriptor, &ids(&["ID", "DEPT"])).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].is_db_key());
    }

    #[test]
    fn test_identifier_is_db_key() {
        let descriptor = table_descriptor(true);
        let keys = derive_key_columns(&descriptor, &ids(&[DB_KEY_SQL_NAME])).unwrap();
        assert!(keys[0].is_db_key());
        assert_eq!(keys[0].position, 2);
    }

    #[test]
    fn test_no_key_available() {
        let descriptor = table_descriptor(false);
        let err = derive_key_columns(&descriptor, &ids(&["ID", "DEPT"])).unwrap_err();
        assert!(err.is_not_updatable());
        let err = derive_key_columns(&descriptor, &[]).unwrap_err();
        assert!(err.is_not_updatable());
    }

    #[test]
    fn test_single_table() {
        assert_eq!(require_single_table(&table_descriptor(true)).unwrap(), "EMP");
    }

    #[test]
    fn test_multi_table_projection() {
        let descriptor = RowDescriptor::from_fields([
            FieldDescriptor::column("EMP", "ID", sql_type::SQL_LONG),
            FieldDescriptor::column("DEPT", "NAME", sql_type::SQL_VARYING),
        ]);
        let err = require_single_table(&descriptor).unwrap_err();
        assert!(err.is_not_updatable());
        assert!(err.to_string().contains("EMP and DEPT"));
    }

    #[test]
    fn test_computed_column() {
        let descriptor = RowDescriptor::from_fields([
            FieldDescriptor::column("EMP", "ID", sql_type::SQL_LONG),
            FieldDescriptor::new("TOTAL", sql_type::SQL_INT64).with_original_table_name("EMP"),
        ]);
        assert!(require_single_table(&descriptor).unwrap_err().is_not_updatable());

        let descriptor = RowDescriptor::from_fields([FieldDescriptor::new("ONE", sql_type::SQL_LONG)]);
        assert!(require_single_table(&descriptor).is_err());
        assert!(require_single_table(&RowDescriptor::default()).is_err());
    }
}
