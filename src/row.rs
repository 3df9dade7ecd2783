//! Row values as delivered by the protocol layer
//!
//! A [`RowValue`] holds the raw encoded column values of one row. Decoding
//! the bytes into typed values is the job of the statement layer; the
//! cursor only moves, copies and compares rows.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Fixed-width set of field indexes
///
/// Used to track which fields of a [`RowValue`] have been explicitly set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldSet {
    words: Vec<u64>,
    len: usize,
}

impl FieldSet {
    /// Create an empty set able to hold `len` fields
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    /// Create a set with all `len` fields present
    pub fn full(len: usize) -> Self {
        let mut set = Self::new(len);
        set.insert_all();
        set
    }

    /// Check whether `index` is in the set
    pub fn contains(&self, index: usize) -> bool {
        index < self.len && self.words[index / 64] & (1 << (index % 64)) != 0
    }

    /// Add `index` to the set
    pub fn insert(&mut self, index: usize) {
        if index < self.len {
            self.words[index / 64] |= 1 << (index % 64);
        }
    }

    /// Add every field to the set
    pub fn insert_all(&mut self) {
        for index in 0..self.len {
            self.insert(index);
        }
    }

    /// Remove every field from the set
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|word| *word = 0);
    }

    /// Number of fields in the set
    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Iterate over the field indexes in ascending order
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len).filter(move |index| self.contains(*index))
    }
}

/// The raw values of a single row.
///
/// Each field is either `None` (SQL NULL) or the encoded bytes. Independent
/// of the value, a field is *initialized* once it has been explicitly set,
/// which lets the row updater tell "not touched" apart from "set to NULL".
///
/// Cloning a `RowValue` produces an independent copy; the encoded values are
/// immutable [`Bytes`] and are never modified in place.
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use rowcursor::RowValue;
///
/// let mut row = RowValue::new(2);
/// assert!(!row.is_initialized(0));
///
/// row.set_field(1, None).unwrap();
/// assert!(row.is_initialized(1));
/// assert_eq!(row.initialized_count(), 1);
///
/// let row = RowValue::of(vec![Some(Bytes::from_static(b"1")), None]);
/// assert_eq!(row.field(0).map(|b| &b[..]), Some(&b"1"[..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowValue {
    values: Vec<Option<Bytes>>,
    initialized: FieldSet,
    deleted_marker: bool,
}

impl RowValue {
    /// Create a row of `count` uninitialized NULL fields
    pub fn new(count: usize) -> Self {
        Self {
            values: vec![None; count],
            initialized: FieldSet::new(count),
            deleted_marker: false,
        }
    }

    /// Create a row from values, all of them initialized
    pub fn of(values: Vec<Option<Bytes>>) -> Self {
        let initialized = FieldSet::full(values.len());
        Self {
            values,
            initialized,
            deleted_marker: false,
        }
    }

    /// Create the marker row reported for a deleted row
    pub fn deleted_row_marker(count: usize) -> Self {
        Self {
            values: vec![None; count],
            initialized: FieldSet::full(count),
            deleted_marker: true,
        }
    }

    /// Number of fields
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is the deletion marker
    pub fn is_deleted_marker(&self) -> bool {
        self.deleted_marker
    }

    /// Get the encoded value of a field, `None` for NULL or out of range
    pub fn field(&self, index: usize) -> Option<&Bytes> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Set the encoded value of a field and mark it initialized
    pub fn set_field(&mut self, index: usize, value: Option<Bytes>) -> Result<()> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(Error::InvalidFieldIndex(index))?;
        *slot = value;
        self.initialized.insert(index);
        Ok(())
    }

    /// Check whether a field has been explicitly set
    pub fn is_initialized(&self, index: usize) -> bool {
        self.initialized.contains(index)
    }

    /// Number of initialized fields
    pub fn initialized_count(&self) -> usize {
        self.initialized.count()
    }

    /// The set of initialized fields
    pub fn initialized_fields(&self) -> &FieldSet {
        &self.initialized
    }

    /// Mark all fields as initialized, keeping their current values
    pub fn initialize_fields(&mut self) {
        self.initialized.insert_all();
    }

    /// Reset all fields to uninitialized NULL
    pub fn reset(&mut self) {
        self.values.iter_mut().for_each(|value| *value = None);
        self.initialized.clear();
    }

    /// Iterate over the encoded values
    pub fn iter(&self) -> impl Iterator<Item = Option<&Bytes>> {
        self.values.iter().map(Option::as_ref)
    }
}
