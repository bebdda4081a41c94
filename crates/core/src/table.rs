//! Named, ordered record collections

use crate::identity::{Id, IdColumn, IdKind, Identified};
use crate::{Error, Result};
use ahash::AHashSet;

/// An ordered collection of rows with a name used in diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<R> {
    name: String,
    rows: Vec<R>,
}

impl<R> Table<R> {
    pub fn new(name: impl Into<String>, rows: Vec<R>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    /// Same name, new rows.
    pub fn with_rows<T>(&self, rows: Vec<T>) -> Table<T> {
        Table::new(self.name.clone(), rows)
    }
}

impl<R: Identified> Table<R> {
    /// Fail with [`Error::MissingColumn`] unless rows carry `column`.
    pub fn require_column(&self, column: IdColumn) -> Result<()> {
        if R::ID_COLUMNS.contains(&column) {
            Ok(())
        } else {
            Err(Error::MissingColumn {
                table: self.name.clone(),
                column,
            })
        }
    }

    /// Values of `column` in row order.
    pub fn ids(&self, column: IdColumn) -> Result<impl Iterator<Item = &Id> + '_> {
        self.require_column(column)?;
        Ok(self.rows.iter().filter_map(move |row| row.identity(column)))
    }

    /// Distinct values of `column`.
    pub fn id_set(&self, column: IdColumn) -> Result<AHashSet<&Id>> {
        Ok(self.ids(column)?.collect())
    }

    /// The single identity kind stored in `column`.
    ///
    /// Returns `None` for an empty table, which is compatible with any kind.
    pub fn id_kind(&self, column: IdColumn) -> Result<Option<IdKind>> {
        let mut kind = None;
        for id in self.ids(column)? {
            match kind {
                None => kind = Some(id.kind()),
                Some(seen) if seen != id.kind() => {
                    return Err(Error::MixedIdentity {
                        table: self.name.clone(),
                        column,
                    })
                }
                Some(_) => {}
            }
        }
        Ok(kind)
    }
}

impl<'a, R> IntoIterator for &'a Table<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl<R> IntoIterator for Table<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
