//! Dense subject-by-category count tables.

use super::InputError;

/// Row-major matrix of non-negative cell counts.
///
/// Rows are subjects and columns are categories, both in caller order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountMatrix {
    subjects: usize,
    categories: usize,
    values: Vec<u32>,
}

impl CountMatrix {
    /// All-zero matrix of the given shape.
    #[must_use]
    pub fn zeros(subjects: usize, categories: usize) -> Self {
        Self {
            subjects,
            categories,
            values: vec![0; subjects * categories],
        }
    }

    /// Build a matrix from equally long rows.
    ///
    /// # Errors
    ///
    /// Returns `InputError::RaggedRows` if rows differ in length.
    pub fn from_rows(rows: &[Vec<u32>]) -> Result<Self, InputError> {
        let categories = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows.len() * categories);
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != categories {
                return Err(InputError::RaggedRows {
                    row: row_index,
                    len: row.len(),
                    expected: categories,
                });
            }
            values.extend_from_slice(row);
        }
        Ok(Self {
            subjects: rows.len(),
            categories,
            values,
        })
    }

    #[must_use]
    pub const fn subjects(&self) -> usize {
        self.subjects
    }

    #[must_use]
    pub const fn categories(&self) -> usize {
        self.categories
    }

    #[must_use]
    pub fn row(&self, subject: usize) -> &[u32] {
        let start = subject * self.categories;
        &self.values[start..start + self.categories]
    }

    #[must_use]
    pub fn get(&self, subject: usize, category: usize) -> u32 {
        self.values[subject * self.categories + category]
    }

    pub(crate) fn increment(&mut self, subject: usize, category: usize) {
        self.values[subject * self.categories + category] += 1;
    }

    /// Total cells per subject.
    #[must_use]
    pub fn row_sums(&self) -> Vec<u64> {
        (0..self.subjects)
            .map(|subject| self.row(subject).iter().map(|n| u64::from(*n)).sum())
            .collect()
    }

    /// Total cells per category across all subjects.
    #[must_use]
    pub fn column_totals(&self) -> Vec<u64> {
        let mut totals = vec![0_u64; self.categories];
        for subject in 0..self.subjects {
            for (total, count) in totals.iter_mut().zip(self.row(subject)) {
                *total += u64::from(*count);
            }
        }
        totals
    }

    /// Keep only the listed columns, in the listed order.
    #[must_use]
    pub fn select_columns(&self, columns: &[usize]) -> Self {
        let mut values = Vec::with_capacity(self.subjects * columns.len());
        for subject in 0..self.subjects {
            let row = self.row(subject);
            values.extend(columns.iter().map(|col| row[*col]));
        }
        Self {
            subjects: self.subjects,
            categories: columns.len(),
            values,
        }
    }

    /// Rows as owned vectors, mainly for inspection in tests and reports.
    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<u32>> {
        (0..self.subjects)
            .map(|subject| self.row(subject).to_vec())
            .collect()
    }
}
