//! # Model inputs
//!
//! Defines the paired stimulated/unstimulated count tables consumed by the
//! sampler. Both tables share subject rows and category columns; they are
//! validated once and never mutated while a chain runs.
//!
//! # Examples
//!
//! ```
//! use compass_mcmc::{CountInput, CountMatrix};
//!
//! let stimulated = CountMatrix::from_rows(&[vec![5, 5, 0], vec![0, 8, 2]]).unwrap();
//! let unstimulated = CountMatrix::from_rows(&[vec![10, 0, 0], vec![0, 10, 0]]).unwrap();
//! let input = CountInput::new(stimulated, unstimulated);
//!
//! assert!(input.validate().is_ok());
//! ```
//!
//! ```
//! use compass_mcmc::{CountInput, CountMatrix};
//!
//! let stimulated = CountMatrix::from_rows(&[vec![5, 5, 0]]).unwrap();
//! let unstimulated = CountMatrix::from_rows(&[vec![10, 0]]).unwrap();
//! let input = CountInput::new(stimulated, unstimulated);
//!
//! assert!(input.validate().is_err());
//! ```

use thiserror::Error;

pub mod count_matrix;

pub use count_matrix::CountMatrix;

/// Errors returned when validating count inputs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("count tables must contain at least one subject")]
    NoSubjects,
    #[error("count tables must contain at least one category")]
    NoCategories,
    #[error(
        "stimulated counts ({stimulated_rows}x{stimulated_cols}) and unstimulated counts ({unstimulated_rows}x{unstimulated_cols}) must have the same shape"
    )]
    DimensionMismatch {
        stimulated_rows: usize,
        stimulated_cols: usize,
        unstimulated_rows: usize,
        unstimulated_cols: usize,
    },
    #[error("row {row} has {len} entries; expected {expected}")]
    RaggedRows {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("category label count ({labels}) must match category columns ({categories})")]
    InvalidLabelLength { labels: usize, categories: usize },
}

/// Paired count tables for one experiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountInput {
    pub stimulated: CountMatrix,
    pub unstimulated: CountMatrix,
    pub category_labels: Option<Vec<String>>,
}

impl CountInput {
    #[must_use]
    pub const fn new(stimulated: CountMatrix, unstimulated: CountMatrix) -> Self {
        Self {
            stimulated,
            unstimulated,
            category_labels: None,
        }
    }

    #[must_use]
    pub fn with_category_labels(self, labels: Vec<String>) -> Self {
        Self {
            category_labels: Some(labels),
            ..self
        }
    }

    #[must_use]
    pub const fn subjects(&self) -> usize {
        self.stimulated.subjects()
    }

    #[must_use]
    pub const fn categories(&self) -> usize {
        self.stimulated.categories()
    }

    /// Validate that both tables are non-empty and share a shape.
    ///
    /// # Errors
    ///
    /// Returns `InputError` if the tables are malformed.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.stimulated.subjects() != self.unstimulated.subjects()
            || self.stimulated.categories() != self.unstimulated.categories()
        {
            return Err(InputError::DimensionMismatch {
                stimulated_rows: self.stimulated.subjects(),
                stimulated_cols: self.stimulated.categories(),
                unstimulated_rows: self.unstimulated.subjects(),
                unstimulated_cols: self.unstimulated.categories(),
            });
        }
        if self.subjects() == 0 {
            return Err(InputError::NoSubjects);
        }
        if self.categories() == 0 {
            return Err(InputError::NoCategories);
        }
        if let Some(labels) = &self.category_labels
            && labels.len() != self.categories()
        {
            return Err(InputError::InvalidLabelLength {
                labels: labels.len(),
                categories: self.categories(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(rows: &[Vec<u32>]) -> CountMatrix {
        CountMatrix::from_rows(rows).expect("rows should be rectangular")
    }

    #[test]
    fn validate_rejects_shape_mismatch() {
        let input = CountInput::new(counts(&[vec![1, 2]]), counts(&[vec![1, 2], vec![3, 4]]));
        let err = input.validate().expect_err("row mismatch should fail");
        assert_eq!(
            err,
            InputError::DimensionMismatch {
                stimulated_rows: 1,
                stimulated_cols: 2,
                unstimulated_rows: 2,
                unstimulated_cols: 2,
            }
        );
    }

    #[test]
    fn validate_rejects_empty_tables() {
        let input = CountInput::new(CountMatrix::zeros(0, 3), CountMatrix::zeros(0, 3));
        assert_eq!(input.validate(), Err(InputError::NoSubjects));

        let input = CountInput::new(CountMatrix::zeros(2, 0), CountMatrix::zeros(2, 0));
        assert_eq!(input.validate(), Err(InputError::NoCategories));
    }

    #[test]
    fn validate_rejects_wrong_label_count() {
        let input = CountInput::new(counts(&[vec![1, 2]]), counts(&[vec![0, 2]]))
            .with_category_labels(vec!["A&B".to_string()]);
        assert_eq!(
            input.validate(),
            Err(InputError::InvalidLabelLength {
                labels: 1,
                categories: 2
            })
        );
    }

    #[test]
    fn validate_accepts_matching_tables() {
        let input = CountInput::new(counts(&[vec![1, 2]]), counts(&[vec![0, 2]]))
            .with_category_labels(vec!["A".to_string(), "B".to_string()]);
        assert!(input.validate().is_ok());
    }
}
