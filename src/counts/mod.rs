//! # Combinatorial cell counting
//!
//! Converts per-cell marker-positivity records into subject-by-category
//! count tables. A cell is counted in a category only when its positivity
//! vector equals the category definition on every marker. Each column is
//! counted independently, so a repeated definition repeats its counts.
//!
//! Output rows follow the order of the supplied subject tables and output
//! columns follow the order of the supplied categories.

use thiserror::Error;

use crate::input::CountMatrix;

pub mod category;
pub mod cells;

pub use category::{CategoryDefinition, all_categories};
pub use cells::CellTable;

/// Errors raised while building cell tables, parsing categories, or counting.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CountError {
    #[error("at least one marker is required")]
    NoMarkers,
    #[error("marker `{0}` appears more than once")]
    DuplicateMarker(String),
    #[error("cell row {row} has {len} markers; expected {expected}")]
    RaggedCells {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("cell value at row {row}, column {col} is not finite")]
    NonFiniteValue { row: usize, col: usize },
    #[error("label `{label}` at row {row}, column {col} is not a positivity label")]
    UnknownLabel {
        row: usize,
        col: usize,
        label: String,
    },
    #[error("category references unknown marker `{0}`")]
    UnknownMarker(String),
    #[error("category references marker `{0}` more than once")]
    RepeatedMarker(String),
    #[error("category references marker index {0} more than once")]
    RepeatedMarkerIndex(i32),
    #[error("category marker index {index} is outside 1..={markers}")]
    MarkerIndexOutOfRange { index: i32, markers: usize },
    #[error("category leaves marker {0} unspecified")]
    UnspecifiedMarker(String),
    #[error("category expression `{0}` contains an empty term")]
    EmptyTerm(String),
    #[error("category {category} covers {width} markers but the data has {markers}")]
    CategoryWidthMismatch {
        category: usize,
        width: usize,
        markers: usize,
    },
    #[error("subject {subject} uses a different marker panel than subject 0")]
    MarkerPanelMismatch { subject: usize },
    #[error("no subject tables were supplied")]
    NoSubjects,
    #[error("no category definitions were supplied")]
    NoCategories,
    #[error("the cell tables contain no cells")]
    EmptyCellTable,
    #[error("subject {subject} has more than {max} cells in one category", max = u32::MAX)]
    CountOverflow { subject: usize },
}

/// Count the cells of each subject in each category.
///
/// # Errors
///
/// Returns `CountError` if there are no subjects, categories, or cells, if
/// subjects disagree on the marker panel, or if a category does not cover
/// exactly the data's markers.
pub fn count_cells(
    subjects: &[CellTable],
    categories: &[CategoryDefinition],
) -> Result<CountMatrix, CountError> {
    let first = subjects.first().ok_or(CountError::NoSubjects)?;
    if categories.is_empty() {
        return Err(CountError::NoCategories);
    }
    for (subject, table) in subjects.iter().enumerate().skip(1) {
        if table.markers() != first.markers() {
            return Err(CountError::MarkerPanelMismatch { subject });
        }
    }
    let markers = first.markers().len();
    for (category, definition) in categories.iter().enumerate() {
        if definition.width() != markers {
            return Err(CountError::CategoryWidthMismatch {
                category,
                width: definition.width(),
                markers,
            });
        }
    }
    if subjects.iter().all(CellTable::is_empty) {
        return Err(CountError::EmptyCellTable);
    }

    let mut counts = CountMatrix::zeros(subjects.len(), categories.len());
    for (subject, table) in subjects.iter().enumerate() {
        for cell in 0..table.cells() {
            let positivity = table.cell(cell);
            for (category, definition) in categories.iter().enumerate() {
                if !definition.matches(positivity) {
                    continue;
                }
                if counts.get(subject, category) == u32::MAX {
                    return Err(CountError::CountOverflow { subject });
                }
                counts.increment(subject, category);
            }
        }
    }
    Ok(counts)
}

/// Count cells against categories written as marker expressions
/// (`"IFNg&!IL2&TNFa"`), resolved against the subjects' marker panel.
///
/// # Errors
///
/// Returns `CountError` if an expression cannot be parsed against the data's
/// markers or counting fails.
pub fn count_cells_by_expression<S: AsRef<str>>(
    subjects: &[CellTable],
    expressions: &[S],
) -> Result<CountMatrix, CountError> {
    let first = subjects.first().ok_or(CountError::NoSubjects)?;
    let categories = expressions
        .iter()
        .map(|expression| CategoryDefinition::parse(expression.as_ref(), first.markers()))
        .collect::<Result<Vec<_>, _>>()?;
    count_cells(subjects, &categories)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["A".to_string(), "B".to_string()]
    }

    fn table(rows: &[Vec<bool>]) -> CellTable {
        CellTable::from_logical(markers(), rows).expect("valid table")
    }

    #[test]
    fn counts_use_exact_matching() {
        let subjects = vec![
            table(&[
                vec![true, true],
                vec![true, false],
                vec![true, true],
                vec![false, false],
            ]),
            table(&[vec![false, true], vec![true, false]]),
        ];
        let categories = vec![
            CategoryDefinition::from_pattern(vec![true, true]),
            CategoryDefinition::from_pattern(vec![true, false]),
            CategoryDefinition::from_pattern(vec![false, true]),
        ];
        let counts = count_cells(&subjects, &categories).expect("counting succeeds");
        assert_eq!(counts.to_rows(), vec![vec![2, 1, 0], vec![0, 1, 1]]);
    }

    #[test]
    fn column_order_follows_category_order() {
        let subjects = vec![table(&[vec![true, true], vec![true, false], vec![true, false]])];
        let forward = count_cells_by_expression(&subjects, &["A&B", "A&!B"]).expect("forward");
        let reversed = count_cells_by_expression(&subjects, &["A&!B", "A&B"]).expect("reversed");
        assert_eq!(forward.to_rows(), vec![vec![1, 2]]);
        assert_eq!(reversed.to_rows(), vec![vec![2, 1]]);
    }

    #[test]
    fn repeated_category_counts_in_every_column() {
        let subjects = vec![table(&[vec![true, false], vec![true, false], vec![false, true]])];
        let counts =
            count_cells_by_expression(&subjects, &["A&!B", "A&!B", "!A&B"]).expect("counting");
        assert_eq!(counts.to_rows(), vec![vec![2, 2, 1]]);
    }

    #[test]
    fn empty_cell_table_is_rejected() {
        let subjects = vec![table(&[])];
        let categories = vec![CategoryDefinition::from_pattern(vec![true, true])];
        assert_eq!(
            count_cells(&subjects, &categories),
            Err(CountError::EmptyCellTable)
        );
    }

    #[test]
    fn unknown_marker_in_expression_is_rejected() {
        let subjects = vec![table(&[vec![true, true]])];
        let err = count_cells_by_expression(&subjects, &["A&!C"]).expect_err("unknown marker");
        assert_eq!(err, CountError::UnknownMarker("C".to_string()));
    }

    #[test]
    fn category_width_must_match_markers() {
        let subjects = vec![table(&[vec![true, true]])];
        let categories = vec![CategoryDefinition::from_pattern(vec![true, true, false])];
        assert!(matches!(
            count_cells(&subjects, &categories),
            Err(CountError::CategoryWidthMismatch { category: 0, .. })
        ));
    }
}
