//! Per-subject marker-positivity tables.

use faer::Mat;

use super::CountError;

/// Boolean marker-positivity records for the cells of one subject.
///
/// Rows are cells and columns are markers. A table can be built from a
/// numeric/logical encoding or from string labels; equivalent inputs give
/// identical tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTable {
    markers: Vec<String>,
    cells: usize,
    positivity: Vec<bool>,
}

impl CellTable {
    /// Build a table from logical rows, one `bool` per marker.
    ///
    /// # Errors
    ///
    /// Returns `CountError` if there are no markers, markers repeat, or a row
    /// has the wrong width.
    pub fn from_logical(markers: Vec<String>, rows: &[Vec<bool>]) -> Result<Self, CountError> {
        validate_markers(&markers)?;
        let width = markers.len();
        let mut positivity = Vec::with_capacity(rows.len() * width);
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(CountError::RaggedCells {
                    row: row_index,
                    len: row.len(),
                    expected: width,
                });
            }
            positivity.extend_from_slice(row);
        }
        Ok(Self {
            markers,
            cells: rows.len(),
            positivity,
        })
    }

    /// Build a table from a numeric matrix; any non-zero entry is positive.
    ///
    /// # Errors
    ///
    /// Returns `CountError` if marker names do not match the matrix width or
    /// the matrix holds non-finite values.
    pub fn from_numeric(markers: Vec<String>, values: &Mat<f64>) -> Result<Self, CountError> {
        validate_markers(&markers)?;
        if values.ncols() != markers.len() {
            return Err(CountError::RaggedCells {
                row: 0,
                len: values.ncols(),
                expected: markers.len(),
            });
        }
        let mut positivity = Vec::with_capacity(values.nrows() * values.ncols());
        for row in 0..values.nrows() {
            for col in 0..values.ncols() {
                let value = values[(row, col)];
                if !value.is_finite() {
                    return Err(CountError::NonFiniteValue { row, col });
                }
                positivity.push(value != 0.0);
            }
        }
        Ok(Self {
            markers,
            cells: values.nrows(),
            positivity,
        })
    }

    /// Build a table from categorical labels such as `"+"`/`"-"` or
    /// `"TRUE"`/`"FALSE"`.
    ///
    /// # Errors
    ///
    /// Returns `CountError` if a label is not a recognised positivity label or
    /// a row has the wrong width.
    pub fn from_labels<S: AsRef<str>>(
        markers: Vec<String>,
        rows: &[Vec<S>],
    ) -> Result<Self, CountError> {
        let mut logical = Vec::with_capacity(rows.len());
        for (row_index, row) in rows.iter().enumerate() {
            let parsed = row
                .iter()
                .enumerate()
                .map(|(col, label)| {
                    parse_positivity(label.as_ref()).ok_or_else(|| CountError::UnknownLabel {
                        row: row_index,
                        col,
                        label: label.as_ref().to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            logical.push(parsed);
        }
        Self::from_logical(markers, &logical)
    }

    #[must_use]
    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    #[must_use]
    pub const fn cells(&self) -> usize {
        self.cells
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells == 0
    }

    /// Marker-positivity vector of one cell.
    #[must_use]
    pub fn cell(&self, index: usize) -> &[bool] {
        let width = self.markers.len();
        &self.positivity[index * width..(index + 1) * width]
    }
}

fn validate_markers(markers: &[String]) -> Result<(), CountError> {
    if markers.is_empty() {
        return Err(CountError::NoMarkers);
    }
    for (index, marker) in markers.iter().enumerate() {
        if markers[..index].contains(marker) {
            return Err(CountError::DuplicateMarker(marker.clone()));
        }
    }
    Ok(())
}

fn parse_positivity(label: &str) -> Option<bool> {
    match label.trim().to_ascii_lowercase().as_str() {
        "+" | "pos" | "positive" | "true" | "t" | "1" => Some(true),
        "-" | "neg" | "negative" | "false" | "f" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn markers() -> Vec<String> {
        vec!["IFNg".to_string(), "IL2".to_string()]
    }

    #[test]
    fn numeric_and_label_encodings_agree() {
        let numeric = Mat::from_fn(3, 2, |row, col| if (row + col) % 2 == 0 { 1.0 } else { 0.0 });
        let from_numeric = CellTable::from_numeric(markers(), &numeric).expect("numeric table");
        let from_labels = CellTable::from_labels(
            markers(),
            &[vec!["+", "-"], vec!["neg", "TRUE"], vec!["1", "f"]],
        )
        .expect("label table");
        assert_eq!(from_numeric, from_labels);
    }

    #[test]
    fn unknown_label_is_reported() {
        let err = CellTable::from_labels(markers(), &[vec!["+", "maybe"]])
            .expect_err("unknown label should fail");
        assert_eq!(
            err,
            CountError::UnknownLabel {
                row: 0,
                col: 1,
                label: "maybe".to_string()
            }
        );
    }

    #[test]
    fn duplicate_markers_are_rejected() {
        let err = CellTable::from_logical(vec!["A".to_string(), "A".to_string()], &[])
            .expect_err("duplicate marker should fail");
        assert_eq!(err, CountError::DuplicateMarker("A".to_string()));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = CellTable::from_logical(markers(), &[vec![true]]).expect_err("ragged row");
        assert!(matches!(err, CountError::RaggedCells { row: 0, .. }));
    }
}
