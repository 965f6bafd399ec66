//! Category definitions: one exact positivity assignment per marker.

use std::fmt;

use super::CountError;

/// A single combination of marker positivity outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryDefinition {
    pattern: Vec<bool>,
}

impl CategoryDefinition {
    /// Wrap an explicit positivity pattern.
    #[must_use]
    pub const fn from_pattern(pattern: Vec<bool>) -> Self {
        Self { pattern }
    }

    /// Numeric encoding: 1-based marker indices, positive for a positive
    /// marker and negative for a negative one. Every marker must appear
    /// exactly once.
    ///
    /// # Errors
    ///
    /// Returns `CountError` for a zero index, an index beyond `markers`, a
    /// repeated marker, or a marker left unspecified.
    pub fn from_signed_indices(indices: &[i32], markers: usize) -> Result<Self, CountError> {
        let mut assigned: Vec<Option<bool>> = vec![None; markers];
        for signed in indices {
            let position = usize::try_from(signed.unsigned_abs()).unwrap_or(usize::MAX);
            if position == 0 || position > markers {
                return Err(CountError::MarkerIndexOutOfRange {
                    index: *signed,
                    markers,
                });
            }
            let slot = &mut assigned[position - 1];
            if slot.is_some() {
                return Err(CountError::RepeatedMarkerIndex(*signed));
            }
            *slot = Some(*signed > 0);
        }
        collect_pattern(&assigned, |missing| format!("#{}", missing + 1))
    }

    /// Categorical encoding: an `&`-joined expression over marker names,
    /// `!` marking a negative marker, e.g. `"IFNg&!IL2&TNFa"`.
    ///
    /// # Errors
    ///
    /// Returns `CountError` for unknown or repeated marker names, empty terms,
    /// or a marker left unspecified.
    pub fn parse(expression: &str, markers: &[String]) -> Result<Self, CountError> {
        let mut assigned: Vec<Option<bool>> = vec![None; markers.len()];
        for term in expression.split('&') {
            let term = term.trim();
            let (positive, name) = term
                .strip_prefix('!')
                .map_or((true, term), |rest| (false, rest.trim()));
            if name.is_empty() {
                return Err(CountError::EmptyTerm(expression.to_string()));
            }
            let position = markers
                .iter()
                .position(|marker| marker == name)
                .ok_or_else(|| CountError::UnknownMarker(name.to_string()))?;
            if assigned[position].is_some() {
                return Err(CountError::RepeatedMarker(name.to_string()));
            }
            assigned[position] = Some(positive);
        }
        collect_pattern(&assigned, |missing| markers[missing].clone())
    }

    #[must_use]
    pub fn pattern(&self) -> &[bool] {
        &self.pattern
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.pattern.len()
    }

    /// Exact equality with a cell's positivity vector.
    #[must_use]
    pub fn matches(&self, cell: &[bool]) -> bool {
        self.pattern == cell
    }

    /// Number of positive markers in the combination.
    #[must_use]
    pub fn degree(&self) -> usize {
        self.pattern.iter().filter(|positive| **positive).count()
    }

    /// Render as an expression over `markers`, the inverse of [`Self::parse`].
    #[must_use]
    pub fn to_expression(&self, markers: &[String]) -> String {
        self.pattern
            .iter()
            .zip(markers)
            .map(|(positive, name)| {
                if *positive {
                    name.clone()
                } else {
                    format!("!{name}")
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for CategoryDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for positive in &self.pattern {
            f.write_str(str_marker(*positive))?;
        }
        Ok(())
    }
}

const fn str_marker(positive: bool) -> &'static str {
    if positive { "+" } else { "-" }
}

fn collect_pattern(
    assigned: &[Option<bool>],
    describe: impl Fn(usize) -> String,
) -> Result<CategoryDefinition, CountError> {
    let pattern = assigned
        .iter()
        .enumerate()
        .map(|(index, value)| value.ok_or_else(|| CountError::UnspecifiedMarker(describe(index))))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CategoryDefinition { pattern })
}

/// Every combination with at least one positive marker, ordered by degree
/// (number of positive markers) descending, then by marker order.
///
/// For `m` markers this yields `2^m - 1` categories; the all-negative
/// combination is excluded.
#[must_use]
pub fn all_categories(markers: usize) -> Vec<CategoryDefinition> {
    let total = 1_usize.checked_shl(u32::try_from(markers).unwrap_or(u32::MAX)).unwrap_or(0);
    let mut categories: Vec<CategoryDefinition> = (1..total)
        .map(|bits| CategoryDefinition {
            pattern: (0..markers)
                .map(|marker| bits & (1 << (markers - 1 - marker)) != 0)
                .collect(),
        })
        .collect();
    categories.sort_by(|a, b| b.degree().cmp(&a.degree()).then_with(|| b.pattern.cmp(&a.pattern)));
    categories
}
