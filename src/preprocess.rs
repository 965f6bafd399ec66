use crate::input::CountInput;
use crate::utils::usize_to_f64;

/// Per-category evidence summary for a count input.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryDiagnostics {
    pub n_subjects: usize,
    pub n_categories: usize,
    /// Categories with no cells in either condition for any subject.
    pub n_empty: usize,
    /// Categories with at least one stimulated cell.
    pub n_eligible: usize,
    /// Subjects with zero stimulated cells.
    pub n_subjects_without_stimulated: usize,
    /// Subjects with zero unstimulated cells.
    pub n_subjects_without_unstimulated: usize,
    pub eligible_share: f64,
}

#[must_use]
pub fn category_diagnostics(input: &CountInput) -> CategoryDiagnostics {
    let stimulated_totals = input.stimulated.column_totals();
    let unstimulated_totals = input.unstimulated.column_totals();
    let n_categories = input.categories();

    let n_empty = stimulated_totals
        .iter()
        .zip(unstimulated_totals.iter())
        .filter(|(s, u)| **s == 0 && **u == 0)
        .count();
    let n_eligible = stimulated_totals.iter().filter(|total| **total > 0).count();
    let n_subjects_without_stimulated = input
        .stimulated
        .row_sums()
        .iter()
        .filter(|total| **total == 0)
        .count();
    let n_subjects_without_unstimulated = input
        .unstimulated
        .row_sums()
        .iter()
        .filter(|total| **total == 0)
        .count();
    let eligible_share = if n_categories > 0 {
        usize_to_f64(n_eligible) / usize_to_f64(n_categories)
    } else {
        0.0
    };

    CategoryDiagnostics {
        n_subjects: input.subjects(),
        n_categories,
        n_empty,
        n_eligible,
        n_subjects_without_stimulated,
        n_subjects_without_unstimulated,
        eligible_share,
    }
}

/// Categories that may carry a stimulation response: those with at least one
/// stimulated cell in some subject.
#[must_use]
pub fn eligible_categories(input: &CountInput) -> Vec<bool> {
    input
        .stimulated
        .column_totals()
        .into_iter()
        .map(|total| total > 0)
        .collect()
}

#[must_use]
fn non_empty_category_indices(input: &CountInput, always_keep: &[usize]) -> Vec<usize> {
    let stimulated_totals = input.stimulated.column_totals();
    let unstimulated_totals = input.unstimulated.column_totals();
    (0..input.categories())
        .filter(|category| {
            always_keep.contains(category)
                || stimulated_totals[*category] > 0
                || unstimulated_totals[*category] > 0
        })
        .collect()
}

/// Drop categories with no cells in either condition.
///
/// Returns the reduced input and the original indices of the kept columns.
#[must_use]
pub fn drop_empty_categories(input: &CountInput, always_keep: &[usize]) -> (CountInput, Vec<usize>) {
    let kept = non_empty_category_indices(input, always_keep);
    let labels = input
        .category_labels
        .as_ref()
        .map(|labels| kept.iter().map(|index| labels[*index].clone()).collect());
    let reduced = CountInput {
        stimulated: input.stimulated.select_columns(&kept),
        unstimulated: input.unstimulated.select_columns(&kept),
        category_labels: labels,
    };
    (reduced, kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::CountMatrix;

    fn input() -> CountInput {
        CountInput::new(
            CountMatrix::from_rows(&[vec![5, 0, 0, 1], vec![0, 0, 0, 2]]).expect("rows"),
            CountMatrix::from_rows(&[vec![4, 0, 3, 0], vec![0, 0, 0, 0]]).expect("rows"),
        )
    }

    #[test]
    fn diagnostics_count_categories() {
        let diag = category_diagnostics(&input());
        assert_eq!(diag.n_categories, 4);
        assert_eq!(diag.n_empty, 1);
        assert_eq!(diag.n_eligible, 2);
        assert_eq!(diag.n_subjects_without_stimulated, 0);
        assert_eq!(diag.n_subjects_without_unstimulated, 1);
        assert!((diag.eligible_share - 0.5).abs() < 1e-12);
    }

    #[test]
    fn eligibility_requires_stimulated_cells() {
        assert_eq!(eligible_categories(&input()), vec![true, false, false, true]);
    }

    #[test]
    fn drop_empty_categories_keeps_forced_and_observed_columns() {
        let labelled = input().with_category_labels(
            ["A", "B", "C", "D"].iter().map(ToString::to_string).collect(),
        );
        let (reduced, kept) = drop_empty_categories(&labelled, &[]);
        assert_eq!(kept, vec![0, 2, 3]);
        assert_eq!(reduced.stimulated.to_rows(), vec![vec![5, 0, 1], vec![0, 0, 2]]);
        assert_eq!(
            reduced.category_labels,
            Some(vec!["A".to_string(), "C".to_string(), "D".to_string()])
        );

        let (_, forced) = drop_empty_categories(&labelled, &[1]);
        assert_eq!(forced, vec![0, 1, 2, 3]);
    }
}
