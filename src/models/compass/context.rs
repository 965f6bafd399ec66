//! Validated, read-only inputs shared by every update step of a chain.

use crate::input::{CountInput, CountMatrix};
use crate::preprocess::eligible_categories;

use super::likelihood;
use super::priors::CompassPriorConfig;
use super::types::{CompassError, CompassProposalTuning, CompassSamplerConfig};

/// Counts, priors, and tuning for one run, checked once before sampling.
#[derive(Debug, Clone)]
pub struct CompassContext<'a> {
    input: &'a CountInput,
    prior: CompassPriorConfig,
    tuning: CompassProposalTuning,
    eligible: Vec<bool>,
}

impl<'a> CompassContext<'a> {
    /// # Errors
    ///
    /// Returns `CompassError` if the counts or any configuration block is
    /// invalid, or if the probability floor leaves no room for a simplex.
    pub fn new(input: &'a CountInput, config: CompassSamplerConfig) -> Result<Self, CompassError> {
        input.validate()?;
        config.validate()?;
        if !config.prior_config.floor_fits(input.categories()) {
            return Err(CompassError::InvalidPriorConfig);
        }
        Ok(Self {
            input,
            prior: config.prior_config,
            tuning: config.proposal_tuning,
            eligible: eligible_categories(input),
        })
    }

    #[must_use]
    pub const fn input(&self) -> &'a CountInput {
        self.input
    }

    #[must_use]
    pub const fn stimulated(&self) -> &'a CountMatrix {
        &self.input.stimulated
    }

    #[must_use]
    pub const fn unstimulated(&self) -> &'a CountMatrix {
        &self.input.unstimulated
    }

    #[must_use]
    pub const fn subjects(&self) -> usize {
        self.input.subjects()
    }

    #[must_use]
    pub const fn categories(&self) -> usize {
        self.input.categories()
    }

    #[must_use]
    pub const fn prior(&self) -> CompassPriorConfig {
        self.prior
    }

    #[must_use]
    pub const fn tuning(&self) -> CompassProposalTuning {
        self.tuning
    }

    /// Per-category eligibility mask (`indi`).
    #[must_use]
    pub fn eligible(&self) -> &[bool] {
        &self.eligible
    }

    #[must_use]
    pub fn eligible_indices(&self) -> Vec<usize> {
        self.eligible
            .iter()
            .enumerate()
            .filter_map(|(category, eligible)| eligible.then_some(category))
            .collect()
    }

    /// Collapsed log marginal of `subject` for the given responders.
    #[must_use]
    pub fn subject_log_marginal(
        &self,
        subject: usize,
        alpha_s: &[f64],
        alpha_u: &[f64],
        responders: &[bool],
    ) -> f64 {
        likelihood::subject_log_marginal(
            self.input.stimulated.row(subject),
            self.input.unstimulated.row(subject),
            alpha_s,
            alpha_u,
            responders,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputError;

    fn input() -> CountInput {
        CountInput::new(
            CountMatrix::from_rows(&[vec![5, 5, 0], vec![0, 8, 0]]).expect("rows"),
            CountMatrix::from_rows(&[vec![10, 0, 0], vec![0, 10, 0]]).expect("rows"),
        )
    }

    #[test]
    fn eligibility_follows_stimulated_columns() {
        let input = input();
        let context = CompassContext::new(&input, CompassSamplerConfig::default()).expect("ctx");
        assert_eq!(context.eligible(), &[true, true, false]);
        assert_eq!(context.eligible_indices(), vec![0, 1]);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let input = CountInput::new(
            CountMatrix::from_rows(&[vec![1, 2]]).expect("rows"),
            CountMatrix::from_rows(&[vec![1, 2, 3]]).expect("rows"),
        );
        let err = CompassContext::new(&input, CompassSamplerConfig::default()).expect_err("shape");
        assert!(matches!(
            err,
            CompassError::InvalidInput(InputError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn floor_too_large_for_category_count_is_rejected() {
        let input = input();
        let mut config = CompassSamplerConfig::default();
        config.prior_config.floor_numerator = 1.0;
        config.prior_config.floor_denominator = 2.0;
        assert_eq!(
            CompassContext::new(&input, config).map(|_| ()),
            Err(CompassError::InvalidPriorConfig)
        );
    }
}
