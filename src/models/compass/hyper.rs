//! Concentration updaters for the stimulated and unstimulated Dirichlet
//! priors.
//!
//! Both conditions share one updater, [`update_concentrations`], which walks
//! the categories in index order and redraws each concentration on the log
//! scale, either by a Metropolis-Hastings random walk or by slice sampling
//! the exact full conditional.

use rand::RngExt;
use rand::rngs::StdRng;

use crate::inference::ProposalStats;
use crate::input::CountMatrix;

use super::context::CompassContext;
use super::likelihood::{stimulated_log_marginal, unstimulated_log_marginal};
use super::priors::log_exponential_density;
use super::random::{sample_standard_normal, should_accept};
use super::state::{ChainState, ResponseIndicators};
use super::types::UpdateStrategy;

const MAX_SHRINK_STEPS: usize = 200;

/// Unnormalized log full conditional of one category's concentration.
pub trait ConcentrationTarget {
    /// Log conditional density at `concentrations[category]`, holding every
    /// other entry fixed. Terms that do not involve `category` may be included.
    fn log_conditional(&self, category: usize, concentrations: &[f64]) -> f64;
}

/// Target for `alpha_s`: exponential prior plus the stimulated marginals of
/// subjects with at least one responding category.
#[derive(Debug, Clone, Copy)]
pub struct StimulatedConcentration<'a> {
    pub stimulated: &'a CountMatrix,
    pub indicators: &'a ResponseIndicators,
    pub rate: f64,
}

impl ConcentrationTarget for StimulatedConcentration<'_> {
    fn log_conditional(&self, category: usize, concentrations: &[f64]) -> f64 {
        let prior = log_exponential_density(concentrations[category], self.rate);
        if !prior.is_finite() {
            return prior;
        }
        let likelihood: f64 = (0..self.stimulated.subjects())
            .map(|subject| self.indicators.row(subject))
            .enumerate()
            .filter(|(_, responders)| responders.iter().any(|responds| *responds))
            .map(|(subject, responders)| {
                stimulated_log_marginal(self.stimulated.row(subject), concentrations, responders)
            })
            .sum();
        prior + likelihood
    }
}

/// Target for `alpha_u`: exponential prior plus every subject's unstimulated
/// and shared-profile marginals.
#[derive(Debug, Clone, Copy)]
pub struct UnstimulatedConcentration<'a> {
    pub stimulated: &'a CountMatrix,
    pub unstimulated: &'a CountMatrix,
    pub indicators: &'a ResponseIndicators,
    pub rate: f64,
}

impl ConcentrationTarget for UnstimulatedConcentration<'_> {
    fn log_conditional(&self, category: usize, concentrations: &[f64]) -> f64 {
        let prior = log_exponential_density(concentrations[category], self.rate);
        if !prior.is_finite() {
            return prior;
        }
        let likelihood: f64 = (0..self.unstimulated.subjects())
            .map(|subject| {
                unstimulated_log_marginal(
                    self.stimulated.row(subject),
                    self.unstimulated.row(subject),
                    concentrations,
                    self.indicators.row(subject),
                )
            })
            .sum();
        prior + likelihood
    }
}

/// Log-scale proposal settings for one condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogScaleProposal {
    /// Variance used with probability `primary_probability`.
    pub primary_variance: f64,
    pub secondary_variance: f64,
    pub primary_probability: f64,
    /// Stepping-out limit for the exact-conditional strategy.
    pub slice_max_steps: usize,
}

impl LogScaleProposal {
    /// A proposal with a single variance.
    #[must_use]
    pub const fn single(variance: f64, slice_max_steps: usize) -> Self {
        Self {
            primary_variance: variance,
            secondary_variance: variance,
            primary_probability: 1.0,
            slice_max_steps,
        }
    }

    fn draw_scale(self, rng: &mut StdRng) -> f64 {
        if self.primary_probability >= 1.0 || rng.random::<f64>() < self.primary_probability {
            self.primary_variance.sqrt()
        } else {
            self.secondary_variance.sqrt()
        }
    }
}

/// Redraw every entry of `concentrations` against `target`.
///
/// Only `concentrations` is modified. Returns the proposal tallies for this
/// sweep; the exact-conditional strategy always moves and records nothing.
pub fn update_concentrations<T: ConcentrationTarget>(
    target: &T,
    concentrations: &mut [f64],
    strategy: UpdateStrategy,
    proposal: LogScaleProposal,
    rng: &mut StdRng,
) -> ProposalStats {
    let mut stats = ProposalStats::default();
    for category in 0..concentrations.len() {
        match strategy {
            UpdateStrategy::MetropolisHastings => {
                stats.record(metropolis_step(target, category, concentrations, proposal, rng));
            }
            UpdateStrategy::ExactConditional => {
                slice_step(target, category, concentrations, proposal, rng);
            }
        }
    }
    stats
}

fn log_scale_density<T: ConcentrationTarget>(
    target: &T,
    category: usize,
    concentrations: &mut [f64],
    log_value: f64,
) -> f64 {
    concentrations[category] = log_value.exp();
    target.log_conditional(category, concentrations) + log_value
}

fn metropolis_step<T: ConcentrationTarget>(
    target: &T,
    category: usize,
    concentrations: &mut [f64],
    proposal: LogScaleProposal,
    rng: &mut StdRng,
) -> bool {
    let current = concentrations[category];
    let current_log = current.ln();
    let current_density = target.log_conditional(category, concentrations) + current_log;
    let scale = proposal.draw_scale(rng);
    let candidate_log = scale.mul_add(sample_standard_normal(rng), current_log);
    let candidate_density = log_scale_density(target, category, concentrations, candidate_log);

    let log_acceptance = candidate_density - current_density;
    if log_acceptance.is_finite() && should_accept(log_acceptance, rng) {
        true
    } else {
        concentrations[category] = current;
        false
    }
}

fn slice_step<T: ConcentrationTarget>(
    target: &T,
    category: usize,
    concentrations: &mut [f64],
    proposal: LogScaleProposal,
    rng: &mut StdRng,
) {
    let current = concentrations[category];
    let x0 = current.ln();
    let width = proposal.draw_scale(rng);
    let level = log_scale_density(target, category, concentrations, x0)
        + (1.0_f64 - rng.random::<f64>()).max(f64::MIN_POSITIVE).ln();

    let mut left = width.mul_add(-rng.random::<f64>(), x0);
    let mut right = left + width;
    let steps = proposal.slice_max_steps;
    let mut left_steps = rng.random_range(0..steps);
    let mut right_steps = steps - 1 - left_steps;
    while left_steps > 0 && log_scale_density(target, category, concentrations, left) > level {
        left -= width;
        left_steps -= 1;
    }
    while right_steps > 0 && log_scale_density(target, category, concentrations, right) > level {
        right += width;
        right_steps -= 1;
    }

    for _ in 0..MAX_SHRINK_STEPS {
        let candidate = (right - left).mul_add(rng.random::<f64>(), left);
        if log_scale_density(target, category, concentrations, candidate) > level {
            return;
        }
        if candidate < x0 {
            left = candidate;
        } else {
            right = candidate;
        }
    }
    concentrations[category] = current;
}

/// Redraw `alpha_u` in place and add the tallies to the chain state.
pub fn update_unstimulated_concentrations(
    context: &CompassContext<'_>,
    state: &mut ChainState,
    strategy: UpdateStrategy,
    proposal: LogScaleProposal,
    rng: &mut StdRng,
) {
    let target = UnstimulatedConcentration {
        stimulated: context.stimulated(),
        unstimulated: context.unstimulated(),
        indicators: &state.indicators,
        rate: context.prior().lambda_u,
    };
    let stats = update_concentrations(&target, &mut state.alpha_u, strategy, proposal, rng);
    state.alpha_u_stats.absorb(stats);
}

/// Redraw `alpha_s` in place and add the tallies to the chain state.
pub fn update_stimulated_concentrations(
    context: &CompassContext<'_>,
    state: &mut ChainState,
    strategy: UpdateStrategy,
    proposal: LogScaleProposal,
    rng: &mut StdRng,
) {
    let target = StimulatedConcentration {
        stimulated: context.stimulated(),
        indicators: &state.indicators,
        rate: context.prior().lambda_s,
    };
    let stats = update_concentrations(&target, &mut state.alpha_s, strategy, proposal, rng);
    state.alpha_s_stats.absorb(stats);
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    use super::*;
    use crate::utils::usize_to_f64;

    /// Gamma(shape, rate) on the concentration itself, for checking the
    /// updaters against a known target.
    struct GammaTarget {
        shape: f64,
        rate: f64,
    }

    impl ConcentrationTarget for GammaTarget {
        fn log_conditional(&self, category: usize, concentrations: &[f64]) -> f64 {
            let value = concentrations[category];
            if value <= 0.0 {
                return f64::NEG_INFINITY;
            }
            (self.shape - 1.0).mul_add(value.ln(), -self.rate * value)
        }
    }

    fn mean_after(strategy: UpdateStrategy, sweeps: usize) -> (f64, ProposalStats) {
        let target = GammaTarget {
            shape: 3.0,
            rate: 2.0,
        };
        let mut rng = StdRng::seed_from_u64(17);
        let mut values = vec![1.0];
        let mut stats = ProposalStats::default();
        let mut total = 0.0;
        for _ in 0..sweeps {
            stats.absorb(update_concentrations(
                &target,
                &mut values,
                strategy,
                LogScaleProposal::single(0.5, 10),
                &mut rng,
            ));
            total += values[0];
        }
        (total / usize_to_f64(sweeps), stats)
    }

    #[test]
    fn metropolis_targets_known_mean() {
        let (mean, stats) = mean_after(UpdateStrategy::MetropolisHastings, 20_000);
        assert_relative_eq!(mean, 1.5, max_relative = 0.06);
        assert_eq!(stats.proposed, 20_000);
        assert!(stats.accepted > 0 && stats.accepted < stats.proposed);
    }

    #[test]
    fn exact_conditional_targets_known_mean_without_tallies() {
        let (mean, stats) = mean_after(UpdateStrategy::ExactConditional, 20_000);
        assert_relative_eq!(mean, 1.5, max_relative = 0.06);
        assert_eq!(stats, ProposalStats::default());
    }

    #[test]
    fn updaters_leave_counts_and_indicators_untouched() {
        let stimulated = CountMatrix::from_rows(&[vec![5, 5, 0], vec![0, 8, 2]]).expect("rows");
        let unstimulated = CountMatrix::from_rows(&[vec![10, 0, 0], vec![0, 10, 0]]).expect("rows");
        let indicators =
            ResponseIndicators::from_rows(&[vec![false, true, false], vec![false; 3]], 2, 3)
                .expect("indicators");
        let before = (stimulated.clone(), unstimulated.clone(), indicators.clone());
        let mut rng = StdRng::seed_from_u64(9);
        let mut alpha_s = vec![1.0; 3];
        let mut alpha_u = vec![1.0; 3];
        let proposal = LogScaleProposal::single(0.2, 10);
        for strategy in [UpdateStrategy::MetropolisHastings, UpdateStrategy::ExactConditional] {
            let stim = StimulatedConcentration {
                stimulated: &stimulated,
                indicators: &indicators,
                rate: 0.1,
            };
            update_concentrations(&stim, &mut alpha_s, strategy, proposal, &mut rng);
            let unstim = UnstimulatedConcentration {
                stimulated: &stimulated,
                unstimulated: &unstimulated,
                indicators: &indicators,
                rate: 0.1,
            };
            update_concentrations(&unstim, &mut alpha_u, strategy, proposal, &mut rng);
        }
        assert_eq!((stimulated, unstimulated, indicators), before);
        assert!(
            alpha_s
                .iter()
                .chain(&alpha_u)
                .all(|value| value.is_finite() && *value > 0.0)
        );
    }

    #[test]
    fn stimulated_target_ignores_subjects_without_responders() {
        let stimulated = CountMatrix::from_rows(&[vec![4, 1]]).expect("rows");
        let indicators = ResponseIndicators::none(1, 2);
        let target = StimulatedConcentration {
            stimulated: &stimulated,
            indicators: &indicators,
            rate: 0.5,
        };
        assert_relative_eq!(
            target.log_conditional(0, &[2.0, 1.0]),
            log_exponential_density(2.0, 0.5)
        );
    }
}
