//! Sampler entrypoints for the paired-count response model.

use std::sync::atomic::{AtomicBool, Ordering};

use faer::Mat;
use log::{debug, info, trace, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::input::CountInput;
use crate::utils::usize_to_f64;
#[cfg(debug_assertions)]
use crate::utils::{matrix_is_finite, max_abs_diff, row_sums};

use super::activation::update_indicators;
use super::context::CompassContext;
use super::hyper::{
    LogScaleProposal, update_stimulated_concentrations, update_unstimulated_concentrations,
};
use super::simplex::sample_probabilities_with_scope;
use super::state::{ChainState, ResponseIndicators};
use super::types::{
    CompassAcceptanceRates, CompassError, CompassFitOptions, CompassMultiChainOptions,
    CompassMultiChainReport, CompassProposalTuning, CompassReport, CompassSamplerConfig,
    CompassSamplerDiagnostics, ProbabilityScope, UpdateStrategy,
};

/// One retained iteration of a chain.
#[derive(Debug, Clone)]
pub struct ChainDraw {
    /// Zero-based iteration after which the state was captured.
    pub iteration: usize,
    pub ps: Mat<f64>,
    pub pu: Mat<f64>,
    pub alpha_s: Vec<f64>,
    pub alpha_u: Vec<f64>,
    pub indicators: ResponseIndicators,
    /// Active categories (`Istar`), sorted.
    pub active: Vec<usize>,
}

impl ChainDraw {
    fn capture(iteration: usize, state: &ChainState) -> Self {
        Self {
            iteration,
            ps: state.ps.clone(),
            pu: state.pu.clone(),
            alpha_s: state.alpha_s.clone(),
            alpha_u: state.alpha_u.clone(),
            indicators: state.indicators.clone(),
            active: state.active.indices().to_vec(),
        }
    }
}

/// Retained draws of one chain, in iteration order.
#[derive(Debug, Clone, Default)]
pub struct Trajectory {
    pub draws: Vec<ChainDraw>,
}

impl Trajectory {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.draws.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Posterior mean of `Ps`, or `None` without draws.
    #[must_use]
    pub fn mean_ps(&self) -> Option<Mat<f64>> {
        self.mean_of(|draw| &draw.ps)
    }

    /// Posterior mean of `Pu`, or `None` without draws.
    #[must_use]
    pub fn mean_pu(&self) -> Option<Mat<f64>> {
        self.mean_of(|draw| &draw.pu)
    }

    /// Share of retained draws in which each subject responds in each
    /// category.
    #[must_use]
    pub fn response_probabilities(&self) -> Option<Mat<f64>> {
        let first = self.draws.first()?;
        let subjects = first.indicators.subjects();
        let categories = first.indicators.categories();
        let scale = 1.0 / usize_to_f64(self.draws.len());
        Some(Mat::from_fn(subjects, categories, |subject, category| {
            let responding = self
                .draws
                .iter()
                .filter(|draw| draw.indicators.get(subject, category))
                .count();
            usize_to_f64(responding) * scale
        }))
    }

    fn mean_of(&self, select: impl Fn(&ChainDraw) -> &Mat<f64>) -> Option<Mat<f64>> {
        let first = select(self.draws.first()?);
        let mut total = Mat::<f64>::zeros(first.nrows(), first.ncols());
        for draw in &self.draws {
            let matrix = select(draw);
            for row in 0..total.nrows() {
                for col in 0..total.ncols() {
                    total[(row, col)] += matrix[(row, col)];
                }
            }
        }
        let scale = 1.0 / usize_to_f64(self.draws.len());
        Some(Mat::from_fn(total.nrows(), total.ncols(), |row, col| {
            total[(row, col)] * scale
        }))
    }
}

/// Proposal settings for both concentration blocks, adapted during burn-in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConcentrationProposals {
    pub stimulated: LogScaleProposal,
    pub unstimulated: LogScaleProposal,
}

impl ConcentrationProposals {
    #[must_use]
    pub const fn from_tuning(tuning: CompassProposalTuning) -> Self {
        Self {
            stimulated: LogScaleProposal {
                primary_variance: tuning.stimulated_variance_primary,
                secondary_variance: tuning.stimulated_variance_secondary,
                primary_probability: tuning.stimulated_primary_probability,
                slice_max_steps: tuning.slice_max_steps,
            },
            unstimulated: LogScaleProposal::single(
                tuning.unstimulated_variance,
                tuning.slice_max_steps,
            ),
        }
    }
}

/// Run one full iteration: `alpha_u`, `alpha_s`, `Ps`/`Pu`, then the
/// response indicators.
///
/// # Errors
///
/// Returns `CompassError` if the state's activation bookkeeping is
/// inconsistent.
pub fn run_iteration(
    context: &CompassContext<'_>,
    state: &mut ChainState,
    strategy: UpdateStrategy,
    scope: ProbabilityScope,
    proposals: ConcentrationProposals,
    rng: &mut StdRng,
) -> Result<(), CompassError> {
    update_unstimulated_concentrations(context, state, strategy, proposals.unstimulated, rng);
    update_stimulated_concentrations(context, state, strategy, proposals.stimulated, rng);
    sample_probabilities_with_scope(context, state, scope, rng);
    update_indicators(context, state, rng)?;
    Ok(())
}

/// Fit one chain with default priors and proposal tuning.
///
/// # Errors
///
/// Returns `CompassError` if inputs or options are invalid.
pub fn fit_compass(
    input: &CountInput,
    options: CompassFitOptions,
) -> Result<(CompassReport, Trajectory), CompassError> {
    let config = CompassSamplerConfig {
        fit_options: options,
        ..CompassSamplerConfig::default()
    };
    fit_compass_with_config(input, config)
}

/// Fit one chain with explicit prior and proposal settings.
///
/// # Errors
///
/// Returns `CompassError` if inputs or configuration are invalid.
pub fn fit_compass_with_config(
    input: &CountInput,
    config: CompassSamplerConfig,
) -> Result<(CompassReport, Trajectory), CompassError> {
    let context = CompassContext::new(input, config)?;
    let state = ChainState::initialize(&context, config.fit_options.initial_activation);
    run_chain(&context, state, config.fit_options, None)
}

/// Fit one chain, stopping between iterations once `cancel` is set.
///
/// A cancelled run still returns the draws retained so far and reports
/// `cancelled` in its diagnostics.
///
/// # Errors
///
/// Returns `CompassError` if inputs or configuration are invalid.
pub fn fit_compass_with_cancel(
    input: &CountInput,
    config: CompassSamplerConfig,
    cancel: &AtomicBool,
) -> Result<(CompassReport, Trajectory), CompassError> {
    let context = CompassContext::new(input, config)?;
    let state = ChainState::initialize(&context, config.fit_options.initial_activation);
    run_chain(&context, state, config.fit_options, Some(cancel))
}

/// Continue sampling from a caller-supplied state.
///
/// # Errors
///
/// Returns `CompassError` if the schedule is invalid or the state fails its
/// precondition checks.
pub fn fit_compass_from_state(
    context: &CompassContext<'_>,
    state: ChainState,
    options: CompassFitOptions,
) -> Result<(CompassReport, Trajectory), CompassError> {
    options.validate()?;
    run_chain(context, state, options, None)
}

/// Fit independent chains on scoped threads, one seed per chain.
///
/// # Errors
///
/// Returns `CompassError` if inputs, configuration, or multi-chain options
/// are invalid, or if a chain fails or panics.
pub fn fit_compass_multi_chain(
    input: &CountInput,
    config: CompassSamplerConfig,
    multi_chain: CompassMultiChainOptions,
) -> Result<(CompassMultiChainReport, Vec<Trajectory>), CompassError> {
    multi_chain.validate()?;
    CompassContext::new(input, config)?;
    let base_seed = config.fit_options.schedule.seed;
    let seeds: Vec<u64> = (0..multi_chain.chains)
        .map(|chain| multi_chain.chain_seed(base_seed, chain))
        .collect();

    let results = std::thread::scope(|scope| {
        let handles: Vec<_> = seeds
            .iter()
            .map(|seed| {
                let chain_config = config.with_seed(*seed);
                scope.spawn(move || fit_compass_with_config(input, chain_config))
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(chain, handle)| {
                handle
                    .join()
                    .map_err(|_| CompassError::ChainPanicked { chain })?
            })
            .collect::<Result<Vec<_>, CompassError>>()
    })?;

    let (chain_reports, trajectories) = results.into_iter().unzip();
    Ok((
        CompassMultiChainReport {
            chain_reports,
            seeds,
        },
        trajectories,
    ))
}

fn run_chain(
    context: &CompassContext<'_>,
    mut state: ChainState,
    options: CompassFitOptions,
    cancel: Option<&AtomicBool>,
) -> Result<(CompassReport, Trajectory), CompassError> {
    state.check_preconditions(context)?;
    let schedule = options.schedule;
    let tuning = context.tuning();
    let mut rng = StdRng::seed_from_u64(schedule.seed);
    let mut proposals = ConcentrationProposals::from_tuning(tuning);
    let mut window = (state.alpha_s_stats, state.alpha_u_stats);
    let mut draws = Vec::with_capacity(schedule.retained_draws());
    let mut iterations_completed = 0;
    let mut cancelled = false;

    info!(
        "starting chain: {} subjects, {} categories, {} eligible, {} iterations, seed {}",
        context.subjects(),
        context.categories(),
        context.eligible_indices().len(),
        schedule.iterations,
        schedule.seed
    );

    for iteration in 0..schedule.iterations {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            warn!("chain cancelled after {iterations_completed} iterations");
            cancelled = true;
            break;
        }

        run_iteration(
            context,
            &mut state,
            options.strategy,
            options.scope,
            proposals,
            &mut rng,
        )?;
        iterations_completed += 1;

        #[cfg(debug_assertions)]
        if iteration.is_multiple_of(25) {
            debug_assert!(state.check_preconditions(context).is_ok());
            debug_assert!(subject_cache_matches(context, &state));
            debug_assert!(probabilities_are_simplices(&state));
        }

        if options.strategy == UpdateStrategy::MetropolisHastings
            && schedule.adapts_at(iteration, tuning.adaptation_interval)
        {
            let stimulated_rate = state.alpha_s_stats.since(window.0).acceptance_rate();
            let unstimulated_rate = state.alpha_u_stats.since(window.1).acceptance_rate();
            adapt_variance(&mut proposals.stimulated, stimulated_rate, tuning);
            adapt_variance(&mut proposals.unstimulated, unstimulated_rate, tuning);
            window = (state.alpha_s_stats, state.alpha_u_stats);
            debug!(
                "iteration {iteration}: alpha_s acceptance {stimulated_rate:.3}, alpha_u acceptance {unstimulated_rate:.3}, variances {:.4}/{:.4}/{:.4}",
                proposals.stimulated.primary_variance,
                proposals.stimulated.secondary_variance,
                proposals.unstimulated.primary_variance
            );
        }

        if schedule.retains(iteration) {
            trace!(
                "iteration {iteration}: retained draw with {} active categories",
                state.active.len()
            );
            draws.push(ChainDraw::capture(iteration, &state));
        }
    }

    let diagnostics = CompassSamplerDiagnostics {
        iterations_completed,
        retained_draws: draws.len(),
        cancelled,
        acceptance_rates: CompassAcceptanceRates {
            alpha_s: state.alpha_s_stats.acceptance_rate(),
            alpha_u: state.alpha_u_stats.acceptance_rate(),
            activation: state.activation_stats.acceptance_rate(),
        },
        alpha_s_proposals: state.alpha_s_stats,
        alpha_u_proposals: state.alpha_u_stats,
        activation_proposals: state.activation_stats,
        final_active_categories: state.active.indices().to_vec(),
    };
    info!(
        "chain finished: {} iterations, {} draws, acceptance alpha_s {:.3} alpha_u {:.3} activation {:.3}, {} active categories",
        diagnostics.iterations_completed,
        diagnostics.retained_draws,
        diagnostics.acceptance_rates.alpha_s,
        diagnostics.acceptance_rates.alpha_u,
        diagnostics.acceptance_rates.activation,
        diagnostics.final_active_categories.len()
    );

    Ok((
        CompassReport {
            subjects: context.subjects(),
            categories: context.categories(),
            diagnostics,
        },
        Trajectory { draws },
    ))
}

#[cfg(debug_assertions)]
fn subject_cache_matches(context: &CompassContext<'_>, state: &ChainState) -> bool {
    let fresh: Vec<f64> = (0..context.subjects())
        .map(|subject| {
            context.subject_log_marginal(
                subject,
                &state.alpha_s,
                &state.alpha_u,
                state.indicators.row(subject),
            )
        })
        .collect();
    max_abs_diff(&fresh, &state.subject_log_marginal) < 1.0e-8
}

#[cfg(debug_assertions)]
fn probabilities_are_simplices(state: &ChainState) -> bool {
    [&state.ps, &state.pu].iter().all(|matrix| {
        matrix_is_finite(matrix)
            && row_sums(matrix)
                .iter()
                .all(|total| (total - 1.0).abs() < 1.0e-9)
    })
}

fn adapt_variance(proposal: &mut LogScaleProposal, acceptance: f64, tuning: CompassProposalTuning) {
    let factor = adaptation_factor(acceptance, tuning);
    let variance_factor = factor * factor;
    proposal.primary_variance =
        (proposal.primary_variance * variance_factor).max(tuning.min_variance);
    proposal.secondary_variance =
        (proposal.secondary_variance * variance_factor).max(tuning.min_variance);
}

fn adaptation_factor(acceptance: f64, tuning: CompassProposalTuning) -> f64 {
    if acceptance < tuning.acceptance_target_low {
        tuning.scale_decrease_factor
    } else if acceptance > tuning.acceptance_target_high {
        tuning.scale_increase_factor
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::McmcConfig;
    use crate::input::CountMatrix;

    fn input() -> CountInput {
        CountInput::new(
            CountMatrix::from_rows(&[vec![5, 5, 0], vec![0, 8, 2]]).expect("rows"),
            CountMatrix::from_rows(&[vec![10, 0, 0], vec![0, 10, 0]]).expect("rows"),
        )
    }

    fn options(iterations: usize, burn_in: usize, thin: usize) -> CompassFitOptions {
        CompassFitOptions {
            schedule: McmcConfig {
                iterations,
                burn_in,
                thin,
                seed: 7,
                adapt_during_burn_in: true,
            },
            ..CompassFitOptions::default()
        }
    }

    #[test]
    fn fit_returns_thinned_draws_and_diagnostics() {
        let (report, trajectory) = fit_compass(&input(), options(120, 20, 5)).expect("fit");
        assert_eq!(report.subjects, 2);
        assert_eq!(report.categories, 3);
        assert_eq!(report.diagnostics.iterations_completed, 120);
        assert_eq!(trajectory.len(), 20);
        assert_eq!(report.diagnostics.retained_draws, 20);
        assert_eq!(trajectory.draws[0].iteration, 20);
        assert_eq!(trajectory.draws[1].iteration, 25);
        assert!(!report.diagnostics.cancelled);
        assert_eq!(report.diagnostics.alpha_s_proposals.proposed, 120 * 3);
        assert_eq!(report.diagnostics.activation_proposals.proposed, 120 * 2 * 3);
    }

    #[test]
    fn exact_conditional_strategy_keeps_no_alpha_tallies() {
        let mut fit_options = options(60, 10, 1);
        fit_options.strategy = UpdateStrategy::ExactConditional;
        let (report, trajectory) = fit_compass(&input(), fit_options).expect("fit");
        assert_eq!(report.diagnostics.alpha_s_proposals.proposed, 0);
        assert_eq!(report.diagnostics.alpha_u_proposals.proposed, 0);
        assert!(
            trajectory
                .draws
                .iter()
                .flat_map(|draw| draw.alpha_s.iter().chain(&draw.alpha_u))
                .all(|value| value.is_finite() && *value > 0.0)
        );
    }

    #[test]
    fn preset_cancellation_stops_before_first_iteration() {
        let cancel = AtomicBool::new(true);
        let config = CompassSamplerConfig {
            fit_options: options(50, 0, 1),
            ..CompassSamplerConfig::default()
        };
        let (report, trajectory) = fit_compass_with_cancel(&input(), config, &cancel).expect("fit");
        assert!(report.diagnostics.cancelled);
        assert_eq!(report.diagnostics.iterations_completed, 0);
        assert!(trajectory.is_empty());
    }

    #[test]
    fn adaptation_shrinks_variance_on_low_acceptance() {
        let tuning = CompassProposalTuning::default();
        let mut proposal = LogScaleProposal::single(1.0, 10);
        adapt_variance(&mut proposal, 0.0, tuning);
        assert!((proposal.primary_variance - 0.64).abs() < 1e-12);
        adapt_variance(&mut proposal, 0.3, tuning);
        assert!((proposal.primary_variance - 0.64).abs() < 1e-12);
    }

    #[test]
    fn trajectory_summaries_average_draws() {
        let (_, trajectory) = fit_compass(&input(), options(80, 40, 1)).expect("fit");
        let mean_ps = trajectory.mean_ps().expect("mean");
        let responses = trajectory.response_probabilities().expect("responses");
        for subject in 0..2 {
            let total: f64 = (0..3).map(|category| mean_ps[(subject, category)]).sum();
            assert!((total - 1.0).abs() < 1e-9);
            for category in 0..3 {
                assert!((0.0..=1.0).contains(&responses[(subject, category)]));
            }
        }
        assert!(Trajectory::default().mean_pu().is_none());
    }
}
