//! Metropolis-Hastings updates of the response indicators (`gammat`).
//!
//! Each subject makes as many moves as there are eligible categories. A move
//! is either a flip, toggling one category, or a swap, turning one responding
//! category off and one non-responding category on. Acceptance combines the
//! change in the subject's collapsed marginal with the Beta-Bernoulli prior
//! on activation, whose weights are integrated out. The multiplicities, the
//! active set, and the cached subject marginals are kept in step with every
//! accepted move.

use rand::RngExt;
use rand::rngs::StdRng;

use crate::inference::ProposalStats;

use super::context::CompassContext;
use super::priors::{CompassPriorConfig, activation_log_prior_odds};
use super::random::should_accept;
use super::state::ChainState;
use super::types::CompassError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Flip(usize),
    Swap { off: usize, on: usize },
}

/// Sweep every subject's response indicators once.
///
/// Returns this sweep's tallies; they are also added to the chain state's
/// activation counters (`pb1` proposals, `pb2` acceptances).
///
/// # Errors
///
/// Returns `CompassError` before any draw if the active set, multiplicities,
/// and indicators disagree, or a subject responds in an ineligible category.
pub fn update_indicators(
    context: &CompassContext<'_>,
    state: &mut ChainState,
    rng: &mut StdRng,
) -> Result<ProposalStats, CompassError> {
    state.check_preconditions(context)?;
    state.refresh_subject_log_marginals(context);

    let eligible = context.eligible_indices();
    let mut stats = ProposalStats::default();
    if eligible.is_empty() {
        return Ok(stats);
    }

    let flip_probability = context.tuning().flip_probability;
    let mut candidate_row = Vec::with_capacity(context.categories());
    for subject in 0..context.subjects() {
        for _ in 0..eligible.len() {
            let proposal = propose(state, subject, &eligible, flip_probability, rng);
            candidate_row.clear();
            candidate_row.extend_from_slice(state.indicators.row(subject));
            apply(&mut candidate_row, proposal);

            let candidate_marginal = context.subject_log_marginal(
                subject,
                &state.alpha_s,
                &state.alpha_u,
                &candidate_row,
            );
            let log_acceptance = candidate_marginal - state.subject_log_marginal[subject]
                + prior_log_ratio(state, subject, proposal, context.subjects(), context.prior())
                + hastings_log_ratio(
                    state.indicators.row(subject),
                    &candidate_row,
                    proposal,
                    &eligible,
                    flip_probability,
                );

            let accepted = log_acceptance.is_finite() && should_accept(log_acceptance, rng);
            stats.record(accepted);
            if accepted {
                commit(state, subject, proposal);
                state.subject_log_marginal[subject] = candidate_marginal;
            }
        }
    }

    state.activation_stats.absorb(stats);
    Ok(stats)
}

fn propose(
    state: &ChainState,
    subject: usize,
    eligible: &[usize],
    flip_probability: f64,
    rng: &mut StdRng,
) -> Move {
    let row = state.indicators.row(subject);
    if rng.random::<f64>() >= flip_probability {
        let responding = eligible.iter().filter(|category| row[**category]).count();
        let silent = eligible.len() - responding;
        if responding > 0 && silent > 0 {
            let off = nth_matching(row, eligible, true, rng.random_range(0..responding));
            let on = nth_matching(row, eligible, false, rng.random_range(0..silent));
            return Move::Swap { off, on };
        }
    }
    Move::Flip(eligible[rng.random_range(0..eligible.len())])
}

fn nth_matching(row: &[bool], eligible: &[usize], value: bool, n: usize) -> usize {
    eligible
        .iter()
        .copied()
        .filter(|category| row[*category] == value)
        .nth(n)
        .unwrap_or(eligible[0])
}

fn apply(row: &mut [bool], proposal: Move) {
    match proposal {
        Move::Flip(category) => row[category] = !row[category],
        Move::Swap { off, on } => {
            row[off] = false;
            row[on] = true;
        }
    }
}

fn commit(state: &mut ChainState, subject: usize, proposal: Move) {
    match proposal {
        Move::Flip(category) => {
            let value = !state.indicators.get(subject, category);
            set_indicator(state, subject, category, value);
        }
        Move::Swap { off, on } => {
            set_indicator(state, subject, off, false);
            set_indicator(state, subject, on, true);
        }
    }
}

fn set_indicator(state: &mut ChainState, subject: usize, category: usize, value: bool) {
    state.indicators.set(subject, category, value);
    if value {
        state.multiplicities[category] += 1;
        if state.multiplicities[category] == 1 {
            state.active.insert(category);
        }
    } else {
        state.multiplicities[category] -= 1;
        if state.multiplicities[category] == 0 {
            state.active.remove(category);
        }
    }
}

/// Log prior ratio of the proposed indicators against the current ones.
fn prior_log_ratio(
    state: &ChainState,
    subject: usize,
    proposal: Move,
    subjects: usize,
    prior: CompassPriorConfig,
) -> f64 {
    let others = subjects - 1;
    let switch = |category: usize, on: bool| {
        let responds = state.indicators.get(subject, category);
        let elsewhere = state.multiplicities[category] - usize::from(responds);
        let odds = activation_log_prior_odds(elsewhere, others, prior);
        if on { odds } else { -odds }
    };
    match proposal {
        Move::Flip(category) => switch(category, !state.indicators.get(subject, category)),
        Move::Swap { off, on } => switch(off, false) + switch(on, true),
    }
}

/// Correction for flips forced when a swap is impossible, which makes the
/// flip probability depend on the state it starts from.
fn hastings_log_ratio(
    current: &[bool],
    candidate: &[bool],
    proposal: Move,
    eligible: &[usize],
    flip_probability: f64,
) -> f64 {
    match proposal {
        Move::Swap { .. } => 0.0,
        Move::Flip(_) => {
            flip_weight(candidate, eligible, flip_probability).ln()
                - flip_weight(current, eligible, flip_probability).ln()
        }
    }
}

fn flip_weight(row: &[bool], eligible: &[usize], flip_probability: f64) -> f64 {
    let responding = eligible.iter().filter(|category| row[**category]).count();
    if responding == 0 || responding == eligible.len() {
        1.0
    } else {
        flip_probability
    }
}
