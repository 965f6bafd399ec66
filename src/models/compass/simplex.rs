//! Per-subject draws of the stimulated and unstimulated category
//! probabilities (`Ps`, `Pu`).
//!
//! Each subject's draw follows the conjugate posterior given its counts,
//! concentrations, and responding categories:
//!
//! * responding categories get their own gamma variate per condition,
//! * the remaining categories share one background gamma variate per
//!   condition, split by a common relative profile informed by both
//!   conditions' counts.
//!
//! The full scope floors every category at `d / M`; the restricted scope
//! renormalizes that draw over the active categories.

use rand::rngs::StdRng;

use crate::utils::{count_to_f64, normalize_with_floor, set_row, usize_to_f64};

use super::context::CompassContext;
use super::random::{sample_dirichlet_into, sample_gamma};
use super::state::{ActiveSet, ChainState};
use super::types::ProbabilityScope;

#[derive(Debug, Default)]
struct DrawBuffers {
    profile_shapes: Vec<f64>,
    profile: Vec<f64>,
    ps: Vec<f64>,
    pu: Vec<f64>,
}

/// Redraw `Ps` and `Pu` over every category.
pub fn sample_probabilities_full(
    context: &CompassContext<'_>,
    state: &mut ChainState,
    rng: &mut StdRng,
) {
    sample_probabilities_with_scope(context, state, ProbabilityScope::Full, rng);
}

/// Redraw `Ps` and `Pu` with mass only on the active categories.
///
/// With no active category the full-scope draw is kept.
pub fn sample_probabilities(context: &CompassContext<'_>, state: &mut ChainState, rng: &mut StdRng) {
    sample_probabilities_with_scope(context, state, ProbabilityScope::Restricted, rng);
}

pub fn sample_probabilities_with_scope(
    context: &CompassContext<'_>,
    state: &mut ChainState,
    scope: ProbabilityScope,
    rng: &mut StdRng,
) {
    let floor = context.prior().probability_floor();
    let mut buffers = DrawBuffers::default();
    for subject in 0..context.subjects() {
        draw_subject(context, state, subject, &mut buffers, rng);
        normalize_with_floor(&mut buffers.ps, floor);
        normalize_with_floor(&mut buffers.pu, floor);
        if scope == ProbabilityScope::Restricted {
            restrict_to_active(&mut buffers.ps, &state.active);
            restrict_to_active(&mut buffers.pu, &state.active);
        }
        set_row(&mut state.ps, subject, &buffers.ps);
        set_row(&mut state.pu, subject, &buffers.pu);
    }
}

/// Zero every inactive entry and renormalize over the active ones.
///
/// Leaves `row` unchanged when the active set is empty.
pub fn restrict_to_active(row: &mut [f64], active: &ActiveSet) {
    if active.is_empty() {
        return;
    }
    let total: f64 = active.indices().iter().map(|category| row[*category]).sum();
    let uniform = 1.0 / usize_to_f64(active.len());
    for (category, value) in row.iter_mut().enumerate() {
        *value = if !active.contains(category) {
            0.0
        } else if total > 0.0 {
            *value / total
        } else {
            uniform
        };
    }
}

fn draw_subject(
    context: &CompassContext<'_>,
    state: &ChainState,
    subject: usize,
    buffers: &mut DrawBuffers,
    rng: &mut StdRng,
) {
    let categories = context.categories();
    let stimulated = context.stimulated().row(subject);
    let unstimulated = context.unstimulated().row(subject);
    let responders = state.indicators.row(subject);

    buffers.ps.clear();
    buffers.ps.resize(categories, 0.0);
    buffers.pu.clear();
    buffers.pu.resize(categories, 0.0);

    let stimulated_background = draw_condition(
        stimulated,
        &state.alpha_s,
        responders,
        &mut buffers.ps,
        rng,
    );
    let unstimulated_background = draw_condition(
        unstimulated,
        &state.alpha_u,
        responders,
        &mut buffers.pu,
        rng,
    );

    buffers.profile_shapes.clear();
    buffers.profile_shapes.extend(
        (0..categories)
            .filter(|category| !responders[*category])
            .map(|category| {
                state.alpha_u[category]
                    + count_to_f64(stimulated[category])
                    + count_to_f64(unstimulated[category])
            }),
    );
    if buffers.profile_shapes.is_empty() {
        return;
    }
    sample_dirichlet_into(rng, &buffers.profile_shapes, &mut buffers.profile);
    let inactive = (0..categories).filter(|category| !responders[*category]);
    for (category, share) in inactive.zip(&buffers.profile) {
        buffers.ps[category] = stimulated_background * share;
        buffers.pu[category] = unstimulated_background * share;
    }
}

/// Fill the responding entries of `out` and return the background mass, all
/// normalized by the condition's total gamma mass.
fn draw_condition(
    counts: &[u32],
    concentrations: &[f64],
    responders: &[bool],
    out: &mut [f64],
    rng: &mut StdRng,
) -> f64 {
    let mut background_shape = 0.0;
    let mut any_background = false;
    for (category, responds) in responders.iter().enumerate() {
        let shape = concentrations[category] + count_to_f64(counts[category]);
        if *responds {
            out[category] = sample_gamma(rng, shape);
        } else {
            any_background = true;
            background_shape += shape;
        }
    }
    let background = if any_background {
        sample_gamma(rng, background_shape)
    } else {
        0.0
    };
    let total = background
        + responders
            .iter()
            .zip(out.iter())
            .filter(|(responds, _)| **responds)
            .map(|(_, value)| *value)
            .sum::<f64>();
    if !(total > 0.0 && total.is_finite()) {
        return background;
    }
    for (value, responds) in out.iter_mut().zip(responders) {
        if *responds {
            *value /= total;
        }
    }
    background / total
}
