//! Collapsed log marginal likelihoods for one subject's paired counts.
//!
//! The category probabilities are integrated out. With responders `A`, the
//! stimulated vector lumps every non-responding category into a single
//! background bucket, and the non-responding categories share the
//! unstimulated relative profile.

use statrs::function::gamma::ln_gamma;

use crate::utils::count_to_f64;

/// `ln B(v) = sum ln Gamma(v_k) - ln Gamma(sum v_k)`.
#[must_use]
pub fn ln_multivariate_beta(values: &[f64]) -> f64 {
    let total: f64 = values.iter().sum();
    values.iter().map(|value| ln_gamma(*value)).sum::<f64>() - ln_gamma(total)
}

/// Dirichlet-multinomial marginal where responding categories keep their own
/// concentration and the rest are lumped into one bucket.
///
/// Zero when no category responds, since the lump then holds every count.
#[must_use]
pub fn partitioned_log_marginal(counts: &[u32], concentrations: &[f64], responders: &[bool]) -> f64 {
    let mut value = 0.0;
    let mut prior_total = 0.0;
    let mut count_total = 0.0;
    let mut lump_prior = 0.0;
    let mut lump_count = 0.0;
    let mut any_lumped = false;
    for ((count, alpha), responds) in counts.iter().zip(concentrations).zip(responders) {
        let count = count_to_f64(*count);
        prior_total += alpha;
        count_total += count;
        if *responds {
            value += ln_gamma(alpha + count) - ln_gamma(*alpha);
        } else {
            any_lumped = true;
            lump_prior += alpha;
            lump_count += count;
        }
    }
    if any_lumped {
        value += ln_gamma(lump_prior + lump_count) - ln_gamma(lump_prior);
    }
    value + ln_gamma(prior_total) - ln_gamma(prior_total + count_total)
}

/// Marginal of the relative profile shared by the non-responding categories,
/// observed through both conditions. Zero when every category responds.
#[must_use]
pub fn shared_profile_log_marginal(
    stimulated: &[u32],
    unstimulated: &[u32],
    concentrations: &[f64],
    responders: &[bool],
) -> f64 {
    let mut value = 0.0;
    let mut prior_total = 0.0;
    let mut posterior_total = 0.0;
    for (((n_s, n_u), alpha), responds) in stimulated
        .iter()
        .zip(unstimulated)
        .zip(concentrations)
        .zip(responders)
    {
        if *responds {
            continue;
        }
        let posterior = alpha + count_to_f64(*n_s) + count_to_f64(*n_u);
        value += ln_gamma(posterior) - ln_gamma(*alpha);
        prior_total += alpha;
        posterior_total += posterior;
    }
    if prior_total > 0.0 {
        value + ln_gamma(prior_total) - ln_gamma(posterior_total)
    } else {
        value
    }
}

/// Stimulated part of the subject marginal; depends on `alpha_s` only.
#[must_use]
pub fn stimulated_log_marginal(stimulated: &[u32], alpha_s: &[f64], responders: &[bool]) -> f64 {
    partitioned_log_marginal(stimulated, alpha_s, responders)
}

/// Unstimulated part of the subject marginal; depends on `alpha_u` only.
#[must_use]
pub fn unstimulated_log_marginal(
    stimulated: &[u32],
    unstimulated: &[u32],
    alpha_u: &[f64],
    responders: &[bool],
) -> f64 {
    partitioned_log_marginal(unstimulated, alpha_u, responders)
        + shared_profile_log_marginal(stimulated, unstimulated, alpha_u, responders)
}

/// Full collapsed log marginal likelihood of one subject.
#[must_use]
pub fn subject_log_marginal(
    stimulated: &[u32],
    unstimulated: &[u32],
    alpha_s: &[f64],
    alpha_u: &[f64],
    responders: &[bool],
) -> f64 {
    stimulated_log_marginal(stimulated, alpha_s, responders)
        + unstimulated_log_marginal(stimulated, unstimulated, alpha_u, responders)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn pooled(counts: &[u32], alpha: &[f64]) -> f64 {
        let posterior: Vec<f64> = counts
            .iter()
            .zip(alpha)
            .map(|(count, alpha)| alpha + f64::from(*count))
            .collect();
        ln_multivariate_beta(&posterior) - ln_multivariate_beta(alpha)
    }

    #[test]
    fn no_responders_reduces_to_pooled_dirichlet_multinomial() {
        let n_s = [5, 5, 0];
        let n_u = [10, 0, 0];
        let alpha = [1.0, 2.0, 0.5];
        let none = [false; 3];
        let pooled_counts = [15, 5, 0];
        assert_relative_eq!(
            subject_log_marginal(&n_s, &n_u, &alpha, &alpha, &none),
            pooled(&pooled_counts, &alpha),
            epsilon = 1e-10
        );
        assert_relative_eq!(stimulated_log_marginal(&n_s, &alpha, &none), 0.0);
    }

    #[test]
    fn every_category_responding_splits_conditions() {
        let n_s = [5, 5, 0];
        let n_u = [10, 0, 0];
        let alpha_s = [1.0, 1.0, 1.0];
        let alpha_u = [2.0, 0.5, 1.5];
        let all = [true; 3];
        assert_relative_eq!(
            subject_log_marginal(&n_s, &n_u, &alpha_s, &alpha_u, &all),
            pooled(&n_s, &alpha_s) + pooled(&n_u, &alpha_u),
            epsilon = 1e-10
        );
    }

    #[test]
    fn divergent_category_favours_response() {
        let n_s = [5, 5, 0];
        let n_u = [10, 0, 0];
        let alpha = [1.0; 3];
        let none = subject_log_marginal(&n_s, &n_u, &alpha, &alpha, &[false; 3]);
        let second = subject_log_marginal(&n_s, &n_u, &alpha, &alpha, &[false, true, false]);
        assert!(second > none);
    }

    #[test]
    fn zero_cell_subject_has_zero_marginal() {
        let alpha = [1.0, 3.0];
        for responders in [[false, false], [true, false], [true, true]] {
            assert_relative_eq!(
                subject_log_marginal(&[0, 0], &[0, 0], &alpha, &alpha, &responders),
                0.0,
                epsilon = 1e-12
            );
        }
    }
}
