//! Prior specifications and log-density helpers for the response model.

use crate::utils::usize_to_f64;

/// Hyperparameters for the concentration, activation, and floor priors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompassPriorConfig {
    /// Rate of the exponential prior on stimulated concentrations.
    pub lambda_s: f64,
    /// Rate of the exponential prior on unstimulated concentrations.
    pub lambda_u: f64,
    /// Global concentration of the Beta prior on activation weights.
    pub activation_concentration: f64,
    /// Prior mean of each category's activation weight.
    pub activation_base_rate: f64,
    /// Numerator of the full-scope probability floor `d / M`.
    pub floor_numerator: f64,
    /// Denominator of the full-scope probability floor `d / M`.
    pub floor_denominator: f64,
    /// Starting value for every stimulated concentration.
    pub initial_alpha_s: f64,
    /// Starting value for every unstimulated concentration.
    pub initial_alpha_u: f64,
}

impl Default for CompassPriorConfig {
    fn default() -> Self {
        Self {
            lambda_s: 1.0e-3,
            lambda_u: 1.0e-3,
            activation_concentration: 1.0,
            activation_base_rate: 0.5,
            floor_numerator: 1.0,
            floor_denominator: 1.0e12,
            initial_alpha_s: 1.0,
            initial_alpha_u: 1.0,
        }
    }
}

impl CompassPriorConfig {
    /// Whether all prior hyperparameters are numerically valid.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.lambda_s > 0.0
            && self.lambda_s.is_finite()
            && self.lambda_u > 0.0
            && self.lambda_u.is_finite()
            && self.activation_concentration > 0.0
            && self.activation_concentration.is_finite()
            && self.activation_base_rate > 0.0
            && self.activation_base_rate < 1.0
            && self.floor_numerator > 0.0
            && self.floor_denominator > 0.0
            && self.floor_denominator.is_finite()
            && self.initial_alpha_s > 0.0
            && self.initial_alpha_s.is_finite()
            && self.initial_alpha_u > 0.0
            && self.initial_alpha_u.is_finite()
    }

    /// Smallest probability any category receives under the full scope.
    #[must_use]
    pub fn probability_floor(self) -> f64 {
        self.floor_numerator / self.floor_denominator
    }

    /// Whether a floor of `d / M` still leaves room for a simplex over
    /// `categories` entries.
    #[must_use]
    pub fn floor_fits(self, categories: usize) -> bool {
        self.probability_floor() * usize_to_f64(categories) < 1.0
    }
}

/// Log-density of `Exponential(rate)` at `value`.
#[must_use]
pub fn log_exponential_density(value: f64, rate: f64) -> f64 {
    if !(value > 0.0 && rate > 0.0) {
        return f64::NEG_INFINITY;
    }
    rate.ln() - rate * value
}

/// Log prior odds of activating a category for one subject, given the
/// number of other subjects already responding in it.
///
/// The Beta weight is integrated out, so the odds are those of the
/// Beta-Bernoulli predictive with `others` subjects excluding this one.
#[must_use]
pub fn activation_log_prior_odds(
    active_elsewhere: usize,
    others: usize,
    config: CompassPriorConfig,
) -> f64 {
    let on = config.activation_concentration * config.activation_base_rate;
    let off = config.activation_concentration * (1.0 - config.activation_base_rate);
    let active = usize_to_f64(active_elsewhere);
    let inactive = usize_to_f64(others.saturating_sub(active_elsewhere));
    (active + on).ln() - (inactive + off).ln()
}
