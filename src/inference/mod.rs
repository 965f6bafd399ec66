//! Reusable MCMC schedule and proposal bookkeeping.

use thiserror::Error;

use crate::utils::usize_to_f64;

/// Errors for generic MCMC schedule configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InferenceError {
    #[error("iterations must be positive")]
    InvalidIterations,
    #[error("burn-in ({burn_in}) must be smaller than iterations ({iterations})")]
    InvalidBurnIn { burn_in: usize, iterations: usize },
    #[error("thinning interval must be positive")]
    InvalidThinning,
}

/// Fixed-length chain schedule.
///
/// The chain always runs `iterations` sweeps; there is no convergence-based
/// early stopping. Draws from iteration `burn_in` onwards are retained every
/// `thin` iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McmcConfig {
    pub iterations: usize,
    pub burn_in: usize,
    pub thin: usize,
    pub seed: u64,
    pub adapt_during_burn_in: bool,
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self {
            iterations: 4_000,
            burn_in: 1_000,
            thin: 1,
            seed: 42,
            adapt_during_burn_in: true,
        }
    }
}

impl McmcConfig {
    /// # Errors
    ///
    /// Returns `InferenceError` if schedule values are invalid.
    pub const fn validate(self) -> Result<(), InferenceError> {
        if self.iterations == 0 {
            return Err(InferenceError::InvalidIterations);
        }
        if self.burn_in >= self.iterations {
            return Err(InferenceError::InvalidBurnIn {
                burn_in: self.burn_in,
                iterations: self.iterations,
            });
        }
        if self.thin == 0 {
            return Err(InferenceError::InvalidThinning);
        }
        Ok(())
    }

    /// Number of retained draws implied by this configuration.
    #[must_use]
    pub const fn retained_draws(self) -> usize {
        (self.iterations - self.burn_in).div_ceil(self.thin)
    }

    /// Whether the state after zero-based iteration `iteration` is retained.
    #[must_use]
    pub const fn retains(self, iteration: usize) -> bool {
        iteration >= self.burn_in && (iteration - self.burn_in).is_multiple_of(self.thin)
    }

    /// Whether proposal variances may be adapted after iteration `iteration`.
    #[must_use]
    pub const fn adapts_at(self, iteration: usize, interval: usize) -> bool {
        self.adapt_during_burn_in
            && interval > 0
            && iteration < self.burn_in
            && (iteration + 1).is_multiple_of(interval)
    }
}

/// Proposal counters for a single Metropolis-Hastings block.
///
/// Both counters only ever grow within a chain, and `accepted <= proposed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
}

impl ProposalStats {
    /// Record one proposal and whether it was accepted.
    pub const fn record(&mut self, accepted: bool) {
        self.proposed += 1;
        if accepted {
            self.accepted += 1;
        }
    }

    /// Fold the counts of another block into this one.
    pub const fn absorb(&mut self, other: Self) {
        self.proposed += other.proposed;
        self.accepted += other.accepted;
    }

    /// Counts accumulated since `earlier` was captured.
    #[must_use]
    pub const fn since(self, earlier: Self) -> Self {
        Self {
            proposed: self.proposed.saturating_sub(earlier.proposed),
            accepted: self.accepted.saturating_sub(earlier.accepted),
        }
    }

    /// Acceptance rate in `[0, 1]`, or `0` if no proposals were made.
    #[must_use]
    pub fn acceptance_rate(self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            usize_to_f64(self.accepted) / usize_to_f64(self.proposed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation_rejects_zero_iterations() {
        let config = McmcConfig {
            iterations: 0,
            ..McmcConfig::default()
        };
        assert_eq!(config.validate(), Err(InferenceError::InvalidIterations));
    }

    #[test]
    fn retention_follows_burn_in_and_thinning() {
        let config = McmcConfig {
            iterations: 10,
            burn_in: 3,
            thin: 3,
            ..McmcConfig::default()
        };
        let retained: Vec<usize> = (0..config.iterations)
            .filter(|iter| config.retains(*iter))
            .collect();
        assert_eq!(retained, vec![3, 6, 9]);
        assert_eq!(config.retained_draws(), retained.len());
    }

    #[test]
    fn adaptation_stops_after_burn_in() {
        let config = McmcConfig {
            iterations: 100,
            burn_in: 50,
            ..McmcConfig::default()
        };
        assert!(config.adapts_at(24, 25));
        assert!(!config.adapts_at(23, 25));
        assert!(!config.adapts_at(74, 25));
    }

    #[test]
    fn proposal_stats_tracks_acceptance() {
        let mut stats = ProposalStats::default();
        stats.record(true);
        stats.record(false);
        assert!((stats.acceptance_rate() - 0.5).abs() < 1.0e-12);

        let snapshot = stats;
        stats.record(true);
        let window = stats.since(snapshot);
        assert_eq!(window, ProposalStats { proposed: 1, accepted: 1 });
    }
}
