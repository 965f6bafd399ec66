//! Core public types for the COMPASS-style response model.

use super::priors::CompassPriorConfig;
use crate::inference::{InferenceError, McmcConfig, ProposalStats};
use crate::input::InputError;
use thiserror::Error;

/// Errors returned by configuration, precondition checks, and fitting.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CompassError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error(transparent)]
    InvalidSchedule(#[from] InferenceError),
    #[error("{what} has shape {found_rows}x{found_cols}; expected {rows}x{cols}")]
    ShapeMismatch {
        what: &'static str,
        found_rows: usize,
        found_cols: usize,
        rows: usize,
        cols: usize,
    },
    #[error("invalid prior configuration")]
    InvalidPriorConfig,
    #[error("invalid proposal tuning configuration")]
    InvalidProposalTuning,
    #[error("{what} concentration for category {category} must be positive and finite, got {value}")]
    InvalidConcentration {
        what: &'static str,
        category: usize,
        value: f64,
    },
    #[error("declared active-set size ({declared}) differs from its {actual} distinct indices")]
    ActiveSetSizeMismatch { declared: usize, actual: usize },
    #[error("active category index {index} is outside 0..{categories}")]
    ActiveIndexOutOfRange { index: usize, categories: usize },
    #[error("active set disagrees with the response indicators at category {category}")]
    InconsistentActiveSet { category: usize },
    #[error("subject {subject} responds in category {category}, which has no stimulated cells")]
    IneligibleResponse { subject: usize, category: usize },
    #[error("multi-chain runs require at least {min} chains; found {found}")]
    InvalidChainCount { min: usize, found: usize },
    #[error("multi-chain seed stride must be positive")]
    InvalidSeedStride,
    #[error("chain {chain} panicked")]
    ChainPanicked { chain: usize },
}

/// How the concentration hyperparameters are redrawn each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateStrategy {
    /// Log-scale random-walk Metropolis-Hastings with acceptance tallies.
    #[default]
    MetropolisHastings,
    /// Draw from the exact full conditional by slice sampling on the log
    /// scale. Every step moves; no acceptance tallies are kept.
    ExactConditional,
}

/// Which categories the stored probability vectors range over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbabilityScope {
    /// Mass on every category, floored so inactive categories keep support.
    #[default]
    Full,
    /// Mass renormalized over the currently active categories only.
    Restricted,
}

/// Response indicators used to start a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialActivation {
    /// No subject responds in any category.
    #[default]
    Empty,
    /// A subject responds where its stimulated proportion exceeds its
    /// unstimulated proportion.
    Empirical,
}

/// Sampler options for one chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompassFitOptions {
    pub schedule: McmcConfig,
    pub strategy: UpdateStrategy,
    pub scope: ProbabilityScope,
    pub initial_activation: InitialActivation,
}

impl CompassFitOptions {
    /// # Errors
    ///
    /// Returns `CompassError` if the schedule is invalid.
    pub fn validate(self) -> Result<(), CompassError> {
        self.schedule.validate()?;
        Ok(())
    }
}

/// Proposal variances, move mix, and adaptation controls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompassProposalTuning {
    /// First log-scale variance for stimulated concentrations (`var_1`).
    pub stimulated_variance_primary: f64,
    /// Second log-scale variance for stimulated concentrations (`var_2`).
    pub stimulated_variance_secondary: f64,
    /// Probability of using the first variance (`p_var`).
    pub stimulated_primary_probability: f64,
    /// Log-scale variance for unstimulated concentrations (`var_p`).
    pub unstimulated_variance: f64,
    /// Probability of a single-category flip move versus a swap move (`pp`).
    pub flip_probability: f64,
    /// Stepping-out limit for the slice-sampled exact conditional (`ttt`).
    pub slice_max_steps: usize,
    /// Adapt variances every `adaptation_interval` iterations during burn-in.
    pub adaptation_interval: usize,
    pub acceptance_target_low: f64,
    pub acceptance_target_high: f64,
    pub scale_decrease_factor: f64,
    pub scale_increase_factor: f64,
    pub min_variance: f64,
}

impl Default for CompassProposalTuning {
    fn default() -> Self {
        Self {
            stimulated_variance_primary: 0.25,
            stimulated_variance_secondary: 0.01,
            stimulated_primary_probability: 0.5,
            unstimulated_variance: 0.04,
            flip_probability: 0.65,
            slice_max_steps: 10,
            adaptation_interval: 50,
            acceptance_target_low: 0.2,
            acceptance_target_high: 0.45,
            scale_decrease_factor: 0.8,
            scale_increase_factor: 1.25,
            min_variance: 1.0e-6,
        }
    }
}

impl CompassProposalTuning {
    /// Whether proposal tuning settings are numerically valid.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.stimulated_variance_primary > 0.0
            && self.stimulated_variance_secondary > 0.0
            && (0.0..=1.0).contains(&self.stimulated_primary_probability)
            && self.unstimulated_variance > 0.0
            && (0.0..=1.0).contains(&self.flip_probability)
            && self.slice_max_steps > 0
            && self.adaptation_interval > 0
            && self.acceptance_target_low >= 0.0
            && self.acceptance_target_high <= 1.0
            && self.acceptance_target_low < self.acceptance_target_high
            && self.scale_decrease_factor > 0.0
            && self.scale_increase_factor > 0.0
            && self.min_variance > 0.0
    }
}

/// Full sampler configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompassSamplerConfig {
    pub fit_options: CompassFitOptions,
    pub prior_config: CompassPriorConfig,
    pub proposal_tuning: CompassProposalTuning,
}

impl CompassSamplerConfig {
    /// # Errors
    ///
    /// Returns `CompassError` if any configuration block is invalid.
    pub fn validate(self) -> Result<(), CompassError> {
        self.fit_options.validate()?;
        if !self.prior_config.is_valid() {
            return Err(CompassError::InvalidPriorConfig);
        }
        if !self.proposal_tuning.is_valid() {
            return Err(CompassError::InvalidProposalTuning);
        }
        Ok(())
    }

    /// Copy of this configuration with a different seed.
    #[must_use]
    pub const fn with_seed(self, seed: u64) -> Self {
        let mut config = self;
        config.fit_options.schedule.seed = seed;
        config
    }
}

/// Configuration for running multiple independent chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompassMultiChainOptions {
    pub chains: usize,
    /// Chain `i` uses `base_seed + i * seed_stride` with wrapping arithmetic.
    pub seed_stride: u64,
}

impl Default for CompassMultiChainOptions {
    fn default() -> Self {
        Self {
            chains: 4,
            seed_stride: 10_000,
        }
    }
}

impl CompassMultiChainOptions {
    /// # Errors
    ///
    /// Returns `CompassError` if multi-chain options are invalid.
    pub const fn validate(self) -> Result<(), CompassError> {
        if self.chains < 2 {
            return Err(CompassError::InvalidChainCount {
                min: 2,
                found: self.chains,
            });
        }
        if self.seed_stride == 0 {
            return Err(CompassError::InvalidSeedStride);
        }
        Ok(())
    }

    /// Seed used by chain `chain_index`.
    #[must_use]
    pub fn chain_seed(self, base_seed: u64, chain_index: usize) -> u64 {
        let index_u64 = u64::try_from(chain_index).unwrap_or(u64::MAX);
        base_seed.wrapping_add(index_u64.saturating_mul(self.seed_stride))
    }
}

/// Block-wise acceptance rates from one chain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompassAcceptanceRates {
    pub alpha_s: f64,
    pub alpha_u: f64,
    pub activation: f64,
}

/// Sampler diagnostics for one chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompassSamplerDiagnostics {
    pub iterations_completed: usize,
    pub retained_draws: usize,
    pub cancelled: bool,
    pub acceptance_rates: CompassAcceptanceRates,
    pub alpha_s_proposals: ProposalStats,
    pub alpha_u_proposals: ProposalStats,
    /// Activation tallies: `proposed` is `pb1`, `accepted` is `pb2`.
    pub activation_proposals: ProposalStats,
    /// Active categories (`Istar`) at the end of the chain.
    pub final_active_categories: Vec<usize>,
}

/// Output report from one chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompassReport {
    pub subjects: usize,
    pub categories: usize,
    pub diagnostics: CompassSamplerDiagnostics,
}

/// Output report from several independent chains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompassMultiChainReport {
    /// Chain-specific reports in chain-index order.
    pub chain_reports: Vec<CompassReport>,
    /// Seeds used per chain, in chain-index order.
    pub seeds: Vec<u64>,
}
