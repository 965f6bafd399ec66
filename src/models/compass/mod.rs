//! Paired stimulated/unstimulated count model with per-subject response
//! indicators.
//!
//! Each subject's stimulated and unstimulated counts are multinomial over a
//! shared set of categories. Categories in which a subject responds get
//! their own stimulated probability; all others follow the unstimulated
//! profile under a common background mass. The sampler alternates between
//! the concentration hyperparameters, the category probabilities, and the
//! response indicators, one chain per thread.

pub mod activation;
pub mod context;
pub mod hyper;
pub mod likelihood;
pub mod priors;
pub mod random;
pub mod sampler;
pub mod simplex;
pub mod state;
pub mod types;

pub use activation::update_indicators;
pub use context::CompassContext;
pub use hyper::{
    ConcentrationTarget, LogScaleProposal, StimulatedConcentration, UnstimulatedConcentration,
    update_concentrations, update_stimulated_concentrations, update_unstimulated_concentrations,
};
pub use priors::{CompassPriorConfig, activation_log_prior_odds, log_exponential_density};
pub use sampler::{
    ChainDraw, ConcentrationProposals, Trajectory, fit_compass, fit_compass_from_state,
    fit_compass_multi_chain, fit_compass_with_cancel, fit_compass_with_config, run_iteration,
};
pub use simplex::{
    restrict_to_active, sample_probabilities, sample_probabilities_full,
    sample_probabilities_with_scope,
};
pub use state::{ActiveSet, ChainState, ResponseIndicators};
pub use types::{
    CompassAcceptanceRates, CompassError, CompassFitOptions, CompassMultiChainOptions,
    CompassMultiChainReport, CompassProposalTuning, CompassReport, CompassSamplerConfig,
    CompassSamplerDiagnostics, InitialActivation, ProbabilityScope, UpdateStrategy,
};
