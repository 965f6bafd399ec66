#![forbid(unsafe_code)]

//! # `compass_mcmc`
//!
//! Bayesian detection of stimulus-induced responses in paired
//! stimulated/unstimulated count data.
//!
//! The crate has two layers:
//!
//! - [`counts`] turns per-cell marker-positivity records into subject-by-
//!   category count tables, one category per exact marker combination.
//! - [`models::compass`] runs a Markov chain over per-subject category
//!   probabilities, Dirichlet concentrations, and response indicators, and
//!   returns the retained trajectory.
//!
//! Chains own all of their state, so independent chains can run on separate
//! threads in one process. Logging goes through the `log` facade; install a
//! logger in the host application to see chain progress.

pub mod counts;
pub mod inference;
pub mod input;
pub mod models;
pub mod preprocess;
pub mod utils;

pub use counts::{
    CategoryDefinition, CellTable, CountError, all_categories, count_cells,
    count_cells_by_expression,
};
pub use inference::{InferenceError, McmcConfig, ProposalStats};
pub use input::{CountInput, CountMatrix, InputError};
pub use preprocess::{
    CategoryDiagnostics, category_diagnostics, drop_empty_categories, eligible_categories,
};

pub use models::compass::{
    ActiveSet, ChainDraw, ChainState, CompassAcceptanceRates, CompassContext, CompassError,
    CompassFitOptions, CompassMultiChainOptions, CompassMultiChainReport, CompassPriorConfig,
    CompassProposalTuning, CompassReport, CompassSamplerConfig, CompassSamplerDiagnostics,
    ConcentrationProposals, InitialActivation, ProbabilityScope, ResponseIndicators, Trajectory,
    UpdateStrategy, fit_compass, fit_compass_from_state, fit_compass_multi_chain,
    fit_compass_with_cancel, fit_compass_with_config, restrict_to_active, run_iteration,
    sample_probabilities, sample_probabilities_full, update_indicators,
};
