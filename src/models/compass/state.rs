//! Per-chain iteration state: concentrations, response indicators, the
//! active-category set, cached subject marginals, and probability matrices.

use faer::Mat;

use crate::inference::ProposalStats;
use crate::utils::{count_to_f64, usize_to_f64};

use super::context::CompassContext;
use super::types::{CompassError, InitialActivation};

const WORD_BITS: usize = 64;

/// Categories with at least one responding subject (`Istar`).
///
/// Holds a sorted index list alongside a membership bitset over the stable
/// `0..categories` addressing space. `len()` is `mKstar`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSet {
    indices: Vec<usize>,
    members: Vec<u64>,
    categories: usize,
}

impl ActiveSet {
    #[must_use]
    pub fn empty(categories: usize) -> Self {
        Self {
            indices: Vec::new(),
            members: vec![0; categories.div_ceil(WORD_BITS)],
            categories,
        }
    }

    /// Build an active set from caller-supplied indices and declared size.
    ///
    /// # Errors
    ///
    /// Returns `CompassError` if an index is not below `categories` or the
    /// declared size differs from the number of distinct indices.
    pub fn from_parts(
        indices: &[usize],
        declared_size: usize,
        categories: usize,
    ) -> Result<Self, CompassError> {
        let mut set = Self::empty(categories);
        for index in indices {
            if *index >= categories {
                return Err(CompassError::ActiveIndexOutOfRange {
                    index: *index,
                    categories,
                });
            }
            set.insert(*index);
        }
        if set.len() != declared_size {
            return Err(CompassError::ActiveSetSizeMismatch {
                declared: declared_size,
                actual: set.len(),
            });
        }
        Ok(set)
    }

    /// Active set implied by per-category multiplicities.
    #[must_use]
    pub fn from_multiplicities(multiplicities: &[usize]) -> Self {
        let mut set = Self::empty(multiplicities.len());
        for (category, count) in multiplicities.iter().enumerate() {
            if *count > 0 {
                set.insert(category);
            }
        }
        set
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[must_use]
    pub const fn categories(&self) -> usize {
        self.categories
    }

    /// Sorted active category indices.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    #[must_use]
    pub fn contains(&self, category: usize) -> bool {
        category < self.categories
            && self.members[category / WORD_BITS] & (1_u64 << (category % WORD_BITS)) != 0
    }

    pub(crate) fn insert(&mut self, category: usize) -> bool {
        if category >= self.categories || self.contains(category) {
            return false;
        }
        self.members[category / WORD_BITS] |= 1_u64 << (category % WORD_BITS);
        let position = self.indices.partition_point(|index| *index < category);
        self.indices.insert(position, category);
        true
    }

    pub(crate) fn remove(&mut self, category: usize) -> bool {
        if !self.contains(category) {
            return false;
        }
        self.members[category / WORD_BITS] &= !(1_u64 << (category % WORD_BITS));
        if let Ok(position) = self.indices.binary_search(&category) {
            self.indices.remove(position);
        }
        true
    }
}

/// Subject-by-category response indicators (`gammat`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseIndicators {
    subjects: usize,
    categories: usize,
    values: Vec<bool>,
}

impl ResponseIndicators {
    #[must_use]
    pub fn none(subjects: usize, categories: usize) -> Self {
        Self {
            subjects,
            categories,
            values: vec![false; subjects * categories],
        }
    }

    /// # Errors
    ///
    /// Returns `CompassError::ShapeMismatch` if the rows do not form a
    /// `subjects x categories` matrix.
    pub fn from_rows(
        rows: &[Vec<bool>],
        subjects: usize,
        categories: usize,
    ) -> Result<Self, CompassError> {
        let ragged = rows.iter().find(|row| row.len() != categories);
        if rows.len() != subjects || ragged.is_some() {
            return Err(CompassError::ShapeMismatch {
                what: "response indicators",
                found_rows: rows.len(),
                found_cols: ragged.map_or(categories, Vec::len),
                rows: subjects,
                cols: categories,
            });
        }
        Ok(Self {
            subjects,
            categories,
            values: rows.concat(),
        })
    }

    #[must_use]
    pub const fn subjects(&self) -> usize {
        self.subjects
    }

    #[must_use]
    pub const fn categories(&self) -> usize {
        self.categories
    }

    #[must_use]
    pub fn row(&self, subject: usize) -> &[bool] {
        let start = subject * self.categories;
        &self.values[start..start + self.categories]
    }

    #[must_use]
    pub fn get(&self, subject: usize, category: usize) -> bool {
        self.values[subject * self.categories + category]
    }

    pub(crate) fn set(&mut self, subject: usize, category: usize, value: bool) {
        self.values[subject * self.categories + category] = value;
    }

    /// Number of responding subjects per category (`mk`).
    #[must_use]
    pub fn multiplicities(&self) -> Vec<usize> {
        let mut counts = vec![0; self.categories];
        for subject in 0..self.subjects {
            for (count, responds) in counts.iter_mut().zip(self.row(subject)) {
                *count += usize::from(*responds);
            }
        }
        counts
    }

    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        (0..self.subjects).map(|subject| self.row(subject).to_vec()).collect()
    }
}

/// Everything one chain mutates between iterations.
///
/// Owned by a single chain and passed by reference into each update step.
#[derive(Debug, Clone)]
pub struct ChainState {
    pub(crate) alpha_s: Vec<f64>,
    pub(crate) alpha_u: Vec<f64>,
    pub(crate) indicators: ResponseIndicators,
    pub(crate) multiplicities: Vec<usize>,
    pub(crate) active: ActiveSet,
    pub(crate) subject_log_marginal: Vec<f64>,
    pub(crate) ps: Mat<f64>,
    pub(crate) pu: Mat<f64>,
    pub(crate) activation_stats: ProposalStats,
    pub(crate) alpha_s_stats: ProposalStats,
    pub(crate) alpha_u_stats: ProposalStats,
}

impl ChainState {
    /// Starting state with prior concentrations, the chosen activation
    /// policy, and uniform probability vectors.
    #[must_use]
    pub fn initialize(context: &CompassContext<'_>, activation: InitialActivation) -> Self {
        let subjects = context.subjects();
        let categories = context.categories();
        let prior = context.prior();
        let mut indicators = ResponseIndicators::none(subjects, categories);
        if activation == InitialActivation::Empirical {
            for subject in 0..subjects {
                for category in empirical_responders(context, subject) {
                    indicators.set(subject, category, true);
                }
            }
        }
        let uniform = 1.0 / usize_to_f64(categories);
        Self::assemble(
            context,
            vec![prior.initial_alpha_s; categories],
            vec![prior.initial_alpha_u; categories],
            indicators,
            Mat::from_fn(subjects, categories, |_, _| uniform),
        )
    }

    /// Starting state from caller-supplied parts, checked against `context`.
    ///
    /// # Errors
    ///
    /// Returns `CompassError` for wrongly shaped vectors, non-positive
    /// concentrations, an active set whose declared size or indices are
    /// invalid, an active set that disagrees with the indicators, or a
    /// response on a category with no stimulated cells.
    pub fn from_parts(
        context: &CompassContext<'_>,
        alpha_s: Vec<f64>,
        alpha_u: Vec<f64>,
        indicators: ResponseIndicators,
        active_indices: &[usize],
        declared_active: usize,
    ) -> Result<Self, CompassError> {
        let categories = context.categories();
        check_concentrations("stimulated", &alpha_s, categories)?;
        check_concentrations("unstimulated", &alpha_u, categories)?;
        if indicators.subjects() != context.subjects() || indicators.categories() != categories {
            return Err(CompassError::ShapeMismatch {
                what: "response indicators",
                found_rows: indicators.subjects(),
                found_cols: indicators.categories(),
                rows: context.subjects(),
                cols: categories,
            });
        }
        let declared = ActiveSet::from_parts(active_indices, declared_active, categories)?;
        let uniform = 1.0 / usize_to_f64(categories);
        let pu = Mat::from_fn(context.subjects(), categories, |_, _| uniform);
        let state = Self::assemble(context, alpha_s, alpha_u, indicators, pu);
        if let Some(category) =
            (0..categories).find(|k| declared.contains(*k) != state.active.contains(*k))
        {
            return Err(CompassError::InconsistentActiveSet { category });
        }
        state.check_preconditions(context)?;
        Ok(state)
    }

    fn assemble(
        context: &CompassContext<'_>,
        alpha_s: Vec<f64>,
        alpha_u: Vec<f64>,
        indicators: ResponseIndicators,
        probabilities: Mat<f64>,
    ) -> Self {
        let multiplicities = indicators.multiplicities();
        let active = ActiveSet::from_multiplicities(&multiplicities);
        let mut state = Self {
            alpha_s,
            alpha_u,
            indicators,
            multiplicities,
            active,
            subject_log_marginal: Vec::new(),
            ps: probabilities.clone(),
            pu: probabilities,
            activation_stats: ProposalStats::default(),
            alpha_s_stats: ProposalStats::default(),
            alpha_u_stats: ProposalStats::default(),
        };
        state.refresh_subject_log_marginals(context);
        state
    }

    /// Check the bookkeeping the activation sampler relies on.
    ///
    /// # Errors
    ///
    /// Returns `CompassError` if any vector has the wrong shape, the active
    /// set disagrees with the multiplicities or the indicators, or a subject
    /// responds in an ineligible category.
    pub fn check_preconditions(&self, context: &CompassContext<'_>) -> Result<(), CompassError> {
        let subjects = context.subjects();
        let categories = context.categories();
        check_concentrations("stimulated", &self.alpha_s, categories)?;
        check_concentrations("unstimulated", &self.alpha_u, categories)?;
        let shapes = [
            (
                "response indicators",
                self.indicators.subjects(),
                self.indicators.categories(),
                subjects,
            ),
            ("stimulated probabilities", self.ps.nrows(), self.ps.ncols(), subjects),
            ("unstimulated probabilities", self.pu.nrows(), self.pu.ncols(), subjects),
            ("subject marginals", self.subject_log_marginal.len(), categories, subjects),
            ("multiplicities", 1, self.multiplicities.len(), 1),
        ];
        for (what, found_rows, found_cols, rows) in shapes {
            if found_rows != rows || found_cols != categories {
                return Err(CompassError::ShapeMismatch {
                    what,
                    found_rows,
                    found_cols,
                    rows,
                    cols: categories,
                });
            }
        }
        if self.active.categories() != categories {
            return Err(CompassError::ShapeMismatch {
                what: "active set",
                found_rows: 1,
                found_cols: self.active.categories(),
                rows: 1,
                cols: categories,
            });
        }
        if let Some(index) = self.active.indices().iter().find(|index| **index >= categories) {
            return Err(CompassError::ActiveIndexOutOfRange {
                index: *index,
                categories,
            });
        }
        let recomputed = self.indicators.multiplicities();
        for category in 0..categories {
            let responding = recomputed[category] > 0;
            if self.multiplicities.get(category) != Some(&recomputed[category])
                || self.active.contains(category) != responding
            {
                return Err(CompassError::InconsistentActiveSet { category });
            }
            if responding && !context.eligible()[category] {
                let subject = (0..context.subjects())
                    .find(|subject| self.indicators.get(*subject, category))
                    .unwrap_or_default();
                return Err(CompassError::IneligibleResponse { subject, category });
            }
        }
        Ok(())
    }

    /// Recompute the cached subject marginals (`SS`) from scratch.
    pub fn refresh_subject_log_marginals(&mut self, context: &CompassContext<'_>) {
        self.subject_log_marginal = (0..context.subjects())
            .map(|subject| {
                context.subject_log_marginal(
                    subject,
                    &self.alpha_s,
                    &self.alpha_u,
                    self.indicators.row(subject),
                )
            })
            .collect();
    }

    #[must_use]
    pub fn alpha_s(&self) -> &[f64] {
        &self.alpha_s
    }

    #[must_use]
    pub fn alpha_u(&self) -> &[f64] {
        &self.alpha_u
    }

    #[must_use]
    pub const fn indicators(&self) -> &ResponseIndicators {
        &self.indicators
    }

    #[must_use]
    pub fn multiplicities(&self) -> &[usize] {
        &self.multiplicities
    }

    #[must_use]
    pub const fn active(&self) -> &ActiveSet {
        &self.active
    }

    #[must_use]
    pub fn subject_log_marginals(&self) -> &[f64] {
        &self.subject_log_marginal
    }

    /// Stimulated category probabilities (`Ps`), subjects by categories.
    #[must_use]
    pub const fn ps(&self) -> &Mat<f64> {
        &self.ps
    }

    /// Unstimulated category probabilities (`Pu`), subjects by categories.
    #[must_use]
    pub const fn pu(&self) -> &Mat<f64> {
        &self.pu
    }

    /// Activation tallies: `proposed` is `pb1` and `accepted` is `pb2`.
    #[must_use]
    pub const fn activation_stats(&self) -> ProposalStats {
        self.activation_stats
    }

    #[must_use]
    pub const fn alpha_s_stats(&self) -> ProposalStats {
        self.alpha_s_stats
    }

    #[must_use]
    pub const fn alpha_u_stats(&self) -> ProposalStats {
        self.alpha_u_stats
    }
}

fn check_concentrations(
    what: &'static str,
    values: &[f64],
    categories: usize,
) -> Result<(), CompassError> {
    if values.len() != categories {
        return Err(CompassError::ShapeMismatch {
            what,
            found_rows: 1,
            found_cols: values.len(),
            rows: 1,
            cols: categories,
        });
    }
    if let Some((category, value)) = values
        .iter()
        .enumerate()
        .find(|(_, value)| !(value.is_finite() && **value > 0.0))
    {
        return Err(CompassError::InvalidConcentration {
            what,
            category,
            value: *value,
        });
    }
    Ok(())
}

fn empirical_responders(context: &CompassContext<'_>, subject: usize) -> Vec<usize> {
    let stimulated = context.stimulated().row(subject);
    let unstimulated = context.unstimulated().row(subject);
    let stimulated_total: f64 = stimulated.iter().copied().map(count_to_f64).sum();
    let unstimulated_total: f64 = unstimulated.iter().copied().map(count_to_f64).sum();
    if stimulated_total == 0.0 {
        return Vec::new();
    }
    (0..context.categories())
        .filter(|category| context.eligible()[*category])
        .filter(|category| {
            let stimulated_share = count_to_f64(stimulated[*category]) / stimulated_total;
            let unstimulated_share = if unstimulated_total > 0.0 {
                count_to_f64(unstimulated[*category]) / unstimulated_total
            } else {
                0.0
            };
            stimulated_share > unstimulated_share
        })
        .collect()
}
