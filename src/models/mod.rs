//! # Models
//!
//! The paired-count response model and its samplers.

pub mod compass;
