//! Two-speed news analysis on top of the inference gateway.
//!
//! The [`Classifier`] is the fast path: a keyword bypass plus one short yes/no
//! call. The [`Analyzer`] is the slow path: a three-temperature ensemble reduced
//! to a consensus signal, then an adversarial critique that can only lower
//! certainty.

pub mod analyzer;
pub mod classifier;
pub mod prompts;

pub use analyzer::{
    consensus, critique_multiplier, needs_adversarial_review, revise_with_critique, Analyzer,
    AnalyzerConfig,
};
pub use classifier::{is_affirmative, keyword_bypass, Classifier};
