//! Signal Calibrator
//!
//! Corrects raw model scores against realized outcomes, decays them with age,
//! and decides which signals are worth trading.

pub mod calibrator;
pub mod decay;
pub mod error;
pub mod features;
pub mod filter;

pub use calibrator::Calibrator;
pub use decay::apply_time_decay;
pub use error::{CalibrationError, CalibrationResult};
pub use features::{extract_text_features, SignalFactors, TextFeatures};
pub use filter::{FilterThresholds, FilterVerdict, SignalFilter};
