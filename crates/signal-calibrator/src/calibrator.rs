use std::fs;
use std::io::ErrorKind;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use finnews_core::{CalibrationRecord, SignalAnalysis, TimeHorizon};

use crate::error::CalibrationResult;

/// Similar-signal window for calibrated returns: `|score - other| <= 2`.
const SIMILAR_SCORE_DISTANCE: i32 = 2;
/// Records needed before history overrides the raw score.
const MIN_SIMILAR_RECORDS: usize = 5;
/// Hit rate reported when nothing matches.
const UNINFORMED_HIT_RATE: f64 = 0.5;

/// Append-only history of predictions and their realized returns.
///
/// The whole history is a JSON array on disk, rewritten on every
/// [`record`](Self::record) through a temp file and rename.
#[derive(Debug)]
pub struct Calibrator {
    path: PathBuf,
    history: Vec<CalibrationRecord>,
}

impl Calibrator {
    /// Empty history that will persist to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            history: Vec::new(),
        }
    }

    /// Load history from `path`; a missing file is an empty history.
    pub fn load(path: impl Into<PathBuf>) -> CalibrationResult<Self> {
        let path = path.into();
        let history = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Vec::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Loaded {} calibration records from {}", history.len(), path.display());
        Ok(Self { path, history })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn history(&self) -> &[CalibrationRecord] {
        &self.history
    }

    /// Append the realized outcome of `signal` and persist the full history.
    ///
    /// The record stays in memory even if the write fails.
    pub fn record(
        &mut self,
        signal: &SignalAnalysis,
        actual_return: f64,
        holding_days: u32,
    ) -> CalibrationResult<()> {
        self.history
            .push(CalibrationRecord::from_outcome(signal, actual_return, holding_days));
        self.persist()
    }

    /// Mean realized return of similar past signals, or `score / 10` without enough history.
    pub fn calibrated_score(&self, signal: &SignalAnalysis) -> f64 {
        let similar: Vec<f64> = self
            .history
            .iter()
            .filter(|r| {
                (r.score - signal.score()).abs() <= SIMILAR_SCORE_DISTANCE
                    && r.horizon == signal.time_horizon()
            })
            .map(|r| r.actual_return)
            .collect();

        if similar.len() >= MIN_SIMILAR_RECORDS {
            similar.iter().sum::<f64>() / similar.len() as f64
        } else {
            f64::from(signal.score()) / 10.0
        }
    }

    /// Share of directional hits among records in `scores` with the same horizon.
    pub fn hit_rate(&self, scores: RangeInclusive<i32>, horizon: TimeHorizon) -> f64 {
        let (hits, total) = self
            .history
            .iter()
            .filter(|r| scores.contains(&r.score) && r.horizon == horizon)
            .fold((0usize, 0usize), |(hits, total), r| {
                (hits + usize::from(r.is_hit()), total + 1)
            });

        if total == 0 {
            UNINFORMED_HIT_RATE
        } else {
            hits as f64 / total as f64
        }
    }

    fn persist(&self) -> CalibrationResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let json = serde_json::to_string_pretty(&self.history)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
