use finnews_core::SignalAnalysis;

/// Score decayed by age: `score * 0.5^(hours / half_life)`, half-life keyed by horizon.
pub fn apply_time_decay(signal: &SignalAnalysis, hours_since_source: f64) -> f64 {
    let half_life = signal.time_horizon().half_life_hours();
    f64::from(signal.score()) * 0.5f64.powf(hours_since_source / half_life)
}
