//! Thermal backpressure for the local accelerator.
//!
//! The gate never fails a call. When the device is at or above the limit it
//! polls until the reading drops to the resume threshold, then lets the call
//! through. A probe error means "proceed".

use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LlmError, LlmResult};

/// Source of the current device temperature in °C.
#[async_trait]
pub trait TemperatureProbe: Send + Sync {
    async fn device_temperature(&self) -> LlmResult<i32>;
}

/// Reads GPU temperature via `nvidia-smi` on a blocking worker thread.
#[derive(Debug, Clone, Default)]
pub struct NvidiaSmiProbe;

#[async_trait]
impl TemperatureProbe for NvidiaSmiProbe {
    async fn device_temperature(&self) -> LlmResult<i32> {
        let output = tokio::task::spawn_blocking(|| {
            Command::new("nvidia-smi")
                .args(["--query-gpu=temperature.gpu", "--format=csv,noheader,nounits"])
                .output()
        })
        .await
        .map_err(|e| LlmError::Probe(e.to_string()))?
        .map_err(|e| LlmError::Probe(e.to_string()))?;

        if !output.status.success() {
            return Err(LlmError::Probe(format!("nvidia-smi exited with {}", output.status)));
        }

        parse_smi_output(&String::from_utf8_lossy(&output.stdout))
            .ok_or_else(|| LlmError::Probe("no temperature in nvidia-smi output".into()))
    }
}

/// Hottest device in `nvidia-smi` CSV output (one reading per line).
pub fn parse_smi_output(stdout: &str) -> Option<i32> {
    stdout
        .lines()
        .filter_map(|line| line.trim().parse::<i32>().ok())
        .max()
}

#[derive(Debug, Clone)]
pub struct ThermalConfig {
    /// Calls block at or above this temperature
    pub limit_c: i32,
    /// Blocked calls resume at or below this temperature
    pub resume_c: i32,
    pub poll_interval: Duration,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            limit_c: 80,
            resume_c: 65,
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl ThermalConfig {
    /// Resume threshold, forced below the limit (`limit - 10`, floored at 0).
    pub fn effective_resume(&self) -> i32 {
        if self.resume_c >= self.limit_c {
            (self.limit_c - 10).max(0)
        } else {
            self.resume_c
        }
    }
}

pub struct ThermalGate {
    config: ThermalConfig,
    probe: Arc<dyn TemperatureProbe>,
}

impl ThermalGate {
    pub fn new(config: ThermalConfig, probe: Arc<dyn TemperatureProbe>) -> Self {
        Self { config, probe }
    }

    /// Block until the device is safe to use. Returns the number of poll waits.
    pub async fn wait_until_safe(&self) -> u32 {
        let temp = match self.probe.device_temperature().await {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!("Thermal probe unavailable ({}), proceeding", e);
                return 0;
            }
        };

        if temp < self.config.limit_c {
            return 0;
        }

        let resume = self.config.effective_resume();
        tracing::warn!(
            "Device at {}°C (limit {}°C), holding inference until {}°C",
            temp,
            self.config.limit_c,
            resume
        );

        let mut waits = 0;
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            waits += 1;

            match self.probe.device_temperature().await {
                Ok(t) if t <= resume => {
                    tracing::info!("Device cooled to {}°C after {} waits, resuming", t, waits);
                    break;
                }
                Ok(t) => tracing::debug!("Device still at {}°C, waiting", t),
                Err(e) => {
                    tracing::warn!("Thermal probe failed while waiting ({}), resuming", e);
                    break;
                }
            }
        }

        waits
    }
}
