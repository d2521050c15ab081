use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::{Context, Result};
use chrono::Utc;
use finnews_core::{NewsItem, SignalAnalysis};
use signal_calibrator::SignalFactors;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Append-only JSONL files, one per horizon: `signals_<Horizon>.jsonl` for the
/// signals and `factors_<Horizon>.jsonl` for the matching backtest factor rows.
pub struct SignalSink {
    dir: PathBuf,
}

impl SignalSink {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating signal dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, signal: &SignalAnalysis) -> PathBuf {
        self.dir
            .join(format!("signals_{}.jsonl", signal.time_horizon().name()))
    }

    pub fn factors_path_for(&self, signal: &SignalAnalysis) -> PathBuf {
        self.dir
            .join(format!("factors_{}.jsonl", signal.time_horizon().name()))
    }

    pub async fn append(&self, signal: &SignalAnalysis) -> Result<PathBuf> {
        let path = self.path_for(signal);
        append_line(&path, serde_json::to_string(signal)?).await?;
        Ok(path)
    }

    /// One flat factor row keyed by the signal's source id.
    pub async fn append_factors(&self, signal: &SignalAnalysis, factors: &SignalFactors) -> Result<PathBuf> {
        let path = self.factors_path_for(signal);
        let mut row = serde_json::to_value(factors)?;
        if let Some(fields) = row.as_object_mut() {
            fields.insert("source_id".into(), signal.source_id().into());
        }
        append_line(&path, serde_json::to_string(&row)?).await?;
        Ok(path)
    }
}

async fn append_line(path: &Path, mut line: String) -> Result<()> {
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    Ok(())
}

/// Diagnostic copy of every ingested item: `raw_<millis>.txt`.
pub struct RawArchive {
    dir: PathBuf,
    last_stamp: AtomicI64,
}

impl RawArchive {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating raw archive dir {}", dir.display()))?;
        Ok(Self {
            dir,
            last_stamp: AtomicI64::new(0),
        })
    }

    pub async fn store(&self, item: &NewsItem) -> Result<PathBuf> {
        let path = self.dir.join(format!("raw_{}.txt", self.next_stamp()));
        let text = format!(
            "URL: {}\nTITLE: {}\nCONTENT:\n{}",
            item.id,
            item.title,
            item.content()
        );
        fs::write(&path, text)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Current millis, bumped past the previous stamp so names never collide.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last_stamp
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(now.max(last + 1)))
            .unwrap_or(now);
        now.max(prev + 1)
    }
}
