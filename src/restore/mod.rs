//! Region restore job: a single-flight, abortable, multi-phase restore of
//! region files from an engine-managed backup into the live world.

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use regex::Regex;
use thiserror::Error;

use crate::{
    config::Config,
    tooling::{BackupEngine, HostConsole},
};

mod cancel;
mod controller;
mod copier;
mod countdown;
mod exporter;
mod job;
mod notify;
#[cfg(test)]
pub(crate) mod testkit;

pub use cancel::CancelToken;
pub use controller::{JobReceipt, RestoreJobController};
pub use copier::{CopyReport, RegionFileCopier};
pub use countdown::{CountdownEnd, CountdownTimer};
pub use exporter::{ExportHandle, SnapshotExporter};
pub use job::RestoreJob;
pub use notify::{Fanout, LogSink, Notice, NoticeSink, Severity};
#[cfg(test)]
pub use notify::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Overworld,
    Nether,
    End,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Overworld, Dimension::Nether, Dimension::End];

    pub fn name(self) -> &'static str {
        match self {
            Dimension::Overworld => "overworld",
            Dimension::Nether => "nether",
            Dimension::End => "end",
        }
    }

    /// Vanilla world layout: the overworld keeps regions at the world root,
    /// the other dimensions under `DIM-1` and `DIM1`.
    pub fn region_dir(self, world_root: &Path) -> PathBuf {
        match self {
            Dimension::Overworld => world_root.join("region"),
            Dimension::Nether => world_root.join("DIM-1").join("region"),
            Dimension::End => world_root.join("DIM1").join("region"),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dimension {
    type Err = Rejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.name() == wanted)
            .ok_or_else(|| {
                Rejection::Invalid(format!(
                    "unknown dimension '{s}'; choose overworld, nether, or end"
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub backup_id: i64,
    pub dimension: Dimension,
    pub regions: Vec<String>,
}

impl RestoreRequest {
    pub fn new<I, S>(backup_id: i64, dimension: Dimension, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            backup_id,
            dimension,
            regions: regions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn validate(&self, region_pattern: &Regex) -> Result<(), Rejection> {
        if self.backup_id <= 0 {
            return Err(Rejection::Invalid(format!(
                "backup id must be positive, got {}",
                self.backup_id
            )));
        }
        if self.regions.is_empty() {
            return Err(Rejection::Invalid(
                "at least one region is required".to_string(),
            ));
        }
        if let Some(bad) = self.regions.iter().find(|r| !region_pattern.is_match(r)) {
            return Err(Rejection::Invalid(format!(
                "region '{bad}' does not match {}",
                region_pattern.as_str()
            )));
        }
        Ok(())
    }

    pub fn regions_joined(&self) -> String {
        self.regions.join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    SafetyBackup,
    Countdown,
    Stopping,
    Exporting,
    Copying,
    Completed,
    Aborted,
    Failed,
}

impl Phase {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Aborted | Phase::Failed)
    }

    #[inline]
    pub fn is_cancellable(self) -> bool {
        matches!(self, Phase::Pending | Phase::SafetyBackup | Phase::Countdown)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::SafetyBackup => "safety-backup",
            Phase::Countdown => "countdown",
            Phase::Stopping => "stopping",
            Phase::Exporting => "exporting",
            Phase::Copying => "copying",
            Phase::Completed => "completed",
            Phase::Aborted => "aborted",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why `start_restore` refused to launch a job. Nothing was started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("invalid restore request: {0}")]
    Invalid(String),
    #[error("job already in progress")]
    InProgress,
    #[error("restore lock unavailable: {0}")]
    Locked(String),
    #[error("cannot start restore thread: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOutcome {
    Aborted,
    NoActiveJob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFailure {
    pub region: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct RestoreResult {
    pub job_id: u64,
    pub backup_id: i64,
    pub dimension: Dimension,
    pub phase: Phase,
    pub succeeded: Vec<String>,
    pub failed: Vec<RegionFailure>,
    pub reason: Option<String>,
    pub export_dir: Option<PathBuf>,
}

impl RestoreResult {
    pub fn failed_regions(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.region.as_str()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct RestoreSettings {
    pub world_root: PathBuf,
    pub exports_dir: PathBuf,
    pub create_temp_backup: bool,
    pub countdown_seconds: i64,
    pub tick: Duration,
    pub operator: String,
    pub region_pattern: Regex,
}

impl RestoreSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            world_root: cfg.world.root.clone(),
            exports_dir: cfg.restore.exports_dir.clone(),
            create_temp_backup: cfg.restore.create_temp_backup,
            countdown_seconds: cfg.restore.countdown_seconds,
            tick: Duration::from_secs(1),
            operator: cfg.restore.operator.clone(),
            region_pattern: cfg.restore.region_pattern.clone(),
        }
    }
}

#[derive(Clone)]
pub struct JobDeps {
    pub engine: Arc<dyn BackupEngine>,
    pub host: Arc<dyn HostConsole>,
    pub sink: Arc<dyn NoticeSink>,
}
