use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing as log;

use super::{
    CancelToken, CopyReport, CountdownEnd, CountdownTimer, ExportHandle, JobDeps, Notice, Phase,
    RegionFileCopier, RestoreRequest, RestoreResult, RestoreSettings, Severity, SnapshotExporter,
};

pub struct RestoreJob {
    id: u64,
    request: RestoreRequest,
    settings: Arc<RestoreSettings>,
    deps: JobDeps,
    cancel: CancelToken,
    phase: Phase,
    export: Option<ExportHandle>,
    report: Option<CopyReport>,
    failure: Option<(Phase, String)>,
}

impl RestoreJob {
    pub fn new(
        id: u64,
        request: RestoreRequest,
        settings: Arc<RestoreSettings>,
        deps: JobDeps,
        cancel: CancelToken,
    ) -> Self {
        Self {
            id,
            request,
            settings,
            deps,
            cancel,
            phase: Phase::Pending,
            export: None,
            report: None,
            failure: None,
        }
    }

    /// Drives the phases to a terminal state. Each phase handler returns the
    /// next phase; an error from any handler ends the job as `Failed`.
    pub fn run(mut self) -> RestoreResult {
        log::info!(
            "[restore #{}] backup #{} dimension={} regions=[{}]",
            self.id,
            self.request.backup_id,
            self.request.dimension,
            self.request.regions_joined()
        );
        while !self.phase.is_terminal() {
            let next = match self.phase {
                Phase::Pending => Ok(self.on_pending()),
                Phase::SafetyBackup => self.on_safety_backup(),
                Phase::Countdown => Ok(self.on_countdown()),
                Phase::Stopping => self.on_stopping(),
                Phase::Exporting => self.on_exporting(),
                Phase::Copying => self.on_copying(),
                Phase::Completed | Phase::Aborted | Phase::Failed => break,
            };
            match next {
                Ok(phase) => self.enter(phase),
                Err(e) => {
                    self.failure = Some((self.phase, format!("{e:#}")));
                    self.enter(Phase::Failed);
                }
            }
        }
        self.finish()
    }

    fn enter(&mut self, phase: Phase) {
        log::debug!("[restore #{}] {} -> {}", self.id, self.phase, phase);
        self.phase = phase;
        let message = match phase {
            Phase::SafetyBackup => "Creating temporary backup before restore...".to_string(),
            Phase::Countdown if self.settings.countdown_seconds > 0 => format!(
                "Restoring {} region(s) of the {} from backup #{}; the server will stop in {} seconds",
                self.request.regions.len(),
                self.request.dimension,
                self.request.backup_id,
                self.settings.countdown_seconds
            ),
            Phase::Stopping => "Stopping server for region restore".to_string(),
            Phase::Exporting => format!("Exporting backup #{}", self.request.backup_id),
            Phase::Copying => format!(
                "Copying {} region file(s) into the {}",
                self.request.regions.len(),
                self.request.dimension
            ),
            _ => return,
        };
        let severity = if phase == Phase::Stopping {
            Severity::Warning
        } else {
            Severity::Info
        };
        self.notify(Notice::phase(self.id, phase, severity, message));
    }

    fn notify(&self, notice: Notice) {
        self.deps.sink.notify(&notice);
    }

    fn on_pending(&mut self) -> Phase {
        if self.cancel.is_cancelled() {
            Phase::Aborted
        } else if self.settings.create_temp_backup {
            Phase::SafetyBackup
        } else {
            Phase::Countdown
        }
    }

    fn on_safety_backup(&mut self) -> Result<Phase> {
        let comment = format!(
            "Safety backup before restoring {} regions [{}] from backup #{}",
            self.request.dimension,
            self.request.regions_joined(),
            self.request.backup_id
        );
        let id = self
            .deps
            .engine
            .create_backup(&self.settings.operator, &comment)
            .context("temporary backup creation failed")?;
        self.notify(Notice::phase(
            self.id,
            Phase::SafetyBackup,
            Severity::Info,
            format!("Temporary backup created with id {id}"),
        ));
        Ok(Phase::Countdown)
    }

    fn on_countdown(&mut self) -> Phase {
        let timer = CountdownTimer::new(self.settings.countdown_seconds, self.settings.tick);
        let sink = &self.deps.sink;
        let id = self.id;
        match timer.run(&self.cancel, |remaining| sink.notify(&Notice::tick(id, remaining))) {
            CountdownEnd::Elapsed => Phase::Stopping,
            CountdownEnd::Aborted { remaining } => {
                log::info!("[restore #{id}] abort observed with {remaining}s left");
                Phase::Aborted
            }
        }
    }

    fn on_stopping(&mut self) -> Result<Phase> {
        self.deps
            .host
            .issue_stop()
            .context("could not issue the stop command; no files were touched")?;
        Ok(Phase::Exporting)
    }

    fn on_exporting(&mut self) -> Result<Phase> {
        let exporter = SnapshotExporter::new(self.deps.engine.clone());
        let handle = exporter
            .export(self.request.backup_id, &self.settings.exports_dir)
            .context("export failed")?;
        self.export = Some(handle);
        Ok(Phase::Copying)
    }

    fn on_copying(&mut self) -> Result<Phase> {
        let export = self
            .export
            .as_ref()
            .ok_or_else(|| anyhow!("no export available to copy from"))?;
        let copier = RegionFileCopier::new(self.settings.world_root.clone());
        let report = copier.copy(export, self.request.dimension, &self.request.regions)?;
        self.report = Some(report);
        Ok(Phase::Completed)
    }

    fn finish(self) -> RestoreResult {
        let report = self.report.unwrap_or_default();
        let backup_id = self.request.backup_id;
        let (severity, message) = match self.phase {
            Phase::Completed => completion_message(backup_id, &report),
            Phase::Aborted => (Severity::Warning, "Region restore aborted.".to_string()),
            _ => {
                let (at, reason) = self
                    .failure
                    .as_ref()
                    .map(|(p, r)| (p.as_str(), r.as_str()))
                    .unwrap_or(("unknown", "unknown error"));
                (
                    Severity::Error,
                    format!("Region restore failed during {at}: {reason}"),
                )
            }
        };
        self.deps
            .sink
            .notify(&Notice::phase(self.id, self.phase, severity, message));

        RestoreResult {
            job_id: self.id,
            backup_id,
            dimension: self.request.dimension,
            phase: self.phase,
            succeeded: report.succeeded,
            failed: report.failed,
            reason: self.failure.map(|(_, r)| r),
            export_dir: self.export.map(|e| e.dir().to_path_buf()),
        }
    }
}

fn completion_message(backup_id: i64, report: &CopyReport) -> (Severity, String) {
    let mut parts = Vec::new();
    if !report.succeeded.is_empty() {
        parts.push(format!(
            "Restored regions: {} from backup #{backup_id}",
            report.succeeded.join(", ")
        ));
    }
    if !report.failed.is_empty() {
        let failed: Vec<&str> = report.failed.iter().map(|f| f.region.as_str()).collect();
        parts.push(format!("Failed to restore regions: {}", failed.join(", ")));
    }
    let severity = if report.failed.is_empty() {
        Severity::Info
    } else {
        Severity::Warning
    };
    (severity, parts.join("; "))
}
