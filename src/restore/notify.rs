use std::sync::Arc;

use tracing as log;

use super::Phase;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Phase(Phase),
    Tick { remaining: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub job_id: u64,
    pub stage: Stage,
    pub message: String,
    pub severity: Severity,
    /// The abort window is still open; sinks may offer a cancel affordance.
    pub cancellable: bool,
}

impl Notice {
    pub fn phase(job_id: u64, phase: Phase, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            job_id,
            stage: Stage::Phase(phase),
            message: message.into(),
            severity,
            cancellable: phase.is_cancellable(),
        }
    }

    pub fn tick(job_id: u64, remaining: u32) -> Self {
        Self {
            job_id,
            stage: Stage::Tick { remaining },
            message: format!("Stopping server in {remaining} seconds..."),
            severity: Severity::Warning,
            cancellable: true,
        }
    }
}

pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: &Notice);
}

pub struct LogSink;

impl NoticeSink for LogSink {
    fn notify(&self, n: &Notice) {
        match n.severity {
            Severity::Info => log::info!("[restore #{}] {}", n.job_id, n.message),
            Severity::Warning => log::warn!("[restore #{}] {}", n.job_id, n.message),
            Severity::Error => log::error!("[restore #{}] {}", n.job_id, n.message),
        }
    }
}

pub struct Fanout(Vec<Arc<dyn NoticeSink>>);

impl Fanout {
    pub fn new(sinks: Vec<Arc<dyn NoticeSink>>) -> Self {
        Self(sinks)
    }
}

impl NoticeSink for Fanout {
    fn notify(&self, notice: &Notice) {
        for s in &self.0 {
            s.notify(notice);
        }
    }
}
