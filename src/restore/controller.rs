use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, Receiver},
    },
    thread::{self, JoinHandle},
};

use tracing as log;

use super::{
    AbortOutcome, CancelToken, JobDeps, Rejection, RestoreJob, RestoreRequest, RestoreResult,
    RestoreSettings,
};
use crate::utils::lock::LockGuard;

struct ActiveJob {
    id: u64,
    cancel: CancelToken,
    finished: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl ActiveJob {
    fn is_running(&self) -> bool {
        !self.finished.load(Ordering::Acquire) && !self.handle.is_finished()
    }
}

#[derive(Debug)]
pub struct JobReceipt {
    id: u64,
    rx: Receiver<RestoreResult>,
}

impl JobReceipt {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Blocks until the job reaches a terminal phase. `None` only if the job
    /// thread died without reporting.
    pub fn wait(self) -> Option<RestoreResult> {
        self.rx.recv().ok()
    }
}

/// Owns the single active-job slot. Start and abort take the slot mutex, so
/// "is a job running" and "store the new job" happen as one step.
pub struct RestoreJobController {
    settings: Arc<RestoreSettings>,
    deps: JobDeps,
    slot: Mutex<Option<ActiveJob>>,
    next_id: AtomicU64,
}

impl RestoreJobController {
    pub fn new(settings: RestoreSettings, deps: JobDeps) -> Self {
        Self {
            settings: Arc::new(settings),
            deps,
            slot: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<ActiveJob>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start_restore(&self, request: RestoreRequest) -> Result<JobReceipt, Rejection> {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(ActiveJob::is_running) {
            return Err(Rejection::InProgress);
        }
        if let Some(prev) = slot.take()
            && prev.handle.join().is_err()
        {
            log::warn!("[restore #{}] job thread panicked", prev.id);
        }

        request.validate(&self.settings.region_pattern)?;
        let lock = LockGuard::try_acquire(&self.settings.exports_dir)
            .map_err(|e| Rejection::Locked(format!("{e:#}")))?;
        let lock_path = lock.path().to_path_buf();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancelToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let job = RestoreJob::new(
            id,
            request,
            self.settings.clone(),
            self.deps.clone(),
            cancel.clone(),
        );

        let done = finished.clone();
        let handle = thread::Builder::new()
            .name(format!("restore-{id}"))
            .spawn(move || {
                let result = job.run();
                drop(lock);
                done.store(true, Ordering::Release);
                let _ = tx.send(result);
            })
            .map_err(|e| Rejection::Unavailable(e.to_string()))?;

        log::debug!("[restore #{id}] accepted; holding {}", lock_path.display());
        *slot = Some(ActiveJob {
            id,
            cancel,
            finished,
            handle,
        });
        Ok(JobReceipt { id, rx })
    }

    pub fn request_abort(&self) -> AbortOutcome {
        match self.slot().as_ref().filter(|j| j.is_running()) {
            Some(job) => {
                job.cancel.cancel();
                log::info!("[restore #{}] abort requested", job.id);
                AbortOutcome::Aborted
            }
            None => AbortOutcome::NoActiveJob,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_job_id().is_some()
    }

    pub fn active_job_id(&self) -> Option<u64> {
        self.slot().as_ref().filter(|j| j.is_running()).map(|j| j.id)
    }
}
