//! Mock ports shared by the restore tests.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicI64, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    time::Duration,
};

use anyhow::{Result, anyhow, bail};
use regex::Regex;

use super::{CancelToken, JobDeps, Notice, NoticeSink, RestoreSettings, Stage};
use crate::{
    config::DEFAULT_REGION_PATTERN,
    tooling::{BackupEngine, HostConsole},
};

struct Snapshot {
    description: Option<String>,
    regions: Vec<String>,
}

pub struct MockEngine {
    snapshots: Mutex<HashMap<i64, Snapshot>>,
    next_id: AtomicI64,
    create_error: Mutex<Option<String>>,
    export_error: Mutex<Option<String>>,
    pub created: Mutex<Vec<(String, String)>>,
    pub exported: Mutex<Vec<(i64, PathBuf)>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            snapshots: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(100),
            create_error: Mutex::new(None),
            export_error: Mutex::new(None),
            created: Mutex::new(Vec::new()),
            exported: Mutex::new(Vec::new()),
        }
    }

    pub fn with_backup(self, id: i64, description: Option<&str>, regions: &[&str]) -> Self {
        self.snapshots.lock().unwrap().insert(
            id,
            Snapshot {
                description: description.map(str::to_string),
                regions: regions.iter().map(|r| r.to_string()).collect(),
            },
        );
        self
    }

    pub fn fail_creates(&self, msg: &str) {
        *self.create_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn fail_exports(&self, msg: &str) {
        *self.export_error.lock().unwrap() = Some(msg.to_string());
    }
}

impl BackupEngine for MockEngine {
    fn create_backup(&self, operator: &str, comment: &str) -> Result<i64> {
        if let Some(msg) = self.create_error.lock().unwrap().clone() {
            bail!(msg);
        }
        self.created
            .lock()
            .unwrap()
            .push((operator.to_string(), comment.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn export_backup(&self, backup_id: i64, dest: &Path) -> Result<()> {
        if let Some(msg) = self.export_error.lock().unwrap().clone() {
            bail!(msg);
        }
        let snaps = self.snapshots.lock().unwrap();
        let snap = snaps
            .get(&backup_id)
            .ok_or_else(|| anyhow!("backup #{backup_id} not found"))?;
        fs::create_dir_all(dest)?;
        for r in &snap.regions {
            fs::write(dest.join(format!("{r}.mca")), format!("{backup_id}:{r}"))?;
        }
        self.exported
            .lock()
            .unwrap()
            .push((backup_id, dest.to_path_buf()));
        Ok(())
    }

    fn describe(&self, backup_id: i64) -> Result<Option<String>> {
        self.snapshots
            .lock()
            .unwrap()
            .get(&backup_id)
            .map(|s| s.description.clone())
            .ok_or_else(|| anyhow!("backup #{backup_id} not found"))
    }
}

#[derive(Default)]
pub struct MockHost {
    pub commands: Mutex<Vec<String>>,
    pub fail_stop: bool,
}

impl MockHost {
    pub fn stops(&self) -> usize {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == "stop")
            .count()
    }
}

impl HostConsole for MockHost {
    fn execute(&self, command: &str) -> Result<()> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(())
    }

    fn issue_stop(&self) -> Result<()> {
        if self.fail_stop {
            bail!("console unreachable");
        }
        self.execute("stop")
    }
}

#[derive(Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
    forward: Mutex<Option<Sender<Notice>>>,
    cancel_on_tick: Mutex<Option<(u32, CancelToken)>>,
}

impl RecordingSink {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn ticks(&self) -> Vec<u32> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n.stage {
                Stage::Tick { remaining } => Some(remaining),
                Stage::Phase(_) => None,
            })
            .collect()
    }

    pub fn subscribe(&self) -> Receiver<Notice> {
        let (tx, rx) = mpsc::channel();
        *self.forward.lock().unwrap() = Some(tx);
        rx
    }

    pub fn cancel_on_tick(&self, remaining: u32, token: CancelToken) {
        *self.cancel_on_tick.lock().unwrap() = Some((remaining, token));
    }
}

impl NoticeSink for RecordingSink {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
        if let Some(tx) = self.forward.lock().unwrap().as_ref() {
            let _ = tx.send(notice.clone());
        }
        if let Stage::Tick { remaining } = notice.stage
            && let Some((at, token)) = self.cancel_on_tick.lock().unwrap().as_ref()
            && *at == remaining
        {
            token.cancel();
        }
    }
}

pub fn settings(world: &Path, exports: &Path, countdown_seconds: i64) -> RestoreSettings {
    RestoreSettings {
        world_root: world.to_path_buf(),
        exports_dir: exports.to_path_buf(),
        create_temp_backup: false,
        countdown_seconds,
        tick: Duration::from_millis(5),
        operator: "RegionRestore".to_string(),
        region_pattern: Regex::new(DEFAULT_REGION_PATTERN).unwrap(),
    }
}

pub struct Harness {
    pub engine: Arc<MockEngine>,
    pub host: Arc<MockHost>,
    pub sink: Arc<RecordingSink>,
}

impl Harness {
    pub fn new(engine: MockEngine) -> Self {
        Self::with_host(engine, MockHost::default())
    }

    pub fn with_host(engine: MockEngine, host: MockHost) -> Self {
        Self {
            engine: Arc::new(engine),
            host: Arc::new(host),
            sink: Arc::new(RecordingSink::default()),
        }
    }

    pub fn deps(&self) -> JobDeps {
        JobDeps {
            engine: self.engine.clone(),
            host: self.host.clone(),
            sink: self.sink.clone(),
        }
    }
}
