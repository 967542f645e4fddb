use std::{path::Path, sync::Arc};

use anyhow::{Context, Result, anyhow};
use serde_json::Value;

use crate::{
    config::Engine,
    utils::process::{CmdSpec, EnvValue, Runner, StdioSpec},
};

pub trait BackupEngine: Send + Sync {
    fn create_backup(&self, operator: &str, comment: &str) -> Result<i64>;
    /// Materializes the backup's files under `dest`, which must not exist yet.
    fn export_backup(&self, backup_id: i64, dest: &Path) -> Result<()>;
    fn describe(&self, backup_id: i64) -> Result<Option<String>>;
}

type DynRunner = dyn Runner + Send + Sync;

pub struct EngineCli {
    runner: Arc<DynRunner>,
    engine: Arc<Engine>,
}

impl EngineCli {
    pub fn new(runner: Arc<DynRunner>, engine: Arc<Engine>) -> Self {
        Self { runner, engine }
    }

    fn engine_cmd(&self) -> CmdSpec {
        let mut cmd = CmdSpec::new(self.engine.program.clone()).args(self.engine.args.clone());
        for (k, v) in &self.engine.env {
            cmd = cmd.env(k.clone(), EnvValue::Plain(v.clone()));
        }
        if let Some(ref dir) = self.engine.workdir {
            cmd = cmd.cwd(dir.clone());
        }
        cmd
    }
}

impl BackupEngine for EngineCli {
    fn create_backup(&self, operator: &str, comment: &str) -> Result<i64> {
        let cmd = self
            .engine_cmd()
            .args(["create", "--creator", operator, "--comment", comment])
            .stderr(StdioSpec::Inherit);
        let out = self
            .runner
            .run_capture(&cmd)
            .context("run backup engine create")?;
        parse_created_id(&out)
            .ok_or_else(|| anyhow!("backup engine did not report a backup id: {}", out.trim()))
    }

    fn export_backup(&self, backup_id: i64, dest: &Path) -> Result<()> {
        let cmd = self
            .engine_cmd()
            .arg("export")
            .arg(backup_id.to_string())
            .arg(dest.display().to_string())
            .stdout(StdioSpec::Null)
            .stderr(StdioSpec::Inherit);
        self.runner
            .run(&cmd)
            .with_context(|| format!("export backup #{backup_id} to {}", dest.display()))
    }

    fn describe(&self, backup_id: i64) -> Result<Option<String>> {
        let cmd = self
            .engine_cmd()
            .args(["show", &backup_id.to_string(), "--json"])
            .stdout(StdioSpec::Pipe)
            .stderr(StdioSpec::Null);
        let out = self
            .runner
            .run_capture(&cmd)
            .with_context(|| format!("show backup #{backup_id}"))?;
        parse_description(&out)
    }
}

fn parse_created_id(out: &str) -> Option<i64> {
    out.split(|c: char| !c.is_ascii_digit())
        .filter(|tok| !tok.is_empty())
        .find_map(|tok| tok.parse::<i64>().ok().filter(|id| *id > 0))
}

fn parse_description(out: &str) -> Result<Option<String>> {
    let v: Value = serde_json::from_str(out.trim()).context("parse backup json")?;
    let text = ["comment", "description"]
        .iter()
        .find_map(|k| v.get(k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok(text)
}
