use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Args;
use tracing as log;

use crate::{
    AppCtx,
    restore::{
        AbortOutcome, Dimension, JobReceipt, Rejection, RestoreJobController, RestoreRequest,
    },
    ui,
};

const USAGE: &str = "Usage: !!region <backup_id> <dimension> <region1> [region2] ...";

#[derive(Debug, Args)]
pub struct ConsoleArgs {}

impl ConsoleArgs {
    pub fn run(&self, ctx: &AppCtx) -> Result<()> {
        log::info!(
            "reading commands from stdin; '{}' cancels a pending restore",
            ctx.cfg.restore.abort_command
        );
        let mut console = Console::new(ctx.controller.clone());
        let mut out = io::stdout().lock();
        for line in io::stdin().lock().lines() {
            let line = line.context("read stdin")?;
            for reply in console.handle(&line) {
                writeln!(out, "{reply}")?;
            }
            out.flush()?;
        }
        console.finish();
        Ok(())
    }
}

/// Operator command interpreter. Lines look like `!!rr <sub> ...` or
/// `!!region ...`; the `!!` prefix is optional.
pub struct Console {
    controller: Arc<RestoreJobController>,
    last: Option<JobReceipt>,
}

impl Console {
    pub fn new(controller: Arc<RestoreJobController>) -> Self {
        Self {
            controller,
            last: None,
        }
    }

    pub fn handle(&mut self, line: &str) -> Vec<String> {
        let line = line.trim();
        let line = line.strip_prefix("!!").unwrap_or(line);
        let mut words = line.split_whitespace();
        let Some(root) = words.next() else {
            return Vec::new();
        };
        let args: Vec<&str> = words.collect();
        match root.to_ascii_lowercase().as_str() {
            "rr" => self.rr(&args),
            "region" => vec![self.region(&args)],
            other => vec![format!("Unknown command: {other}. Try !!rr for help.")],
        }
    }

    fn rr(&mut self, args: &[&str]) -> Vec<String> {
        let Some(sub) = args.first() else {
            return vec![
                "RegionRestore commands:".to_string(),
                "!!rr restore <backup_id> <dimension> <region1> [region2] ... - restore regions"
                    .to_string(),
                "!!rr abort - cancel pending restore countdown".to_string(),
                "!!rr status - show whether a restore is running".to_string(),
            ];
        };
        let reply = match sub.to_ascii_lowercase().as_str() {
            "restore" => self.region(&args[1..]),
            "abort" => match self.controller.request_abort() {
                AbortOutcome::Aborted => "Region restore abort requested.".to_string(),
                AbortOutcome::NoActiveJob => "No restore in progress to abort.".to_string(),
            },
            "status" => match self.controller.active_job_id() {
                Some(id) => format!("Restore #{id} is in progress."),
                None => "No restore in progress.".to_string(),
            },
            other => format!("Unknown subcommand: {other}"),
        };
        vec![reply]
    }

    fn region(&mut self, args: &[&str]) -> String {
        if self.controller.is_active() {
            return "A restore is already in progress.".to_string();
        }
        let [id, dim, regions @ ..] = args else {
            return USAGE.to_string();
        };
        if regions.is_empty() {
            return USAGE.to_string();
        }
        let Ok(backup_id) = id.parse::<i64>() else {
            return format!("Invalid backup id: {id}");
        };
        let Ok(dimension) = dim.parse::<Dimension>() else {
            return format!("Invalid dimension: {dim}. Choose overworld, nether, or end.");
        };

        let request = RestoreRequest::new(backup_id, dimension, regions.iter().copied());
        match self.controller.start_restore(request) {
            Ok(receipt) => {
                self.last = Some(receipt);
                format!(
                    "Scheduled restore of backup {backup_id} for regions: {}",
                    regions.join(", ")
                )
            }
            Err(Rejection::InProgress) => "A restore is already in progress.".to_string(),
            Err(e) => format!("Restore rejected: {e}"),
        }
    }

    pub fn finish(&mut self) {
        let Some(receipt) = self.last.take() else {
            return;
        };
        if self.controller.is_active() {
            log::info!("waiting for restore #{} to finish", receipt.id());
        }
        if let Some(res) = receipt.wait() {
            ui::log_result(&res);
        }
    }
}
