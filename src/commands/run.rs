use std::{
    io::{self, BufRead},
    sync::Arc,
    thread,
};

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use tracing as log;

use crate::{
    AppCtx,
    restore::{AbortOutcome, Dimension, Phase, RestoreJobController, RestoreRequest},
    ui,
};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Backup id to restore from
    pub backup_id: i64,

    /// Target dimension: overworld, nether or end
    pub dimension: String,

    /// Region identifiers, e.g. r.0.-1
    #[arg(required = true, num_args = 1..)]
    pub regions: Vec<String>,
}

impl RunArgs {
    pub fn run(&self, ctx: &AppCtx) -> Result<()> {
        let dimension: Dimension = self.dimension.parse()?;
        let request = RestoreRequest::new(self.backup_id, dimension, self.regions.iter().cloned());

        let receipt = ctx.controller.start_restore(request)?;
        log::info!(
            "restore #{} scheduled into {}; type 'abort' + Enter to cancel before the server stops",
            receipt.id(),
            ctx.cfg.world.root.display()
        );
        spawn_abort_watcher(ctx.controller.clone())?;

        let res = receipt
            .wait()
            .ok_or_else(|| anyhow!("restore thread exited without a result"))?;
        ui::log_result(&res);

        if res.phase == Phase::Failed {
            bail!(
                "restore #{} failed: {}",
                res.job_id,
                res.reason.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(())
    }
}

fn spawn_abort_watcher(controller: Arc<RestoreJobController>) -> Result<()> {
    thread::Builder::new()
        .name("abort-watcher".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if !line.trim().eq_ignore_ascii_case("abort") {
                    continue;
                }
                match controller.request_abort() {
                    AbortOutcome::Aborted => log::warn!("abort requested"),
                    AbortOutcome::NoActiveJob => log::info!("no restore in progress"),
                }
            }
        })
        .context("spawn abort watcher")?;
    Ok(())
}
