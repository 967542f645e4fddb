use std::sync::Arc;

use anyhow::Result;

use crate::{
    config::Config,
    utils::{bins::ensure_bins, process::Runner},
};

pub mod engine;
pub mod host;

pub use engine::{BackupEngine, EngineCli};
pub use host::{HostCli, HostConsole};

pub struct Toolbox {
    engine: Arc<dyn BackupEngine>,
    host: Arc<dyn HostConsole>,
}

impl Toolbox {
    pub fn new(cfg: &Config, runner: Arc<dyn Runner + Send + Sync>) -> Result<Self> {
        ensure_bins([cfg.engine.program.as_str(), cfg.host.program.as_str()])?;

        let engine: Arc<dyn BackupEngine> =
            Arc::new(EngineCli::new(runner.clone(), Arc::new(cfg.engine.clone())));
        let host: Arc<dyn HostConsole> =
            Arc::new(HostCli::new(runner, Arc::new(cfg.host.clone())));

        Ok(Self { engine, host })
    }

    #[inline]
    pub fn engine(&self) -> Arc<dyn BackupEngine> {
        self.engine.clone()
    }
    #[inline]
    pub fn host(&self) -> Arc<dyn HostConsole> {
        self.host.clone()
    }
}
