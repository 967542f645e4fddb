use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod config;
mod restore;
mod tooling;
mod ui;
mod utils;

use commands::{ConsoleArgs, RunArgs};
use config::Config;
use restore::{Fanout, JobDeps, LogSink, NoticeSink, RestoreJobController, RestoreSettings};
use tooling::Toolbox;
use utils::process::ProcessRunner;

pub struct AppCtx {
    pub cfg: Config,
    pub controller: Arc<RestoreJobController>,
}

impl AppCtx {
    fn new(cfg: Config) -> Result<Self> {
        let toolbox = Toolbox::new(&cfg, Arc::new(ProcessRunner))?;

        let mut sinks: Vec<Arc<dyn NoticeSink>> = vec![Arc::new(LogSink)];
        if cfg.host.broadcast {
            sinks.push(Arc::new(ui::BroadcastSink::new(
                toolbox.host(),
                cfg.restore.abort_command.clone(),
            )));
        }
        let deps = JobDeps {
            engine: toolbox.engine(),
            host: toolbox.host(),
            sink: Arc::new(Fanout::new(sinks)),
        };
        let controller = RestoreJobController::new(RestoreSettings::from_config(&cfg), deps);

        tracing::debug!(
            "world={} exports={} countdown={}s temp_backup={}",
            cfg.world.root.display(),
            cfg.restore.exports_dir.display(),
            cfg.restore.countdown_seconds,
            cfg.restore.create_temp_backup
        );
        Ok(Self {
            cfg,
            controller: Arc::new(controller),
        })
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "regionrestore",
    about = "Restore selected Minecraft region files from an engine-managed backup",
    arg_required_else_help = false,
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[arg(long, default_value = "./config.toml", global = true)]
    config: PathBuf,

    #[arg(long, global = true)]
    debug: bool,

    #[arg(long, global = true)]
    check_config: bool,

    #[arg(long, global = true)]
    print_config: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Restore regions once, waiting for the result
    Run(RunArgs),
    /// Read `!!rr` / `!!region` commands from stdin
    Console(ConsoleArgs),
}

fn init_tracing(debug: bool) {
    let default = if debug { "trace" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_file(debug)
        .with_line_number(debug)
        .without_time()
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if cli.command.is_none() && !cli.check_config && !cli.print_config {
        let mut cmd = Cli::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    }
    let cfg = Config::load(&cli.config)?;

    if cli.check_config {
        tracing::info!("config OK");
        return Ok(());
    }
    if cli.print_config {
        println!("{}", cfg.to_redacted_toml()?);
        return Ok(());
    }

    let Some(cmd) = cli.command else {
        let mut cmd = Cli::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let ctx = AppCtx::new(cfg)?;

    match cmd {
        Cmd::Run(args) => args.run(&ctx),
        Cmd::Console(args) => args.run(&ctx),
    }
}
