use std::sync::Arc;

use anyhow::{Context, Result};
use tracing as log;

use crate::{
    config::Host,
    utils::process::{CmdSpec, EnvValue, Runner, StdioSpec},
};

pub trait HostConsole: Send + Sync {
    fn execute(&self, command: &str) -> Result<()>;
    /// Sends the stop command; does not wait for the process to exit.
    fn issue_stop(&self) -> Result<()>;
}

type DynRunner = dyn Runner + Send + Sync;

pub struct HostCli {
    runner: Arc<DynRunner>,
    host: Arc<Host>,
}

impl HostCli {
    pub fn new(runner: Arc<DynRunner>, host: Arc<Host>) -> Self {
        Self { runner, host }
    }

    fn console_cmd(&self, command: &str) -> CmdSpec {
        let mut cmd = CmdSpec::new(self.host.program.clone())
            .args(self.host.args.clone())
            .arg(command)
            .stdout(StdioSpec::Null)
            .stderr(StdioSpec::Inherit);
        if let Some(ref pw) = self.host.password {
            cmd = cmd.env(self.host.password_env.clone(), EnvValue::Secret(pw.clone()));
        }
        cmd
    }
}

impl HostConsole for HostCli {
    fn execute(&self, command: &str) -> Result<()> {
        self.runner
            .run(&self.console_cmd(command))
            .with_context(|| format!("send console command '{command}'"))
    }

    fn issue_stop(&self) -> Result<()> {
        log::info!("issuing '{}' to the server", self.host.stop_command);
        self.execute(&self.host.stop_command)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct CapturingRunner {
        seen: Mutex<Vec<String>>,
    }

    impl Runner for CapturingRunner {
        fn run(&self, cmd: &CmdSpec) -> Result<()> {
            self.seen.lock().unwrap().push(cmd.render());
            Ok(())
        }
        fn run_capture(&self, cmd: &CmdSpec) -> Result<String> {
            self.run(cmd)?;
            Ok(String::new())
        }
    }

    fn host(password: Option<&str>) -> Host {
        Host {
            program: "mcrcon".into(),
            args: vec!["-H".into(), "127.0.0.1".into()],
            password: password.map(str::to_string),
            password_env: "MCRCON_PASS".into(),
            stop_command: "stop".into(),
            broadcast: true,
        }
    }

    #[test]
    fn stop_uses_configured_command_and_secret_env() {
        let runner = Arc::new(CapturingRunner::default());
        let cli = HostCli::new(runner.clone(), Arc::new(host(Some("pw"))));
        cli.issue_stop().unwrap();
        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), ["MCRCON_PASS=<redacted> mcrcon -H 127.0.0.1 stop"]);
    }

    #[test]
    fn execute_passes_command_as_single_arg() {
        let runner = Arc::new(CapturingRunner::default());
        let cli = HostCli::new(runner.clone(), Arc::new(host(None)));
        cli.execute("say Stopping server in 3 seconds...").unwrap();
        let seen = runner.seen.lock().unwrap();
        assert_eq!(
            seen[0],
            "mcrcon -H 127.0.0.1 'say Stopping server in 3 seconds...'"
        );
    }
}
