use std::{
    path::PathBuf,
    process::{Command, Stdio},
};

use anyhow::{Context, Result, bail};
use tracing as log;

#[derive(Clone, Debug)]
pub enum EnvValue {
    Plain(String),
    Secret(String),
}

#[derive(Clone, Debug)]
pub enum StdioSpec {
    Inherit,
    Null,
    Pipe,
}

impl StdioSpec {
    #[inline]
    fn to_stdio(&self) -> Stdio {
        match self {
            StdioSpec::Inherit => Stdio::inherit(),
            StdioSpec::Null => Stdio::null(),
            StdioSpec::Pipe => Stdio::piped(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct CmdSpec {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, EnvValue)>,
    stdin: StdioSpec,
    stdout: StdioSpec,
    stderr: StdioSpec,
    cwd: Option<PathBuf>,
}

impl CmdSpec {
    #[must_use]
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            stdin: StdioSpec::Null,
            stdout: StdioSpec::Inherit,
            stderr: StdioSpec::Inherit,
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, a: impl Into<String>) -> Self {
        self.args.push(a.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, it: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(it.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, k: impl Into<String>, v: EnvValue) -> Self {
        self.envs.push((k.into(), v));
        self
    }

    #[must_use]
    pub fn stdout(mut self, s: StdioSpec) -> Self {
        self.stdout = s;
        self
    }

    #[must_use]
    pub fn stderr(mut self, s: StdioSpec) -> Self {
        self.stderr = s;
        self
    }

    #[must_use]
    pub fn cwd<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn render(&self) -> String {
        let prog = sh_quote(&self.program);
        let args: Vec<String> = self.args.iter().map(|a| sh_quote(a)).collect();
        let mut env_prefix = String::new();
        for (k, v) in &self.envs {
            match v {
                EnvValue::Plain(val) => env_prefix.push_str(&format!("{k}={} ", sh_quote(val))),
                EnvValue::Secret(_) => env_prefix.push_str(&format!("{k}=<redacted> ")),
            }
        }
        format!("{}{} {}", env_prefix, prog, args.join(" "))
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (k, v) in &self.envs {
            match v {
                EnvValue::Plain(val) => cmd.env(k, val),
                EnvValue::Secret(val) => cmd.env(k, val),
            };
        }
        if let Some(ref d) = self.cwd {
            cmd.current_dir(d);
        }
        cmd.stdin(self.stdin.to_stdio());
        cmd.stderr(self.stderr.to_stdio());
        cmd
    }
}

pub trait Runner: Send + Sync {
    fn run(&self, cmd: &CmdSpec) -> Result<()>;
    fn run_capture(&self, cmd: &CmdSpec) -> Result<String>;
}

#[derive(Default, Clone, Copy)]
pub struct ProcessRunner;

impl Runner for ProcessRunner {
    fn run(&self, spec: &CmdSpec) -> Result<()> {
        log::debug!("exec: {}", spec.render());

        let mut cmd = spec.to_command();
        cmd.stdout(spec.stdout.to_stdio());

        let status = cmd
            .status()
            .with_context(|| format!("spawn {}", spec.render()))?;
        if !status.success() {
            bail!("command failed: {} with {status}", spec.render());
        }
        Ok(())
    }

    fn run_capture(&self, spec: &CmdSpec) -> Result<String> {
        log::debug!("exec(capture): {}", spec.render());

        let mut cmd = spec.to_command();
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let out = cmd
            .output()
            .with_context(|| format!("run {}", spec.render()))?;
        if out.status.success() {
            Ok(String::from_utf8_lossy(&out.stdout).to_string())
        } else {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                bail!("command failed: {} (status {})", spec.render(), out.status);
            }
            bail!(
                "command failed: {} (status {}): {stderr}",
                spec.render(),
                out.status
            );
        }
    }
}

fn sh_quote(s: &str) -> String {
    if s.is_empty() {
        return "''".into();
    }
    if !s
        .bytes()
        .any(|b| b == b' ' || b == b'\'' || b == b'"' || b == b'\\')
    {
        return s.to_string();
    }
    let mut out = String::from("'");
    for c in s.chars() {
        if c == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}
