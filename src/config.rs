use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use config as cfg;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_COUNTDOWN_SECONDS: i64 = 10;
pub const DEFAULT_REGION_PATTERN: &str = "^[A-Za-z0-9_-][A-Za-z0-9._-]*$";
const DEFAULT_EXPORTS_DIR: &str = "rr_exports";
const DEFAULT_OPERATOR: &str = "RegionRestore";
const DEFAULT_ABORT_COMMAND: &str = "!!rr abort";
const DEFAULT_STOP_COMMAND: &str = "stop";
const DEFAULT_PASSWORD_ENV: &str = "MCRCON_PASS";

#[derive(Debug, Clone)]
pub struct Config {
    pub world: World,
    pub restore: Restore,
    pub engine: Engine,
    pub host: Host,
}

#[derive(Debug, Clone)]
pub struct World {
    pub root: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Restore {
    pub create_temp_backup: bool,
    /// Zero or negative skips the countdown entirely.
    pub countdown_seconds: i64,
    pub exports_dir: PathBuf,
    pub operator: String,
    pub region_pattern: Regex,
    pub abort_command: String,
}

#[derive(Debug, Clone)]
pub struct Engine {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub workdir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Host {
    pub program: String,
    pub args: Vec<String>,
    pub password: Option<String>,
    pub password_env: String,
    pub stop_command: String,
    pub broadcast: bool,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let raw: RawConfig = cfg::Config::builder()
            .add_source(cfg::File::from(path))
            .build()
            .with_context(|| format!("load {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("deserialize {}", path.display()))?;

        let n = config_helpers::Normalizer { base_dir };

        let root = n
            .trim_opt(raw.world.root)
            .ok_or_else(|| anyhow!("[world] root must not be empty"))?;
        let world = World {
            root: n.resolve(&root),
        };

        let r = raw.restore;
        let pattern_src = n
            .trim_opt(r.region_pattern)
            .unwrap_or_else(|| DEFAULT_REGION_PATTERN.to_string());
        let region_pattern = Regex::new(&pattern_src)
            .with_context(|| format!("bad [restore] region_pattern: {pattern_src}"))?;
        let operator = n
            .trim_opt(r.operator)
            .unwrap_or_else(|| DEFAULT_OPERATOR.to_string());
        let restore = Restore {
            create_temp_backup: r.create_temp_backup.unwrap_or(false),
            countdown_seconds: r.countdown_seconds.unwrap_or(DEFAULT_COUNTDOWN_SECONDS),
            exports_dir: n.resolve(
                &n.trim_opt(r.exports_dir)
                    .unwrap_or_else(|| DEFAULT_EXPORTS_DIR.to_string()),
            ),
            operator,
            region_pattern,
            abort_command: n
                .trim_opt(r.abort_command)
                .unwrap_or_else(|| DEFAULT_ABORT_COMMAND.to_string()),
        };

        let engine = Engine {
            program: n
                .trim_opt(raw.engine.program)
                .ok_or_else(|| anyhow!("[engine] program must not be empty"))?,
            args: n.clean_args(raw.engine.args.unwrap_or_default()),
            env: Self::parse_env_pairs(raw.engine.env.unwrap_or_default())?,
            workdir: n.trim_opt(raw.engine.workdir).map(|s| n.resolve(&s)),
        };

        let password = match n.trim_opt(raw.host.password_file).map(|s| n.resolve(&s)) {
            Some(p) => Some(
                n.read_secret(&p)
                    .with_context(|| format!("read host password from {}", p.display()))?,
            ),
            None => None,
        };
        let password_env = n
            .trim_opt(raw.host.password_env)
            .unwrap_or_else(|| DEFAULT_PASSWORD_ENV.to_string());
        if !Self::valid_env_name(&password_env) {
            bail!("bad [host] password_env '{password_env}': use [A-Za-z0-9_]");
        }
        let host = Host {
            program: n
                .trim_opt(raw.host.program)
                .ok_or_else(|| anyhow!("[host] program must not be empty"))?,
            args: n.clean_args(raw.host.args.unwrap_or_default()),
            password,
            password_env,
            stop_command: n
                .trim_opt(raw.host.stop_command)
                .unwrap_or_else(|| DEFAULT_STOP_COMMAND.to_string()),
            broadcast: raw.host.broadcast.unwrap_or(true),
        };

        Ok(Self {
            world,
            restore,
            engine,
            host,
        })
    }

    #[inline]
    fn valid_env_name(name: &str) -> bool {
        !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
    }

    fn parse_env_pairs(entries: Vec<String>) -> Result<Vec<(String, String)>> {
        entries
            .iter()
            .map(|e| {
                let (k, v) = e
                    .split_once('=')
                    .ok_or_else(|| anyhow!("bad [engine] env entry '{e}': expected KEY=VALUE"))?;
                let k = k.trim();
                if !Self::valid_env_name(k) {
                    bail!("bad [engine] env name '{k}': use [A-Za-z0-9_]");
                }
                Ok((k.to_string(), v.to_string()))
            })
            .collect()
    }

    pub fn to_redacted_toml(&self) -> Result<String> {
        #[derive(Serialize)]
        struct WorldOut {
            root: String,
        }
        #[derive(Serialize)]
        struct RestoreOut<'a> {
            create_temp_backup: bool,
            countdown_seconds: i64,
            exports_dir: String,
            operator: &'a str,
            region_pattern: &'a str,
            abort_command: &'a str,
        }
        #[derive(Serialize)]
        struct EngineOut<'a> {
            program: &'a str,
            args: &'a [String],
            #[serde(skip_serializing_if = "Vec::is_empty")]
            env: Vec<String>,
            #[serde(skip_serializing_if = "Option::is_none")]
            workdir: Option<String>,
        }
        #[derive(Serialize)]
        struct HostOut<'a> {
            program: &'a str,
            args: &'a [String],
            password: &'static str,
            password_env: &'a str,
            stop_command: &'a str,
            broadcast: bool,
        }
        #[derive(Serialize)]
        struct Out<'a> {
            world: WorldOut,
            restore: RestoreOut<'a>,
            engine: EngineOut<'a>,
            host: HostOut<'a>,
        }

        let out = Out {
            world: WorldOut {
                root: self.world.root.display().to_string(),
            },
            restore: RestoreOut {
                create_temp_backup: self.restore.create_temp_backup,
                countdown_seconds: self.restore.countdown_seconds,
                exports_dir: self.restore.exports_dir.display().to_string(),
                operator: &self.restore.operator,
                region_pattern: self.restore.region_pattern.as_str(),
                abort_command: &self.restore.abort_command,
            },
            engine: EngineOut {
                program: &self.engine.program,
                args: &self.engine.args,
                env: self.engine.env.iter().map(|(k, v)| format!("{k}={v}")).collect(),
                workdir: self.engine.workdir.as_ref().map(|p| p.display().to_string()),
            },
            host: HostOut {
                program: &self.host.program,
                args: &self.host.args,
                password: if self.host.password.is_some() {
                    "<redacted>"
                } else {
                    "<none>"
                },
                password_env: &self.host.password_env,
                stop_command: &self.host.stop_command,
                broadcast: self.host.broadcast,
            },
        };
        Ok(toml::to_string_pretty(&out)?)
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    world: RawWorld,

    #[serde(default)]
    restore: RawRestore,

    engine: RawEngine,

    host: RawHost,
}

#[derive(Debug, Deserialize)]
struct RawWorld {
    root: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRestore {
    create_temp_backup: Option<bool>,
    countdown_seconds: Option<i64>,
    exports_dir: Option<String>,
    operator: Option<String>,
    region_pattern: Option<String>,
    abort_command: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEngine {
    program: Option<String>,
    args: Option<Vec<String>>,
    env: Option<Vec<String>>,
    workdir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    program: Option<String>,
    args: Option<Vec<String>>,
    password_file: Option<String>,
    password_env: Option<String>,
    stop_command: Option<String>,
    broadcast: Option<bool>,
}

mod config_helpers {
    use std::{
        fs,
        path::{Path, PathBuf},
    };

    use anyhow::Result;

    pub(super) struct Normalizer<'a> {
        pub base_dir: &'a Path,
    }

    impl<'a> Normalizer<'a> {
        #[inline]
        pub fn trim_opt(&self, s: Option<String>) -> Option<String> {
            s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
        }

        #[inline]
        pub fn resolve(&self, p: &str) -> PathBuf {
            let pb = PathBuf::from(p.trim());
            if pb.is_absolute() {
                pb
            } else {
                self.base_dir.join(pb)
            }
        }

        pub fn read_secret(&self, p: &Path) -> Result<String> {
            let mut s = String::from_utf8(fs::read(p)?)?;
            while s.ends_with('\n') || s.ends_with('\r') {
                s.pop();
            }
            Ok(s)
        }

        pub fn clean_args(&self, args: Vec<String>) -> Vec<String> {
            args.into_iter().filter(|a| !a.trim().is_empty()).collect()
        }
    }
}
