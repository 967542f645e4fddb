use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use fs2::FileExt;

pub const LOCK_FILE: &str = ".regionrestore.lock";

/// Advisory `flock` on a file under the exports root, held for the lifetime of
/// one restore run so two processes never write the same world concurrently.
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("path", &self.path)
            .finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

impl LockGuard {
    pub fn try_acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("create lock dir {}", dir.display()))?;
        let path = dir.join(LOCK_FILE);
        let file = open_lockfile(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file, path }),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                bail!("another restore holds lock: {}", path.display())
            }
            Err(e) => Err(e).with_context(|| format!("flock {}", path.display())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_lockfile(path: &Path) -> Result<File> {
    let mut opts = OpenOptions::new();
    opts.read(true).write(true).create(true).truncate(false);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o644);
    }
    opts.open(path)
        .with_context(|| format!("open lockfile {}", path.display()))
}
