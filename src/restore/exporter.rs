use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use tracing as log;

use crate::{
    tooling::BackupEngine,
    utils::{
        naming::{export_dir_name, sanitize_label},
        time::compact_utc_now,
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportHandle {
    dir: PathBuf,
}

impl ExportHandle {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

pub struct SnapshotExporter {
    engine: Arc<dyn BackupEngine>,
}

impl SnapshotExporter {
    pub fn new(engine: Arc<dyn BackupEngine>) -> Self {
        Self { engine }
    }

    /// Exports into `<root>/<id>_<label>`. The engine writes into a hidden
    /// staging dir first; a previous export with the same final name is
    /// replaced only once the new one is complete.
    pub fn export(&self, backup_id: i64, root: &Path) -> Result<ExportHandle> {
        fs::create_dir_all(root)
            .with_context(|| format!("create exports root {}", root.display()))?;

        let name = export_dir_name(backup_id, &self.discriminator(backup_id)?);
        let final_dir = root.join(&name);
        let staging = root.join(format!(".{name}.partial"));

        remove_dir_if_exists(&staging)?;
        log::debug!("[export] backup #{backup_id} -> {}", staging.display());
        if let Err(e) = self.engine.export_backup(backup_id, &staging) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e.context(format!("export backup #{backup_id}")));
        }
        if !staging.is_dir() {
            bail!(
                "backup engine produced no export directory for backup #{backup_id} at {}",
                staging.display()
            );
        }

        if remove_dir_if_exists(&final_dir)? {
            log::info!("[export] replacing previous export {}", final_dir.display());
        }
        fs::rename(&staging, &final_dir).with_context(|| {
            format!("move {} -> {}", staging.display(), final_dir.display())
        })?;

        log::info!("[export] backup #{backup_id} exported to {}", final_dir.display());
        Ok(ExportHandle::new(final_dir))
    }

    fn discriminator(&self, backup_id: i64) -> Result<String> {
        let description = match self.engine.describe(backup_id) {
            Ok(d) => d,
            Err(e) => {
                log::debug!("[export] no description for backup #{backup_id}: {e:#}");
                None
            }
        };
        let label = description.as_deref().map(sanitize_label).unwrap_or_default();
        if label.is_empty() {
            compact_utc_now()
        } else {
            Ok(label)
        }
    }
}

fn remove_dir_if_exists(dir: &Path) -> Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("remove {}", dir.display())),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::restore::testkit::MockEngine;

    #[test]
    fn names_dir_after_sanitized_description() {
        let tmp = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new().with_backup(
            42,
            Some("before: nether fix!"),
            &["r.0.0"],
        ));
        let handle = SnapshotExporter::new(engine)
            .export(42, &tmp.path().join("rr_exports"))
            .unwrap();
        assert_eq!(handle.dir(), tmp.path().join("rr_exports/42_before__nether_fix"));
        assert!(handle.dir().join("r.0.0.mca").is_file());
    }

    #[test]
    fn falls_back_to_timestamp_without_description() {
        let tmp = TempDir::new().unwrap();
        let engine = Arc::new(
            MockEngine::new()
                .with_backup(7, None, &["r.1.1"])
                .with_backup(8, Some("???"), &["r.1.1"]),
        );
        let exporter = SnapshotExporter::new(engine);
        for id in [7, 8] {
            let handle = exporter.export(id, tmp.path()).unwrap();
            let name = handle.dir().file_name().unwrap().to_string_lossy().to_string();
            let stamp = name.strip_prefix(&format!("{id}_")).unwrap();
            assert_eq!(stamp.len(), "20240131T235959Z".len(), "{name}");
            assert!(stamp.ends_with('Z'), "{name}");
        }
    }

    #[test]
    fn second_export_replaces_first() {
        let tmp = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new().with_backup(42, Some("daily"), &["r.0.0"]));
        let exporter = SnapshotExporter::new(engine);

        let first = exporter.export(42, tmp.path()).unwrap();
        fs::write(first.dir().join("stale.mca"), b"old").unwrap();

        let second = exporter.export(42, tmp.path()).unwrap();
        assert_eq!(first, second);
        assert!(second.dir().join("r.0.0.mca").is_file());
        assert!(!second.dir().join("stale.mca").exists());
        assert!(!tmp.path().join(".42_daily.partial").exists());
    }

    #[test]
    fn engine_error_propagates_and_cleans_staging() {
        let tmp = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new());
        let err = SnapshotExporter::new(engine)
            .export(5, tmp.path())
            .unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("export backup #5"), "{msg}");
        assert!(msg.contains("not found"), "{msg}");
        let leftovers: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn existing_export_survives_failed_reexport() {
        let tmp = TempDir::new().unwrap();
        let engine = Arc::new(MockEngine::new().with_backup(42, Some("daily"), &["r.0.0"]));
        let first = SnapshotExporter::new(engine.clone()).export(42, tmp.path()).unwrap();

        engine.fail_exports("disk full");
        assert!(SnapshotExporter::new(engine).export(42, tmp.path()).is_err());
        assert!(first.dir().join("r.0.0.mca").is_file());
    }
}
