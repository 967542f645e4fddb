use std::{fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use tracing as log;

use super::{Dimension, ExportHandle, RegionFailure};

pub const REGION_EXT: &str = "mca";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<RegionFailure>,
}

pub struct RegionFileCopier {
    world_root: PathBuf,
}

impl RegionFileCopier {
    pub fn new(world_root: PathBuf) -> Self {
        Self { world_root }
    }

    /// Copies `<region>.mca` for every requested region, overwriting the live
    /// file. A failing region is recorded and the rest still run; only an
    /// unusable source or destination directory fails the whole call.
    pub fn copy(
        &self,
        export: &ExportHandle,
        dimension: Dimension,
        regions: &[String],
    ) -> Result<CopyReport> {
        let src_dir = export.dir();
        let meta = fs::metadata(src_dir)
            .with_context(|| format!("inspect export directory {}", src_dir.display()))?;
        if !meta.is_dir() {
            bail!("export path {} is not a directory", src_dir.display());
        }

        let dest_dir = dimension.region_dir(&self.world_root);
        fs::create_dir_all(&dest_dir)
            .with_context(|| format!("create region directory {}", dest_dir.display()))?;

        let mut report = CopyReport::default();
        for region in regions {
            let file = format!("{region}.{REGION_EXT}");
            let src = src_dir.join(&file);
            let dest = dest_dir.join(&file);
            match fs::copy(&src, &dest) {
                Ok(bytes) => {
                    log::debug!("[copy] {} -> {} ({bytes} bytes)", src.display(), dest.display());
                    report.succeeded.push(region.clone());
                }
                Err(e) => {
                    log::warn!("[copy] {} failed: {e}", src.display());
                    report.failed.push(RegionFailure {
                        region: region.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::TempDir;

    use super::*;

    fn export_with(dir: &Path, files: &[(&str, &str)]) -> ExportHandle {
        fs::create_dir_all(dir).unwrap();
        for (name, body) in files {
            fs::write(dir.join(name), body).unwrap();
        }
        ExportHandle::new(dir.to_path_buf())
    }

    fn regions(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn copies_into_overworld_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let world = tmp.path().join("world");
        let export = export_with(
            &tmp.path().join("export"),
            &[("r.0.0.mca", "new00"), ("r.1.0.mca", "new10")],
        );
        fs::create_dir_all(world.join("region")).unwrap();
        fs::write(world.join("region/r.0.0.mca"), b"old").unwrap();

        let report = RegionFileCopier::new(world.clone())
            .copy(&export, Dimension::Overworld, &regions(&["r.0.0", "r.1.0"]))
            .unwrap();

        assert_eq!(report.succeeded, regions(&["r.0.0", "r.1.0"]));
        assert!(report.failed.is_empty());
        assert_eq!(fs::read(world.join("region/r.0.0.mca")).unwrap(), b"new00");
        assert_eq!(fs::read(world.join("region/r.1.0.mca")).unwrap(), b"new10");
    }

    #[test]
    fn missing_file_fails_only_that_region() {
        let tmp = TempDir::new().unwrap();
        let world = tmp.path().join("world");
        let export = export_with(
            &tmp.path().join("export"),
            &[("r.0.0.mca", "a"), ("r.2.2.mca", "c")],
        );

        let report = RegionFileCopier::new(world.clone())
            .copy(&export, Dimension::Nether, &regions(&["r.0.0", "r.1.0", "r.2.2"]))
            .unwrap();

        assert_eq!(report.succeeded, regions(&["r.0.0", "r.2.2"]));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].region, "r.1.0");
        assert!(!report.failed[0].reason.is_empty());
        assert!(world.join("DIM-1/region/r.2.2.mca").is_file());
        assert!(!world.join("DIM-1/region/r.1.0.mca").exists());
    }

    #[test]
    fn every_region_lands_in_exactly_one_bucket() {
        let tmp = TempDir::new().unwrap();
        let export = export_with(&tmp.path().join("export"), &[("r.0.0.mca", "a")]);
        // a directory where a file is expected cannot be copied
        fs::create_dir_all(export.dir().join("r.5.5.mca")).unwrap();
        let wanted = regions(&["r.0.0", "r.5.5", "r.9.9", "r.0.0"]);

        let report = RegionFileCopier::new(tmp.path().join("world"))
            .copy(&export, Dimension::End, &wanted)
            .unwrap();

        let mut all: Vec<String> = report.succeeded.clone();
        all.extend(report.failed.iter().map(|f| f.region.clone()));
        all.sort();
        let mut expected = wanted.clone();
        expected.sort();
        assert_eq!(all, expected);
        assert_eq!(report.succeeded, regions(&["r.0.0", "r.0.0"]));
    }

    #[test]
    fn missing_export_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let export = ExportHandle::new(tmp.path().join("gone"));
        let err = RegionFileCopier::new(tmp.path().join("world"))
            .copy(&export, Dimension::Overworld, &regions(&["r.0.0"]))
            .unwrap_err();
        assert!(format!("{err:#}").contains("export directory"), "{err:#}");
    }

    #[test]
    fn export_path_that_is_a_file_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("export");
        fs::write(&path, b"x").unwrap();
        let err = RegionFileCopier::new(tmp.path().join("world"))
            .copy(&ExportHandle::new(path), Dimension::Overworld, &regions(&["r.0.0"]))
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"), "{err}");
    }
}
