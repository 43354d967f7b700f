use std::fs;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use image::ImageFormat;
use serde::Serialize;
use tracing::{info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::domain::{CatalogRecord, ResizeAlgorithm, ShotClass, SubsetKind};
use crate::error::ShotScaleError;
use crate::fs_util;
use crate::partition::{Partition, Subset};
use crate::resolver::AssetResolver;
use crate::store::AssetStore;
use crate::transform::ImageTransformer;

#[derive(Debug, Clone)]
pub struct RunLayout {
    destination: Utf8PathBuf,
    run_id: String,
}

impl RunLayout {
    pub fn new(destination: impl Into<Utf8PathBuf>, name: &str) -> Self {
        Self::with_run_id(destination, generate_run_id(name))
    }

    pub fn with_run_id(destination: impl Into<Utf8PathBuf>, run_id: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            run_id: run_id.into(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn destination(&self) -> &Utf8Path {
        &self.destination
    }

    pub fn run_dir(&self) -> Utf8PathBuf {
        self.destination.join(&self.run_id)
    }

    pub fn archive_path(&self) -> Utf8PathBuf {
        self.destination.join(format!("{}.zip", self.run_id))
    }

    pub fn class_dir(&self, subset: SubsetKind, class: ShotClass) -> Utf8PathBuf {
        self.run_dir().join(subset.dir_name()).join(class.as_str())
    }

    pub fn image_path(
        &self,
        subset: SubsetKind,
        record: &CatalogRecord,
        algorithm: ResizeAlgorithm,
    ) -> Utf8PathBuf {
        self.class_dir(subset, record.shot_class()).join(format!(
            "{}.{}.jpg",
            record.asset_identity(),
            algorithm
        ))
    }
}

/// `<name>_<token>__<dd-mm-YYYY_HH-MM-SS>`
pub fn generate_run_id(name: &str) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}__{}",
        name,
        &token[..8],
        chrono::Local::now().format("%d-%m-%Y_%H-%M-%S")
    )
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SubsetSummary {
    pub subset: String,
    pub total: usize,
    pub saved: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub run_id: String,
    pub run_dir: String,
    pub archive: String,
    pub archived_files: usize,
    pub total: usize,
    pub saved: usize,
    pub skipped: usize,
    pub subsets: Vec<SubsetSummary>,
}

pub struct DatasetExporter<'a, S: AssetStore> {
    resolver: &'a AssetResolver<S>,
    transformer: ImageTransformer,
    layout: RunLayout,
}

impl<'a, S: AssetStore> DatasetExporter<'a, S> {
    pub fn new(
        resolver: &'a AssetResolver<S>,
        transformer: ImageTransformer,
        layout: RunLayout,
    ) -> Self {
        Self {
            resolver,
            transformer,
            layout,
        }
    }

    pub fn layout(&self) -> &RunLayout {
        &self.layout
    }

    pub fn export(
        &self,
        partition: &Partition,
        sink: &dyn ProgressSink,
    ) -> Result<ExportSummary, ShotScaleError> {
        let run_dir = self.layout.run_dir();
        fs::create_dir_all(run_dir.as_std_path())
            .map_err(|err| ShotScaleError::Filesystem(format!("create {run_dir}: {err}")))?;

        let mut subsets = Vec::new();
        for subset in partition.subsets() {
            if subset.is_empty() {
                continue;
            }
            subsets.push(self.export_subset(subset, sink)?);
        }

        sink.event(ProgressEvent {
            message: format!("phase=Archive; compressing {run_dir}"),
            elapsed: None,
        });
        let archive = self.layout.archive_path();
        let archived_files =
            fs_util::archive_dir(run_dir.as_std_path(), archive.as_std_path())?;
        fs_util::validate_zip(archive.as_std_path())?;

        let total: usize = subsets.iter().map(|subset| subset.total).sum();
        let saved: usize = subsets.iter().map(|subset| subset.saved).sum();
        let skipped: usize = subsets.iter().map(|subset| subset.skipped).sum();
        info!(total, saved, skipped, archive = %archive, "export finished");

        Ok(ExportSummary {
            run_id: self.layout.run_id().to_string(),
            run_dir: run_dir.to_string(),
            archive: archive.to_string(),
            archived_files,
            total,
            saved,
            skipped,
            subsets,
        })
    }

    fn export_subset(
        &self,
        subset: &Subset,
        sink: &dyn ProgressSink,
    ) -> Result<SubsetSummary, ShotScaleError> {
        sink.event(ProgressEvent {
            message: format!("phase=Export; {} ({} records)", subset.kind, subset.len()),
            elapsed: None,
        });
        let start = Instant::now();
        let mut summary = SubsetSummary {
            subset: subset.kind.to_string(),
            total: subset.len(),
            ..SubsetSummary::default()
        };

        for record in &subset.records {
            match self.export_record(subset.kind, record) {
                Ok(path) => {
                    summary.saved += 1;
                    tracing::debug!(path = %path, "image saved");
                }
                Err(err) if err.is_record_level() => {
                    summary.skipped += 1;
                    warn!(sequence_id = record.sequence_id, error = %err, "image skipped");
                }
                Err(err) => return Err(err),
            }
        }

        sink.event(ProgressEvent {
            message: format!(
                "{} saved={} skipped={}",
                subset.kind, summary.saved, summary.skipped
            ),
            elapsed: Some(start.elapsed()),
        });
        Ok(summary)
    }

    fn export_record(
        &self,
        subset: SubsetKind,
        record: &CatalogRecord,
    ) -> Result<Utf8PathBuf, ShotScaleError> {
        let handle = self.resolver.fetch(record)?;
        let image = match handle
            .decode()
            .and_then(|image| self.transformer.transform(&image))
        {
            Ok(image) => image,
            Err(err) => {
                handle.release()?;
                return Err(err);
            }
        };

        let path = self
            .layout
            .image_path(subset, record, self.transformer.algorithm());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| ShotScaleError::Filesystem(format!("create {parent}: {err}")))?;
        }
        // JPEG has no alpha channel.
        image
            .to_rgb8()
            .save_with_format(path.as_std_path(), ImageFormat::Jpeg)
            .map_err(|err| ShotScaleError::Filesystem(format!("write {path}: {err}")))?;
        handle.release()?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClassLabel;

    #[test]
    fn image_path_layout() {
        let layout = RunLayout::with_run_id("/data/out", "shotscale_abcd1234__01-01-2024_00-00-00");
        let record = CatalogRecord {
            sequence_id: 3,
            year: Some(2001),
            director: Some("Jane Doe".to_string()),
            title: Some("My Film".to_string()),
            timestamp_seconds: 0,
            class_label: ClassLabel::new(9).unwrap(),
        };
        let path = layout.image_path(SubsetKind::Validation, &record, ResizeAlgorithm::Cropped);
        assert_eq!(
            path.as_str(),
            "/data/out/shotscale_abcd1234__01-01-2024_00-00-00/validation/others/Jane Doe_2001_My Film_3.cropped.jpg"
        );
        assert_eq!(
            layout.archive_path().as_str(),
            "/data/out/shotscale_abcd1234__01-01-2024_00-00-00.zip"
        );
    }

    #[test]
    fn run_ids_are_unique() {
        let first = generate_run_id("shotscale");
        let second = generate_run_id("shotscale");
        assert!(first.starts_with("shotscale_"));
        assert_ne!(first, second);
    }
}
