use std::fs;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{CatalogIndex, LinkedCatalog};
use crate::config::ResolvedConfig;
use crate::domain::{CatalogRecord, ResizeAlgorithm, ShotClass, SplitStrategy};
use crate::error::ShotScaleError;
use crate::export::{DatasetExporter, ExportSummary, RunLayout};
use crate::partition::Partitioner;
use crate::resolver::AssetResolver;
use crate::store::AssetStore;
use crate::transform::ImageTransformer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Local(Utf8PathBuf),
    Remote,
}

#[derive(Debug, Clone)]
pub struct PrepareOptions {
    pub algorithm: Option<ResizeAlgorithm>,
    pub strategy: SplitStrategy,
    pub target: SaveTarget,
    pub limit: Option<usize>,
    pub validate: bool,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrepareResult {
    pub algorithm: ResizeAlgorithm,
    pub strategy: SplitStrategy,
    pub movies_linked: usize,
    pub datapoints: usize,
    pub summary: ExportSummary,
    pub uploaded_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InspectResult {
    pub records: usize,
    pub movies: usize,
    pub movies_linked: usize,
    pub datapoints: usize,
    pub classes: Vec<(ShotClass, usize)>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<S: AssetStore> {
    config: ResolvedConfig,
    resolver: AssetResolver<S>,
}

impl<S: AssetStore> App<S> {
    pub fn new(config: ResolvedConfig, store: S) -> Self {
        let resolver = AssetResolver::new(store, &config.fetch);
        Self { config, resolver }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn inspect(&self, sink: &dyn ProgressSink) -> Result<InspectResult, ShotScaleError> {
        let index = self.open_catalog(sink)?;
        let linked = index.link(&self.directories()?);
        let stats = index.stats();
        Ok(InspectResult {
            records: stats.records,
            movies: stats.movies,
            movies_linked: linked.movies_linked,
            datapoints: linked.records.len(),
            classes: stats.classes,
        })
    }

    pub fn prepare(
        &self,
        options: PrepareOptions,
        sink: &dyn ProgressSink,
    ) -> Result<PrepareResult, ShotScaleError> {
        // Configuration problems surface before any I/O.
        let algorithm = ResizeAlgorithm::require(options.algorithm)?;
        let transformer = ImageTransformer::new(algorithm, self.config.image_size)?;

        let linked = self.load_catalog(sink)?;
        let movies_linked = linked.movies_linked;
        let mut records = linked.records;
        if options.validate {
            records = self.valid_records(records, sink);
        }
        if let Some(limit) = options.limit {
            records.truncate(limit);
        }
        let datapoints = records.len();

        sink.event(ProgressEvent {
            message: format!("phase=Split; {} over {datapoints} records", options.strategy),
            elapsed: None,
        });
        let partition = Partitioner::new(options.strategy, self.config.ratios)
            .with_baseline(self.config.baseline)
            .with_seed(options.seed.or(self.config.seed))
            .partition(records);

        let (summary, uploaded_key) = match &options.target {
            SaveTarget::Local(destination) => {
                let layout = RunLayout::new(destination.clone(), &self.config.run_name);
                let exporter = DatasetExporter::new(&self.resolver, transformer, layout);
                (exporter.export(&partition, sink)?, None)
            }
            SaveTarget::Remote => {
                let staging = tempfile::Builder::new()
                    .prefix("shotscale-run")
                    .tempdir()
                    .map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
                let destination = Utf8PathBuf::from_path_buf(staging.path().to_path_buf())
                    .map_err(|_| ShotScaleError::Filesystem("non-utf8 temp dir".to_string()))?;
                let layout = RunLayout::new(destination, &self.config.run_name);
                let exporter = DatasetExporter::new(&self.resolver, transformer, layout);
                let summary = exporter.export(&partition, sink)?;

                let key = format!("{}.zip", summary.run_id);
                sink.event(ProgressEvent {
                    message: format!("phase=Upload; {key}"),
                    elapsed: None,
                });
                let content = fs::read(&summary.archive)
                    .map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
                self.resolver.store().put(&key, &content)?;
                info!(key = %key, bytes = content.len(), "archive uploaded");
                (summary, Some(key))
            }
        };

        Ok(PrepareResult {
            algorithm,
            strategy: options.strategy,
            movies_linked,
            datapoints,
            summary,
            uploaded_key,
        })
    }

    pub fn load_catalog(&self, sink: &dyn ProgressSink) -> Result<LinkedCatalog, ShotScaleError> {
        let index = self.open_catalog(sink)?;
        let directories = self.directories()?;
        sink.event(ProgressEvent {
            message: format!("phase=Link; {} asset groups", directories.len()),
            elapsed: None,
        });
        Ok(index.link(&directories))
    }

    fn open_catalog(&self, sink: &dyn ProgressSink) -> Result<CatalogIndex, ShotScaleError> {
        sink.event(ProgressEvent {
            message: format!("phase=Load; reading {}", self.config.catalog_path),
            elapsed: None,
        });
        CatalogIndex::open(&self.config)
    }

    fn directories(&self) -> Result<Vec<String>, ShotScaleError> {
        match &self.config.directories {
            Some(directories) => {
                info!(movies = directories.len(), "asset groups listed in config");
                Ok(directories.clone())
            }
            None => self.resolver.store().list_groups(),
        }
    }

    fn valid_records(
        &self,
        records: Vec<CatalogRecord>,
        sink: &dyn ProgressSink,
    ) -> Vec<CatalogRecord> {
        sink.event(ProgressEvent {
            message: format!("phase=Validate; checking {} assets", records.len()),
            elapsed: None,
        });
        let before = records.len();
        let store = self.resolver.store();
        let valid: Vec<CatalogRecord> = records
            .into_iter()
            .filter(|record| {
                let Ok(key) = record.object_key() else {
                    return false;
                };
                match store.exists(&key) {
                    Ok(found) => found,
                    Err(err) => {
                        warn!(key = %key, error = %err, "could not check asset");
                        false
                    }
                }
            })
            .collect();
        info!(valid = valid.len(), checked = before, "assets validated");
        valid
    }
}
