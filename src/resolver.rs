use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

use camino::Utf8PathBuf;
use image::DynamicImage;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::FetchSettings;
use crate::domain::CatalogRecord;
use crate::error::ShotScaleError;
use crate::store::AssetStore;

/// A fetched frame backed by a scoped temporary file.
///
/// Holding a handle means the bytes are on disk; a failed fetch never produces
/// one. `release` removes the backing file, and dropping the handle does the
/// same on early-return paths.
#[derive(Debug)]
pub struct AssetHandle {
    key: String,
    file: NamedTempFile,
}

impl AssetHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn decode(&self) -> Result<DynamicImage, ShotScaleError> {
        image::ImageReader::open(self.file.path())
            .map_err(|err| ShotScaleError::TransformFailure(format!("{}: {err}", self.key)))?
            .with_guessed_format()
            .map_err(|err| ShotScaleError::TransformFailure(format!("{}: {err}", self.key)))?
            .decode()
            .map_err(|err| ShotScaleError::TransformFailure(format!("{}: {err}", self.key)))
    }

    pub fn release(self) -> Result<(), ShotScaleError> {
        self.file
            .close()
            .map_err(|err| ShotScaleError::Filesystem(format!("release {}: {err}", self.key)))
    }
}

pub struct AssetResolver<S: AssetStore> {
    store: S,
    attempts: usize,
    retry_delay: Duration,
    temp_dir: Option<Utf8PathBuf>,
}

impl<S: AssetStore> AssetResolver<S> {
    pub fn new(store: S, settings: &FetchSettings) -> Self {
        Self {
            store,
            attempts: settings.attempts.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
            temp_dir: None,
        }
    }

    pub fn with_temp_dir(mut self, dir: Utf8PathBuf) -> Self {
        self.temp_dir = Some(dir);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetch(&self, record: &CatalogRecord) -> Result<AssetHandle, ShotScaleError> {
        let key = record.object_key()?;
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.store.get(&key) {
                Ok(bytes) => {
                    debug!(key = %key, bytes = bytes.len(), attempt, "asset fetched");
                    return self.persist(key, &bytes);
                }
                Err(ShotScaleError::AssetNotFound(_)) => {
                    warn!(key = %key, "error while fetching resource: not found");
                    return Err(ShotScaleError::AssetNotFound(key));
                }
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    warn!(key = %key, attempt, error = %err, "error while fetching resource, retrying");
                    thread::sleep(self.retry_delay * attempt as u32);
                }
                Err(err) => {
                    warn!(key = %key, attempt, error = %err, "error while fetching resource");
                    return Err(ShotScaleError::FetchFailure {
                        key,
                        attempts: attempt,
                        reason: err.to_string(),
                    });
                }
            }
        }
    }

    fn persist(&self, key: String, bytes: &[u8]) -> Result<AssetHandle, ShotScaleError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("shotscale-asset").suffix(".jpg");
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir.as_std_path()),
            None => builder.tempfile(),
        }
        .map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
        file.write_all(bytes)
            .map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
        file.flush()
            .map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
        Ok(AssetHandle { key, file })
    }
}
