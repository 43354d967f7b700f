use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::ShotScaleError;

pub const DEFAULT_CONFIG_FILE: &str = "shotscale.json";
pub const MAX_IMAGE_SIZE: u32 = 4096;

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    pub catalog: CatalogSection,
    pub store: StoreSection,
    #[serde(default)]
    pub directories: Option<Vec<String>>,
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub split: SplitSection,
    #[serde(default)]
    pub fetch: FetchSection,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CatalogSection {
    pub path: String,
    #[serde(default)]
    pub delimiter: Option<char>,
    #[serde(default)]
    pub columns: ColumnNames,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ColumnNames {
    #[serde(default = "default_id_column")]
    pub id: String,
    #[serde(default = "default_director_column")]
    pub director: String,
    #[serde(default = "default_title_column")]
    pub title: String,
    #[serde(default = "default_class_column")]
    pub class: String,
    #[serde(default = "default_timestamp_column")]
    pub timestamp: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            id: default_id_column(),
            director: default_director_column(),
            title: default_title_column(),
            class: default_class_column(),
            timestamp: default_timestamp_column(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreSection {
    Http {
        base_url: String,
        #[serde(default)]
        upload_url: Option<String>,
    },
    Local {
        root: String,
    },
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct OutputSection {
    #[serde(default)]
    pub image_size: Option<u32>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SplitSection {
    #[serde(default)]
    pub ratios: Option<[f64; 3]>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub baseline: Option<usize>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FetchSection {
    #[serde(default)]
    pub attempts: Option<usize>,
    #[serde(default)]
    pub retry_delay_ms: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub training: f64,
    pub validation: f64,
    pub testing: f64,
}

impl SplitRatios {
    pub fn new(training: f64, validation: f64, testing: f64) -> Result<Self, ShotScaleError> {
        let values = [training, validation, testing];
        if values
            .iter()
            .any(|value| !value.is_finite() || !(0.0..=1.0).contains(value))
        {
            return Err(ShotScaleError::InvalidConfig(format!(
                "split ratios must lie in [0, 1], got {values:?}"
            )));
        }
        if values.iter().sum::<f64>() > 1.0 + 1e-6 {
            return Err(ShotScaleError::InvalidConfig(format!(
                "split ratios must not sum above 1, got {values:?}"
            )));
        }
        Ok(Self {
            training,
            validation,
            testing,
        })
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            training: 0.8,
            validation: 0.1,
            testing: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreLocation {
    Http {
        base_url: String,
        upload_url: Option<String>,
    },
    Local {
        root: Utf8PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub attempts: usize,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            attempts: 2,
            retry_delay_ms: 200,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub catalog_path: Utf8PathBuf,
    pub delimiter: u8,
    pub columns: ColumnNames,
    pub store: StoreLocation,
    pub directories: Option<Vec<String>>,
    pub image_size: u32,
    pub run_name: String,
    pub ratios: SplitRatios,
    pub seed: Option<u64>,
    pub baseline: Option<usize>,
    pub fetch: FetchSettings,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ShotScaleError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(ShotScaleError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ShotScaleError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ShotScaleError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ShotScaleError> {
        let schema_version = config.schema_version.unwrap_or(1);

        if config.catalog.path.trim().is_empty() {
            return Err(ShotScaleError::InvalidConfig(
                "catalog.path must not be empty".to_string(),
            ));
        }
        let delimiter = config.catalog.delimiter.unwrap_or(',');
        if !delimiter.is_ascii() {
            return Err(ShotScaleError::InvalidConfig(format!(
                "catalog.delimiter must be a single ASCII character, got {delimiter:?}"
            )));
        }

        let store = match config.store {
            StoreSection::Http {
                base_url,
                upload_url,
            } => {
                if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
                    return Err(ShotScaleError::InvalidConfig(format!(
                        "store.base_url must be an http(s) URL, got {base_url}"
                    )));
                }
                StoreLocation::Http {
                    base_url: base_url.trim_end_matches('/').to_string(),
                    upload_url: upload_url.map(|url| url.trim_end_matches('/').to_string()),
                }
            }
            StoreSection::Local { root } => StoreLocation::Local {
                root: Utf8PathBuf::from(root),
            },
        };

        let image_size = config.output.image_size.unwrap_or(224);
        if image_size == 0 || image_size > MAX_IMAGE_SIZE {
            return Err(ShotScaleError::InvalidConfig(format!(
                "output.image_size must be between 1 and {MAX_IMAGE_SIZE}"
            )));
        }

        let ratios = match config.split.ratios {
            Some([training, validation, testing]) => {
                SplitRatios::new(training, validation, testing)?
            }
            None => SplitRatios::default(),
        };

        let fetch = FetchSettings {
            attempts: config.fetch.attempts.unwrap_or(2),
            retry_delay_ms: config.fetch.retry_delay_ms.unwrap_or(200),
            timeout_secs: config.fetch.timeout_secs.unwrap_or(30),
        };
        if fetch.attempts == 0 {
            return Err(ShotScaleError::InvalidConfig(
                "fetch.attempts must be at least 1".to_string(),
            ));
        }

        Ok(ResolvedConfig {
            schema_version,
            catalog_path: Utf8PathBuf::from(config.catalog.path),
            delimiter: delimiter as u8,
            columns: config.catalog.columns,
            store,
            directories: config.directories,
            image_size,
            run_name: config
                .output
                .name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| "shotscale".to_string()),
            ratios,
            seed: config.split.seed,
            baseline: config.split.baseline,
            fetch,
        })
    }
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_director_column() -> String {
    "director".to_string()
}

fn default_title_column() -> String {
    "title".to_string()
}

fn default_class_column() -> String {
    "class".to_string()
}

fn default_timestamp_column() -> String {
    "timestamp".to_string()
}
