use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ShotScaleError {
    #[error("missing config file shotscale.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported resize algorithm: {0}")]
    #[diagnostic(help("pick one of --cropped or --rescale"))]
    UnsupportedAlgorithm(String),

    #[error("unsupported split strategy: {0}")]
    #[diagnostic(help("pick one of none, random, director or movie"))]
    UnsupportedStrategy(String),

    #[error("failed to read catalog at {0}")]
    CatalogRead(PathBuf),

    #[error("catalog row {row}: {message}")]
    CatalogRow { row: usize, message: String },

    #[error("catalog is missing column {0}")]
    MissingColumn(String),

    #[error("catalog row {row}: class label {value} is not mapped to a shot class")]
    #[diagnostic(help("known labels are 0 (close), 1 (medium), 2 (large) and 9 (others)"))]
    UnmappedClass { row: usize, value: String },

    #[error("movie key {key} is shared by \"{first}\" and \"{second}\"")]
    MovieKeyCollision {
        key: String,
        first: String,
        second: String,
    },

    #[error("record {sequence_id} is missing {missing}")]
    IncompleteRecord { sequence_id: u32, missing: String },

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    #[error("asset store request failed: {0}")]
    StoreHttp(String),

    #[error("asset store returned status {status}: {message}")]
    StoreStatus { status: u16, message: String },

    #[error("failed to fetch {key} after {attempts} attempt(s): {reason}")]
    FetchFailure {
        key: String,
        attempts: usize,
        reason: String,
    },

    #[error("asset store cannot enumerate groups: {0}")]
    #[diagnostic(help("list the asset groups under `directories` in the config file"))]
    GroupEnumeration(String),

    #[error("failed to transform image: {0}")]
    TransformFailure(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("archive error: {0}")]
    Archive(String),
}

impl ShotScaleError {
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            ShotScaleError::IncompleteRecord { .. }
                | ShotScaleError::AssetNotFound(_)
                | ShotScaleError::StoreHttp(_)
                | ShotScaleError::StoreStatus { .. }
                | ShotScaleError::FetchFailure { .. }
                | ShotScaleError::TransformFailure(_)
        )
    }

    pub(crate) fn is_transient(&self) -> bool {
        match self {
            ShotScaleError::StoreHttp(_) => true,
            ShotScaleError::StoreStatus { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }
}
