use std::fs;
use std::io;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::config::{FetchSettings, StoreLocation};
use crate::error::ShotScaleError;

pub trait AssetStore: Send + Sync {
    fn exists(&self, key: &str) -> Result<bool, ShotScaleError>;
    fn get(&self, key: &str) -> Result<Vec<u8>, ShotScaleError>;
    fn put(&self, key: &str, content: &[u8]) -> Result<(), ShotScaleError>;
    fn list_groups(&self) -> Result<Vec<String>, ShotScaleError>;
}

impl<S: AssetStore + ?Sized> AssetStore for &S {
    fn exists(&self, key: &str) -> Result<bool, ShotScaleError> {
        (**self).exists(key)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ShotScaleError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, content: &[u8]) -> Result<(), ShotScaleError> {
        (**self).put(key, content)
    }

    fn list_groups(&self) -> Result<Vec<String>, ShotScaleError> {
        (**self).list_groups()
    }
}

impl<S: AssetStore + ?Sized> AssetStore for Box<S> {
    fn exists(&self, key: &str) -> Result<bool, ShotScaleError> {
        (**self).exists(key)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ShotScaleError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, content: &[u8]) -> Result<(), ShotScaleError> {
        (**self).put(key, content)
    }

    fn list_groups(&self) -> Result<Vec<String>, ShotScaleError> {
        (**self).list_groups()
    }
}

#[derive(Clone)]
pub struct HttpAssetStore {
    client: Client,
    base_url: Url,
    upload_url: Option<Url>,
}

impl HttpAssetStore {
    pub fn new(
        base_url: &str,
        upload_url: Option<&str>,
        settings: &FetchSettings,
    ) -> Result<Self, ShotScaleError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("shotscale/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| ShotScaleError::StoreHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|err| ShotScaleError::StoreHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: parse_url(base_url)?,
            upload_url: upload_url.map(parse_url).transpose()?,
        })
    }

    pub fn object_url(base: &Url, key: &str) -> Result<Url, ShotScaleError> {
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| ShotScaleError::InvalidConfig(format!("{base} cannot be a base URL")))?
            .pop_if_empty()
            .extend(key.split('/'));
        Ok(url)
    }

    fn handle_status(
        key: &str,
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ShotScaleError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        if status == 404 {
            return Err(ShotScaleError::AssetNotFound(key.to_string()));
        }
        let message = response
            .text()
            .unwrap_or_else(|_| "asset store request failed".to_string());
        Err(ShotScaleError::StoreStatus { status, message })
    }
}

impl AssetStore for HttpAssetStore {
    fn exists(&self, key: &str) -> Result<bool, ShotScaleError> {
        let url = Self::object_url(&self.base_url, key)?;
        let response = self
            .client
            .head(url)
            .send()
            .map_err(|err| ShotScaleError::StoreHttp(err.to_string()))?;
        match Self::handle_status(key, response) {
            Ok(_) => Ok(true),
            Err(ShotScaleError::AssetNotFound(_)) => Ok(false),
            // Buckets without list permission answer 403 for missing objects.
            Err(ShotScaleError::StoreStatus { status: 403, .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ShotScaleError> {
        let url = Self::object_url(&self.base_url, key)?;
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| ShotScaleError::StoreHttp(err.to_string()))?;
        let response = Self::handle_status(key, response)?;
        let bytes = response
            .bytes()
            .map_err(|err| ShotScaleError::StoreHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }

    fn put(&self, key: &str, content: &[u8]) -> Result<(), ShotScaleError> {
        let base = self.upload_url.as_ref().ok_or_else(|| {
            ShotScaleError::InvalidConfig("store.upload_url is required for remote save".to_string())
        })?;
        let url = Self::object_url(base, key)?;
        let response = self
            .client
            .put(url)
            .body(content.to_vec())
            .send()
            .map_err(|err| ShotScaleError::StoreHttp(err.to_string()))?;
        Self::handle_status(key, response)?;
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<String>, ShotScaleError> {
        Err(ShotScaleError::GroupEnumeration(format!(
            "{} does not expose a listing",
            self.base_url
        )))
    }
}

#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: Utf8PathBuf,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<Utf8PathBuf, ShotScaleError> {
        if key.split('/').any(|part| part.is_empty() || part == "..") {
            return Err(ShotScaleError::AssetNotFound(key.to_string()));
        }
        Ok(self.root.join(key))
    }
}

impl AssetStore for LocalAssetStore {
    fn exists(&self, key: &str) -> Result<bool, ShotScaleError> {
        Ok(self.object_path(key)?.as_std_path().is_file())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ShotScaleError> {
        let path = self.object_path(key)?;
        fs::read(path.as_std_path()).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => ShotScaleError::AssetNotFound(key.to_string()),
            _ => ShotScaleError::FetchFailure {
                key: key.to_string(),
                attempts: 1,
                reason: format!("read {path}: {err}"),
            },
        })
    }

    fn put(&self, key: &str, content: &[u8]) -> Result<(), ShotScaleError> {
        let path = self.object_path(key)?;
        write_bytes_atomic(&path, content)
    }

    fn list_groups(&self) -> Result<Vec<String>, ShotScaleError> {
        let entries = fs::read_dir(self.root.as_std_path())
            .map_err(|err| ShotScaleError::Filesystem(format!("list {}: {err}", self.root)))?;
        let mut groups = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                groups.push(name.to_string());
            }
        }
        // read_dir order is filesystem dependent
        groups.sort();
        Ok(groups)
    }
}

pub fn open_store(
    location: &StoreLocation,
    settings: &FetchSettings,
) -> Result<Box<dyn AssetStore>, ShotScaleError> {
    match location {
        StoreLocation::Http {
            base_url,
            upload_url,
        } => Ok(Box::new(HttpAssetStore::new(
            base_url,
            upload_url.as_deref(),
            settings,
        )?)),
        StoreLocation::Local { root } => Ok(Box::new(LocalAssetStore::new(root.clone()))),
    }
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), ShotScaleError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(tmp_path.as_std_path(), content)
        .map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
    fs::rename(tmp_path.as_std_path(), path.as_std_path())
        .map_err(|err| ShotScaleError::Filesystem(err.to_string()))?;
    Ok(())
}

fn parse_url(value: &str) -> Result<Url, ShotScaleError> {
    Url::parse(value).map_err(|err| ShotScaleError::InvalidConfig(format!("{value}: {err}")))
}
