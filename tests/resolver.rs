use std::collections::HashMap;
use std::sync::Mutex;

use assert_matches::assert_matches;

use shotscale_dataset::config::FetchSettings;
use shotscale_dataset::domain::{CatalogRecord, ClassLabel};
use shotscale_dataset::error::ShotScaleError;
use shotscale_dataset::resolver::AssetResolver;
use shotscale_dataset::store::AssetStore;

/// Serves scripted responses per key and counts `get` calls.
#[derive(Default)]
struct ScriptedStore {
    responses: Mutex<HashMap<String, Vec<Result<Vec<u8>, ShotScaleError>>>>,
    calls: Mutex<usize>,
}

impl ScriptedStore {
    fn script(self, key: &str, responses: Vec<Result<Vec<u8>, ShotScaleError>>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(key.to_string(), responses.into_iter().rev().collect());
        self
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl AssetStore for ScriptedStore {
    fn exists(&self, key: &str) -> Result<bool, ShotScaleError> {
        Ok(self.responses.lock().unwrap().contains_key(key))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, ShotScaleError> {
        *self.calls.lock().unwrap() += 1;
        self.responses
            .lock()
            .unwrap()
            .get_mut(key)
            .and_then(Vec::pop)
            .unwrap_or_else(|| Err(ShotScaleError::AssetNotFound(key.to_string())))
    }

    fn put(&self, _key: &str, _content: &[u8]) -> Result<(), ShotScaleError> {
        Ok(())
    }

    fn list_groups(&self) -> Result<Vec<String>, ShotScaleError> {
        Ok(Vec::new())
    }
}

const KEY: &str = "2001_Jane_Doe_-_My_Film/00002.jpg";

fn settings() -> FetchSettings {
    FetchSettings {
        attempts: 2,
        retry_delay_ms: 0,
        timeout_secs: 1,
    }
}

fn record() -> CatalogRecord {
    CatalogRecord {
        sequence_id: 2,
        year: Some(2001),
        director: Some("Jane Doe".to_string()),
        title: Some("My Film".to_string()),
        timestamp_seconds: 60,
        class_label: ClassLabel::new(1).unwrap(),
    }
}

fn busy() -> ShotScaleError {
    ShotScaleError::StoreStatus {
        status: 503,
        message: "slow down".to_string(),
    }
}

#[test]
fn missing_director_fails_without_network() {
    let store = ScriptedStore::default().script(KEY, vec![Ok(b"jpeg".to_vec())]);
    let resolver = AssetResolver::new(&store, &settings());
    let mut incomplete = record();
    incomplete.director = None;

    let err = resolver.fetch(&incomplete).unwrap_err();
    assert_matches!(err, ShotScaleError::IncompleteRecord { sequence_id: 2, ref missing } if missing.contains("director"));
    assert_eq!(store.calls(), 0);
}

#[test]
fn fetch_writes_bytes_to_scoped_temp_file() {
    let store = ScriptedStore::default().script(KEY, vec![Ok(b"jpeg".to_vec())]);
    let resolver = AssetResolver::new(&store, &settings());

    let handle = resolver.fetch(&record()).unwrap();
    assert_eq!(handle.key(), KEY);
    let path = handle.path().to_path_buf();
    assert_eq!(std::fs::read(&path).unwrap(), b"jpeg");

    handle.release().unwrap();
    assert!(!path.exists());
    assert_eq!(store.calls(), 1);
}

#[test]
fn transient_failure_is_retried() {
    let store = ScriptedStore::default().script(KEY, vec![Err(busy()), Ok(b"jpeg".to_vec())]);
    let resolver = AssetResolver::new(&store, &settings());

    let handle = resolver.fetch(&record()).unwrap();
    assert_eq!(std::fs::read(handle.path()).unwrap(), b"jpeg");
    assert_eq!(store.calls(), 2);
}

#[test]
fn retries_are_bounded() {
    let store = ScriptedStore::default().script(KEY, vec![Err(busy()), Err(busy()), Ok(Vec::new())]);
    let resolver = AssetResolver::new(&store, &settings());

    let err = resolver.fetch(&record()).unwrap_err();
    assert_matches!(err, ShotScaleError::FetchFailure { attempts: 2, ref key, .. } if key == KEY);
    assert!(err.is_record_level());
    assert_eq!(store.calls(), 2);
}

#[test]
fn missing_object_is_not_retried() {
    let store = ScriptedStore::default();
    let resolver = AssetResolver::new(&store, &settings());

    let err = resolver.fetch(&record()).unwrap_err();
    assert_matches!(err, ShotScaleError::AssetNotFound(ref key) if key == KEY);
    assert_eq!(store.calls(), 1);
}

#[test]
fn temp_files_live_in_the_configured_directory() {
    let temp = tempfile::tempdir().unwrap();
    let dir = camino::Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = ScriptedStore::default().script(KEY, vec![Ok(b"jpeg".to_vec())]);
    let resolver = AssetResolver::new(&store, &settings()).with_temp_dir(dir);

    let handle = resolver.fetch(&record()).unwrap();
    assert!(handle.path().starts_with(temp.path()));
    drop(handle);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}
