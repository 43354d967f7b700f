use assert_matches::assert_matches;

use shotscale_dataset::config::{Config, ConfigLoader, SplitRatios, StoreLocation};
use shotscale_dataset::error::ShotScaleError;

fn parse(json: &str) -> Result<shotscale_dataset::config::ResolvedConfig, ShotScaleError> {
    let config: Config = serde_json::from_str(json).unwrap();
    ConfigLoader::resolve_config(config)
}

#[test]
fn resolve_from_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("shotscale.json");
    std::fs::write(
        &path,
        r#"{
            "schema_version": 1,
            "catalog": {
                "path": "data/classes.csv",
                "delimiter": ";",
                "columns": { "id": "frame", "class": "shot" }
            },
            "store": {
                "kind": "http",
                "base_url": "https://frames.example.com/bucket/",
                "upload_url": "https://exports.example.com/bucket"
            },
            "directories": ["2001_Jane_Doe_-_My_Film"],
            "output": { "image_size": 299, "name": "shots" },
            "split": { "ratios": [0.7, 0.2, 0.1], "seed": 42, "baseline": 238024 },
            "fetch": { "attempts": 3, "retry_delay_ms": 50, "timeout_secs": 10 }
        }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(resolved.catalog_path.as_str(), "data/classes.csv");
    assert_eq!(resolved.delimiter, b';');
    assert_eq!(resolved.columns.id, "frame");
    assert_eq!(resolved.columns.class, "shot");
    assert_eq!(resolved.columns.director, "director");
    assert_eq!(
        resolved.store,
        StoreLocation::Http {
            base_url: "https://frames.example.com/bucket".to_string(),
            upload_url: Some("https://exports.example.com/bucket".to_string()),
        }
    );
    assert_eq!(resolved.directories.as_deref().map(<[String]>::len), Some(1));
    assert_eq!(resolved.image_size, 299);
    assert_eq!(resolved.run_name, "shots");
    assert_eq!(resolved.ratios, SplitRatios::new(0.7, 0.2, 0.1).unwrap());
    assert_eq!(resolved.seed, Some(42));
    assert_eq!(resolved.baseline, Some(238024));
    assert_eq!(resolved.fetch.attempts, 3);
}

#[test]
fn missing_explicit_file_is_a_read_error() {
    let err = ConfigLoader::resolve(Some("/definitely/not/here.json")).unwrap_err();
    assert_matches!(err, ShotScaleError::ConfigRead(_));
}

#[test]
fn ratios_must_not_exceed_one() {
    let err = parse(
        r#"{"catalog": {"path": "c.csv"}, "store": {"kind": "local", "root": "f"},
            "split": {"ratios": [0.8, 0.2, 0.1]}}"#,
    )
    .unwrap_err();
    assert_matches!(err, ShotScaleError::InvalidConfig(_));

    assert!(SplitRatios::new(-0.1, 0.5, 0.5).is_err());
}

#[test]
fn http_store_requires_url() {
    let err = parse(
        r#"{"catalog": {"path": "c.csv"}, "store": {"kind": "http", "base_url": "frames/bucket"}}"#,
    )
    .unwrap_err();
    assert_matches!(err, ShotScaleError::InvalidConfig(_));
}

#[test]
fn zero_sizes_are_rejected() {
    let image = parse(
        r#"{"catalog": {"path": "c.csv"}, "store": {"kind": "local", "root": "f"},
            "output": {"image_size": 0}}"#,
    )
    .unwrap_err();
    assert_matches!(image, ShotScaleError::InvalidConfig(_));

    let oversized = parse(
        r#"{"catalog": {"path": "c.csv"}, "store": {"kind": "local", "root": "f"},
            "output": {"image_size": 100000}}"#,
    )
    .unwrap_err();
    assert_matches!(oversized, ShotScaleError::InvalidConfig(_));

    let attempts = parse(
        r#"{"catalog": {"path": "c.csv"}, "store": {"kind": "local", "root": "f"},
            "fetch": {"attempts": 0}}"#,
    )
    .unwrap_err();
    assert_matches!(attempts, ShotScaleError::InvalidConfig(_));
}

#[test]
fn unknown_store_kind_is_a_parse_error() {
    let result: Result<Config, _> = serde_json::from_str(
        r#"{"catalog": {"path": "c.csv"}, "store": {"kind": "ftp", "root": "f"}}"#,
    );
    assert!(result.is_err());
}
