use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{ColumnNames, ResolvedConfig};
use crate::domain::{CatalogRecord, ClassLabel, MovieKey, ShotClass, parse_timestamp};
use crate::error::ShotScaleError;

static GROUP_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})_(.+)$").expect("valid group name regex"));

const PROGRESS_EVERY: usize = 100_000;

#[derive(Debug, Default)]
pub struct CatalogIndex {
    groups: Vec<MovieGroup>,
    by_key: HashMap<MovieKey, usize>,
    record_count: usize,
}

#[derive(Debug)]
struct MovieGroup {
    key: MovieKey,
    director: String,
    title: String,
    ids: HashSet<u32>,
    records: Vec<CatalogRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct LinkedCatalog {
    pub records: Vec<CatalogRecord>,
    pub movies_linked: usize,
    pub directories_seen: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub records: usize,
    pub movies: usize,
    pub classes: Vec<(ShotClass, usize)>,
}

impl CatalogIndex {
    pub fn open(config: &ResolvedConfig) -> Result<Self, ShotScaleError> {
        let file = File::open(config.catalog_path.as_std_path())
            .map_err(|_| ShotScaleError::CatalogRead(config.catalog_path.clone().into()))?;
        Self::from_reader(file, config.delimiter, &config.columns)
    }

    pub fn load<R: Read>(
        source: R,
        delimiter: u8,
        columns: &ColumnNames,
        directories: &[String],
    ) -> Result<LinkedCatalog, ShotScaleError> {
        Ok(Self::from_reader(source, delimiter, columns)?.link(directories))
    }

    pub fn from_reader<R: Read>(
        source: R,
        delimiter: u8,
        columns: &ColumnNames,
    ) -> Result<Self, ShotScaleError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(source);
        let headers = reader
            .headers()
            .map_err(|err| ShotScaleError::CatalogRow {
                row: 1,
                message: err.to_string(),
            })?
            .clone();
        let positions = ColumnPositions::locate(&headers, columns)?;

        let mut index = CatalogIndex::default();
        for (offset, row) in reader.records().enumerate() {
            let line = offset + 2;
            let row = row.map_err(|err| ShotScaleError::CatalogRow {
                row: line,
                message: err.to_string(),
            })?;
            let record = positions.parse(&row, line)?;
            index.insert(record, line)?;
            if offset % PROGRESS_EVERY == 0 {
                info!(loaded = offset, "catalog rows loaded");
            }
        }

        info!(
            records = index.record_count,
            movies = index.groups.len(),
            "catalog loaded"
        );
        Ok(index)
    }

    fn insert(&mut self, record: CatalogRecord, line: usize) -> Result<(), ShotScaleError> {
        let key = record.movie_key();
        let director = record.director.clone().unwrap_or_default();
        let title = record.title.clone().unwrap_or_default();
        match self.by_key.get(&key) {
            Some(&position) => {
                let group = &mut self.groups[position];
                if group.director != director || group.title != title {
                    debug!(line, "movie key collision");
                    return Err(ShotScaleError::MovieKeyCollision {
                        key: key.to_string(),
                        first: format!("{} / {}", group.director, group.title),
                        second: format!("{director} / {title}"),
                    });
                }
                if !group.ids.insert(record.sequence_id) {
                    return Err(ShotScaleError::CatalogRow {
                        row: line,
                        message: format!(
                            "duplicate id {} for movie {key}",
                            record.sequence_id - 1
                        ),
                    });
                }
                group.records.push(record);
            }
            None => {
                self.by_key.insert(key.clone(), self.groups.len());
                self.groups.push(MovieGroup {
                    key,
                    director,
                    title,
                    ids: HashSet::from([record.sequence_id]),
                    records: vec![record],
                });
            }
        }
        self.record_count += 1;
        Ok(())
    }

    pub fn link(&self, directories: &[String]) -> LinkedCatalog {
        let mut linked = LinkedCatalog {
            directories_seen: directories.len(),
            ..LinkedCatalog::default()
        };
        let mut already_linked = vec![false; self.groups.len()];

        for directory in directories {
            let Some(captures) = GROUP_NAME.captures(directory) else {
                warn!(directory = %directory, "skipping malformed asset group name");
                continue;
            };
            let Ok(year) = captures[1].parse::<u16>() else {
                continue;
            };
            let key = MovieKey::from_normalized(&captures[2]);
            let Some(&position) = self.by_key.get(&key) else {
                continue;
            };
            if already_linked[position] {
                warn!(directory = %directory, "movie already linked to another asset group");
                continue;
            }
            already_linked[position] = true;
            linked.movies_linked += 1;
            linked
                .records
                .extend(self.groups[position].records.iter().cloned().map(|mut record| {
                    record.year = Some(year);
                    record
                }));
        }

        info!(
            movies_linked = linked.movies_linked,
            directories = linked.directories_seen,
            datapoints = linked.records.len(),
            "catalog linked to asset groups"
        );
        linked
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn movie_count(&self) -> usize {
        self.groups.len()
    }

    pub fn movie_keys(&self) -> impl Iterator<Item = &MovieKey> {
        self.groups.iter().map(|group| &group.key)
    }

    pub fn stats(&self) -> CatalogStats {
        let classes = ShotClass::ALL
            .iter()
            .map(|class| {
                let count = self
                    .groups
                    .iter()
                    .flat_map(|group| group.records.iter())
                    .filter(|record| record.shot_class() == *class)
                    .count();
                (*class, count)
            })
            .collect();
        CatalogStats {
            records: self.record_count,
            movies: self.groups.len(),
            classes,
        }
    }
}

struct ColumnPositions {
    id: usize,
    director: usize,
    title: usize,
    class: usize,
    timestamp: usize,
}

impl ColumnPositions {
    fn locate(headers: &csv::StringRecord, columns: &ColumnNames) -> Result<Self, ShotScaleError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| ShotScaleError::MissingColumn(name.to_string()))
        };
        Ok(Self {
            id: find(columns.id.as_str())?,
            director: find(columns.director.as_str())?,
            title: find(columns.title.as_str())?,
            class: find(columns.class.as_str())?,
            timestamp: find(columns.timestamp.as_str())?,
        })
    }

    fn parse(&self, row: &csv::StringRecord, line: usize) -> Result<CatalogRecord, ShotScaleError> {
        let field = |position: usize| row.get(position).unwrap_or_default();
        let text = |position: usize| Some(field(position).to_string()).filter(|v| !v.is_empty());

        let raw_id = field(self.id);
        let id: u32 = raw_id.parse().map_err(|_| ShotScaleError::CatalogRow {
            row: line,
            message: format!("invalid id {raw_id:?}"),
        })?;
        let raw_timestamp = field(self.timestamp);
        let timestamp_seconds =
            parse_timestamp(raw_timestamp).ok_or_else(|| ShotScaleError::CatalogRow {
                row: line,
                message: format!("invalid timestamp {raw_timestamp:?}"),
            })?;
        let raw_class = field(self.class);
        let class_label: ClassLabel =
            raw_class
                .parse()
                .map_err(|_| ShotScaleError::UnmappedClass {
                    row: line,
                    value: raw_class.to_string(),
                })?;

        let sequence_id = id.checked_add(1).ok_or_else(|| ShotScaleError::CatalogRow {
            row: line,
            message: format!("id {raw_id:?} out of range"),
        })?;

        Ok(CatalogRecord {
            sequence_id,
            year: None,
            director: text(self.director),
            title: text(self.title),
            timestamp_seconds,
            class_label,
        })
    }
}
