use std::cmp::Reverse;
use std::collections::HashMap;
use std::hash::Hash;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::SplitRatios;
use crate::domain::{CatalogRecord, SplitStrategy, SubsetKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subset {
    pub kind: SubsetKind,
    pub records: Vec<CatalogRecord>,
}

impl Subset {
    fn new(kind: SubsetKind) -> Self {
        Self {
            kind,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub training: Subset,
    pub validation: Subset,
    pub testing: Subset,
}

impl Partition {
    pub fn subsets(&self) -> [&Subset; 3] {
        [&self.training, &self.validation, &self.testing]
    }

    pub fn total(&self) -> usize {
        self.training.len() + self.validation.len() + self.testing.len()
    }
}

#[derive(Debug, Clone)]
pub struct Partitioner {
    strategy: SplitStrategy,
    ratios: SplitRatios,
    baseline: Option<usize>,
    seed: Option<u64>,
}

impl Partitioner {
    pub fn new(strategy: SplitStrategy, ratios: SplitRatios) -> Self {
        Self {
            strategy,
            ratios,
            baseline: None,
            seed: None,
        }
    }

    /// Computes target sizes from a fixed record count instead of the input length.
    pub fn with_baseline(mut self, baseline: Option<usize>) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn strategy(&self) -> SplitStrategy {
        self.strategy
    }

    pub fn targets(&self, count: usize) -> (usize, usize) {
        let baseline = self.baseline.unwrap_or(count) as f64;
        let training = (baseline * self.ratios.training).round() as usize;
        let validation = (baseline * self.ratios.validation).round() as usize;
        (training, validation)
    }

    pub fn partition(&self, records: Vec<CatalogRecord>) -> Partition {
        let mut partition = Partition {
            training: Subset::new(SubsetKind::Training),
            validation: Subset::new(SubsetKind::Validation),
            testing: Subset::new(SubsetKind::Testing),
        };

        match self.strategy {
            SplitStrategy::None => partition.training.records = records,
            SplitStrategy::Random => self.split_random(records, &mut partition),
            SplitStrategy::Director => {
                let groups = group_by(records, |record| record.director.clone());
                self.place_groups(groups, &mut partition);
            }
            SplitStrategy::Movie => {
                let groups = group_by(records, |record| record.movie_key());
                self.place_groups(groups, &mut partition);
            }
        }

        info!(
            strategy = %self.strategy,
            training = partition.training.len(),
            validation = partition.validation.len(),
            testing = partition.testing.len(),
            "dataset partitioned"
        );
        partition
    }

    fn split_random(&self, mut records: Vec<CatalogRecord>, partition: &mut Partition) {
        let seed = self.seed.unwrap_or_else(|| rand::thread_rng().r#gen());
        info!(seed, "shuffling records");
        let mut rng = StdRng::seed_from_u64(seed);
        records.shuffle(&mut rng);

        let (training, validation) = self.targets(records.len());
        let training_end = training.min(records.len());
        let validation_end = (training + validation).min(records.len());

        partition.testing.records = records.split_off(validation_end);
        partition.validation.records = records.split_off(training_end);
        partition.training.records = records;
    }

    // Largest groups go first so the indivisible ones land before the targets fill up.
    fn place_groups(&self, mut groups: Vec<Vec<CatalogRecord>>, partition: &mut Partition) {
        let total = groups.iter().map(Vec::len).sum();
        let (training, validation) = self.targets(total);
        groups.sort_by_key(|group| Reverse(group.len()));

        for group in groups {
            let subset = if partition.training.len() < training {
                &mut partition.training
            } else if partition.validation.len() < validation {
                &mut partition.validation
            } else {
                &mut partition.testing
            };
            subset.records.extend(group);
        }
    }
}

fn group_by<K, F>(records: Vec<CatalogRecord>, key: F) -> Vec<Vec<CatalogRecord>>
where
    K: Eq + Hash,
    F: Fn(&CatalogRecord) -> K,
{
    let mut positions = HashMap::new();
    let mut groups: Vec<Vec<CatalogRecord>> = Vec::new();
    for record in records {
        let position = *positions.entry(key(&record)).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[position].push(record);
    }
    groups
}
