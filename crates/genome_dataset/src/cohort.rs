//! Partitioning joined samples into training and evaluation cohorts by study label.

use crate::types::{JoinedTable, SampleRecord};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Study label of the held-out cohort in the reference data set.
pub const DEFAULT_EVALUATION_STUDY: &str = "PCAWG";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CohortKind {
    Training,
    Evaluation,
}

impl CohortKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CohortKind::Training => "training",
            CohortKind::Evaluation => "evaluation",
        }
    }
}

/// A named partition of the joined table, in input order.
#[derive(Debug, Clone)]
pub struct Cohort {
    kind: CohortKind,
    records: Vec<SampleRecord>,
}

impl Cohort {
    pub fn new(kind: CohortKind, records: Vec<SampleRecord>) -> Self {
        Self { kind, records }
    }

    pub fn kind(&self) -> CohortKind {
        self.kind
    }

    pub fn records(&self) -> &[SampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn sample_ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.sample.clone()).collect()
    }

    pub fn populations(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.population.as_str())
    }

    pub fn population_counts(&self) -> BTreeMap<String, usize> {
        population_counts(self.populations())
    }
}

/// Per-population frequencies, ordered by population name.
pub fn population_counts<'a>(populations: impl Iterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for population in populations {
        *counts.entry(population.to_string()).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone)]
pub struct CohortSplitter {
    evaluation_study: String,
}

impl Default for CohortSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_EVALUATION_STUDY)
    }
}

impl CohortSplitter {
    pub fn new(evaluation_study: impl Into<String>) -> Self {
        Self {
            evaluation_study: evaluation_study.into(),
        }
    }

    pub fn evaluation_study(&self) -> &str {
        &self.evaluation_study
    }

    pub fn classify(&self, record: &SampleRecord) -> CohortKind {
        if record.study == self.evaluation_study {
            CohortKind::Evaluation
        } else {
            CohortKind::Training
        }
    }

    /// Split into `(training, evaluation)`. Every row lands in exactly one cohort.
    ///
    /// Empty cohorts are allowed here; they surface as training or evaluation failures later.
    pub fn split(&self, table: JoinedTable) -> (Cohort, Cohort) {
        let (evaluation, training): (Vec<_>, Vec<_>) = table
            .into_records()
            .into_iter()
            .partition(|r| self.classify(r) == CohortKind::Evaluation);
        let training = Cohort::new(CohortKind::Training, training);
        let evaluation = Cohort::new(CohortKind::Evaluation, evaluation);
        for cohort in [&training, &evaluation] {
            if cohort.is_empty() {
                warn!(cohort = cohort.kind().as_str(), "cohort is empty after split");
            }
            info!(
                cohort = cohort.kind().as_str(),
                samples = cohort.len(),
                distribution = ?cohort.population_counts(),
                "population distribution"
            );
        }
        (training, evaluation)
    }
}
