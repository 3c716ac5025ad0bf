use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A restaurant with the photo URLs scraped for it.
///
/// This is the record `harvest` writes and `mark` reads back, one JSON
/// array of these per source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub restaurant_name: String,
    pub place_id: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub vicinity: Option<String>,
    #[serde(default)]
    pub photo_urls: Vec<String>,
    #[serde(default)]
    pub photo_count: usize,
}

impl Restaurant {
    pub fn from_place(place: &Place, photo_urls: Vec<String>) -> Self {
        Self {
            restaurant_name: place.name.clone(),
            place_id: place.place_id.clone(),
            rating: place.rating,
            vicinity: Some(place.vicinity.clone()),
            photo_count: photo_urls.len(),
            photo_urls,
        }
    }
}

/// A place returned by a nearby search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub place_id: String,
    pub rating: Option<f64>,
    /// Formatted address.
    pub vicinity: String,
    pub types: Vec<String>,
}

/// Circle to search for restaurants in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters.
    pub radius: f64,
    pub max_results: u32,
}

/// What the classifier decided about one analyzer response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Match { label: String, detail: String },
    NonMatch { reason: String },
    /// Response lacked the fields the classifier needs. Counted as a non-match.
    Malformed { reason: String },
}

/// Final outcome for one child reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Match { label: String, detail: String },
    NonMatch { reason: String },
    Malformed { reason: String },
    /// The analyzer call itself failed.
    Failed { error: String },
}

impl From<Verdict> for Outcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Match { label, detail } => Outcome::Match { label, detail },
            Verdict::NonMatch { reason } => Outcome::NonMatch { reason },
            Verdict::Malformed { reason } => Outcome::Malformed { reason },
        }
    }
}

impl Outcome {
    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Match { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

/// One analyzed child, kept for the detailed results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub parent_key: String,
    pub parent_label: String,
    pub reference: String,
    /// Raw analyzer response, absent when the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<serde_json::Value>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// A knowledge-base entry: one photo identified as a dish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishEntry {
    pub restaurant_name: String,
    pub place_id: String,
    pub photo_url: String,
    pub dish_name: String,
    pub description: String,
}

impl DishEntry {
    /// Build an entry from a record, if the record is a match.
    pub fn from_record(record: &AnalysisRecord) -> Option<Self> {
        match &record.outcome {
            Outcome::Match { label, detail } => Some(Self {
                restaurant_name: record.parent_label.clone(),
                place_id: record.parent_key.clone(),
                photo_url: record.reference.clone(),
                dish_name: label.clone(),
                description: detail.clone(),
            }),
            _ => None,
        }
    }
}

/// Per-parent line of the run summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentBreakdown {
    pub key: String,
    pub label: String,
    pub successes: usize,
    /// References whose analyzer call failed. These are not retried once the
    /// parent is checkpointed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_references: Vec<String>,
}

/// Parent-level counters tracked while the run progresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentCounts {
    pub seen: usize,
    pub skipped: usize,
    pub processed: usize,
    /// Processed but left out of the checkpoint because a child failed.
    pub deferred: usize,
}

/// Aggregate outcome of one `mark` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<String>,
    pub parents_seen: usize,
    pub parents_skipped: usize,
    pub parents_processed: usize,
    pub parents_deferred: usize,
    pub children_analyzed: usize,
    pub successes: usize,
    /// Includes malformed responses.
    pub non_matches: usize,
    pub malformed: usize,
    pub failures: usize,
    pub batches_written: usize,
    pub knowledge_base_entries: usize,
    pub per_parent: Vec<ParentBreakdown>,
}

impl RunSummary {
    /// Compute the summary from the full record set of a run.
    pub fn from_records(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        sources: Vec<String>,
        parents: ParentCounts,
        batches_written: usize,
        records: &[AnalysisRecord],
    ) -> Self {
        let mut successes = 0;
        let mut non_matches = 0;
        let mut malformed = 0;
        let mut failures = 0;
        let mut per_parent: Vec<ParentBreakdown> = Vec::new();

        for record in records {
            let idx = match per_parent.iter().position(|p| p.key == record.parent_key) {
                Some(idx) => idx,
                None => {
                    per_parent.push(ParentBreakdown {
                        key: record.parent_key.clone(),
                        label: record.parent_label.clone(),
                        successes: 0,
                        failed_references: Vec::new(),
                    });
                    per_parent.len() - 1
                }
            };
            let entry = &mut per_parent[idx];

            match &record.outcome {
                Outcome::Match { .. } => {
                    successes += 1;
                    entry.successes += 1;
                }
                Outcome::NonMatch { .. } => non_matches += 1,
                Outcome::Malformed { .. } => {
                    non_matches += 1;
                    malformed += 1;
                }
                Outcome::Failed { .. } => {
                    failures += 1;
                    entry.failed_references.push(record.reference.clone());
                }
            }
        }

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            sources,
            parents_seen: parents.seen,
            parents_skipped: parents.skipped,
            parents_processed: parents.processed,
            parents_deferred: parents.deferred,
            children_analyzed: records.len(),
            successes,
            non_matches,
            malformed,
            failures,
            batches_written,
            knowledge_base_entries: successes,
            per_parent,
        }
    }

    /// List every processed parent in `parents` order, adding a zero line
    /// for those that produced no records.
    pub fn with_processed_parents(mut self, parents: &[(String, String)]) -> Self {
        let mut ordered: Vec<ParentBreakdown> = Vec::with_capacity(parents.len());
        for (key, label) in parents {
            if ordered.iter().any(|p| &p.key == key) {
                continue;
            }
            match self.per_parent.iter().position(|p| &p.key == key) {
                Some(idx) => ordered.push(self.per_parent.remove(idx)),
                None => ordered.push(ParentBreakdown {
                    key: key.clone(),
                    label: label.clone(),
                    successes: 0,
                    failed_references: Vec::new(),
                }),
            }
        }
        ordered.append(&mut self.per_parent);
        self.per_parent = ordered;
        self
    }

    /// Entries actually handed to the batch writer. Lower than `successes`
    /// when parents were deferred.
    pub fn with_knowledge_base_entries(mut self, entries: usize) -> Self {
        self.knowledge_base_entries = entries;
        self
    }

    /// Share of analyzed children identified as a match, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.children_analyzed == 0 {
            0.0
        } else {
            self.successes as f64 * 100.0 / self.children_analyzed as f64
        }
    }
}

/// Outcome of one `harvest` run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarvestSummary {
    /// Listing file, `None` when the search returned nothing.
    pub output_file: Option<std::path::PathBuf>,
    pub summary_file: Option<std::path::PathBuf>,
    pub newly_processed: usize,
    pub skipped: usize,
    pub total_restaurants: usize,
    pub total_photos: usize,
}
