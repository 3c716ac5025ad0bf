//! End-of-run artifacts: JSON + text summaries, the detailed per-photo
//! results, and a MongoDB insert script for the identified dishes.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::AppError;
use crate::models::{AnalysisRecord, DishEntry, Restaurant, RunSummary};
use crate::persist;

pub const SUMMARY_JSON: &str = "run_summary.json";
pub const SUMMARY_TEXT: &str = "analysis_summary.txt";
pub const ANALYSIS_RESULTS: &str = "photo_analysis_results.json";
pub const MONGO_SCRIPT: &str = "mongodb_insert_commands.js";

const RULE: &str = "==================================================";

/// Paths of the files written by [`write_reports`].
#[derive(Debug, Clone)]
pub struct ReportPaths {
    pub summary_json: PathBuf,
    pub summary_text: PathBuf,
    pub analysis_results: PathBuf,
    pub mongo_script: PathBuf,
}

/// Write every end-of-run report into `dir`.
pub fn write_reports(
    dir: &Path,
    summary: &RunSummary,
    records: &[AnalysisRecord],
) -> Result<ReportPaths, AppError> {
    let paths = ReportPaths {
        summary_json: dir.join(SUMMARY_JSON),
        summary_text: dir.join(SUMMARY_TEXT),
        analysis_results: dir.join(ANALYSIS_RESULTS),
        mongo_script: dir.join(MONGO_SCRIPT),
    };

    let dishes: Vec<DishEntry> = records.iter().filter_map(DishEntry::from_record).collect();

    persist::write_json_atomic(&paths.summary_json, summary)?;
    persist::write_atomic(&paths.summary_text, render_run_summary(summary).as_bytes())?;
    persist::write_json_atomic(&paths.analysis_results, records)?;
    persist::write_atomic(&paths.mongo_script, render_mongo_inserts(&dishes).as_bytes())?;

    Ok(paths)
}

/// Human-readable run summary.
pub fn render_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Photo Analysis Summary");
    let _ = writeln!(out, "{RULE}\n");
    let _ = writeln!(out, "Run: {}", summary.run_id);
    let _ = writeln!(
        out,
        "Started: {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Finished: {}\n",
        summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let _ = writeln!(out, "Input files processed: {}", summary.sources.len());
    for source in &summary.sources {
        let name = Path::new(source)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(source);
        let _ = writeln!(out, "  - {name}");
    }

    let _ = writeln!(out, "\nRestaurants found: {}", summary.parents_seen);
    let _ = writeln!(
        out,
        "Restaurants skipped (already processed): {}",
        summary.parents_skipped
    );
    let _ = writeln!(out, "Restaurants processed: {}", summary.parents_processed);
    if summary.parents_deferred > 0 {
        let _ = writeln!(
            out,
            "Restaurants left for retry (failed photos): {}",
            summary.parents_deferred
        );
    }
    let _ = writeln!(out, "Photos analyzed: {}", summary.children_analyzed);
    let _ = writeln!(out, "Dishes identified: {}", summary.successes);
    let _ = writeln!(
        out,
        "Non-dishes: {} ({} malformed)",
        summary.non_matches, summary.malformed
    );
    let _ = writeln!(out, "Failed analyses: {}", summary.failures);
    let _ = writeln!(
        out,
        "Dish identification rate: {:.1}%",
        summary.success_rate()
    );
    let _ = writeln!(out, "Knowledge base batches created: {}", summary.batches_written);
    let _ = writeln!(
        out,
        "Knowledge base entries: {}\n",
        summary.knowledge_base_entries
    );

    let _ = writeln!(out, "Dishes by restaurant:");
    let _ = writeln!(out, "{}", &RULE[..30]);
    for parent in &summary.per_parent {
        let _ = writeln!(out, "{}: {} dishes", parent.label, parent.successes);
        if !parent.failed_references.is_empty() {
            let _ = writeln!(
                out,
                "  {} photo(s) failed to analyze:",
                parent.failed_references.len()
            );
            for reference in &parent.failed_references {
                let _ = writeln!(out, "    {reference}");
            }
        }
    }
    out
}

/// One `insertOne` per dish. Strings go through JSON escaping.
pub fn render_mongo_inserts(dishes: &[DishEntry]) -> String {
    let mut out = String::new();
    out.push_str("// MongoDB insert commands for dishes\n");
    out.push_str("// Generated from restaurant photo analysis\n\n");
    out.push_str("use restaurant_db;\n\n");

    for dish in dishes {
        let _ = writeln!(out, "db.dishes.insertOne({{");
        let _ = writeln!(out, "    \"dish_name\": {},", js_string(&dish.dish_name));
        let _ = writeln!(out, "    \"description\": {},", js_string(&dish.description));
        let _ = writeln!(out, "    \"photo_url\": {},", js_string(&dish.photo_url));
        let _ = writeln!(out, "    \"place_id\": {},", js_string(&dish.place_id));
        let _ = writeln!(
            out,
            "    \"restaurant_name\": {},",
            js_string(&dish.restaurant_name)
        );
        let _ = writeln!(out, "    \"created_at\": new Date(),");
        let _ = writeln!(out, "    \"verified\": false");
        let _ = writeln!(out, "}});\n");
    }
    out
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Text summary of a harvested listing.
pub fn render_listing_summary(latitude: f64, longitude: f64, restaurants: &[Restaurant]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Restaurant Photos URL Summary - Coordinates: ({latitude}, {longitude})"
    );
    let _ = writeln!(out, "{RULE}\n");

    let mut total_photos = 0;
    for r in restaurants {
        total_photos += r.photo_count;
        let _ = writeln!(out, "Restaurant: {}", r.restaurant_name);
        let _ = writeln!(out, "Place ID: {}", r.place_id);
        let _ = writeln!(
            out,
            "Rating: {}",
            r.rating.map_or("N/A".to_string(), |v| v.to_string())
        );
        let _ = writeln!(out, "Address: {}", r.vicinity.as_deref().unwrap_or("N/A"));
        let _ = writeln!(out, "Photo count: {}", r.photo_count);
        let _ = writeln!(out, "Photo URLs:");
        for (i, url) in r.photo_urls.iter().enumerate() {
            let _ = writeln!(out, "  {}. {url}", i + 1);
        }
        let _ = writeln!(out, "\n{RULE}\n");
    }

    let _ = write!(
        out,
        "Total: {} restaurants, {total_photos} photos",
        restaurants.len()
    );
    out
}
