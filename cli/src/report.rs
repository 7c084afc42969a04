//! Human and JSON reports for finished runs.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use tagsync_core::orchestrator::{
    format_duration, ItemOutcome, ItemResult, RunStats, SyncStats, TagSyncResult,
};
use tagsync_core::types::ItemKind;

const RULE: &str = "================================================================================";

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// One indented "label value" line of a summary.
fn row(label: &str, value: impl std::fmt::Display) -> String {
    format!("  {label:<28} {value}\n")
}

/// The end-of-run summary printed after a bulk scrape.
pub fn bulk_summary(stats: &RunStats) -> String {
    let mut report = String::new();
    let elapsed = stats.elapsed();
    let overhead = elapsed.saturating_sub(stats.scrape_time);

    report.push_str(&format!("\n{RULE}\nBULK SCRAPE SUMMARY\n{RULE}\n"));
    report.push_str(&row("Total items:", stats.total));
    report.push_str(&row("Processed:", stats.processed));
    if stats.processed > 0 {
        report.push_str(&row(
            "Successful:",
            format!("{} ({})", stats.successful, percent(stats.success_rate())),
        ));
    } else {
        report.push_str(&row("Successful:", 0));
    }
    report.push_str(&row("Skipped:", stats.skipped));
    report.push_str(&row("Failed:", stats.failed));

    report.push_str("\nMetadata Created:\n");
    report.push_str(&row("Tags:", stats.tags_created));
    report.push_str(&row("Performers:", stats.performers_created));
    report.push_str(&row("Studios:", stats.studios_created));

    report.push_str("\nMetadata Added:\n");
    report.push_str(&row("Tags (total):", stats.tags_added));
    report.push_str(&row("Performers (total):", stats.performers_added));
    report.push_str(&row("Studios (total):", stats.studios_added));
    report.push('\n');

    if !stats.fields_updated.is_empty() {
        report.push_str("Metadata Fields Updated:\n");
        for (field, count) in &stats.fields_updated {
            report.push_str(&row(field, count));
        }
        report.push('\n');
    }

    if !stats.skip_reasons.is_empty() {
        report.push_str("Skip Reasons:\n");
        for (reason, count) in &stats.skip_reasons {
            report.push_str(&row(reason, count));
        }
        report.push('\n');
    }

    let names = stats.strategy_names();
    if !names.is_empty() {
        report.push_str("Scraper Success Rates:\n");
        for name in names {
            let ok = stats.strategy_successes.get(name).copied().unwrap_or(0);
            let failed = stats.strategy_failures.get(name).copied().unwrap_or(0);
            report.push_str(&row(
                name,
                format!(
                    "{ok}/{} ({})",
                    ok + failed,
                    percent(stats.strategy_success_rate(name))
                ),
            ));
        }
        report.push('\n');
    }

    if stats.fallback_used > 0 {
        report.push_str(&format!(
            "{:<30} {} times\n\n",
            "Fallback scraper used:", stats.fallback_used
        ));
    }

    report.push_str("Performance:\n");
    report.push_str(&row("Total time:", format_duration(elapsed)));
    report.push_str(&row("Scraping time:", format_duration(stats.scrape_time)));
    report.push_str(&row("Overhead time:", format_duration(overhead)));
    report.push_str(&row(
        "Rate:",
        format!("{:.2} items/sec", stats.items_per_second()),
    ));
    report.push_str(&row(
        "Avg scrape time:",
        format!("{:.2} sec/item", stats.average_scrape_time().as_secs_f64()),
    ));
    report.push_str(RULE);
    report
}

#[derive(Serialize)]
struct BulkSummary {
    total: usize,
    processed: usize,
    successful: usize,
    success_rate: f64,
    skipped: usize,
    failed: usize,
    elapsed_seconds: f64,
    total_scrape_time_seconds: f64,
    rate_items_per_second: f64,
    avg_scrape_time_seconds: f64,
}

#[derive(Serialize)]
struct EntityCounts {
    tags: usize,
    performers: usize,
    studios: usize,
}

#[derive(Serialize)]
struct StrategyPerformance<'a> {
    success_counts: &'a BTreeMap<String, usize>,
    failure_counts: &'a BTreeMap<String, usize>,
    success_rates: BTreeMap<&'a str, f64>,
}

#[derive(Serialize)]
struct ResultRecord<'a> {
    timestamp: NaiveDateTime,
    item_id: &'a str,
    item_type: ItemKind,
    item_path: Option<&'a str>,
    item_title: Option<&'a str>,
    scraper_used: &'a str,
    fallback_used: bool,
    success: bool,
    skipped: bool,
    skip_reason: Option<String>,
    error: Option<&'a str>,
    scrape_time_seconds: f64,
    tags_created: &'a [String],
    tags_added: &'a [String],
    performers_created: &'a [String],
    performers_added: &'a [String],
    studio_created: Option<&'a str>,
    studio_added: Option<&'a str>,
    metadata_fields_updated: &'a [String],
}

impl<'a> From<&'a ItemResult> for ResultRecord<'a> {
    fn from(r: &'a ItemResult) -> Self {
        let (skip_reason, error) = match &r.outcome {
            ItemOutcome::Success => (None, None),
            ItemOutcome::Skipped(reason) => (Some(reason.to_string()), None),
            ItemOutcome::Failed(error) => (None, Some(error.as_str())),
        };
        Self {
            timestamp: r.timestamp,
            item_id: &r.item_id,
            item_type: r.kind,
            item_path: r.path.as_deref(),
            item_title: r.title.as_deref(),
            scraper_used: &r.strategy,
            fallback_used: r.fallback_used,
            success: r.is_success(),
            skipped: skip_reason.is_some(),
            skip_reason,
            error,
            scrape_time_seconds: r.elapsed.as_secs_f64(),
            tags_created: &r.tags_created,
            tags_added: &r.tags_added,
            performers_created: &r.performers_created,
            performers_added: &r.performers_added,
            studio_created: r.studio_created.as_deref(),
            studio_added: r.studio_added.as_deref(),
            metadata_fields_updated: &r.fields_updated,
        }
    }
}

#[derive(Serialize)]
struct BulkReport<'a> {
    summary: BulkSummary,
    metadata_created: EntityCounts,
    metadata_added: EntityCounts,
    metadata_fields_updated: &'a BTreeMap<String, usize>,
    scraper_performance: StrategyPerformance<'a>,
    fallback_used_count: usize,
    results: Vec<ResultRecord<'a>>,
}

pub fn bulk_json(stats: &RunStats, results: &[ItemResult]) -> serde_json::Value {
    let report = BulkReport {
        summary: BulkSummary {
            total: stats.total,
            processed: stats.processed,
            successful: stats.successful,
            success_rate: stats.success_rate(),
            skipped: stats.skipped,
            failed: stats.failed,
            elapsed_seconds: stats.elapsed().as_secs_f64(),
            total_scrape_time_seconds: stats.scrape_time.as_secs_f64(),
            rate_items_per_second: stats.items_per_second(),
            avg_scrape_time_seconds: stats.average_scrape_time().as_secs_f64(),
        },
        metadata_created: EntityCounts {
            tags: stats.tags_created,
            performers: stats.performers_created,
            studios: stats.studios_created,
        },
        metadata_added: EntityCounts {
            tags: stats.tags_added,
            performers: stats.performers_added,
            studios: stats.studios_added,
        },
        metadata_fields_updated: &stats.fields_updated,
        scraper_performance: StrategyPerformance {
            success_counts: &stats.strategy_successes,
            failure_counts: &stats.strategy_failures,
            success_rates: stats
                .strategy_names()
                .into_iter()
                .map(|name| (name, stats.strategy_success_rate(name)))
                .collect(),
        },
        fallback_used_count: stats.fallback_used,
        results: results.iter().map(ResultRecord::from).collect(),
    };
    serde_json::to_value(report).unwrap_or_default()
}

/// The end-of-run summary printed after a description sync.
pub fn sync_summary(stats: &SyncStats) -> String {
    let rule = &RULE[..60];
    let mut report = String::new();
    report.push_str(&format!("\n{rule}\nSYNC SUMMARY\n{rule}\n"));
    report.push_str(&format!("Total tags processed:    {}\n", stats.total));
    report.push_str(&format!("Successfully updated:    {}\n", stats.updated));
    report.push_str(&format!("Skipped (existing):      {}\n", stats.skipped));
    report.push_str(&format!("Not found in wiki:       {}\n", stats.not_found));
    report.push_str(&format!("Errors:                  {}\n", stats.errors));
    report.push_str(rule);
    report
}

pub fn sync_json(stats: &SyncStats, results: &[TagSyncResult]) -> serde_json::Value {
    serde_json::json!({
        "stats": stats,
        "results": results,
    })
}

pub fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize results")?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}
