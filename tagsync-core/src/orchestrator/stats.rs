use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::bulk::{ItemOutcome, ItemResult};

/// Running totals for one bulk run over one kind of item.
///
/// Counters only ever grow; a new item kind gets a new `RunStats`.
#[derive(Debug, Clone)]
pub struct RunStats {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub skipped: usize,
    pub failed: usize,
    pub tags_created: usize,
    pub tags_added: usize,
    pub performers_created: usize,
    pub performers_added: usize,
    pub studios_created: usize,
    pub studios_added: usize,
    pub fallback_used: usize,
    pub fields_updated: BTreeMap<String, usize>,
    pub strategy_successes: BTreeMap<String, usize>,
    pub strategy_failures: BTreeMap<String, usize>,
    pub skip_reasons: BTreeMap<String, usize>,
    /// Time spent inside item processing, excluding paging.
    pub scrape_time: Duration,
    started: Instant,
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            total: 0,
            processed: 0,
            successful: 0,
            skipped: 0,
            failed: 0,
            tags_created: 0,
            tags_added: 0,
            performers_created: 0,
            performers_added: 0,
            studios_created: 0,
            studios_added: 0,
            fallback_used: 0,
            fields_updated: BTreeMap::new(),
            strategy_successes: BTreeMap::new(),
            strategy_failures: BTreeMap::new(),
            skip_reasons: BTreeMap::new(),
            scrape_time: Duration::ZERO,
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, result: &ItemResult) {
        self.processed += 1;
        self.scrape_time += result.elapsed;

        match &result.outcome {
            ItemOutcome::Success => {
                self.successful += 1;
                self.tags_created += result.tags_created.len();
                self.tags_added += result.tags_added.len();
                self.performers_created += result.performers_created.len();
                self.performers_added += result.performers_added.len();
                self.studios_created += usize::from(result.studio_created.is_some());
                self.studios_added += usize::from(result.studio_added.is_some());
                self.fallback_used += usize::from(result.fallback_used);
                for field in &result.fields_updated {
                    *self.fields_updated.entry(field.clone()).or_default() += 1;
                }
                *self
                    .strategy_successes
                    .entry(result.strategy.clone())
                    .or_default() += 1;
            }
            ItemOutcome::Skipped(reason) => {
                self.skipped += 1;
                *self.skip_reasons.entry(reason.to_string()).or_default() += 1;
            }
            ItemOutcome::Failed(_) => {
                self.failed += 1;
                *self
                    .strategy_failures
                    .entry(result.strategy.clone())
                    .or_default() += 1;
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn items_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.processed as f64 / secs
        } else {
            0.0
        }
    }

    /// Time left at the current rate, if there is a rate yet.
    pub fn eta(&self) -> Option<Duration> {
        let rate = self.items_per_second();
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.total.saturating_sub(self.processed) as f64;
        Some(Duration::from_secs_f64(remaining / rate))
    }

    pub fn success_rate(&self) -> f64 {
        ratio(self.successful, self.processed)
    }

    pub fn average_scrape_time(&self) -> Duration {
        u32::try_from(self.processed)
            .ok()
            .filter(|n| *n > 0)
            .map_or(Duration::ZERO, |n| self.scrape_time / n)
    }

    /// Successes over attempts for one strategy.
    pub fn strategy_success_rate(&self, strategy: &str) -> f64 {
        let ok = self.strategy_successes.get(strategy).copied().unwrap_or(0);
        let failed = self.strategy_failures.get(strategy).copied().unwrap_or(0);
        ratio(ok, ok + failed)
    }

    /// Every strategy that succeeded or failed at least once.
    pub fn strategy_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .strategy_successes
            .keys()
            .chain(self.strategy_failures.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// `H:MM:SS`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::skip::SkipReason;
    use crate::types::ItemKind;

    fn result(outcome: ItemOutcome, strategy: &str) -> ItemResult {
        let mut r = ItemResult::new("1", ItemKind::Image, strategy);
        r.outcome = outcome;
        r.elapsed = Duration::from_millis(500);
        r
    }

    #[test]
    fn test_record_success() {
        let mut stats = RunStats::new();
        let mut r = result(ItemOutcome::Success, "B");
        r.tags_created = vec!["x".into()];
        r.tags_added = vec!["x".into(), "y".into()];
        r.studio_added = Some("s".into());
        r.fallback_used = true;
        r.fields_updated = vec!["tags".into(), "studio_id".into()];
        stats.record(&r);

        assert_eq!(stats.successful, 1);
        assert_eq!(stats.tags_created, 1);
        assert_eq!(stats.tags_added, 2);
        assert_eq!(stats.studios_added, 1);
        assert_eq!(stats.studios_created, 0);
        assert_eq!(stats.fallback_used, 1);
        assert_eq!(stats.fields_updated["tags"], 1);
        assert_eq!(stats.strategy_successes["B"], 1);
    }

    #[test]
    fn test_record_skip_and_failure() {
        let mut stats = RunStats::new();
        stats.record(&result(ItemOutcome::Skipped(SkipReason::NoPath), "A"));
        stats.record(&result(ItemOutcome::Skipped(SkipReason::NoPath), "A"));
        stats.record(&result(ItemOutcome::Failed("boom".into()), "A"));
        stats.record(&result(ItemOutcome::Success, "A"));

        assert_eq!(stats.processed, 4);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.skip_reasons["no file path"], 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.strategy_success_rate("A"), 0.5);
        assert_eq!(stats.scrape_time, Duration::from_secs(2));
        assert_eq!(stats.average_scrape_time(), Duration::from_millis(500));
        assert_eq!(stats.strategy_names(), vec!["A"]);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }
}
