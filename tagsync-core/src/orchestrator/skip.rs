//! Deciding which items a bulk run leaves alone.

use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::error::ConfigError;
use crate::types::ScrapeItem;

/// Inclusive date bounds on an item's file timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFilter {
    pub since: Option<NaiveDate>,
    pub before: Option<NaiveDate>,
}

impl DateFilter {
    /// Combine `--between`, `--since` and `--before` with AND semantics: the
    /// latest start and the earliest end win.
    pub fn combine(
        between: Option<(NaiveDate, NaiveDate)>,
        since: Option<NaiveDate>,
        before: Option<NaiveDate>,
    ) -> Result<Self, ConfigError> {
        if let Some((start, end)) = between {
            if start > end {
                return Err(ConfigError::DateRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }

        let since = [between.map(|(s, _)| s), since].into_iter().flatten().max();
        let before = [between.map(|(_, e)| e), before].into_iter().flatten().min();

        if let (Some(start), Some(end)) = (since, before) {
            if start > end {
                return Err(ConfigError::DateRange {
                    start: start.to_string(),
                    end: end.to_string(),
                });
            }
        }
        Ok(Self { since, before })
    }

    pub fn is_active(&self) -> bool {
        self.since.is_some() || self.before.is_some()
    }

    fn check(&self, timestamp: NaiveDateTime) -> Option<SkipReason> {
        if let Some(since) = self.since {
            if timestamp < since.and_time(chrono::NaiveTime::MIN) {
                return Some(SkipReason::BeforeDateFilter(since));
            }
        }
        if let Some(before) = self.before {
            let end_of_day = before
                .checked_add_days(Days::new(1))
                .map(|d| d.and_time(chrono::NaiveTime::MIN));
            if end_of_day.is_some_and(|end| timestamp >= end) {
                return Some(SkipReason::AfterDateFilter(before));
            }
        }
        None
    }
}

/// Parse a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ConfigError::InvalidDate(value.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Organized,
    AlreadyTagged,
    ExclusionTag(String),
    NoPath,
    NoTimestamp,
    BeforeDateFilter(NaiveDate),
    AfterDateFilter(NaiveDate),
    /// Strategies answered but nothing they returned was worth writing.
    NoUsefulData,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Organized => f.write_str("already organized"),
            SkipReason::AlreadyTagged => f.write_str("already has tags"),
            SkipReason::ExclusionTag(tag) => write!(f, "has exclusion tag: {tag}"),
            SkipReason::NoPath => f.write_str("no file path"),
            SkipReason::NoTimestamp => f.write_str("no file timestamp available"),
            SkipReason::BeforeDateFilter(d) => write!(f, "before date filter ({d})"),
            SkipReason::AfterDateFilter(d) => write!(f, "after date filter ({d})"),
            SkipReason::NoUsefulData => f.write_str("no useful data from any strategy"),
        }
    }
}

/// Which items to leave alone. Rules are checked in field order and the
/// first match wins.
#[derive(Debug, Clone, Default)]
pub struct SkipPolicy {
    pub skip_organized: bool,
    pub skip_tagged: bool,
    /// Compared case-insensitively against the item's tag names.
    pub exclusion_tags: Vec<String>,
    pub dates: DateFilter,
}

impl SkipPolicy {
    pub fn check(&self, item: &ScrapeItem) -> Option<SkipReason> {
        if self.skip_organized && item.organized {
            return Some(SkipReason::Organized);
        }
        if self.skip_tagged && !item.tags.is_empty() {
            return Some(SkipReason::AlreadyTagged);
        }
        if let Some(tag) = self.exclusion_tag(item) {
            return Some(SkipReason::ExclusionTag(tag));
        }
        if item.path.as_deref().map_or(true, str::is_empty) {
            return Some(SkipReason::NoPath);
        }
        if self.dates.is_active() {
            let Some(timestamp) = item.added_at else {
                return Some(SkipReason::NoTimestamp);
            };
            return self.dates.check(timestamp);
        }
        None
    }

    fn exclusion_tag(&self, item: &ScrapeItem) -> Option<String> {
        let names: Vec<String> = item.tags.iter().map(|t| t.name.to_lowercase()).collect();
        self.exclusion_tags
            .iter()
            .map(|t| t.to_lowercase())
            .find(|t| names.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemKind, TagRef};

    fn item() -> ScrapeItem {
        ScrapeItem {
            id: "1".into(),
            kind: ItemKind::Image,
            title: None,
            path: Some("/media/a.png".into()),
            checksum: None,
            tags: vec![],
            organized: false,
            added_at: None,
        }
    }

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let policy = SkipPolicy {
            skip_organized: true,
            ..Default::default()
        };
        let mut it = item();
        it.organized = true;
        it.path = None;
        assert_eq!(policy.check(&it), Some(SkipReason::Organized));
    }

    #[test]
    fn test_organized_item_processed_when_not_skipping_organized() {
        let mut it = item();
        it.organized = true;
        assert_eq!(SkipPolicy::default().check(&it), None);
    }

    #[test]
    fn test_tag_rules() {
        let mut it = item();
        it.tags.push(TagRef {
            id: "1".into(),
            name: "[Scraped]".into(),
        });

        let exclusion = SkipPolicy {
            exclusion_tags: vec!["[scraped]".into()],
            ..Default::default()
        };
        assert_eq!(
            exclusion.check(&it),
            Some(SkipReason::ExclusionTag("[scraped]".into()))
        );

        let tagged = SkipPolicy {
            skip_tagged: true,
            exclusion_tags: vec!["[scraped]".into()],
            ..Default::default()
        };
        assert_eq!(tagged.check(&it), Some(SkipReason::AlreadyTagged));
    }

    #[test]
    fn test_missing_path() {
        let mut it = item();
        it.path = Some(String::new());
        assert_eq!(SkipPolicy::default().check(&it), Some(SkipReason::NoPath));
    }

    #[test]
    fn test_date_filter_inclusive_bounds() {
        let policy = SkipPolicy {
            dates: DateFilter {
                since: Some(date("2024-01-10")),
                before: Some(date("2024-01-20")),
            },
            ..Default::default()
        };
        let mut it = item();
        assert_eq!(policy.check(&it), Some(SkipReason::NoTimestamp));

        it.added_at = Some(at("2024-01-10 00:00:00"));
        assert_eq!(policy.check(&it), None);
        it.added_at = Some(at("2024-01-20 23:59:59"));
        assert_eq!(policy.check(&it), None);
        it.added_at = Some(at("2024-01-09 23:59:59"));
        assert_eq!(
            policy.check(&it),
            Some(SkipReason::BeforeDateFilter(date("2024-01-10")))
        );
        it.added_at = Some(at("2024-01-21 00:00:00"));
        assert_eq!(
            policy.check(&it),
            Some(SkipReason::AfterDateFilter(date("2024-01-20")))
        );
    }

    #[test]
    fn test_combine_dates() {
        let combined = DateFilter::combine(
            Some((date("2024-01-01"), date("2024-01-31"))),
            Some(date("2024-01-05")),
            Some(date("2024-02-10")),
        )
        .unwrap();
        assert_eq!(combined.since, Some(date("2024-01-05")));
        assert_eq!(combined.before, Some(date("2024-01-31")));

        assert!(matches!(
            DateFilter::combine(None, Some(date("2024-02-01")), Some(date("2024-01-01"))),
            Err(ConfigError::DateRange { .. })
        ));
        assert!(matches!(
            DateFilter::combine(Some((date("2024-02-01"), date("2024-01-01"))), None, None),
            Err(ConfigError::DateRange { .. })
        ));
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        assert!(matches!(parse_date("15/01/2024"), Err(ConfigError::InvalidDate(_))));
        assert_eq!(parse_date("2024-01-15").unwrap().to_string(), "2024-01-15");
    }

    #[test]
    fn test_reason_text() {
        assert_eq!(
            SkipReason::BeforeDateFilter(date("2024-01-10")).to_string(),
            "before date filter (2024-01-10)"
        );
    }
}
