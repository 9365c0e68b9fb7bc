// In-memory community report store

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::checkers::{CheckResult, ReportStore};
use crate::error::CheckerError;
use crate::model::{CommunityReport, ReportActivity, ReportCategory, ReportStats, ReportStatus};
use crate::target::normalize_url;

pub const DEFAULT_BLACKLIST_THRESHOLD: usize = 3;
pub const MAX_STORED_REPORTS: usize = 200;
pub const MAX_TRACKED_URLS: usize = 10_000;
pub const MIN_DESCRIPTION_LEN: usize = 10;
pub const MAX_DESCRIPTION_LEN: usize = 500;
pub const MAX_RECENT_LIMIT: usize = 50;

/// Trim a report description and enforce its length bounds.
pub fn check_description(description: &str) -> std::result::Result<&str, String> {
    let description = description.trim();
    let len = description.chars().count();
    if (MIN_DESCRIPTION_LEN..=MAX_DESCRIPTION_LEN).contains(&len) {
        Ok(description)
    } else {
        Err(format!(
            "description must be between {} and {} characters",
            MIN_DESCRIPTION_LEN, MAX_DESCRIPTION_LEN
        ))
    }
}

#[derive(Debug, Default)]
struct Inner {
    counts: HashMap<String, usize>,
    recent: VecDeque<CommunityReport>,
}

/// Report store that lives in process memory.
///
/// At most [`MAX_TRACKED_URLS`] per-URL counters are kept; a new URL past
/// that cap evicts the least-reported one. Only the newest
/// [`MAX_STORED_REPORTS`] report bodies are retained for listing.
#[derive(Debug)]
pub struct MemoryReportStore {
    inner: Mutex<Inner>,
    blacklist_threshold: usize,
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_BLACKLIST_THRESHOLD)
    }

    pub fn with_threshold(blacklist_threshold: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            blacklist_threshold: blacklist_threshold.max(1),
        }
    }

    pub fn blacklist_threshold(&self) -> usize {
        self.blacklist_threshold
    }

    fn lock(&self) -> CheckResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| CheckerError::Failed("report store lock poisoned".to_string()))
    }

    fn key(url: &str) -> CheckResult<String> {
        normalize_url(url).map_err(|e| CheckerError::Failed(e.to_string()))
    }
}

impl Inner {
    /// Bump the counter for `key`, evicting the least-reported URL when a
    /// new key would exceed `cap`.
    fn increment(&mut self, key: &str, cap: usize) -> usize {
        if !self.counts.contains_key(key) && self.counts.len() >= cap {
            let evicted = self
                .counts
                .iter()
                .min_by_key(|(_, count)| **count)
                .map(|(url, _)| url.clone());
            if let Some(url) = evicted {
                debug!("Evicting report counter for {}", url);
                self.counts.remove(&url);
            }
        }

        let count = self.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn check_phishing_reports(&self, url: &str) -> CheckResult<ReportStatus> {
        let key = Self::key(url)?;
        let count = self.lock()?.counts.get(&key).copied().unwrap_or(0);

        Ok(ReportStatus {
            is_reported: count > 0,
            report_count: count,
            is_blacklisted: count >= self.blacklist_threshold,
        })
    }

    async fn submit_report(
        &self,
        url: &str,
        description: &str,
        category: ReportCategory,
    ) -> CheckResult<CommunityReport> {
        let description = check_description(description).map_err(CheckerError::Failed)?;

        let key = Self::key(url)?;
        let report = CommunityReport {
            id: Uuid::new_v4(),
            url: key.clone(),
            description: description.to_string(),
            category,
            reported_at: Utc::now(),
        };

        let count = {
            let mut inner = self.lock()?;
            let count = inner.increment(&key, MAX_TRACKED_URLS);

            inner.recent.push_front(report.clone());
            inner.recent.truncate(MAX_STORED_REPORTS);
            count
        };

        info!("Report {} filed for {} ({} total)", report.id, key, count);
        if count == self.blacklist_threshold {
            info!("{} reached the blacklist threshold", key);
        }

        Ok(report)
    }

    async fn recent_reports(&self, limit: usize) -> CheckResult<Vec<CommunityReport>> {
        let limit = limit.clamp(1, MAX_RECENT_LIMIT);
        let inner = self.lock()?;
        debug!("Listing {} of {} reports", limit, inner.recent.len());
        Ok(inner.recent.iter().take(limit).cloned().collect())
    }

    async fn report_stats(&self) -> CheckResult<ReportStats> {
        let now = Utc::now();
        let today = now.date_naive();
        let since = now - Duration::hours(24);

        let inner = self.lock()?;
        let mut top_categories: BTreeMap<String, usize> = ReportCategory::ALL
            .iter()
            .map(|c| (c.key().to_string(), 0))
            .collect();
        for report in &inner.recent {
            *top_categories
                .entry(report.category.key().to_string())
                .or_insert(0) += 1;
        }

        let recent_activity = inner
            .recent
            .iter()
            .filter(|r| r.reported_at > since)
            .map(|r| ReportActivity {
                id: r.id,
                url: r.url.clone(),
                category: r.category,
                reported_at: r.reported_at,
            })
            .collect();

        Ok(ReportStats {
            total_reports: inner.recent.len(),
            tracked_urls: inner.counts.len(),
            reports_today: inner
                .recent
                .iter()
                .filter(|r| r.reported_at.date_naive() == today)
                .count(),
            top_categories,
            recent_activity,
            timestamp: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_by_normalized_url() {
        let store = MemoryReportStore::with_threshold(2);
        store
            .submit_report(
                "https://bad.example.tk/login?x=1",
                "Fake login page",
                ReportCategory::Phishing,
            )
            .await
            .unwrap();

        let status = store
            .check_phishing_reports("https://BAD.example.tk/login#frag")
            .await
            .unwrap();
        assert!(status.is_reported);
        assert_eq!(status.report_count, 1);
        assert!(!status.is_blacklisted);

        store
            .submit_report(
                "https://bad.example.tk/login",
                "Asked for my card",
                ReportCategory::Scam,
            )
            .await
            .unwrap();

        let status = store
            .check_phishing_reports("https://bad.example.tk/login")
            .await
            .unwrap();
        assert!(status.is_blacklisted);
    }

    #[tokio::test]
    async fn test_description_length_is_enforced() {
        let store = MemoryReportStore::new();
        let short = store
            .submit_report("https://a.example", "too short", ReportCategory::Phishing)
            .await;
        assert!(short.is_err());

        let long = "x".repeat(501);
        assert!(
            store
                .submit_report("https://a.example", &long, ReportCategory::Phishing)
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_recent_is_newest_first_and_clamped() {
        let store = MemoryReportStore::new();
        for i in 0..3 {
            store
                .submit_report(
                    &format!("https://site{}.example", i),
                    "Suspicious login form",
                    ReportCategory::Phishing,
                )
                .await
                .unwrap();
        }

        let recent = store.recent_reports(0).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].url, "https://site2.example/");

        let all = store.recent_reports(1000).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_stored_reports_are_capped() {
        let store = MemoryReportStore::new();
        for i in 0..(MAX_STORED_REPORTS + 5) {
            store
                .submit_report(
                    &format!("https://site{}.example", i),
                    "Suspicious login form",
                    ReportCategory::Phishing,
                )
                .await
                .unwrap();
        }

        assert_eq!(store.lock().unwrap().recent.len(), MAX_STORED_REPORTS);
    }

    #[test]
    fn test_tracked_urls_are_capped() {
        let mut inner = Inner::default();
        inner.increment("https://busy.example/", 3);
        inner.increment("https://busy.example/", 3);
        inner.increment("https://quiet.example/", 3);
        inner.increment("https://other.example/", 3);
        inner.increment("https://other.example/", 3);

        assert_eq!(inner.increment("https://new.example/", 3), 1);
        assert_eq!(inner.counts.len(), 3);
        assert!(!inner.counts.contains_key("https://quiet.example/"));
        assert_eq!(inner.counts.get("https://busy.example/"), Some(&2));

        // Existing keys never evict.
        assert_eq!(inner.increment("https://busy.example/", 3), 3);
        assert_eq!(inner.counts.len(), 3);
    }

    #[tokio::test]
    async fn test_store_never_tracks_more_than_cap() {
        let store = MemoryReportStore::new();
        for i in 0..(MAX_TRACKED_URLS + 3) {
            store
                .submit_report(
                    &format!("https://site{}.example", i),
                    "Suspicious login form",
                    ReportCategory::Phishing,
                )
                .await
                .unwrap();
        }

        assert_eq!(store.lock().unwrap().counts.len(), MAX_TRACKED_URLS);
    }

    #[tokio::test]
    async fn test_report_stats_breaks_down_categories() {
        let store = MemoryReportStore::new();
        let empty = store.report_stats().await.unwrap();
        assert_eq!(empty.total_reports, 0);
        assert_eq!(empty.top_categories.len(), 4);
        assert!(empty.top_categories.values().all(|&n| n == 0));

        for (url, category) in [
            ("https://a.example", ReportCategory::Phishing),
            ("https://a.example", ReportCategory::Scam),
            ("https://b.example", ReportCategory::Phishing),
        ] {
            store
                .submit_report(url, "Suspicious login form", category)
                .await
                .unwrap();
        }

        let stats = store.report_stats().await.unwrap();
        assert_eq!(stats.total_reports, 3);
        assert_eq!(stats.tracked_urls, 2);
        assert_eq!(stats.reports_today, 3);
        assert_eq!(stats.top_categories["phishing"], 2);
        assert_eq!(stats.top_categories["scam"], 1);
        assert_eq!(stats.top_categories["fake_site"], 0);
        assert_eq!(stats.recent_activity.len(), 3);
        assert_eq!(stats.recent_activity[0].url, "https://b.example/");
    }
}
