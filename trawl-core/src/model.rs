// Wire and report types shared by the aggregator, the CLI and the HTTP layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use trawl_probes::{IntelReport, SslReport};
use uuid::Uuid;

use crate::error::CheckerError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckLevel {
    #[default]
    Basic,
    Full,
}

impl CheckLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckLevel::Basic => "basic",
            CheckLevel::Full => "full",
        }
    }
}

impl fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(CheckLevel::Basic),
            "full" => Ok(CheckLevel::Full),
            other => Err(format!("unknown check level '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Safe,
    Dangerous,
    Suspicious,
    Unverified,
    Unknown,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Safe => "SAFE",
            Verdict::Dangerous => "DANGEROUS",
            Verdict::Suspicious => "SUSPICIOUS",
            Verdict::Unverified => "UNVERIFIED",
            Verdict::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The independent signal sources an evaluation folds together, in fold order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CheckerKind {
    Registry,
    CommunityReports,
    ThreatIntel,
    Heuristics,
    Ssl,
}

impl CheckerKind {
    pub const ALL: [CheckerKind; 5] = [
        CheckerKind::Registry,
        CheckerKind::CommunityReports,
        CheckerKind::ThreatIntel,
        CheckerKind::Heuristics,
        CheckerKind::Ssl,
    ];

    /// Key of this checker in a report's `tentacles` map.
    pub fn key(&self) -> &'static str {
        match self {
            CheckerKind::Registry => "registry",
            CheckerKind::CommunityReports => "communityReports",
            CheckerKind::ThreatIntel => "threatIntel",
            CheckerKind::Heuristics => "heuristics",
            CheckerKind::Ssl => "ssl",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckerKind::Registry => "Official Registry",
            CheckerKind::CommunityReports => "Community Reports",
            CheckerKind::ThreatIntel => "Threat Intelligence",
            CheckerKind::Heuristics => "Heuristic Scan",
            CheckerKind::Ssl => "SSL Analysis",
        }
    }

    /// Whether this checker runs at the given level.
    pub fn runs_at(&self, level: CheckLevel) -> bool {
        match self {
            CheckerKind::Registry | CheckerKind::CommunityReports => true,
            _ => level == CheckLevel::Full,
        }
    }
}

impl fmt::Display for CheckerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckerStatus {
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: String,
    pub weight: f64,
    pub detail: String,
}

impl Signal {
    pub fn new(kind: impl Into<String>, weight: f64, detail: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            weight,
            detail: detail.into(),
        }
    }
}

/// Checker-specific payload carried on a completed result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckerDetails {
    Registry(RegistryLookup),
    Reports(ReportStatus),
    Intel(IntelReport),
    Heuristics(HeuristicAnalysis),
    Ssl(SslReport),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckerResult {
    pub checker_name: String,
    pub name: String,
    pub status: CheckerStatus,
    pub confidence: u8,
    pub signals: Vec<Signal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CheckerDetails>,
}

impl CheckerResult {
    pub fn completed(kind: CheckerKind, confidence: u8, details: CheckerDetails) -> Self {
        Self {
            checker_name: kind.key().to_string(),
            name: kind.label().to_string(),
            status: CheckerStatus::Completed,
            confidence: confidence.min(100),
            signals: Vec::new(),
            error: None,
            details: Some(details),
        }
    }

    pub fn failed(kind: CheckerKind, err: &CheckerError) -> Self {
        Self {
            checker_name: kind.key().to_string(),
            name: kind.label().to_string(),
            status: CheckerStatus::Error,
            confidence: 0,
            signals: Vec::new(),
            error: Some(err.to_string()),
            details: None,
        }
    }

    pub fn with_signals(mut self, signals: Vec<Signal>) -> Self {
        self.signals = signals;
        self
    }

    pub fn is_error(&self) -> bool {
        self.status == CheckerStatus::Error
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Subdomain,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryLookup {
    pub is_official: bool,
    pub match_kind: MatchKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl RegistryLookup {
    pub fn not_official() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStatus {
    pub is_reported: bool,
    pub report_count: usize,
    pub is_blacklisted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportCategory {
    #[default]
    Phishing,
    Malware,
    Scam,
    FakeSite,
}

impl ReportCategory {
    pub const ALL: [ReportCategory; 4] = [
        ReportCategory::Phishing,
        ReportCategory::Malware,
        ReportCategory::Scam,
        ReportCategory::FakeSite,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ReportCategory::Phishing => "phishing",
            ReportCategory::Malware => "malware",
            ReportCategory::Scam => "scam",
            ReportCategory::FakeSite => "fake_site",
        }
    }
}

impl FromStr for ReportCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "phishing" => Ok(ReportCategory::Phishing),
            "malware" => Ok(ReportCategory::Malware),
            "scam" => Ok(ReportCategory::Scam),
            "fake_site" => Ok(ReportCategory::FakeSite),
            other => Err(format!(
                "unknown category '{}' (expected phishing, malware, scam or fake_site)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityReport {
    pub id: Uuid,
    pub url: String,
    pub description: String,
    pub category: ReportCategory,
    pub reported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportActivity {
    pub id: Uuid,
    pub url: String,
    pub category: ReportCategory,
    pub reported_at: DateTime<Utc>,
}

/// Summary of the retained community reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportStats {
    pub total_reports: usize,
    pub tracked_urls: usize,
    pub reports_today: usize,
    /// Every category is present, zero when unused.
    pub top_categories: BTreeMap<String, usize>,
    /// Reports filed in the last 24 hours, newest first.
    pub recent_activity: Vec<ReportActivity>,
    pub timestamp: DateTime<Utc>,
}

/// One row of the official-domain table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialDomain {
    pub domain: String,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Size of the official registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStats {
    pub entities: usize,
    pub domains: usize,
    pub entities_by_country: BTreeMap<String, usize>,
    pub domains_by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMatch {
    Prefix,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSearchHit {
    pub domain: String,
    pub entity_id: String,
    pub is_official: bool,
    pub match_type: SearchMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
    pub has_more: bool,
}

impl Pagination {
    /// Slice `items` to the requested window and describe it.
    pub fn apply<T>(items: Vec<T>, limit: usize, offset: usize) -> (Vec<T>, Pagination) {
        let total = items.len();
        let page = items.into_iter().skip(offset).take(limit).collect();
        let pagination = Pagination {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total,
        };
        (page, pagination)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserExplanation {
    pub summary: String,
    pub reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    pub signal_count: usize,
    pub recommendation: String,
    pub educational_tip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicAnalysis {
    pub is_phishing: bool,
    pub confidence: u8,
    pub score: f64,
    pub flags: Vec<Signal>,
    pub explanations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_explanation: Option<UserExplanation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictReport {
    pub url: String,
    pub domain: String,
    pub timestamp: DateTime<Utc>,
    pub check_level: CheckLevel,
    pub tentacles: BTreeMap<String, CheckerResult>,
    pub verdict: Verdict,
    pub confidence: u8,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<UserExplanation>,
    pub processing_time_ms: u64,
}

impl VerdictReport {
    pub fn checker(&self, kind: CheckerKind) -> Option<&CheckerResult> {
        self.tentacles.get(kind.key())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainCheck {
    pub domain: String,
    pub is_official: bool,
    pub entity: Option<Entity>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchEntry {
    pub domain: String,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_official: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub results: Vec<BatchEntry>,
    pub timestamp: DateTime<Utc>,
    pub processed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarDomain {
    pub domain: String,
    /// Similarity as a rounded percentage.
    pub similarity: u8,
    pub is_official: bool,
    pub warning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarDomains {
    pub input_domain: String,
    pub similar_domains: Vec<SimilarDomain>,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainValidation {
    pub domain: String,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub suspicion_score: u8,
    pub risk_level: RiskLevel,
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_level_defaults_to_basic() {
        assert_eq!(CheckLevel::default(), CheckLevel::Basic);
        assert_eq!("FULL".parse::<CheckLevel>().unwrap(), CheckLevel::Full);
        assert!("deep".parse::<CheckLevel>().is_err());
    }

    #[test]
    fn test_verdict_serializes_uppercase() {
        let json = serde_json::to_string(&Verdict::Unverified).unwrap();
        assert_eq!(json, "\"UNVERIFIED\"");
    }

    #[test]
    fn test_failed_result_has_no_confidence() {
        let err = CheckerError::Timeout(std::time::Duration::from_secs(10));
        let result = CheckerResult::failed(CheckerKind::Ssl, &err);
        assert!(result.is_error());
        assert_eq!(result.confidence, 0);
        assert_eq!(result.checker_name, "ssl");
        assert_eq!(result.error.as_deref(), Some("timed out after 10s"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_only_basic_checkers_run_at_basic_level() {
        let basic: Vec<_> = CheckerKind::ALL
            .iter()
            .filter(|k| k.runs_at(CheckLevel::Basic))
            .collect();
        assert_eq!(
            basic,
            vec![&CheckerKind::Registry, &CheckerKind::CommunityReports]
        );
        assert!(CheckerKind::ALL.iter().all(|k| k.runs_at(CheckLevel::Full)));
    }

    #[test]
    fn test_report_category_parse() {
        assert_eq!(
            "fake_site".parse::<ReportCategory>().unwrap(),
            ReportCategory::FakeSite
        );
        assert!("spam".parse::<ReportCategory>().is_err());
    }

    #[test]
    fn test_category_keys_match_wire_names() {
        for category in ReportCategory::ALL {
            let json = serde_json::to_value(category).unwrap();
            assert_eq!(json, category.key());
            assert_eq!(category.key().parse::<ReportCategory>().unwrap(), category);
        }
    }

    #[test]
    fn test_pagination_window() {
        let (page, pagination) = Pagination::apply((0..7).collect::<Vec<_>>(), 3, 5);
        assert_eq!(page, vec![5, 6]);
        assert_eq!(pagination.total, 7);
        assert!(!pagination.has_more);

        let (page, pagination) = Pagination::apply((0..7).collect::<Vec<_>>(), 3, 0);
        assert_eq!(page, vec![0, 1, 2]);
        assert!(pagination.has_more);

        let (page, _) = Pagination::apply((0..7).collect::<Vec<_>>(), 3, 50);
        assert!(page.is_empty());
    }
}
