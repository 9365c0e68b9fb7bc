use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of inspecting a host over HTTPS.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SslReport {
    pub domain: String,
    pub has_ssl: bool,
    pub is_valid: bool,
    pub has_issues: bool,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip)]
    pub response_time: Duration,
}

impl SslReport {
    pub fn new(domain: String) -> Self {
        Self {
            domain,
            ..Default::default()
        }
    }

    pub fn push_issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
        self.has_issues = true;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirusTotalStats {
    pub malicious: u32,
    pub suspicious: u32,
    pub clean: u32,
    pub total: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reputation: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeBrowsingVerdict {
    pub is_threat: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threat_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_type: Option<String>,
    pub matches: usize,
}

/// Per-source outcome. A source that failed keeps its error message instead of a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceOutcome<T> {
    Ok(T),
    Failed { error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelSources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virus_total: Option<SourceOutcome<VirusTotalStats>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safe_browsing: Option<SourceOutcome<SafeBrowsingVerdict>>,
}

/// Combined verdict of every configured threat-intelligence source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntelReport {
    pub is_malicious: bool,
    pub confidence: u8,
    pub detections: Vec<String>,
    pub sources: IntelSources,
}
