use crate::error::{ProbeError, Result};
use crate::result::{IntelReport, SafeBrowsingVerdict, SourceOutcome, VirusTotalStats};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

pub const VIRUSTOTAL_BASE: &str = "https://www.virustotal.com";
pub const SAFE_BROWSING_BASE: &str = "https://safebrowsing.googleapis.com";

const VIRUSTOTAL_CONFIDENCE: u8 = 85;
const SAFE_BROWSING_CONFIDENCE: u8 = 90;

/// Pass-through client for external URL reputation services.
///
/// Each source is only queried when its API key is set. A source that fails
/// is recorded on the report; the lookup as a whole only fails when every
/// configured source failed.
#[derive(Clone)]
pub struct IntelClient {
    client: Client,
    virustotal_key: Option<String>,
    safe_browsing_key: Option<String>,
    virustotal_base: String,
    safe_browsing_base: String,
}

impl IntelClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            virustotal_key: None,
            safe_browsing_key: None,
            virustotal_base: VIRUSTOTAL_BASE.to_string(),
            safe_browsing_base: SAFE_BROWSING_BASE.to_string(),
        }
    }

    pub fn with_virustotal_key(mut self, key: Option<String>) -> Self {
        self.virustotal_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_safe_browsing_key(mut self, key: Option<String>) -> Self {
        self.safe_browsing_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    pub fn with_virustotal_base(mut self, base: impl Into<String>) -> Self {
        self.virustotal_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_safe_browsing_base(mut self, base: impl Into<String>) -> Self {
        self.safe_browsing_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.virustotal_key.is_some() || self.safe_browsing_key.is_some()
    }

    pub async fn check_url(&self, url: &str) -> Result<IntelReport> {
        let mut report = IntelReport::default();
        let mut attempted = 0;
        let mut failed = 0;

        if self.virustotal_key.is_some() {
            attempted += 1;
            match self.check_virustotal(url).await {
                Ok(stats) => {
                    if stats.malicious > 0 {
                        report.is_malicious = true;
                        report.confidence = report.confidence.max(VIRUSTOTAL_CONFIDENCE);
                        report.detections.push(format!(
                            "VirusTotal: {}/{} engines detected threats",
                            stats.malicious, stats.total
                        ));
                    }
                    report.sources.virus_total = Some(SourceOutcome::Ok(stats));
                }
                Err(e) => {
                    failed += 1;
                    warn!("VirusTotal lookup failed for {}: {}", url, e);
                    report.sources.virus_total = Some(SourceOutcome::Failed {
                        error: e.to_string(),
                    });
                }
            }
        }

        if self.safe_browsing_key.is_some() {
            attempted += 1;
            match self.check_safe_browsing(url).await {
                Ok(verdict) => {
                    if verdict.is_threat {
                        report.is_malicious = true;
                        report.confidence = report.confidence.max(SAFE_BROWSING_CONFIDENCE);
                        report.detections.push(format!(
                            "Safe Browsing: {}",
                            verdict.threat_type.as_deref().unwrap_or("THREAT")
                        ));
                    }
                    report.sources.safe_browsing = Some(SourceOutcome::Ok(verdict));
                }
                Err(e) => {
                    failed += 1;
                    warn!("Safe Browsing lookup failed for {}: {}", url, e);
                    report.sources.safe_browsing = Some(SourceOutcome::Failed {
                        error: e.to_string(),
                    });
                }
            }
        }

        if attempted > 0 && failed == attempted {
            return Err(ProbeError::Other(
                "every threat intelligence source failed".to_string(),
            ));
        }

        Ok(report)
    }

    pub async fn check_virustotal(&self, url: &str) -> Result<VirusTotalStats> {
        let key = self
            .virustotal_key
            .as_deref()
            .ok_or(ProbeError::MissingApiKey("VirusTotal"))?;

        let url_id = URL_SAFE_NO_PAD.encode(url);
        let endpoint = format!("{}/api/v3/urls/{}", self.virustotal_base, url_id);
        debug!("VirusTotal lookup {}", endpoint);

        let response = self
            .client
            .get(&endpoint)
            .header("x-apikey", key)
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                self.submit_to_virustotal(url, key).await;
                return Ok(VirusTotalStats {
                    status: Some("submitted_for_analysis".to_string()),
                    ..Default::default()
                });
            }
            status if !status.is_success() => {
                return Err(ProbeError::UnexpectedStatus {
                    service: "VirusTotal",
                    status: status.as_u16(),
                });
            }
            _ => {}
        }

        let body: VtUrlResponse = response.json().await?;
        let attributes = body.data.attributes;
        let stats = attributes.last_analysis_stats;

        Ok(VirusTotalStats {
            malicious: stats.malicious,
            suspicious: stats.suspicious,
            clean: stats.harmless,
            total: stats.malicious
                + stats.suspicious
                + stats.harmless
                + stats.undetected
                + stats.timeout,
            reputation: attributes.reputation,
            status: None,
        })
    }

    /// Queue an unknown URL for analysis. Failures are only logged.
    async fn submit_to_virustotal(&self, url: &str, key: &str) {
        let endpoint = format!("{}/api/v3/urls", self.virustotal_base);
        let result = self
            .client
            .post(&endpoint)
            .header("x-apikey", key)
            .form(&[("url", url)])
            .send()
            .await;

        if let Err(e) = result {
            warn!("Could not submit {} to VirusTotal: {}", url, e);
        }
    }

    pub async fn check_safe_browsing(&self, url: &str) -> Result<SafeBrowsingVerdict> {
        let key = self
            .safe_browsing_key
            .as_deref()
            .ok_or(ProbeError::MissingApiKey("Safe Browsing"))?;

        let endpoint = format!("{}/v4/threatMatches:find", self.safe_browsing_base);
        let body = serde_json::json!({
            "client": {
                "clientId": "trawl",
                "clientVersion": env!("CARGO_PKG_VERSION"),
            },
            "threatInfo": {
                "threatTypes": [
                    "MALWARE",
                    "SOCIAL_ENGINEERING",
                    "UNWANTED_SOFTWARE",
                    "POTENTIALLY_HARMFUL_APPLICATION"
                ],
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{ "url": url }],
            }
        });

        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProbeError::UnexpectedStatus {
                service: "Safe Browsing",
                status: response.status().as_u16(),
            });
        }

        let parsed: SbResponse = response.json().await?;
        let first = parsed.matches.first();

        Ok(SafeBrowsingVerdict {
            is_threat: !parsed.matches.is_empty(),
            threat_type: first.and_then(|m| m.threat_type.clone()),
            platform_type: first.and_then(|m| m.platform_type.clone()),
            matches: parsed.matches.len(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct VtUrlResponse {
    data: VtData,
}

#[derive(Debug, Deserialize)]
struct VtData {
    attributes: VtAttributes,
}

#[derive(Debug, Deserialize)]
struct VtAttributes {
    last_analysis_stats: VtStats,
    #[serde(default)]
    reputation: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VtStats {
    malicious: u32,
    suspicious: u32,
    harmless: u32,
    undetected: u32,
    timeout: u32,
}

#[derive(Debug, Default, Deserialize)]
struct SbResponse {
    #[serde(default)]
    matches: Vec<SbMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SbMatch {
    threat_type: Option<String>,
    platform_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, path_regex, query_param},
    };

    fn client_for(server: &MockServer) -> IntelClient {
        IntelClient::new(Client::new())
            .with_virustotal_base(server.uri())
            .with_safe_browsing_base(server.uri())
    }

    #[tokio::test]
    async fn test_unconfigured_client_reports_nothing() {
        let client = IntelClient::new(Client::new());
        assert!(!client.is_configured());

        let report = client.check_url("https://example.com").await.unwrap();
        assert!(!report.is_malicious);
        assert_eq!(report.confidence, 0);
        assert!(report.sources.virus_total.is_none());
        assert!(report.sources.safe_browsing.is_none());
    }

    #[tokio::test]
    async fn test_virustotal_detection() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/api/v3/urls/[A-Za-z0-9_-]+$"))
            .and(header("x-apikey", "vt-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "attributes": {
                    "last_analysis_stats": {
                        "malicious": 7, "suspicious": 1, "harmless": 60,
                        "undetected": 20, "timeout": 2
                    },
                    "reputation": -40
                }}
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).with_virustotal_key(Some("vt-key".to_string()));
        let report = client.check_url("http://paypa1-secure.tk/verify").await.unwrap();

        assert!(report.is_malicious);
        assert_eq!(report.confidence, 85);
        assert_eq!(report.detections, vec!["VirusTotal: 7/90 engines detected threats"]);
        match report.sources.virus_total {
            Some(SourceOutcome::Ok(stats)) => {
                assert_eq!(stats.total, 90);
                assert_eq!(stats.reputation, Some(-40));
            }
            other => panic!("unexpected VirusTotal outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_virustotal_unknown_url_is_submitted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/api/v3/urls/.+$"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/v3/urls"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).with_virustotal_key(Some("vt-key".to_string()));
        let stats = client.check_virustotal("https://new.example.com").await.unwrap();

        assert_eq!(stats.malicious, 0);
        assert_eq!(stats.status.as_deref(), Some("submitted_for_analysis"));
    }

    #[tokio::test]
    async fn test_safe_browsing_threat() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v4/threatMatches:find"))
            .and(query_param("key", "sb-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "matches": [{
                    "threatType": "SOCIAL_ENGINEERING",
                    "platformType": "ANY_PLATFORM"
                }]
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).with_safe_browsing_key(Some("sb-key".to_string()));
        let report = client.check_url("http://phish.example.tk").await.unwrap();

        assert!(report.is_malicious);
        assert_eq!(report.confidence, 90);
        assert_eq!(report.detections, vec!["Safe Browsing: SOCIAL_ENGINEERING"]);
    }

    #[tokio::test]
    async fn test_safe_browsing_empty_body_is_clean() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v4/threatMatches:find"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).with_safe_browsing_key(Some("sb-key".to_string()));
        let verdict = client.check_safe_browsing("https://example.com").await.unwrap();

        assert!(!verdict.is_threat);
        assert_eq!(verdict.matches, 0);
    }

    #[tokio::test]
    async fn test_one_failed_source_is_isolated() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/api/v3/urls/.+$"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v4/threatMatches:find"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server)
            .with_virustotal_key(Some("vt-key".to_string()))
            .with_safe_browsing_key(Some("sb-key".to_string()));
        let report = client.check_url("https://example.com").await.unwrap();

        assert!(!report.is_malicious);
        assert!(matches!(
            report.sources.virus_total,
            Some(SourceOutcome::Failed { .. })
        ));
        assert!(matches!(
            report.sources.safe_browsing,
            Some(SourceOutcome::Ok(_))
        ));
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_an_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server)
            .with_virustotal_key(Some("vt-key".to_string()))
            .with_safe_browsing_key(Some("sb-key".to_string()));

        assert!(client.check_url("https://example.com").await.is_err());
    }

    #[test]
    fn test_blank_keys_are_ignored() {
        let client = IntelClient::new(Client::new())
            .with_virustotal_key(Some("  ".to_string()))
            .with_safe_browsing_key(None);
        assert!(!client.is_configured());
    }
}
