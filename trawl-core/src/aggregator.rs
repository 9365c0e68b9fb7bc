// Multi-source verdict aggregation

use chrono::Utc;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use trawl_probes::{IntelClient, IntelReport, SslProber, SslReport};

use crate::checkers::{CheckResult, DomainRegistry, ReportStore, SslProbe, ThreatIntel};
use crate::config::Config;
use crate::error::{CheckerError, Result, TrawlError};
use crate::heuristics::HeuristicEngine;
use crate::model::{
    BatchEntry, BatchReport, BatchStatus, CheckLevel, CheckerDetails, CheckerKind,
    CheckerResult, CommunityReport, DomainCheck, DomainSearchHit, Entity, HeuristicAnalysis,
    OfficialDomain, Pagination, RegistryLookup, RegistryStats, ReportCategory, ReportStats, ReportStatus,
    SearchMatch, Signal, SimilarDomains, UserExplanation, Verdict, VerdictReport,
};
use crate::registry::{StaticRegistry, normalize_domain};
use crate::reports::{MemoryReportStore, check_description};
use crate::similarity::find_similar_domains;
use crate::target::Target;

pub const DEFAULT_CHECKER_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_BATCH_SIZE: usize = 10;
pub const MIN_SIMILAR_INPUT_LEN: usize = 3;
pub const MIN_SEARCH_LEN: usize = 2;
pub const MAX_LIST_LIMIT: usize = 100;
pub const MAX_SEARCH_LIMIT: usize = 50;

const BLACKLIST_CONFIDENCE: u8 = 90;
const REPORTED_CONFIDENCE: u8 = 70;
const INTEL_FALLBACK_CONFIDENCE: u8 = 80;
const SUSPICIOUS_BELOW: u8 = 50;

pub const REC_SAFE: &str = "This site is verified as official. Safe to proceed.";
pub const REC_NOT_VERIFIED: &str =
    "This site is not in our verified database. Exercise caution.";
pub const REC_VERIFY_MANUALLY: &str =
    "Verify the URL manually before entering sensitive information.";
pub const REC_CHECK_TYPOS: &str = "Check for typos in the domain name.";
pub const REC_SUSPICIOUS: &str = "Multiple indicators suggest this site may not be legitimate.";
pub const REC_SUSPICIOUS_CREDENTIALS: &str =
    "Do not enter credentials until you have confirmed the site through an official channel.";
pub const REC_DANGEROUS: &str =
    "Do not enter any personal or financial information on this site.";

/// How later danger signals interact with a registry match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub registry_is_final: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            registry_is_final: true,
        }
    }
}

/// Raw per-checker outcomes of one evaluation. `None` means the checker did
/// not run at the requested level.
#[derive(Debug, Clone)]
pub struct CheckerOutcomes {
    pub registry: CheckResult<RegistryLookup>,
    pub reports: CheckResult<ReportStatus>,
    pub intel: Option<CheckResult<IntelReport>>,
    pub heuristics: Option<CheckResult<HeuristicAnalysis>>,
    pub ssl: Option<CheckResult<SslReport>>,
}

impl CheckerOutcomes {
    /// Outcomes of a basic-level run.
    pub fn basic(registry: CheckResult<RegistryLookup>, reports: CheckResult<ReportStatus>) -> Self {
        Self {
            registry,
            reports,
            intel: None,
            heuristics: None,
            ssl: None,
        }
    }

    /// Per-checker results keyed by their wire name.
    pub fn tentacles(&self) -> BTreeMap<String, CheckerResult> {
        let mut map = BTreeMap::new();

        let mut put = |result: CheckerResult| {
            map.insert(result.checker_name.clone(), result);
        };

        put(registry_result(&self.registry));
        put(reports_result(&self.reports));
        if let Some(ref intel) = self.intel {
            put(intel_result(intel));
        }
        if let Some(ref heuristics) = self.heuristics {
            put(heuristics_result(heuristics));
        }
        if let Some(ref ssl) = self.ssl {
            put(ssl_result(ssl));
        }

        map
    }
}

fn registry_result(outcome: &CheckResult<RegistryLookup>) -> CheckerResult {
    match outcome {
        Ok(lookup) => {
            let signals = match (lookup.is_official, &lookup.entity) {
                (true, entity) => vec![Signal::new(
                    "official_domain",
                    1.0,
                    format!(
                        "{:?} match for {}",
                        lookup.match_kind,
                        entity.as_deref().unwrap_or("a registered entity")
                    ),
                )],
                (false, _) => Vec::new(),
            };
            CheckerResult::completed(
                CheckerKind::Registry,
                lookup.confidence,
                CheckerDetails::Registry(lookup.clone()),
            )
            .with_signals(signals)
        }
        Err(e) => CheckerResult::failed(CheckerKind::Registry, e),
    }
}

fn reports_result(outcome: &CheckResult<ReportStatus>) -> CheckerResult {
    match outcome {
        Ok(status) => {
            let confidence = if status.is_blacklisted {
                BLACKLIST_CONFIDENCE
            } else if status.is_reported {
                REPORTED_CONFIDENCE
            } else {
                0
            };
            let signals = if status.is_reported {
                vec![Signal::new(
                    "community_report",
                    f64::from(confidence) / 100.0,
                    format!("{} community report(s)", status.report_count),
                )]
            } else {
                Vec::new()
            };
            CheckerResult::completed(
                CheckerKind::CommunityReports,
                confidence,
                CheckerDetails::Reports(*status),
            )
            .with_signals(signals)
        }
        Err(e) => CheckerResult::failed(CheckerKind::CommunityReports, e),
    }
}

fn intel_result(outcome: &CheckResult<IntelReport>) -> CheckerResult {
    match outcome {
        Ok(report) => {
            let signals = report
                .detections
                .iter()
                .map(|d| Signal::new("threat_intel", f64::from(report.confidence) / 100.0, d))
                .collect();
            CheckerResult::completed(
                CheckerKind::ThreatIntel,
                report.confidence,
                CheckerDetails::Intel(report.clone()),
            )
            .with_signals(signals)
        }
        Err(e) => CheckerResult::failed(CheckerKind::ThreatIntel, e),
    }
}

fn heuristics_result(outcome: &CheckResult<HeuristicAnalysis>) -> CheckerResult {
    match outcome {
        Ok(analysis) => CheckerResult::completed(
            CheckerKind::Heuristics,
            analysis.confidence,
            CheckerDetails::Heuristics(analysis.clone()),
        )
        .with_signals(analysis.flags.clone()),
        Err(e) => CheckerResult::failed(CheckerKind::Heuristics, e),
    }
}

fn ssl_result(outcome: &CheckResult<SslReport>) -> CheckerResult {
    match outcome {
        Ok(report) => {
            let signals = report
                .issues
                .iter()
                .map(|issue| Signal::new("ssl_issue", 0.0, issue))
                .collect();
            CheckerResult::completed(CheckerKind::Ssl, 0, CheckerDetails::Ssl(report.clone()))
                .with_signals(signals)
        }
        Err(e) => CheckerResult::failed(CheckerKind::Ssl, e),
    }
}

/// Running state of the verdict fold.
///
/// Checkers are applied in a fixed order; the order only affects the order of
/// warnings, except when the registry-final policy is disabled.
#[derive(Debug, Clone)]
pub struct Fold {
    pub verdict: Verdict,
    pub confidence: u8,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub explanation: Option<UserExplanation>,
    policy: Policy,
    registry_locked: bool,
}

/// Final result of folding checker outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct FoldedVerdict {
    pub verdict: Verdict,
    pub confidence: u8,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub explanation: Option<UserExplanation>,
}

impl Fold {
    pub fn new(policy: Policy) -> Self {
        Self {
            verdict: Verdict::Unknown,
            confidence: 0,
            warnings: Vec::new(),
            recommendations: Vec::new(),
            explanation: None,
            policy,
            registry_locked: false,
        }
    }

    /// Raise the verdict to DANGEROUS unless a final registry match holds it.
    fn flag_danger(&mut self, source: &str, confidence: u8) {
        if self.registry_locked {
            self.warnings.push(format!(
                "{} flagged this domain despite its registry match",
                source
            ));
        } else {
            self.verdict = Verdict::Dangerous;
            self.confidence = self.confidence.max(confidence);
        }
    }

    pub fn apply_registry(&mut self, lookup: &RegistryLookup) {
        if lookup.is_official {
            self.verdict = Verdict::Safe;
            self.confidence = self.confidence.max(lookup.confidence);
            self.registry_locked = self.policy.registry_is_final;
        }
    }

    pub fn apply_reports(&mut self, status: &ReportStatus) {
        if status.is_blacklisted {
            self.flag_danger("Community reports", BLACKLIST_CONFIDENCE);
            self.warnings
                .push("This URL has been reported multiple times for phishing".to_string());
        } else if status.is_reported {
            self.warnings.push(format!(
                "This URL has {} community report(s)",
                status.report_count
            ));
        }
    }

    pub fn apply_intel(&mut self, report: &IntelReport) {
        if report.is_malicious {
            let confidence = match report.confidence {
                0 => INTEL_FALLBACK_CONFIDENCE,
                c => c,
            };
            self.flag_danger("External threat intelligence", confidence);
            self.warnings
                .push("Detected as malicious by external threat intelligence".to_string());
            self.warnings.extend(report.detections.iter().cloned());
        }
    }

    pub fn apply_heuristics(&mut self, analysis: &HeuristicAnalysis) {
        if analysis.is_phishing {
            self.flag_danger("Heuristic scan", analysis.confidence);
            self.warnings.extend(analysis.explanations.iter().cloned());
            if !self.registry_locked {
                self.explanation = analysis.user_explanation.clone();
            }
        } else if !analysis.flags.is_empty() {
            self.warnings.push(format!(
                "Heuristic scan found {} potential risk indicators",
                analysis.flags.len()
            ));
        }
    }

    pub fn apply_ssl(&mut self, report: &SslReport) {
        if report.has_issues {
            self.warnings.extend(report.issues.iter().cloned());
        }
    }

    pub fn finish(mut self) -> FoldedVerdict {
        self.confidence = self.confidence.min(100);

        if self.verdict == Verdict::Unknown {
            if self.confidence == 0 {
                self.verdict = Verdict::Unverified;
                self.recommendations.push(REC_NOT_VERIFIED.to_string());
            } else if self.confidence < SUSPICIOUS_BELOW {
                self.verdict = Verdict::Suspicious;
                self.recommendations.push(REC_SUSPICIOUS.to_string());
            } else {
                warn!(
                    "Aggregation reached confidence {} without a verdict; reporting UNVERIFIED",
                    self.confidence
                );
                self.verdict = Verdict::Unverified;
                self.confidence = 0;
                self.recommendations.push(REC_NOT_VERIFIED.to_string());
            }
        }

        match self.verdict {
            Verdict::Safe => self.recommendations.push(REC_SAFE.to_string()),
            Verdict::Unverified => {
                self.recommendations.push(REC_VERIFY_MANUALLY.to_string());
                self.recommendations.push(REC_CHECK_TYPOS.to_string());
            }
            Verdict::Suspicious => self
                .recommendations
                .push(REC_SUSPICIOUS_CREDENTIALS.to_string()),
            Verdict::Dangerous => self.recommendations.push(REC_DANGEROUS.to_string()),
            Verdict::Unknown => {}
        }

        FoldedVerdict {
            verdict: self.verdict,
            confidence: self.confidence,
            warnings: self.warnings,
            recommendations: self.recommendations,
            explanation: self.explanation,
        }
    }
}

/// Fold checker outcomes into one verdict. Failed checkers contribute nothing.
pub fn fold_verdict(outcomes: &CheckerOutcomes, policy: Policy) -> FoldedVerdict {
    let mut fold = Fold::new(policy);

    if let Ok(lookup) = &outcomes.registry {
        fold.apply_registry(lookup);
    }
    if let Ok(status) = &outcomes.reports {
        fold.apply_reports(status);
    }
    if let Some(Ok(report)) = &outcomes.intel {
        fold.apply_intel(report);
    }
    if let Some(Ok(analysis)) = &outcomes.heuristics {
        fold.apply_heuristics(analysis);
    }
    if let Some(Ok(report)) = &outcomes.ssl {
        fold.apply_ssl(report);
    }

    fold.finish()
}

/// Orchestrates the checkers for every operation of the service.
pub struct Aggregator {
    registry: Arc<dyn DomainRegistry>,
    reports: Arc<dyn ReportStore>,
    threat_intel: Option<Arc<dyn ThreatIntel>>,
    ssl_probe: Option<Arc<dyn SslProbe>>,
    heuristics: HeuristicEngine,
    timeout: Duration,
    policy: Policy,
}

impl Aggregator {
    pub fn new(registry: Arc<dyn DomainRegistry>, reports: Arc<dyn ReportStore>) -> Self {
        Self {
            registry,
            reports,
            threat_intel: None,
            ssl_probe: None,
            heuristics: HeuristicEngine::new(),
            timeout: DEFAULT_CHECKER_TIMEOUT,
            policy: Policy::default(),
        }
    }

    /// Wire up the built-in collaborators described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry: Arc<dyn DomainRegistry> = match config.registry.resolved_path() {
            Some(path) => Arc::new(StaticRegistry::from_json_file(&path)?),
            None => Arc::new(StaticRegistry::builtin()),
        };
        let reports = Arc::new(MemoryReportStore::with_threshold(
            config.reports.blacklist_threshold,
        ));

        let client =
            trawl_probes::build_client(config.checkers.timeout_secs, &config.checkers.user_agent)
                .map_err(|e| TrawlError::Config(format!("HTTP client: {}", e)))?;

        let intel = IntelClient::new(client.clone())
            .with_virustotal_key(config.intel.virustotal_api_key.clone())
            .with_safe_browsing_key(config.intel.safe_browsing_api_key.clone());

        let mut aggregator = Self::new(registry, reports)
            .with_ssl_probe(Arc::new(SslProber::with_client(client)))
            .with_timeout(Duration::from_secs(config.checkers.timeout_secs))
            .with_policy(Policy {
                registry_is_final: config.policy.registry_is_final,
            });

        if intel.is_configured() {
            aggregator = aggregator.with_threat_intel(Arc::new(intel));
        } else {
            debug!("No threat intelligence keys configured");
        }
        Ok(aggregator)
    }

    pub fn with_threat_intel(mut self, intel: Arc<dyn ThreatIntel>) -> Self {
        self.threat_intel = Some(intel);
        self
    }

    pub fn with_ssl_probe(mut self, probe: Arc<dyn SslProbe>) -> Self {
        self.ssl_probe = Some(probe);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Run one checker call under the per-call timeout.
    async fn guarded<T, F>(&self, kind: CheckerKind, call: F) -> CheckResult<T>
    where
        F: Future<Output = CheckResult<T>>,
    {
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(CheckerError::Timeout(self.timeout)),
        };

        if let Err(ref e) = outcome {
            warn!("{} checker failed: {}", kind, e);
        }
        outcome
    }

    async fn run_intel(&self, url: &str) -> CheckResult<IntelReport> {
        match self.threat_intel {
            Some(ref intel) => intel.check_url(url).await,
            None => Err(CheckerError::Unavailable(
                "no threat intelligence source configured".to_string(),
            )),
        }
    }

    async fn run_ssl(&self, domain: &str) -> CheckResult<SslReport> {
        match self.ssl_probe {
            Some(ref probe) => probe.check_ssl(domain).await,
            None => Err(CheckerError::Unavailable(
                "no SSL probe configured".to_string(),
            )),
        }
    }

    /// Evaluate a URL with every checker the level calls for.
    pub async fn evaluate(&self, url: &str, level: CheckLevel) -> Result<VerdictReport> {
        let start = Instant::now();
        let target = Target::parse(url)?;

        info!("Evaluating {} ({} check)", target.url, level);

        let (registry, reports, intel, heuristics, ssl) = tokio::join!(
            self.guarded(
                CheckerKind::Registry,
                self.registry.is_domain_official(&target.domain)
            ),
            self.guarded(
                CheckerKind::CommunityReports,
                self.reports.check_phishing_reports(&target.url)
            ),
            async {
                if CheckerKind::ThreatIntel.runs_at(level) {
                    Some(
                        self.guarded(CheckerKind::ThreatIntel, self.run_intel(&target.url))
                            .await,
                    )
                } else {
                    None
                }
            },
            async {
                if CheckerKind::Heuristics.runs_at(level) {
                    let engine = &self.heuristics;
                    let target = &target;
                    Some(
                        self.guarded(CheckerKind::Heuristics, async move {
                            Ok(engine.analyze(target))
                        })
                        .await,
                    )
                } else {
                    None
                }
            },
            async {
                if CheckerKind::Ssl.runs_at(level) {
                    Some(
                        self.guarded(CheckerKind::Ssl, self.run_ssl(&target.domain))
                            .await,
                    )
                } else {
                    None
                }
            },
        );

        let outcomes = CheckerOutcomes {
            registry,
            reports,
            intel,
            heuristics,
            ssl,
        };

        let folded = fold_verdict(&outcomes, self.policy);
        let processing_time_ms = start.elapsed().as_millis() as u64;

        info!(
            "Verdict for {}: {} ({}%) in {}ms",
            target.domain, folded.verdict, folded.confidence, processing_time_ms
        );

        Ok(VerdictReport {
            url: target.url,
            domain: target.domain,
            timestamp: Utc::now(),
            check_level: level,
            tentacles: outcomes.tentacles(),
            verdict: folded.verdict,
            confidence: folded.confidence,
            warnings: folded.warnings,
            recommendations: folded.recommendations,
            explanation: folded.explanation,
            processing_time_ms,
        })
    }

    /// Registry-only lookup of a bare domain.
    pub async fn check_domain(&self, domain: &str) -> Result<DomainCheck> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Err(TrawlError::InvalidInput("domain is required".to_string()));
        }

        let lookup = self
            .guarded(
                CheckerKind::Registry,
                self.registry.is_domain_official(&domain),
            )
            .await?;

        let entity = match (lookup.is_official, lookup.entity_id.as_deref()) {
            (true, Some(id)) => self.registry.entity_info(id).await?,
            _ => None,
        };

        Ok(DomainCheck {
            domain,
            is_official: lookup.is_official,
            entity,
            timestamp: Utc::now(),
        })
    }

    /// Registry-only lookup of up to [`MAX_BATCH_SIZE`] domains, in input order.
    pub async fn check_domains(&self, domains: &[String]) -> Result<BatchReport> {
        if domains.is_empty() || domains.len() > MAX_BATCH_SIZE {
            return Err(TrawlError::InvalidInput(format!(
                "between 1 and {} domains are required",
                MAX_BATCH_SIZE
            )));
        }

        let results: Vec<BatchEntry> = join_all(domains.iter().map(|domain| async move {
            match self.check_domain(domain).await {
                Ok(check) => BatchEntry {
                    domain: domain.clone(),
                    status: BatchStatus::Success,
                    is_official: Some(check.is_official),
                    entity: check.entity,
                    error: None,
                },
                Err(e) => BatchEntry {
                    domain: domain.clone(),
                    status: BatchStatus::Error,
                    is_official: None,
                    entity: None,
                    error: Some(e.to_string()),
                },
            }
        }))
        .await;

        let processed = results.len();
        debug!("Batch of {} domain(s) checked", processed);

        Ok(BatchReport {
            results,
            timestamp: Utc::now(),
            processed,
        })
    }

    /// Official domains that look like `domain` (possible typosquatting).
    pub fn find_similar(&self, domain: &str) -> Result<SimilarDomains> {
        let input = domain.trim();
        if input.chars().count() < MIN_SIMILAR_INPUT_LEN {
            return Err(TrawlError::InvalidInput(format!(
                "domain must be at least {} characters",
                MIN_SIMILAR_INPUT_LEN
            )));
        }

        let (similar_domains, count) =
            find_similar_domains(input, self.registry.official_domains());

        Ok(SimilarDomains {
            input_domain: input.to_string(),
            similar_domains,
            count,
            timestamp: Utc::now(),
        })
    }

    pub async fn submit_report(
        &self,
        url: &str,
        description: &str,
        category: ReportCategory,
    ) -> Result<CommunityReport> {
        let target = Target::parse(url)?;
        let description = check_description(description).map_err(TrawlError::InvalidInput)?;

        Ok(self
            .reports
            .submit_report(&target.url, description, category)
            .await?)
    }

    pub async fn recent_reports(&self, limit: usize) -> Result<Vec<CommunityReport>> {
        Ok(self.reports.recent_reports(limit).await?)
    }

    pub async fn report_stats(&self) -> Result<ReportStats> {
        Ok(self.reports.report_stats().await?)
    }

    pub fn registry_stats(&self) -> RegistryStats {
        let entities = self.registry.entities();
        let domains = self.registry.domain_table();

        let mut entities_by_country = BTreeMap::new();
        for entity in &entities {
            let country = entity.country.clone().unwrap_or_else(|| "unknown".to_string());
            *entities_by_country.entry(country).or_insert(0) += 1;
        }
        let mut domains_by_category = BTreeMap::new();
        for domain in &domains {
            let category = domain.category.clone().unwrap_or_else(|| "unknown".to_string());
            *domains_by_category.entry(category).or_insert(0) += 1;
        }

        RegistryStats {
            entities: entities.len(),
            domains: domains.len(),
            entities_by_country,
            domains_by_category,
        }
    }

    /// Registered entities, optionally restricted to a two-letter country code.
    pub fn list_entities(
        &self,
        country: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Entity>, Pagination)> {
        check_limit(limit, MAX_LIST_LIMIT)?;
        let country = match country.map(str::trim) {
            Some(code) if code.chars().count() == 2 => Some(code.to_uppercase()),
            Some(code) => {
                return Err(TrawlError::InvalidInput(format!(
                    "country must be a 2-letter code, got '{}'",
                    code
                )));
            }
            None => None,
        };

        let entities: Vec<Entity> = self
            .registry
            .entities()
            .into_iter()
            .filter(|e| match country {
                Some(ref code) => e.country.as_deref() == Some(code.as_str()),
                None => true,
            })
            .collect();

        Ok(Pagination::apply(entities, limit, offset))
    }

    pub async fn entity(&self, entity_id: &str) -> Result<Option<Entity>> {
        Ok(self
            .guarded(CheckerKind::Registry, self.registry.entity_info(entity_id))
            .await?)
    }

    /// Official domains of one entity, `None` when it has none registered.
    pub fn entity_domains(&self, entity_id: &str) -> Option<Vec<OfficialDomain>> {
        let domains: Vec<OfficialDomain> = self
            .registry
            .domain_table()
            .into_iter()
            .filter(|d| d.entity_id == entity_id)
            .collect();

        if domains.is_empty() { None } else { Some(domains) }
    }

    /// Entities whose name contains `query`, case-insensitively.
    pub fn search_entities(&self, query: &str, limit: usize) -> Result<Vec<Entity>> {
        let needle = search_needle(query)?;
        check_limit(limit, MAX_SEARCH_LIMIT)?;

        Ok(self
            .registry
            .entities()
            .into_iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .take(limit)
            .collect())
    }

    pub fn list_domains(
        &self,
        entity_id: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<OfficialDomain>, Pagination)> {
        check_limit(limit, MAX_LIST_LIMIT)?;
        let domains: Vec<OfficialDomain> = self
            .registry
            .domain_table()
            .into_iter()
            .filter(|d| entity_id.is_none_or(|id| d.entity_id == id))
            .collect();

        Ok(Pagination::apply(domains, limit, offset))
    }

    /// Official domains containing `query`. Prefix matches come first.
    pub fn search_domains(&self, query: &str, limit: usize) -> Result<Vec<DomainSearchHit>> {
        let needle = search_needle(query)?;
        check_limit(limit, MAX_SEARCH_LIMIT)?;

        let mut hits: Vec<DomainSearchHit> = self
            .registry
            .domain_table()
            .into_iter()
            .filter(|d| d.domain.contains(&needle))
            .map(|d| DomainSearchHit {
                match_type: if d.domain.starts_with(&needle) {
                    SearchMatch::Prefix
                } else {
                    SearchMatch::Contains
                },
                domain: d.domain,
                entity_id: d.entity_id,
                is_official: true,
            })
            .collect();

        hits.sort_by_key(|h| h.match_type != SearchMatch::Prefix);
        hits.truncate(limit);
        Ok(hits)
    }
}

fn check_limit(limit: usize, max: usize) -> Result<()> {
    if (1..=max).contains(&limit) {
        Ok(())
    } else {
        Err(TrawlError::InvalidInput(format!(
            "limit must be between 1 and {}",
            max
        )))
    }
}

fn search_needle(query: &str) -> Result<String> {
    let needle = query.trim().to_lowercase();
    if needle.chars().count() < MIN_SEARCH_LEN {
        return Err(TrawlError::InvalidInput(format!(
            "query must be at least {} characters",
            MIN_SEARCH_LEN
        )));
    }
    Ok(needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_low_confidence_is_suspicious() {
        let mut fold = Fold::new(Policy::default());
        fold.confidence = 30;
        let folded = fold.finish();

        assert_eq!(folded.verdict, Verdict::Suspicious);
        assert_eq!(folded.confidence, 30);
        assert_eq!(
            folded.recommendations,
            vec![REC_SUSPICIOUS, REC_SUSPICIOUS_CREDENTIALS]
        );
    }

    #[test]
    fn test_finish_high_confidence_without_verdict_is_unverified() {
        let mut fold = Fold::new(Policy::default());
        fold.confidence = 70;
        let folded = fold.finish();

        assert_eq!(folded.verdict, Verdict::Unverified);
        assert_eq!(folded.confidence, 0);
    }

    #[test]
    fn test_finish_unverified_recommendations() {
        let folded = Fold::new(Policy::default()).finish();
        assert_eq!(folded.verdict, Verdict::Unverified);
        assert_eq!(
            folded.recommendations,
            vec![REC_NOT_VERIFIED, REC_VERIFY_MANUALLY, REC_CHECK_TYPOS]
        );
    }

    #[test]
    fn test_intel_without_confidence_falls_back_to_80() {
        let mut fold = Fold::new(Policy::default());
        fold.apply_intel(&IntelReport {
            is_malicious: true,
            ..Default::default()
        });
        let folded = fold.finish();

        assert_eq!(folded.verdict, Verdict::Dangerous);
        assert_eq!(folded.confidence, 80);
    }
}
