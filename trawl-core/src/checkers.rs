// Collaborator seams consumed by the aggregator

use async_trait::async_trait;
use trawl_probes::{IntelClient, IntelReport, SslProber, SslReport};

use crate::error::CheckerError;
use crate::model::{
    CommunityReport, Entity, OfficialDomain, RegistryLookup, ReportCategory, ReportStats,
    ReportStatus,
};

pub type CheckResult<T> = std::result::Result<T, CheckerError>;

/// Reference table of official domains.
#[async_trait]
pub trait DomainRegistry: Send + Sync {
    async fn is_domain_official(&self, domain: &str) -> CheckResult<RegistryLookup>;

    async fn entity_info(&self, entity_id: &str) -> CheckResult<Option<Entity>>;

    /// Every official domain, used for typosquatting comparisons.
    fn official_domains(&self) -> Vec<String>;

    /// Registered entities ordered by id.
    fn entities(&self) -> Vec<Entity>;

    /// Official domains with their owning entity, ordered by domain.
    fn domain_table(&self) -> Vec<OfficialDomain>;
}

/// Community phishing reports keyed by normalized URL.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn check_phishing_reports(&self, url: &str) -> CheckResult<ReportStatus>;

    async fn submit_report(
        &self,
        url: &str,
        description: &str,
        category: ReportCategory,
    ) -> CheckResult<CommunityReport>;

    async fn recent_reports(&self, limit: usize) -> CheckResult<Vec<CommunityReport>>;

    async fn report_stats(&self) -> CheckResult<ReportStats>;
}

#[async_trait]
pub trait ThreatIntel: Send + Sync {
    async fn check_url(&self, url: &str) -> CheckResult<IntelReport>;
}

#[async_trait]
pub trait SslProbe: Send + Sync {
    async fn check_ssl(&self, domain: &str) -> CheckResult<SslReport>;
}

#[async_trait]
impl ThreatIntel for IntelClient {
    async fn check_url(&self, url: &str) -> CheckResult<IntelReport> {
        IntelClient::check_url(self, url).await.map_err(CheckerError::from)
    }
}

#[async_trait]
impl SslProbe for SslProber {
    async fn check_ssl(&self, domain: &str) -> CheckResult<SslReport> {
        SslProber::check_ssl(self, domain)
            .await
            .map_err(CheckerError::from)
    }
}
