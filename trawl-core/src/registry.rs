// Official-domain reference data

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

use crate::checkers::{CheckResult, DomainRegistry};
use crate::error::{Result, TrawlError};
use crate::model::{Entity, MatchKind, OfficialDomain, RegistryLookup};

pub const EXACT_MATCH_CONFIDENCE: u8 = 95;
pub const SUBDOMAIN_MATCH_CONFIDENCE: u8 = 90;

// (id, name, category, website, country)
const BUILTIN_ENTITIES: &[(&str, &str, &str, Option<&str>, Option<&str>)] = &[
    ("1", "Banco Galicia", "banking", Some("https://bancogalicia.com.ar"), Some("AR")),
    ("2", "BBVA Argentina", "banking", Some("https://bbva.com.ar"), Some("AR")),
    ("3", "Mercado Pago", "fintech", Some("https://mercadopago.com.ar"), Some("AR")),
    ("4", "Ualá", "fintech", Some("https://uala.com.ar"), Some("AR")),
    ("santander-ar", "Banco Santander", "banking", None, Some("AR")),
    ("banco-ciudad", "Banco Ciudad", "banking", None, Some("AR")),
    ("banco-nacion", "Banco Nación", "banking", None, Some("AR")),
    ("banco-macro", "Banco Macro", "banking", None, Some("AR")),
    ("hsbc-ar", "HSBC Argentina", "banking", None, Some("AR")),
    ("icbc-ar", "ICBC Argentina", "banking", None, Some("AR")),
    ("bank-of-america", "Bank of America", "banking", None, None),
    ("chase", "Chase Bank", "banking", None, None),
    ("wells-fargo", "Wells Fargo", "banking", None, None),
    ("citibank", "Citibank", "banking", None, None),
    ("paypal", "PayPal", "payment", None, None),
    ("stripe", "Stripe", "payment", None, None),
    ("amazon", "Amazon", "ecommerce", None, None),
    ("ebay", "eBay", "ecommerce", None, None),
    ("mercado-libre", "Mercado Libre", "ecommerce", None, None),
    ("facebook", "Facebook", "social", None, None),
    ("instagram", "Instagram", "social", None, None),
    ("x", "X (Twitter)", "social", None, None),
    ("linkedin", "LinkedIn", "social", None, None),
    ("google", "Google", "tech", None, None),
    ("microsoft", "Microsoft", "tech", None, None),
    ("apple", "Apple", "tech", None, None),
    ("github", "GitHub", "tech", None, None),
    ("stack-overflow", "Stack Overflow", "tech", None, None),
    ("binance", "Binance", "crypto", None, None),
    ("coinbase", "Coinbase", "crypto", None, None),
    ("kraken", "Kraken", "crypto", None, None),
];

// (domain, entity id)
const BUILTIN_DOMAINS: &[(&str, &str)] = &[
    ("bancogalicia.com.ar", "1"),
    ("bancogalicia.com", "1"),
    ("bbva.com.ar", "2"),
    ("mercadopago.com.ar", "3"),
    ("mercadopago.com", "3"),
    ("uala.com.ar", "4"),
    ("santander.com.ar", "santander-ar"),
    ("bancociudad.com.ar", "banco-ciudad"),
    ("bna.com.ar", "banco-nacion"),
    ("macro.com.ar", "banco-macro"),
    ("hsbc.com.ar", "hsbc-ar"),
    ("icbc.com.ar", "icbc-ar"),
    ("bankofamerica.com", "bank-of-america"),
    ("chase.com", "chase"),
    ("wellsfargo.com", "wells-fargo"),
    ("citibank.com", "citibank"),
    ("paypal.com", "paypal"),
    ("stripe.com", "stripe"),
    ("amazon.com", "amazon"),
    ("ebay.com", "ebay"),
    ("mercadolibre.com", "mercado-libre"),
    ("mercadolibre.com.ar", "mercado-libre"),
    ("facebook.com", "facebook"),
    ("instagram.com", "instagram"),
    ("twitter.com", "x"),
    ("x.com", "x"),
    ("linkedin.com", "linkedin"),
    ("google.com", "google"),
    ("microsoft.com", "microsoft"),
    ("apple.com", "apple"),
    ("github.com", "github"),
    ("stackoverflow.com", "stack-overflow"),
    ("binance.com", "binance"),
    ("coinbase.com", "coinbase"),
    ("kraken.com", "kraken"),
];

/// Lowercase, trim and drop a leading `www.` and trailing dot.
pub fn normalize_domain(domain: &str) -> String {
    let lowered = domain.trim().trim_end_matches('.').to_lowercase();
    match lowered.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryFile {
    entities: Vec<Entity>,
    domains: Vec<DomainEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DomainEntry {
    domain: String,
    entity_id: String,
}

/// Read-only registry held in memory for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    domains: BTreeMap<String, String>,
    entities: HashMap<String, Entity>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in table of official domains.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        for (id, name, category, website, country) in BUILTIN_ENTITIES {
            registry.add_entity(Entity {
                id: id.to_string(),
                name: name.to_string(),
                category: category.to_string(),
                website: website.map(String::from),
                country: country.map(String::from),
                verified: true,
            });
        }

        for (domain, entity_id) in BUILTIN_DOMAINS {
            registry.add_domain(domain, entity_id);
        }

        registry
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_json::from_str(&content).map_err(|e| {
            TrawlError::Config(format!("invalid registry file {}: {}", path.display(), e))
        })?;

        let mut registry = Self::new();
        for entity in file.entities {
            registry.add_entity(entity);
        }
        for entry in file.domains {
            if !registry.entities.contains_key(&entry.entity_id) {
                return Err(TrawlError::Config(format!(
                    "registry domain {} references unknown entity {}",
                    entry.domain, entry.entity_id
                )));
            }
            registry.add_domain(&entry.domain, &entry.entity_id);
        }

        info!(
            "Loaded {} official domains from {}",
            registry.domain_count(),
            path.display()
        );

        Ok(registry)
    }

    pub fn add_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id.clone(), entity);
    }

    pub fn add_domain(&mut self, domain: &str, entity_id: &str) {
        self.domains
            .insert(normalize_domain(domain), entity_id.to_string());
    }

    pub fn domain_count(&self) -> usize {
        self.domains.len()
    }

    /// Synchronous lookup behind [`DomainRegistry::is_domain_official`].
    pub fn lookup(&self, domain: &str) -> RegistryLookup {
        let normalized = normalize_domain(domain);
        if normalized.is_empty() {
            return RegistryLookup::not_official();
        }

        if let Some(entity_id) = self.domains.get(&normalized) {
            return self.official(entity_id, MatchKind::Exact, EXACT_MATCH_CONFIDENCE);
        }

        // Longest registered suffix wins when several entries match.
        let parent = self
            .domains
            .iter()
            .filter(|(base, _)| {
                normalized.len() > base.len()
                    && normalized.ends_with(base.as_str())
                    && normalized.as_bytes()[normalized.len() - base.len() - 1] == b'.'
            })
            .max_by_key(|(base, _)| base.len());

        match parent {
            Some((base, entity_id)) => {
                debug!("{} is a subdomain of {}", normalized, base);
                self.official(entity_id, MatchKind::Subdomain, SUBDOMAIN_MATCH_CONFIDENCE)
            }
            None => RegistryLookup::not_official(),
        }
    }

    fn official(&self, entity_id: &str, match_kind: MatchKind, confidence: u8) -> RegistryLookup {
        let entity = self.entities.get(entity_id);
        RegistryLookup {
            is_official: true,
            match_kind,
            entity_id: Some(entity_id.to_string()),
            confidence,
            category: entity.map(|e| e.category.clone()),
            entity: entity.map(|e| e.name.clone()),
        }
    }
}

#[async_trait]
impl DomainRegistry for StaticRegistry {
    async fn is_domain_official(&self, domain: &str) -> CheckResult<RegistryLookup> {
        Ok(self.lookup(domain))
    }

    async fn entity_info(&self, entity_id: &str) -> CheckResult<Option<Entity>> {
        Ok(self.entities.get(entity_id).cloned())
    }

    fn official_domains(&self) -> Vec<String> {
        self.domains.keys().cloned().collect()
    }

    fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    fn domain_table(&self) -> Vec<OfficialDomain> {
        self.domains
            .iter()
            .map(|(domain, entity_id)| {
                let entity = self.entities.get(entity_id);
                OfficialDomain {
                    domain: domain.clone(),
                    entity_id: entity_id.clone(),
                    entity_name: entity.map(|e| e.name.clone()),
                    category: entity.map(|e| e.category.clone()),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(normalize_domain("WWW.BBVA.com.ar"), "bbva.com.ar");
        assert_eq!(normalize_domain(" paypal.com. "), "paypal.com");
        assert_eq!(normalize_domain("wwwexample.com"), "wwwexample.com");
    }

    #[test]
    fn test_exact_and_subdomain_confidence() {
        let registry = StaticRegistry::builtin();

        let exact = registry.lookup("www.bancogalicia.com.ar");
        assert!(exact.is_official);
        assert_eq!(exact.match_kind, MatchKind::Exact);
        assert_eq!(exact.confidence, 95);
        assert_eq!(exact.entity_id.as_deref(), Some("1"));

        let sub = registry.lookup("onlinebanking.bancogalicia.com.ar");
        assert!(sub.is_official);
        assert_eq!(sub.match_kind, MatchKind::Subdomain);
        assert_eq!(sub.confidence, 90);
    }

    #[test]
    fn test_suffix_without_label_boundary_is_not_official() {
        let registry = StaticRegistry::builtin();
        assert!(!registry.lookup("evilbbva.com.ar").is_official);
        assert!(!registry.lookup("netflix.com").is_official);
        assert!(!registry.lookup("").is_official);
    }
}
