use url::{Host, Url};

use crate::error::{Result, TrawlError};

/// A URL accepted for evaluation, reduced to scheme, host and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Normalized form: no userinfo, query or fragment.
    pub url: String,
    /// Lowercased host without brackets.
    pub domain: String,
    /// The caller's input, trimmed and lowercased.
    pub raw: String,
    pub is_ip: bool,
}

impl Target {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TrawlError::InvalidUrl("URL is required".to_string()));
        }

        let mut parsed = Url::parse(trimmed)
            .map_err(|e| TrawlError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(TrawlError::InvalidUrl(format!(
                    "unsupported scheme '{}' (expected http or https)",
                    other
                )));
            }
        }

        let (domain, is_ip) = match parsed.host() {
            Some(Host::Domain(d)) if !d.trim_end_matches('.').is_empty() => {
                (canonical_host(d), false)
            }
            Some(Host::Ipv4(ip)) => (ip.to_string(), true),
            Some(Host::Ipv6(ip)) => (ip.to_string(), true),
            _ => {
                return Err(TrawlError::InvalidUrl(format!(
                    "{}: missing host",
                    trimmed
                )));
            }
        };

        if !is_ip && parsed.host_str() != Some(domain.as_str()) {
            parsed
                .set_host(Some(&domain))
                .map_err(|e| TrawlError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
        }

        // Only fails for cannot-be-a-base URLs, which http(s) never are.
        let _ = parsed.set_username("");
        let _ = parsed.set_password(None);
        parsed.set_query(None);
        parsed.set_fragment(None);

        Ok(Self {
            url: parsed.to_string(),
            domain,
            raw: trimmed.to_lowercase(),
            is_ip,
        })
    }
}

/// Lowercase a host and drop the single trailing dot of a fully-qualified name.
pub fn canonical_host(host: &str) -> String {
    let host = host.trim();
    host.strip_suffix('.').unwrap_or(host).to_lowercase()
}

/// Normalized key for a URL, as used by the community report store.
pub fn normalize_url(input: &str) -> Result<String> {
    Target::parse(input).map(|t| t.url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drops_query_fragment_and_userinfo() {
        let target = Target::parse("https://user:pw@Example.COM/Login?next=/a#top").unwrap();
        assert_eq!(target.url, "https://example.com/Login");
        assert_eq!(target.domain, "example.com");
        assert!(target.raw.contains('@'));
        assert!(!target.is_ip);
    }

    #[test]
    fn test_trailing_dot_is_dropped() {
        let target = Target::parse("http://Free-Offer.TK./verify").unwrap();
        assert_eq!(target.domain, "free-offer.tk");
        assert_eq!(target.url, "http://free-offer.tk/verify");
        assert_eq!(
            normalize_url("http://free-offer.tk./verify").unwrap(),
            normalize_url("http://free-offer.tk/verify").unwrap()
        );
        assert_eq!(canonical_host("bbva.com.ar."), "bbva.com.ar");
    }

    #[test]
    fn test_ip_hosts() {
        let v4 = Target::parse("http://192.168.1.10/admin").unwrap();
        assert!(v4.is_ip);
        assert_eq!(v4.domain, "192.168.1.10");

        let v6 = Target::parse("http://[::1]:8080/").unwrap();
        assert!(v6.is_ip);
        assert_eq!(v6.domain, "::1");
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Target::parse("").is_err());
        assert!(Target::parse("not a url").is_err());
        assert!(Target::parse("ftp://example.com/file").is_err());
        assert!(Target::parse("bancogalicia.com.ar").is_err());
    }
}
