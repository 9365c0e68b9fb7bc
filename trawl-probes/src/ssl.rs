use crate::error::{ProbeError, Result};
use crate::result::SslReport;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, STRICT_TRANSPORT_SECURITY};
use scraper::{Html, Selector};
use std::net::Ipv6Addr;
use std::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Elements that pull a plain-HTTP resource into a page.
const INSECURE_RESOURCE_SELECTOR: &str = r#"script[src^="http://"], img[src^="http://"], iframe[src^="http://"], link[href^="http://"], form[action^="http://"]"#;

/// Probes a host over HTTPS and reports certificate and header problems.
///
/// Connection failures are not errors: they become issues on the report, the
/// same way a browser would show a warning page instead of crashing.
#[derive(Clone)]
pub struct SslProber {
    client: Client,
}

impl SslProber {
    pub fn new() -> Result<Self> {
        Self::with_timeout(10)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        Ok(Self::with_client(crate::build_client(
            timeout_secs,
            crate::DEFAULT_USER_AGENT,
        )?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Check `https://{domain}`.
    pub async fn check_ssl(&self, domain: &str) -> Result<SslReport> {
        let domain = domain.trim();
        if domain.is_empty() {
            return Err(ProbeError::InvalidUrl("empty domain".to_string()));
        }

        // IPv6 literals need brackets in a URL
        let host = match domain.parse::<Ipv6Addr>() {
            Ok(_) => format!("[{}]", domain),
            Err(_) => domain.to_string(),
        };
        self.inspect(&format!("https://{}", host)).await
    }

    /// Fetch `url` and inspect the response it ends up on after redirects.
    pub async fn inspect(&self, url: &str) -> Result<SslReport> {
        let parsed =
            Url::parse(url).map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", url, e)))?;
        let domain = parsed
            .host_str()
            .ok_or_else(|| ProbeError::InvalidUrl(format!("{}: missing host", url)))?
            .to_string();

        debug!("Probing {}", parsed);

        let mut report = SslReport::new(domain);
        let start = Instant::now();

        let response = match self.client.get(parsed).send().await {
            Ok(response) => response,
            Err(e) => {
                let (issue, reached_tls) = classify_failure(&e);
                warn!("Probe of {} failed: {}", url, e);
                report.has_ssl = reached_tls;
                report.push_issue(issue);
                return Ok(report);
            }
        };

        report.response_time = start.elapsed();
        report.has_ssl = response.url().scheme() == "https";
        report.status_code = Some(response.status().as_u16());
        report.is_valid = response.status().as_u16() < 400;

        if !report.has_ssl {
            report.push_issue("Site is not served over HTTPS");
        }

        if !response.headers().contains_key(STRICT_TRANSPORT_SECURITY) {
            report.push_issue("Missing HSTS header");
        }

        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        if report.has_ssl && is_html {
            match response.text().await {
                Ok(body) => {
                    let insecure = count_insecure_resources(&body)?;
                    if insecure > 0 {
                        report.push_issue(format!(
                            "Potential mixed content detected ({} insecure resource(s))",
                            insecure
                        ));
                    }
                }
                Err(e) => warn!("Could not read body of {}: {}", report.domain, e),
            }
        }

        info!(
            "Probed {} in {:?}: {} issue(s)",
            report.domain,
            report.response_time,
            report.issues.len()
        );

        Ok(report)
    }
}

/// Count elements that load their content over plain HTTP.
pub fn count_insecure_resources(html: &str) -> Result<usize> {
    let selector = Selector::parse(INSECURE_RESOURCE_SELECTOR)
        .map_err(|e| ProbeError::ParseError(format!("{:?}", e)))?;
    let document = Html::parse_document(html);
    Ok(document.select(&selector).count())
}

/// Map a transport failure to a user-facing issue, and whether TLS was reached.
fn classify_failure(err: &reqwest::Error) -> (&'static str, bool) {
    if err.is_timeout() {
        return ("SSL connection timed out", false);
    }

    let chain = error_chain(err).to_lowercase();
    if chain.contains("expired") {
        ("SSL certificate has expired", true)
    } else if chain.contains("certificate") {
        ("SSL certificate cannot be verified", true)
    } else if chain.contains("dns") || chain.contains("lookup") {
        ("Domain not found", false)
    } else {
        ("SSL connection failed", false)
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    #[test]
    fn test_count_insecure_resources() {
        let html = r#"<html><head>
            <script src="http://cdn.example.com/app.js"></script>
            <link rel="stylesheet" href="https://cdn.example.com/app.css">
            </head><body>
            <img src="http://cdn.example.com/logo.png">
            <form action="http://example.com/login"></form>
            <a href="http://example.com/about">About</a>
            </body></html>"#;

        assert_eq!(count_insecure_resources(html).unwrap(), 3);
    }

    #[test]
    fn test_count_insecure_resources_clean_page() {
        let html = r#"<html><body><script src="/app.js"></script></body></html>"#;
        assert_eq!(count_insecure_resources(html).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_inspect_reports_missing_hsts_and_plain_http() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(b"<html><body>hi</body></html>"),
            )
            .mount(&mock_server)
            .await;

        let prober = SslProber::with_timeout(5).unwrap();
        let report = prober.inspect(&mock_server.uri()).await.unwrap();

        assert!(!report.has_ssl);
        assert!(report.is_valid);
        assert!(report.has_issues);
        assert_eq!(report.status_code, Some(200));
        assert!(report.issues.contains(&"Site is not served over HTTPS".to_string()));
        assert!(report.issues.contains(&"Missing HSTS header".to_string()));
    }

    #[tokio::test]
    async fn test_inspect_accepts_hsts_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("strict-transport-security", "max-age=31536000"),
            )
            .mount(&mock_server)
            .await;

        let prober = SslProber::with_timeout(5).unwrap();
        let report = prober.inspect(&mock_server.uri()).await.unwrap();

        assert!(!report.issues.contains(&"Missing HSTS header".to_string()));
    }

    #[tokio::test]
    async fn test_inspect_marks_error_status_invalid() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let prober = SslProber::with_timeout(5).unwrap();
        let report = prober.inspect(&mock_server.uri()).await.unwrap();

        assert_eq!(report.status_code, Some(503));
        assert!(!report.is_valid);
    }

    #[tokio::test]
    async fn test_inspect_unreachable_host_becomes_issue() {
        let prober = SslProber::with_timeout(2).unwrap();
        let report = prober.inspect("http://127.0.0.1:1/").await.unwrap();

        assert!(!report.has_ssl);
        assert!(report.has_issues);
        assert_eq!(report.status_code, None);
    }

    #[tokio::test]
    async fn test_check_ssl_brackets_ipv6_hosts() {
        let prober = SslProber::with_timeout(2).unwrap();
        let report = prober.check_ssl("::1").await.unwrap();

        assert_eq!(report.domain, "[::1]");
        assert!(report.has_issues);
    }

    #[tokio::test]
    async fn test_check_ssl_rejects_empty_domain() {
        let prober = SslProber::with_timeout(2).unwrap();
        let err = prober.check_ssl("  ").await.unwrap_err();
        assert!(matches!(err, ProbeError::InvalidUrl(_)));
    }
}
