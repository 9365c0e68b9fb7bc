// Tests for the offline phishing heuristics

use trawl_core::heuristics::{HeuristicEngine, PHISHING_THRESHOLD, detect_brand_impersonation};

fn analyze(url: &str) -> trawl_core::model::HeuristicAnalysis {
    HeuristicEngine::new().analyze_url(url).unwrap()
}

// ============================================================================
// Brand impersonation
// ============================================================================

#[test]
fn test_brand_impersonation_google() {
    let m = detect_brand_impersonation("g00gle-secure.tk").unwrap();
    assert_eq!(m.brand, "google");
    assert_eq!(m.variant, "g00gle");
}

#[test]
fn test_brand_impersonation_is_case_insensitive() {
    let m = detect_brand_impersonation("NETFIIX-login.com").unwrap();
    assert_eq!(m.brand, "netflix");
}

#[test]
fn test_no_brand_on_genuine_domain() {
    assert!(detect_brand_impersonation("paypal.com").is_none());
    assert!(detect_brand_impersonation("example.org").is_none());
}

// ============================================================================
// URL patterns
// ============================================================================

#[test]
fn test_typosquat_on_free_tld_is_phishing() {
    let analysis = analyze("http://paypa1-secure.tk/verify");

    assert!(analysis.is_phishing);
    assert_eq!(analysis.confidence, 100);
    assert!(analysis.score > 2.0);
    assert!(
        analysis
            .explanations
            .iter()
            .any(|e| e.contains("\"paypal\""))
    );

    let explanation = analysis.user_explanation.unwrap();
    assert_eq!(explanation.summary, "Detected 4 warning signals");
    assert_eq!(explanation.signal_count, 4);
    assert_eq!(
        explanation.recommendation,
        "Do not enter personal information on this site"
    );
    assert_eq!(explanation.reasons.len(), 4);
}

#[test]
fn test_ip_host_flagged() {
    let analysis = analyze("http://192.168.1.20/index.html");
    assert_eq!(analysis.flags.len(), 1);
    assert_eq!(analysis.confidence, 70);
    assert!(analysis.is_phishing);
    assert_eq!(
        analysis.user_explanation.unwrap().recommendation,
        "Proceed with extreme caution"
    );
}

#[test]
fn test_ipv6_host_flagged() {
    let analysis = analyze("http://[2001:db8::1]/");
    assert!(analysis.flags.iter().any(|f| f.detail.contains("IP address")));
}

#[test]
fn test_at_symbol_uses_raw_url() {
    let analysis = analyze("https://accounts.example.com@198.51.100.7/");
    let details: Vec<&str> = analysis.flags.iter().map(|f| f.detail.as_str()).collect();
    assert!(details.contains(&"Contains @ symbol (URL obfuscation)"));
    assert!(details.contains(&"IP address used instead of a domain name"));
}

#[test]
fn test_hyphens_and_digit_runs() {
    let analysis = analyze("https://shop--deals.example.com/item/1234567");
    let details: Vec<&str> = analysis.flags.iter().map(|f| f.detail.as_str()).collect();
    assert!(details.contains(&"Multiple consecutive hyphens"));
    assert!(details.contains(&"Long number sequence"));
    // 0.5 + 0.6
    assert_eq!(analysis.confidence, 100);
}

#[test]
fn test_clean_url_has_no_flags() {
    let analysis = analyze("https://www.rust-lang.org/learn");
    assert!(analysis.flags.is_empty());
    assert_eq!(analysis.confidence, 0);
    assert!(!analysis.is_phishing);
    assert!(analysis.explanations.is_empty());
}

#[test]
fn test_phishing_flag_follows_threshold() {
    for url in [
        "https://secure-login.example.com",
        "http://paypa1-secure.tk/verify",
        "https://www.rust-lang.org/learn",
    ] {
        let analysis = analyze(url);
        assert_eq!(analysis.is_phishing, analysis.confidence >= PHISHING_THRESHOLD);
    }
}

#[test]
fn test_confidence_never_exceeds_100() {
    let analysis = analyze(
        "http://user@10.0.0.1/paypa1--verify-suspend-urgent-password-credential-12345678",
    );
    assert_eq!(analysis.confidence, 100);
    assert!(analysis.score > 1.0);
}
