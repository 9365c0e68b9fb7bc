// Tests for domain format validation

use trawl_core::model::RiskLevel;
use trawl_core::validation::validate_domain;

#[test]
fn test_clean_domain_is_low_risk() {
    let v = validate_domain("bbva.com.ar");
    assert!(v.is_valid);
    assert!(v.issues.is_empty());
    assert_eq!(v.suspicion_score, 0);
    assert_eq!(v.risk_level, RiskLevel::Low);
    assert!(v.recommendations.is_empty());
}

#[test]
fn test_suspicious_tld_is_medium() {
    let v = validate_domain("free-prizes.tk");
    assert_eq!(v.suspicion_score, 40);
    assert_eq!(v.risk_level, RiskLevel::Medium);
    assert_eq!(v.issues, vec!["Uses suspicious TLD"]);
    assert_eq!(v.recommendations.len(), 2);
}

#[test]
fn test_fully_qualified_name_scores_like_plain_name() {
    let v = validate_domain("free-offer.tk.");
    assert!(v.is_valid);
    assert_eq!(v.domain, "free-offer.tk");
    assert_eq!(v.suspicion_score, 40);
    assert_eq!(v.risk_level, RiskLevel::Medium);
}

#[test]
fn test_gq_is_not_a_validation_tld() {
    let v = validate_domain("example.gq");
    assert_eq!(v.suspicion_score, 0);
}

#[test]
fn test_many_patterns_are_high_and_clamped() {
    let v = validate_domain("10-0-0-1--aaaa-123456.a.b.c.d.login-portal-verification-service.tk");
    assert!(v.is_valid);
    assert_eq!(v.suspicion_score, 100);
    assert_eq!(v.risk_level, RiskLevel::High);
    assert!(v.issues.contains(&"Contains IP-like pattern".to_string()));
    assert!(v.issues.contains(&"Contains repeated characters".to_string()));
    assert!(v.issues.contains(&"Excessive subdomain levels".to_string()));
    assert!(v.issues.contains(&"Unusually long domain name".to_string()));
    assert_eq!(
        v.recommendations,
        vec![
            "Exercise extreme caution with this domain",
            "Verify the URL manually before proceeding"
        ]
    );
}

#[test]
fn test_invalid_format() {
    let v = validate_domain("bad_domain!.com");
    assert!(!v.is_valid);
    assert_eq!(v.issues[0], "Invalid domain format");
}
