// Domain format validation and suspicion scoring

use crate::model::{DomainValidation, RiskLevel};

const HIGH_RISK_ABOVE: u32 = 40;
const MEDIUM_RISK_ABOVE: u32 = 20;
const MAX_LABEL_LEN: usize = 63;
const LONG_DOMAIN_LEN: usize = 50;
const MAX_SUBDOMAIN_LEVELS: usize = 3;

const VALIDATION_TLDS: &[&str] = &["tk", "ml", "ga", "cf"];

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}

pub fn is_valid_format(domain: &str) -> bool {
    !domain.is_empty() && domain.split('.').all(is_valid_label)
}

/// Four 1-3 digit groups joined by dashes, e.g. `192-168-0-1`.
fn has_dashed_quad(domain: &str) -> bool {
    let parts: Vec<&str> = domain
        .split(|c: char| !c.is_ascii_digit() && c != '-')
        .collect();

    parts.iter().any(|segment| {
        let groups: Vec<&str> = segment.split('-').collect();
        // Outer groups may be the edge of a longer digit run.
        groups.windows(4).any(|w| {
            !w[0].is_empty()
                && !w[3].is_empty()
                && (1..=3).contains(&w[1].len())
                && (1..=3).contains(&w[2].len())
        })
    })
}

fn has_long_digit_run(domain: &str) -> bool {
    let mut run = 0;
    domain.chars().any(|c| {
        run = if c.is_ascii_digit() { run + 1 } else { 0 };
        run >= 5
    })
}

fn has_repeated_char(domain: &str) -> bool {
    let chars: Vec<char> = domain.chars().collect();
    chars.windows(4).any(|w| w.iter().all(|c| *c == w[0]))
}

pub fn validate_domain(domain: &str) -> DomainValidation {
    let domain = domain.trim();
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    let mut issues = Vec::new();
    let mut score: u32 = 0;

    let is_valid = is_valid_format(domain);
    if !is_valid {
        issues.push("Invalid domain format".to_string());
    }

    let tld_hit = domain
        .rsplit_once('.')
        .map(|(_, tld)| VALIDATION_TLDS.contains(&tld))
        .unwrap_or(false);

    let patterns: [(bool, &str, u32); 5] = [
        (has_dashed_quad(domain), "Contains IP-like pattern", 30),
        (has_long_digit_run(domain), "Contains long number sequence", 20),
        (has_repeated_char(domain), "Contains repeated characters", 25),
        (
            domain.contains("--"),
            "Contains multiple consecutive hyphens",
            15,
        ),
        (tld_hit, "Uses suspicious TLD", 40),
    ];

    for (hit, message, weight) in patterns {
        if hit {
            issues.push(message.to_string());
            score += weight;
        }
    }

    if domain.chars().count() > LONG_DOMAIN_LEN {
        issues.push("Unusually long domain name".to_string());
        score += 15;
    }

    let subdomain_levels = domain.split('.').count().saturating_sub(2);
    if subdomain_levels > MAX_SUBDOMAIN_LEVELS {
        issues.push("Excessive subdomain levels".to_string());
        score += 10;
    }

    let recommendations = if score > HIGH_RISK_ABOVE {
        vec![
            "Exercise extreme caution with this domain".to_string(),
            "Verify the URL manually before proceeding".to_string(),
        ]
    } else if score > MEDIUM_RISK_ABOVE {
        vec![
            "This domain shows some suspicious characteristics".to_string(),
            "Double-check the spelling and legitimacy".to_string(),
        ]
    } else {
        Vec::new()
    };

    let score = score.min(100);
    let risk_level = if score > HIGH_RISK_ABOVE {
        RiskLevel::High
    } else if score > MEDIUM_RISK_ABOVE {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    };

    DomainValidation {
        domain: domain.to_string(),
        is_valid,
        issues,
        suspicion_score: score as u8,
        risk_level,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert!(is_valid_format("bbva.com.ar"));
        assert!(is_valid_format("a-b.example"));
        assert!(!is_valid_format("-bad.example"));
        assert!(!is_valid_format("bad-.example"));
        assert!(!is_valid_format("bad..example"));
        assert!(!is_valid_format("under_score.com"));
        assert!(!is_valid_format(""));
    }

    #[test]
    fn test_dashed_quad() {
        assert!(has_dashed_quad("192-168-0-1.example.com"));
        assert!(has_dashed_quad("host-10-0-0-12-x.net"));
        assert!(!has_dashed_quad("1-2-3.example.com"));
    }

    #[test]
    fn test_repeated_char() {
        assert!(has_repeated_char("baaaad.com"));
        assert!(!has_repeated_char("baaad.com"));
    }
}
