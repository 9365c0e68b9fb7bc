// Offline phishing heuristics for URLs and domains

use tracing::debug;

use crate::error::Result;
use crate::model::{HeuristicAnalysis, Signal, UserExplanation};
use crate::target::Target;

pub const PHISHING_THRESHOLD: u8 = 60;
pub const SEVERE_THRESHOLD: u8 = 80;

const KEYWORD_FACTOR: f64 = 0.3;

pub const SUSPICIOUS_TLDS: &[&str] = &["tk", "ml", "ga", "cf", "gq"];

const IP_HOST_WEIGHT: f64 = 0.7;
const AT_SYMBOL_WEIGHT: f64 = 0.8;
const DOUBLE_HYPHEN_WEIGHT: f64 = 0.5;
const SUSPICIOUS_TLD_WEIGHT: f64 = 0.9;
const DIGIT_RUN_WEIGHT: f64 = 0.6;
const DIGIT_RUN_LEN: usize = 5;

// (word, weight, context)
const SUSPICIOUS_KEYWORDS: &[(&str, f64, &str)] = &[
    ("verify", 0.6, "Account verification scam"),
    ("suspend", 0.7, "Account suspension threat"),
    ("urgent", 0.6, "Urgency manipulation"),
    ("confirm", 0.5, "Confirmation request"),
    ("update", 0.5, "Update prompt"),
    ("secure", 0.5, "False security claim"),
    ("account", 0.4, "Account-related"),
    ("login", 0.6, "Login page mimicry"),
    ("bank", 0.5, "Banking fraud"),
    ("password", 0.7, "Password request"),
    ("credential", 0.8, "Credential theft"),
    ("click", 0.4, "Action prompt"),
    ("prize", 0.7, "Prize scam"),
    ("winner", 0.7, "Winner scam"),
    ("expires", 0.6, "Time pressure"),
];

struct Brand {
    name: &'static str,
    variants: &'static [&'static str],
    weight: f64,
}

const PROTECTED_BRANDS: &[Brand] = &[
    Brand {
        name: "paypal",
        variants: &["paypa1", "paypai", "paypa11", "pay-pal"],
        weight: 0.9,
    },
    Brand {
        name: "google",
        variants: &["g00gle", "googie", "gooogle", "goog1e"],
        weight: 0.9,
    },
    Brand {
        name: "amazon",
        variants: &["amaz0n", "amazom", "arnazon", "amazon-"],
        weight: 0.9,
    },
    Brand {
        name: "microsoft",
        variants: &["micros0ft", "microsft", "micro-soft"],
        weight: 0.9,
    },
    Brand {
        name: "facebook",
        variants: &["faceb00k", "facebok", "face-book"],
        weight: 0.9,
    },
    Brand {
        name: "banco",
        variants: &["banc0", "bank0", "banca"],
        weight: 0.8,
    },
    Brand {
        name: "netflix",
        variants: &["netf1ix", "netfiix", "net-flix"],
        weight: 0.9,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct BrandMatch {
    pub brand: String,
    pub variant: String,
    pub weight: f64,
}

/// First protected brand whose look-alike variant appears in `domain`.
pub fn detect_brand_impersonation(domain: &str) -> Option<BrandMatch> {
    let domain = domain.to_lowercase();

    PROTECTED_BRANDS.iter().find_map(|brand| {
        brand
            .variants
            .iter()
            .find(|variant| domain.contains(*variant))
            .map(|variant| BrandMatch {
                brand: brand.name.to_string(),
                variant: variant.to_string(),
                weight: brand.weight,
            })
    })
}

fn has_digit_run(s: &str, min_len: usize) -> bool {
    let mut run = 0;
    for c in s.chars() {
        if c.is_ascii_digit() {
            run += 1;
            if run >= min_len {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn tld(host: &str) -> Option<&str> {
    host.rsplit('.').next().filter(|t| !t.is_empty())
}

/// Scores URLs for phishing-like characteristics without any network access.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEngine;

impl HeuristicEngine {
    pub fn new() -> Self {
        Self
    }

    /// Parse and analyze a raw URL.
    pub fn analyze_url(&self, url: &str) -> Result<HeuristicAnalysis> {
        let target = Target::parse(url)?;
        Ok(self.analyze(&target))
    }

    pub fn analyze(&self, target: &Target) -> HeuristicAnalysis {
        let raw = target.raw.as_str();
        let mut flags = Vec::new();

        if target.is_ip {
            flags.push(Signal::new(
                "url_pattern",
                IP_HOST_WEIGHT,
                "IP address used instead of a domain name",
            ));
        }
        if raw.contains('@') {
            flags.push(Signal::new(
                "url_pattern",
                AT_SYMBOL_WEIGHT,
                "Contains @ symbol (URL obfuscation)",
            ));
        }
        if raw.contains("--") {
            flags.push(Signal::new(
                "url_pattern",
                DOUBLE_HYPHEN_WEIGHT,
                "Multiple consecutive hyphens",
            ));
        }
        if !target.is_ip
            && let Some(tld) = tld(&target.domain)
            && SUSPICIOUS_TLDS.contains(&tld)
        {
            flags.push(Signal::new(
                "url_pattern",
                SUSPICIOUS_TLD_WEIGHT,
                format!("Free/suspicious TLD (.{})", tld),
            ));
        }
        if has_digit_run(raw, DIGIT_RUN_LEN) {
            flags.push(Signal::new(
                "url_pattern",
                DIGIT_RUN_WEIGHT,
                "Long number sequence",
            ));
        }

        let brand = detect_brand_impersonation(&target.domain);
        if let Some(ref m) = brand {
            flags.push(Signal::new(
                "brand_impersonation",
                m.weight,
                format!("Possible impersonation of \"{}\" (\"{}\")", m.brand, m.variant),
            ));
        }

        for (word, weight, context) in SUSPICIOUS_KEYWORDS {
            if raw.contains(word) {
                flags.push(Signal::new(
                    "suspicious_keyword",
                    weight * KEYWORD_FACTOR,
                    format!("Keyword \"{}\" ({})", word, context),
                ));
            }
        }

        let score: f64 = flags.iter().map(|f| f.weight).sum();
        let confidence = (score.min(1.0) * 100.0).round() as u8;
        let is_phishing = confidence >= PHISHING_THRESHOLD;

        debug!(
            "Heuristics for {}: score {:.2}, {} flag(s)",
            target.domain,
            score,
            flags.len()
        );

        let explanations = flags.iter().map(|f| f.detail.clone()).collect();
        let user_explanation = is_phishing.then(|| explain(&flags, brand.as_ref(), confidence));

        HeuristicAnalysis {
            is_phishing,
            confidence,
            score,
            flags,
            explanations,
            user_explanation,
        }
    }
}

fn explain(flags: &[Signal], brand: Option<&BrandMatch>, confidence: u8) -> UserExplanation {
    let mut reasons = Vec::new();

    if let Some(m) = brand {
        reasons.push(format!(
            "This site imitates \"{}\" with a look-alike address (\"{}\")",
            m.brand, m.variant
        ));
    }
    if flags.iter().any(|f| f.kind == "url_pattern") {
        reasons.push("The URL contains patterns common in phishing attacks".to_string());
    }
    if flags.iter().any(|f| f.kind == "suspicious_keyword") {
        reasons.push("The URL contains words typical of fraudulent sites".to_string());
    }
    if flags.len() > 3 {
        reasons.push("Several phishing indicators were found at once".to_string());
    }

    let recommendation = if confidence >= SEVERE_THRESHOLD {
        "Do not enter personal information on this site"
    } else {
        "Proceed with extreme caution"
    };

    UserExplanation {
        summary: format!("Detected {} warning signals", flags.len()),
        reasons,
        brand: brand.map(|m| m.brand.clone()),
        signal_count: flags.len(),
        recommendation: recommendation.to_string(),
        educational_tip: "Always check the official URL before entering credentials".to_string(),
    }
}
