// Typosquatting detection via edit distance

use crate::model::SimilarDomain;

pub const MIN_SIMILARITY: f64 = 0.6;
pub const MAX_SIMILAR_RESULTS: usize = 5;

/// Levenshtein edit distance over characters.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized similarity in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (max_len - levenshtein(a, b)) as f64 / max_len as f64
}

/// Official domains that look like `domain` without being it.
///
/// Returns the top matches, most similar first, along with how many matched
/// before truncation.
pub fn find_similar_domains<I, S>(domain: &str, official: I) -> (Vec<SimilarDomain>, usize)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let input = domain.to_lowercase();

    let mut scored: Vec<(f64, String)> = official
        .into_iter()
        .filter_map(|candidate| {
            let candidate = candidate.as_ref();
            let score = similarity(&input, candidate);
            (score > MIN_SIMILARITY && score < 1.0).then(|| (score, candidate.to_string()))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    let count = scored.len();

    let matches = scored
        .into_iter()
        .take(MAX_SIMILAR_RESULTS)
        .map(|(score, candidate)| SimilarDomain {
            similarity: (score * 100.0).round() as u8,
            is_official: true,
            warning: format!(
                "This domain is similar to the official domain: {}",
                candidate
            ),
            domain: candidate,
        })
        .collect();

    (matches, count)
}
