//! Noise-term discovery: propose low-information tokens for the noise list.

use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::LazyLock;

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?u)\b\w\w+\b").unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?u)\w+").unwrap());

fn doc_tokens(name: &str) -> Vec<String> {
    let lower = name.to_lowercase();
    TOKEN_RE.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

/// Per-term TF-IDF summed over all names. Uses smoothed IDF
/// (`ln((1 + n) / (1 + df)) + 1`) and L2-normalized rows.
pub fn tfidf_scores(names: &[&str]) -> BTreeMap<String, f64> {
    let docs: Vec<Vec<String>> = names.iter().map(|n| doc_tokens(n)).collect();
    let n = docs.len() as f64;

    let mut df: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        let mut seen: Vec<&str> = doc.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for term in seen {
            *df.entry(term).or_insert(0) += 1;
        }
    }

    let mut scores: BTreeMap<String, f64> = BTreeMap::new();
    for doc in &docs {
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for term in doc {
            *tf.entry(term.as_str()).or_insert(0) += 1;
        }
        let weights: Vec<(&str, f64)> = tf
            .iter()
            .map(|(term, count)| {
                let idf = ((1.0 + n) / (1.0 + df[term] as f64)).ln() + 1.0;
                (*term, *count as f64 * idf)
            })
            .collect();
        let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm == 0.0 {
            continue;
        }
        for (term, w) in weights {
            *scores.entry(term.to_string()).or_insert(0.0) += w / norm;
        }
    }
    scores
}

/// Terms whose summed TF-IDF falls in the bottom third of the observed range.
/// Sorted alphabetically; the caller decides which to add to the noise list.
pub fn suggest_noise_terms(names: &[&str]) -> Vec<String> {
    let scores = tfidf_scores(names);
    let (min, max) = scores
        .values()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if scores.is_empty() {
        return Vec::new();
    }
    let threshold = min + (max - min) / 3.0;
    scores
        .into_iter()
        .filter(|(_, score)| *score < threshold)
        .map(|(term, _)| term)
        .collect()
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

/// Shorten a name with a set of low-information terms: drop those terms,
/// keep the first occurrence of each remaining word and title-case the
/// result. Punctuation is discarded. A name made only of noise terms keeps
/// its own words rather than becoming empty.
pub fn standardize_name(name: &str, low_terms: &[String]) -> String {
    let low: HashSet<&str> = low_terms.iter().map(String::as_str).collect();
    let lower = name.to_lowercase();
    let words: Vec<&str> = WORD_RE.find_iter(&lower).map(|m| m.as_str()).collect();

    let mut seen = HashSet::new();
    let mut kept: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !low.contains(w))
        .filter(|w| seen.insert(*w))
        .collect();
    if kept.is_empty() {
        kept = words.into_iter().filter(|w| seen.insert(*w)).collect();
    }
    title_case(&kept.join(" "))
}
