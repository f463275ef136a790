//! Substring-overlap keyword scoring.
//!
//! Shared by the flat-file backend (its only ranking) and by the degraded
//! paths of the Redis and MariaDB backends.
//!
//! A document's score is the fraction of query words that occur as
//! substrings of its lowercased text, so `"great"` matches `"greatest"`.

use crate::models::{parse_metadata, SearchResult};

/// Distance assigned to every hit of a degraded keyword scan.
pub const DEGRADED_DISTANCE: f64 = 0.5;

/// Score given to placeholder results when nothing matched.
pub const PLACEHOLDER_SCORE: f64 = 0.3;

/// Lowercase whitespace-delimited query words.
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Fraction of `terms` contained in `text`, in `[0, 1]`.
///
/// Returns `0.0` when there are no terms.
pub fn overlap_score(terms: &[String], text: &str) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let text_lower = text.to_lowercase();
    let matches = terms.iter().filter(|t| text_lower.contains(t.as_str())).count();
    matches as f64 / terms.len() as f64
}

/// A document position and its keyword score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub index: usize,
    pub score: f64,
}

impl Ranked {
    /// Reported distance: `1 - score`.
    pub fn distance(&self) -> f64 {
        1.0 - self.score
    }
}

/// Rank `texts` against `query` and keep the best `n`.
///
/// Ties keep storage order. When no text scores above zero the first `n`
/// texts are returned with [`PLACEHOLDER_SCORE`], so a non-empty corpus
/// always yields some context.
pub fn rank_with_placeholder<'a, I>(query: &str, texts: I, n: usize) -> Vec<Ranked>
where
    I: IntoIterator<Item = &'a str>,
{
    let terms = query_terms(query);
    let mut scored: Vec<Ranked> = texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Ranked {
            index,
            score: overlap_score(&terms, text),
        })
        .collect();

    if scored.iter().all(|r| r.score <= 0.0) {
        return scored
            .into_iter()
            .take(n)
            .map(|r| Ranked {
                index: r.index,
                score: PLACEHOLDER_SCORE,
            })
            .collect();
    }

    // `sort_by` is stable, so equal scores stay in storage order.
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(n);
    scored
}

/// Collects the hits of a degraded keyword scan.
///
/// Rows are kept in the order offered when at least one query word occurs
/// in the text. Every hit gets [`DEGRADED_DISTANCE`]; nothing is ranked.
/// Collection stops at `limit` hits.
#[derive(Debug)]
pub struct DegradedHits {
    terms: Vec<String>,
    limit: usize,
    result: SearchResult,
}

impl DegradedHits {
    pub fn new(query: &str, limit: usize) -> Self {
        Self {
            terms: query_terms(query),
            limit,
            result: SearchResult::empty(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.result.len() >= self.limit
    }

    /// Offer one stored row with its raw metadata JSON.
    pub fn offer(&mut self, text: String, raw_metadata: Option<&str>) {
        if self.is_full() || overlap_score(&self.terms, &text) <= 0.0 {
            return;
        }
        self.result
            .push(text, parse_metadata(raw_metadata), DEGRADED_DISTANCE);
    }

    pub fn finish(self) -> SearchResult {
        self.result
    }
}

/// Run a whole row set through [`DegradedHits`].
pub fn degraded_hits<I>(query: &str, rows: I, limit: usize) -> SearchResult
where
    I: IntoIterator<Item = (String, Option<String>)>,
{
    let mut hits = DegradedHits::new(query, limit);
    for (text, metadata) in rows {
        if hits.is_full() {
            break;
        }
        hits.offer(text, metadata.as_deref());
    }
    hits.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_terms_lowercases_and_splits() {
        assert_eq!(query_terms("  Cats   GREAT\n"), vec!["cats", "great"]);
        assert!(query_terms("   ").is_empty());
    }

    #[test]
    fn test_overlap_is_substring_based() {
        let terms = query_terms("great cat");
        assert_eq!(overlap_score(&terms, "The greatest CATalog"), 1.0);
        assert_eq!(overlap_score(&terms, "a great day"), 0.5);
        assert_eq!(overlap_score(&[], "anything"), 0.0);
    }

    #[test]
    fn test_ranking_orders_by_score() {
        let texts = ["cats are great", "dogs are great", "birds fly"];
        let ranked = rank_with_placeholder("cats great", texts, 4);
        // Zero-score documents still rank, after the matches.
        assert_eq!(ranked[0].index, 0);
        assert_eq!(ranked[0].score, 1.0);
        assert_eq!(ranked[1].index, 1);
        assert_eq!(ranked[1].score, 0.5);
        assert_eq!(ranked[2].index, 2);
        assert_eq!(ranked[1].distance(), 0.5);
    }

    #[test]
    fn test_no_match_falls_back_to_placeholder() {
        let texts = ["alpha", "beta", "gamma"];
        let ranked = rank_with_placeholder("zebra", texts, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].index, 0);
        assert_eq!(ranked[1].index, 1);
        for r in &ranked {
            assert!((r.distance() - 0.7).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ties_keep_storage_order() {
        let texts = ["x river", "y river", "z river"];
        let ranked = rank_with_placeholder("river", texts, 3);
        let order: Vec<usize> = ranked.iter().map(|r| r.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_empty_corpus() {
        assert!(rank_with_placeholder("anything", Vec::<&str>::new(), 4).is_empty());
    }

    fn rows(texts: &[&str]) -> Vec<(String, Option<String>)> {
        texts.iter().map(|t| (t.to_string(), None)).collect()
    }

    #[test]
    fn test_degraded_hits_keep_only_matches() {
        let r = degraded_hits(
            "tide harbour",
            rows(&["the harbour at dawn", "a dry field", "TIDE pools"]),
            4,
        );
        assert_eq!(r.documents, vec!["the harbour at dawn", "TIDE pools"]);
    }

    #[test]
    fn test_degraded_hits_use_fixed_distance_in_storage_order() {
        // The full match comes second and stays second.
        let r = degraded_hits(
            "rain roof",
            rows(&["rain again", "rain on the roof", "roof tiles"]),
            4,
        );
        assert_eq!(
            r.documents,
            vec!["rain again", "rain on the roof", "roof tiles"]
        );
        assert_eq!(r.distances, vec![DEGRADED_DISTANCE; 3]);
        assert_eq!(r.distances[0], 0.5);
    }

    #[test]
    fn test_degraded_hits_stop_at_limit() {
        let r = degraded_hits("river", rows(&["river a", "river b", "river c"]), 2);
        assert_eq!(r.documents, vec!["river a", "river b"]);

        let mut hits = DegradedHits::new("river", 1);
        hits.offer("river a".to_string(), None);
        assert!(hits.is_full());
        hits.offer("river b".to_string(), None);
        assert_eq!(hits.finish().len(), 1);
    }

    #[test]
    fn test_degraded_hits_empty_input() {
        assert!(degraded_hits("anything", rows(&[]), 4).is_empty());
        assert!(degraded_hits("   ", rows(&["some text"]), 4).is_empty());
        assert!(degraded_hits("text", rows(&["some text"]), 0).is_empty());
    }

    #[test]
    fn test_degraded_hits_decode_metadata() {
        let r = degraded_hits(
            "gulls",
            vec![
                ("gulls overhead".to_string(), Some(r#"{"source":"sea.txt"}"#.to_string())),
                ("gulls again".to_string(), Some("{not json".to_string())),
            ],
            4,
        );
        assert_eq!(r.metadatas[0]["source"], "sea.txt");
        assert!(r.metadatas[1].is_empty());
    }
}
