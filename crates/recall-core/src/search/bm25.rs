//! BM25 Okapi scoring over an ad-hoc corpus.

use std::collections::HashMap;

/// Term-frequency saturation.
pub const BM25_K1: f32 = 1.2;

/// Document-length normalization.
pub const BM25_B: f32 = 0.75;

/// Scores every document in `corpus` against `query`.
///
/// Each corpus entry is the token list of one document. Returns one score per
/// document in corpus order; documents sharing no token with the query score
/// zero.
pub fn bm25_scores(corpus: &[Vec<String>], query: &[String]) -> Vec<f32> {
    let mut scores = vec![0.0f32; corpus.len()];
    if corpus.is_empty() || query.is_empty() {
        return scores;
    }

    let n = corpus.len() as f32;
    let total_len: usize = corpus.iter().map(Vec::len).sum();
    let avgdl = (total_len as f32 / n).max(1.0);

    let term_freqs: Vec<HashMap<&str, usize>> = corpus
        .iter()
        .map(|doc| {
            let mut tf = HashMap::new();
            for token in doc {
                *tf.entry(token.as_str()).or_insert(0) += 1;
            }
            tf
        })
        .collect();

    let mut seen = std::collections::HashSet::new();
    for term in query {
        if !seen.insert(term.as_str()) {
            continue;
        }

        let df = term_freqs
            .iter()
            .filter(|tf| tf.contains_key(term.as_str()))
            .count() as f32;
        if df == 0.0 {
            continue;
        }
        // IDF: ln((N - df + 0.5) / (df + 0.5) + 1)
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

        for (i, tf) in term_freqs.iter().enumerate() {
            let Some(&count) = tf.get(term.as_str()) else {
                continue;
            };
            let tf = count as f32;
            let dl = corpus[i].len() as f32;
            let norm = (tf * (BM25_K1 + 1.0)) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / avgdl));
            scores[i] += idf * norm;
        }
    }

    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::tokenize;

    fn corpus(docs: &[&str]) -> Vec<Vec<String>> {
        docs.iter().map(|d| tokenize(d)).collect()
    }

    #[test]
    fn test_matching_documents_score_positive() {
        let corpus = corpus(&[
            "rust programming systems language fast",
            "python programming scripting easy",
            "rust memory safety zero cost abstractions",
        ]);
        let scores = bm25_scores(&corpus, &tokenize("rust"));
        assert!(scores[0] > 0.0);
        assert_eq!(scores[1], 0.0);
        assert!(scores[2] > 0.0);
    }

    #[test]
    fn test_higher_term_frequency_ranks_first() {
        let corpus = corpus(&["rust rust rust", "rust programming"]);
        let scores = bm25_scores(&corpus, &tokenize("rust"));
        assert!(scores[0] > scores[1]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(bm25_scores(&[], &tokenize("rust")).is_empty());
        assert_eq!(bm25_scores(&corpus(&["rust"]), &[]), vec![0.0]);
    }
}
