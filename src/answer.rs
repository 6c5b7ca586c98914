//! Answer synthesis: confidence gate, snippet extraction, citations.
//!
//! Answers are extractive, built only from retrieved chunk text, never
//! generated. When confidence is too low the service abstains (`None`)
//! rather than guessing, but the ranked contexts are always returned so
//! callers can inspect the candidates.

use crate::models::{ContextView, SearchResult};

/// Characters of context kept before the first matched question term.
const SNIPPET_BEFORE: usize = 80;
/// Characters of context kept after the first matched question term.
const SNIPPET_AFTER: usize = 220;
/// Snippets are capped at this many words.
const SNIPPET_MAX_WORDS: usize = 30;
/// How many top-ranked results contribute snippets to the answer.
const ANSWER_SOURCES: usize = 2;

/// Build an extractive answer from ranked results.
///
/// Returns `(None, contexts)` when `results` is empty, the top fused score
/// is below `abstain_threshold`, or the assembled answer is empty after
/// trimming. Otherwise the answer is the space-joined snippets of the top
/// results followed by deduplicated `[title, chunk N]` citations.
pub fn build_answer(
    question: &str,
    results: &[SearchResult],
    abstain_threshold: f64,
) -> (Option<String>, Vec<ContextView>) {
    let contexts: Vec<ContextView> = results.iter().map(context_view).collect();

    let Some(top) = results.first() else {
        return (None, contexts);
    };
    if top.score < abstain_threshold {
        return (None, contexts);
    }

    let terms = question_terms(question);
    let mut snippets: Vec<String> = Vec::new();
    let mut citations: Vec<String> = Vec::new();

    for res in results.iter().take(ANSWER_SOURCES) {
        let snippet = best_snippet(&res.text, &terms);
        if snippet.is_empty() {
            continue;
        }
        snippets.push(snippet);
        let citation = format!("[{}, chunk {}]", res.source_title, res.chunk_index);
        if !citations.contains(&citation) {
            citations.push(citation);
        }
    }

    let mut answer = snippets.join(" ");
    if !citations.is_empty() {
        answer = format!("{} {}", answer, citations.join(" "));
    }
    let answer = answer.trim().to_string();

    if answer.is_empty() {
        return (None, contexts);
    }
    (Some(answer), contexts)
}

fn context_view(res: &SearchResult) -> ContextView {
    ContextView {
        chunk_id: res.chunk_id.clone(),
        chunk_index: res.chunk_index,
        score: round4(res.score),
        vector_score: res.vector_score.map(round4),
        keyword_score: res.keyword_score.map(round4),
        text: res.text.clone(),
        source_title: res.source_title.clone(),
        source_url: res.source_url.clone(),
        page_start: res.page_start,
        page_end: res.page_end,
    }
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// Question terms used to anchor snippets: ASCII alphanumeric tokens of
/// length >= 3, lowercased. No stop-word filtering here: a question word
/// appearing verbatim in a chunk is a good anchor even when it is common.
fn question_terms(question: &str) -> Vec<String> {
    question
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| t.len() >= 3)
        .map(|t| t.to_ascii_lowercase())
        .collect()
}

/// Drop non-ASCII characters so byte offsets line up with character
/// positions during windowing.
fn ascii_clean(text: &str) -> String {
    text.chars().filter(char::is_ascii).collect()
}

/// Extract the most query-relevant snippet from a chunk.
///
/// Finds the earliest occurrence of any question term and keeps a window
/// around it; falls back to the whole cleaned text when nothing matches.
/// Whitespace is collapsed and the result capped at
/// [`SNIPPET_MAX_WORDS`] words with a trailing ellipsis when truncated.
fn best_snippet(text: &str, terms: &[String]) -> String {
    let cleaned = ascii_clean(text);
    let lowered = cleaned.to_ascii_lowercase();

    let mut best_index: Option<usize> = None;
    for term in terms {
        if let Some(idx) = lowered.find(term.as_str()) {
            if best_index.map_or(true, |best| idx < best) {
                best_index = Some(idx);
            }
        }
    }

    let snippet = match best_index {
        None => cleaned.as_str(),
        Some(idx) => {
            let start = idx.saturating_sub(SNIPPET_BEFORE);
            let end = (idx + SNIPPET_AFTER).min(cleaned.len());
            &cleaned[start..end]
        }
    };

    let words: Vec<&str> = snippet.split_whitespace().collect();
    if words.len() > SNIPPET_MAX_WORDS {
        format!("{}...", words[..SNIPPET_MAX_WORDS].join(" "))
    } else {
        words.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(text: &str, score: f64, title: &str, chunk_index: i64) -> SearchResult {
        SearchResult {
            chunk_id: format!("chunk-{}", chunk_index),
            source_id: "src-1".to_string(),
            chunk_index,
            text: text.to_string(),
            score,
            vector_score: Some(score),
            keyword_score: None,
            page_start: Some(1),
            page_end: Some(1),
            source_title: title.to_string(),
            source_url: "https://example.com/doc.pdf".to_string(),
        }
    }

    #[test]
    fn test_no_results_abstains_with_empty_contexts() {
        let (answer, contexts) = build_answer("anything?", &[], 0.28);
        assert!(answer.is_none());
        assert!(contexts.is_empty());
    }

    #[test]
    fn test_low_confidence_abstains_but_returns_contexts() {
        let results = vec![result("Some marginally related text.", 0.20, "Manual", 0)];
        let (answer, contexts) = build_answer("unrelated question?", &results, 0.28);
        assert!(answer.is_none());
        assert_eq!(contexts.len(), 1);
        assert!((contexts[0].score - 0.20).abs() < 1e-9);
    }

    #[test]
    fn test_answer_contains_snippet_and_citation() {
        let results = vec![result(
            "Operators must wear hearing protection in zone 4.",
            0.81,
            "Noise Safety Manual",
            0,
        )];
        let (answer, contexts) =
            build_answer("What protection is required in zone 4?", &results, 0.28);
        let answer = answer.unwrap();
        assert!(answer.contains("hearing protection in zone 4"));
        assert!(answer.contains("[Noise Safety Manual, chunk 0]"));
        assert_eq!(contexts.len(), 1);
    }

    #[test]
    fn test_snippet_capped_at_30_words_with_ellipsis() {
        let long_text = (0..80)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let text = format!("anchor {}", long_text);
        let results = vec![result(&text, 0.9, "Manual", 0)];
        let (answer, _) = build_answer("anchor?", &results, 0.28);
        let answer = answer.unwrap();

        let snippet_part = answer.split(" [").next().unwrap();
        let words: Vec<&str> = snippet_part.split_whitespace().collect();
        assert_eq!(words.len(), 30);
        assert!(snippet_part.ends_with("..."));
    }

    #[test]
    fn test_no_term_match_uses_whole_text() {
        let results = vec![result("Short unrelated passage.", 0.9, "Manual", 3)];
        let (answer, _) = build_answer("zzz qqq?", &results, 0.28);
        let answer = answer.unwrap();
        assert!(answer.starts_with("Short unrelated passage."));
        assert!(answer.contains("[Manual, chunk 3]"));
    }

    #[test]
    fn test_top_two_results_contribute_citations_deduplicated() {
        let results = vec![
            result("Hearing protection is mandatory in zone 4.", 0.9, "Noise Safety Manual", 0),
            result("Zone 4 requires double hearing protection.", 0.8, "Noise Safety Manual", 1),
            result("Forklifts must honk at intersections.", 0.5, "Traffic Manual", 7),
        ];
        let (answer, contexts) = build_answer("hearing protection zone 4?", &results, 0.28);
        let answer = answer.unwrap();
        assert!(answer.contains("[Noise Safety Manual, chunk 0]"));
        assert!(answer.contains("[Noise Safety Manual, chunk 1]"));
        // Third result is context only, never cited.
        assert!(!answer.contains("Traffic Manual"));
        assert_eq!(contexts.len(), 3);
    }

    #[test]
    fn test_same_citation_not_repeated() {
        let results = vec![
            result("Hearing protection rules part one.", 0.9, "Noise Safety Manual", 0),
            result("Hearing protection rules part two.", 0.8, "Noise Safety Manual", 0),
        ];
        let (answer, _) = build_answer("hearing protection?", &results, 0.28);
        let answer = answer.unwrap();
        assert_eq!(answer.matches("[Noise Safety Manual, chunk 0]").count(), 1);
    }

    #[test]
    fn test_scores_rounded_to_four_decimals() {
        let results = vec![result("text", 0.123456789, "Manual", 0)];
        let (_, contexts) = build_answer("q", &results, 0.0);
        assert!((contexts[0].score - 0.1235).abs() < 1e-12);
    }

    #[test]
    fn test_snippet_window_anchored_on_earliest_term() {
        let filler = "pad ".repeat(100);
        let text = format!("{}hearing protection is required beyond this point.", filler);
        let results = vec![result(&text, 0.9, "Manual", 0)];
        let (answer, _) = build_answer("Where is hearing protection required?", &results, 0.28);
        let answer = answer.unwrap();
        // The window keeps at most 80 chars before the match, so most of
        // the padding is gone but the match itself survives.
        assert!(answer.contains("hearing protection"));
        assert!(!answer.contains(&"pad ".repeat(30)));
    }
}
