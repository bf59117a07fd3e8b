//! Query processing: entity extraction, expansion, confidence
//!
//! The LLM is asked for a JSON array of entity strings; anything going
//! wrong there falls back to a whitespace heuristic so a dead LLM never
//! blocks retrieval.

/// Longest query text forwarded to the embedding port
pub const MAX_EMBED_CHARS: usize = 8000;

/// Render the entity-extraction prompt for a query.
pub fn extraction_prompt(query: &str) -> String {
    format!(
        "Extract the key entities from the following query.\n\
         Respond with a JSON array of entity strings and nothing else.\n\n\
         Query: {}",
        query
    )
}

/// Parse the LLM's entity response.
///
/// Tolerates prose around the array by slicing from the first `[` to the
/// last `]`. Returns `None` when no parseable array is present.
pub fn parse_entity_array(text: &str) -> Option<Vec<String>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    let entities: Vec<String> = serde_json::from_str(&text[start..=end]).ok()?;
    let cleaned: Vec<String> = entities
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Fallback extraction: whitespace tokens longer than 2 characters,
/// at most `max` of them.
pub fn heuristic_entities(query: &str, max: usize) -> Vec<String> {
    query
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .take(max)
        .map(str::to_string)
        .collect()
}

/// Add naive singular/plural variants, originals first, deduplicated.
pub fn expand_terms(entities: &[String]) -> Vec<String> {
    let mut terms: Vec<String> = Vec::with_capacity(entities.len() * 2);
    let push = |term: String, terms: &mut Vec<String>| {
        if !terms.iter().any(|t| t.eq_ignore_ascii_case(&term)) {
            terms.push(term);
        }
    };
    for entity in entities {
        push(entity.clone(), &mut terms);
    }
    for entity in entities {
        let variant = match entity.strip_suffix("es") {
            Some(base) if base.len() > 2 => base.to_string(),
            _ => match entity.strip_suffix('s') {
                Some(base) if !base.is_empty() => base.to_string(),
                _ => format!("{}s", entity),
            },
        };
        push(variant, &mut terms);
    }
    terms
}

/// Deterministic query-processing confidence in [0, 1]:
/// entity yield (0.4), embedding presence (0.3), expansion growth (0.3).
pub fn confidence(entity_count: usize, has_embedding: bool, expansion_grew: bool) -> f64 {
    let entity_part = (entity_count as f64 / 3.0).min(1.0) * 0.4;
    let embedding_part = if has_embedding { 0.3 } else { 0.0 };
    let expansion_part = if expansion_grew { 0.3 } else { 0.0 };
    entity_part + embedding_part + expansion_part
}

/// Truncate text at the embedding boundary without splitting a character.
pub fn truncate_for_embedding(text: &str) -> &str {
    match text.char_indices().nth(MAX_EMBED_CHARS) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// The processed query handed to Phase B
#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    /// Entities from the LLM or the heuristic
    pub entities: Vec<String>,
    /// Entities plus expansion variants
    pub terms: Vec<String>,
    /// Query embedding, when the port delivered one
    pub embedding: Option<Vec<f32>>,
    pub confidence: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_clean_json_array() {
        let entities = parse_entity_array(r#"["Alpha", "Beta Prime"]"#).unwrap();
        assert_eq!(entities, vec!["Alpha", "Beta Prime"]);
    }

    #[test]
    fn parses_array_embedded_in_prose() {
        let text = "Sure! Here are the entities:\n[\"Alpha\", \"Beta\"]\nLet me know.";
        let entities = parse_entity_array(text).unwrap();
        assert_eq!(entities, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_entity_array("no entities here").is_none());
        assert!(parse_entity_array("]oops[").is_none());
        assert!(parse_entity_array("[]").is_none());
        assert!(parse_entity_array(r#"[1, 2, 3]"#).is_none());
    }

    #[test]
    fn heuristic_keeps_long_tokens_up_to_max() {
        let entities = heuristic_entities("the alpha of beta and gamma delta epsilon", 3);
        assert_eq!(entities, vec!["the", "alpha", "beta"]);

        let entities = heuristic_entities("an ox is up", 5);
        assert!(entities.is_empty());
    }

    #[test]
    fn expansion_adds_plural_and_singular() {
        let terms = expand_terms(&["graph".to_string(), "nodes".to_string()]);
        assert_eq!(terms, vec!["graph", "nodes", "graphs", "node"]);
    }

    #[test]
    fn expansion_does_not_duplicate() {
        let terms = expand_terms(&["node".to_string(), "nodes".to_string()]);
        assert_eq!(terms, vec!["node", "nodes"]);
    }

    #[test]
    fn confidence_combines_three_signals() {
        assert_eq!(confidence(0, false, false), 0.0);
        assert!((confidence(3, true, true) - 1.0).abs() < 1e-12);
        assert!((confidence(6, true, true) - 1.0).abs() < 1e-12);
        assert!((confidence(1, true, false) - (0.4 / 3.0 + 0.3)).abs() < 1e-12);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let short = "short text";
        assert_eq!(truncate_for_embedding(short), short);

        let long: String = "é".repeat(MAX_EMBED_CHARS + 10);
        let truncated = truncate_for_embedding(&long);
        assert_eq!(truncated.chars().count(), MAX_EMBED_CHARS);
    }
}
