//! SPARQL SELECT templates emitted against the triple-store port
//!
//! The IRIs and projection names here are interop surface: external stores
//! answer exactly these shapes. Keep them bit-exact.

use crate::graph::{NodeKind, Uri};

/// Graph-build fetch: every triple whose subject or object is one of the
/// entry points. Projections `?subject ?predicate ?object`.
pub fn graph_fetch(entry_points: &[Uri]) -> String {
    let set = iri_list(entry_points);
    format!(
        "SELECT ?subject ?predicate ?object\n\
         WHERE {{\n\
         \x20 ?subject ?predicate ?object .\n\
         \x20 FILTER(?subject IN ({set}) || ?object IN ({set}))\n\
         }}"
    )
}

/// Exact label lookup over the configured match types. Projections
/// `?uri ?type ?label ?content`; label matching is case-insensitive
/// equality or substring containment.
pub fn label_lookup(terms: &[String], kinds: &[NodeKind]) -> String {
    let types = kind_list(kinds);
    let matches = terms
        .iter()
        .map(|term| {
            let lowered = escape_literal(&term.to_lowercase());
            format!(
                "LCASE(STR(?label)) = \"{lowered}\" || CONTAINS(LCASE(STR(?label)), \"{lowered}\")"
            )
        })
        .collect::<Vec<_>>()
        .join(" || ");
    format!(
        "SELECT ?uri ?type ?label ?content\n\
         WHERE {{\n\
         \x20 ?uri <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> ?type .\n\
         \x20 ?uri <http://www.w3.org/2000/01/rdf-schema#label>|<http://www.w3.org/2004/02/skos/core#prefLabel> ?label .\n\
         \x20 OPTIONAL {{ ?uri <http://purl.org/stuff/ragno/hasContent> ?content }}\n\
         \x20 FILTER(?type IN ({types}))\n\
         \x20 FILTER({matches})\n\
         }}"
    )
}

/// Entity-name resolution: URIs whose label matches one name,
/// case-insensitive, at most `limit` rows. Projections `?uri ?label`.
pub fn name_resolution(name: &str, limit: usize) -> String {
    let lowered = escape_literal(&name.to_lowercase());
    format!(
        "SELECT ?uri ?label\n\
         WHERE {{\n\
         \x20 ?uri <http://www.w3.org/2000/01/rdf-schema#label>|<http://www.w3.org/2004/02/skos/core#prefLabel> ?label .\n\
         \x20 FILTER(LCASE(STR(?label)) = \"{lowered}\" || CONTAINS(LCASE(STR(?label)), \"{lowered}\"))\n\
         }}\n\
         LIMIT {limit}"
    )
}

/// Per-type statistics: distinct subject counts grouped by declared type.
pub fn type_statistics() -> String {
    "SELECT ?type (COUNT(DISTINCT ?uri) AS ?count)\n\
     WHERE {\n\
     \x20 ?uri <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> ?type .\n\
     }\n\
     GROUP BY ?type"
        .to_string()
}

fn iri_list(uris: &[Uri]) -> String {
    uris.iter()
        .map(|u| format!("<{}>", u))
        .collect::<Vec<_>>()
        .join(", ")
}

fn kind_list(kinds: &[NodeKind]) -> String {
    kinds
        .iter()
        .filter_map(NodeKind::type_uri)
        .map(|u| format!("<{}>", u))
        .collect::<Vec<_>>()
        .join(", ")
}

fn escape_literal(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
