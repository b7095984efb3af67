//! Candidate URL generation.
//!
//! A query is expanded into a fixed-shape list of URLs against known reference
//! domains. Generation never touches the network; reachability is decided
//! later by the synthesizer.

use std::collections::HashSet;

/// Built-in reference domains (encyclopedia, educational, science-news).
///
/// `{query}` is replaced with the form-encoded query, `{slug}` with a
/// Wikipedia-style article slug.
pub const DEFAULT_TEMPLATES: &[&str] = &[
    "https://en.wikipedia.org/wiki/{slug}",
    "https://www.britannica.com/search?query={query}",
    "https://plato.stanford.edu/search/searcher.py?query={query}",
    "https://www.khanacademy.org/search?page_search_query={query}",
    "https://ocw.mit.edu/search/?q={query}",
    "https://www.sciencedaily.com/search/?keyword={query}",
    "https://www.nature.com/search?q={query}",
    "https://www.newscientist.com/search/?q={query}",
    "https://phys.org/search/?search={query}",
    "https://www.scientificamerican.com/search/?q={query}",
    "https://arxiv.org/search/?query={query}&searchtype=all",
    "https://www.sciencedirect.com/search?qs={query}",
    "https://www.energy.gov/search?keywords={query}",
    "https://www.nasa.gov/?search={query}",
    "https://www.nationalgeographic.com/search?q={query}",
];

/// Expand `query` into candidate URLs, in template order, without duplicates.
///
/// An empty `templates` slice selects [`DEFAULT_TEMPLATES`].
pub fn candidate_urls(query: &str, templates: &[String]) -> Vec<String> {
    let encoded: String = url::form_urlencoded::byte_serialize(query.trim().as_bytes()).collect();
    let slug = wiki_slug(query);

    let expand = |template: &str| template.replace("{query}", &encoded).replace("{slug}", &slug);

    let expanded: Vec<String> = if templates.is_empty() {
        DEFAULT_TEMPLATES.iter().map(|t| expand(t)).collect()
    } else {
        templates.iter().map(|t| expand(t)).collect()
    };

    let mut seen = HashSet::new();
    expanded
        .into_iter()
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Wikipedia-style article slug: first letter capitalized, spaces as underscores.
pub fn wiki_slug(query: &str) -> String {
    let joined = query.split_whitespace().collect::<Vec<_>>().join("_");
    let mut chars = joined.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    urlencoding::encode(&capitalized).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_templates_produce_fifteen_candidates() {
        let urls = candidate_urls("quantum computing", &[]);
        assert_eq!(urls.len(), DEFAULT_TEMPLATES.len());
        assert_eq!(urls.len(), 15);
        assert_eq!(urls[0], "https://en.wikipedia.org/wiki/Quantum_computing");
        assert_eq!(
            urls[1],
            "https://www.britannica.com/search?query=quantum+computing"
        );
    }

    #[test]
    fn query_is_form_encoded() {
        let urls = candidate_urls("C++ & Rust", &[]);
        assert!(urls[1].ends_with("query=C%2B%2B+%26+Rust"));
    }

    #[test]
    fn custom_templates_override_defaults() {
        let templates = vec![
            "https://a.example/{slug}".to_string(),
            "https://b.example/?q={query}".to_string(),
        ];
        let urls = candidate_urls("solar energy", &templates);
        assert_eq!(
            urls,
            vec![
                "https://a.example/Solar_energy".to_string(),
                "https://b.example/?q=solar+energy".to_string(),
            ]
        );
    }

    #[test]
    fn duplicate_templates_are_collapsed() {
        let templates = vec![
            "https://a.example/?q={query}".to_string(),
            "https://a.example/?q={query}".to_string(),
        ];
        assert_eq!(candidate_urls("x", &templates).len(), 1);
    }

    #[test]
    fn slug_collapses_whitespace() {
        assert_eq!(wiki_slug("  carbon   capture "), "Carbon_capture");
        assert_eq!(wiki_slug(""), "");
    }
}
