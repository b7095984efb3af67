//! Content synthesizer: turns a URL into a `{title, body}` pair.
//!
//! A page is fetched with a short timeout and reduced to plain text. When the
//! fetch fails, or yields too little text, content is generated
//! deterministically from the topic inferred from the URL itself. The
//! synthesizer never returns an error.

use std::net::IpAddr;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::debug;
use url::Url;

use fathom_shared::{FathomError, Result, RetrievalConfig};

use crate::extract::{ExtractedPage, extract_page, title_case, title_from_url};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("Fathom/", env!("CARGO_PKG_VERSION"));

/// Redirect hops followed before a fetch is abandoned.
const MAX_REDIRECTS: usize = 5;

/// Extracted bodies shorter than this are replaced by synthesized content.
pub const MIN_EXTRACTED_CHARS: usize = 50;

/// Query parameters that usually carry the search terms.
const QUERY_KEYS: &[&str] = &[
    "q",
    "query",
    "keyword",
    "keywords",
    "search",
    "qs",
    "search_query",
    "page_search_query",
];

/// Path segments that never name a topic.
const GENERIC_SEGMENTS: &[&str] = &["search", "wiki", "results", "searcher.py", "index.html"];

/// Canned paragraphs keyed by substring of the inferred topic; first match wins.
const TOPIC_PARAGRAPHS: &[(&str, &str)] = &[
    (
        "energy",
        "{topic} concerns how energy is produced, stored, transmitted and consumed. \
         Current work spans renewable generation such as solar and wind, grid-scale \
         storage, efficiency improvements in buildings and industry, and the economics \
         of replacing fossil-fuel infrastructure while keeping supply reliable.",
    ),
    (
        "physics",
        "{topic} is studied through the fundamental laws governing matter, energy, \
         space and time. Research combines theoretical models with precise experiments, \
         from particle accelerators to astronomical observation, and its results \
         underpin engineering, chemistry and modern electronics.",
    ),
    (
        "climate",
        "{topic} draws on atmospheric science, oceanography and ecology to understand \
         long-term changes in temperature, precipitation and extreme weather. Studies \
         combine observational records with climate models to assess impacts and to \
         evaluate mitigation and adaptation strategies.",
    ),
    (
        "computing",
        "{topic} covers the theory and practice of processing information. Key themes \
         include algorithms and complexity, hardware architectures, programming models \
         and the trade-offs between performance, reliability and cost that shape how \
         computational systems are designed and deployed.",
    ),
    (
        "medicine",
        "{topic} brings together clinical practice and biomedical research. Evidence \
         comes from laboratory studies, clinical trials and population data, and \
         progress depends on translating discoveries into treatments that are safe, \
         effective and accessible to patients.",
    ),
    (
        "science",
        "{topic} advances through systematic observation, hypothesis and experiment. \
         Findings are published in peer-reviewed literature, replicated by independent \
         groups and gradually consolidated into the theories that inform education, \
         policy and technology.",
    ),
    (
        "technology",
        "{topic} describes how scientific knowledge is applied to build tools, systems \
         and processes. Its development is driven by research, engineering practice and \
         market adoption, and it raises recurring questions about cost, safety, \
         standards and social impact.",
    ),
];

/// Paragraph used when no table entry matches the inferred topic.
const GENERIC_PARAGRAPH: &str = "{topic} is an active area of study with a growing body of \
    literature. Reference works describe its core concepts and history, educational \
    resources explain its principles, and recent research and news coverage track new \
    developments, open problems and practical applications.";

// ---------------------------------------------------------------------------
// Aspect labels
// ---------------------------------------------------------------------------

/// Topic aspects used to title synthesized and filler sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Aspect {
    Overview,
    Applications,
    Research,
    Principles,
    Technology,
}

impl Aspect {
    /// Fixed rotation order.
    pub const ROTATION: [Aspect; 5] = [
        Aspect::Overview,
        Aspect::Applications,
        Aspect::Research,
        Aspect::Principles,
        Aspect::Technology,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Overview => "Overview",
            Self::Applications => "Applications",
            Self::Research => "Research",
            Self::Principles => "Principles",
            Self::Technology => "Technology",
        }
    }

    /// The aspect at position `index` of the rotation (wrapping).
    pub fn for_index(index: usize) -> Self {
        Self::ROTATION[index % Self::ROTATION.len()]
    }

    /// Stable aspect for a URL, derived from its SHA-256 digest.
    pub fn for_url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        Self::for_index(digest[0] as usize)
    }
}

// ---------------------------------------------------------------------------
// ContentSynthesizer
// ---------------------------------------------------------------------------

/// Title and body produced for one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedContent {
    pub title: String,
    pub body: String,
    /// `true` when the content was generated instead of scraped.
    pub synthetic: bool,
}

/// Fetches pages and degrades to deterministic content on failure.
#[derive(Clone)]
pub struct ContentSynthesizer {
    client: Client,
    body_max_chars: usize,
    allow_private_hosts: bool,
}

impl ContentSynthesizer {
    /// Build a synthesizer whose HTTP client enforces the per-fetch timeout.
    pub fn new(config: &RetrievalConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(redirect_policy(config.allow_private_hosts))
            .timeout(config.fetch_timeout)
            .build()
            .map_err(|e| FathomError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            body_max_chars: config.body_max_chars,
            allow_private_hosts: config.allow_private_hosts,
        })
    }

    /// Produce content for `url`. Never fails.
    pub async fn synthesize(&self, url: &str) -> SynthesizedContent {
        match self.fetch(url).await {
            Ok((page, parsed)) if page.body.chars().count() >= MIN_EXTRACTED_CHARS => {
                SynthesizedContent {
                    title: page.title.unwrap_or_else(|| title_from_url(&parsed)),
                    body: page.body,
                    synthetic: false,
                }
            }
            Ok((page, _)) => {
                debug!(%url, chars = page.body.chars().count(), "too little text, synthesizing");
                fallback_content(url)
            }
            Err(e) => {
                debug!(%url, error = %e, "fetch failed, synthesizing");
                fallback_content(url)
            }
        }
    }

    async fn fetch(&self, url: &str) -> Result<(ExtractedPage, Url)> {
        let parsed =
            Url::parse(url).map_err(|e| FathomError::Network(format!("{url}: invalid URL: {e}")))?;

        if !self.allow_private_hosts && is_ssrf_target(&parsed) {
            return Err(FathomError::Network(format!("{url}: blocked private target")));
        }

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| FathomError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(FathomError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FathomError::Network(format!("{url}: body read failed: {e}")))?;

        Ok((extract_page(&body, self.body_max_chars), parsed))
    }
}

// ---------------------------------------------------------------------------
// Deterministic fallback
// ---------------------------------------------------------------------------

/// Content generated purely from the URL. Same input, same output.
pub fn fallback_content(url: &str) -> SynthesizedContent {
    let topic = infer_topic(url);
    SynthesizedContent {
        title: format!("{}: {}", title_case(&topic), Aspect::for_url(url).label()),
        body: topic_paragraph(&topic),
        synthetic: true,
    }
}

/// Derive a topic from the URL's search parameters or its last meaningful path segment.
pub fn infer_topic(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "this topic".to_string();
    };

    let from_query = parsed.query_pairs().find_map(|(key, value)| {
        let value = value.trim().to_string();
        (QUERY_KEYS.contains(&key.as_ref()) && !value.is_empty()).then_some(value)
    });
    if let Some(topic) = from_query {
        return topic;
    }

    let from_path = parsed.path_segments().and_then(|mut segments| {
        segments.rfind(|s| !s.is_empty() && !GENERIC_SEGMENTS.contains(s))
    });
    match from_path {
        Some(segment) => {
            let decoded = urlencoding::decode(segment)
                .map(|d| d.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            decoded.replace(['_', '-', '+'], " ").trim().to_string()
        }
        None => "this topic".to_string(),
    }
}

/// Canned paragraph for a topic, matched by substring against the topic table.
pub fn topic_paragraph(topic: &str) -> String {
    let lowered = topic.to_lowercase();
    let template = TOPIC_PARAGRAPHS
        .iter()
        .find(|(key, _)| lowered.contains(key))
        .map(|(_, paragraph)| *paragraph)
        .unwrap_or(GENERIC_PARAGRAPH);
    template.replace("{topic}", &title_case(topic))
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Reason a redirect to `next` must not be followed, if any. `requests_made`
/// counts the original request plus every hop already followed.
fn redirect_rejection(
    next: &Url,
    requests_made: usize,
    allow_private_hosts: bool,
) -> Option<&'static str> {
    if requests_made > MAX_REDIRECTS {
        Some("too many redirects")
    } else if !allow_private_hosts && is_ssrf_target(next) {
        Some("redirect to private target blocked")
    } else {
        None
    }
}

/// Redirect policy that re-applies the SSRF guard at every hop.
fn redirect_policy(allow_private_hosts: bool) -> reqwest::redirect::Policy {
    reqwest::redirect::Policy::custom(move |attempt| {
        match redirect_rejection(attempt.url(), attempt.previous().len(), allow_private_hosts) {
            Some(reason) => {
                debug!(url = %attempt.url(), reason, "redirect rejected");
                attempt.error(reason)
            }
            None => attempt.follow(),
        }
    })
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
