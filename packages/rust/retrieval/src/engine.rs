//! Web retrieval engine.
//!
//! Expands a query into candidate URLs, synthesizes content for them in
//! concurrent batches, and assembles an ordered list of source records. The
//! engine only fails on malformed input; every network problem degrades to
//! synthesized content.

use tracing::{debug, info, instrument, warn};

use fathom_shared::{FathomError, MAX_SOURCES_CAP, Result, RetrievalConfig, SourceRecord};

use crate::candidates::{candidate_urls, wiki_slug};
use crate::extract::title_case;
use crate::synthesizer::{Aspect, ContentSynthesizer};

/// Concurrent, batch-bounded source retriever.
pub struct WebRetriever {
    config: RetrievalConfig,
    synthesizer: ContentSynthesizer,
    fast: bool,
}

impl WebRetriever {
    /// Create a retriever with the given configuration.
    pub fn new(config: RetrievalConfig) -> Result<Self> {
        let synthesizer = ContentSynthesizer::new(&config)?;
        Ok(Self {
            config,
            synthesizer,
            fast: false,
        })
    }

    /// Use smaller batches and a lower acceptance threshold.
    pub fn fast_mode(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    /// Retrieve up to `desired_count` sources (never more than 10) for `query`.
    ///
    /// Sources are ordered by batch, then by candidate position within the
    /// batch. If too few real sources are accepted the list is topped up with
    /// synthetic filler.
    #[instrument(skip_all, fields(query = %query.trim(), desired = desired_count, fast = self.fast))]
    pub async fn retrieve(&self, query: &str, desired_count: usize) -> Result<Vec<SourceRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FathomError::input("search query must not be empty"));
        }

        let target = desired_count
            .min(self.config.max_sources)
            .min(MAX_SOURCES_CAP);
        if target == 0 {
            return Ok(Vec::new());
        }

        let candidates = candidate_urls(query, &self.config.templates);
        let batch_size = self.config.batch_size_for(self.fast);
        let min_content = self.config.min_content_for(self.fast);

        info!(
            candidates = candidates.len(),
            batch_size, min_content, target, "starting retrieval"
        );

        let mut sources: Vec<SourceRecord> = Vec::with_capacity(target);

        for (batch_index, batch) in candidates.chunks(batch_size).enumerate() {
            if sources.len() >= target {
                debug!(batch_index, "target reached, skipping remaining batches");
                break;
            }

            let mut handles = Vec::with_capacity(batch.len());
            for url in batch {
                let synthesizer = self.synthesizer.clone();
                let url = url.clone();
                handles.push(tokio::spawn(async move {
                    let content = synthesizer.synthesize(&url).await;
                    (url, content)
                }));
            }

            // Awaiting in spawn order keeps candidate order within the batch.
            for handle in handles {
                match handle.await {
                    Ok((url, content)) => {
                        let chars = content.body.chars().count();
                        if chars <= min_content {
                            debug!(%url, chars, "rejected: too little content");
                            continue;
                        }
                        let record = SourceRecord::new(content.title, url, &content.body);
                        sources.push(if content.synthetic {
                            record.synthetic()
                        } else {
                            record
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "synthesis task failed");
                    }
                }
            }
        }

        let floor = target.max(self.config.min_sources);
        if sources.len() < floor {
            let needed = floor - sources.len();
            debug!(accepted = sources.len(), needed, "topping up with filler sources");
            sources.extend(filler_sources(query, needed));
        }
        sources.truncate(target);

        info!(
            returned = sources.len(),
            synthetic = sources.iter().filter(|s| s.synthetic).count(),
            "retrieval complete"
        );

        Ok(sources)
    }
}

/// Generate `count` synthetic sources titled by the rotating aspect labels.
pub fn filler_sources(query: &str, count: usize) -> Vec<SourceRecord> {
    let topic = title_case(query);
    let slug = wiki_slug(query);

    (0..count)
        .map(|i| {
            let aspect = Aspect::for_index(i);
            let round = i / Aspect::ROTATION.len();
            let anchor = aspect.label().to_lowercase();
            let url = if round == 0 {
                format!("https://en.wikipedia.org/wiki/{slug}#{anchor}")
            } else {
                format!("https://en.wikipedia.org/wiki/{slug}#{anchor}-{}", round + 1)
            };
            SourceRecord::new(
                format!("{topic}: {}", aspect.label()),
                url,
                &aspect_paragraph(&topic, aspect),
            )
            .synthetic()
        })
        .collect()
}

fn aspect_paragraph(topic: &str, aspect: Aspect) -> String {
    match aspect {
        Aspect::Overview => format!(
            "An overview of {topic}: its definition, history and the core ideas that \
             connect the field, with pointers to reference material for further reading."
        ),
        Aspect::Applications => format!(
            "Practical applications of {topic} across industry, public policy and everyday \
             life, including where it is already deployed and where adoption is emerging."
        ),
        Aspect::Research => format!(
            "Current research on {topic}: active questions, recent findings and the methods \
             researchers use to test and extend existing understanding."
        ),
        Aspect::Principles => format!(
            "The underlying principles of {topic}, explaining the mechanisms and models \
             that describe how it works and the assumptions they rely on."
        ),
        Aspect::Technology => format!(
            "Technology related to {topic}: the tools, systems and infrastructure that make \
             it possible, together with their limitations and development trends."
        ),
    }
}
