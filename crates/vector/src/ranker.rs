use tracing::debug;

use crate::similarity::cosine_similarity;
use crate::types::{CatalogItem, ScoredItem};

/// Exact brute-force top-K ranking by cosine similarity
///
/// Stateless: identical inputs always give identical outputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityRanker;

impl SimilarityRanker {
    pub fn new() -> Self {
        Self
    }

    /// Score every eligible item against `query` and keep the best `top_k`
    ///
    /// An item is eligible when it has an embedding of the same length as the
    /// query and its score is finite. Ineligible items are skipped silently.
    /// Results are ordered by descending score; equal scores keep their input
    /// order.
    pub fn rank<'a, I>(&self, query: &[f32], items: I, top_k: usize) -> Vec<ScoredItem<'a>>
    where
        I: IntoIterator<Item = &'a CatalogItem>,
    {
        if top_k == 0 || query.is_empty() {
            return Vec::new();
        }

        let mut candidates = 0usize;
        let mut scored: Vec<ScoredItem<'a>> = items
            .into_iter()
            .inspect(|_| candidates += 1)
            .filter_map(|item| {
                let embedding = item.embedding.as_deref()?;
                let similarity = cosine_similarity(query, embedding)?;
                similarity.is_finite().then_some(ScoredItem { item, similarity })
            })
            .collect();

        let eligible = scored.len();

        // stable: ties keep catalog order
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(top_k);

        debug!(
            "Ranked {} eligible of {} candidates, returning {}",
            eligible,
            candidates,
            scored.len()
        );
        scored
    }

    /// Items whose category matches `category` (trimmed, case-insensitive)
    ///
    /// A missing or blank filter keeps every item.
    pub fn filter_by_category<'a>(
        items: &'a [CatalogItem],
        category: Option<&str>,
    ) -> Vec<&'a CatalogItem> {
        match category.map(str::trim).filter(|c| !c.is_empty()) {
            None => items.iter().collect(),
            Some(wanted) => {
                let wanted = wanted.to_lowercase();
                items
                    .iter()
                    .filter(|item| {
                        item.category
                            .as_deref()
                            .is_some_and(|c| c.trim().to_lowercase() == wanted)
                    })
                    .collect()
            }
        }
    }
}
