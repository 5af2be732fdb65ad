//! Near-duplicate suppression for retrieved chunks

use crate::index::SearchHit;

/// Drop hits whose span overlaps an already kept hit of the same document by
/// more than `threshold` (Jaccard over byte ranges).
///
/// Input order is preserved, so the best of each duplicate group survives.
pub fn dedup_hits(hits: Vec<SearchHit>, threshold: f64) -> Vec<SearchHit> {
    let mut kept: Vec<SearchHit> = Vec::with_capacity(hits.len());

    for hit in hits {
        let meta = &hit.entry.metadata;
        let duplicate = match (meta.document_id, meta.span) {
            (Some(doc), Some(span)) => kept.iter().any(|k| {
                let other = &k.entry.metadata;
                other.document_id == Some(doc)
                    && other.span.is_some_and(|s| s.jaccard(&span) > threshold)
            }),
            _ => false,
        };
        if !duplicate {
            kept.push(hit);
        }
    }

    kept
}
