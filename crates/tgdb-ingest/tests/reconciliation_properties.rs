//! Property tests for annotation diffing, gene set merging and undirected
//! edge expansion

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tgdb_ingest::diff::diff;
use tgdb_ingest::edge_types::expand_undirected;
use tgdb_ingest::models::{
    AnnotationBatch, AnnotationId, AnnotationRecord, AnnotationSnapshot, EdgeTypeId,
    ResolvedEdge, StoredAnnotation,
};
use tgdb_ingest::GeneSetIndex;

// ============================================================================
// Strategies
// ============================================================================

/// Gene id to name, over a small alphabet so stored and incoming overlap
fn annotations() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("g[0-9]", "[ab]", 0..10)
}

fn snapshot(existing: &BTreeMap<String, String>) -> AnnotationSnapshot {
    AnnotationSnapshot::from_stored(existing.iter().enumerate().map(|(idx, (gene, name))| {
        StoredAnnotation {
            id: AnnotationId(idx as i64 + 1),
            record: AnnotationRecord::new(gene.as_str()).with_name(name.as_str()),
        }
    }))
    .unwrap()
}

fn batch(incoming: &BTreeMap<String, String>) -> AnnotationBatch {
    AnnotationBatch::from_records(
        incoming
            .iter()
            .map(|(gene, name)| AnnotationRecord::new(gene.as_str()).with_name(name.as_str())),
    )
    .unwrap()
}

fn gene_sets() -> impl Strategy<Value = GeneSetIndex> {
    prop::collection::vec(("g[0-9]", "L[0-3]"), 0..15).prop_map(|pairs| {
        let mut index = GeneSetIndex::new();
        for (gene, source) in &pairs {
            index.insert(gene, source);
        }
        index
    })
}

fn edges() -> impl Strategy<Value = Vec<ResolvedEdge>> {
    prop::collection::vec((1i64..4, 1i64..6, 1i64..6), 0..20).prop_map(|rows| {
        rows.into_iter()
            .map(|(edge_type, source, target)| ResolvedEdge {
                edge_type: EdgeTypeId(edge_type),
                source: AnnotationId(source),
                target: AnnotationId(target),
                score: None,
                rank: None,
            })
            .collect()
    })
}

fn directional(id: EdgeTypeId) -> bool {
    id == EdgeTypeId(1)
}

// ============================================================================
// Annotation diff
// ============================================================================

proptest! {
    #[test]
    fn prop_diff_partitions_every_gene(existing in annotations(), incoming in annotations()) {
        let result = diff(&snapshot(&existing), &batch(&incoming));
        let report = result.report();

        let updated: HashSet<&String> = report.updated.iter().collect();
        let created: HashSet<&String> = report.created.iter().collect();
        let deleted: HashSet<&String> = report.deleted.iter().collect();

        prop_assert!(updated.is_disjoint(&created));
        prop_assert!(updated.is_disjoint(&deleted));
        prop_assert!(created.is_disjoint(&deleted));

        // Every incoming gene lands in exactly one of update, create, unchanged
        prop_assert_eq!(updated.len() + created.len() + report.unchanged, incoming.len());

        // Every stored gene is either kept (updated or unchanged) or deleted
        let kept = existing.keys().filter(|g| incoming.contains_key(*g)).count();
        prop_assert_eq!(kept + deleted.len(), existing.len());

        for gene in &created {
            prop_assert!(!existing.contains_key(*gene));
        }
        for gene in &deleted {
            prop_assert!(!incoming.contains_key(*gene));
        }
        for gene in &updated {
            prop_assert_ne!(existing.get(*gene), incoming.get(*gene));
        }
    }

    #[test]
    fn prop_update_keeps_stored_id(existing in annotations(), incoming in annotations()) {
        let existing_snapshot = snapshot(&existing);
        let result = diff(&existing_snapshot, &batch(&incoming));

        for update in &result.to_update {
            let stored = existing_snapshot.get(&update.record.gene_id).unwrap();
            prop_assert_eq!(stored.id, update.id);
        }
    }

    #[test]
    fn prop_diff_against_itself_is_empty(existing in annotations()) {
        let result = diff(&snapshot(&existing), &batch(&existing));

        prop_assert!(result.is_empty());
        prop_assert_eq!(result.unchanged, existing.len());
    }
}

// ============================================================================
// Gene set merging
// ============================================================================

proptest! {
    #[test]
    fn prop_merge_is_commutative(a in gene_sets(), b in gene_sets()) {
        prop_assert_eq!(a.merge(&b), b.merge(&a));
    }

    #[test]
    fn prop_merge_is_associative(a in gene_sets(), b in gene_sets(), c in gene_sets()) {
        prop_assert_eq!(a.merge(&b).merge(&c), a.merge(&b.merge(&c)));
    }

    #[test]
    fn prop_merge_is_idempotent(a in gene_sets()) {
        prop_assert_eq!(a.merge(&a), a);
    }

    #[test]
    fn prop_merge_unions_sources(a in gene_sets(), b in gene_sets()) {
        let merged = a.merge(&b);

        for (gene, sources) in merged.iter() {
            let expected: BTreeSet<String> = a
                .sources(gene)
                .into_iter()
                .chain(b.sources(gene))
                .flatten()
                .cloned()
                .collect();
            prop_assert_eq!(sources, &expected);
            prop_assert_eq!(merged.count(gene), sources.len());
        }
        prop_assert!(a.genes().chain(b.genes()).all(|gene| merged.contains(gene)));
    }

    #[test]
    fn prop_table_counts_match_lists(a in gene_sets()) {
        for row in a.to_table() {
            prop_assert_eq!(row.count, a.count(&row.gene));
            prop_assert_eq!(row.user_lists.split(", ").count(), row.count);
        }
    }
}

// ============================================================================
// Undirected expansion
// ============================================================================

proptest! {
    #[test]
    fn prop_expansion_is_idempotent(rows in edges()) {
        let once = expand_undirected(&rows, directional);
        let twice = expand_undirected(&once, directional);

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_expansion_closes_undirected_edges(rows in edges()) {
        let expanded = expand_undirected(&rows, directional);
        let keys: HashSet<_> = expanded.iter().map(ResolvedEdge::key).collect();

        prop_assert_eq!(keys.len(), expanded.len());
        for edge in &expanded {
            if !directional(edge.edge_type) {
                prop_assert!(keys.contains(&edge.reversed().key()));
            }
        }
        for edge in &rows {
            prop_assert!(keys.contains(&edge.key()));
        }
    }
}
