//! Annotation reconciliation
//!
//! Compares the annotations already stored against an incoming batch and
//! partitions every gene into exactly one of update, create, delete or
//! unchanged. Nothing here touches the store.

use crate::models::{
    AnnotationBatch, AnnotationId, AnnotationRecord, AnnotationSnapshot, StoredAnnotation,
};
use serde::{Deserialize, Serialize};

/// A stored annotation whose descriptive fields change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationUpdate {
    pub id: AnnotationId,
    pub record: AnnotationRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationDiff {
    /// Incoming order
    pub to_update: Vec<AnnotationUpdate>,
    /// Incoming order
    pub to_create: Vec<AnnotationRecord>,
    /// Snapshot order. Always computed, applied only when deletion is enabled.
    pub to_delete: Vec<StoredAnnotation>,
    pub unchanged: usize,
}

/// Gene ids per category, for dry runs and the audit log
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffReport {
    pub updated: Vec<String>,
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub unchanged: usize,
}

/// Partition `incoming` against `existing`
pub fn diff(existing: &AnnotationSnapshot, incoming: &AnnotationBatch) -> AnnotationDiff {
    let mut result = AnnotationDiff::default();

    for record in incoming.iter() {
        match existing.get(&record.gene_id) {
            Some(stored) if stored.record.fields_differ(record) => {
                result.to_update.push(AnnotationUpdate {
                    id: stored.id,
                    record: record.clone(),
                });
            },
            Some(_) => result.unchanged += 1,
            None => result.to_create.push(record.clone()),
        }
    }

    result.to_delete = existing
        .iter()
        .filter(|stored| !incoming.contains(&stored.record.gene_id))
        .cloned()
        .collect();

    result
}

impl AnnotationDiff {
    pub fn is_empty(&self) -> bool {
        self.to_update.is_empty() && self.to_create.is_empty() && self.to_delete.is_empty()
    }

    pub fn report(&self) -> DiffReport {
        DiffReport {
            updated: self.to_update.iter().map(|u| u.record.gene_id.clone()).collect(),
            created: self.to_create.iter().map(|r| r.gene_id.clone()).collect(),
            deleted: self.to_delete.iter().map(|s| s.record.gene_id.clone()).collect(),
            unchanged: self.unchanged,
        }
    }
}
