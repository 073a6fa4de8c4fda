//! Canonical record types shared by the parsers, the reconciliation engines and the stores

use crate::error::{IngestError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Store identifiers
// ============================================================================

macro_rules! store_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

store_id!(
    /// Primary key of a persisted annotation
    AnnotationId
);
store_id!(
    /// Stable identifier of an edge type, assigned on first creation
    EdgeTypeId
);
store_id!(AnalysisId);
store_id!(MetaKeyId);

// ============================================================================
// Annotations
// ============================================================================

/// Canonical description of a gene. Absent fields are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub gene_id: String,
    pub name: String,
    pub full_name: String,
    pub gene_type: String,
    pub gene_family: String,
}

impl AnnotationRecord {
    pub fn new(gene_id: impl Into<String>) -> Self {
        Self {
            gene_id: gene_id.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    pub fn with_gene_type(mut self, gene_type: impl Into<String>) -> Self {
        self.gene_type = gene_type.into();
        self
    }

    pub fn with_gene_family(mut self, gene_family: impl Into<String>) -> Self {
        self.gene_family = gene_family.into();
        self
    }

    /// Compare the descriptive fields, ignoring the identifier
    pub fn fields_differ(&self, other: &AnnotationRecord) -> bool {
        self.name != other.name
            || self.full_name != other.full_name
            || self.gene_type != other.gene_type
            || self.gene_family != other.gene_family
    }
}

/// A persisted annotation together with its store key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAnnotation {
    pub id: AnnotationId,
    pub record: AnnotationRecord,
}

/// Every annotation in the store at the moment an import begins, keyed by gene id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSnapshot {
    entries: IndexMap<String, StoredAnnotation>,
}

impl AnnotationSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot, rejecting repeated gene identifiers
    pub fn from_stored(stored: impl IntoIterator<Item = StoredAnnotation>) -> Result<Self> {
        let mut entries = IndexMap::new();
        for annotation in stored {
            let gene_id = annotation.record.gene_id.clone();
            if entries.insert(gene_id.clone(), annotation).is_some() {
                return Err(IngestError::DuplicateKey(format!(
                    "gene {gene_id} appears twice in the annotation snapshot"
                )));
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, gene_id: &str) -> Option<&StoredAnnotation> {
        self.entries.get(gene_id)
    }

    pub fn id_of(&self, gene_id: &str) -> Option<AnnotationId> {
        self.entries.get(gene_id).map(|a| a.id)
    }

    pub fn contains(&self, gene_id: &str) -> bool {
        self.entries.contains_key(gene_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredAnnotation> {
        self.entries.values()
    }
}

/// An incoming annotation dataset with unique gene identifiers, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationBatch {
    records: IndexMap<String, AnnotationRecord>,
}

impl AnnotationBatch {
    pub fn from_records(records: impl IntoIterator<Item = AnnotationRecord>) -> Result<Self> {
        let mut map = IndexMap::new();
        for record in records {
            let gene_id = record.gene_id.clone();
            if map.insert(gene_id.clone(), record).is_some() {
                return Err(IngestError::DuplicateKey(format!(
                    "gene {gene_id} appears more than once in the annotation file"
                )));
            }
        }
        Ok(Self { records: map })
    }

    pub fn get(&self, gene_id: &str) -> Option<&AnnotationRecord> {
        self.records.get(gene_id)
    }

    pub fn contains(&self, gene_id: &str) -> bool {
        self.records.contains_key(gene_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnnotationRecord> {
        self.records.values()
    }
}

// ============================================================================
// Edges
// ============================================================================

/// Categorical label of a gene-gene relationship
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeType {
    pub id: EdgeTypeId,
    pub name: String,
    pub directional: bool,
}

/// One row of an additional-edges file before gene and type resolution
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EdgeRow {
    pub source: String,
    pub target: String,
    pub edge: String,
}

/// An edge whose type and endpoints have been resolved against the store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEdge {
    pub edge_type: EdgeTypeId,
    pub source: AnnotationId,
    pub target: AnnotationId,
    pub score: Option<f64>,
    pub rank: Option<u32>,
}

impl ResolvedEdge {
    /// Identity of the edge for deduplication
    pub fn key(&self) -> (EdgeTypeId, AnnotationId, AnnotationId) {
        (self.edge_type, self.source, self.target)
    }

    pub fn reversed(&self) -> Self {
        Self {
            source: self.target,
            target: self.source,
            ..*self
        }
    }
}

// ============================================================================
// Experiments
// ============================================================================

/// One target row of an expression or binding data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRow {
    pub gene_id: String,
    pub log2_fold_change: Option<f64>,
    pub p_value: Option<f64>,
}

/// Parsed expression/binding data
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExperimentData {
    pub rows: Vec<ExperimentRow>,
    /// True when the file carried fold change and p-value columns
    pub has_scores: bool,
}

/// Fold change and p-value of one target within an analysis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regulation {
    pub target: AnnotationId,
    pub log2_fold_change: Option<f64>,
    pub p_value: Option<f64>,
}

/// Name of a metadata field shared across analyses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaKey {
    pub id: MetaKeyId,
    pub name: String,
    pub searchable: bool,
}

/// One metadata value attached to an analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisDatum {
    pub key: MetaKeyId,
    pub value: String,
}
