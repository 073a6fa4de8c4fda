//! Transactional reference store interface
//!
//! The reconciliation engines only see these two traits. Reads that happen
//! before an import's apply phase go through [`ReferenceStore`]; every write
//! goes through a [`StoreTransaction`] that is either committed as a whole or
//! discarded. Dropping a transaction without committing it discards it.

mod memory;
#[cfg(feature = "database")]
mod postgres;

pub use memory::{MemoryState, MemoryStore};
#[cfg(feature = "database")]
pub use postgres::{PgStore, PgStoreTransaction};

use crate::error::Result;
use crate::models::{
    AnalysisDatum, AnalysisId, AnnotationId, AnnotationRecord, AnnotationSnapshot, EdgeType,
    MetaKey, Regulation, ResolvedEdge,
};
use async_trait::async_trait;

#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Every stored annotation, keyed by gene id
    async fn annotation_snapshot(&self) -> Result<AnnotationSnapshot>;

    /// Whether an analysis carrying both metadata values already exists
    async fn analysis_exists(&self, experiment_id: &str, analysis_id: &str) -> Result<bool>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

#[async_trait]
pub trait StoreTransaction: Send {
    /// Return the edge type called `name`, creating it with `directional` if
    /// it does not exist. Existing types keep their directionality.
    async fn get_or_create_edge_type(&mut self, name: &str, directional: bool) -> Result<EdgeType>;

    async fn update_annotation(&mut self, id: AnnotationId, record: &AnnotationRecord)
        -> Result<()>;

    async fn bulk_create_annotations(&mut self, records: &[AnnotationRecord]) -> Result<usize>;

    async fn bulk_delete_annotations(&mut self, ids: &[AnnotationId]) -> Result<usize>;

    /// Insert edges whose `(type, source, target)` is not stored yet;
    /// returns how many were inserted
    async fn bulk_create_edges(&mut self, edges: &[ResolvedEdge]) -> Result<usize>;

    /// Create an analysis of the transcription factor `tf`
    async fn create_analysis(&mut self, tf: AnnotationId) -> Result<AnalysisId>;

    async fn get_or_create_meta_key(&mut self, name: &str, searchable: bool) -> Result<MetaKey>;

    async fn bulk_create_analysis_data(
        &mut self,
        analysis: AnalysisId,
        data: &[AnalysisDatum],
    ) -> Result<usize>;

    async fn bulk_create_interactions(
        &mut self,
        analysis: AnalysisId,
        targets: &[AnnotationId],
    ) -> Result<usize>;

    async fn bulk_create_regulations(
        &mut self,
        analysis: AnalysisId,
        regulations: &[Regulation],
    ) -> Result<usize>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
