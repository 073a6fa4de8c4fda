//! In-memory reference store
//!
//! A transaction works on a private copy of the state and publishes it on
//! commit. Writes can be made to fail after a fixed number of calls to
//! exercise rollback.

use super::{ReferenceStore, StoreTransaction};
use crate::error::{IngestError, Result};
use crate::models::{
    AnalysisDatum, AnalysisId, AnnotationId, AnnotationRecord, AnnotationSnapshot, EdgeType,
    EdgeTypeId, MetaKey, MetaKeyId, Regulation, ResolvedEdge, StoredAnnotation,
};
use crate::parser::metadata::keys;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Committed contents of a [`MemoryStore`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryState {
    pub annotations: IndexMap<AnnotationId, AnnotationRecord>,
    pub edge_types: IndexMap<String, EdgeType>,
    pub edges: Vec<ResolvedEdge>,
    /// Analysis to its transcription factor
    pub analyses: IndexMap<AnalysisId, AnnotationId>,
    pub meta_keys: IndexMap<String, MetaKey>,
    pub analysis_data: Vec<(AnalysisId, AnalysisDatum)>,
    pub interactions: Vec<(AnalysisId, AnnotationId)>,
    pub regulations: Vec<(AnalysisId, Regulation)>,
    last_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn insert_annotation(&mut self, record: AnnotationRecord) -> AnnotationId {
        let id = AnnotationId(self.next_id());
        self.annotations.insert(id, record);
        id
    }

    fn metadata_value(&self, analysis: AnalysisId, key: &str) -> Option<&str> {
        let key = self.meta_keys.get(key)?.id;
        self.analysis_data
            .iter()
            .find(|(a, datum)| *a == analysis && datum.key == key)
            .map(|(_, datum)| datum.value.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    write_limit: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `records`, in order
    pub fn with_annotations(records: impl IntoIterator<Item = AnnotationRecord>) -> Self {
        let mut state = MemoryState::default();
        for record in records {
            state.insert_annotation(record);
        }
        Self {
            state: Arc::new(Mutex::new(state)),
            write_limit: None,
        }
    }

    /// Make every transaction fail on its write after the first `writes`
    ///
    /// Clones share state, so a limited clone can fail an import while the
    /// original is used to inspect what was committed.
    pub fn with_write_limit(mut self, writes: usize) -> Self {
        self.write_limit = Some(writes);
        self
    }

    /// Copy of the committed state
    pub async fn state(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn annotation_snapshot(&self) -> Result<AnnotationSnapshot> {
        let state = self.state.lock().await;
        AnnotationSnapshot::from_stored(state.annotations.iter().map(|(id, record)| {
            StoredAnnotation {
                id: *id,
                record: record.clone(),
            }
        }))
    }

    async fn analysis_exists(&self, experiment_id: &str, analysis_id: &str) -> Result<bool> {
        let state = self.state.lock().await;
        Ok(state.analyses.keys().any(|&analysis| {
            state.metadata_value(analysis, keys::EXPERIMENT_ID) == Some(experiment_id)
                && state.metadata_value(analysis, keys::ANALYSIS_ID) == Some(analysis_id)
        }))
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let working = self.state.lock().await.clone();
        Ok(Box::new(MemoryTransaction {
            shared: Arc::clone(&self.state),
            working,
            writes_left: self.write_limit,
        }))
    }
}

struct MemoryTransaction {
    shared: Arc<Mutex<MemoryState>>,
    working: MemoryState,
    writes_left: Option<usize>,
}

impl MemoryTransaction {
    fn record_write(&mut self, operation: &str) -> Result<()> {
        if let Some(left) = self.writes_left.as_mut() {
            if *left == 0 {
                return Err(IngestError::Store(format!("write limit reached during {operation}")));
            }
            *left -= 1;
        }
        Ok(())
    }

    fn require_annotation(&self, id: AnnotationId) -> Result<()> {
        if self.working.annotations.contains_key(&id) {
            Ok(())
        } else {
            Err(IngestError::Store(format!("annotation {id} does not exist")))
        }
    }

    fn require_analysis(&self, id: AnalysisId) -> Result<()> {
        if self.working.analyses.contains_key(&id) {
            Ok(())
        } else {
            Err(IngestError::Store(format!("analysis {id} does not exist")))
        }
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get_or_create_edge_type(&mut self, name: &str, directional: bool) -> Result<EdgeType> {
        if let Some(existing) = self.working.edge_types.get(name) {
            return Ok(existing.clone());
        }

        self.record_write("get_or_create_edge_type")?;
        let edge_type = EdgeType {
            id: EdgeTypeId(self.working.next_id()),
            name: name.to_string(),
            directional,
        };
        self.working
            .edge_types
            .insert(name.to_string(), edge_type.clone());
        Ok(edge_type)
    }

    async fn update_annotation(
        &mut self,
        id: AnnotationId,
        record: &AnnotationRecord,
    ) -> Result<()> {
        self.record_write("update_annotation")?;
        self.require_annotation(id)?;
        self.working.annotations.insert(id, record.clone());
        Ok(())
    }

    async fn bulk_create_annotations(&mut self, records: &[AnnotationRecord]) -> Result<usize> {
        self.record_write("bulk_create_annotations")?;

        let existing: HashSet<&str> = self
            .working
            .annotations
            .values()
            .map(|r| r.gene_id.as_str())
            .collect();
        if let Some(dup) = records.iter().find(|r| existing.contains(r.gene_id.as_str())) {
            return Err(IngestError::Store(format!(
                "annotation for {} already exists",
                dup.gene_id
            )));
        }

        for record in records {
            self.working.insert_annotation(record.clone());
        }
        Ok(records.len())
    }

    async fn bulk_delete_annotations(&mut self, ids: &[AnnotationId]) -> Result<usize> {
        self.record_write("bulk_delete_annotations")?;

        let doomed: HashSet<AnnotationId> = ids.iter().copied().collect();
        let before = self.working.annotations.len();
        self.working.annotations.retain(|id, _| !doomed.contains(id));

        // Cascade to everything that references a deleted gene
        let state = &mut self.working;
        state
            .edges
            .retain(|e| !doomed.contains(&e.source) && !doomed.contains(&e.target));
        let dropped: HashSet<AnalysisId> = state
            .analyses
            .iter()
            .filter(|(_, tf)| doomed.contains(tf))
            .map(|(id, _)| *id)
            .collect();
        state.analyses.retain(|id, _| !dropped.contains(id));
        state.analysis_data.retain(|(a, _)| !dropped.contains(a));
        state
            .interactions
            .retain(|(a, target)| !dropped.contains(a) && !doomed.contains(target));
        state
            .regulations
            .retain(|(a, r)| !dropped.contains(a) && !doomed.contains(&r.target));

        Ok(before - state.annotations.len())
    }

    async fn bulk_create_edges(&mut self, edges: &[ResolvedEdge]) -> Result<usize> {
        self.record_write("bulk_create_edges")?;
        for edge in edges {
            self.require_annotation(edge.source)?;
            self.require_annotation(edge.target)?;
        }

        let mut stored: HashSet<_> = self.working.edges.iter().map(ResolvedEdge::key).collect();
        let before = self.working.edges.len();
        for edge in edges {
            if stored.insert(edge.key()) {
                self.working.edges.push(*edge);
            }
        }
        Ok(self.working.edges.len() - before)
    }

    async fn create_analysis(&mut self, tf: AnnotationId) -> Result<AnalysisId> {
        self.record_write("create_analysis")?;
        self.require_annotation(tf)?;
        let id = AnalysisId(self.working.next_id());
        self.working.analyses.insert(id, tf);
        Ok(id)
    }

    async fn get_or_create_meta_key(&mut self, name: &str, searchable: bool) -> Result<MetaKey> {
        if let Some(existing) = self.working.meta_keys.get(name) {
            return Ok(existing.clone());
        }

        self.record_write("get_or_create_meta_key")?;
        let key = MetaKey {
            id: MetaKeyId(self.working.next_id()),
            name: name.to_string(),
            searchable,
        };
        self.working.meta_keys.insert(name.to_string(), key.clone());
        Ok(key)
    }

    async fn bulk_create_analysis_data(
        &mut self,
        analysis: AnalysisId,
        data: &[AnalysisDatum],
    ) -> Result<usize> {
        self.record_write("bulk_create_analysis_data")?;
        self.require_analysis(analysis)?;
        self.working
            .analysis_data
            .extend(data.iter().cloned().map(|datum| (analysis, datum)));
        Ok(data.len())
    }

    async fn bulk_create_interactions(
        &mut self,
        analysis: AnalysisId,
        targets: &[AnnotationId],
    ) -> Result<usize> {
        self.record_write("bulk_create_interactions")?;
        self.require_analysis(analysis)?;
        for &target in targets {
            self.require_annotation(target)?;
        }
        self.working
            .interactions
            .extend(targets.iter().map(|&target| (analysis, target)));
        Ok(targets.len())
    }

    async fn bulk_create_regulations(
        &mut self,
        analysis: AnalysisId,
        regulations: &[Regulation],
    ) -> Result<usize> {
        self.record_write("bulk_create_regulations")?;
        self.require_analysis(analysis)?;
        for regulation in regulations {
            self.require_annotation(regulation.target)?;
        }
        self.working
            .regulations
            .extend(regulations.iter().map(|&r| (analysis, r)));
        Ok(regulations.len())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { shared, working, .. } = *self;
        *shared.lock().await = working;
        debug!("Committed in-memory transaction");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!("Rolled back in-memory transaction");
        Ok(())
    }
}
