//! Import orchestration
//!
//! Each import moves through `Parsing -> Validating -> Diffing -> Applying`
//! and ends `Committed` or `Failed`. Every store write happens inside one
//! transaction opened in `Applying`; an error there rolls the transaction
//! back and is reported as [`IngestError::ApplyFailed`]. Errors before
//! `Applying` never reach the store.

use crate::diff::{diff, AnnotationDiff, DiffReport};
use crate::edge_types::{
    directionality, expand_undirected, resolve_endpoints, EdgeCandidate, EdgeTypeResolver,
};
use crate::error::{IngestError, Result};
use crate::models::{
    AnalysisDatum, AnalysisId, AnnotationId, AnnotationSnapshot, ExperimentData, Regulation,
};
use crate::parser::metadata::{keys, MetadataRecord};
use crate::parser::{
    parse_annotations, parse_edge_table, parse_metadata, parse_network, parse_tabular_data,
};
use crate::store::{ReferenceStore, StoreTransaction};
use crate::validation::ensure_unique_genes;
use serde::Serialize;
use std::fmt;
use tgdb_common::config::{IngestConfig, DEFAULT_BATCH_SIZE};
use tracing::{debug, error, field, info, instrument, warn, Span};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportState {
    Parsing,
    Validating,
    Diffing,
    Applying,
    Committed,
    Failed,
}

impl fmt::Display for ImportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportState::Parsing => "parsing",
            ImportState::Validating => "validating",
            ImportState::Diffing => "diffing",
            ImportState::Applying => "applying",
            ImportState::Committed => "committed",
            ImportState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
}

/// Result of a finished import
///
/// A dry run stops in `Diffing` and its counts describe what would have
/// been written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub import_id: Uuid,
    pub state: ImportState,
    pub report: Option<DiffReport>,
    pub counts: ImportCounts,
    pub analysis_id: Option<AnalysisId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationImportOptions {
    /// Compute and log the diff without writing
    pub dry_run: bool,
    /// Delete stored annotations missing from the incoming file
    pub delete_existing: bool,
}

impl Default for AnnotationImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            delete_existing: true,
        }
    }
}

impl AnnotationImportOptions {
    pub fn from_config(config: &IngestConfig) -> Self {
        Self {
            dry_run: false,
            delete_existing: config.delete_existing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeFormat {
    /// CSV of `source, target, edge`
    #[default]
    Table,
    /// Whitespace-delimited network file
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeImportOptions {
    pub format: EdgeFormat,
    /// Directionality given to edge types created by this import
    pub directional: bool,
}

impl Default for EdgeImportOptions {
    fn default() -> Self {
        Self {
            format: EdgeFormat::Table,
            directional: true,
        }
    }
}

impl EdgeImportOptions {
    pub fn from_config(format: EdgeFormat, config: &IngestConfig) -> Self {
        Self {
            format,
            directional: config.directional_edges,
        }
    }
}

/// Sequences parsing, reconciliation and transactional apply against a store
pub struct ReconciliationOrchestrator<S> {
    store: S,
    batch_size: usize,
}

impl<S: ReferenceStore> ReconciliationOrchestrator<S> {
    pub fn new(store: S) -> Self {
        Self::with_batch_size(store, DEFAULT_BATCH_SIZE)
    }

    /// Bulk writes are issued in chunks of at most `batch_size` records
    pub fn with_batch_size(store: S, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn from_config(store: S, config: &IngestConfig) -> Self {
        Self::with_batch_size(store, config.batch_size)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    // ========================================================================
    // Annotations
    // ========================================================================

    /// Reconcile the stored annotations with an annotation CSV
    #[instrument(skip_all, fields(import_id = field::Empty, dry_run = options.dry_run))]
    pub async fn import_annotations(
        &self,
        text: &str,
        options: AnnotationImportOptions,
    ) -> Result<ImportOutcome> {
        let mut run = ImportRun::start("annotations");
        let result = self.run_annotations(&mut run, text, options).await;
        result.map_err(|e| run.fail(e))
    }

    async fn run_annotations(
        &self,
        run: &mut ImportRun,
        text: &str,
        options: AnnotationImportOptions,
    ) -> Result<ImportOutcome> {
        let batch = parse_annotations(text)?;

        run.advance(ImportState::Validating);
        let snapshot = self.store.annotation_snapshot().await?;

        run.advance(ImportState::Diffing);
        let changes = diff(&snapshot, &batch);
        let report = changes.report();
        info!(
            import_id = %run.id,
            update = report.updated.len(),
            create = report.created.len(),
            delete = report.deleted.len(),
            unchanged = report.unchanged,
            "Annotation diff computed"
        );

        if options.dry_run {
            info!(
                import_id = %run.id,
                report = %serde_json::to_string(&report).unwrap_or_default(),
                "Dry run, nothing written"
            );
            let counts = ImportCounts {
                created: changes.to_create.len(),
                updated: changes.to_update.len(),
                deleted: if options.delete_existing { changes.to_delete.len() } else { 0 },
                skipped: 0,
            };
            return Ok(run.outcome(Some(report), counts, None));
        }

        run.advance(ImportState::Applying);
        let mut tx = self.begin().await?;
        let counts = match self
            .apply_annotations(tx.as_mut(), &changes, options.delete_existing)
            .await
        {
            Ok(counts) => counts,
            Err(e) => return Err(abort(tx, e).await),
        };
        tx.commit().await.map_err(IngestError::apply_failed)?;

        run.advance(ImportState::Committed);
        Ok(run.outcome(Some(report), counts, None))
    }

    async fn apply_annotations(
        &self,
        tx: &mut dyn StoreTransaction,
        changes: &AnnotationDiff,
        delete_existing: bool,
    ) -> Result<ImportCounts> {
        let mut counts = ImportCounts::default();

        for update in &changes.to_update {
            tx.update_annotation(update.id, &update.record).await?;
            counts.updated += 1;
        }

        let total = chunk_total(changes.to_create.len(), self.batch_size);
        for (idx, chunk) in changes.to_create.chunks(self.batch_size).enumerate() {
            debug!(chunk = idx + 1, total, size = chunk.len(), "Creating annotations");
            counts.created += tx.bulk_create_annotations(chunk).await?;
        }

        if delete_existing && !changes.to_delete.is_empty() {
            let ids: Vec<AnnotationId> = changes.to_delete.iter().map(|s| s.id).collect();
            for chunk in ids.chunks(self.batch_size) {
                counts.deleted += tx.bulk_delete_annotations(chunk).await?;
            }
        }

        Ok(counts)
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Import additional edges between annotated genes
    ///
    /// `name` labels the edges of network files without an edge column.
    #[instrument(
        skip_all,
        fields(import_id = field::Empty, name = %name, format = ?options.format)
    )]
    pub async fn import_edges(
        &self,
        name: &str,
        text: &str,
        options: EdgeImportOptions,
    ) -> Result<ImportOutcome> {
        let mut run = ImportRun::start("edges");
        let result = self.run_edges(&mut run, name, text, options).await;
        result.map_err(|e| run.fail(e))
    }

    async fn run_edges(
        &self,
        run: &mut ImportRun,
        name: &str,
        text: &str,
        options: EdgeImportOptions,
    ) -> Result<ImportOutcome> {
        match options.format {
            EdgeFormat::Table => {
                let rows = parse_edge_table(text)?;
                self.reconcile_edges(run, &rows, options.directional).await
            },
            EdgeFormat::Network => {
                let network = parse_network(name, text)?;
                debug!(import_id = %run.id, layout = ?network.layout, "Parsed network");
                self.reconcile_edges(run, &network.edges, options.directional)
                    .await
            },
        }
    }

    async fn reconcile_edges<E>(
        &self,
        run: &mut ImportRun,
        rows: &[E],
        directional: bool,
    ) -> Result<ImportOutcome>
    where
        E: EdgeCandidate + Sync,
    {
        run.advance(ImportState::Validating);
        let snapshot = self.store.annotation_snapshot().await?;

        run.advance(ImportState::Diffing);
        run.advance(ImportState::Applying);
        let mut tx = self.begin().await?;
        let counts = match self
            .apply_edges(tx.as_mut(), &snapshot, rows, directional)
            .await
        {
            Ok(counts) => counts,
            Err(e) => return Err(abort(tx, e).await),
        };
        tx.commit().await.map_err(IngestError::apply_failed)?;

        if counts.skipped > 0 {
            warn!(
                import_id = %run.id,
                skipped = counts.skipped,
                "Edges with unknown genes were skipped"
            );
        }
        run.advance(ImportState::Committed);
        Ok(run.outcome(None, counts, None))
    }

    async fn apply_edges<E>(
        &self,
        tx: &mut dyn StoreTransaction,
        snapshot: &AnnotationSnapshot,
        rows: &[E],
        directional: bool,
    ) -> Result<ImportCounts>
    where
        E: EdgeCandidate + Sync,
    {
        let mut resolver = EdgeTypeResolver::new(directional);
        let types = resolver.resolve(tx, rows.iter().map(|r| r.edge())).await?;

        let (resolved, skipped) = resolve_endpoints(snapshot, rows, &types);
        let edges = expand_undirected(&resolved, directionality(&types));

        let mut created = 0;
        let total = chunk_total(edges.len(), self.batch_size);
        for (idx, chunk) in edges.chunks(self.batch_size).enumerate() {
            debug!(chunk = idx + 1, total, size = chunk.len(), "Creating edges");
            created += tx.bulk_create_edges(chunk).await?;
        }

        Ok(ImportCounts {
            created,
            skipped,
            ..ImportCounts::default()
        })
    }

    // ========================================================================
    // Experiments
    // ========================================================================

    /// Import one analysis from an expression/binding table and its metadata
    #[instrument(skip_all, fields(import_id = field::Empty))]
    pub async fn import_experiment(
        &self,
        data_text: &str,
        delimiter: char,
        metadata_text: &str,
    ) -> Result<ImportOutcome> {
        let mut run = ImportRun::start("experiment");
        let result = self.run_experiment(&mut run, data_text, delimiter, metadata_text).await;
        result.map_err(|e| run.fail(e))
    }

    async fn run_experiment(
        &self,
        run: &mut ImportRun,
        data_text: &str,
        delimiter: char,
        metadata_text: &str,
    ) -> Result<ImportOutcome> {
        let data = parse_tabular_data(data_text, delimiter)?;
        let metadata = parse_metadata(metadata_text)?;

        run.advance(ImportState::Validating);
        let snapshot = self.store.annotation_snapshot().await?;
        let tf = self.validate_experiment(&snapshot, &data, &metadata).await?;

        run.advance(ImportState::Diffing);
        let mut targets = Vec::with_capacity(data.rows.len());
        let mut regulations = Vec::new();
        let mut skipped = 0;
        for row in &data.rows {
            let Some(target) = snapshot.id_of(&row.gene_id) else {
                debug!(gene = %row.gene_id, "Skipping target missing from annotations");
                skipped += 1;
                continue;
            };
            targets.push(target);
            if data.has_scores {
                regulations.push(Regulation {
                    target,
                    log2_fold_change: row.log2_fold_change,
                    p_value: row.p_value,
                });
            }
        }
        if skipped > 0 {
            warn!(import_id = %run.id, skipped, "Targets missing from annotations were skipped");
        }

        run.advance(ImportState::Applying);
        let mut tx = self.begin().await?;
        let analysis = match self
            .apply_experiment(tx.as_mut(), tf, &metadata, &targets, &regulations)
            .await
        {
            Ok(analysis) => analysis,
            Err(e) => return Err(abort(tx, e).await),
        };
        tx.commit().await.map_err(IngestError::apply_failed)?;

        info!(
            import_id = %run.id,
            analysis_id = %analysis,
            targets = targets.len(),
            "Analysis created"
        );
        run.advance(ImportState::Committed);
        let counts = ImportCounts {
            created: targets.len(),
            skipped,
            ..ImportCounts::default()
        };
        Ok(run.outcome(None, counts, Some(analysis)))
    }

    /// Checks that must pass before anything is written; returns the
    /// transcription factor's annotation
    async fn validate_experiment(
        &self,
        snapshot: &AnnotationSnapshot,
        data: &ExperimentData,
        metadata: &MetadataRecord,
    ) -> Result<AnnotationId> {
        let tf_gene = metadata.require(keys::TRANSCRIPTION_FACTOR_ID)?;
        let tf = snapshot.id_of(tf_gene).ok_or_else(|| {
            IngestError::UnknownGene(format!("transcription factor {tf_gene} does not exist"))
        })?;

        metadata.require(keys::EDGE_TYPE)?;
        metadata.require(keys::EXPERIMENT_TYPE)?;

        ensure_unique_genes(data.rows.iter().map(|r| r.gene_id.as_str()))?;

        if let (Some(experiment), Some(analysis)) =
            (metadata.get(keys::EXPERIMENT_ID), metadata.get(keys::ANALYSIS_ID))
        {
            if self.store.analysis_exists(experiment, analysis).await? {
                return Err(IngestError::DuplicateKey(format!(
                    "experiment {experiment} already has an analysis {analysis}"
                )));
            }
        }

        Ok(tf)
    }

    async fn apply_experiment(
        &self,
        tx: &mut dyn StoreTransaction,
        tf: AnnotationId,
        metadata: &MetadataRecord,
        targets: &[AnnotationId],
        regulations: &[Regulation],
    ) -> Result<AnalysisId> {
        let analysis = tx.create_analysis(tf).await?;

        let mut data = Vec::with_capacity(metadata.len());
        for (key, value) in metadata.iter() {
            let meta_key = tx
                .get_or_create_meta_key(key, keys::is_searchable(key))
                .await?;
            data.push(AnalysisDatum {
                key: meta_key.id,
                value: value.to_string(),
            });
        }
        for chunk in data.chunks(self.batch_size) {
            tx.bulk_create_analysis_data(analysis, chunk).await?;
        }

        let total = chunk_total(targets.len(), self.batch_size);
        for (idx, chunk) in targets.chunks(self.batch_size).enumerate() {
            debug!(chunk = idx + 1, total, size = chunk.len(), "Creating interactions");
            tx.bulk_create_interactions(analysis, chunk).await?;
        }

        for chunk in regulations.chunks(self.batch_size) {
            tx.bulk_create_regulations(analysis, chunk).await?;
        }

        Ok(analysis)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        self.store.begin().await.map_err(IngestError::apply_failed)
    }
}

/// Roll back after a failed write and wrap the cause
async fn abort(tx: Box<dyn StoreTransaction>, cause: IngestError) -> IngestError {
    if let Err(e) = tx.rollback().await {
        error!(error = %e, "Rollback failed");
    }
    IngestError::apply_failed(cause)
}

fn chunk_total(len: usize, size: usize) -> usize {
    len.div_ceil(size)
}

/// Identity and state of one import, logged on every transition
struct ImportRun {
    id: Uuid,
    kind: &'static str,
    state: ImportState,
}

impl ImportRun {
    fn start(kind: &'static str) -> Self {
        let id = Uuid::new_v4();
        Span::current().record("import_id", field::display(id));
        info!(import_id = %id, kind, "Import started");
        Self {
            id,
            kind,
            state: ImportState::Parsing,
        }
    }

    fn advance(&mut self, next: ImportState) {
        debug!(
            import_id = %self.id,
            kind = self.kind,
            from = %self.state,
            to = %next,
            "Import state changed"
        );
        self.state = next;
    }

    fn fail(&mut self, err: IngestError) -> IngestError {
        error!(
            import_id = %self.id,
            kind = self.kind,
            state = %self.state,
            validation = err.is_validation(),
            error = %err,
            "Import failed"
        );
        self.state = ImportState::Failed;
        err
    }

    fn outcome(
        &self,
        report: Option<DiffReport>,
        counts: ImportCounts,
        analysis_id: Option<AnalysisId>,
    ) -> ImportOutcome {
        info!(
            import_id = %self.id,
            kind = self.kind,
            state = %self.state,
            created = counts.created,
            updated = counts.updated,
            deleted = counts.deleted,
            skipped = counts.skipped,
            "Import finished"
        );
        ImportOutcome {
            import_id: self.id,
            state: self.state,
            report,
            counts,
            analysis_id,
        }
    }
}
