//! End-to-end import tests against the in-memory store
//!
//! Covers the transactional guarantees of each import kind: dry runs and
//! failed validation leave the store untouched, a failed write rolls back
//! everything, and chunking never changes what gets committed.

use tgdb_ingest::models::AnnotationRecord;
use tgdb_ingest::store::MemoryStore;
use tgdb_ingest::{
    AnnotationImportOptions, EdgeFormat, EdgeImportOptions, ImportState, IngestError,
    ReconciliationOrchestrator,
};

const STORED: &[(&str, &str)] = &[("g1", "A"), ("g2", "B"), ("g3", "C")];

const INCOMING: &str = "gene_id,name,fullname,gene_type,gene_family\n\
                        g1,A,,,\n\
                        g2,B2,,,\n\
                        g4,D,,,\n";

const EXPRESSION: &str = "gene,log2fc,padj\n\
                          g1,2.0,0.01\n\
                          g2,-1.5,0.2\n\
                          gX,1.0,0.5\n";

const METADATA: &str = "Transcription_Factor_ID: tf1\n\
                        Experiment_Type: Expression\n\
                        Edge_Type: Induced\n\
                        Experiment_ID: E1\n\
                        Analysis_ID: A1\n\
                        Experimenter: Smith\n";

fn seeded_store() -> MemoryStore {
    MemoryStore::with_annotations(
        STORED
            .iter()
            .map(|(gene, name)| AnnotationRecord::new(*gene).with_name(*name)),
    )
}

fn experiment_store() -> MemoryStore {
    MemoryStore::with_annotations(["tf1", "g1", "g2"].map(AnnotationRecord::new))
}

fn gene_ids(state: &tgdb_ingest::store::MemoryState) -> Vec<&str> {
    state.annotations.values().map(|r| r.gene_id.as_str()).collect()
}

fn network_options(directional: bool) -> EdgeImportOptions {
    EdgeImportOptions {
        format: EdgeFormat::Network,
        directional,
    }
}

// ============================================================================
// Annotations
// ============================================================================

#[tokio::test]
async fn test_annotation_reconciliation() {
    let orchestrator = ReconciliationOrchestrator::new(seeded_store());

    let outcome = orchestrator
        .import_annotations(INCOMING, AnnotationImportOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.state, ImportState::Committed);
    let report = outcome.report.unwrap();
    assert_eq!(report.updated, vec!["g2"]);
    assert_eq!(report.created, vec!["g4"]);
    assert_eq!(report.deleted, vec!["g3"]);
    assert_eq!(report.unchanged, 1);
    assert_eq!(
        (outcome.counts.updated, outcome.counts.created, outcome.counts.deleted),
        (1, 1, 1)
    );

    let state = orchestrator.store().state().await;
    assert_eq!(gene_ids(&state), vec!["g1", "g2", "g4"]);
    assert!(state.annotations.values().any(|r| r.gene_id == "g2" && r.name == "B2"));
}

#[tokio::test]
async fn test_dry_run_leaves_store_unchanged() {
    let store = seeded_store();
    let before = store.state().await;
    let orchestrator = ReconciliationOrchestrator::new(store);

    let outcome = orchestrator
        .import_annotations(
            INCOMING,
            AnnotationImportOptions {
                dry_run: true,
                delete_existing: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.state, ImportState::Diffing);
    assert_eq!(outcome.counts.created, 1);
    assert_eq!(outcome.counts.deleted, 1);
    assert_eq!(orchestrator.store().state().await, before);
}

#[tokio::test]
async fn test_keep_existing_skips_deletes() {
    let orchestrator = ReconciliationOrchestrator::new(seeded_store());

    let outcome = orchestrator
        .import_annotations(
            INCOMING,
            AnnotationImportOptions {
                dry_run: false,
                delete_existing: false,
            },
        )
        .await
        .unwrap();

    assert_eq!(outcome.counts.deleted, 0);
    assert_eq!(outcome.report.unwrap().deleted, vec!["g3"]);
    let state = orchestrator.store().state().await;
    assert_eq!(gene_ids(&state), vec!["g1", "g2", "g3", "g4"]);
}

#[tokio::test]
async fn test_failed_write_rolls_back_annotations() {
    let store = seeded_store();
    let before = store.state().await;
    // The update succeeds, the create that follows fails
    let orchestrator = ReconciliationOrchestrator::new(store.clone().with_write_limit(1));

    let result = orchestrator
        .import_annotations(INCOMING, AnnotationImportOptions::default())
        .await;

    assert!(matches!(result, Err(IngestError::ApplyFailed { .. })));
    assert_eq!(store.state().await, before);
}

#[tokio::test]
async fn test_annotation_chunk_size_does_not_change_result() {
    let incoming: String = std::iter::once("gene_id,name,fullname,gene_type,gene_family\n".into())
        .chain((0..25).map(|i| format!("n{i},N{i},,,\n")))
        .collect();

    let small = ReconciliationOrchestrator::with_batch_size(seeded_store(), 1);
    let large = ReconciliationOrchestrator::with_batch_size(seeded_store(), 1000);
    let options = AnnotationImportOptions::default();

    small.import_annotations(&incoming, options).await.unwrap();
    large.import_annotations(&incoming, options).await.unwrap();

    let state = small.store().state().await;
    assert_eq!(state.annotations.len(), 25);
    assert_eq!(state, large.store().state().await);
}

#[tokio::test]
async fn test_duplicate_incoming_gene_is_rejected() {
    let orchestrator = ReconciliationOrchestrator::new(seeded_store());

    let result = orchestrator
        .import_annotations(
            "gene_id,name,fullname,gene_type,gene_family\ng1,A,,,\ng1,B,,,\n",
            AnnotationImportOptions::default(),
        )
        .await;

    assert!(matches!(result, Err(IngestError::DuplicateKey(_))));
}

// ============================================================================
// Edges
// ============================================================================

#[tokio::test]
async fn test_edges_with_unknown_genes_are_skipped() {
    let orchestrator = ReconciliationOrchestrator::new(seeded_store());

    let outcome = orchestrator
        .import_edges(
            "extra",
            "source,target,edge\ng1,g2,binds\ng2,g3,binds\ng1,gX,binds\n",
            EdgeImportOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.state, ImportState::Committed);
    assert_eq!(outcome.counts.created, 2);
    assert_eq!(outcome.counts.skipped, 1);
    assert_eq!(orchestrator.store().state().await.edges.len(), 2);
}

#[tokio::test]
async fn test_edge_type_is_reused_across_imports() {
    let orchestrator = ReconciliationOrchestrator::new(seeded_store());
    let options = EdgeImportOptions::default();

    orchestrator
        .import_edges("first", "source,target,edge\ng1,g2,binds\n", options)
        .await
        .unwrap();
    let first = orchestrator.store().state().await.edge_types["binds"].id;

    orchestrator
        .import_edges("second", "source,target,edge\ng2,g3,binds\n", options)
        .await
        .unwrap();
    let state = orchestrator.store().state().await;

    assert_eq!(state.edge_types.len(), 1);
    assert_eq!(state.edge_types["binds"].id, first);
    assert!(state.edges.iter().all(|e| e.edge_type == first));
}

#[tokio::test]
async fn test_undirected_network_is_expanded() {
    let orchestrator = ReconciliationOrchestrator::new(seeded_store());

    let outcome = orchestrator
        .import_edges("ppi", "g1 g2\ng2 g1\ng2 g3\n", network_options(false))
        .await
        .unwrap();

    assert_eq!(outcome.counts.created, 4);
    let state = orchestrator.store().state().await;
    assert!(!state.edge_types["ppi"].directional);
    assert_eq!(state.edges.len(), 4);
}

#[tokio::test]
async fn test_reimported_network_adds_no_edges() {
    let orchestrator = ReconciliationOrchestrator::new(seeded_store());

    let first = orchestrator
        .import_edges("ppi", "g1 g2\n", network_options(false))
        .await
        .unwrap();
    let second = orchestrator
        .import_edges("ppi", "g1 g2\ng2 g3\n", network_options(false))
        .await
        .unwrap();

    assert_eq!(first.counts.created, 2);
    assert_eq!(second.counts.created, 2);
    let state = orchestrator.store().state().await;
    assert_eq!(state.edges.len(), 4);
    let keys: std::collections::HashSet<_> = state.edges.iter().map(|e| e.key()).collect();
    assert_eq!(keys.len(), state.edges.len());
}

#[tokio::test]
async fn test_stored_edge_type_keeps_its_directionality() {
    let orchestrator = ReconciliationOrchestrator::new(seeded_store());

    orchestrator
        .import_edges("ppi", "g1 g2\n", network_options(true))
        .await
        .unwrap();
    let outcome = orchestrator
        .import_edges("ppi", "g2 g3\n", network_options(false))
        .await
        .unwrap();

    assert_eq!(outcome.counts.created, 1);
    assert!(orchestrator.store().state().await.edge_types["ppi"].directional);
}

#[tokio::test]
async fn test_scored_network_keeps_scores_and_ranks() {
    let orchestrator = ReconciliationOrchestrator::new(seeded_store());

    orchestrator
        .import_edges("net", "g1 g2 0.5\ng2 g3 0.9\n", network_options(true))
        .await
        .unwrap();

    let state = orchestrator.store().state().await;
    let scored: Vec<(Option<f64>, Option<u32>)> =
        state.edges.iter().map(|e| (e.score, e.rank)).collect();
    assert_eq!(scored, vec![(Some(0.9), Some(1)), (Some(0.5), Some(2))]);
}

#[tokio::test]
async fn test_edge_chunk_size_does_not_change_result() {
    let network: String = (1..=3)
        .flat_map(|a| (1..=3).map(move |b| format!("g{a} g{b}\n")))
        .collect();

    let small = ReconciliationOrchestrator::with_batch_size(seeded_store(), 1);
    let large = ReconciliationOrchestrator::with_batch_size(seeded_store(), 1000);

    small.import_edges("net", &network, network_options(false)).await.unwrap();
    large.import_edges("net", &network, network_options(false)).await.unwrap();

    let state = small.store().state().await;
    assert_eq!(state.edges.len(), 9);
    assert_eq!(state, large.store().state().await);
}

#[tokio::test]
async fn test_failed_edge_write_rolls_back_new_types() {
    let store = seeded_store();
    let before = store.state().await;
    // Creating the edge type succeeds, the edge insert fails
    let orchestrator = ReconciliationOrchestrator::new(store.clone().with_write_limit(1));

    let result = orchestrator
        .import_edges("net", "g1 g2\n", network_options(true))
        .await;

    assert!(matches!(result, Err(IngestError::ApplyFailed { .. })));
    assert_eq!(store.state().await, before);
}

#[tokio::test]
async fn test_bad_network_never_reaches_store() {
    let store = seeded_store();
    let before = store.state().await;
    let orchestrator = ReconciliationOrchestrator::new(store);

    let result = orchestrator
        .import_edges("net", "g1 g2\ng1 g2 g3\n", network_options(true))
        .await;

    assert!(matches!(result, Err(IngestError::BadNetworkFormat(_))));
    assert_eq!(orchestrator.store().state().await, before);
}

// ============================================================================
// Experiments
// ============================================================================

#[tokio::test]
async fn test_experiment_import() {
    let orchestrator = ReconciliationOrchestrator::new(experiment_store());

    let outcome = orchestrator
        .import_experiment(EXPRESSION, ',', METADATA)
        .await
        .unwrap();

    assert_eq!(outcome.state, ImportState::Committed);
    assert_eq!(outcome.counts.created, 2);
    assert_eq!(outcome.counts.skipped, 1);
    let analysis = outcome.analysis_id.unwrap();

    let state = orchestrator.store().state().await;
    assert_eq!(state.analyses.len(), 1);
    assert!(state.analyses.contains_key(&analysis));
    assert_eq!(state.interactions.len(), 2);
    assert_eq!(state.regulations.len(), 2);
    assert_eq!(state.analysis_data.len(), 6);
    assert!(state.meta_keys["EDGE_TYPE"].searchable);
    assert!(state.meta_keys["EXPERIMENTER"].searchable);
    assert!(!state.meta_keys["ANALYSIS_ID"].searchable);
}

#[tokio::test]
async fn test_gene_only_experiment_has_no_regulations() {
    let orchestrator = ReconciliationOrchestrator::new(experiment_store());

    orchestrator
        .import_experiment("gene\ng1\ng2\n", ',', METADATA)
        .await
        .unwrap();

    let state = orchestrator.store().state().await;
    assert_eq!(state.interactions.len(), 2);
    assert!(state.regulations.is_empty());
}

#[tokio::test]
async fn test_repeated_analysis_is_rejected() {
    let orchestrator = ReconciliationOrchestrator::new(experiment_store());
    orchestrator
        .import_experiment(EXPRESSION, ',', METADATA)
        .await
        .unwrap();
    let before = orchestrator.store().state().await;

    let result = orchestrator.import_experiment(EXPRESSION, ',', METADATA).await;

    assert!(matches!(result, Err(IngestError::DuplicateKey(_))));
    assert_eq!(orchestrator.store().state().await, before);

    let second = METADATA.replace("Analysis_ID: A1", "Analysis_ID: A2");
    orchestrator
        .import_experiment(EXPRESSION, ',', &second)
        .await
        .unwrap();
    let state = orchestrator.store().state().await;
    assert_eq!(state.analyses.len(), 2);
    // Keys are shared between analyses
    assert_eq!(state.meta_keys.len(), 6);
}

#[tokio::test]
async fn test_unknown_transcription_factor() {
    let orchestrator = ReconciliationOrchestrator::new(experiment_store());
    let metadata = METADATA.replace("tf1", "tf9");

    let result = orchestrator.import_experiment(EXPRESSION, ',', &metadata).await;

    assert!(matches!(result, Err(IngestError::UnknownGene(_))));
    assert!(orchestrator.store().state().await.analyses.is_empty());
}

#[tokio::test]
async fn test_missing_required_metadata() {
    let orchestrator = ReconciliationOrchestrator::new(experiment_store());

    let no_edge_type = METADATA.replace("Edge_Type: Induced\n", "");
    let result = orchestrator.import_experiment(EXPRESSION, ',', &no_edge_type).await;
    assert!(matches!(result, Err(IngestError::MissingMetadataKey(_))));

    let no_tf = METADATA.replace("Transcription_Factor_ID: tf1\n", "");
    let result = orchestrator.import_experiment(EXPRESSION, ',', &no_tf).await;
    assert!(matches!(result, Err(IngestError::MissingMetadataKey(_))));
}

#[tokio::test]
async fn test_duplicate_target_rows_are_rejected() {
    let orchestrator = ReconciliationOrchestrator::new(experiment_store());

    let result = orchestrator
        .import_experiment("gene\ng1\ng2\ng1\n", ',', METADATA)
        .await;

    assert!(matches!(result, Err(IngestError::DuplicateKey(_))));
    assert!(orchestrator.store().state().await.analyses.is_empty());
}

#[tokio::test]
async fn test_failed_experiment_write_rolls_back() {
    let store = experiment_store();
    let before = store.state().await;
    let orchestrator = ReconciliationOrchestrator::new(store.clone().with_write_limit(3));

    let result = orchestrator.import_experiment(EXPRESSION, ',', METADATA).await;

    assert!(matches!(result, Err(IngestError::ApplyFailed { .. })));
    assert_eq!(store.state().await, before);
}
