//! TGDB Ingest Library
//!
//! Reconciles loosely formatted biological tables against a transactional
//! reference store.
//!
//! # Components
//!
//! - **parser**: metadata, expression tables, networks, gene lists and annotation CSVs
//! - **diff**: create/update/delete classification of incoming annotations
//! - **edge_types**: edge type resolution and undirected edge expansion
//! - **gene_sets**: per-gene membership across named lists and networks
//! - **orchestrator**: parse, validate, reconcile and apply one import atomically
//! - **store**: the store traits, an in-memory store and a PostgreSQL store
//!
//! # Example
//!
//! ```no_run
//! use tgdb_ingest::orchestrator::{AnnotationImportOptions, ReconciliationOrchestrator};
//! use tgdb_ingest::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = ReconciliationOrchestrator::new(MemoryStore::new());
//!     let text = std::fs::read_to_string("annotations.csv")?;
//!     let outcome = orchestrator
//!         .import_annotations(&text, AnnotationImportOptions::default())
//!         .await?;
//!     println!("{} created", outcome.counts.created);
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod diff;
pub mod edge_types;
pub mod error;
pub mod gene_sets;
pub mod models;
pub mod orchestrator;
pub mod parser;
pub mod store;
pub mod validation;

pub use error::{IngestError, Result};
pub use gene_sets::{GeneSetIndex, MembershipRow};
pub use orchestrator::{
    AnnotationImportOptions, EdgeFormat, EdgeImportOptions, ImportCounts, ImportOutcome,
    ImportState, ReconciliationOrchestrator,
};
