//! PostgreSQL reference store
//!
//! Bulk writes use multi-row `INSERT ... VALUES` built with
//! [`QueryBuilder::push_values`]; callers keep each call within the
//! configured batch size. Get-or-create goes through `ON CONFLICT` so two
//! imports racing on the same name still see a single row.

use super::{ReferenceStore, StoreTransaction};
use crate::error::Result;
use crate::models::{
    AnalysisDatum, AnalysisId, AnnotationId, AnnotationRecord, AnnotationSnapshot, EdgeType,
    EdgeTypeId, MetaKey, MetaKeyId, Regulation, ResolvedEdge, StoredAnnotation,
};
use crate::parser::metadata::keys;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder, Transaction};
use tgdb_common::config::DatabaseConfig;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Database connection pool created");

        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl ReferenceStore for PgStore {
    async fn annotation_snapshot(&self) -> Result<AnnotationSnapshot> {
        let rows: Vec<(i64, String, String, String, String, String)> = sqlx::query_as(
            r#"
            SELECT
                id,
                gene_id,
                COALESCE(name, ''),
                COALESCE(fullname, ''),
                COALESCE(gene_type, ''),
                COALESCE(gene_family, '')
            FROM annotation
            ORDER BY id
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        debug!(annotations = rows.len(), "Loaded annotation snapshot");

        AnnotationSnapshot::from_stored(rows.into_iter().map(
            |(id, gene_id, name, full_name, gene_type, gene_family)| StoredAnnotation {
                id: AnnotationId(id),
                record: AnnotationRecord {
                    gene_id,
                    name,
                    full_name,
                    gene_type,
                    gene_family,
                },
            },
        ))
    }

    async fn analysis_exists(&self, experiment_id: &str, analysis_id: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM analysis_data e
                JOIN meta_key ek ON ek.id = e.key_id AND ek.name = $1
                JOIN analysis_data a ON a.analysis_id = e.analysis_id
                JOIN meta_key ak ON ak.id = a.key_id AND ak.name = $2
                WHERE e.value = $3 AND a.value = $4
            )
            "#,
        )
        .bind(keys::EXPERIMENT_ID)
        .bind(keys::ANALYSIS_ID)
        .bind(experiment_id)
        .bind(analysis_id)
        .fetch_one(&self.db)
        .await?;

        Ok(exists)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

/// An open PostgreSQL transaction; dropping it rolls back
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn get_or_create_edge_type(&mut self, name: &str, directional: bool) -> Result<EdgeType> {
        let (id, name, directional): (i64, String, bool) = sqlx::query_as(
            r#"
            INSERT INTO edge_type (name, directional)
            VALUES ($1, $2)
            ON CONFLICT (name)
            DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, directional
            "#,
        )
        .bind(name)
        .bind(directional)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(EdgeType {
            id: EdgeTypeId(id),
            name,
            directional,
        })
    }

    async fn update_annotation(
        &mut self,
        id: AnnotationId,
        record: &AnnotationRecord,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE annotation
            SET name = $2, fullname = $3, gene_type = $4, gene_family = $5
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .bind(&record.name)
        .bind(&record.full_name)
        .bind(&record.gene_type)
        .bind(&record.gene_family)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn bulk_create_annotations(&mut self, records: &[AnnotationRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO annotation (gene_id, name, fullname, gene_type, gene_family) ",
        );
        query_builder.push_values(records, |mut b, record| {
            b.push_bind(&record.gene_id)
                .push_bind(&record.name)
                .push_bind(&record.full_name)
                .push_bind(&record.gene_type)
                .push_bind(&record.gene_family);
        });

        let result = query_builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn bulk_delete_annotations(&mut self, ids: &[AnnotationId]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let result = sqlx::query("DELETE FROM annotation WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn bulk_create_edges(&mut self, edges: &[ResolvedEdge]) -> Result<usize> {
        if edges.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO edge_data (type_id, tf_id, target_id, score, rank) ");
        query_builder.push_values(edges, |mut b, edge| {
            b.push_bind(edge.edge_type.0)
                .push_bind(edge.source.0)
                .push_bind(edge.target.0)
                .push_bind(edge.score)
                .push_bind(edge.rank.map(i64::from));
        });
        query_builder.push(" ON CONFLICT (type_id, tf_id, target_id) DO NOTHING");

        let result = query_builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn create_analysis(&mut self, tf: AnnotationId) -> Result<AnalysisId> {
        let id: i64 = sqlx::query_scalar("INSERT INTO analysis (tf_id) VALUES ($1) RETURNING id")
            .bind(tf.0)
            .fetch_one(&mut *self.tx)
            .await?;

        Ok(AnalysisId(id))
    }

    async fn get_or_create_meta_key(&mut self, name: &str, searchable: bool) -> Result<MetaKey> {
        let (id, name, searchable): (i64, String, bool) = sqlx::query_as(
            r#"
            INSERT INTO meta_key (name, searchable)
            VALUES ($1, $2)
            ON CONFLICT (name)
            DO UPDATE SET name = EXCLUDED.name
            RETURNING id, name, searchable
            "#,
        )
        .bind(name)
        .bind(searchable)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(MetaKey {
            id: MetaKeyId(id),
            name,
            searchable,
        })
    }

    async fn bulk_create_analysis_data(
        &mut self,
        analysis: AnalysisId,
        data: &[AnalysisDatum],
    ) -> Result<usize> {
        if data.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO analysis_data (analysis_id, key_id, value) ");
        query_builder.push_values(data, |mut b, datum| {
            b.push_bind(analysis.0)
                .push_bind(datum.key.0)
                .push_bind(&datum.value);
        });

        let result = query_builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn bulk_create_interactions(
        &mut self,
        analysis: AnalysisId,
        targets: &[AnnotationId],
    ) -> Result<usize> {
        if targets.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO interaction (analysis_id, target_id) ");
        query_builder.push_values(targets, |mut b, target| {
            b.push_bind(analysis.0).push_bind(target.0);
        });

        let result = query_builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn bulk_create_regulations(
        &mut self,
        analysis: AnalysisId,
        regulations: &[Regulation],
    ) -> Result<usize> {
        if regulations.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO regulation (analysis_id, target_id, foldchange, p_value) ",
        );
        query_builder.push_values(regulations, |mut b, regulation| {
            b.push_bind(analysis.0)
                .push_bind(regulation.target.0)
                .push_bind(regulation.log2_fold_change)
                .push_bind(regulation.p_value);
        });

        let result = query_builder.build().execute(&mut *self.tx).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
