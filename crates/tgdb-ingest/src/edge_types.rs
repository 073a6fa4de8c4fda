//! Edge type resolution and undirected edge expansion

use crate::error::{IngestError, Result};
use crate::models::{AnnotationSnapshot, EdgeRow, EdgeType, EdgeTypeId, ResolvedEdge};
use crate::parser::network::NetworkEdge;
use crate::store::StoreTransaction;
use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

/// An edge as read from a file, before its genes and type are resolved
pub trait EdgeCandidate {
    fn source(&self) -> &str;
    fn target(&self) -> &str;
    fn edge(&self) -> &str;

    fn score(&self) -> Option<f64> {
        None
    }

    fn rank(&self) -> Option<u32> {
        None
    }
}

impl EdgeCandidate for EdgeRow {
    fn source(&self) -> &str {
        &self.source
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn edge(&self) -> &str {
        &self.edge
    }
}

impl EdgeCandidate for NetworkEdge {
    fn source(&self) -> &str {
        &self.source
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn edge(&self) -> &str {
        &self.edge
    }

    fn score(&self) -> Option<f64> {
        self.score
    }

    fn rank(&self) -> Option<u32> {
        Some(self.rank)
    }
}

/// Maps edge labels to stored edge types for the duration of one import
///
/// Each distinct name reaches the store at most once per resolver. Types
/// that do not exist yet are created with the resolver's default
/// directionality; existing types keep theirs.
#[derive(Debug)]
pub struct EdgeTypeResolver {
    directional_default: bool,
    cache: IndexMap<String, EdgeType>,
}

impl EdgeTypeResolver {
    pub fn new(directional_default: bool) -> Self {
        Self {
            directional_default,
            cache: IndexMap::new(),
        }
    }

    /// Resolve every distinct name in `names`, in first-seen order
    pub async fn resolve<I, S>(
        &mut self,
        tx: &mut dyn StoreTransaction,
        names: I,
    ) -> Result<IndexMap<String, EdgeType>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut resolved = IndexMap::new();

        for name in names {
            let name = name.as_ref();
            if resolved.contains_key(name) {
                continue;
            }

            let edge_type = match self.cache.get(name) {
                Some(cached) => cached.clone(),
                None => {
                    let created = tx
                        .get_or_create_edge_type(name, self.directional_default)
                        .await?;
                    debug!(
                        edge_type = %name,
                        id = %created.id,
                        directional = created.directional,
                        "Resolved edge type"
                    );
                    self.cache.insert(name.to_string(), created.clone());
                    created
                },
            };

            resolved.insert(name.to_string(), edge_type);
        }

        Ok(resolved)
    }
}

/// Resolve the endpoints of `rows` against `snapshot`
///
/// Rows naming a gene that is not in the snapshot, or a type missing from
/// `types`, are skipped and counted rather than failing the import.
pub fn resolve_endpoints<'a, E>(
    snapshot: &AnnotationSnapshot,
    rows: impl IntoIterator<Item = &'a E>,
    types: &IndexMap<String, EdgeType>,
) -> (Vec<ResolvedEdge>, usize)
where
    E: EdgeCandidate + 'a,
{
    let mut resolved = Vec::new();
    let mut skipped = 0;

    for row in rows {
        match resolve_row(snapshot, row, types) {
            Ok(edge) => resolved.push(edge),
            Err(e) => {
                warn!(
                    source = row.source(),
                    target = row.target(),
                    edge = row.edge(),
                    "Skipping edge: {}",
                    e
                );
                skipped += 1;
            },
        }
    }

    (resolved, skipped)
}

fn resolve_row<E: EdgeCandidate>(
    snapshot: &AnnotationSnapshot,
    row: &E,
    types: &IndexMap<String, EdgeType>,
) -> Result<ResolvedEdge> {
    let edge_type = types
        .get(row.edge())
        .ok_or_else(|| IngestError::Store(format!("edge type {} was not resolved", row.edge())))?;
    let source = snapshot
        .id_of(row.source())
        .ok_or_else(|| IngestError::UnresolvedGene(row.source().to_string()))?;
    let target = snapshot
        .id_of(row.target())
        .ok_or_else(|| IngestError::UnresolvedGene(row.target().to_string()))?;

    Ok(ResolvedEdge {
        edge_type: edge_type.id,
        source,
        target,
        score: row.score(),
        rank: row.rank(),
    })
}

/// Add the reverse of every edge whose type is not directional, then drop
/// repeated `(type, source, target)` triples keeping the first occurrence
pub fn expand_undirected<F>(edges: &[ResolvedEdge], is_directional: F) -> Vec<ResolvedEdge>
where
    F: Fn(EdgeTypeId) -> bool,
{
    let mut seen = IndexSet::new();
    let mut expanded = Vec::with_capacity(edges.len());

    let mut push = |edge: ResolvedEdge| {
        if seen.insert(edge.key()) {
            expanded.push(edge);
        }
    };

    for edge in edges {
        push(*edge);
        if !is_directional(edge.edge_type) {
            push(edge.reversed());
        }
    }

    expanded
}

/// Directionality lookup for [`expand_undirected`] built from resolved types
pub fn directionality(types: &IndexMap<String, EdgeType>) -> impl Fn(EdgeTypeId) -> bool {
    let directional: IndexMap<EdgeTypeId, bool> =
        types.values().map(|t| (t.id, t.directional)).collect();
    move |id| directional.get(&id).copied().unwrap_or(true)
}
