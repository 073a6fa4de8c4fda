//! Gene-set membership indices
//!
//! A [`GeneSetIndex`] maps each gene to the set of named sources (gene lists
//! or networks) containing it. Counts are never stored: a gene's count is the
//! size of its source set, so merging two indices that share a source name
//! or a gene cannot double count.

use crate::parser::network::Network;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneSetIndex {
    members: IndexMap<String, BTreeSet<String>>,
}

/// One row of the flattened membership table handed to downstream filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipRow {
    pub gene: String,
    /// Source names, sorted and joined with ", "
    pub user_lists: String,
    pub count: usize,
}

impl GeneSetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index with a single source: every gene maps to `{name}`
    pub fn from_list<I, S>(name: &str, genes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        for gene in genes {
            index.insert(gene.as_ref(), name);
        }
        index
    }

    /// Index over every source and target of `network`, under the network's name
    pub fn from_network(network: &Network) -> Self {
        Self::from_list(&network.name, network.nodes())
    }

    /// Record that `source` contains `gene`
    pub fn insert(&mut self, gene: &str, source: &str) {
        self.members
            .entry(gene.to_string())
            .or_default()
            .insert(source.to_string());
    }

    pub fn sources(&self, gene: &str) -> Option<&BTreeSet<String>> {
        self.members.get(gene)
    }

    /// Number of distinct sources containing `gene`
    pub fn count(&self, gene: &str) -> usize {
        self.members.get(gene).map_or(0, BTreeSet::len)
    }

    pub fn contains(&self, gene: &str) -> bool {
        self.members.contains_key(gene)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn genes(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.members.iter().map(|(gene, sources)| (gene.as_str(), sources))
    }

    /// Per-gene union of source sets
    pub fn merge(&self, other: &GeneSetIndex) -> GeneSetIndex {
        let mut merged = self.clone();
        for (gene, sources) in &other.members {
            merged
                .members
                .entry(gene.clone())
                .or_default()
                .extend(sources.iter().cloned());
        }
        merged
    }

    /// Left fold of [`merge`](Self::merge) over any number of indices
    pub fn merge_all<'a>(indices: impl IntoIterator<Item = &'a GeneSetIndex>) -> GeneSetIndex {
        indices
            .into_iter()
            .fold(GeneSetIndex::new(), |acc, index| acc.merge(index))
    }

    /// Reverse view: source name to the genes it contains
    pub fn lists(&self) -> IndexMap<String, BTreeSet<String>> {
        let mut lists: IndexMap<String, BTreeSet<String>> = IndexMap::new();
        for (gene, sources) in &self.members {
            for source in sources {
                lists.entry(source.clone()).or_default().insert(gene.clone());
            }
        }
        lists
    }

    pub fn to_table(&self) -> Vec<MembershipRow> {
        self.members
            .iter()
            .map(|(gene, sources)| MembershipRow {
                gene: gene.clone(),
                user_lists: sources.iter().map(String::as_str).collect::<Vec<_>>().join(", "),
                count: sources.len(),
            })
            .collect()
    }
}
