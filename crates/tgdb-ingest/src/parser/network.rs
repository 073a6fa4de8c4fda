//! Whitespace-delimited network (edge list) files
//!
//! Column roles are inferred once, from the column count and, for three
//! columns, from whether the last column is numeric. The result is recorded
//! as a [`NetworkLayout`] so nothing downstream re-infers it.

use crate::error::{IngestError, Result};
use indexmap::IndexSet;
use serde::Serialize;

/// Name given to networks read without a file name
pub const DEFAULT_NETWORK_NAME: &str = "default";

/// Words that mark the first row as a header instead of an edge
const HEADER_WORDS: &[&str] = &[
    "source",
    "sources",
    "source_gene",
    "target",
    "targets",
    "target_gene",
    "target_id",
    "tf",
    "tf_id",
    "tf_gene",
    "regulator",
    "regulators",
    "gene",
    "gene_id",
    "genes",
    "from",
    "to",
    "node1",
    "node2",
    "node_1",
    "node_2",
    "edge",
    "edge_type",
    "edge_label",
    "interaction",
    "label",
    "type",
    "score",
    "weight",
    "rank",
];

const NETWORK_MSG: &str = "network must have source, edge, target columns and may have a fourth \
                           column of scores";

/// Column roles of a network file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkLayout {
    /// source, target
    TwoColumn,
    /// source, target, score
    ThreeColumnScored,
    /// source, edge, target
    ThreeColumnLabeled,
    /// source, edge, target, score
    FourColumn,
}

impl NetworkLayout {
    pub fn width(self) -> usize {
        match self {
            NetworkLayout::TwoColumn => 2,
            NetworkLayout::ThreeColumnScored | NetworkLayout::ThreeColumnLabeled => 3,
            NetworkLayout::FourColumn => 4,
        }
    }

    pub fn has_score(self) -> bool {
        matches!(self, NetworkLayout::ThreeColumnScored | NetworkLayout::FourColumn)
    }

    pub fn has_label(self) -> bool {
        matches!(self, NetworkLayout::ThreeColumnLabeled | NetworkLayout::FourColumn)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkEdge {
    pub source: String,
    /// Edge label; the network name when the file has no label column
    pub edge: String,
    pub target: String,
    pub score: Option<f64>,
    /// 1-based. By descending score when scored (ties share the highest rank
    /// of their group), otherwise by input order.
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Network {
    pub name: String,
    pub layout: NetworkLayout,
    pub edges: Vec<NetworkEdge>,
}

impl Network {
    /// Every gene appearing as a source or target, in first-seen order
    pub fn nodes(&self) -> IndexSet<String> {
        let mut nodes = IndexSet::new();
        for edge in &self.edges {
            nodes.insert(edge.source.clone());
            nodes.insert(edge.target.clone());
        }
        nodes
    }

    /// Unique source endpoints of the edges matching `predicate`, in edge order
    ///
    /// Used to restrict queries to the regulators of a network rather than to
    /// every node it mentions.
    pub fn filter_sources<F>(&self, predicate: F) -> IndexSet<String>
    where
        F: Fn(&NetworkEdge) -> bool,
    {
        self.edges
            .iter()
            .filter(|edge| predicate(edge))
            .map(|edge| edge.source.clone())
            .collect()
    }

    pub fn source_nodes(&self) -> IndexSet<String> {
        self.filter_sources(|_| true)
    }
}

/// Parse a network file named `name`
pub fn parse_network(name: &str, text: &str) -> Result<Network> {
    let rows: Vec<Vec<&str>> = text
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .filter(|fields| !fields.is_empty())
        .collect();

    let Some(first) = rows.first() else {
        return Err(IngestError::BadNetworkFormat(format!("{name} is empty")));
    };
    let width = first.len();

    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
        return Err(IngestError::BadNetworkFormat(format!(
            "row {} has {} columns, expected {width}",
            idx + 1,
            row.len()
        )));
    }

    let header = is_header(&rows);
    let data = if header { &rows[1..] } else { &rows[..] };

    let layout = match width {
        2 => NetworkLayout::TwoColumn,
        3 if third_column_is_numeric(data, header.then(|| rows[0][2])) => {
            NetworkLayout::ThreeColumnScored
        },
        3 => NetworkLayout::ThreeColumnLabeled,
        4 => NetworkLayout::FourColumn,
        _ => return Err(IngestError::BadNetworkFormat(NETWORK_MSG.to_string())),
    };

    let mut edges = data
        .iter()
        .enumerate()
        .map(|(idx, row)| build_edge(name, layout, row, idx))
        .collect::<Result<Vec<_>>>()?;

    if layout.has_score() {
        assign_score_ranks(&mut edges);
        edges.sort_by_key(|edge| edge.rank);
    }

    Ok(Network {
        name: name.to_string(),
        layout,
        edges,
    })
}

fn build_edge(name: &str, layout: NetworkLayout, row: &[&str], idx: usize) -> Result<NetworkEdge> {
    let (source, edge, target, score) = match layout {
        NetworkLayout::TwoColumn => (row[0], name, row[1], None),
        NetworkLayout::ThreeColumnScored => (row[0], name, row[1], Some(row[2])),
        NetworkLayout::ThreeColumnLabeled => (row[0], row[1], row[2], None),
        NetworkLayout::FourColumn => (row[0], row[1], row[2], Some(row[3])),
    };

    let score = score
        .map(|raw| {
            parse_score(raw).ok_or_else(|| {
                IngestError::BadNetworkFormat(format!("score {raw:?} on edge {} is not numeric", idx + 1))
            })
        })
        .transpose()?;

    Ok(NetworkEdge {
        source: source.to_string(),
        edge: edge.to_string(),
        target: target.to_string(),
        score,
        rank: u32::try_from(idx + 1).unwrap_or(u32::MAX),
    })
}

fn parse_score(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// The first row is a header when it is made of column names, or when the
/// last column is numeric everywhere except the first row.
fn is_header(rows: &[Vec<&str>]) -> bool {
    let first = &rows[0];

    if first
        .iter()
        .all(|field| HEADER_WORDS.contains(&field.to_lowercase().as_str()))
    {
        return true;
    }

    let last = first.len() - 1;
    (first.len() == 3 || first.len() == 4)
        && rows.len() > 1
        && parse_score(first[last]).is_none()
        && rows[1..].iter().all(|row| parse_score(row[last]).is_some())
}

fn third_column_is_numeric(data: &[Vec<&str>], header_name: Option<&str>) -> bool {
    if data.is_empty() {
        return header_name
            .map(|h| matches!(h.to_lowercase().as_str(), "score" | "weight"))
            .unwrap_or(false);
    }
    data.iter().all(|row| parse_score(row[2]).is_some())
}

/// Rank by descending score; every member of a tie group gets the group's
/// largest rank.
fn assign_score_ranks(edges: &mut [NetworkEdge]) {
    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by(|&a, &b| {
        let (sa, sb) = (edges[a].score.unwrap_or(f64::MIN), edges[b].score.unwrap_or(f64::MIN));
        sb.total_cmp(&sa)
    });

    let mut start = 0;
    while start < order.len() {
        let score = edges[order[start]].score;
        let mut end = start;
        while end + 1 < order.len() && edges[order[end + 1]].score == score {
            end += 1;
        }
        let rank = u32::try_from(end + 1).unwrap_or(u32::MAX);
        for &idx in &order[start..=end] {
            edges[idx].rank = rank;
        }
        start = end + 1;
    }
}
