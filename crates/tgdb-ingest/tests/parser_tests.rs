//! Parser tests over realistic files and generated networks

use proptest::prelude::*;
use tgdb_ingest::parser::{
    parse_gene_list, parse_metadata, parse_network, parse_tabular_data, NetworkLayout,
};
use tgdb_ingest::IngestError;

// ============================================================================
// Worked examples
// ============================================================================

#[test]
fn test_scored_three_column_network() {
    let network = parse_network("net", "A B 5\nC D 2\n").unwrap();

    assert_eq!(network.layout, NetworkLayout::ThreeColumnScored);
    let edges: Vec<_> = network
        .edges
        .iter()
        .map(|e| (e.source.as_str(), e.target.as_str(), e.score, e.rank))
        .collect();
    assert_eq!(edges, vec![("A", "B", Some(5.0), 1), ("C", "D", Some(2.0), 2)]);
}

#[test]
fn test_na_experiment_id_is_dropped() {
    let meta = parse_metadata("Experiment_ID : na\nEdge_Type: Induced\n").unwrap();

    assert!(!meta.contains("EXPERIMENT_ID"));
    assert!(meta.iter().all(|(_, value)| !value.is_empty()));
}

#[test]
fn test_full_metadata_file() {
    let text = "\
Transcription_Factor_ID: AT4G24020
Experiment_Type: Expression
Experiment_ID: AT4G24020_AS_RNASEQ
Analysis_ID: DESEQ2_1
Edge_Type: INDUCED
Experimenter: NA
Date: 05/17/2017
Analysis_Notes: fold change cutoff 1.5
";
    let meta = parse_metadata(text).unwrap();

    assert_eq!(meta.len(), 7);
    assert_eq!(meta.get("DATE"), Some("2017-05-17"));
    assert_eq!(meta.get("ANALYSIS_NOTES"), Some("fold change cutoff 1.5"));
    assert!(!meta.contains("EXPERIMENTER"));
    let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
    assert_eq!(keys[0], "TRANSCRIPTION_FACTOR_ID");
}

#[test]
fn test_tab_delimited_expression_table() {
    let text = "gene_id\tlog2FoldChange\tpadj\n\
                AT1G01010\t1.5\t0.001\n\
                AT1G01020\t-inf\t#N/A\n\
                \t\t\n";
    let data = parse_tabular_data(text, '\t').unwrap();

    assert!(data.has_scores);
    assert_eq!(data.rows.len(), 2);
    assert_eq!(data.rows[1].log2_fold_change, Some(f64::MIN));
    assert_eq!(data.rows[1].p_value, None);
}

#[test]
fn test_four_column_network_is_rejected_as_data() {
    let result = parse_tabular_data("a,b,c,d\n1,2,3,4\n", ',');
    assert!(matches!(result, Err(IngestError::MalformedData(_))));
}

#[test]
fn test_gene_list_membership() {
    let index = parse_gene_list(">L1\ng1\ng2\n>L2\ng2\ng3\n");

    assert_eq!(index.count("g1"), 1);
    assert_eq!(index.count("g2"), 2);
    assert_eq!(index.count("g3"), 1);
    assert_eq!(index.lists()["L2"].len(), 2);
}

// ============================================================================
// Network round trips
// ============================================================================

fn gene() -> impl Strategy<Value = String> {
    "[A-Z]{2}[0-9]{1,3}"
}

fn label() -> impl Strategy<Value = String> {
    "[a-z]{3,8}"
}

fn score() -> impl Strategy<Value = f64> {
    (-1000i32..1000).prop_map(f64::from)
}

/// Input order stably sorted by descending score, as ranks order edges
fn by_score<T: Clone>(rows: &[(T, f64)]) -> Vec<(T, f64)> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted
}

proptest! {
    #[test]
    fn prop_two_column_round_trip(rows in prop::collection::vec((gene(), gene()), 1..20)) {
        let text: String = rows.iter().map(|(s, t)| format!("{s} {t}\n")).collect();
        let network = parse_network("net", &text).unwrap();

        prop_assert_eq!(network.layout, NetworkLayout::TwoColumn);
        let parsed: Vec<(String, String)> = network
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone()))
            .collect();
        prop_assert_eq!(parsed, rows);
        for (idx, edge) in network.edges.iter().enumerate() {
            prop_assert_eq!(edge.edge.as_str(), "net");
            prop_assert_eq!(edge.rank as usize, idx + 1);
            prop_assert_eq!(edge.score, None);
        }
    }

    #[test]
    fn prop_three_column_labeled_round_trip(
        rows in prop::collection::vec((gene(), label(), gene()), 1..20)
    ) {
        let text: String = rows.iter().map(|(s, e, t)| format!("{s}\t{e}\t{t}\n")).collect();
        let network = parse_network("net", &text).unwrap();

        prop_assert_eq!(network.layout, NetworkLayout::ThreeColumnLabeled);
        let parsed: Vec<(String, String, String)> = network
            .edges
            .iter()
            .map(|e| (e.source.clone(), e.edge.clone(), e.target.clone()))
            .collect();
        prop_assert_eq!(parsed, rows);
    }

    #[test]
    fn prop_three_column_scored_round_trip(
        rows in prop::collection::vec(((gene(), gene()), score()), 1..20)
    ) {
        let text: String = rows
            .iter()
            .map(|((s, t), score)| format!("{s} {t} {score}\n"))
            .collect();
        let network = parse_network("net", &text).unwrap();

        prop_assert_eq!(network.layout, NetworkLayout::ThreeColumnScored);
        let parsed: Vec<((String, String), f64)> = network
            .edges
            .iter()
            .map(|e| ((e.source.clone(), e.target.clone()), e.score.unwrap_or(f64::NAN)))
            .collect();
        prop_assert_eq!(parsed, by_score(&rows));
    }

    #[test]
    fn prop_four_column_round_trip(
        rows in prop::collection::vec(((gene(), label(), gene()), score()), 1..20)
    ) {
        let text: String = rows
            .iter()
            .map(|((s, e, t), score)| format!("{s} {e} {t} {score}\n"))
            .collect();
        let network = parse_network("net", &text).unwrap();

        prop_assert_eq!(network.layout, NetworkLayout::FourColumn);
        let parsed: Vec<((String, String, String), f64)> = network
            .edges
            .iter()
            .map(|e| {
                (
                    (e.source.clone(), e.edge.clone(), e.target.clone()),
                    e.score.unwrap_or(f64::NAN),
                )
            })
            .collect();
        prop_assert_eq!(parsed, by_score(&rows));
    }

    #[test]
    fn prop_scored_ranks_share_max_within_ties(scores in prop::collection::vec(0i32..5, 1..30)) {
        let text: String = scores
            .iter()
            .enumerate()
            .map(|(i, s)| format!("S{i} T{i} {s}\n"))
            .collect();
        let network = parse_network("net", &text).unwrap();

        for edge in &network.edges {
            let score = edge.score.unwrap_or(f64::NAN);
            let at_least = scores.iter().filter(|&&s| f64::from(s) >= score).count();
            prop_assert_eq!(edge.rank as usize, at_least);
        }
    }
}
