// Tabular input parsers
//
// Turns raw text into canonical records. Where a format does not declare its
// schema, the shape is inferred once here from column count and type:
// - metadata: `KEY : value` lines
// - tabular: expression/binding tables with 1 or 3 data columns
// - network: whitespace edge lists with 2 to 4 columns
// - gene_list: `>name` sections of gene ids
// - annotation: annotation and additional-edge CSVs

pub mod annotation;
pub mod gene_list;
pub mod metadata;
pub mod network;
pub mod tabular;

pub use annotation::{parse_annotations, parse_edge_table};
pub use gene_list::{parse_gene_column, parse_gene_list, DEFAULT_LIST_NAME};
pub use metadata::{parse_metadata, MetadataRecord};
pub use network::{parse_network, Network, NetworkEdge, NetworkLayout, DEFAULT_NETWORK_NAME};
pub use tabular::parse_tabular_data;
