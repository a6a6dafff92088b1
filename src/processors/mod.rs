//! Pipeline stages.

pub mod aggregate;
pub mod cleaning;
pub mod clustering;
pub mod filtering;
pub mod pincodes;

// Re-export key types for convenience
pub use aggregate::{summarize_clusters, AggregateError, ClusterSummary, PipelineReport, PipelineStats};
pub use cleaning::{clean_records, CleanedDataset};
pub use clustering::{choose_k, cluster_records, kmeans, kmeans_best_of, ClusteringOutcome, KMeansResult, KReason};
pub use filtering::{corridor_threshold, filter_corridor, CorridorFilterResult, CorridorRecord};
pub use pincodes::{
    aggregate_pincodes, consult_advisor, parse_advisor_reply, select_pincodes, PincodeAggregate,
    PincodeSelection, SelectionSource,
};
