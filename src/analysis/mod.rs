//! Analysis passes. Each pass consumes the immutable block arena (and the
//! outputs of earlier passes) and produces new entities that reference
//! blocks by id only.

pub mod boundaries;
pub mod classifier;
pub mod complexity;
pub mod data_flow;
pub mod operations;
pub mod parameters;
pub mod patterns;
pub mod rules;
pub mod test_values;

pub use boundaries::synthesize_boundaries;
pub use classifier::classify_statements;
pub use complexity::score_complexity;
pub use data_flow::{build_flow_edges, group_flows};
pub use operations::{detect_operations, OperationsOutput, StatementOps};
pub use parameters::track_parameters;
pub use patterns::detect_patterns;
pub use rules::extract_rules;
pub use test_values::generate_test_values;
