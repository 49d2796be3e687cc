//! Report assembly: merges pass outputs into the serialized report. Field
//! and section names follow the JSON layout consumers already parse.

use crate::core::{
    BusinessRule, ComplexityFinding, FlowRecord, LogicalBlock, Parameter, ProcedureMetadata,
    QueryPattern, RepositoryBoundary, StatementPurpose, StructuralWarning, TableReference,
    TestValueCandidate,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub metadata: ProcedureMetadata,
    pub logical_blocks: Vec<LogicalBlock>,
    pub table_references: Vec<TableReference>,
    pub potential_business_rules: Vec<BusinessRule>,
    pub data_flow: Vec<FlowRecord>,
    pub statement_purpose: Vec<StatementPurpose>,
    pub parameter_usage: Vec<Parameter>,
    pub query_patterns: Vec<QueryPattern>,
    pub repository_boundaries: Vec<RepositoryBoundary>,
    pub implementation_complexity: Vec<ComplexityFinding>,
    pub test_value_candidates: Vec<TestValueCandidate>,
    pub structural_warnings: Vec<StructuralWarning>,
}

impl AnalysisReport {
    /// JSON emitters reject non-finite floats; clamp them to 0.0 so a bad
    /// confidence can never make serialization fail.
    pub fn normalize(&mut self) {
        for rule in &mut self.potential_business_rules {
            if !rule.confidence.is_finite() {
                rule.confidence = 0.0;
            }
        }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
