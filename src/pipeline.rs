//! Pass orchestration. One call analyzes one procedure: deterministic,
//! single-threaded, no side effects. Batch parallelism lives a level up in
//! the command layer.

use crate::analysis::{
    build_flow_edges, classify_statements, detect_operations, detect_patterns, extract_rules,
    generate_test_values, group_flows, score_complexity, synthesize_boundaries,
};
use crate::config::AnalysisConfig;
use crate::core::StructuralWarning;
use crate::lexer::tokenize;
use crate::parse::{extract_metadata, parse_blocks};
use crate::report::AnalysisReport;
use anyhow::Result;
use log::debug;

/// Run the full pipeline over one procedure's source text. `name` overrides
/// the extracted procedure name (batch mode passes the file stem when the
/// header is missing). Malformed input degrades to structural warnings;
/// this only errs on report assembly failures.
pub fn analyze_procedure(
    source: &str,
    name: Option<&str>,
    config: &AnalysisConfig,
) -> Result<AnalysisReport> {
    let stream = tokenize(source);
    debug!("lexer: {} tokens", stream.tokens.len());

    let outcome = parse_blocks(&stream, source);
    debug!(
        "structure: {} blocks, {} warnings",
        outcome.arena.len(),
        outcome.warnings.len()
    );

    let mut metadata = extract_metadata(source);
    if metadata.procedure_name.is_empty() {
        if let Some(fallback) = name {
            metadata.procedure_name = fallback.to_string();
        }
    }

    let purposes = classify_statements(&outcome.arena);
    let operations = detect_operations(&outcome.arena);
    debug!(
        "operations: {} statements, {} tables",
        operations.statements.len(),
        operations.tables.len()
    );
    let parameters = crate::analysis::track_parameters(&outcome.arena, &metadata);
    let edges = build_flow_edges(&operations.statements);
    let flows = group_flows(&edges, &operations.statements);
    debug!("data flow: {} edges, {} records", edges.len(), flows.len());

    let mut report = AnalysisReport {
        metadata,
        logical_blocks: outcome.arena.blocks().to_vec(),
        table_references: operations.tables.clone(),
        data_flow: flows,
        statement_purpose: purposes.clone(),
        parameter_usage: parameters.clone(),
        structural_warnings: warnings_sorted(outcome.warnings.clone()),
        ..Default::default()
    };

    // Basic mode stops after the structural passes; the advisory sections
    // stay empty but the sections above are identical to a full run.
    if !config.basic {
        report.potential_business_rules = extract_rules(
            &outcome.arena,
            &purposes,
            &parameters,
            &config.thresholds,
        );
        report.query_patterns = detect_patterns(&outcome.arena);
        report.repository_boundaries = synthesize_boundaries(
            &outcome.arena,
            &edges,
            &operations.statements,
            &parameters,
        );
        report.implementation_complexity = score_complexity(&outcome.arena, &parameters);
        report.test_value_candidates =
            generate_test_values(&parameters, &report.potential_business_rules);
        debug!(
            "advisory: {} rules, {} patterns, {} boundaries, {} findings",
            report.potential_business_rules.len(),
            report.query_patterns.len(),
            report.repository_boundaries.len(),
            report.implementation_complexity.len()
        );
    }

    report.normalize();
    Ok(report)
}

fn warnings_sorted(mut warnings: Vec<StructuralWarning>) -> Vec<StructuralWarning> {
    warnings.sort_by(|a, b| a.line.cmp(&b.line).then_with(|| a.message.cmp(&b.message)));
    warnings
}
