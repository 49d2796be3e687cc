//! Data flow analyzer: turns per-statement read/write sets into ordered
//! edges, then groups contiguous same-target edges into flow records.

use crate::core::{DataFlowEdge, FlowRecord};
use crate::analysis::operations::StatementOps;

/// One edge per written entity per statement, in execution order. A
/// statement writing two targets (rare, but a SELECT assigning several
/// variables does it) yields one edge per target so each target's history
/// stays independent.
pub fn build_flow_edges(statements: &[StatementOps]) -> Vec<DataFlowEdge> {
    let mut edges = Vec::new();
    let mut order = 0usize;
    for stmt in statements {
        let Some(op) = stmt.head else { continue };
        for target in &stmt.writes {
            edges.push(DataFlowEdge {
                sources: stmt.reads.clone(),
                targets: vec![target.clone()],
                operation: op,
                block: stmt.block,
                order,
            });
            order += 1;
        }
    }
    edges
}

/// Merge contiguous edges sharing a target into one record. Contiguity
/// matters: write, read elsewhere, write again yields two records, which
/// preserves the dependency ordering a migration has to respect. Each
/// record's operations carry the head kind followed by the clause-shape
/// kinds (JOIN/FILTER/AGGREGATE) of the contributing statement.
pub fn group_flows(edges: &[DataFlowEdge], statements: &[StatementOps]) -> Vec<FlowRecord> {
    let ops_for = |edge: &DataFlowEdge| {
        statements
            .iter()
            .find(|s| s.block == edge.block)
            .map(|s| s.kinds.clone())
            .unwrap_or_else(|| vec![edge.operation])
    };

    let mut records: Vec<FlowRecord> = Vec::new();
    for edge in edges {
        for target in &edge.targets {
            let merged = match records.last_mut() {
                Some(last) if &last.target == target => {
                    for kind in ops_for(edge) {
                        last.operations.push(kind);
                    }
                    for source in &edge.sources {
                        if !last.sources.contains(source) {
                            last.sources.push(source.clone());
                        }
                    }
                    if !last.blocks.contains(&edge.block) {
                        last.blocks.push(edge.block);
                    }
                    true
                }
                _ => false,
            };
            if !merged {
                records.push(FlowRecord {
                    target: target.clone(),
                    sources: edge.sources.clone(),
                    operations: ops_for(edge),
                    blocks: vec![edge.block],
                });
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::detect_operations;
    use crate::core::{Entity, OperationKind};
    use crate::lexer::tokenize;
    use crate::parse::parse_blocks;
    use indoc::indoc;

    fn flows(sql: &str) -> (Vec<DataFlowEdge>, Vec<FlowRecord>) {
        let outcome = parse_blocks(&tokenize(sql), sql);
        let ops = detect_operations(&outcome.arena);
        let edges = build_flow_edges(&ops.statements);
        let records = group_flows(&edges, &ops.statements);
        (edges, records)
    }

    #[test]
    fn insert_select_produces_multi_source_edge() {
        let sql = indoc! {"
            INSERT INTO OrderSummary (OrderID, CustomerName)
            SELECT o.OrderID, c.Name
            FROM Orders o
            INNER JOIN Customers c ON o.CustomerID = c.CustomerID
        "};
        let (edges, _) = flows(sql);
        assert_eq!(edges.len(), 1);
        let edge = &edges[0];
        assert_eq!(edge.targets, vec![Entity::Table("OrderSummary".into())]);
        assert_eq!(edge.sources.len(), 2);
        assert_eq!(edge.operation, OperationKind::Insert);
    }

    #[test]
    fn edges_carry_execution_order() {
        let sql = indoc! {"
            SELECT OrderID INTO #staging FROM Orders;
            INSERT INTO Archive (OrderID) SELECT OrderID FROM #staging;
        "};
        let (edges, _) = flows(sql);
        assert_eq!(edges.len(), 2);
        assert!(edges[0].order < edges[1].order);
        assert_eq!(edges[0].targets, vec![Entity::TempTable("#staging".into())]);
        assert_eq!(edges[1].sources, vec![Entity::TempTable("#staging".into())]);
    }

    #[test]
    fn contiguous_same_target_edges_merge() {
        let sql = indoc! {"
            INSERT INTO Audit (Msg) VALUES ('a');
            UPDATE Audit SET Msg = 'b' WHERE Msg = 'a';
        "};
        let (_, records) = flows(sql);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].operations,
            vec![
                OperationKind::Insert,
                OperationKind::Update,
                OperationKind::Filter
            ]
        );
    }

    #[test]
    fn clause_shapes_surface_on_flow_records() {
        let sql = indoc! {"
            SELECT @Total = SUM(Amount)
            FROM OrderLines
            WHERE OrderID = @OrderID
        "};
        let (_, records) = flows(sql);
        assert_eq!(records.len(), 1);
        assert_eq!(
            records[0].operations,
            vec![
                OperationKind::Select,
                OperationKind::Filter,
                OperationKind::Aggregate
            ]
        );
    }

    #[test]
    fn interleaved_targets_stay_separate() {
        let sql = indoc! {"
            INSERT INTO A (x) VALUES (1);
            INSERT INTO B (x) VALUES (2);
            UPDATE A SET x = 3 WHERE x = 1;
        "};
        let (_, records) = flows(sql);
        let targets: Vec<&str> = records.iter().map(|r| r.target.name()).collect();
        assert_eq!(targets, vec!["A", "B", "A"]);
    }
}
