//! Repository boundary synthesizer: partitions the persistent-table slice
//! of the data-flow graph into connected components and suggests one
//! application-level method per component.

use crate::analysis::operations::StatementOps;
use crate::core::{
    BlockId, BoundaryParameter, DataFlowEdge, Entity, OperationKind, Parameter,
    RepositoryBoundary, ReturnShape, UsageRole,
};
use crate::parse::BlockArena;
use petgraph::unionfind::UnionFind;
use std::collections::BTreeMap;

/// Blocks and per-table touch counts for one connected component.
struct Component {
    blocks: Vec<BlockId>,
    /// table -> (combined read+write weight, first-appearance index)
    tables: BTreeMap<String, (usize, usize)>,
    operations: Vec<OperationKind>,
}

fn singularize(name: &str) -> String {
    let trimmed = name
        .rsplit('.')
        .next()
        .unwrap_or(name)
        .trim_matches(['[', ']']);
    if trimmed.len() > 1
        && trimmed.to_lowercase().ends_with('s')
        && !trimmed.to_lowercase().ends_with("ss")
    {
        trimmed[..trimmed.len() - 1].to_string()
    } else {
        trimmed.to_string()
    }
}

fn pascal_case(name: &str) -> String {
    let clean = name.trim_start_matches('@');
    let mut chars = clean.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn verb_for(op: OperationKind) -> &'static str {
    match op {
        OperationKind::Insert => "Create",
        OperationKind::Update => "Update",
        OperationKind::Delete => "Delete",
        _ => "Get",
    }
}

/// Steps: filter persistent edges, union blocks sharing a table, then per
/// component pick primary entity, dominant operation, filter parameter,
/// and return shape. A boundary's blocks are exactly its component.
pub fn synthesize_boundaries(
    arena: &BlockArena,
    edges: &[DataFlowEdge],
    statements: &[StatementOps],
    parameters: &[Parameter],
) -> Vec<RepositoryBoundary> {
    // Reads never become edges on their own, so fold read-only statements
    // in alongside edges to cover pure-SELECT components. A touch is kept
    // when any of its entities is a persistent table; all entities of a
    // kept touch (temp tables and variables included) then provide
    // connectivity, so a flow staged through #temp stays one component.
    struct Touch {
        block: BlockId,
        entities: Vec<Entity>,
        operation: OperationKind,
    }

    let mut touches: Vec<Touch> = Vec::new();
    for stmt in statements {
        let Some(op) = stmt.head else { continue };
        let mut entities: Vec<Entity> = Vec::new();
        for entity in stmt.reads.iter().chain(stmt.writes.iter()) {
            if !entities.contains(entity) {
                entities.push(entity.clone());
            }
        }
        if entities.iter().any(Entity::is_persistent) {
            touches.push(Touch {
                block: stmt.block,
                entities,
                operation: op,
            });
        }
    }
    // Edge-only blocks (e.g. from dynamic contexts) still participate.
    for edge in edges {
        if touches.iter().any(|t| t.block == edge.block) {
            continue;
        }
        let mut entities: Vec<Entity> = Vec::new();
        for entity in edge.sources.iter().chain(edge.targets.iter()) {
            if !entities.contains(entity) {
                entities.push(entity.clone());
            }
        }
        if entities.iter().any(Entity::is_persistent) {
            touches.push(Touch {
                block: edge.block,
                entities,
                operation: edge.operation,
            });
        }
    }

    if touches.is_empty() {
        return Vec::new();
    }

    // Union touches sharing any entity name.
    let mut uf: UnionFind<usize> = UnionFind::new(touches.len());
    let mut first_touch_for_entity: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, touch) in touches.iter().enumerate() {
        for entity in &touch.entities {
            match first_touch_for_entity.get(entity.name()) {
                Some(&j) => {
                    uf.union(i, j);
                }
                None => {
                    first_touch_for_entity.insert(entity.name(), i);
                }
            }
        }
    }

    // Collect components keyed by representative, ordered by first block.
    let mut components: BTreeMap<usize, Component> = BTreeMap::new();
    for (i, touch) in touches.iter().enumerate() {
        let root = uf.find(i);
        let comp = components.entry(root).or_insert_with(|| Component {
            blocks: Vec::new(),
            tables: BTreeMap::new(),
            operations: Vec::new(),
        });
        if !comp.blocks.contains(&touch.block) {
            comp.blocks.push(touch.block);
        }
        comp.operations.push(touch.operation);
        // Only persistent tables compete for the primary-entity slot.
        for entity in touch.entities.iter().filter(|e| e.is_persistent()) {
            let next_index = comp.tables.len();
            let entry = comp
                .tables
                .entry(entity.name().to_string())
                .or_insert((0, next_index));
            entry.0 += 1;
        }
    }

    let mut components: Vec<Component> = components.into_values().collect();
    for comp in &mut components {
        comp.blocks.sort();
    }
    components.sort_by_key(|c| c.blocks.first().copied());

    components
        .iter()
        .map(|comp| boundary_for(arena, comp, statements, parameters))
        .collect()
}

fn boundary_for(
    arena: &BlockArena,
    comp: &Component,
    statements: &[StatementOps],
    parameters: &[Parameter],
) -> RepositoryBoundary {
    // Primary entity: greatest combined weight, first appearance breaks ties.
    let primary = comp
        .tables
        .iter()
        .max_by(|a, b| (a.1 .0, std::cmp::Reverse(a.1 .1)).cmp(&(b.1 .0, std::cmp::Reverse(b.1 .1))))
        .map(|(name, _)| name.clone())
        .unwrap_or_default();

    // Dominant operation: majority kind, earliest-seen on ties.
    let mut counts: Vec<(OperationKind, usize)> = Vec::new();
    for op in &comp.operations {
        match counts.iter_mut().find(|(k, _)| k == op) {
            Some(entry) => entry.1 += 1,
            None => counts.push((*op, 1)),
        }
    }
    let dominant = counts
        .iter()
        .enumerate()
        .max_by_key(|(i, (_, n))| (*n, std::cmp::Reverse(*i)))
        .map(|(_, (k, _))| *k)
        .unwrap_or(OperationKind::Select);

    // Primary filter parameter: FILTER_CONDITION role, most co-occurrences
    // with component blocks, declaration order on ties.
    let mut best: Option<(&Parameter, usize)> = None;
    for param in parameters {
        if !param.roles.contains(&UsageRole::FilterCondition) {
            continue;
        }
        let upper_name = param.name.to_uppercase();
        let hits = comp
            .blocks
            .iter()
            .filter_map(|id| arena.get(*id))
            .filter(|b| b.text.to_uppercase().contains(&upper_name))
            .count();
        if hits == 0 {
            continue;
        }
        let better = match best {
            Some((cur, cur_hits)) => {
                hits > cur_hits || (hits == cur_hits && param.ordinal < cur.ordinal)
            }
            None => true,
        };
        if better {
            best = Some((param, hits));
        }
    }

    let mut name = format!("{}{}", verb_for(dominant), pascal_case(&singularize(&primary)));
    if let Some((param, _)) = best {
        name.push_str("By");
        name.push_str(&pascal_case(&param.name));
    }

    let boundary_params: Vec<BoundaryParameter> = parameters
        .iter()
        .filter(|p| {
            let upper_name = p.name.to_uppercase();
            comp.blocks
                .iter()
                .filter_map(|id| arena.get(*id))
                .any(|b| b.text.to_uppercase().contains(&upper_name))
        })
        .map(|p| BoundaryParameter {
            name: p.name.clone(),
            declared_type: p.declared_type.clone(),
            roles: p.roles.clone(),
        })
        .collect();

    RepositoryBoundary {
        name,
        blocks: comp.blocks.clone(),
        parameters: boundary_params,
        returns: return_shape(comp, statements),
    }
}

fn return_shape(comp: &Component, statements: &[StatementOps]) -> ReturnShape {
    let comp_statements: Vec<&StatementOps> = statements
        .iter()
        .filter(|s| comp.blocks.contains(&s.block))
        .collect();

    let any_select = comp_statements
        .iter()
        .any(|s| s.head == Some(OperationKind::Select));
    if !any_select {
        return ReturnShape::None;
    }

    // Aggregates without grouping, TOP 1, and variable assignments all
    // collapse the result to a single value or row.
    let scalar = comp_statements.iter().any(|s| {
        (s.has_kind(OperationKind::Aggregate) && !s.has_group_by)
            || s.has_top_one
            || s.writes.iter().all(|w| matches!(w, Entity::Variable(_)))
                && !s.writes.is_empty()
    });
    if scalar {
        return ReturnShape::Scalar;
    }
    ReturnShape::EntityList
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{build_flow_edges, detect_operations, track_parameters};
    use crate::lexer::tokenize;
    use crate::parse::{extract_metadata, parse_blocks};
    use indoc::indoc;

    fn boundaries(sql: &str) -> Vec<RepositoryBoundary> {
        let meta = extract_metadata(sql);
        let outcome = parse_blocks(&tokenize(sql), sql);
        let ops = detect_operations(&outcome.arena);
        let edges = build_flow_edges(&ops.statements);
        let params = track_parameters(&outcome.arena, &meta);
        synthesize_boundaries(&outcome.arena, &edges, &ops.statements, &params)
    }

    #[test]
    fn single_filtered_select_names_get_by_param() {
        let sql = indoc! {"
            CREATE PROCEDURE GetOrdersByCustomerId @CustomerID INT
            AS
            BEGIN
                SELECT OrderID, OrderDate, Total
                FROM Orders
                WHERE CustomerID = @CustomerID
            END
        "};
        let found = boundaries(sql);
        assert_eq!(found.len(), 1);
        let b = &found[0];
        assert_eq!(b.name, "GetOrderByCustomerID");
        assert_eq!(b.returns, ReturnShape::EntityList);
        assert_eq!(b.parameters.len(), 1);
        assert!(!b.blocks.is_empty());
    }

    #[test]
    fn disconnected_tables_yield_separate_boundaries() {
        let sql = indoc! {"
            SELECT Name FROM Customers WHERE CustomerID = @CustomerID;
            INSERT INTO EventQueue (Kind) VALUES ('refresh');
        "};
        let found = boundaries(sql);
        assert_eq!(found.len(), 2);
        let all_blocks: Vec<_> = found.iter().flat_map(|b| b.blocks.clone()).collect();
        let mut deduped = all_blocks.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(all_blocks.len(), deduped.len(), "boundaries must not overlap");
    }

    #[test]
    fn shared_table_joins_blocks_into_one_component() {
        let sql = indoc! {"
            SELECT Total FROM Orders WHERE OrderID = @OrderID;
            UPDATE Orders SET Total = Total * 1.1 WHERE OrderID = @OrderID;
        "};
        let found = boundaries(sql);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].blocks.len(), 2);
    }

    #[test]
    fn write_only_component_returns_none() {
        let sql = "INSERT INTO AuditLog (Msg) VALUES (@Msg)";
        let found = boundaries(sql);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].returns, ReturnShape::None);
        assert!(found[0].name.starts_with("Create"));
    }

    #[test]
    fn top_one_select_returns_scalar() {
        let sql = indoc! {"
            CREATE PROCEDURE GetLatestOrder @CustomerID INT
            AS
            SELECT TOP 1 OrderID, OrderDate
            FROM Orders
            WHERE CustomerID = @CustomerID
            ORDER BY OrderDate DESC
        "};
        let found = boundaries(sql);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].returns, ReturnShape::Scalar);
    }

    #[test]
    fn temp_table_staging_stays_one_component() {
        let sql = indoc! {"
            CREATE PROCEDURE ArchiveOrders @CustomerID INT
            AS
            BEGIN
                SELECT OrderID, Total INTO #work
                FROM Orders
                WHERE CustomerID = @CustomerID;

                INSERT INTO OrderAudit (OrderID, Total)
                SELECT OrderID, Total FROM #work;
            END
        "};
        let found = boundaries(sql);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].blocks.len(), 2);
    }

    #[test]
    fn filtered_delete_names_delete_by_param() {
        let sql = indoc! {"
            CREATE PROCEDURE RemoveOrder @OrderID INT
            AS
            DELETE FROM Orders WHERE OrderID = @OrderID
        "};
        let found = boundaries(sql);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "DeleteOrderByOrderID");
    }

    #[test]
    fn aggregate_without_grouping_returns_scalar() {
        let sql = indoc! {"
            CREATE PROCEDURE CountOrders @CustomerID INT
            AS
            SELECT COUNT(OrderID) FROM Orders WHERE CustomerID = @CustomerID
        "};
        let found = boundaries(sql);
        assert_eq!(found[0].returns, ReturnShape::Scalar);
    }

    #[test]
    fn singularize_trims_plural_s() {
        assert_eq!(singularize("Orders"), "Order");
        assert_eq!(singularize("Address"), "Address");
        assert_eq!(singularize("dbo.Customers"), "Customer");
    }
}
