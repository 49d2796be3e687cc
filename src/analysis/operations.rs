//! Operations detector: per-statement read/write sets and the aggregated,
//! deduplicated table reference list.

use crate::core::{AccessMode, BlockId, Entity, OperationKind, TableReference};
use crate::parse::BlockArena;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

static FROM_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bFROM\s+([#@\w.\[\]]+)(?:\s+(?:AS\s+)?([A-Za-z_]\w*))?")
        .unwrap_or_else(|e| panic!("invalid FROM pattern: {e}"))
});

static JOIN_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bJOIN\s+([#@\w.\[\]]+)")
        .unwrap_or_else(|e| panic!("invalid JOIN pattern: {e}"))
});

/// Keywords that follow a table name and must not be mistaken for aliases.
static NON_ALIAS_KEYWORDS: &[&str] = &[
    "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "ON", "GROUP", "ORDER", "SET",
    "WITH", "AS", "UNION", "HAVING", "OPTION", "FOR",
];

static INSERT_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bINSERT\s+(?:INTO\s+)?([#@\w.\[\]]+)")
        .unwrap_or_else(|e| panic!("invalid INSERT pattern: {e}"))
});

static UPDATE_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bUPDATE\s+([#@\w.\[\]]+)")
        .unwrap_or_else(|e| panic!("invalid UPDATE pattern: {e}"))
});

static DELETE_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bDELETE\s+(?:FROM\s+)?([#@\w.\[\]]+)")
        .unwrap_or_else(|e| panic!("invalid DELETE pattern: {e}"))
});

static SELECT_INTO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bINTO\s+([#@\w.\[\]]+)")
        .unwrap_or_else(|e| panic!("invalid INTO pattern: {e}"))
});

static VARIABLE_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(@\w+)\s*(?:\+|-|\*|/)?=")
        .unwrap_or_else(|e| panic!("invalid assignment pattern: {e}"))
});

static SELECT_COLUMNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\bSELECT\s+(?:DISTINCT\s+)?(?:TOP\s*\(?\s*\d+\s*\)?\s+)?(.*?)\bFROM\b")
        .unwrap_or_else(|e| panic!("invalid column list pattern: {e}"))
});

static WHERE_COLUMNS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([A-Za-z_][\w.]*)\s*(?:=|<>|!=|>=|<=|>|<|\bLIKE\b|\bIN\b|\bIS\b)")
        .unwrap_or_else(|e| panic!("invalid predicate pattern: {e}"))
});

static AGGREGATE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:COUNT|SUM|AVG|MIN|MAX)\s*\(")
        .unwrap_or_else(|e| panic!("invalid aggregate pattern: {e}"))
});

static TOP_ONE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bTOP\s*\(?\s*1\b")
        .unwrap_or_else(|e| panic!("invalid TOP 1 pattern: {e}"))
});

/// Per-statement access summary. Later passes (data flow, patterns,
/// boundaries) consume these rather than re-scanning text.
#[derive(Clone, Debug)]
pub struct StatementOps {
    pub block: BlockId,
    pub head: Option<OperationKind>,
    pub reads: Vec<Entity>,
    pub writes: Vec<Entity>,
    pub columns: BTreeSet<String>,
    /// Head kind first, then the clause-shape kinds: JOIN for joined
    /// sources, FILTER for a WHERE clause, AGGREGATE for aggregate calls
    /// or grouping.
    pub kinds: Vec<OperationKind>,
    pub has_group_by: bool,
    pub has_top_one: bool,
}

impl StatementOps {
    pub fn has_kind(&self, kind: OperationKind) -> bool {
        self.kinds.contains(&kind)
    }
}

#[derive(Clone, Debug, Default)]
pub struct OperationsOutput {
    pub statements: Vec<StatementOps>,
    pub tables: Vec<TableReference>,
}

/// Classify a raw object name into the entity namespace it belongs to.
pub fn entity_for(name: &str) -> Entity {
    let clean = name.trim_matches(['[', ']']).to_string();
    if clean.starts_with('@') {
        Entity::Variable(clean)
    } else if clean.starts_with('#') {
        Entity::TempTable(clean)
    } else {
        Entity::Table(clean)
    }
}

fn statement_head(text: &str) -> Option<OperationKind> {
    let head = text.split_whitespace().next()?.to_uppercase();
    match head.as_str() {
        "SELECT" => Some(OperationKind::Select),
        "INSERT" => Some(OperationKind::Insert),
        "UPDATE" | "MERGE" => Some(OperationKind::Update),
        "DELETE" => Some(OperationKind::Delete),
        _ => None,
    }
}

fn contains_keyword(text: &str, kw: &str) -> bool {
    let upper = text.to_uppercase();
    let needle = kw.to_uppercase();
    let bytes = upper.as_bytes();
    let mut start = 0;
    while let Some(pos) = upper[start..].find(&needle) {
        let at = start + pos;
        let before_ok = at == 0 || !(bytes[at - 1].is_ascii_alphanumeric() || bytes[at - 1] == b'_');
        let after = at + needle.len();
        let after_ok =
            after >= bytes.len() || !(bytes[after].is_ascii_alphanumeric() || bytes[after] == b'_');
        if before_ok && after_ok {
            return true;
        }
        start = at + 1;
    }
    false
}

fn select_list_columns(text: &str, out: &mut BTreeSet<String>) {
    if let Some(caps) = SELECT_COLUMNS.captures(text) {
        for item in caps[1].split(',') {
            let item = item.trim();
            if item.is_empty() || item == "*" {
                continue;
            }
            // Strip aliases and expressions down to the leading column path.
            let col: String = item
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
                .collect();
            if col.is_empty() || col.starts_with(|c: char| c.is_ascii_digit()) {
                continue;
            }
            let upper = col.to_uppercase();
            if matches!(upper.as_str(), "COUNT" | "SUM" | "AVG" | "MIN" | "MAX" | "CASE") {
                continue;
            }
            out.insert(col);
        }
    }
}

fn where_columns(text: &str, out: &mut BTreeSet<String>) {
    let upper = text.to_uppercase();
    let Some(where_at) = upper.find("WHERE") else {
        return;
    };
    let clause = &text[where_at + "WHERE".len()..];
    for caps in WHERE_COLUMNS.captures_iter(clause) {
        let col = &caps[1];
        let upper = col.to_uppercase();
        if matches!(
            upper.as_str(),
            "AND" | "OR" | "NOT" | "NULL" | "LIKE" | "IN" | "IS" | "EXISTS" | "BETWEEN"
        ) {
            continue;
        }
        out.insert(col.to_string());
    }
}

fn analyze_statement(block: &crate::core::LogicalBlock) -> Option<StatementOps> {
    let text = block.text.as_str();
    let head = statement_head(text);

    let mut reads: Vec<Entity> = Vec::new();
    let mut writes: Vec<Entity> = Vec::new();
    let mut columns = BTreeSet::new();

    let mut push_unique = |list: &mut Vec<Entity>, e: Entity| {
        if !list.contains(&e) {
            list.push(e);
        }
    };

    match head {
        Some(OperationKind::Select) => {
            for caps in FROM_TABLE.captures_iter(text) {
                push_unique(&mut reads, entity_for(&caps[1]));
            }
            for caps in JOIN_TABLE.captures_iter(text) {
                push_unique(&mut reads, entity_for(&caps[1]));
            }
            // SELECT ... INTO #target materializes; SELECT @v = ... assigns.
            if let Some(caps) = SELECT_INTO.captures(text) {
                push_unique(&mut writes, entity_for(&caps[1]));
            }
            for caps in VARIABLE_ASSIGN.captures_iter(text) {
                push_unique(&mut writes, Entity::Variable(caps[1].to_string()));
            }
            select_list_columns(text, &mut columns);
            where_columns(text, &mut columns);
        }
        Some(OperationKind::Insert) => {
            if let Some(caps) = INSERT_TARGET.captures(text) {
                push_unique(&mut writes, entity_for(&caps[1]));
            }
            // INSERT ... SELECT pulls from source tables.
            for caps in FROM_TABLE.captures_iter(text) {
                push_unique(&mut reads, entity_for(&caps[1]));
            }
            for caps in JOIN_TABLE.captures_iter(text) {
                push_unique(&mut reads, entity_for(&caps[1]));
            }
        }
        Some(OperationKind::Update) => {
            if let Some(caps) = UPDATE_TARGET.captures(text) {
                push_unique(&mut writes, entity_for(&caps[1]));
            }
            for caps in FROM_TABLE.captures_iter(text) {
                push_unique(&mut reads, entity_for(&caps[1]));
            }
            for caps in JOIN_TABLE.captures_iter(text) {
                push_unique(&mut reads, entity_for(&caps[1]));
            }
            where_columns(text, &mut columns);
        }
        Some(OperationKind::Delete) => {
            if let Some(caps) = DELETE_TARGET.captures(text) {
                push_unique(&mut writes, entity_for(&caps[1]));
            }
            where_columns(text, &mut columns);
        }
        _ => {
            // SET @x = expr reads the tables/variables in the expression.
            let upper_head = text
                .split_whitespace()
                .next()
                .map(|w| w.to_uppercase())
                .unwrap_or_default();
            if upper_head == "SET" {
                for caps in VARIABLE_ASSIGN.captures_iter(text) {
                    push_unique(&mut writes, Entity::Variable(caps[1].to_string()));
                }
                for caps in FROM_TABLE.captures_iter(text) {
                    push_unique(&mut reads, entity_for(&caps[1]));
                }
            } else {
                return None;
            }
        }
    }

    if reads.is_empty() && writes.is_empty() {
        return None;
    }

    let has_group_by = contains_keyword(text, "GROUP");
    let mut kinds: Vec<OperationKind> = head.into_iter().collect();
    if contains_keyword(text, "JOIN") {
        kinds.push(OperationKind::Join);
    }
    if contains_keyword(text, "WHERE") {
        kinds.push(OperationKind::Filter);
    }
    if AGGREGATE_CALL.is_match(text) || has_group_by {
        kinds.push(OperationKind::Aggregate);
    }

    Some(StatementOps {
        block: block.id,
        head,
        reads,
        writes,
        columns,
        kinds,
        has_group_by,
        has_top_one: TOP_ONE.is_match(text),
    })
}

/// Walk leaf statements in document order and produce per-statement access
/// summaries plus the merged table reference section.
pub fn detect_operations(arena: &BlockArena) -> OperationsOutput {
    let statements: Vec<StatementOps> = arena.leaves().filter_map(analyze_statement).collect();

    // Merge per-statement accesses into one reference per table. BTreeMap
    // keyed by normalized name keeps emission order deterministic.
    let mut merged: BTreeMap<String, TableReference> = BTreeMap::new();
    for stmt in &statements {
        let accesses = stmt
            .reads
            .iter()
            .map(|e| (e, AccessMode::Read))
            .chain(stmt.writes.iter().map(|e| (e, AccessMode::Write)));
        for (entity, mode) in accesses {
            let name = match entity {
                Entity::Table(n) | Entity::TempTable(n) => n.clone(),
                Entity::Variable(_) => continue,
            };
            merged
                .entry(name.clone())
                .and_modify(|r| {
                    r.access = r.access.union(mode);
                    r.columns.extend(stmt.columns.iter().cloned());
                    if !r.blocks.contains(&stmt.block) {
                        r.blocks.push(stmt.block);
                    }
                })
                .or_insert_with(|| TableReference {
                    table: name,
                    alias: table_alias(arena, stmt.block),
                    columns: stmt.columns.clone(),
                    access: mode,
                    blocks: vec![stmt.block],
                });
        }
    }

    OperationsOutput {
        statements,
        tables: merged.into_values().collect(),
    }
}

fn table_alias(arena: &BlockArena, block: BlockId) -> Option<String> {
    let text = arena.get(block)?.text.as_str();
    FROM_TABLE
        .captures(text)
        .and_then(|caps| caps.get(2).map(|m| m.as_str().to_string()))
        .filter(|alias| {
            !NON_ALIAS_KEYWORDS
                .iter()
                .any(|kw| alias.eq_ignore_ascii_case(kw))
        })
}
