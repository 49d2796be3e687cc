//! Migration-risk scorer: flags constructs that resist direct translation
//! to application code. Severity and suggested alternatives come from a
//! static catalog; findings are purely additive and never degrade other
//! passes.

use crate::core::{BlockId, ComplexityFinding, ComplexityKind, Parameter, Severity};
use crate::parse::BlockArena;
use once_cell::sync::Lazy;
use regex::Regex;

static COMPLEXITY_CATALOG: &[(ComplexityKind, Severity, &[&str])] = &[
    (
        ComplexityKind::DynamicSql,
        Severity::High,
        &[
            "Use parameterized queries with a query builder",
            "Break conditional SQL into separate repository methods",
            "Keep the statement static and filter in application code",
        ],
    ),
    (
        ComplexityKind::Cursor,
        Severity::High,
        &[
            "Use set-based statements instead of row-by-row processing",
            "Stream rows and process them in application code",
        ],
    ),
    (
        ComplexityKind::NestedTransaction,
        Severity::Medium,
        &[
            "Flatten to a single transaction scope at the application layer",
            "Use savepoints if partial rollback is genuinely needed",
        ],
    ),
    (
        ComplexityKind::RecursiveCte,
        Severity::Medium,
        &[
            "Materialize the hierarchy with an adjacency or closure table",
            "Walk the recursion in application code with bounded depth",
        ],
    ),
    (
        ComplexityKind::CrossDatabaseRef,
        Severity::High,
        &[
            "Move the referenced data behind a service or replica",
            "Split the procedure along the database boundary",
        ],
    ),
    (
        ComplexityKind::UnusedParameter,
        Severity::Low,
        &["Drop the parameter from the signature and its callers"],
    ),
];

static DYNAMIC_EXEC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bEXEC(?:UTE)?\s*\(\s*@|\bsp_executesql\b|@\w+\s*\+=")
        .unwrap_or_else(|e| panic!("invalid dynamic SQL pattern: {e}"))
});

static CURSOR_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bCURSOR\s+(?:LOCAL\s+|GLOBAL\s+|FORWARD_ONLY\s+|STATIC\s+)*FOR\b")
        .unwrap_or_else(|e| panic!("invalid cursor pattern: {e}"))
});

static BEGIN_TRAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bBEGIN\s+TRAN(?:SACTION)?\b")
        .unwrap_or_else(|e| panic!("invalid transaction pattern: {e}"))
});

static END_TRAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:COMMIT|ROLLBACK)\b")
        .unwrap_or_else(|e| panic!("invalid transaction end pattern: {e}"))
});

static CTE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bWITH\s+(\w+)\b")
        .unwrap_or_else(|e| panic!("invalid CTE pattern: {e}"))
});

static UNION_ALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bUNION\s+ALL\b")
        .unwrap_or_else(|e| panic!("invalid union pattern: {e}"))
});

/// A CTE is recursive when its recursive arm (after UNION ALL) selects or
/// joins the CTE's own name.
fn is_recursive_cte(text: &str) -> bool {
    let Some(header) = CTE_HEADER.captures(text) else {
        return false;
    };
    let Some(union_at) = UNION_ALL.find(text) else {
        return false;
    };
    let name = regex::escape(&header[1]);
    let tail = &text[union_at.end()..];
    Regex::new(&format!(r"(?i)\b(?:FROM|JOIN)\s+{name}\b"))
        .map(|re| re.is_match(tail))
        .unwrap_or(false)
}

static THREE_PART_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b([A-Za-z_]\w*)\.([A-Za-z_]\w*)\.([A-Za-z_]\w*)\b")
        .unwrap_or_else(|e| panic!("invalid three-part name pattern: {e}"))
});

fn catalog_entry(kind: ComplexityKind) -> (Severity, Vec<String>) {
    COMPLEXITY_CATALOG
        .iter()
        .find(|(k, _, _)| *k == kind)
        .map(|(_, sev, alts)| (*sev, alts.iter().map(|s| s.to_string()).collect()))
        .unwrap_or((Severity::Low, Vec::new()))
}

fn finding(kind: ComplexityKind, blocks: Vec<BlockId>) -> ComplexityFinding {
    let (severity, alternatives) = catalog_entry(kind);
    ComplexityFinding {
        kind,
        severity,
        blocks,
        alternatives,
    }
}

/// Scan leaf statements for risk constructs, plus the zero-usage parameter
/// cleanliness note from the tracker's results.
pub fn score_complexity(arena: &BlockArena, parameters: &[Parameter]) -> Vec<ComplexityFinding> {
    let mut findings = Vec::new();
    let mut open_transactions = 0usize;

    for block in arena.leaves() {
        let text = block.text.as_str();

        if DYNAMIC_EXEC.is_match(text) {
            findings.push(finding(ComplexityKind::DynamicSql, vec![block.id]));
        }
        if CURSOR_DECL.is_match(text) {
            findings.push(finding(ComplexityKind::Cursor, vec![block.id]));
        }
        if is_recursive_cte(text) {
            findings.push(finding(ComplexityKind::RecursiveCte, vec![block.id]));
        }
        for caps in THREE_PART_NAME.captures_iter(text) {
            // dbo-prefixed two-part names never reach here; a three-part
            // name means a foreign database.
            if !caps[1].eq_ignore_ascii_case("dbo") {
                findings.push(finding(ComplexityKind::CrossDatabaseRef, vec![block.id]));
                break;
            }
        }

        if BEGIN_TRAN.is_match(text) {
            if open_transactions > 0 {
                findings.push(finding(ComplexityKind::NestedTransaction, vec![block.id]));
            }
            open_transactions += 1;
        } else if END_TRAN.is_match(text) {
            open_transactions = open_transactions.saturating_sub(1);
        }
    }

    for param in parameters {
        if param.is_unused() {
            findings.push(finding(ComplexityKind::UnusedParameter, Vec::new()));
        }
    }

    findings
}
