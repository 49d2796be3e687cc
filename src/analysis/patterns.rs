//! Query pattern detector: recurring query shapes that map onto stock
//! repository idioms. Detection is a static rule registry over leaf
//! statements; one block may match any number of patterns, and an
//! unmatched block simply contributes nothing.

use crate::core::{BlockKind, ControlKind, LogicalBlock, QueryPattern, QueryPatternKind};
use crate::parse::BlockArena;
use once_cell::sync::Lazy;
use regex::Regex;

/// Per-block view the pattern predicates run against.
pub struct BlockView<'a> {
    pub block: &'a LogicalBlock,
    pub upper: String,
}

type PatternRule = (fn(&BlockView) -> bool, QueryPatternKind);

static PATTERN_RULES: &[PatternRule] = &[
    (is_pagination, QueryPatternKind::Pagination),
    (is_soft_delete_filter, QueryPatternKind::SoftDeleteFilter),
    (is_merge_upsert, QueryPatternKind::Upsert),
    (is_bulk_operation, QueryPatternKind::BulkOperation),
    (is_audit_trail, QueryPatternKind::AuditTrail),
];

static UPDATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*UPDATE\s+([#\w.\[\]]+)")
        .unwrap_or_else(|e| panic!("invalid UPDATE pattern: {e}"))
});

static INSERT_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*INSERT\s+(?:INTO\s+)?([#\w.\[\]]+)")
        .unwrap_or_else(|e| panic!("invalid INSERT pattern: {e}"))
});

static AUDIT_TARGET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bINSERT\s+(?:INTO\s+)?[\w.\[\]]*(?:LOG|AUDIT|HISTORY)\b")
        .unwrap_or_else(|e| panic!("invalid audit pattern: {e}"))
});

fn is_pagination(view: &BlockView) -> bool {
    let u = &view.upper;
    if !u.contains("ORDER BY") {
        return false;
    }
    let has_word = |kw: &str| {
        u.split(|c: char| !c.is_alphanumeric() && c != '_')
            .any(|word| word == kw)
    };
    has_word("TOP") || has_word("LIMIT") || (has_word("OFFSET") && has_word("FETCH"))
}

fn is_soft_delete_filter(view: &BlockView) -> bool {
    let u = &view.upper;
    let Some(where_at) = u.find("WHERE") else {
        return false;
    };
    let clause = &u[where_at..];
    ["ISACTIVE", "ISDELETED", "ACTIVE", "DELETED"]
        .iter()
        .any(|flag| {
            clause
                .split(|c: char| !c.is_alphanumeric() && c != '_')
                .any(|word| word == *flag)
        })
}

fn is_merge_upsert(view: &BlockView) -> bool {
    view.upper.trim_start().starts_with("MERGE")
}

fn is_bulk_operation(view: &BlockView) -> bool {
    let u = view.upper.trim_start();
    if u.starts_with("INSERT") && u.contains("SELECT") && !u.contains("VALUES") {
        return true;
    }
    (u.starts_with("UPDATE") || u.starts_with("DELETE")) && !u.contains("WHERE")
}

fn is_audit_trail(view: &BlockView) -> bool {
    AUDIT_TARGET.is_match(&view.upper)
}

fn existence_checks(arena: &BlockArena) -> Vec<QueryPattern> {
    // IF [NOT] EXISTS(SELECT ...) lives in the control block's condition,
    // not in a leaf statement.
    arena
        .iter()
        .filter(|b| b.kind == BlockKind::Control(ControlKind::If))
        .filter(|b| {
            let condition: String = b
                .text
                .lines()
                .take_while(|l| !l.trim_start().to_uppercase().starts_with("BEGIN"))
                .collect::<Vec<_>>()
                .join(" ")
                .to_uppercase();
            condition.contains("EXISTS")
        })
        .map(|b| QueryPattern {
            kind: QueryPatternKind::ExistenceCheck,
            blocks: vec![b.id],
        })
        .collect()
}

fn update_then_insert_upserts(arena: &BlockArena) -> Vec<QueryPattern> {
    // An UPDATE followed by an INSERT on the same table (typically the
    // INSERT guarded by @@ROWCOUNT or NOT EXISTS) is the manual upsert.
    let leaves: Vec<&LogicalBlock> = arena.leaves().collect();
    let mut found = Vec::new();
    for (i, update) in leaves.iter().enumerate() {
        let Some(update_caps) = UPDATE_TABLE.captures(&update.text) else {
            continue;
        };
        let table = update_caps[1].to_uppercase();
        for insert in leaves.iter().skip(i + 1) {
            if let Some(insert_caps) = INSERT_TABLE.captures(&insert.text) {
                if insert_caps[1].to_uppercase() == table {
                    found.push(QueryPattern {
                        kind: QueryPatternKind::Upsert,
                        blocks: vec![update.id, insert.id],
                    });
                    break;
                }
            }
        }
    }
    found
}

pub fn detect_patterns(arena: &BlockArena) -> Vec<QueryPattern> {
    let mut patterns: Vec<QueryPattern> = arena
        .leaves()
        .flat_map(|block| {
            let view = BlockView {
                block,
                upper: block.text.to_uppercase(),
            };
            PATTERN_RULES
                .iter()
                .filter(|(matches, _)| matches(&view))
                .map(|(_, kind)| QueryPattern {
                    kind: *kind,
                    blocks: vec![block.id],
                })
                .collect::<Vec<_>>()
        })
        .collect();

    patterns.extend(existence_checks(arena));
    patterns.extend(update_then_insert_upserts(arena));
    patterns.sort_by_key(|p| (p.blocks.first().copied(), p.kind as usize));
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parse::parse_blocks;
    use indoc::indoc;

    fn kinds(sql: &str) -> Vec<QueryPatternKind> {
        let outcome = parse_blocks(&tokenize(sql), sql);
        detect_patterns(&outcome.arena)
            .into_iter()
            .map(|p| p.kind)
            .collect()
    }

    #[test]
    fn top_with_order_by_is_pagination() {
        let sql = "SELECT TOP 20 OrderID FROM Orders ORDER BY OrderDate DESC";
        assert_eq!(kinds(sql), vec![QueryPatternKind::Pagination]);
    }

    #[test]
    fn order_by_alone_is_not_pagination() {
        let sql = "SELECT OrderID FROM Orders ORDER BY OrderDate";
        assert!(kinds(sql).is_empty());
    }

    #[test]
    fn identifier_containing_top_is_not_pagination() {
        let sql = "SELECT TopicID, Title FROM Topics ORDER BY Title";
        assert!(kinds(sql).is_empty());
    }

    #[test]
    fn if_exists_is_existence_check() {
        let sql = indoc! {"
            IF NOT EXISTS (SELECT 1 FROM Customers WHERE CustomerID = @CustomerID)
            BEGIN
                RETURN -1;
            END
        "};
        assert!(kinds(sql).contains(&QueryPatternKind::ExistenceCheck));
    }

    #[test]
    fn is_deleted_flag_is_soft_delete() {
        let sql = "SELECT OrderID FROM Orders WHERE IsDeleted = 0";
        assert_eq!(kinds(sql), vec![QueryPatternKind::SoftDeleteFilter]);
    }

    #[test]
    fn update_then_insert_same_table_is_upsert() {
        let sql = indoc! {"
            UPDATE Settings SET Value = @Value WHERE Name = @Name;
            IF @@ROWCOUNT = 0
            BEGIN
                INSERT INTO Settings (Name, Value) VALUES (@Name, @Value);
            END
        "};
        let found = kinds(sql);
        assert!(found.contains(&QueryPatternKind::Upsert));
    }

    #[test]
    fn merge_is_upsert() {
        let sql = indoc! {"
            MERGE Settings AS t
            USING (SELECT @Name AS Name) AS s ON t.Name = s.Name
            WHEN MATCHED THEN UPDATE SET Value = @Value
            WHEN NOT MATCHED THEN INSERT (Name, Value) VALUES (@Name, @Value);
        "};
        assert!(kinds(sql).contains(&QueryPatternKind::Upsert));
    }

    #[test]
    fn delete_without_where_is_bulk() {
        assert_eq!(
            kinds("DELETE FROM StagingRows"),
            vec![QueryPatternKind::BulkOperation]
        );
    }

    #[test]
    fn insert_into_audit_table_is_audit_trail() {
        let sql = "INSERT INTO OrderAudit (OrderID, Action) VALUES (@OrderID, 'UPDATE')";
        assert_eq!(kinds(sql), vec![QueryPatternKind::AuditTrail]);
    }

    #[test]
    fn one_block_can_match_several_patterns() {
        let sql = "INSERT INTO ChangeLog (Msg) SELECT Msg FROM PendingChanges";
        let found = kinds(sql);
        assert!(found.contains(&QueryPatternKind::BulkOperation));
        assert!(found.contains(&QueryPatternKind::AuditTrail));
    }
}
