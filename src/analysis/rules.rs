//! Business rule extractor: conditional branches whose shape suggests an
//! encoded domain decision rather than plumbing. Each candidate gets a
//! confidence from additive signals; low scorers are dropped, never
//! reported as errors.

use crate::config::Thresholds;
use crate::core::{BlockKind, BusinessRule, ControlKind, Parameter, PurposeTag, StatementPurpose};
use crate::parse::BlockArena;
use once_cell::sync::Lazy;
use regex::Regex;

static LITERAL_COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:=|<>|!=|>=|<=|>|<)\s*(?:\d+(?:\.\d+)?|'[^']*'|NULL\b)")
        .unwrap_or_else(|e| panic!("invalid literal comparison pattern: {e}"))
});

static GUARD_ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:RETURN\b|THROW\b|RAISERROR\s*\()")
        .unwrap_or_else(|e| panic!("invalid guard pattern: {e}"))
});

static CASE_ARM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bWHEN\s+(.+?)\s+THEN\s+(.+)")
        .unwrap_or_else(|e| panic!("invalid CASE arm pattern: {e}"))
});

/// Position of the first word-boundary occurrence of `word` in `upper`.
fn find_word(upper: &str, word: &str) -> Option<usize> {
    let bytes = upper.as_bytes();
    let mut start = 0;
    while let Some(pos) = upper[start..].find(word) {
        let at = start + pos;
        let before_ok =
            at == 0 || !(bytes[at - 1].is_ascii_alphanumeric() || bytes[at - 1] == b'_');
        let after = at + word.len();
        let after_ok =
            after >= bytes.len() || !(bytes[after].is_ascii_alphanumeric() || bytes[after] == b'_');
        if before_ok && after_ok {
            return Some(at);
        }
        start = at + 1;
    }
    None
}

fn condition_text(block: &crate::core::LogicalBlock) -> String {
    block
        .text
        .lines()
        .take_while(|l| !l.trim_start().to_uppercase().starts_with("BEGIN"))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn first_action_line(arena: &BlockArena, block: &crate::core::LogicalBlock) -> Option<String> {
    // Depth-first into the branch body for the first leaf statement.
    let mut stack: Vec<_> = block.children.iter().rev().collect();
    while let Some(id) = stack.pop() {
        let child = arena.get(*id)?;
        if child.kind.is_leaf() {
            return child.text.lines().next().map(|l| l.trim().to_string());
        }
        stack.extend(child.children.iter().rev());
    }
    None
}

fn branch_body_text(arena: &BlockArena, block: &crate::core::LogicalBlock) -> String {
    block
        .children
        .iter()
        .filter_map(|id| arena.get(*id))
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn references_parameter(text: &str, parameters: &[Parameter]) -> bool {
    let upper = text.to_ascii_uppercase();
    parameters
        .iter()
        .any(|p| upper.contains(&p.name.to_ascii_uppercase()))
}

/// Extract candidate rules from IF/WHILE conditions, CASE arms, and
/// parameter-vs-literal WHERE predicates.
pub fn extract_rules(
    arena: &BlockArena,
    purposes: &[StatementPurpose],
    parameters: &[Parameter],
    thresholds: &Thresholds,
) -> Vec<BusinessRule> {
    let mut rules = Vec::new();

    for block in arena.iter() {
        match block.kind {
            BlockKind::Control(ControlKind::If) | BlockKind::Control(ControlKind::While) => {
                rules.extend(branch_rule(arena, block, purposes, parameters, thresholds));
            }
            kind if kind.is_leaf() => {
                rules.extend(case_arm_rules(block, parameters, thresholds));
                rules.extend(predicate_rules(block, parameters, thresholds));
            }
            _ => {}
        }
    }

    rules
}

fn branch_rule(
    arena: &BlockArena,
    block: &crate::core::LogicalBlock,
    purposes: &[StatementPurpose],
    parameters: &[Parameter],
    thresholds: &Thresholds,
) -> Option<BusinessRule> {
    let condition = condition_text(block);
    if condition.is_empty() {
        return None;
    }
    let body = branch_body_text(arena, block);

    let mut confidence = 0.0;
    if LITERAL_COMPARISON.is_match(&condition) {
        confidence += thresholds.weight_literal_comparison;
    }
    let branch_validates = purposes.iter().any(|p| {
        matches!(p.tag, PurposeTag::Validation | PurposeTag::ControlFlow)
            && arena
                .get(p.block)
                .and_then(|b| b.parent)
                .map(|parent| {
                    parent == block.id
                        || arena
                            .get(parent)
                            .map(|pb| pb.parent == Some(block.id))
                            .unwrap_or(false)
                })
                .unwrap_or(false)
    });
    if branch_validates {
        confidence += thresholds.weight_control_context;
    }
    if GUARD_ACTION.is_match(&body) {
        confidence += thresholds.weight_guard_action;
    }
    if references_parameter(&condition, parameters) {
        confidence += thresholds.weight_named_parameter;
    }
    let confidence = confidence.clamp(0.0, 1.0);

    if confidence < thresholds.rule_confidence_min {
        return None;
    }

    let consequence =
        first_action_line(arena, block).unwrap_or_else(|| "conditional branch".to_string());

    Some(BusinessRule {
        condition,
        consequence,
        blocks: vec![block.id],
        confidence,
    })
}

/// CASE arms comparing against literals encode per-value decisions.
fn case_arm_rules(
    block: &crate::core::LogicalBlock,
    parameters: &[Parameter],
    thresholds: &Thresholds,
) -> Vec<BusinessRule> {
    let upper = block.text.to_ascii_uppercase();
    if find_word(&upper, "CASE").is_none() {
        return Vec::new();
    }

    let mut out = Vec::new();
    for line in block.text.lines() {
        let Some(caps) = CASE_ARM.captures(line) else {
            continue;
        };
        let condition = caps[1].trim().to_string();

        let mut confidence = 0.0;
        if LITERAL_COMPARISON.is_match(&condition) {
            confidence += thresholds.weight_literal_comparison;
        }
        if references_parameter(&condition, parameters) {
            confidence += thresholds.weight_named_parameter;
        }
        let confidence = confidence.clamp(0.0, 1.0);
        if confidence < thresholds.rule_confidence_min {
            continue;
        }

        out.push(BusinessRule {
            condition,
            consequence: arm_consequence(&caps[2]),
            blocks: vec![block.id],
            confidence,
        });
    }
    out
}

/// The THEN expression runs to the arm's end, not to the end of the CASE.
fn arm_consequence(rest: &str) -> String {
    let upper = rest.to_ascii_uppercase();
    let mut end = rest.len();
    for kw in ["WHEN", "ELSE", "END"] {
        if let Some(at) = find_word(&upper, kw) {
            end = end.min(at);
        }
    }
    rest[..end].trim().trim_end_matches(',').trim_end().to_string()
}

/// WHERE conjuncts that pit a named parameter against a literal gate the
/// statement the same way a guard branch would.
fn predicate_rules(
    block: &crate::core::LogicalBlock,
    parameters: &[Parameter],
    thresholds: &Thresholds,
) -> Vec<BusinessRule> {
    let upper = block.text.to_ascii_uppercase();
    let Some(where_at) = find_word(&upper, "WHERE") else {
        return Vec::new();
    };
    let clause = &block.text[where_at + "WHERE".len()..];

    let mut out = Vec::new();
    for conjunct in split_predicates(clause) {
        let condition = conjunct.trim().trim_end_matches(';').trim_end().to_string();
        if condition.is_empty()
            || !references_parameter(&condition, parameters)
            || !LITERAL_COMPARISON.is_match(&condition)
        {
            continue;
        }
        let confidence = (thresholds.weight_literal_comparison
            + thresholds.weight_named_parameter)
            .clamp(0.0, 1.0);
        if confidence < thresholds.rule_confidence_min {
            continue;
        }
        let consequence = block
            .text
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        out.push(BusinessRule {
            condition,
            consequence,
            blocks: vec![block.id],
            confidence,
        });
    }
    out
}

/// Split a WHERE clause into conjuncts at word-boundary AND/OR.
fn split_predicates(clause: &str) -> Vec<&str> {
    let upper = clause.to_ascii_uppercase();
    let mut cuts: Vec<(usize, usize)> = Vec::new();
    for kw in ["AND", "OR"] {
        let mut from = 0;
        while let Some(at) = find_word(&upper[from..], kw) {
            cuts.push((from + at, kw.len()));
            from += at + kw.len();
        }
    }
    cuts.sort_unstable();

    let mut parts = Vec::new();
    let mut start = 0;
    for (at, len) in cuts {
        parts.push(&clause[start..at]);
        start = at + len;
    }
    parts.push(&clause[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{classify_statements, track_parameters};
    use crate::lexer::tokenize;
    use crate::parse::{extract_metadata, parse_blocks};
    use indoc::indoc;

    fn rules(sql: &str) -> Vec<BusinessRule> {
        let meta = extract_metadata(sql);
        let outcome = parse_blocks(&tokenize(sql), sql);
        let purposes = classify_statements(&outcome.arena);
        let params = track_parameters(&outcome.arena, &meta);
        extract_rules(
            &outcome.arena,
            &purposes,
            &params,
            &Thresholds::default(),
        )
    }

    #[test]
    fn guarded_literal_comparison_scores_high() {
        let sql = indoc! {"
            CREATE PROCEDURE ApplyDiscount @Total MONEY
            AS
            BEGIN
                IF @Total > 1000
                BEGIN
                    RETURN 1;
                END
            END
        "};
        let found = rules(sql);
        assert_eq!(found.len(), 1);
        let rule = &found[0];
        assert!(rule.condition.contains("@Total > 1000"));
        // literal 0.4 + context 0.3 + guard 0.2 + named param 0.1
        assert!((rule.confidence - 1.0).abs() < 1e-9);
    }

    #[test]
    fn weak_candidates_are_dropped() {
        // No literal, no guard, no parameter: scores under the cutoff.
        let sql = indoc! {"
            IF CURRENT_TIMESTAMP IS NOT NULL
            BEGIN
                PRINT 'tick';
            END
        "};
        let found = rules(sql);
        assert!(found.is_empty());
    }

    #[test]
    fn confidence_is_clamped_to_unit_interval() {
        let sql = indoc! {"
            CREATE PROCEDURE Check @Qty INT
            AS
            IF @Qty <= 0
            BEGIN
                THROW 50001, 'quantity must be positive', 1;
            END
        "};
        let found = rules(sql);
        assert_eq!(found.len(), 1);
        assert!(found[0].confidence <= 1.0);
        assert!(found[0].confidence >= 0.0);
    }

    #[test]
    fn case_arms_against_literals_are_rules() {
        let sql = indoc! {"
            CREATE PROCEDURE PriceOrder @CustomerType VARCHAR(10)
            AS
            SELECT OrderID,
                CASE
                    WHEN @CustomerType = 'VIP' THEN Total * 0.9
                    WHEN @CustomerType = 'STAFF' THEN Total * 0.8
                    ELSE Total
                END AS Charged
            FROM Orders
        "};
        let found = rules(sql);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].condition, "@CustomerType = 'VIP'");
        assert_eq!(found[0].consequence, "Total * 0.9");
        assert_eq!(found[1].condition, "@CustomerType = 'STAFF'");
        // literal 0.4 + named param 0.1
        assert!((found[0].confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn where_predicate_on_param_vs_literal_is_a_rule() {
        let sql = indoc! {"
            CREATE PROCEDURE GetPriorityOrders @Level INT
            AS
            SELECT OrderID FROM Orders WHERE Priority = @Level AND @Level <= 3
        "};
        let found = rules(sql);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].condition, "@Level <= 3");
        assert!(found[0].consequence.starts_with("SELECT OrderID"));
    }

    #[test]
    fn column_only_where_predicates_are_not_rules() {
        let sql = indoc! {"
            SELECT OrderID FROM Orders WHERE Status = 'OPEN' AND Total > 100
        "};
        assert!(rules(sql).is_empty());
    }

    #[test]
    fn consequence_is_first_branch_action() {
        let sql = indoc! {"
            CREATE PROCEDURE Check @Qty INT
            AS
            IF @Qty <= 0
            BEGIN
                RETURN -1;
            END
        "};
        let found = rules(sql);
        assert_eq!(found[0].consequence, "RETURN -1;");
    }
}
