//! Statement classifier: tags every leaf statement with a functional
//! purpose. Rules are an ordered static table, most specific first; the
//! first matching rule wins and anything unmatched falls through to
//! `Other` rather than failing.

use crate::core::{PurposeTag, StatementPurpose};
use crate::parse::BlockArena;

type ClassifierRule = (fn(&str) -> bool, PurposeTag);

static CLASSIFIER_RULES: &[ClassifierRule] = &[
    (is_validation, PurposeTag::Validation),
    (is_temp_storage, PurposeTag::TempStorage),
    (is_side_effect, PurposeTag::SideEffect),
    (is_crud_write, PurposeTag::CrudWrite),
    (is_crud_read, PurposeTag::CrudRead),
    (is_control_flow, PurposeTag::ControlFlow),
];

fn head_word(upper: &str) -> &str {
    // The head keyword may butt directly against punctuation, as in
    // RAISERROR('msg', 16, 1), so cut at the first non-identifier char.
    let trimmed = upper.trim_start();
    let end = trimmed
        .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .unwrap_or(trimmed.len());
    &trimmed[..end]
}

fn is_validation(upper: &str) -> bool {
    // Guard shapes: existence probes and NULL checks that terminate or
    // raise, plus RAISERROR/THROW themselves.
    let head = head_word(upper);
    if matches!(head, "THROW" | "RAISERROR") {
        return true;
    }
    if head == "IF" && (upper.contains("EXISTS") || upper.contains("IS NULL")) {
        return true;
    }
    // A bare RETURN is plain control flow; RETURN <code> signals a guard.
    head == "RETURN" && upper.trim().trim_end_matches(';').trim_end() != "RETURN"
}

fn is_temp_storage(upper: &str) -> bool {
    let head = head_word(upper);
    if head == "CREATE" && upper.contains("TABLE") && upper.contains('#') {
        return true;
    }
    if head == "DECLARE" && upper.contains("TABLE") {
        return true;
    }
    if head == "SELECT" && upper.contains(" INTO #") {
        return true;
    }
    matches!(head, "INSERT" | "UPDATE" | "DELETE") && upper.contains('#')
}

fn is_side_effect(upper: &str) -> bool {
    let head = head_word(upper);
    matches!(head, "EXEC" | "EXECUTE" | "PRINT")
        || (matches!(head, "BEGIN" | "COMMIT" | "ROLLBACK")
            && (upper.contains("TRANSACTION") || upper.contains("TRAN")))
}

fn is_crud_write(upper: &str) -> bool {
    matches!(head_word(upper), "INSERT" | "UPDATE" | "DELETE" | "MERGE")
}

fn is_crud_read(upper: &str) -> bool {
    head_word(upper) == "SELECT"
}

fn is_control_flow(upper: &str) -> bool {
    matches!(
        head_word(upper),
        "IF" | "ELSE" | "WHILE" | "RETURN" | "GOTO" | "BREAK" | "CONTINUE" | "SET" | "DECLARE"
    )
}

/// Classify every leaf statement in the arena, in block-id order.
pub fn classify_statements(arena: &BlockArena) -> Vec<StatementPurpose> {
    arena
        .leaves()
        .map(|block| {
            let upper = block.text.to_uppercase();
            let tag = CLASSIFIER_RULES
                .iter()
                .find(|(matches, _)| matches(&upper))
                .map(|(_, tag)| *tag)
                .unwrap_or(PurposeTag::Other);
            StatementPurpose {
                block: block.id,
                tag,
            }
        })
        .collect()
}
