//! Parameter tracker: attributes usage roles to declared parameters and
//! DECLAREd locals by walking blocks in document order. One textual
//! reference can carry more than one role (a value both filtered on and
//! assigned, say), so roles are a multiset.

use crate::core::{BlockKind, ControlKind, Direction, Parameter, ProcedureMetadata, UsageRole};
use crate::parse::BlockArena;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

static DECLARE_LOCAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bDECLARE\s+(@\w+)\s+([\w()\d,]+)")
        .unwrap_or_else(|e| panic!("invalid DECLARE pattern: {e}"))
});

static VARIABLE_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@\w+").unwrap_or_else(|e| panic!("invalid variable pattern: {e}")));

fn escaped(name: &str) -> String {
    regex::escape(name)
}

/// Roles a single occurrence of `name` carries inside `text`.
fn roles_in_statement(name: &str, upper: &str, control_parent: bool) -> Vec<UsageRole> {
    let mut roles = Vec::new();
    let upper_name = name.to_uppercase();
    let pat = escaped(&upper_name);

    let filter = Regex::new(&format!(
        r"(?s)\bWHERE\b.*?(?:=|<>|!=|>=|<=|>|<|\bLIKE\b|\bIN\b|\bBETWEEN\b)\s*\(?\s*{pat}\b"
    ));
    let assign_target = Regex::new(&format!(r"{pat}\s*="));
    let set_value = Regex::new(&format!(
        r"(?s)\b(?:VALUES\s*\(.*?{pat}|SET\s+\w[\w.]*\s*=[^,;]*?{pat}|(?:SET|SELECT)\s+@\w+\s*=.*?{pat})"
    ));
    let output_select = Regex::new(&format!(r"(?s)\bSELECT\b[^=]*?{pat}\b.*?\bAS\b"));

    if let Ok(re) = filter {
        if re.is_match(upper) {
            roles.push(UsageRole::FilterCondition);
        }
    }
    if control_parent {
        roles.push(UsageRole::ControlBranch);
    }
    if let Ok(re) = assign_target {
        if re.is_match(upper)
            && (upper.trim_start().starts_with("SET") || upper.trim_start().starts_with("SELECT"))
        {
            roles.push(UsageRole::AssignmentTarget);
        }
    }
    if let Ok(re) = set_value {
        if re.is_match(upper) {
            roles.push(UsageRole::AssignmentSource);
        }
    }
    if let Ok(re) = output_select {
        if re.is_match(upper) {
            roles.push(UsageRole::OutputBinding);
        }
    }

    // A bare reference in an OUTPUT clause binds results back to the caller.
    if upper.contains("OUTPUT") && upper.contains(&upper_name) && roles.is_empty() {
        roles.push(UsageRole::OutputBinding);
    }

    roles
}

fn is_control(kind: BlockKind) -> bool {
    matches!(
        kind,
        BlockKind::Control(ControlKind::If) | BlockKind::Control(ControlKind::While)
    )
}

/// Seed parameters from the procedure signature and DECLARE statements,
/// then attribute usage roles in document order.
pub fn track_parameters(arena: &BlockArena, metadata: &ProcedureMetadata) -> Vec<Parameter> {
    let mut params: Vec<Parameter> = metadata.parameters.clone();
    let mut index: BTreeMap<String, usize> = params
        .iter()
        .enumerate()
        .map(|(i, p)| (p.name.to_uppercase(), i))
        .collect();

    // DECLARE adds locals after the declared signature, in document order.
    for block in arena.leaves() {
        for caps in DECLARE_LOCAL.captures_iter(&block.text) {
            let name = caps[1].to_string();
            let key = name.to_uppercase();
            if !index.contains_key(&key) {
                index.insert(key, params.len());
                params.push(Parameter {
                    name,
                    declared_type: caps[2].trim().trim_end_matches(',').to_string(),
                    direction: Direction::Local,
                    roles: Vec::new(),
                    ordinal: params.len(),
                    default: None,
                });
            }
        }
    }

    for block in arena.iter() {
        // Control-block text includes its body; restrict role attribution
        // to the condition line so body statements are not double counted.
        let (scan_text, control) = match block.kind {
            k if is_control(k) => {
                let condition: String = block
                    .text
                    .lines()
                    .take_while(|l| {
                        let upper = l.to_uppercase();
                        !upper.trim_start().starts_with("BEGIN")
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                (condition, true)
            }
            BlockKind::Statement => (block.text.clone(), false),
            _ => continue,
        };
        let upper = scan_text.to_uppercase();

        // Attribute roles once per distinct name per statement; the role
        // multiset then counts usage sites, not textual repetitions.
        let mut seen_here: Vec<usize> = Vec::new();
        for m in VARIABLE_REF.find_iter(&scan_text) {
            let key = m.as_str().to_uppercase();
            let Some(&i) = index.get(&key) else { continue };
            if seen_here.contains(&i) {
                continue;
            }
            seen_here.push(i);
            // Neither the signature nor a bare DECLARE is a usage.
            if upper.trim_start().starts_with("CREATE")
                || (upper.trim_start().starts_with("DECLARE") && !upper.contains('='))
            {
                continue;
            }
            for role in roles_in_statement(&params[i].name, &upper, control) {
                params[i].roles.push(role);
            }
        }
    }

    params
}
