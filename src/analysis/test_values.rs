//! Test value candidate generator: example inputs per parameter, derived
//! from literals seen in extracted rules plus the declared type's boundary
//! values. Advisory only; a parameter with no observed literals still gets
//! its type defaults.

use crate::core::{BusinessRule, Parameter, SuggestedValue, TestValueCandidate, UsageRole};
use once_cell::sync::Lazy;
use regex::Regex;

static CONDITION_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:=|<>|!=|>=|<=|>|<)\s*(?:'([^']*)'|(\d+(?:\.\d+)?))")
        .unwrap_or_else(|e| panic!("invalid condition literal pattern: {e}"))
});

static VARCHAR_LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:VAR)?CHAR\s*\(\s*(\d+)\s*\)")
        .unwrap_or_else(|e| panic!("invalid length pattern: {e}"))
});

fn value(value: &str, purpose: &str, scenario: &str) -> SuggestedValue {
    SuggestedValue {
        value: value.to_string(),
        purpose: purpose.to_string(),
        scenario: scenario.to_string(),
    }
}

fn push_unique(values: &mut Vec<SuggestedValue>, candidate: SuggestedValue) {
    if !values.iter().any(|v| v.value == candidate.value) {
        values.push(candidate);
    }
}

fn condition_literals(param: &Parameter, rules: &[BusinessRule]) -> Vec<String> {
    let upper_name = param.name.to_uppercase();
    let mut literals = Vec::new();
    for rule in rules {
        if !rule.condition.to_uppercase().contains(&upper_name) {
            continue;
        }
        for caps in CONDITION_LITERAL.captures_iter(&rule.condition) {
            if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
                let lit = m.as_str().to_string();
                if !literals.contains(&lit) {
                    literals.push(lit);
                }
            }
        }
    }
    literals
}

fn numeric_values(param: &Parameter, values: &mut Vec<SuggestedValue>) {
    if param.roles.contains(&UsageRole::FilterCondition)
        || param.roles.contains(&UsageRole::ControlBranch)
    {
        push_unique(values, value("0", "BOUNDARY_VALUE", "Zero value"));
        push_unique(values, value("-1", "NEGATIVE_VALUE", "Negative value"));
        push_unique(
            values,
            value("2147483647", "EXTREME_VALUE", "Maximum integer value"),
        );
    }
}

fn string_values(param: &Parameter, upper_type: &str, values: &mut Vec<SuggestedValue>) {
    if param.roles.contains(&UsageRole::FilterCondition) {
        push_unique(values, value("", "BOUNDARY_VALUE", "Empty string"));
        push_unique(values, value("%", "WILDCARD_VALUE", "Wildcard (all values)"));
        if let Some(caps) = VARCHAR_LENGTH.captures(upper_type) {
            if let Ok(len) = caps[1].parse::<usize>() {
                // Cap the fixture so an absurd declared length cannot bloat
                // the report.
                let len = len.min(512);
                push_unique(
                    values,
                    value(
                        &"X".repeat(len),
                        "BOUNDARY_VALUE",
                        &format!("Maximum length ({len} characters)"),
                    ),
                );
            }
        }
    }
}

fn date_values(param: &Parameter, values: &mut Vec<SuggestedValue>) {
    push_unique(values, value("GETDATE()", "CURRENT_VALUE", "Current date/time"));
    if param.roles.contains(&UsageRole::FilterCondition) {
        push_unique(
            values,
            value("DATEADD(day, -30, GETDATE())", "RELATIVE_VALUE", "30 days ago"),
        );
        push_unique(
            values,
            value(
                "DATEADD(day, 30, GETDATE())",
                "RELATIVE_VALUE",
                "30 days in future",
            ),
        );
    }
}

pub fn generate_test_values(
    parameters: &[Parameter],
    rules: &[BusinessRule],
) -> Vec<TestValueCandidate> {
    parameters
        .iter()
        .map(|param| {
            let mut values = Vec::new();

            if let Some(default) = &param.default {
                if !default.eq_ignore_ascii_case("NULL") {
                    push_unique(
                        &mut values,
                        value(default.trim_matches('\''), "DEFAULT_VALUE", "Default case"),
                    );
                }
            }

            for lit in condition_literals(param, rules) {
                push_unique(
                    &mut values,
                    value(&lit, "LITERAL_VALUE", "Value from condition"),
                );
            }

            let upper_type = param.declared_type.to_uppercase();
            if ["INT", "NUMERIC", "DECIMAL", "MONEY", "FLOAT"]
                .iter()
                .any(|t| upper_type.contains(t))
            {
                numeric_values(param, &mut values);
            } else if ["CHAR", "TEXT"].iter().any(|t| upper_type.contains(t)) {
                string_values(param, &upper_type, &mut values);
            } else if ["DATE", "TIME"].iter().any(|t| upper_type.contains(t)) {
                date_values(param, &mut values);
            }

            push_unique(&mut values, value("NULL", "NULL_VALUE", "Null value handling"));

            TestValueCandidate {
                parameter: param.name.clone(),
                declared_type: param.declared_type.clone(),
                values,
            }
        })
        .collect()
}
