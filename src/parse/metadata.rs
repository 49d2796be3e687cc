//! Procedure header extraction: name, parameter declarations, and any
//! leading documentation comments.

use crate::core::{Direction, Parameter, ProcedureMetadata};
use once_cell::sync::Lazy;
use regex::Regex;

static CREATE_PROC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)CREATE\s+(?:OR\s+ALTER\s+)?PROC(?:EDURE)?\s+(\[?[\w.\[\]]+\]?)")
        .unwrap_or_else(|e| panic!("invalid procedure header pattern: {e}"))
});

static PARAM_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)@(\w+)\s+([\w()\d,.]+)(?:\s*=\s*([^,\n]*?))?(\s+OUT(?:PUT)?)?\s*(?:,|$)")
        .unwrap_or_else(|e| panic!("invalid parameter pattern: {e}"))
});

static HEADER_COMMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/\*\s*([\s\S]*?)\s*\*/|--[ \t]*(.*)")
        .unwrap_or_else(|e| panic!("invalid header comment pattern: {e}"))
});

/// How far into the source we look for header comments. Comments past the
/// first statements of the body are not documentation.
const HEADER_SCAN_BYTES: usize = 1000;

/// Extract procedure name, declared parameters, and header comments.
///
/// Parameter roles start empty; the parameter tracking pass fills them.
/// A missing `CREATE PROCEDURE` header is not an error: loose statement
/// batches analyze fine, they just carry an empty name and no parameters.
pub fn extract_metadata(source: &str) -> ProcedureMetadata {
    let mut metadata = ProcedureMetadata::default();

    if let Some(caps) = CREATE_PROC.captures(source) {
        if let Some(name) = caps.get(1) {
            metadata.procedure_name = unbracket(name.as_str());
            let after_header = &source[name.end()..];
            metadata.parameters = parse_parameters(parameter_section(after_header));
        }
    }

    metadata.header_comments = header_comments(source);
    metadata
}

/// Strip delimiters from each segment of a possibly bracketed path, so
/// `[dbo].[GetCustomer]` comes out as `dbo.GetCustomer`.
fn unbracket(name: &str) -> String {
    name.split('.')
        .map(|segment| segment.trim_matches(['[', ']']))
        .collect::<Vec<_>>()
        .join(".")
}

/// Everything between the procedure name and the body-opening `AS`.
fn parameter_section(after_header: &str) -> &str {
    let mut depth = 0usize;
    let mut prev_boundary = true;
    let bytes = after_header.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'A' | b'a' if depth == 0 && prev_boundary => {
                let rest = &after_header[idx..];
                let is_as = rest.len() >= 2
                    && rest[..2].eq_ignore_ascii_case("as")
                    && rest[2..]
                        .chars()
                        .next()
                        .map(|c| !c.is_alphanumeric() && c != '_')
                        .unwrap_or(true);
                if is_as {
                    return &after_header[..idx];
                }
            }
            _ => {}
        }
        prev_boundary = !(b as char).is_alphanumeric() && b != b'_' && b != b'@';
    }
    after_header
}

fn parse_parameters(section: &str) -> Vec<Parameter> {
    PARAM_DECL
        .captures_iter(section)
        .enumerate()
        .map(|(ordinal, caps)| {
            let name = format!("@{}", &caps[1]);
            let declared_type = caps[2].trim().trim_end_matches(',').to_string();
            let default = caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .filter(|v| !v.is_empty());
            let direction = if caps.get(4).is_some() {
                Direction::Out
            } else {
                Direction::In
            };
            Parameter {
                name,
                declared_type,
                direction,
                roles: Vec::new(),
                ordinal,
                default,
            }
        })
        .collect()
}

fn header_comments(source: &str) -> Vec<String> {
    let mut end = HEADER_SCAN_BYTES.min(source.len());
    while !source.is_char_boundary(end) {
        end -= 1;
    }
    let head = &source[..end];

    HEADER_COMMENT
        .captures_iter(head)
        .filter_map(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str().trim().to_string())
        })
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn extracts_name_and_parameters() {
        let sql = indoc! {"
            CREATE PROCEDURE GetOrdersByCustomerId
                @CustomerID INT,
                @Status VARCHAR(20) = 'OPEN'
            AS
            BEGIN
                SELECT OrderID FROM Orders WHERE CustomerID = @CustomerID;
            END
        "};
        let meta = extract_metadata(sql);
        assert_eq!(meta.procedure_name, "GetOrdersByCustomerId");
        assert_eq!(meta.parameters.len(), 2);
        assert_eq!(meta.parameters[0].name, "@CustomerID");
        assert_eq!(meta.parameters[0].declared_type, "INT");
        assert_eq!(meta.parameters[0].direction, Direction::In);
        assert_eq!(meta.parameters[0].ordinal, 0);
        assert_eq!(meta.parameters[0].default, None);
        assert_eq!(meta.parameters[1].declared_type, "VARCHAR(20)");
        assert_eq!(meta.parameters[1].default.as_deref(), Some("'OPEN'"));
    }

    #[test]
    fn output_parameter_direction() {
        let sql = "CREATE PROC UpdateTotals @OrderID INT, @NewTotal MONEY OUTPUT AS SELECT 1";
        let meta = extract_metadata(sql);
        assert_eq!(meta.procedure_name, "UpdateTotals");
        assert_eq!(meta.parameters[1].direction, Direction::Out);
        assert_eq!(meta.parameters[1].declared_type, "MONEY");
    }

    #[test]
    fn bracketed_schema_qualified_name() {
        let sql = "CREATE PROCEDURE [dbo].[GetCustomer] @ID INT AS SELECT 1";
        let meta = extract_metadata(sql);
        assert_eq!(meta.procedure_name, "dbo.GetCustomer");
        assert_eq!(meta.parameters.len(), 1);
    }

    #[test]
    fn header_comments_collected() {
        let sql = indoc! {"
            -- Fetches open orders for a customer.
            /* Owner: billing team */
            CREATE PROCEDURE GetOpenOrders @CustomerID INT
            AS
            SELECT OrderID FROM Orders WHERE CustomerID = @CustomerID
        "};
        let meta = extract_metadata(sql);
        assert_eq!(
            meta.header_comments,
            vec![
                "Fetches open orders for a customer.".to_string(),
                "Owner: billing team".to_string(),
            ]
        );
    }

    #[test]
    fn missing_header_yields_empty_metadata() {
        let meta = extract_metadata("SELECT 1 FROM Orders");
        assert_eq!(meta.procedure_name, "");
        assert!(meta.parameters.is_empty());
    }

    #[test]
    fn parameters_without_header_are_ignored() {
        let meta = extract_metadata("SET @x = 1");
        assert!(meta.parameters.is_empty());
    }
}
