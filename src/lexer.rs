//! SQL token stream.
//!
//! The analysis pipeline consumes tokens, never raw characters. This is a
//! deliberately small line-aware lexer for the single T-SQL-shaped grammar
//! the tool supports; unterminated literals are recovered at end-of-input
//! and reported as structural warnings rather than errors.

use crate::core::StructuralWarning;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Ident,
    /// `@name` parameter or local variable.
    Variable,
    /// `#name` local temp table.
    TempName,
    Number,
    StringLit,
    Comment,
    Punct,
    /// `;`
    Terminator,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqlToken {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl SqlToken {
    pub fn is_keyword(&self, kw: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text.eq_ignore_ascii_case(kw)
    }
}

#[derive(Clone, Debug, Default)]
pub struct TokenStream {
    pub tokens: Vec<SqlToken>,
    pub warnings: Vec<StructuralWarning>,
}

static KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "FROM", "INTO", "WHERE", "SET", "VALUES",
    "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "OUTER", "ON", "GROUP", "ORDER", "BY",
    "HAVING", "TOP", "LIMIT", "OFFSET", "FETCH", "DISTINCT", "UNION", "ALL", "AS", "AND", "OR",
    "NOT", "NULL", "IS", "IN", "LIKE", "BETWEEN", "EXISTS", "CASE", "WHEN", "THEN", "ELSE", "END",
    "IF", "WHILE", "BEGIN", "TRY", "CATCH", "GO", "DECLARE", "CREATE", "ALTER", "DROP", "TABLE",
    "PROCEDURE", "PROC", "RETURN", "RETURNS", "OUTPUT", "EXEC", "EXECUTE", "PRINT", "THROW",
    "RAISERROR", "TRANSACTION", "TRAN", "COMMIT", "ROLLBACK", "CURSOR", "OPEN", "CLOSE",
    "DEALLOCATE", "WITH", "COUNT", "SUM", "AVG", "MIN", "MAX", "USING", "MATCHED",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|kw| word.eq_ignore_ascii_case(kw))
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '['
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.' || c == '[' || c == ']'
}

/// Tokenize procedure source. Never fails: malformed input degrades to
/// warnings so downstream passes can analyze the recovered stream.
pub fn tokenize(source: &str) -> TokenStream {
    let mut out = TokenStream::default();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut line = 0;

    while i < chars.len() {
        let c = chars[i];

        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '-' if chars.get(i + 1) == Some(&'-') => {
                let start = i;
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                out.tokens.push(SqlToken {
                    kind: TokenKind::Comment,
                    text: chars[start..i].iter().collect(),
                    line,
                });
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let start = i;
                let start_line = line;
                i += 2;
                loop {
                    if i >= chars.len() {
                        out.warnings.push(StructuralWarning {
                            message: "unterminated block comment closed at end of input".into(),
                            line: start_line,
                        });
                        break;
                    }
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                out.tokens.push(SqlToken {
                    kind: TokenKind::Comment,
                    text: chars[start..i.min(chars.len())].iter().collect(),
                    line: start_line,
                });
            }
            '\'' => {
                let start = i;
                let start_line = line;
                i += 1;
                let mut terminated = false;
                while i < chars.len() {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    if chars[i] == '\'' {
                        // '' escapes a quote inside the literal
                        if chars.get(i + 1) == Some(&'\'') {
                            i += 2;
                            continue;
                        }
                        i += 1;
                        terminated = true;
                        break;
                    }
                    i += 1;
                }
                if !terminated {
                    out.warnings.push(StructuralWarning {
                        message: "unterminated string literal closed at end of input".into(),
                        line: start_line,
                    });
                }
                out.tokens.push(SqlToken {
                    kind: TokenKind::StringLit,
                    text: chars[start..i.min(chars.len())].iter().collect(),
                    line: start_line,
                });
            }
            '@' | '#' => {
                let start = i;
                i += 1;
                // `##global` temp tables keep both hashes
                if c == '#' && chars.get(i) == Some(&'#') {
                    i += 1;
                }
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let kind = if c == '@' {
                    TokenKind::Variable
                } else {
                    TokenKind::TempName
                };
                if text.len() > 1 {
                    out.tokens.push(SqlToken { kind, text, line });
                } else {
                    out.tokens.push(SqlToken {
                        kind: TokenKind::Punct,
                        text,
                        line,
                    });
                }
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                out.tokens.push(SqlToken {
                    kind: TokenKind::Number,
                    text: chars[start..i].iter().collect(),
                    line,
                });
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_continue(chars[i]) {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let kind = if is_keyword(&text) {
                    TokenKind::Keyword
                } else {
                    TokenKind::Ident
                };
                out.tokens.push(SqlToken { kind, text, line });
            }
            ';' => {
                out.tokens.push(SqlToken {
                    kind: TokenKind::Terminator,
                    text: ";".into(),
                    line,
                });
                i += 1;
            }
            _ => {
                out.tokens.push(SqlToken {
                    kind: TokenKind::Punct,
                    text: c.to_string(),
                    line,
                });
                i += 1;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_and_identifiers() {
        let ts = tokenize("SELECT OrderID FROM Orders");
        let kinds: Vec<_> = ts.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword,
                TokenKind::Ident,
                TokenKind::Keyword,
                TokenKind::Ident
            ]
        );
        assert!(ts.warnings.is_empty());
    }

    #[test]
    fn variables_and_temp_names() {
        let ts = tokenize("WHERE CustomerID = @CustomerID AND x IN (SELECT y FROM #staging)");
        assert!(ts
            .tokens
            .iter()
            .any(|t| t.kind == TokenKind::Variable && t.text == "@CustomerID"));
        assert!(ts
            .tokens
            .iter()
            .any(|t| t.kind == TokenKind::TempName && t.text == "#staging"));
    }

    #[test]
    fn line_numbers_track_newlines() {
        let ts = tokenize("SELECT 1\nFROM Orders\nWHERE a = 1");
        let from = ts.tokens.iter().find(|t| t.is_keyword("FROM")).unwrap();
        assert_eq!(from.line, 1);
        let where_tok = ts.tokens.iter().find(|t| t.is_keyword("WHERE")).unwrap();
        assert_eq!(where_tok.line, 2);
    }

    #[test]
    fn unterminated_string_recovers_with_warning() {
        let ts = tokenize("SELECT 'abc");
        assert_eq!(ts.warnings.len(), 1);
        assert!(ts.warnings[0].message.contains("unterminated string"));
        assert!(ts
            .tokens
            .iter()
            .any(|t| t.kind == TokenKind::StringLit));
    }

    #[test]
    fn escaped_quote_stays_inside_literal() {
        let ts = tokenize("SET @s = 'it''s fine'");
        assert!(ts.warnings.is_empty());
        let lit = ts
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::StringLit)
            .unwrap();
        assert_eq!(lit.text, "'it''s fine'");
    }
}
