//! Structural parser: builds the immutable block tree from the token
//! stream.
//!
//! Blocks live in a flat arena addressed by `BlockId`; parent/child links
//! are indices, which keeps the tree acyclic by construction and makes
//! serialization and cross-run equality checks trivial. On unbalanced
//! nesting the parser closes all still-open blocks at end-of-input and
//! records a structural warning — partial structure beats no output.

use crate::core::{BlockId, BlockKind, ControlKind, LogicalBlock, Span, StructuralWarning};
use crate::lexer::{SqlToken, TokenKind, TokenStream};

/// Flat, id-indexed block table. Immutable after parsing completes.
#[derive(Clone, Debug, Default)]
pub struct BlockArena {
    blocks: Vec<LogicalBlock>,
}

impl BlockArena {
    pub fn get(&self, id: BlockId) -> Option<&LogicalBlock> {
        self.blocks.get(id.0)
    }

    pub fn contains(&self, id: BlockId) -> bool {
        id.0 < self.blocks.len()
    }

    pub fn root(&self) -> &LogicalBlock {
        &self.blocks[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogicalBlock> {
        self.blocks.iter()
    }

    pub fn leaves(&self) -> impl Iterator<Item = &LogicalBlock> {
        self.blocks.iter().filter(|b| b.kind.is_leaf())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn into_blocks(self) -> Vec<LogicalBlock> {
        self.blocks
    }

    pub fn blocks(&self) -> &[LogicalBlock] {
        &self.blocks
    }

    /// Innermost block whose span contains the line.
    pub fn block_at_line(&self, line: usize) -> Option<BlockId> {
        self.blocks
            .iter()
            .filter(|b| b.span.contains_line(line))
            .min_by_key(|b| b.span.len())
            .map(|b| b.id)
    }
}

#[derive(Clone, Debug)]
pub struct ParseOutcome {
    pub arena: BlockArena,
    pub warnings: Vec<StructuralWarning>,
}

/// Statement-head keywords that open a new leaf statement.
static STATEMENT_STARTERS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "MERGE", "DECLARE", "SET", "EXEC", "EXECUTE", "PRINT",
    "RETURN", "THROW", "RAISERROR", "CREATE", "ALTER", "DROP", "COMMIT", "ROLLBACK", "OPEN",
    "CLOSE", "DEALLOCATE", "FETCH", "WITH",
];

fn is_statement_starter(tok: &SqlToken) -> bool {
    tok.kind == TokenKind::Keyword
        && STATEMENT_STARTERS
            .iter()
            .any(|kw| tok.text.eq_ignore_ascii_case(kw))
}

struct OpenBlock {
    id: BlockId,
    /// IF/ELSE/WHILE close as soon as their single body child completes.
    close_after_child: bool,
}

struct Parser<'a> {
    tokens: &'a [SqlToken],
    lines: Vec<&'a str>,
    pos: usize,
    blocks: Vec<LogicalBlock>,
    stack: Vec<OpenBlock>,
    warnings: Vec<StructuralWarning>,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [SqlToken], source: &'a str) -> Self {
        Self {
            tokens,
            lines: source.lines().collect(),
            pos: 0,
            blocks: Vec::new(),
            stack: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn last_line(&self) -> usize {
        self.lines.len().saturating_sub(1)
    }

    fn current_parent(&self) -> Option<BlockId> {
        self.stack.last().map(|o| o.id)
    }

    fn open_block(&mut self, kind: BlockKind, start_line: usize, close_after_child: bool) {
        let id = self.new_block(kind, start_line);
        self.stack.push(OpenBlock {
            id,
            close_after_child,
        });
    }

    fn new_block(&mut self, kind: BlockKind, start_line: usize) -> BlockId {
        let id = BlockId(self.blocks.len());
        let parent = self.current_parent();
        if let Some(pid) = parent {
            self.blocks[pid.0].children.push(id);
        }
        self.blocks.push(LogicalBlock {
            id,
            kind,
            span: Span::new(start_line, start_line),
            parent,
            children: Vec::new(),
            text: String::new(),
        });
        id
    }

    fn seal_block(&mut self, id: BlockId, end_line: usize) {
        let start = self.blocks[id.0].span.start_line;
        let end = end_line.max(start);
        let text = if self.lines.is_empty() {
            String::new()
        } else {
            let clamped = end.min(self.lines.len() - 1);
            self.lines[start.min(clamped)..=clamped].join("\n")
        };
        let block = &mut self.blocks[id.0];
        block.span.end_line = end;
        block.text = text;
    }

    /// Pop the top open block, then cascade: IF/ELSE/WHILE parents close
    /// as soon as their body child does.
    fn close_top(&mut self, end_line: usize) {
        if let Some(open) = self.stack.pop() {
            self.seal_block(open.id, end_line);
        }
        while self
            .stack
            .last()
            .is_some_and(|o| o.close_after_child && o.id.0 != 0)
        {
            if let Some(open) = self.stack.pop() {
                self.seal_block(open.id, end_line);
            }
        }
    }

    /// Close the nearest open block of `kind`, warning about anything that
    /// has to be force-closed on the way.
    fn close_nearest(&mut self, kind: ControlKind, end_line: usize, line: usize) {
        let found = self
            .stack
            .iter()
            .rposition(|o| self.blocks[o.id.0].kind == BlockKind::Control(kind));
        match found {
            Some(idx) => {
                while self.stack.len() > idx + 1 {
                    if let Some(open) = self.stack.pop() {
                        self.seal_block(open.id, end_line);
                        self.warnings.push(StructuralWarning {
                            message: format!("{} closed implicitly by enclosing END", open.id),
                            line,
                        });
                    }
                }
                self.close_top(end_line);
            }
            None => self.warnings.push(StructuralWarning {
                message: "END without matching BEGIN ignored".into(),
                line,
            }),
        }
    }

    fn peek_keyword(&self, offset: usize) -> Option<&'a SqlToken> {
        self.tokens[self.pos + offset..]
            .iter()
            .find(|t| t.kind != TokenKind::Comment)
    }

    fn parse(mut self) -> ParseOutcome {
        let root = self.new_block(BlockKind::Batch, 0);
        self.stack.push(OpenBlock {
            id: root,
            close_after_child: false,
        });

        while self.pos < self.tokens.len() {
            let tok = &self.tokens[self.pos];
            match tok.kind {
                TokenKind::Comment | TokenKind::Terminator => {
                    self.pos += 1;
                }
                TokenKind::Keyword if tok.is_keyword("GO") => {
                    // Batch separator: force everything open back to root.
                    let line = tok.line;
                    while self.stack.len() > 1 {
                        if let Some(open) = self.stack.pop() {
                            self.seal_block(open.id, line.saturating_sub(1));
                            self.warnings.push(StructuralWarning {
                                message: "block left open at batch separator".into(),
                                line,
                            });
                        }
                    }
                    self.pos += 1;
                }
                TokenKind::Keyword if tok.is_keyword("BEGIN") => self.handle_begin(),
                TokenKind::Keyword if tok.is_keyword("END") => self.handle_end(),
                TokenKind::Keyword if tok.is_keyword("IF") => {
                    let line = tok.line;
                    self.open_block(BlockKind::Control(ControlKind::If), line, true);
                    self.pos += 1;
                    self.skip_condition();
                }
                TokenKind::Keyword if tok.is_keyword("WHILE") => {
                    let line = tok.line;
                    self.open_block(BlockKind::Control(ControlKind::While), line, true);
                    self.pos += 1;
                    self.skip_condition();
                }
                TokenKind::Keyword if tok.is_keyword("ELSE") => {
                    let line = tok.line;
                    self.open_block(BlockKind::Control(ControlKind::Else), line, true);
                    self.pos += 1;
                }
                _ => self.parse_statement(),
            }
        }

        // Recover from unbalanced nesting: close whatever is still open.
        let end = self.last_line();
        let unbalanced = self.stack.len().saturating_sub(1);
        if unbalanced > 0 {
            let line = end;
            self.warnings.push(StructuralWarning {
                message: format!(
                    "unbalanced nesting: {unbalanced} block(s) closed at end of input"
                ),
                line,
            });
        }
        while let Some(open) = self.stack.pop() {
            self.seal_block(open.id, end);
        }

        ParseOutcome {
            arena: BlockArena {
                blocks: self.blocks,
            },
            warnings: self.warnings,
        }
    }

    fn handle_begin(&mut self) {
        let line = self.tokens[self.pos].line;
        match self.peek_keyword(1) {
            Some(next) if next.is_keyword("TRY") => {
                self.open_block(BlockKind::Control(ControlKind::Try), line, false);
                self.pos += 2;
            }
            Some(next) if next.is_keyword("CATCH") => {
                self.open_block(BlockKind::Control(ControlKind::Catch), line, false);
                self.pos += 2;
            }
            Some(next) if next.is_keyword("TRANSACTION") || next.is_keyword("TRAN") => {
                // BEGIN TRANSACTION is a statement, not a nesting block.
                self.parse_statement();
            }
            _ => {
                self.open_block(BlockKind::Control(ControlKind::BeginEnd), line, false);
                self.pos += 1;
            }
        }
    }

    fn handle_end(&mut self) {
        let line = self.tokens[self.pos].line;
        match self.peek_keyword(1) {
            Some(next) if next.is_keyword("TRY") => {
                self.close_nearest(ControlKind::Try, line, line);
                self.pos += 2;
            }
            Some(next) if next.is_keyword("CATCH") => {
                self.close_nearest(ControlKind::Catch, line, line);
                self.pos += 2;
            }
            _ => {
                self.close_nearest(ControlKind::BeginEnd, line, line);
                self.pos += 1;
            }
        }
    }

    /// Advance past an IF/WHILE condition without consuming the body. The
    /// condition ends at a BEGIN or the first statement-head keyword at
    /// paren depth zero (a single-statement body).
    fn skip_condition(&mut self) {
        let mut depth: i32 = 0;
        while self.pos < self.tokens.len() {
            let tok = &self.tokens[self.pos];
            match tok.kind {
                TokenKind::Punct if tok.text == "(" => depth += 1,
                TokenKind::Punct if tok.text == ")" => depth -= 1,
                TokenKind::Keyword if depth == 0 && tok.is_keyword("BEGIN") => return,
                TokenKind::Keyword if depth == 0 && is_statement_starter(tok) => return,
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Consume one leaf statement and record it as a Statement block.
    fn parse_statement(&mut self) {
        let start = self.pos;
        let start_line = self.tokens[self.pos].line;
        let mut end_line = start_line;
        let mut paren_depth: i32 = 0;
        let mut case_depth: usize = 0;
        let head = self.tokens[start].text.to_uppercase();
        let mut saw_cursor = false;

        while self.pos < self.tokens.len() {
            let tok = &self.tokens[self.pos];
            match tok.kind {
                TokenKind::Terminator => {
                    end_line = tok.line;
                    self.pos += 1;
                    break;
                }
                TokenKind::Punct if tok.text == "(" => paren_depth += 1,
                TokenKind::Punct if tok.text == ")" => paren_depth -= 1,
                TokenKind::Keyword if tok.is_keyword("CURSOR") => saw_cursor = true,
                TokenKind::Keyword if tok.is_keyword("CASE") => case_depth += 1,
                TokenKind::Keyword if tok.is_keyword("END") => {
                    if case_depth > 0 {
                        case_depth -= 1;
                    } else if paren_depth <= 0 {
                        break;
                    }
                }
                TokenKind::Keyword
                    if self.pos > start
                        && paren_depth <= 0
                        && case_depth == 0
                        && (tok.is_keyword("BEGIN")
                            || tok.is_keyword("IF")
                            || tok.is_keyword("WHILE")
                            || tok.is_keyword("ELSE")
                            || tok.is_keyword("GO")) =>
                {
                    break;
                }
                TokenKind::Keyword
                    if self.pos > start
                        && paren_depth <= 0
                        && case_depth == 0
                        && is_statement_starter(tok)
                        && self.splits_statement(&head, start, saw_cursor) =>
                {
                    break;
                }
                _ => {}
            }
            end_line = tok.line;
            self.pos += 1;
        }

        let id = self.new_block(BlockKind::Statement, start_line);
        self.seal_block(id, end_line);
        self.adjust_statement_text(id, start, start_line);
        // A single-statement IF/ELSE/WHILE body closes its parent.
        while self
            .stack
            .last()
            .is_some_and(|o| o.close_after_child && o.id.0 != 0)
        {
            if let Some(open) = self.stack.pop() {
                self.seal_block(open.id, end_line);
            }
        }
    }

    /// Whether a statement-starter keyword at the current position begins a
    /// new statement rather than continuing this one.
    fn splits_statement(&self, head: &str, start: usize, saw_cursor: bool) -> bool {
        let tok = &self.tokens[self.pos];
        let text = tok.text.to_uppercase();
        let prev = self.tokens[start..self.pos]
            .iter()
            .rev()
            .find(|t| t.kind != TokenKind::Comment);

        // INSERT ... SELECT, UNION SELECT, IN (SELECT ...) continue.
        if text == "SELECT" {
            if head == "INSERT" || head == "WITH" || (head == "DECLARE" && saw_cursor) {
                return false;
            }
            if let Some(p) = prev {
                if p.is_keyword("UNION") || p.is_keyword("ALL") || p.text == "(" {
                    return false;
                }
            }
        }
        // UPDATE ... SET and MERGE ... WHEN MATCHED THEN UPDATE/DELETE.
        if (text == "SET" || text == "UPDATE" || text == "DELETE" || text == "INSERT")
            && (head == "UPDATE" || head == "MERGE")
        {
            return false;
        }
        // OFFSET n ROWS FETCH NEXT ... continues a SELECT.
        if text == "FETCH" && head == "SELECT" {
            return false;
        }
        true
    }

    /// Statement spans are line-resolution; trim the text so a statement
    /// sharing its first line with an enclosing construct (e.g. a
    /// single-line `IF @x IS NULL RETURN`) does not duplicate the header.
    fn adjust_statement_text(&mut self, id: BlockId, start_token: usize, start_line: usize) {
        let token_head: &str = self.tokens[start_token].text.as_str();
        let Some(first_line) = self.lines.get(start_line).copied() else {
            return;
        };
        let Some(col) = first_line.find(token_head) else {
            return;
        };
        let block = &mut self.blocks[id.0];
        if col > 0 && block.span.start_line == start_line && !block.text.is_empty() {
            let new_text = {
                let mut rebuilt: Vec<&str> = block.text.lines().collect();
                if let Some(first) = rebuilt.first_mut() {
                    *first = &first_line[col..];
                }
                rebuilt.join("\n")
            };
            block.text = new_text;
        }
    }
}

/// Parse a token stream into the block tree. Determinism: identical input
/// yields identical ids and ordering, because ids are assigned in the
/// order blocks open.
pub fn parse_blocks(stream: &TokenStream, source: &str) -> ParseOutcome {
    let mut outcome = Parser::new(&stream.tokens, source).parse();
    // Lexer-level recoveries (unterminated literals) surface alongside
    // structural ones.
    let mut warnings = stream.warnings.clone();
    warnings.append(&mut outcome.warnings);
    outcome.warnings = warnings;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use indoc::indoc;

    fn parse(sql: &str) -> ParseOutcome {
        parse_blocks(&tokenize(sql), sql)
    }

    #[test]
    fn single_select_yields_root_and_statement() {
        let out = parse("SELECT OrderID FROM Orders WHERE CustomerID = @CustomerID");
        assert!(out.warnings.is_empty());
        assert_eq!(out.arena.len(), 2);
        assert_eq!(out.arena.root().kind, BlockKind::Batch);
        let stmt = out.arena.get(BlockId(1)).unwrap();
        assert_eq!(stmt.kind, BlockKind::Statement);
        assert_eq!(stmt.parent, Some(BlockId(0)));
    }

    #[test]
    fn if_with_begin_end_nests() {
        let sql = indoc! {"
            IF @Total > 100
            BEGIN
                UPDATE Orders SET Discount = 10 WHERE OrderID = @OrderID;
            END
        "};
        let out = parse(sql);
        assert!(out.warnings.is_empty());
        let kinds: Vec<_> = out.arena.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Batch,
                BlockKind::Control(ControlKind::If),
                BlockKind::Control(ControlKind::BeginEnd),
                BlockKind::Statement,
            ]
        );
        // statement -> begin/end -> if -> root
        let stmt = out.arena.get(BlockId(3)).unwrap();
        assert_eq!(stmt.parent, Some(BlockId(2)));
        assert_eq!(out.arena.get(BlockId(2)).unwrap().parent, Some(BlockId(1)));
        assert_eq!(out.arena.get(BlockId(1)).unwrap().parent, Some(BlockId(0)));
    }

    #[test]
    fn single_statement_if_closes_after_body() {
        let sql = indoc! {"
            IF @CustomerID IS NULL RETURN;
            SELECT OrderID FROM Orders WHERE CustomerID = @CustomerID;
        "};
        let out = parse(sql);
        let if_block = out
            .arena
            .iter()
            .find(|b| b.kind == BlockKind::Control(ControlKind::If))
            .unwrap();
        assert_eq!(if_block.span.end_line, 0);
        // The trailing SELECT parents to the root, not the IF.
        let select = out
            .arena
            .iter()
            .find(|b| b.text.starts_with("SELECT"))
            .unwrap();
        assert_eq!(select.parent, Some(BlockId(0)));
    }

    #[test]
    fn try_catch_blocks() {
        let sql = indoc! {"
            BEGIN TRY
                INSERT INTO AuditLog (Action) VALUES ('x');
            END TRY
            BEGIN CATCH
                ROLLBACK TRANSACTION;
            END CATCH
        "};
        let out = parse(sql);
        assert!(out.warnings.is_empty());
        assert!(out
            .arena
            .iter()
            .any(|b| b.kind == BlockKind::Control(ControlKind::Try)));
        assert!(out
            .arena
            .iter()
            .any(|b| b.kind == BlockKind::Control(ControlKind::Catch)));
    }

    #[test]
    fn unterminated_begin_recovers_with_warning() {
        let sql = indoc! {"
            BEGIN
                SELECT 1 FROM Orders
        "};
        let out = parse(sql);
        assert!(out
            .warnings
            .iter()
            .any(|w| w.message.contains("unbalanced nesting")));
        // Everything still sealed.
        for block in out.arena.iter() {
            assert!(block.span.end_line >= block.span.start_line);
        }
    }

    #[test]
    fn forest_is_single_rooted() {
        let sql = indoc! {"
            IF @a = 1
            BEGIN
                SELECT 1 FROM T1;
            END
            ELSE
            BEGIN
                SELECT 2 FROM T2;
            END
        "};
        let out = parse(sql);
        let roots: Vec<_> = out.arena.iter().filter(|b| b.parent.is_none()).collect();
        assert_eq!(roots.len(), 1);
        for block in out.arena.iter().skip(1) {
            let parent = block.parent.expect("non-root must have a parent");
            assert!(out.arena.contains(parent));
            assert!(out.arena.get(parent).unwrap().children.contains(&block.id));
        }
    }

    #[test]
    fn determinism_identical_input_identical_ids() {
        let sql = indoc! {"
            IF @x > 0
            BEGIN
                UPDATE T SET a = 1;
                INSERT INTO L (m) VALUES ('u');
            END
        "};
        let a = parse(sql);
        let b = parse(sql);
        assert_eq!(a.arena.blocks(), b.arena.blocks());
    }

    #[test]
    fn case_end_does_not_close_blocks() {
        let sql = indoc! {"
            BEGIN
                SELECT CASE WHEN a = 1 THEN 'x' ELSE 'y' END AS label FROM T;
            END
        "};
        let out = parse(sql);
        assert!(out.warnings.is_empty());
        assert!(out
            .arena
            .iter()
            .any(|b| b.kind == BlockKind::Control(ControlKind::BeginEnd)));
    }

    #[test]
    fn block_at_line_prefers_innermost() {
        let sql = indoc! {"
            IF @x > 0
            BEGIN
                SELECT 1 FROM T;
            END
        "};
        let out = parse(sql);
        let id = out.arena.block_at_line(2).unwrap();
        assert_eq!(out.arena.get(id).unwrap().kind, BlockKind::Statement);
    }
}
