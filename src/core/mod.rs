use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Index into the flat block arena. Blocks never own each other; all
/// parent/child links go through ids so the tree serializes flat and
/// compares structurally across runs.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(transparent)]
pub struct BlockId(pub usize);

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block_{}", self.0)
    }
}

/// Inclusive source line range, 0-based.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    pub start_line: usize,
    pub end_line: usize,
}

impl Span {
    pub fn new(start_line: usize, end_line: usize) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    pub fn contains_line(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn len(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlKind {
    If,
    Else,
    While,
    BeginEnd,
    Try,
    Catch,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Statement,
    Control(ControlKind),
    Batch,
}

impl BlockKind {
    pub fn is_leaf(&self) -> bool {
        matches!(self, BlockKind::Statement)
    }
}

/// A node in the parsed control/statement tree of a procedure.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LogicalBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    pub span: Span,
    pub parent: Option<BlockId>,
    pub children: Vec<BlockId>,
    pub text: String,
}

/// Read/write access to a table, OR-combined across blocks.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    Read,
    Write,
    ReadWrite,
}

impl AccessMode {
    pub fn union(self, other: AccessMode) -> AccessMode {
        use AccessMode::*;
        match (self, other) {
            (Read, Read) => Read,
            (Write, Write) => Write,
            _ => ReadWrite,
        }
    }

    pub fn reads(&self) -> bool {
        matches!(self, AccessMode::Read | AccessMode::ReadWrite)
    }

    pub fn writes(&self) -> bool {
        matches!(self, AccessMode::Write | AccessMode::ReadWrite)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub columns: BTreeSet<String>,
    pub access: AccessMode,
    pub blocks: Vec<BlockId>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
    Local,
}

/// How a parameter or variable participates in a statement. A single
/// parameter may accumulate several roles over the procedure body.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageRole {
    FilterCondition,
    OutputBinding,
    ControlBranch,
    AssignmentSource,
    AssignmentTarget,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    pub declared_type: String,
    pub direction: Direction,
    /// Multiset: one entry per usage site, in document order.
    pub roles: Vec<UsageRole>,
    pub ordinal: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Parameter {
    pub fn is_unused(&self) -> bool {
        self.roles.is_empty()
    }
}

/// A table, temp object, or variable participating in a read/write.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase", tag = "kind", content = "name")]
pub enum Entity {
    Table(String),
    TempTable(String),
    Variable(String),
}

impl Entity {
    pub fn name(&self) -> &str {
        match self {
            Entity::Table(n) | Entity::TempTable(n) | Entity::Variable(n) => n,
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Entity::Table(_))
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationKind {
    Select,
    Insert,
    Update,
    Delete,
    Join,
    Filter,
    Aggregate,
}

/// A recorded movement of data from a read-set to a write-set within one
/// block. `order` is the execution order index; boundary synthesis treats
/// it as a dependency order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DataFlowEdge {
    pub sources: Vec<Entity>,
    pub targets: Vec<Entity>,
    pub operation: OperationKind,
    pub block: BlockId,
    pub order: usize,
}

/// Contiguous edges sharing a target entity, operations kept in execution
/// order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlowRecord {
    pub target: Entity,
    pub sources: Vec<Entity>,
    pub operations: Vec<OperationKind>,
    pub blocks: Vec<BlockId>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusinessRule {
    pub condition: String,
    pub consequence: String,
    pub blocks: Vec<BlockId>,
    pub confidence: f64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryPatternKind {
    Pagination,
    ExistenceCheck,
    SoftDeleteFilter,
    Upsert,
    BulkOperation,
    AuditTrail,
}

impl std::fmt::Display for QueryPatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        static DISPLAY_STRINGS: &[(QueryPatternKind, &str)] = &[
            (QueryPatternKind::Pagination, "PAGINATION"),
            (QueryPatternKind::ExistenceCheck, "EXISTENCE_CHECK"),
            (QueryPatternKind::SoftDeleteFilter, "SOFT_DELETE_FILTER"),
            (QueryPatternKind::Upsert, "UPSERT"),
            (QueryPatternKind::BulkOperation, "BULK_OPERATION"),
            (QueryPatternKind::AuditTrail, "AUDIT_TRAIL"),
        ];

        let display_str = DISPLAY_STRINGS
            .iter()
            .find(|(k, _)| k == self)
            .map(|(_, s)| *s)
            .unwrap_or("UNKNOWN");

        write!(f, "{display_str}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryPattern {
    pub kind: QueryPatternKind,
    pub blocks: Vec<BlockId>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReturnShape {
    Scalar,
    Entity,
    EntityList,
    None,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryParameter {
    pub name: String,
    pub declared_type: String,
    pub roles: Vec<UsageRole>,
}

/// A suggested application-level method boundary derived from a connected
/// cluster of data-flow activity.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryBoundary {
    pub name: String,
    pub blocks: Vec<BlockId>,
    pub parameters: Vec<BoundaryParameter>,
    pub returns: ReturnShape,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplexityKind {
    DynamicSql,
    Cursor,
    NestedTransaction,
    RecursiveCte,
    CrossDatabaseRef,
    UnusedParameter,
}

impl std::fmt::Display for ComplexityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        static DISPLAY_STRINGS: &[(ComplexityKind, &str)] = &[
            (ComplexityKind::DynamicSql, "DYNAMIC_SQL"),
            (ComplexityKind::Cursor, "CURSOR"),
            (ComplexityKind::NestedTransaction, "NESTED_TRANSACTION"),
            (ComplexityKind::RecursiveCte, "RECURSIVE_CTE"),
            (ComplexityKind::CrossDatabaseRef, "CROSS_DATABASE_REF"),
            (ComplexityKind::UnusedParameter, "UNUSED_PARAMETER"),
        ];

        let display_str = DISPLAY_STRINGS
            .iter()
            .find(|(k, _)| k == self)
            .map(|(_, s)| *s)
            .unwrap_or("UNKNOWN");

        write!(f, "{display_str}")
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        };
        write!(f, "{s}")
    }
}

/// A flagged construct expected to resist direct translation to
/// application code.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityFinding {
    pub kind: ComplexityKind,
    pub severity: Severity,
    pub blocks: Vec<BlockId>,
    pub alternatives: Vec<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurposeTag {
    CrudRead,
    CrudWrite,
    Validation,
    ControlFlow,
    SideEffect,
    TempStorage,
    Other,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatementPurpose {
    pub block: BlockId,
    pub tag: PurposeTag,
}

/// Recovered structural malformation: unbalanced nesting, unterminated
/// literals. Analysis continues on the recovered tree.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StructuralWarning {
    pub message: String,
    pub line: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedValue {
    pub value: String,
    pub purpose: String,
    pub scenario: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TestValueCandidate {
    pub parameter: String,
    pub declared_type: String,
    pub values: Vec<SuggestedValue>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureMetadata {
    pub procedure_name: String,
    pub parameters: Vec<Parameter>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub header_comments: Vec<String>,
}
