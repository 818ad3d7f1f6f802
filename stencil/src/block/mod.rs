pub mod levels;
pub mod slot;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use crate::expression::Expression;
use crate::position::Position;

pub use slot::SlotId;

/// How a slot with no contributors is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Zero contributors is an error.
    Required,
    /// Zero contributors is expected and renders nothing.
    Omitted,
    /// Zero contributors renders nothing.
    Optional,
}

impl FromStr for Requirement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "required" => Ok(Requirement::Required),
            "omitted" => Ok(Requirement::Omitted),
            "optional" => Ok(Requirement::Optional),
            other => Err(format!(
                "unknown slot requirement '{}' (expected required, optional or omitted)",
                other
            )),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Requirement::Required => "REQUIRED",
            Requirement::Omitted => "OMITTED",
            Requirement::Optional => "OPTIONAL",
        };
        f.write_str(s)
    }
}

/// A slot directive's target and policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub target: SlotId,
    pub requirement: Requirement,
}

/// The closed set of directive kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// Erase the region.
    Skip,
    /// Insertion point accepting at most one contributor.
    NamedSlot(Slot),
    /// Insertion point accepting any number of contributors.
    RepeatingSlot(Slot),
    /// Expression substitution. Non-embedded strings are rendered quoted.
    InlineValue { expression: Expression, embedded: bool },
    /// Body copied through verbatim.
    Unsafe,
    /// Structural wrapper around `If`/`Else` branches.
    Conditional,
    If(Expression),
    Else,
    /// Repeat the body once per item. Without a variable the item is bound
    /// to `this` and map items are destructured.
    ForEach {
        expression: Expression,
        variable: Option<String>,
    },
    /// Subject of a `WhenClause` dispatch.
    When(Expression),
    /// Branch taken when the parent subject equals one of these values.
    WhenClause(Vec<Expression>),
}

/// A positioned directive in a template.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub position: Position,
}

impl Block {
    pub fn new(kind: BlockKind, position: Position) -> Self {
        Block { kind, position }
    }

    pub fn contains(&self, other: &Block) -> bool {
        self.position.contains(&other.position)
    }

    pub fn outer_contents<'t>(&self, text: &'t str) -> &'t str {
        self.position.outer_contents(text)
    }

    pub fn body_contents<'t>(&self, text: &'t str) -> &'t str {
        self.position.body_contents(text)
    }

    /// Short kind name used in diagnostics and block dumps.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            BlockKind::Skip => "skip",
            BlockKind::NamedSlot(_) => "slot",
            BlockKind::RepeatingSlot(_) => "slots",
            BlockKind::InlineValue { .. } => "value",
            BlockKind::Unsafe => "unsafe",
            BlockKind::Conditional => "conditional",
            BlockKind::If(_) => "if",
            BlockKind::Else => "else",
            BlockKind::ForEach { .. } => "for",
            BlockKind::When(_) => "when",
            BlockKind::WhenClause(_) => "is",
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let p = &self.position;
        write!(
            f,
            "{} {:?} outer={:?} body={:?} level={}",
            self.kind_name(),
            p.range,
            p.outer,
            p.body,
            p.level
        )?;
        match &self.kind {
            BlockKind::NamedSlot(slot) | BlockKind::RepeatingSlot(slot) => {
                write!(f, " {} {}", slot.target, slot.requirement)
            }
            BlockKind::InlineValue {
                expression,
                embedded,
            } => write!(f, " `{}` embedded={}", expression, embedded),
            BlockKind::If(expr) | BlockKind::When(expr) => write!(f, " `{}`", expr),
            BlockKind::ForEach {
                expression,
                variable,
            } => match variable {
                Some(name) => write!(f, " {} in `{}`", name, expression),
                None => write!(f, " `{}`", expression),
            },
            BlockKind::WhenClause(values) => {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, " `{}`", values.join(", "))
            }
            BlockKind::Skip | BlockKind::Unsafe | BlockKind::Conditional | BlockKind::Else => {
                Ok(())
            }
        }
    }
}
