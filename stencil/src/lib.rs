pub mod block;
pub mod expression;
pub mod parser;
pub mod position;

pub use block::{Block, BlockKind, Requirement, Slot, SlotId};
pub use expression::{BinaryOperator, Expression, PostfixOperator};
pub use position::Position;

/// An analyzed template.
#[derive(Debug, Clone)]
pub struct Template {
    /// The raw template text the block positions point into.
    pub text: String,
    /// Blocks sorted by start offset, with resolved levels.
    pub blocks: Vec<Block>,
    /// The source file ID (for error reporting with codespan-reporting).
    pub source_id: usize,
}
