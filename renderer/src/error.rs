use std::ops::Range;

use thiserror::Error;

use crate::value::ValueKind;

/// Everything that can abort the rendering of one file.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("required slot {slot} has no contributors")]
    MissingSlot { slot: String },

    #[error(
        "slot {slot} accepts a single contributor but got {}: {}",
        .packs.len(),
        .packs.join(", ")
    )]
    TooManySlotTargets { slot: String, packs: Vec<String> },

    #[error("type mismatch: `{operator}` cannot be applied to {left} and {right}")]
    TypeMismatch {
        operator: String,
        left: ValueKind,
        right: ValueKind,
    },

    #[error("arithmetic error: `{operator}` by zero")]
    ArithmeticError { operator: String },

    #[error("null assertion failed: `{expression}` is null")]
    NullAssertion { expression: String },

    #[error("`{name}` expects {expected} argument(s) but got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("unsupported method `{name}` on {receiver}")]
    UnsupportedMethod { name: String, receiver: String },

    #[error("cannot iterate over {kind}")]
    UnexpectedIterableType { kind: ValueKind },

    #[error("`{method}` called on an empty collection")]
    NoSuchElement { method: String },

    #[error("invalid argument to `{method}`: {reason}")]
    InvalidArgument { method: String, reason: String },
}

impl RuntimeError {
    pub fn type_mismatch(operator: impl Into<String>, left: ValueKind, right: ValueKind) -> Self {
        RuntimeError::TypeMismatch {
            operator: operator.into(),
            left,
            right,
        }
    }

    pub fn invalid_argument(method: &str, reason: impl Into<String>) -> Self {
        RuntimeError::InvalidArgument {
            method: method.to_string(),
            reason: reason.into(),
        }
    }
}

/// A runtime error enriched with the span of the block being rendered.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct RenderError {
    pub error: RuntimeError,
    pub span: Option<Range<usize>>,
}

impl RenderError {
    pub fn at(error: RuntimeError, span: Range<usize>) -> Self {
        RenderError {
            error,
            span: Some(span),
        }
    }
}

impl From<RuntimeError> for RenderError {
    fn from(error: RuntimeError) -> Self {
        RenderError { error, span: None }
    }
}
