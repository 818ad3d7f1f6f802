//! The template renderer: a single forward scan over the sorted block list
//! that copies the text between blocks and splices in each block's
//! contribution.

use std::collections::{HashMap, VecDeque};

use stencil::block::tree::BlockTree;
use stencil::{Block, BlockKind, Requirement, Slot, Template};
use tracing::debug;

use crate::error::{RenderError, RuntimeError};
use crate::evaluator::evaluate;
use crate::scope::{Frame, Scope, map_entries};
use crate::slots::SlotLookup;
use crate::text::{indent_following_lines, line_prefix, strip_indent, trim_blank_lines, trim_indent};
use crate::value::{Value, values_equal};

/// Per-render settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Pack whose template is being rendered, passed to slot lookups.
    pub pack_id: String,
    /// Columns removed per indentation level; also the width of a tab.
    pub indent_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            pack_id: "default".to_string(),
            indent_width: 4,
        }
    }
}

/// Render `text` with its analyzed `blocks` using default options.
pub fn render(
    text: &str,
    blocks: &[Block],
    scope: Scope,
    slots: &dyn SlotLookup,
) -> Result<String, RenderError> {
    render_with_options(text, blocks, scope, slots, &RenderOptions::default())
}

pub fn render_with_options(
    text: &str,
    blocks: &[Block],
    scope: Scope,
    slots: &dyn SlotLookup,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    Renderer::new(text, blocks, scope, slots, options).run()
}

pub fn render_template(
    template: &Template,
    scope: Scope,
    slots: &dyn SlotLookup,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    render_with_options(&template.text, &template.blocks, scope, slots, options)
}

/// A container whose body is currently being rendered.
#[derive(Debug, Clone, Copy)]
struct OpenBlock {
    index: usize,
    pushed_frame: bool,
    /// Output length when the block was entered; unchanged on close means
    /// the block produced nothing.
    out_len: usize,
}

/// What a block contributes once its own directive has been evaluated.
enum Outcome {
    /// Drop the block and everything inside it.
    Skip,
    /// The block wrote its contribution directly.
    Leaf { emitted: bool },
    /// Render the body, optionally inside a new scope frame.
    Enter { frame: Option<Frame> },
}

struct Renderer<'a> {
    text: &'a str,
    blocks: &'a [Block],
    tree: BlockTree,
    scope: Scope,
    slots: &'a dyn SlotLookup,
    options: &'a RenderOptions,
    out: String,
    /// Offset of the next template byte not yet copied or consumed.
    start: usize,
    open: Vec<OpenBlock>,
    /// Frames for the remaining iterations of each open loop.
    queues: HashMap<usize, VecDeque<Frame>>,
    /// Whether a branch of a wrapper has already been taken.
    taken: HashMap<usize, bool>,
    subjects: HashMap<usize, Value>,
}

impl<'a> Renderer<'a> {
    fn new(
        text: &'a str,
        blocks: &'a [Block],
        scope: Scope,
        slots: &'a dyn SlotLookup,
        options: &'a RenderOptions,
    ) -> Self {
        Renderer {
            text,
            blocks,
            tree: BlockTree::build(blocks),
            scope,
            slots,
            options,
            out: String::with_capacity(text.len()),
            start: 0,
            open: Vec::new(),
            queues: HashMap::new(),
            taken: HashMap::new(),
            subjects: HashMap::new(),
        }
    }

    fn run(mut self) -> Result<String, RenderError> {
        let blocks = self.blocks;
        let mut i = 0;
        loop {
            if let Some(restart) = self.close_finished(i) {
                i = restart;
                continue;
            }
            let Some(block) = blocks.get(i) else {
                break;
            };
            self.flush(self.start, block.position.outer.start, self.current_level());
            i = self.render_block(i)?;
        }
        self.flush(self.start, self.text.len(), 0);
        Ok(self.out)
    }

    fn current_level(&self) -> usize {
        self.open
            .last()
            .map_or(0, |open| body_level(&self.blocks[open.index]))
    }

    /// Close every open block that does not contain block `next`. Returns the
    /// index to resume from when a loop starts another iteration.
    fn close_finished(&mut self, next: usize) -> Option<usize> {
        let blocks = self.blocks;
        while let Some(&open) = self.open.last() {
            let block = &blocks[open.index];
            if blocks.get(next).is_some_and(|b| block.contains(b)) {
                return None;
            }
            self.open.pop();

            let iteration = self
                .queues
                .get_mut(&open.index)
                .and_then(VecDeque::pop_front);
            if let Some(frame) = iteration {
                let position = &block.position;
                self.flush(self.start, position.body.end, body_level(block));
                if open.pushed_frame {
                    self.scope.pop();
                }
                self.scope.push(frame);
                debug!(
                    remaining = self.queues.get(&open.index).map_or(0, VecDeque::len),
                    "repeating loop body"
                );
                self.start = position.body.start;
                self.open.push(OpenBlock {
                    pushed_frame: true,
                    ..open
                });
                return Some(open.index + 1);
            }

            self.queues.remove(&open.index);
            self.close_block(open);
        }
        None
    }

    fn close_block(&mut self, open: OpenBlock) {
        let blocks = self.blocks;
        let block = &blocks[open.index];
        let position = &block.position;
        self.flush(self.start, position.body.end, body_level(block));
        if open.pushed_frame {
            self.scope.pop();
        }
        self.start = position.outer.end;
        if self.out.len() == open.out_len {
            self.collapse_blank_line();
        }
    }

    /// Render block `index` and return the index of the next block to visit.
    fn render_block(&mut self, index: usize) -> Result<usize, RenderError> {
        let blocks = self.blocks;
        let block = &blocks[index];
        let position = &block.position;
        let outcome = self
            .visit(index, block)
            .map_err(|error| RenderError::at(error, position.range.clone()))?;

        match outcome {
            Outcome::Skip => {
                self.start = position.range.end;
                self.collapse_blank_line();
                Ok(self.tree.subtree_end(index))
            }
            Outcome::Leaf { emitted } => {
                self.start = position.range.end;
                if !emitted {
                    self.collapse_blank_line();
                }
                Ok(index + 1)
            }
            Outcome::Enter { frame } => {
                let out_len = self.out.len();
                if self.tree.has_children(index) {
                    let pushed_frame = frame.is_some();
                    if let Some(frame) = frame {
                        self.scope.push(frame);
                    }
                    self.open.push(OpenBlock {
                        index,
                        pushed_frame,
                        out_len,
                    });
                    self.start = position.body.start;
                    return Ok(index + 1);
                }

                // Without nested blocks the body is plain text; a loop repeats it.
                let repeats = 1 + self.queues.remove(&index).map_or(0, |queue| queue.len());
                for _ in 0..repeats {
                    self.flush(position.body.start, position.body.end, body_level(block));
                }
                self.start = position.outer.end;
                if self.out.len() == out_len {
                    self.collapse_blank_line();
                }
                Ok(index + 1)
            }
        }
    }

    fn visit(&mut self, index: usize, block: &Block) -> Result<Outcome, RuntimeError> {
        match &block.kind {
            BlockKind::Skip => Ok(Outcome::Skip),

            BlockKind::InlineValue {
                expression,
                embedded,
            } => {
                let rendered = match evaluate(expression, &mut self.scope)? {
                    Value::String(s) if !embedded => Value::quoted(&s),
                    other => other.to_string(),
                };
                self.out.push_str(&rendered);
                Ok(Outcome::Leaf { emitted: true })
            }

            BlockKind::Unsafe => Ok(Outcome::Enter { frame: None }),

            BlockKind::Conditional => {
                self.taken.insert(index, false);
                Ok(Outcome::Enter { frame: None })
            }

            BlockKind::If(condition) => {
                let wrapper = self.wrapper(index);
                if wrapper.is_some_and(|w| self.is_taken(w)) {
                    debug!(condition = %condition, "branch skipped, an earlier branch was taken");
                    return Ok(Outcome::Skip);
                }
                let truthy = evaluate(condition, &mut self.scope)?.is_truthy();
                debug!(condition = %condition, truthy, "evaluated if");
                if !truthy {
                    return Ok(Outcome::Skip);
                }
                if let Some(wrapper) = wrapper {
                    self.taken.insert(wrapper, true);
                }
                Ok(Outcome::Enter { frame: None })
            }

            BlockKind::Else => match self.wrapper(index) {
                Some(wrapper) if self.is_taken(wrapper) => {
                    debug!("else skipped");
                    Ok(Outcome::Skip)
                }
                Some(wrapper) => {
                    self.taken.insert(wrapper, true);
                    Ok(Outcome::Enter { frame: None })
                }
                None => Ok(Outcome::Enter { frame: None }),
            },

            BlockKind::ForEach {
                expression,
                variable,
            } => {
                let items = match evaluate(expression, &mut self.scope)? {
                    Value::List(items) => items,
                    Value::Map(map) => map_entries(&map),
                    other => {
                        return Err(RuntimeError::UnexpectedIterableType { kind: other.kind() });
                    }
                };
                debug!(expression = %expression, items = items.len(), "entering loop");
                let mut frames: VecDeque<Frame> = items
                    .into_iter()
                    .map(|item| loop_frame(variable.as_deref(), item))
                    .collect();
                let Some(first) = frames.pop_front() else {
                    return Ok(Outcome::Skip);
                };
                self.queues.insert(index, frames);
                Ok(Outcome::Enter { frame: Some(first) })
            }

            BlockKind::When(subject) => {
                let value = evaluate(subject, &mut self.scope)?;
                self.subjects.insert(index, value);
                self.taken.insert(index, false);
                Ok(Outcome::Enter { frame: None })
            }

            BlockKind::WhenClause(values) => {
                let Some(parent) = self.tree.parent(index) else {
                    return Ok(Outcome::Skip);
                };
                if self.is_taken(parent) {
                    return Ok(Outcome::Skip);
                }
                let subject = self.subjects.get(&parent).cloned().unwrap_or_default();
                for value in values {
                    let candidate = evaluate(value, &mut self.scope)?;
                    if values_equal(&candidate, &subject) {
                        debug!(subject = %subject, "when clause matched");
                        self.taken.insert(parent, true);
                        return Ok(Outcome::Enter { frame: None });
                    }
                }
                Ok(Outcome::Skip)
            }

            BlockKind::NamedSlot(slot) => self.splice(slot, false),
            BlockKind::RepeatingSlot(slot) => self.splice(slot, true),
        }
    }

    /// The enclosing `Conditional` or `When` that tracks which branch won.
    fn wrapper(&self, index: usize) -> Option<usize> {
        self.tree.parent(index).filter(|&parent| {
            matches!(
                self.blocks[parent].kind,
                BlockKind::Conditional | BlockKind::When(_)
            )
        })
    }

    fn is_taken(&self, wrapper: usize) -> bool {
        self.taken.get(&wrapper).copied().unwrap_or(false)
    }

    fn splice(&mut self, slot: &Slot, repeating: bool) -> Result<Outcome, RuntimeError> {
        let sources = self.slots.lookup(&self.options.pack_id, slot);
        debug!(slot = %slot.target, contributors = sources.len(), "resolved slot");

        if !repeating && sources.len() > 1 {
            return Err(RuntimeError::TooManySlotTargets {
                slot: slot.target.to_string(),
                packs: sources.into_iter().map(|source| source.pack_id).collect(),
            });
        }
        if sources.is_empty() {
            return match slot.requirement {
                Requirement::Required => Err(RuntimeError::MissingSlot {
                    slot: slot.target.to_string(),
                }),
                Requirement::Omitted | Requirement::Optional => {
                    Ok(Outcome::Leaf { emitted: false })
                }
            };
        }

        let prefix = line_prefix(&self.out);
        let spliced = sources
            .iter()
            .map(|source| {
                indent_following_lines(&trim_blank_lines(&trim_indent(&source.text)), &prefix)
            })
            .collect::<Vec<_>>()
            .join(&format!("\n\n{}", prefix));
        self.out.push_str(&spliced);
        Ok(Outcome::Leaf {
            emitted: !spliced.is_empty(),
        })
    }

    /// Copy `text[from..to]`, stripping `level` indentation levels.
    fn flush(&mut self, from: usize, to: usize, level: usize) {
        if from >= to {
            return;
        }
        let Some(segment) = self.text.get(from..to) else {
            return;
        };
        let width = self.options.indent_width;
        let at_line_start = from == 0 || self.text.as_bytes()[from - 1] == b'\n';
        self.out
            .push_str(&strip_indent(segment, at_line_start, level * width, width));
    }

    /// Remove the line a dropped block left empty: the output's current line
    /// holds only whitespace and so does the rest of the template line.
    fn collapse_blank_line(&mut self) {
        if self.start > 0 && self.text.as_bytes().get(self.start - 1) == Some(&b'\n') {
            return;
        }
        let line_start = self.out.rfind('\n').map_or(0, |i| i + 1);
        if !self.out[line_start..].chars().all(|c| c == ' ' || c == '\t') {
            return;
        }
        let rest = self.text.get(self.start..).unwrap_or("");
        let newline = rest.find('\n');
        let tail = &rest[..newline.unwrap_or(rest.len())];
        if !tail.chars().all(|c| matches!(c, ' ' | '\t' | '\r')) {
            return;
        }
        self.out.truncate(line_start);
        self.start = match newline {
            Some(i) => self.start + i + 1,
            None => self.text.len(),
        };
    }
}

/// Indentation levels stripped from a block's body. `unsafe` bodies are
/// copied verbatim whatever their nesting.
fn body_level(block: &Block) -> usize {
    match block.kind {
        BlockKind::Unsafe => 0,
        _ => block.position.level,
    }
}

/// The bindings for one loop iteration. Without a declared variable the
/// item is `this` and map items are also bound field by field.
fn loop_frame(variable: Option<&str>, item: Value) -> Frame {
    let mut frame = Frame::new();
    match variable {
        Some(name) => {
            frame.insert(name.to_string(), item);
        }
        None => {
            if let Value::Map(map) = &item {
                for (key, value) in map {
                    frame.insert(key.clone(), value.clone());
                }
            }
            frame.insert("this".to_string(), item);
        }
    }
    frame
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeBuilder;
    use crate::slots::no_slots;
    use pretty_assertions::assert_eq;
    use stencil::parser::Parser;

    fn render_source(source: &str, scope: Scope) -> Result<String, RenderError> {
        let template = Parser::new(source.to_string(), 0)
            .parse()
            .expect("template should analyze");
        render_template(&template, scope, &no_slots, &RenderOptions::default())
    }

    #[test]
    fn loop_frames_destructure_maps() {
        let item = Value::map([("name".to_string(), Value::from("api"))]);
        let frame = loop_frame(None, item.clone());
        assert_eq!(frame.get("name"), Some(&Value::from("api")));
        assert_eq!(frame.get("this"), Some(&item));

        let frame = loop_frame(Some("m"), item.clone());
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.get("m"), Some(&item));
    }

    #[test]
    fn loop_scope_is_popped_after_the_loop() {
        let scope = ScopeBuilder::new()
            .property("xs", vec![1, 2])
            .property("x", "outer")
            .build();
        let out = render_source("{% for x in xs %}{{ x }},{% end %}{{ x }}", scope).unwrap();
        assert_eq!(out, "1,2,outer");
    }

    #[test]
    fn nested_loops_rebind_inner_variables() {
        let scope = ScopeBuilder::new()
            .property("rows", vec![vec![1, 2], vec![3]])
            .build();
        let source = "{% for row in rows %}[{% for c in row %}{{ c }}{% end %}]{% end %}";
        assert_eq!(render_source(source, scope).unwrap(), "[12][3]");
    }

    #[test]
    fn errors_carry_the_block_span() {
        let err = render_source("ab {{ 1 / 0 }}", Scope::new()).unwrap_err();
        assert!(matches!(err.error, RuntimeError::ArithmeticError { .. }));
        assert_eq!(err.span, Some(3..14));
    }

    #[test]
    fn iterating_a_scalar_is_an_error() {
        let scope = ScopeBuilder::new().property("n", 3).build();
        let err = render_source("{% for x in n %}{{ x }}{% end %}", scope).unwrap_err();
        assert_eq!(
            err.error,
            RuntimeError::UnexpectedIterableType {
                kind: crate::value::ValueKind::Int
            }
        );
    }

    #[test]
    fn unsafe_inside_an_indented_loop_keeps_its_indentation() {
        let scope = ScopeBuilder::new().property("xs", vec![1, 2]).build();
        let source = "{% for x in xs %}\n    {% unsafe %}\n    raw {{ y }}\n    {% end %}\n{% end %}\n";
        let out = render_source(source, scope).unwrap();
        assert_eq!(out, "    raw {{ y }}\n    raw {{ y }}\n");
    }
}
