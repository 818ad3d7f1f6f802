use std::iter;
use std::ops::Range;

use tracing::debug;

use crate::block::levels::resolve_levels;
use crate::block::{Block, BlockKind, Requirement, Slot, SlotId};
use crate::expression::Expression;
use crate::parser::error::ParseError;
use crate::parser::expression::{parse_expression_at, parse_expression_list_at};
use crate::position::Position;

const KEYWORDS: &str = "if, elif, else, end, for, when, is, slot, slots, skip, unsafe";

/// Naming used to expand bare slot names into `slot://` addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerOptions {
    pub slot_group: String,
    pub pack: String,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            slot_group: "source".to_string(),
            pack: "default".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Find every directive marker in `source` and build the sorted,
/// level-resolved block list.
pub fn analyze(
    source: &str,
    file_id: usize,
    options: &AnalyzerOptions,
) -> Result<Vec<Block>, Vec<ParseError>> {
    let mut state = AnalyzeState::new(source, file_id, options);
    state.run();
    state.finalize()
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkerKind {
    /// `{{ expr }}` or `{{= expr }}`.
    Value { embedded: bool },
    /// `{% keyword ... %}`.
    Directive,
}

#[derive(Debug, Clone)]
struct Marker<'a> {
    kind: MarkerKind,
    span: Range<usize>,
    content: &'a str,
    content_start: usize,
}

fn find_marker_start(text: &str, from: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = from;
    while let Some(offset) = text.get(i..)?.find('{') {
        let at = i + offset;
        if matches!(bytes.get(at + 1), Some(b'{' | b'%')) {
            return Some(at);
        }
        i = at + 1;
    }
    None
}

/// Find `close`, skipping string and character literals. With
/// `track_braces`, balanced `{ }` pairs (lambdas) are skipped too.
fn find_close(text: &str, from: usize, close: &str, track_braces: bool) -> Option<usize> {
    let bytes = text.as_bytes();
    let close = close.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = from;

    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'{' if track_braces => depth += 1,
            b'}' if track_braces && depth > 0 => depth -= 1,
            _ if depth == 0 && bytes[i..].starts_with(close) => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// The first `{% end %}` after `from`, ignoring everything else.
fn find_unsafe_end(text: &str, from: usize) -> Option<Range<usize>> {
    let mut pos = from;
    loop {
        let open = pos + text.get(pos..)?.find("{%")?;
        let close = open + 2 + text[open + 2..].find("%}")?;
        if text[open + 2..close].trim() == "end" {
            return Some(open..close + 2);
        }
        pos = open + 2;
    }
}

// ---------------------------------------------------------------------------
// Line geometry
// ---------------------------------------------------------------------------

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |i| i + 1)
}

fn line_end(text: &str, pos: usize) -> usize {
    text[pos..].find('\n').map_or(text.len(), |i| pos + i)
}

/// Offset just past the line break ending the line containing `pos`.
fn next_line(text: &str, pos: usize) -> usize {
    let end = line_end(text, pos);
    if end < text.len() { end + 1 } else { end }
}

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\r'))
}

/// True when only whitespace shares the marker's line.
fn alone(text: &str, span: &Range<usize>) -> bool {
    is_blank(&text[line_start(text, span.start)..span.start])
        && is_blank(&text[span.end..line_end(text, span.end)])
}

fn indent_columns(line: &str) -> usize {
    line.chars()
        .take_while(|c| matches!(*c, ' ' | '\t'))
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn is_slot_name(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Split `body` into its keyword and the trimmed remainder, returning the
/// remainder's offset.
fn split_keyword(body: &str, start: usize) -> (&str, &str, usize) {
    let end = body.find(char::is_whitespace).unwrap_or(body.len());
    let rest = &body[end..];
    let lead = rest.len() - rest.trim_start().len();
    (&body[..end], rest.trim(), start + end + lead)
}

/// Recognize `name in expr`, returning the name and the expression with
/// its offset.
fn split_loop_variable(rest: &str, start: usize) -> Option<(&str, &str, usize)> {
    let name_end = rest.find(char::is_whitespace)?;
    let name = &rest[..name_end];
    if !is_identifier(name) {
        return None;
    }
    let tail = rest[name_end..].trim_start().strip_prefix("in")?;
    if !tail.starts_with(char::is_whitespace) {
        return None;
    }
    let expr = tail.trim_start();
    Some((name, expr, start + rest.len() - expr.len()))
}

// ---------------------------------------------------------------------------
// Analyzer state
// ---------------------------------------------------------------------------

struct Branch {
    marker: Range<usize>,
    kind: BlockKind,
}

impl Branch {
    fn is_else(&self) -> bool {
        matches!(self.kind, BlockKind::Else)
    }
}

enum FrameKind {
    If { branches: Vec<Branch> },
    When { subject: Expression, branches: Vec<Branch> },
    For { expression: Expression, variable: Option<String> },
    Skip,
}

/// A container whose `{% end %}` has not been seen yet.
struct Frame {
    keyword: &'static str,
    opener: Range<usize>,
    kind: FrameKind,
}

struct AnalyzeState<'a> {
    source: &'a str,
    file_id: usize,
    options: &'a AnalyzerOptions,
    stack: Vec<Frame>,
    blocks: Vec<Block>,
    errors: Vec<ParseError>,
}

impl<'a> AnalyzeState<'a> {
    fn new(source: &'a str, file_id: usize, options: &'a AnalyzerOptions) -> Self {
        AnalyzeState {
            source,
            file_id,
            options,
            stack: Vec::new(),
            blocks: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn error(&mut self, message: impl Into<String>, span: Range<usize>) {
        self.errors.push(ParseError::new(message, span, self.file_id));
    }

    fn run(&mut self) {
        let mut pos = 0;
        while let Some(open) = find_marker_start(self.source, pos) {
            let marker = match self.read_marker(open) {
                Ok(marker) => marker,
                Err(err) => {
                    self.errors.push(err);
                    break;
                }
            };
            pos = match marker.kind {
                MarkerKind::Value { embedded } => {
                    self.value(&marker, embedded);
                    marker.span.end
                }
                MarkerKind::Directive => self.directive(&marker),
            };
        }

        let end = self.source.len();
        while let Some(frame) = self.stack.pop() {
            self.errors.push(
                ParseError::new(
                    format!("`{}` block is never closed", frame.keyword),
                    end..end,
                    self.file_id,
                )
                .with_secondary(frame.opener, "block opened here")
                .with_note("close it with `{% end %}`"),
            );
        }
    }

    fn finalize(mut self) -> Result<Vec<Block>, Vec<ParseError>> {
        if !self.errors.is_empty() {
            self.errors.sort_by_key(|e| e.span.start);
            return Err(self.errors);
        }
        let blocks = resolve_levels(self.blocks);
        debug!(blocks = blocks.len(), "analyzed template");
        Ok(blocks)
    }

    fn read_marker(&self, open: usize) -> Result<Marker<'a>, ParseError> {
        let source = self.source;
        if source.as_bytes().get(open + 1) == Some(&b'{') {
            let mut content_start = open + 2;
            let embedded = source.as_bytes().get(content_start) != Some(&b'=');
            if !embedded {
                content_start += 1;
            }
            let close = find_close(source, content_start, "}}", true).ok_or_else(|| {
                ParseError::new("unterminated `{{` marker", open..open + 2, self.file_id)
                    .with_note("close it with `}}`")
            })?;
            Ok(Marker {
                kind: MarkerKind::Value { embedded },
                span: open..close + 2,
                content: &source[content_start..close],
                content_start,
            })
        } else {
            let content_start = open + 2;
            let close = find_close(source, content_start, "%}", false).ok_or_else(|| {
                ParseError::new("unterminated `{%` marker", open..open + 2, self.file_id)
                    .with_note("close it with `%}`")
            })?;
            Ok(Marker {
                kind: MarkerKind::Directive,
                span: open..close + 2,
                content: &source[content_start..close],
                content_start,
            })
        }
    }

    /// Parse an expression, recording any error and substituting `null` so
    /// that analysis can continue.
    fn expression(&mut self, src: &str, start: usize, marker: &Range<usize>) -> Expression {
        if src.is_empty() {
            self.error("expected an expression", marker.clone());
            return Expression::NullLiteral;
        }
        match parse_expression_at(src, start, self.file_id) {
            Ok(expr) => expr,
            Err(err) => {
                self.errors.push(err);
                Expression::NullLiteral
            }
        }
    }

    fn value(&mut self, marker: &Marker<'a>, embedded: bool) {
        let lead = marker.content.len() - marker.content.trim_start().len();
        let src = marker.content.trim();
        let start = marker.content_start + lead;
        let expression = self.expression(src, start, &marker.span);
        let mut position = Position::leaf(marker.span.clone());
        position.body = start..start + src.len();
        self.blocks.push(Block::new(
            BlockKind::InlineValue {
                expression,
                embedded,
            },
            position,
        ));
    }

    /// Handle one `{% %}` marker and return where scanning resumes.
    fn directive(&mut self, marker: &Marker<'a>) -> usize {
        let span = marker.span.clone();
        let resume = span.end;
        let lead = marker.content.len() - marker.content.trim_start().len();
        let (keyword, rest, rest_start) =
            split_keyword(marker.content.trim(), marker.content_start + lead);

        match keyword {
            "if" => {
                let expr = self.expression(rest, rest_start, &span);
                self.stack.push(Frame {
                    keyword: "if",
                    opener: span.clone(),
                    kind: FrameKind::If {
                        branches: vec![Branch {
                            marker: span,
                            kind: BlockKind::If(expr),
                        }],
                    },
                });
            }
            "elif" => {
                let expr = self.expression(rest, rest_start, &span);
                match self.stack.last_mut() {
                    Some(Frame {
                        kind: FrameKind::If { branches },
                        ..
                    }) => {
                        if branches.last().is_some_and(Branch::is_else) {
                            self.error("`elif` after `else`", span);
                        } else {
                            branches.push(Branch {
                                marker: span,
                                kind: BlockKind::If(expr),
                            });
                        }
                    }
                    _ => self.error("`elif` outside of an `if` block", span),
                }
            }
            "else" => {
                self.expect_bare(keyword, rest, rest_start);
                match self.stack.last_mut() {
                    Some(Frame {
                        kind: FrameKind::If { branches } | FrameKind::When { branches, .. },
                        ..
                    }) => {
                        if branches.iter().any(Branch::is_else) {
                            self.error("duplicate `else`", span);
                        } else {
                            branches.push(Branch {
                                marker: span,
                                kind: BlockKind::Else,
                            });
                        }
                    }
                    _ => self.error("`else` outside of an `if` or `when` block", span),
                }
            }
            "when" => {
                let subject = self.expression(rest, rest_start, &span);
                self.stack.push(Frame {
                    keyword: "when",
                    opener: span,
                    kind: FrameKind::When {
                        subject,
                        branches: Vec::new(),
                    },
                });
            }
            "is" => {
                let values = if rest.is_empty() {
                    self.error("expected at least one value after `is`", span.clone());
                    Vec::new()
                } else {
                    match parse_expression_list_at(rest, rest_start, self.file_id) {
                        Ok(values) => values,
                        Err(err) => {
                            self.errors.push(err);
                            Vec::new()
                        }
                    }
                };
                match self.stack.last_mut() {
                    Some(Frame {
                        kind: FrameKind::When { branches, .. },
                        ..
                    }) => {
                        if branches.iter().any(Branch::is_else) {
                            self.error("`is` after `else`", span);
                        } else {
                            branches.push(Branch {
                                marker: span,
                                kind: BlockKind::WhenClause(values),
                            });
                        }
                    }
                    _ => self.error("`is` outside of a `when` block", span),
                }
            }
            "for" => {
                let (expression, variable) = match split_loop_variable(rest, rest_start) {
                    Some((name, src, start)) => {
                        (self.expression(src, start, &span), Some(name.to_string()))
                    }
                    None => (self.expression(rest, rest_start, &span), None),
                };
                self.stack.push(Frame {
                    keyword: "for",
                    opener: span,
                    kind: FrameKind::For {
                        expression,
                        variable,
                    },
                });
            }
            "skip" => {
                self.expect_bare(keyword, rest, rest_start);
                self.stack.push(Frame {
                    keyword: "skip",
                    opener: span,
                    kind: FrameKind::Skip,
                });
            }
            "unsafe" => {
                self.expect_bare(keyword, rest, rest_start);
                return match find_unsafe_end(self.source, span.end) {
                    Some(closer) => {
                        let position = self.container_position(&span, &closer, false);
                        self.blocks.push(Block::new(BlockKind::Unsafe, position));
                        closer.end
                    }
                    None => {
                        let end = self.source.len();
                        self.errors.push(
                            ParseError::new("`unsafe` block is never closed", end..end, self.file_id)
                                .with_secondary(span, "block opened here")
                                .with_note("close it with `{% end %}`"),
                        );
                        end
                    }
                };
            }
            "slot" | "slots" => self.slot(keyword == "slots", rest, rest_start, &span),
            "end" => {
                self.expect_bare(keyword, rest, rest_start);
                self.close(span.clone());
            }
            "" => self.error("empty directive", span.clone()),
            other => {
                let start = marker.content_start + lead;
                self.errors.push(
                    ParseError::new(
                        format!("unknown directive `{}`", other),
                        start..start + other.len(),
                        self.file_id,
                    )
                    .with_note(format!("known directives: {}", KEYWORDS)),
                );
            }
        }
        resume
    }

    fn expect_bare(&mut self, keyword: &str, rest: &str, rest_start: usize) {
        if !rest.is_empty() {
            self.error(
                format!("unexpected text after `{}`", keyword),
                rest_start..rest_start + rest.len(),
            );
        }
    }

    fn slot(&mut self, repeating: bool, rest: &str, rest_start: usize, span: &Range<usize>) {
        let mut words = rest.split_whitespace();
        let Some(name) = words.next() else {
            self.error("expected a slot name", span.clone());
            return;
        };
        let requirement = match words.next() {
            None => Requirement::Optional,
            Some(word) => match word.parse::<Requirement>() {
                Ok(requirement) => requirement,
                Err(message) => {
                    let at = rest_start + rest.find(word).unwrap_or(0);
                    self.error(message, at..at + word.len());
                    return;
                }
            },
        };
        if let Some(extra) = words.next() {
            let at = rest_start + rest.rfind(extra).unwrap_or(0);
            self.error("unexpected text after slot requirement", at..at + extra.len());
            return;
        }

        let name_span = rest_start..rest_start + name.len();
        let target = if SlotId::is_uri(name) {
            match SlotId::parse(name) {
                Some(id) => id,
                None => {
                    self.errors.push(
                        ParseError::new("malformed slot address", name_span, self.file_id)
                            .with_note("expected slot://<group>/<pack>/<name>"),
                    );
                    return;
                }
            }
        } else if is_slot_name(name) {
            SlotId::new(&self.options.slot_group, &self.options.pack, name)
        } else {
            self.error(format!("invalid slot name `{}`", name), name_span);
            return;
        };

        let slot = Slot {
            target,
            requirement,
        };
        let kind = if repeating {
            BlockKind::RepeatingSlot(slot)
        } else {
            BlockKind::NamedSlot(slot)
        };
        let mut position = Position::leaf(span.clone());
        position.body = name_span;
        self.blocks.push(Block::new(kind, position));
    }

    fn close(&mut self, closer: Range<usize>) {
        let Some(frame) = self.stack.pop() else {
            self.error("`end` without an open block", closer);
            return;
        };

        match frame.kind {
            FrameKind::If { mut branches } if branches.len() == 1 => {
                let position = self.container_position(&frame.opener, &closer, true);
                if let Some(branch) = branches.pop() {
                    self.blocks.push(Block::new(branch.kind, position));
                }
            }
            FrameKind::If { branches } => {
                let position = self.container_position(&frame.opener, &closer, false);
                self.blocks.push(Block::new(BlockKind::Conditional, position));
                self.push_branches(branches, &closer);
            }
            FrameKind::When { subject, branches } => {
                let position = self.container_position(&frame.opener, &closer, true);
                self.blocks.push(Block::new(BlockKind::When(subject), position));
                self.push_branches(branches, &closer);
            }
            FrameKind::For {
                expression,
                variable,
            } => {
                let position = self.container_position(&frame.opener, &closer, true);
                self.blocks.push(Block::new(
                    BlockKind::ForEach {
                        expression,
                        variable,
                    },
                    position,
                ));
            }
            FrameKind::Skip => {
                let position = self.container_position(&frame.opener, &closer, false);
                self.blocks.push(Block::new(BlockKind::Skip, position));
            }
        }
    }

    /// Each branch runs up to the next branch marker, or the closing marker
    /// for the last one.
    fn push_branches(&mut self, branches: Vec<Branch>, closer: &Range<usize>) {
        let ends: Vec<Range<usize>> = branches
            .iter()
            .skip(1)
            .map(|b| b.marker.clone())
            .chain(iter::once(closer.clone()))
            .collect();
        for (branch, next) in branches.into_iter().zip(ends) {
            let position = self.branch_position(&branch.marker, &next);
            self.blocks.push(Block::new(branch.kind, position));
        }
    }

    fn container_position(
        &self,
        opener: &Range<usize>,
        closer: &Range<usize>,
        leveled: bool,
    ) -> Position {
        let text = self.source;
        let open_alone = alone(text, opener);
        let close_alone = alone(text, closer);

        let body_start = if open_alone {
            next_line(text, opener.end)
        } else {
            opener.end
        };
        let body_end = if close_alone {
            line_start(text, closer.start)
        } else {
            closer.start
        };
        let body = body_start..body_end.max(body_start);

        let outer_start = if open_alone {
            line_start(text, opener.start)
        } else {
            opener.start
        };
        let outer_end = if close_alone {
            next_line(text, closer.end)
        } else {
            closer.end
        };

        let level = if leveled { self.raw_level(opener, &body) } else { 0 };
        Position {
            range: opener.start..closer.end,
            outer: outer_start..outer_end,
            body,
            level,
        }
    }

    fn branch_position(&self, marker: &Range<usize>, next: &Range<usize>) -> Position {
        let text = self.source;
        let end = if alone(text, next) {
            line_start(text, next.start)
        } else {
            next.start
        };
        let (outer_start, body_start) = if alone(text, marker) {
            (line_start(text, marker.start), next_line(text, marker.end))
        } else {
            (marker.start, marker.end)
        };
        let body = body_start.min(end)..end;
        let level = self.raw_level(marker, &body);
        Position {
            range: marker.start..end,
            outer: outer_start..end,
            body,
            level,
        }
    }

    /// 1 when the marker stands alone and the body's first non-blank line is
    /// indented deeper than the marker, else 0.
    fn raw_level(&self, marker: &Range<usize>, body: &Range<usize>) -> usize {
        let text = self.source;
        if !alone(text, marker) {
            return 0;
        }
        let marker_indent = indent_columns(&text[line_start(text, marker.start)..marker.start]);
        let first_line = text[body.clone()].lines().find(|line| !is_blank(line));
        match first_line {
            Some(line) if indent_columns(line) > marker_indent => 1,
            _ => 0,
        }
    }
}
