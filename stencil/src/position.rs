use std::ops::Range;

/// Where a block sits in its template text.
///
/// All offsets are byte offsets into the template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// The directive's own span. For containers this runs from the opening
    /// marker through the closing marker.
    pub range: Range<usize>,
    /// `range` widened to swallow the marker lines when the markers stand
    /// alone on their lines.
    pub outer: Range<usize>,
    /// The nested content the directive wraps.
    pub body: Range<usize>,
    /// Indentation levels stripped from text inlined out of this block's body.
    pub level: usize,
}

impl Position {
    /// A leaf position: nothing wrapped, no surrounding lines swallowed.
    pub fn leaf(range: Range<usize>) -> Self {
        Position {
            outer: range.clone(),
            body: range.end..range.end,
            range,
            level: 0,
        }
    }

    pub fn with_level(mut self, level: usize) -> Self {
        self.level = level;
        self
    }

    /// True iff `other` starts inside this position's range.
    ///
    /// A block sharing its start offset with an enclosing wrapper is
    /// contained when it ends first.
    pub fn contains(&self, other: &Position) -> bool {
        let (outer, inner) = (&self.range, &other.range);
        outer.start <= inner.start
            && inner.start < outer.end
            && (inner.start > outer.start || inner.end < outer.end)
    }

    pub fn outer_contents<'t>(&self, text: &'t str) -> &'t str {
        text.get(self.outer.clone()).unwrap_or("")
    }

    pub fn body_contents<'t>(&self, text: &'t str) -> &'t str {
        text.get(self.body.clone()).unwrap_or("")
    }
}
