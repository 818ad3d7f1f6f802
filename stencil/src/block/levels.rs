use std::cmp::Ordering;

use crate::block::Block;
use crate::position::Position;

/// Order blocks for rendering: ascending start, enclosing block first when
/// two blocks start at the same offset.
pub fn sort_blocks(blocks: &mut [Block]) {
    blocks.sort_by(|a, b| compare_positions(&a.position, &b.position));
}

fn compare_positions(a: &Position, b: &Position) -> Ordering {
    a.range
        .start
        .cmp(&b.range.start)
        .then_with(|| b.range.end.cmp(&a.range.end))
}

/// Turn raw per-block levels into absolute ones.
///
/// A freshly analyzed block only knows whether its own body is indented one
/// step deeper than its marker. This pass produces a new, sorted list in which
/// every block's level also counts the levels of all enclosing blocks.
pub fn resolve_levels(mut blocks: Vec<Block>) -> Vec<Block> {
    sort_blocks(&mut blocks);

    let mut resolved: Vec<Block> = Vec::with_capacity(blocks.len());
    let mut stack: Vec<usize> = Vec::new();

    for block in blocks {
        while let Some(&top) = stack.last() {
            if resolved[top].contains(&block) {
                break;
            }
            stack.pop();
        }
        let inherited = stack
            .last()
            .map(|&parent| resolved[parent].position.level)
            .unwrap_or(0);
        let level = block.position.level + inherited;
        stack.push(resolved.len());
        resolved.push(Block {
            position: block.position.with_level(level),
            kind: block.kind,
        });
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;

    fn block(start: usize, end: usize, level: usize) -> Block {
        Block::new(
            BlockKind::Skip,
            Position {
                range: start..end,
                outer: start..end,
                body: start..end,
                level,
            },
        )
    }

    #[test]
    fn sorts_wrappers_before_branches_at_same_start() {
        let mut blocks = vec![block(0, 10, 0), block(12, 14, 0), block(0, 30, 0)];
        sort_blocks(&mut blocks);
        let ranges: Vec<_> = blocks.iter().map(|b| b.position.range.clone()).collect();
        assert_eq!(ranges, vec![0..30, 0..10, 12..14]);
    }

    #[test]
    fn levels_accumulate_through_ancestors() {
        let blocks = vec![
            block(5, 8, 0),
            block(0, 100, 1),
            block(2, 50, 1),
            block(60, 70, 0),
            block(120, 130, 1),
        ];
        let levels: Vec<usize> = resolve_levels(blocks)
            .iter()
            .map(|b| b.position.level)
            .collect();
        // 0..100 (1), 2..50 (1+1), 5..8 (0+2), 60..70 (0+1), 120..130 (1)
        assert_eq!(levels, vec![1, 2, 2, 1, 1]);
    }
}
