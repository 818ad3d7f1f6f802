use crate::block::Block;

/// Parent/subtree relations of a sorted, bracket-consistent block list.
///
/// Blocks are identified by their index in the list.
#[derive(Debug, Clone)]
pub struct BlockTree {
    parents: Vec<Option<usize>>,
    subtree_end: Vec<usize>,
}

impl BlockTree {
    pub fn build(blocks: &[Block]) -> Self {
        let mut parents = vec![None; blocks.len()];
        let mut subtree_end = vec![blocks.len(); blocks.len()];
        let mut stack: Vec<usize> = Vec::new();

        for (i, block) in blocks.iter().enumerate() {
            while let Some(&top) = stack.last() {
                if blocks[top].contains(block) {
                    break;
                }
                subtree_end[top] = i;
                stack.pop();
            }
            parents[i] = stack.last().copied();
            stack.push(i);
        }

        BlockTree {
            parents,
            subtree_end,
        }
    }

    pub fn parent(&self, index: usize) -> Option<usize> {
        self.parents.get(index).copied().flatten()
    }

    /// Index of the first block after `index` and all its descendants.
    pub fn subtree_end(&self, index: usize) -> usize {
        self.subtree_end.get(index).copied().unwrap_or(index + 1)
    }

    pub fn has_children(&self, index: usize) -> bool {
        self.subtree_end(index) > index + 1
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockKind;
    use crate::position::Position;

    fn container(start: usize, end: usize) -> Block {
        Block::new(
            BlockKind::Skip,
            Position {
                range: start..end,
                outer: start..end,
                body: start + 1..end - 1,
                level: 0,
            },
        )
    }

    #[test]
    fn parents_and_subtrees() {
        let blocks = vec![
            container(0, 50),
            container(2, 20),
            container(4, 10),
            container(22, 30),
            container(60, 70),
        ];
        let tree = BlockTree::build(&blocks);
        assert_eq!(tree.parent(0), None);
        assert_eq!(tree.parent(1), Some(0));
        assert_eq!(tree.parent(2), Some(1));
        assert_eq!(tree.parent(3), Some(0));
        assert_eq!(tree.parent(4), None);
        assert_eq!(tree.subtree_end(0), 4);
        assert_eq!(tree.subtree_end(1), 3);
        assert_eq!(tree.subtree_end(4), 5);
        assert!(tree.has_children(1));
        assert!(!tree.has_children(2));
    }
}
