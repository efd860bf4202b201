//! Branching and the best-first node queue (C7, §4.7).
//!
//! A [`BranchNode`] is a thin record of its `fixings`; the node's own pattern pool is rebuilt on
//! demand from the root pool (§4.7, via [`crate::model::PatternPool::filter_for_fixings`]) and
//! discarded when the node closes — nodes never own patterns themselves.

use std::cmp::Ordering;
use std::collections::HashMap;

/// One node of the branch-and-bound tree. `ub` is the best bound known for this node: the
/// parent's column-generation objective until this node's own CG run tightens it.
#[derive(Debug, Clone)]
pub struct BranchNode {
    pub id: u64,
    pub depth: u32,
    pub fixings: HashMap<usize, bool>,
    pub ub: f64,
}

impl BranchNode {
    pub fn root(id: u64) -> Self {
        BranchNode { id, depth: 0, fixings: HashMap::new(), ub: f64::INFINITY }
    }

    /// Spawns the `item*=0` (left) and `item*=1` (right) children per §4.7, extending `self`'s
    /// fixings by exactly one new mapping each. Both children inherit `self`'s just-computed CG
    /// bound as a placeholder until their own CG run tightens it.
    pub fn children(&self, item: usize, next_id: &mut u64) -> (BranchNode, BranchNode) {
        let left_id = *next_id;
        *next_id += 1;
        let right_id = *next_id;
        *next_id += 1;

        let mut left_fixings = self.fixings.clone();
        left_fixings.insert(item, false);
        let mut right_fixings = self.fixings.clone();
        right_fixings.insert(item, true);

        (
            BranchNode { id: left_id, depth: self.depth + 1, fixings: left_fixings, ub: self.ub },
            BranchNode { id: right_id, depth: self.depth + 1, fixings: right_fixings, ub: self.ub },
        )
    }
}

/// Best-first ordering for the driver's `BinaryHeap`: higher `ub` pops first; ties broken by
/// smaller `id` (earlier insertion), so ordering is deterministic despite `f64` having no total
/// order in general (NaN never arises here — bounds come from finite LP objectives or `+inf`).
impl PartialEq for BranchNode {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for BranchNode {}

impl PartialOrd for BranchNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BranchNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ub
            .partial_cmp(&other.ub)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn children_extend_fixings_by_exactly_one_mapping() {
        let mut next_id = 1;
        let root = BranchNode::root(0);
        let (left, right) = root.children(3, &mut next_id);
        assert_eq!(left.fixings.get(&3), Some(&false));
        assert_eq!(right.fixings.get(&3), Some(&true));
        assert_eq!(left.depth, 1);
        assert_eq!(right.depth, 1);
        assert_ne!(left.id, right.id);
    }

    #[test]
    fn heap_pops_highest_ub_first() {
        let mut heap = BinaryHeap::new();
        heap.push(BranchNode { id: 0, depth: 0, fixings: HashMap::new(), ub: 10.0 });
        heap.push(BranchNode { id: 1, depth: 0, fixings: HashMap::new(), ub: 30.0 });
        heap.push(BranchNode { id: 2, depth: 0, fixings: HashMap::new(), ub: 20.0 });
        assert_eq!(heap.pop().unwrap().ub, 30.0);
        assert_eq!(heap.pop().unwrap().ub, 20.0);
        assert_eq!(heap.pop().unwrap().ub, 10.0);
    }

    #[test]
    fn heap_breaks_ties_by_earlier_insertion() {
        let mut heap = BinaryHeap::new();
        heap.push(BranchNode { id: 5, depth: 0, fixings: HashMap::new(), ub: 10.0 });
        heap.push(BranchNode { id: 2, depth: 0, fixings: HashMap::new(), ub: 10.0 });
        assert_eq!(heap.pop().unwrap().id, 2);
        assert_eq!(heap.pop().unwrap().id, 5);
    }
}
