//! The linear bounding volume hierarchy: construction, storage, and
//! closest-hit traversal.

mod build;
mod node;
mod traverse;

pub use self::node::{BvhNode, Child};
pub use self::traverse::Traverser;

use log::warn;

use crate::aabb::Aabb;
use crate::BvhScalar;

/// An immutable bounding volume hierarchy over `N` primitives.
///
/// The hierarchy stores exactly `N - 1` internal nodes, with the root at
/// index 0; leaves exist only as tagged references into the Morton-sorted
/// primitive order. The primitives themselves are not owned or copied: the
/// permutation maps each sorted leaf slot back to the index of the primitive
/// in the slice the hierarchy was built from.
///
/// After [`Bvh::build`] returns, the structure never changes, so it may be
/// shared freely across threads for concurrent queries.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bvh<T: BvhScalar> {
    /// Internal nodes; index 0 is the root.
    nodes: Vec<BvhNode<T>>,

    /// Maps sorted leaf slots to original primitive indices.
    perm: Vec<u32>,
}

impl<T: BvhScalar> Bvh<T> {
    /// Returns the internal nodes. The root is node 0.
    pub fn nodes(&self) -> &[BvhNode<T>] {
        &self.nodes
    }

    /// Returns the node at `index`.
    pub fn node(&self, index: usize) -> &BvhNode<T> {
        &self.nodes[index]
    }

    /// Returns the number of internal nodes, `N - 1` for `N` primitives.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the hierarchy has no internal nodes. Never true for
    /// a hierarchy produced by [`Bvh::build`], which requires at least two
    /// primitives.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the number of primitives the hierarchy was built over.
    pub fn primitive_count(&self) -> usize {
        self.perm.len()
    }

    /// Returns the permutation from sorted leaf slots to original primitive
    /// indices.
    pub fn permutation(&self) -> &[u32] {
        &self.perm
    }

    /// Returns the original index of the primitive in leaf slot `slot`.
    pub fn primitive_index(&self, slot: u32) -> u32 {
        self.perm[slot as usize]
    }

    /// Checks the structural invariants of the hierarchy against the
    /// primitives it was built from: the root is never referenced as a
    /// child, every other node is referenced exactly once, every leaf slot
    /// is referenced exactly once, every child's box (a node's stored box,
    /// or a leaf's primitive box recomputed through `converter`) lies inside
    /// its parent's box, and the whole structure is one tree reachable from
    /// the root.
    ///
    /// Violations are reported through `log::warn!` and make the check
    /// return `false`. Intended for tests and debugging; a hierarchy
    /// produced by [`Bvh::build`] always passes when given the same
    /// primitives and converter.
    pub fn is_consistent<P, C>(&self, primitives: &[P], converter: C) -> bool
    where
        C: Fn(&P) -> Aabb<T>,
    {
        if primitives.len() != self.perm.len() {
            warn!(
                "{} primitives supplied for a hierarchy over {}",
                primitives.len(),
                self.perm.len()
            );
            return false;
        }

        let mut consistent = true;

        // Reference counts over all child words.
        let mut node_refs = vec![0u32; self.nodes.len()];
        let mut leaf_refs = vec![0u32; self.perm.len()];
        for node in &self.nodes {
            for child in [node.left(), node.right()] {
                match child {
                    Child::Node(index) => node_refs[index as usize] += 1,
                    Child::Leaf(slot) => leaf_refs[slot as usize] += 1,
                }
            }
        }

        if node_refs[0] != 0 {
            warn!("root node is referenced {} times as a child", node_refs[0]);
            consistent = false;
        }
        for (index, &count) in node_refs.iter().enumerate().skip(1) {
            if count != 1 {
                warn!("node {} is referenced {} times as a child", index, count);
                consistent = false;
            }
        }
        for (slot, &count) in leaf_refs.iter().enumerate() {
            if count != 1 {
                warn!("leaf slot {} is referenced {} times", slot, count);
                consistent = false;
            }
        }

        // Connectivity and box containment from the root down. The visited
        // flags guard the walk against cycles in malformed input.
        let mut visited = vec![false; self.nodes.len()];
        let mut visited_nodes = 0usize;
        let mut visited_leaves = 0usize;
        let mut stack = vec![0u32];
        while let Some(index) = stack.pop() {
            let index = index as usize;
            if visited[index] {
                warn!("node {} is part of a cycle", index);
                consistent = false;
                continue;
            }
            visited[index] = true;
            visited_nodes += 1;

            let node = &self.nodes[index];
            for child in [node.left(), node.right()] {
                match child {
                    Child::Leaf(slot) => {
                        visited_leaves += 1;
                        let leaf_aabb =
                            converter(&primitives[self.perm[slot as usize] as usize]);
                        if !node.aabb.contains_aabb(&leaf_aabb) {
                            warn!(
                                "leaf slot {} escapes its parent {}: {} vs {}",
                                slot, index, leaf_aabb, node.aabb
                            );
                            consistent = false;
                        }
                    }
                    Child::Node(child_index) => {
                        let child_aabb = &self.nodes[child_index as usize].aabb;
                        if !node.aabb.contains_aabb(child_aabb) {
                            warn!(
                                "child {} escapes its parent {}: {} vs {}",
                                child_index, index, child_aabb, node.aabb
                            );
                            consistent = false;
                        }
                        stack.push(child_index);
                    }
                }
            }
        }

        if visited_nodes != self.nodes.len() {
            warn!(
                "{} of {} nodes reachable from the root",
                visited_nodes,
                self.nodes.len()
            );
            consistent = false;
        }
        if visited_leaves != self.perm.len() {
            warn!(
                "{} of {} leaves reachable from the root",
                visited_leaves,
                self.perm.len()
            );
            consistent = false;
        }

        consistent
    }

    /// Assert version of [`Bvh::is_consistent`].
    pub fn assert_consistent<P, C>(&self, primitives: &[P], converter: C)
    where
        C: Fn(&P) -> Aabb<T>,
    {
        assert!(
            self.is_consistent(primitives, converter),
            "inconsistent hierarchy"
        );
    }
}
