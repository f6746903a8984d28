//! The packed node representation of the hierarchy.

use crate::aabb::Aabb;
use crate::BvhScalar;

/// High bit of a child word; set when the child is a leaf.
const LEAF_BIT: u32 = 1 << 31;

/// A decoded child reference of a [`BvhNode`].
///
/// `Node` carries the index of an internal node, `Leaf` the sorted leaf slot
/// of a primitive. Both are capped at `2^31` entries by the tag bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Child {
    /// An internal node, by index into the node array.
    Node(u32),

    /// A leaf, by sorted leaf slot. The original primitive index is obtained
    /// through the permutation owned by the hierarchy.
    Leaf(u32),
}

impl Child {
    /// Returns `true` for leaf references.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Child::Leaf(_))
    }

    fn encode(self) -> u32 {
        match self {
            Child::Node(index) => {
                debug_assert_eq!(index & LEAF_BIT, 0);
                index
            }
            Child::Leaf(slot) => {
                debug_assert_eq!(slot & LEAF_BIT, 0);
                slot | LEAF_BIT
            }
        }
    }

    fn decode(word: u32) -> Child {
        if word & LEAF_BIT != 0 {
            Child::Leaf(word & !LEAF_BIT)
        } else {
            Child::Node(word)
        }
    }
}

/// An internal node of a [`Bvh`].
///
/// Nodes are plain old data: a bounding box and two packed 32-bit child
/// words whose high bit discriminates leaf slots from node indices. Leaves
/// are not materialized as nodes; a leaf reference points directly into the
/// sorted primitive order. This keeps a node at 32 bytes for `f32` scalars
/// and 56 bytes for `f64`.
///
/// [`Bvh`]: struct.Bvh.html
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BvhNode<T: BvhScalar> {
    /// The bounding volume of the node: the exact union of the volumes of
    /// both children.
    pub aabb: Aabb<T>,

    left: u32,
    right: u32,
}

impl<T: BvhScalar> BvhNode<T> {
    pub(crate) fn new(aabb: Aabb<T>, left: Child, right: Child) -> BvhNode<T> {
        BvhNode {
            aabb,
            left: left.encode(),
            right: right.encode(),
        }
    }

    /// Returns the left child reference.
    pub fn left(&self) -> Child {
        Child::decode(self.left)
    }

    /// Returns the right child reference.
    pub fn right(&self) -> Child {
        Child::decode(self.right)
    }

    /// Returns `true` if the left child is a leaf.
    pub fn left_is_leaf(&self) -> bool {
        self.left & LEAF_BIT != 0
    }

    /// Returns `true` if the right child is a leaf.
    pub fn right_is_leaf(&self) -> bool {
        self.right & LEAF_BIT != 0
    }

    /// Returns the sorted leaf slot of the left child, or [`None`] if it is
    /// an internal node.
    pub fn left_leaf_index(&self) -> Option<u32> {
        match self.left() {
            Child::Leaf(slot) => Some(slot),
            Child::Node(_) => None,
        }
    }

    /// Returns the sorted leaf slot of the right child, or [`None`] if it is
    /// an internal node.
    pub fn right_leaf_index(&self) -> Option<u32> {
        match self.right() {
            Child::Leaf(slot) => Some(slot),
            Child::Node(_) => None,
        }
    }
}
