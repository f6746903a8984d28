//! Closest-hit traversal.

use smallvec::SmallVec;

use crate::bvh::{Bvh, Child};
use crate::ray::{Intersection, Ray};
use crate::BvhScalar;

/// Inline capacity of the traversal stack. The prefix metric strictly
/// increases along any root-to-leaf path and is bounded by the 64 code bits
/// plus the 64 tie-break bits, so no well-formed tree is deeper than 128 and
/// the stack only spills to the heap for corrupted input.
const STACK_CAPACITY: usize = 128;

/// Answers closest-hit ray queries against a built [`Bvh`].
///
/// A traverser borrows the hierarchy and the primitive slice it was built
/// from; both stay immutable, so any number of traversers and concurrent
/// queries may share them without synchronization.
pub struct Traverser<'a, T: BvhScalar, P> {
    bvh: &'a Bvh<T>,
    primitives: &'a [P],
}

impl<'a, T: BvhScalar, P> Traverser<'a, T, P> {
    /// Creates a traverser over `bvh` and the primitives it was built from.
    ///
    /// # Panics
    ///
    /// Panics if `primitives` does not have the length the hierarchy was
    /// built with.
    pub fn new(bvh: &'a Bvh<T>, primitives: &'a [P]) -> Traverser<'a, T, P> {
        assert_eq!(
            primitives.len(),
            bvh.primitive_count(),
            "primitive slice does not match the hierarchy"
        );
        Traverser { bvh, primitives }
    }

    /// Returns the intersection closest to the ray origin, or the miss
    /// sentinel if the ray hits nothing.
    ///
    /// `intersector` maps a primitive and the ray to an [`Intersection`]
    /// (miss encoded as infinite distance); it must be pure. Hits at
    /// distances up to `sqrt` of the scalar's machine epsilon (about
    /// `3.5e-4` for `f32`, `1.5e-8` for `f64`) are discarded as
    /// self-intersections. The `primitive_index` of the returned record is
    /// the original index of the winning primitive.
    ///
    /// Internal nodes are visited in near-to-far order and subtrees farther
    /// than the best hit so far are skipped; this is purely a traversal-order
    /// optimization and never changes the result.
    pub fn traverse<I>(&self, ray: &Ray<T>, intersector: I) -> Intersection<T>
    where
        I: Fn(&P, &Ray<T>) -> Intersection<T>,
    {
        let epsilon = num::Float::sqrt(T::epsilon());
        let mut best = Intersection::miss();

        let mut stack: SmallVec<[u32; STACK_CAPACITY]> = SmallVec::new();
        stack.push(0);

        while let Some(index) = stack.pop() {
            let node = self.bvh.node(index as usize);

            // Up to two interior children survive the slab test; they are
            // pushed far-first so the near one is popped next.
            let mut pending = [(0u32, T::zero()); 2];
            let mut pending_len = 0;

            for child in [node.left(), node.right()] {
                match child {
                    Child::Leaf(slot) => {
                        let primitive_index = self.bvh.primitive_index(slot);
                        let mut candidate =
                            intersector(&self.primitives[primitive_index as usize], ray);
                        if candidate.distance > epsilon && candidate.distance < best.distance {
                            candidate.primitive_index = primitive_index;
                            best = candidate;
                        }
                    }
                    Child::Node(child_index) => {
                        let child_node = self.bvh.node(child_index as usize);
                        if let Some((t_near, _)) = ray.intersects_aabb(&child_node.aabb) {
                            if t_near < best.distance {
                                pending[pending_len] = (child_index, t_near);
                                pending_len += 1;
                            }
                        }
                    }
                }
            }

            match pending_len {
                1 => stack.push(pending[0].0),
                2 => {
                    let (near, far) = if pending[0].1 <= pending[1].1 {
                        (pending[0].0, pending[1].0)
                    } else {
                        (pending[1].0, pending[0].0)
                    };
                    stack.push(far);
                    stack.push(near);
                }
                _ => {}
            }
        }

        best
    }
}
