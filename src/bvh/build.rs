//! Construction of the hierarchy from a Morton-sorted primitive order.
//!
//! The build follows Karras, "Maximizing Parallelism in the Construction of
//! BVHs, Octrees, and k-d Trees" (HPG 2012): after sorting the leaves along
//! a Morton curve, every internal node's leaf range, split position, and
//! children are determined independently from the sorted code sequence, so
//! the whole node array can be emitted in one data-parallel pass. A second
//! pass propagates bounding boxes bottom-up, gated by per-node atomic
//! counters instead of stored parent pointers.

use std::sync::atomic::{AtomicU32, Ordering};

use rayon::slice::ParallelSliceMut;

use crate::aabb::Aabb;
use crate::bvh::{Bvh, BvhNode, Child};
use crate::error::BuildError;
use crate::morton::code_for_point;
use crate::scheduler::{RayonScheduler, Scheduler, SerialScheduler, WorkDivision};
use crate::utils::SharedSlice;
use crate::BvhScalar;

/// Allocates an empty vector with room for `n` elements, surfacing allocation
/// failure as a build error instead of aborting.
fn try_with_capacity<X>(n: usize) -> Result<Vec<X>, BuildError> {
    let mut v = Vec::new();
    v.try_reserve_exact(n).map_err(|_| BuildError::OutOfMemory)?;
    Ok(v)
}

fn try_filled<X: Clone>(n: usize, value: X) -> Result<Vec<X>, BuildError> {
    let mut v = try_with_capacity(n)?;
    v.resize(n, value);
    Ok(v)
}

/// Length of the longest common prefix of the sort keys at slots `i` and `j`,
/// or -1 if `j` is outside the leaf range.
///
/// Equal Morton codes are disambiguated by treating the slot index as an
/// extension of the key, as if comparing `code * 2^64 + slot`. This keeps the
/// metric strictly decreasing with distance even when every primitive shares
/// one code, so ranges and splits stay well defined.
fn delta(codes: &[u64], i: usize, j: isize) -> i32 {
    if j < 0 || j >= codes.len() as isize {
        return -1;
    }
    let j = j as usize;
    if codes[i] == codes[j] {
        64 + ((i as u64) ^ (j as u64)).leading_zeros() as i32
    } else {
        (codes[i] ^ codes[j]).leading_zeros() as i32
    }
}

/// Determines the range `[first, last]` of leaf slots covered by internal
/// node `i` (Karras 2012, section 4).
fn determine_range(codes: &[u64], i: usize) -> (usize, usize) {
    let i = i as isize;

    // The range grows away from the neighbor with the shorter common prefix.
    let d: isize = if delta(codes, i as usize, i + 1) > delta(codes, i as usize, i - 1) {
        1
    } else {
        -1
    };
    let delta_min = delta(codes, i as usize, i - d);

    // Exponential probe for an upper bound on the range length, then binary
    // search for the exact other end.
    let mut l_max: isize = 2;
    while delta(codes, i as usize, i + l_max * d) > delta_min {
        l_max *= 2;
    }

    let mut l: isize = 0;
    let mut t = l_max / 2;
    while t >= 1 {
        if delta(codes, i as usize, i + (l + t) * d) > delta_min {
            l += t;
        }
        t /= 2;
    }

    let j = i + l * d;
    ((i.min(j)) as usize, (i.max(j)) as usize)
}

/// Finds the highest slot in `[first, last)` sharing the range's common
/// prefix; the node splits between `split` and `split + 1`.
fn find_split(codes: &[u64], first: usize, last: usize) -> usize {
    let common_prefix = delta(codes, first, last as isize);

    let mut split = first;
    let mut step = last - first;
    loop {
        step = (step + 1) / 2;
        let proposed = split + step;
        if proposed < last && delta(codes, first, proposed as isize) > common_prefix {
            split = proposed;
        }
        if step <= 1 {
            break;
        }
    }
    split
}

impl<T: BvhScalar> Bvh<T> {
    /// Builds a [`Bvh`] over `primitives` on the default (rayon) scheduler.
    ///
    /// `converter` maps a primitive to its bounding box; it must be pure and
    /// is invoked exactly once per primitive. The primitives themselves are
    /// neither copied nor reordered: the result refers to them through its
    /// permutation.
    ///
    /// # Errors
    ///
    /// [`BuildError::EmptyOrTrivial`] for fewer than two primitives;
    /// [`BuildError::OutOfMemory`] if a scratch or output allocation fails.
    /// On error nothing is retained.
    pub fn build<P, C>(primitives: &[P], converter: C) -> Result<Bvh<T>, BuildError>
    where
        P: Sync,
        C: Fn(&P) -> Aabb<T> + Sync,
    {
        Self::build_with_scheduler(primitives, converter, &RayonScheduler)
    }

    /// Builds a [`Bvh`] sequentially on the calling thread.
    pub fn build_serial<P, C>(primitives: &[P], converter: C) -> Result<Bvh<T>, BuildError>
    where
        P: Sync,
        C: Fn(&P) -> Aabb<T> + Sync,
    {
        Self::build_with_scheduler(primitives, converter, &SerialScheduler)
    }

    /// Builds a [`Bvh`] over `primitives`, fanning the per-primitive and
    /// per-node kernels out on `scheduler`.
    ///
    /// The result is identical for every scheduler and worker count: kernels
    /// write strictly partitioned index ranges, the sort key is totally
    /// ordered, and box unions are exact min/max arithmetic, so no phase
    /// depends on execution order.
    pub fn build_with_scheduler<P, C, S>(
        primitives: &[P],
        converter: C,
        scheduler: &S,
    ) -> Result<Bvh<T>, BuildError>
    where
        P: Sync,
        C: Fn(&P) -> Aabb<T> + Sync,
        S: Scheduler,
    {
        let n = primitives.len();
        if n < 2 {
            return Err(BuildError::EmptyOrTrivial);
        }

        // Phase 1: convert every primitive to its bounding box.
        let mut boxes: Vec<Aabb<T>> = try_with_capacity(n)?;
        {
            let cells = SharedSlice::uninit(&mut boxes.spare_capacity_mut()[..n]);
            scheduler.run(|div: WorkDivision| {
                for i in div.stride(n) {
                    // Safety: strided divisions write disjoint indices.
                    unsafe { cells.write(i, converter(&primitives[i])) };
                }
            });
        }
        // Safety: every index in [0, n) was written by exactly one division.
        unsafe { boxes.set_len(n) };

        // Phase 2: scene bounds. Union is exact, so the fold order does not
        // affect the result.
        let mut scene = Aabb::empty();
        for aabb in &boxes {
            scene.join_mut(aabb);
        }

        // Phase 3: Morton code of every centroid over the scene extent.
        let mut codes: Vec<u64> = try_with_capacity(n)?;
        {
            let cells = SharedSlice::uninit(&mut codes.spare_capacity_mut()[..n]);
            let boxes = &boxes;
            let scene = &scene;
            scheduler.run(|div: WorkDivision| {
                for i in div.stride(n) {
                    let code = code_for_point(scene, &boxes[i].center());
                    // Safety: strided divisions write disjoint indices.
                    unsafe { cells.write(i, code) };
                }
            });
        }
        // Safety: every index in [0, n) was written by exactly one division.
        unsafe { codes.set_len(n) };

        // Phase 4: sort leaf slots along the Morton curve. The key includes
        // the original index, which both makes the order total (duplicate
        // codes resolve to input order) and makes the parallel unstable sort
        // deterministic.
        let mut perm: Vec<u32> = try_with_capacity(n)?;
        perm.extend(0..n as u32);
        perm.par_sort_unstable_by_key(|&i| (codes[i as usize], i));

        let mut sorted_codes: Vec<u64> = try_with_capacity(n)?;
        sorted_codes.extend(perm.iter().map(|&i| codes[i as usize]));

        // Phase 5: emit the internal node topology. Every node is derived
        // independently from the sorted codes; parent links are recorded in
        // scratch for the bottom-up pass and are not part of the result.
        let mut nodes: Vec<BvhNode<T>> = try_with_capacity(n - 1)?;
        let mut parents: Vec<u32> = try_filled(n - 1, u32::MAX)?;
        let mut leaf_parents: Vec<u32> = try_filled(n, u32::MAX)?;
        {
            let node_cells = SharedSlice::uninit(&mut nodes.spare_capacity_mut()[..n - 1]);
            let parent_cells = SharedSlice::new(&mut parents);
            let leaf_parent_cells = SharedSlice::new(&mut leaf_parents);
            let codes = &sorted_codes;
            scheduler.run(|div: WorkDivision| {
                for i in div.stride(n - 1) {
                    let (first, last) = determine_range(codes, i);
                    let split = find_split(codes, first, last);

                    let left = if split == first {
                        Child::Leaf(split as u32)
                    } else {
                        Child::Node(split as u32)
                    };
                    let right = if split + 1 == last {
                        Child::Leaf((split + 1) as u32)
                    } else {
                        Child::Node((split + 1) as u32)
                    };

                    // Safety: node i is written only here; each child is the
                    // child of exactly one node, so its parent slot is too.
                    unsafe {
                        match left {
                            Child::Leaf(slot) => leaf_parent_cells.write(slot as usize, i as u32),
                            Child::Node(index) => parent_cells.write(index as usize, i as u32),
                        }
                        match right {
                            Child::Leaf(slot) => leaf_parent_cells.write(slot as usize, i as u32),
                            Child::Node(index) => parent_cells.write(index as usize, i as u32),
                        }
                        node_cells.write(i, BvhNode::new(Aabb::empty(), left, right));
                    }
                }
            });
        }
        // Safety: every index in [0, n - 1) was written by exactly one division.
        unsafe { nodes.set_len(n - 1) };

        // Phase 6: propagate boxes bottom-up. Every leaf walks towards the
        // root; the first arrival at a node parks, the second finds both
        // child boxes final, writes the union, and continues upward. The
        // release/acquire counter makes the children's writes visible to the
        // surviving walker.
        let counters = {
            let mut counters: Vec<AtomicU32> = try_with_capacity(n - 1)?;
            counters.resize_with(n - 1, || AtomicU32::new(0));
            counters
        };
        {
            let node_cells = SharedSlice::new(&mut nodes);
            let counters = &counters;
            let parents = &parents;
            let leaf_parents = &leaf_parents;
            let boxes = &boxes;
            let perm = &perm;

            // Safety (for all dereferences below): a node is read or written
            // only by the single walker that survived its counter, after both
            // children were finalized.
            let child_aabb = move |child: Child| -> Aabb<T> {
                match child {
                    Child::Leaf(slot) => boxes[perm[slot as usize] as usize],
                    Child::Node(index) => unsafe { node_cells.get(index as usize).aabb },
                }
            };

            scheduler.run(|div: WorkDivision| {
                for leaf in div.stride(n) {
                    let mut current = leaf_parents[leaf] as usize;
                    loop {
                        if counters[current].fetch_add(1, Ordering::AcqRel) == 0 {
                            break;
                        }
                        let node = unsafe { *node_cells.get(current) };
                        let aabb = child_aabb(node.left()).join(&child_aabb(node.right()));
                        unsafe {
                            node_cells.write(current, BvhNode::new(aabb, node.left(), node.right()))
                        };
                        if current == 0 {
                            break;
                        }
                        current = parents[current] as usize;
                    }
                }
            });
        }

        Ok(Bvh { nodes, perm })
    }
}
