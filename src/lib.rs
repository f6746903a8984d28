//! A crate which exports rays, axis-aligned bounding boxes, and a linear
//! bounding volume hierarchy (LBVH) with closest-hit ray queries.
//!
//! ## About
//!
//! This crate can be used for applications which contain intersection computations of rays
//! with primitives. For this purpose a binary tree BVH (Bounding Volume Hierarchy) is of great
//! use if the scene which the ray traverses contains a huge number of primitives. With a BVH the
//! intersection test complexity is reduced from O(n) to O(log2(n)) at the cost of building
//! the BVH once in advance.
//!
//! Unlike top-down builders, the hierarchy here is constructed bottom-up from a
//! Morton-code sort of the primitive centroids, in the manner of Karras' 2012
//! parallel LBVH algorithm. Every per-primitive phase of the build is expressed as
//! a data-parallel kernel over a [`scheduler::Scheduler`], so construction scales
//! with the available hardware while remaining bit-for-bit deterministic.
//!
//! The crate never takes ownership of the primitives themselves. A build borrows
//! them once to compute bounding boxes, and the emitted [`bvh::Bvh`] carries only
//! the node array and a permutation mapping sorted leaf slots back to the original
//! primitive indices.
//!
//! ## Example
//!
//! ```
//! use lbvh::aabb::Aabb;
//! use lbvh::bvh::{Bvh, Traverser};
//! use lbvh::ray::{Intersection, Ray};
//! use nalgebra::{Point3, Vector3};
//!
//! struct Sphere {
//!     center: Point3<f32>,
//!     radius: f32,
//! }
//!
//! let spheres: Vec<Sphere> = (0..1000)
//!     .map(|i| Sphere {
//!         center: Point3::new(i as f32, 0.0, 0.0),
//!         radius: 0.25,
//!     })
//!     .collect();
//!
//! let bvh = Bvh::build(&spheres, |s: &Sphere| {
//!     let half = Vector3::new(s.radius, s.radius, s.radius);
//!     Aabb::with_bounds(s.center - half, s.center + half)
//! })
//! .unwrap();
//!
//! let ray = Ray::new(Point3::new(-10.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
//! let traverser = Traverser::new(&bvh, &spheres);
//! let hit = traverser.traverse(&ray, |s: &Sphere, ray: &Ray<f32>| {
//!     // Any pure (primitive, ray) -> Intersection function works here.
//!     let to_center = s.center - ray.origin;
//!     let along = to_center.dot(&ray.direction);
//!     let closest_sq = to_center.norm_squared() - along * along;
//!     if along <= 0.0 || closest_sq > s.radius * s.radius {
//!         return Intersection::miss();
//!     }
//!     let half_chord = (s.radius * s.radius - closest_sq).sqrt();
//!     Intersection {
//!         distance: along - half_chord,
//!         ..Intersection::miss()
//!     }
//! });
//! assert!(hit.is_hit());
//! ```

#![deny(missing_docs)]

use nalgebra::{
    ClosedAddAssign, ClosedDivAssign, ClosedMulAssign, ClosedSubAssign, ComplexField, Scalar,
    SimdPartialOrd,
};
use num::{Float, FromPrimitive, Signed};

/// A trait which bundles the scalar bounds required by the build and traversal
/// arithmetic. It is blanket-implemented for every eligible floating-point type;
/// in practice the instantiations are `f32` and `f64`, which behave identically
/// up to precision.
pub trait BvhScalar:
    Scalar
    + Copy
    + Float
    + Signed
    + FromPrimitive
    + ClosedAddAssign
    + ClosedSubAssign
    + ClosedMulAssign
    + ClosedDivAssign
    + SimdPartialOrd
    + ComplexField
    + core::fmt::Display
    + Send
    + Sync
{
}

impl<T> BvhScalar for T where
    T: Scalar
        + Copy
        + Float
        + Signed
        + FromPrimitive
        + ClosedAddAssign
        + ClosedSubAssign
        + ClosedMulAssign
        + ClosedDivAssign
        + SimdPartialOrd
        + ComplexField
        + core::fmt::Display
        + Send
        + Sync
{
}

pub mod aabb;
pub mod bvh;
pub mod error;
pub mod morton;
pub mod ray;
pub mod scheduler;
mod utils;

#[cfg(test)]
mod testbase;
