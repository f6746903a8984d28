//! This module defines a Ray structure, the intersection record returned by
//! queries, and intersection algorithms for axis aligned bounding boxes and
//! triangles.

use nalgebra::{Point3, Vector2, Vector3};

use crate::aabb::Aabb;
use crate::utils::{fast_max, has_nan};
use crate::BvhScalar;

/// A struct which defines a ray and some of its cached values.
#[derive(Debug, Clone, Copy)]
pub struct Ray<T: BvhScalar> {
    /// The ray origin.
    pub origin: Point3<T>,

    /// The ray direction. Assumed to be unit length by the caller; it is
    /// never re-normalized here.
    pub direction: Vector3<T>,

    /// Inverse (1/x) ray direction. Cached for use in [`Aabb`] intersections.
    /// Components of the direction that are zero invert to infinities.
    pub inv_direction: Vector3<T>,
}

/// The result of intersecting a primitive with a [`Ray`].
///
/// A miss is represented by a `distance` of positive infinity; every other
/// field of a miss is unspecified. Intersector callables return this type,
/// and the traverser reports the closest hit with `primitive_index` rewritten
/// to the original (pre-sort) index of the primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection<T: BvhScalar> {
    /// Distance from the ray origin to the intersection point.
    pub distance: T,

    /// Surface normal at the intersection point.
    pub normal: Vector3<T>,

    /// Texture coordinates at the intersection point.
    pub uv: Vector2<T>,

    /// Index of the intersected primitive.
    pub primitive_index: u32,
}

impl<T: BvhScalar> Intersection<T> {
    /// Constructs the miss sentinel: infinite distance, zeroed geometry.
    pub fn miss() -> Intersection<T> {
        Intersection {
            distance: T::infinity(),
            normal: Vector3::zeros(),
            uv: Vector2::zeros(),
            primitive_index: 0,
        }
    }

    /// Returns `true` if this intersection represents a hit.
    pub fn is_hit(&self) -> bool {
        self.distance < T::infinity()
    }
}

impl<T: BvhScalar> Default for Intersection<T> {
    fn default() -> Intersection<T> {
        Intersection::miss()
    }
}

impl<T: BvhScalar> Ray<T> {
    /// Creates a new [`Ray`] from an `origin` and a `direction`. The caller
    /// is responsible for supplying a unit-length direction; queries report
    /// distances in multiples of its length.
    ///
    /// # Examples
    /// ```
    /// use lbvh::ray::Ray;
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let origin = Point3::new(0.0, 0.0, 0.0);
    /// let direction = Vector3::new(1.0, 0.0, 0.0);
    /// let ray = Ray::new(origin, direction);
    ///
    /// assert_eq!(ray.origin, origin);
    /// assert_eq!(ray.direction, direction);
    /// ```
    pub fn new(origin: Point3<T>, direction: Vector3<T>) -> Ray<T> {
        Ray {
            origin,
            direction,
            inv_direction: direction.map(|x| T::one() / x),
        }
    }

    /// Tests the intersection of this [`Ray`] with an [`Aabb`] using the slab
    /// method, in the robust formulation that survives axis-parallel rays and
    /// signed zeros. Returns the entry and exit distances `(t_near, t_far)`
    /// on a hit, with `t_near` clamped to zero for origins inside the box.
    ///
    /// A NaN arising from `0 * inf` on an axis-parallel ray whose origin lies
    /// exactly in the plane of a box face is treated as a consistent miss, so
    /// the result never depends on which axes produced the NaN.
    ///
    /// # Examples
    /// ```
    /// use lbvh::aabb::Aabb;
    /// use lbvh::ray::Ray;
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let origin = Point3::new(0.0, 0.0, 0.0);
    /// let direction = Vector3::new(1.0, 0.0, 0.0);
    /// let ray = Ray::new(origin, direction);
    ///
    /// let point1 = Point3::new(99.9, -1.0, -1.0);
    /// let point2 = Point3::new(100.1, 1.0, 1.0);
    /// let aabb = Aabb::with_bounds(point1, point2);
    ///
    /// let (t_near, t_far) = ray.intersects_aabb(&aabb).unwrap();
    /// assert!(t_near <= 100.0 && 100.0 <= t_far);
    /// ```
    pub fn intersects_aabb(&self, aabb: &Aabb<T>) -> Option<(T, T)> {
        let lbr = (aabb.min.coords - self.origin.coords).component_mul(&self.inv_direction);
        let rtr = (aabb.max.coords - self.origin.coords).component_mul(&self.inv_direction);

        if has_nan(&lbr) | has_nan(&rtr) {
            // The ray is in the plane of an AABB face. Be consistent and
            // consider this a non-intersection. This avoids making the result
            // depend on which axis/axes have NaN (min/max in the code that
            // follows are not commutative).
            return None;
        }

        let (inf, sup) = lbr.inf_sup(&rtr);

        let t_near = fast_max(inf.max(), T::zero());
        let t_far = sup.min();

        (t_near <= t_far).then_some((t_near, t_far))
    }

    /// Implementation of the
    /// [Möller-Trumbore triangle/ray intersection algorithm](https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm).
    /// A convenience kernel for intersector callables over triangle meshes;
    /// the traverser itself makes no assumption about primitive shape.
    ///
    /// Returns a miss if the ray does not intersect the triangle or hits it
    /// from behind (backfaces are culled). On a hit, `uv` carries the
    /// barycentric coordinates of the hit point and `normal` the unit
    /// geometric normal; `primitive_index` is left at zero for the traverser
    /// to fill in.
    #[allow(clippy::many_single_char_names)]
    pub fn intersects_triangle(
        &self,
        a: &Point3<T>,
        b: &Point3<T>,
        c: &Point3<T>,
    ) -> Intersection<T> {
        let a_to_b = *b - *a;
        let a_to_c = *c - *a;

        // Begin calculating determinant - also used to calculate u parameter
        // u_vec lies in view plane
        // length of a_to_c in view_plane = |u_vec| = |a_to_c|*sin(a_to_c, dir)
        let u_vec = self.direction.cross(&a_to_c);

        // If determinant is near zero, ray lies in plane of triangle
        // The determinant corresponds to the parallelepiped volume:
        // det = 0 => [dir, a_to_b, a_to_c] not linearly independant
        let det = a_to_b.dot(&u_vec);

        // Only testing positive bound, thus enabling backface culling
        // If backface culling is not desired write:
        // det < EPSILON && det > -EPSILON
        if det < T::epsilon() {
            return Intersection::miss();
        }

        let inv_det = T::one() / det;

        // Vector from point a to ray origin
        let a_to_origin = self.origin - *a;

        // Calculate u parameter
        let u = a_to_origin.dot(&u_vec) * inv_det;

        // Test bounds: u < 0 || u > 1 => outside of triangle
        if !(T::zero()..=T::one()).contains(&u) {
            return Intersection::miss();
        }

        // Prepare to test v parameter
        let v_vec = a_to_origin.cross(&a_to_b);

        // Calculate v parameter and test bound
        let v = self.direction.dot(&v_vec) * inv_det;
        // The intersection lies outside of the triangle
        if v < T::zero() || u + v > T::one() {
            return Intersection::miss();
        }

        let dist = a_to_c.dot(&v_vec) * inv_det;

        if dist > T::epsilon() {
            Intersection {
                distance: dist,
                normal: a_to_b.cross(&a_to_c).normalize(),
                uv: Vector2::new(u, v),
                primitive_index: 0,
            }
        } else {
            Intersection::miss()
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use crate::testbase::{
        tuple_to_point, tuplevec_small_strategy, TAabb3, TPoint3, TRay3, TVector3, TupleVec,
    };

    /// Generates a random [`TRay3`] which points at a random [`TAabb3`].
    fn gen_ray_to_aabb(data: (TupleVec, TupleVec, TupleVec)) -> (TRay3, TAabb3) {
        // Generate a random `Aabb`
        let aabb = TAabb3::empty()
            .grow(&tuple_to_point(&data.0))
            .grow(&tuple_to_point(&data.1));

        // Get its center
        let center = aabb.center();

        // Generate random ray pointing at the center
        let pos = tuple_to_point(&data.2);
        let ray = TRay3::new(pos, (center - pos).normalize());
        (ray, aabb)
    }

    /// Make sure a ray can intersect an AABB with no depth.
    #[test]
    fn test_ray_hits_zero_depth_aabb() {
        let origin = TPoint3::new(0.0, 0.0, 0.0);
        let direction = TVector3::new(0.0, 0.0, 1.0);
        let ray = TRay3::new(origin, direction);
        let min = TPoint3::new(-1.0, -1.0, 1.0);
        let max = TPoint3::new(1.0, 1.0, 1.0);
        let aabb = TAabb3::with_bounds(min, max);

        let (t_near, t_far) = ray.intersects_aabb(&aabb).unwrap();
        assert_eq!(t_near, 1.0);
        assert_eq!(t_far, 1.0);
    }

    /// The entry distance is clamped to zero when the origin is inside the box.
    #[test]
    fn test_entry_distance_clamped_for_inner_origin() {
        let ray = TRay3::new(TPoint3::new(0.0, 0.0, 0.0), TVector3::new(1.0, 0.0, 0.0));
        let aabb = TAabb3::with_bounds(TPoint3::new(-1.0, -1.0, -1.0), TPoint3::new(1.0, 1.0, 1.0));

        let (t_near, t_far) = ray.intersects_aabb(&aabb).unwrap();
        assert_eq!(t_near, 0.0);
        assert_eq!(t_far, 1.0);
    }

    /// An axis-parallel ray outside the slab of that axis must miss, even
    /// though two of its inverse direction components are infinite.
    #[test]
    fn test_parallel_ray_outside_slab_misses() {
        let ray = TRay3::new(TPoint3::new(0.0, 2.0, 0.0), TVector3::new(1.0, 0.0, 0.0));
        let aabb = TAabb3::with_bounds(TPoint3::new(-1.0, -1.0, -1.0), TPoint3::new(1.0, 1.0, 1.0));
        assert!(ray.intersects_aabb(&aabb).is_none());
    }

    /// A ray lying exactly in the plane of a box face produces NaNs in the
    /// slab arithmetic; the test treats it as a consistent miss.
    #[test]
    fn test_ray_in_face_plane_is_consistent_miss() {
        let aabb = TAabb3::with_bounds(TPoint3::new(-1.0, -1.0, -1.0), TPoint3::new(1.0, 1.0, 1.0));
        let on_min_face = TRay3::new(TPoint3::new(-1.0, 0.0, 0.0), TVector3::new(0.0, 1.0, 0.0));
        let on_max_face = TRay3::new(TPoint3::new(1.0, 0.0, 0.0), TVector3::new(0.0, 1.0, 0.0));

        assert!(on_min_face.intersects_aabb(&aabb).is_none());
        assert!(on_max_face.intersects_aabb(&aabb).is_none());
    }

    #[test]
    fn test_triangle_hit_straight_on() {
        let a = TPoint3::new(-1.0, -1.0, 0.0);
        let b = TPoint3::new(1.0, -1.0, 0.0);
        let c = TPoint3::new(0.0, 1.0, 0.0);
        let ray = TRay3::new(TPoint3::new(0.0, 0.0, 5.0), TVector3::new(0.0, 0.0, -1.0));

        let hit = ray.intersects_triangle(&a, &b, &c);
        assert!(hit.is_hit());
        assert_eq!(hit.distance, 5.0);
        assert_eq!(hit.normal, TVector3::new(0.0, 0.0, 1.0));
    }

    /// An oblique hit whose distance is irrational stays within float
    /// tolerance of the analytic value.
    #[test]
    fn test_triangle_hit_diagonal() {
        let a = TPoint3::new(-5.0, -5.0, 0.0);
        let b = TPoint3::new(5.0, -5.0, 0.0);
        let c = TPoint3::new(0.0, 5.0, 0.0);
        let direction = TVector3::new(1.0, 0.0, -1.0).normalize();
        let ray = TRay3::new(TPoint3::new(-5.0, 0.0, 5.0), direction);

        // The ray reaches the plane z = 0 at (0, 0, 0), a distance of
        // sqrt(50) from its origin.
        let hit = ray.intersects_triangle(&a, &b, &c);
        assert!(hit.is_hit());
        assert_relative_eq!(hit.distance, 50.0f32.sqrt(), max_relative = 1e-6);
        assert_relative_eq!(hit.normal, TVector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    /// The winding that faces away from the ray is culled.
    fn test_triangle_backface_culled() {
        let a = TPoint3::new(-1.0, -1.0, 0.0);
        let b = TPoint3::new(1.0, -1.0, 0.0);
        let c = TPoint3::new(0.0, 1.0, 0.0);
        let ray = TRay3::new(TPoint3::new(0.0, 0.0, 5.0), TVector3::new(0.0, 0.0, -1.0));

        // Swap two vertices to flip the winding.
        let hit = ray.intersects_triangle(&b, &a, &c);
        assert!(!hit.is_hit());
    }

    proptest! {
        // Test whether a `Ray` which points at the center of an `Aabb` intersects it.
        #[test]
        fn test_ray_points_at_aabb_center(data in (tuplevec_small_strategy(),
                                                   tuplevec_small_strategy(),
                                                   tuplevec_small_strategy())) {
            let (ray, aabb) = gen_ray_to_aabb(data);
            prop_assume!(!aabb.contains(&ray.origin));
            prop_assume!(ray.direction.norm_squared() > 0.0);
            prop_assert!(ray.intersects_aabb(&aabb).is_some());
        }

        // Test whether a `Ray` which points away from the center of an `Aabb`
        // does not intersect it, unless its origin is inside the `Aabb`.
        #[test]
        fn test_ray_points_from_aabb_center(data in (tuplevec_small_strategy(),
                                                     tuplevec_small_strategy(),
                                                     tuplevec_small_strategy())) {
            let (mut ray, aabb) = gen_ray_to_aabb(data);

            // Invert the direction of the ray
            ray.direction = -ray.direction;
            ray.inv_direction = -ray.inv_direction;
            prop_assert!(ray.intersects_aabb(&aabb).is_none() || aabb.contains(&ray.origin));
        }

        // The reported entry distance is never negative and never exceeds the
        // exit distance.
        #[test]
        fn test_slab_distances_ordered(data in (tuplevec_small_strategy(),
                                                tuplevec_small_strategy(),
                                                tuplevec_small_strategy())) {
            let (ray, aabb) = gen_ray_to_aabb(data);
            if let Some((t_near, t_far)) = ray.intersects_aabb(&aabb) {
                prop_assert!(t_near >= 0.0);
                prop_assert!(t_near <= t_far);
            }
        }
    }
}
