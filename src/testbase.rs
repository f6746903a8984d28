//! Common utilities shared by unit tests.

use nalgebra::{Point3, Vector2, Vector3};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::aabb::Aabb;
use crate::ray::{Intersection, Ray};
use crate::BvhScalar;

/// A vector represented as a tuple
pub type TupleVec = (f32, f32, f32);

pub type TRay3 = Ray<f32>;
pub type TAabb3 = Aabb<f32>;
pub type TPoint3 = Point3<f32>;
pub type TVector3 = Vector3<f32>;

/// Generate a [`TupleVec`] for [`proptest::strategy::Strategy`] from -10e10 to 10e10
/// A small enough range to prevent most fp32 errors from breaking certain tests
pub fn tuplevec_small_strategy() -> impl Strategy<Value = TupleVec> {
    (
        -10e10_f32..10e10_f32,
        -10e10_f32..10e10_f32,
        -10e10_f32..10e10_f32,
    )
}

/// Convert a [`TupleVec`] to a [`TPoint3`].
pub fn tuple_to_point(tpl: &TupleVec) -> TPoint3 {
    TPoint3::new(tpl.0, tpl.1, tpl.2)
}

/// A triangle, the primitive used by most build and traversal tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle<T: BvhScalar = f32> {
    pub a: Point3<T>,
    pub b: Point3<T>,
    pub c: Point3<T>,
}

impl<T: BvhScalar> Triangle<T> {
    pub fn new(a: Point3<T>, b: Point3<T>, c: Point3<T>) -> Triangle<T> {
        Triangle { a, b, c }
    }

    /// A triangle whose bounding box is centered on `center` and scales
    /// symmetrically, so triangles of different sizes share one box center.
    pub fn centered(center: Point3<T>, scale: T) -> Triangle<T> {
        let one = T::one();
        let zero = T::zero();
        Triangle::new(
            center + Vector3::new(-one, -one, zero) * scale,
            center + Vector3::new(one, -one, zero) * scale,
            center + Vector3::new(zero, one, zero) * scale,
        )
    }

    /// The bounding box of the three vertices.
    pub fn aabb(&self) -> Aabb<T> {
        let min = self.a.coords.inf(&self.b.coords).inf(&self.c.coords);
        let max = self.a.coords.sup(&self.b.coords).sup(&self.c.coords);
        Aabb::with_bounds(Point3::from(min), Point3::from(max))
    }
}

impl Triangle<f32> {
    /// Widens the vertices to `f64` for cross-scalar comparisons.
    pub fn to_f64(&self) -> Triangle<f64> {
        let widen = |p: &Point3<f32>| Point3::new(p.x as f64, p.y as f64, p.z as f64);
        Triangle::new(widen(&self.a), widen(&self.b), widen(&self.c))
    }
}

/// Converter callable used by build tests.
pub fn triangle_aabb<T: BvhScalar>(triangle: &Triangle<T>) -> Aabb<T> {
    triangle.aabb()
}

/// Intersector callable used by traversal tests.
pub fn triangle_intersector<T: BvhScalar>(
    triangle: &Triangle<T>,
    ray: &Ray<T>,
) -> Intersection<T> {
    ray.intersects_triangle(&triangle.a, &triangle.b, &triangle.c)
}

/// One unit triangle per center, flat in the xy plane and facing +z, with a
/// bounding box spanning half a unit around the center on x and y.
pub fn disjoint_unit_triangles(centers: &[TPoint3]) -> Vec<Triangle> {
    centers
        .iter()
        .map(|center| {
            Triangle::new(
                center + TVector3::new(-0.5, -0.5, 0.0),
                center + TVector3::new(0.5, -0.5, 0.0),
                center + TVector3::new(-0.5, 0.5, 0.0),
            )
        })
        .collect()
}

/// Generates `n` small triangles with seeded random positions, together with
/// the bounding box of the whole scene.
pub fn build_random_triangles(n: usize, seed: u8) -> (Vec<Triangle>, TAabb3) {
    let mut rng = StdRng::from_seed([seed; 32]);
    let mut triangles = Vec::with_capacity(n);
    let mut scene = TAabb3::empty();

    for _ in 0..n {
        let center = TPoint3::new(
            rng.gen_range(-100.0f32..100.0),
            rng.gen_range(-100.0f32..100.0),
            rng.gen_range(-100.0f32..100.0),
        );
        let mut vertex = || {
            center
                + TVector3::new(
                    rng.gen_range(-2.0f32..2.0),
                    rng.gen_range(-2.0f32..2.0),
                    rng.gen_range(-2.0f32..2.0),
                )
        };
        let triangle = Triangle::new(vertex(), vertex(), vertex());
        scene.join_mut(&triangle.aabb());
        triangles.push(triangle);
    }

    (triangles, scene)
}

/// A grid of triangles with box centers on integer coordinates. With
/// power-of-two grid dimensions every centroid normalizes to an exactly
/// representable fraction of the scene extent, so `f32` and `f64` builds
/// quantize to identical Morton codes.
pub fn grid_triangles(nx: usize, ny: usize, nz: usize) -> Vec<Triangle> {
    let mut triangles = Vec::with_capacity(nx * ny * nz);
    for z in 0..nz {
        for y in 0..ny {
            for x in 0..nx {
                let center = TPoint3::new(x as f32, y as f32, z as f32);
                triangles.push(Triangle::new(
                    center + TVector3::new(-0.5, -0.5, -0.5),
                    center + TVector3::new(0.5, -0.5, 0.5),
                    center + TVector3::new(0.0, 0.5, 0.0),
                ));
            }
        }
    }
    triangles
}

/// An axis-independent quad primitive, used to exercise the intersector
/// contract with a non-triangle shape.
#[derive(Debug, Clone, Copy)]
pub struct Quad {
    pub corner: TPoint3,
    pub edge_u: TVector3,
    pub edge_v: TVector3,
}

impl Quad {
    /// A unit quad in the plane `z = z`, facing +z.
    pub fn axis_aligned_z(z: f32) -> Quad {
        Quad {
            corner: TPoint3::new(-0.5, -0.5, z),
            edge_u: TVector3::new(1.0, 0.0, 0.0),
            edge_v: TVector3::new(0.0, 1.0, 0.0),
        }
    }
}

/// Converter callable for [`Quad`]s.
pub fn quad_aabb(quad: &Quad) -> TAabb3 {
    TAabb3::empty()
        .grow(&quad.corner)
        .grow(&(quad.corner + quad.edge_u))
        .grow(&(quad.corner + quad.edge_v))
        .grow(&(quad.corner + quad.edge_u + quad.edge_v))
}

/// Intersector callable for [`Quad`]s: ray/plane intersection followed by an
/// in-bounds test against the quad's edges.
pub fn quad_intersector(quad: &Quad, ray: &TRay3) -> Intersection<f32> {
    let normal = quad.edge_u.cross(&quad.edge_v);
    let denom = normal.dot(&ray.direction);
    if denom.abs() < f32::EPSILON {
        return Intersection::miss();
    }

    let distance = normal.dot(&(quad.corner - ray.origin)) / denom;
    if distance <= f32::EPSILON {
        return Intersection::miss();
    }

    let local = (ray.origin + ray.direction * distance) - quad.corner;
    let u = local.dot(&quad.edge_u) / quad.edge_u.norm_squared();
    let v = local.dot(&quad.edge_v) / quad.edge_v.norm_squared();
    if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
        return Intersection::miss();
    }

    Intersection {
        distance,
        normal: normal.normalize(),
        uv: Vector2::new(u, v),
        primitive_index: 0,
    }
}
