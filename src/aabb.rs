//! Axis Aligned Bounding Boxes.

use std::fmt;

use nalgebra::{Point3, Vector3};

use crate::BvhScalar;

/// A 3D axis-aligned bounding box, defined by its minimum and maximum corners.
///
/// After construction `min[a] <= max[a]` holds on every axis for non-empty
/// boxes. Boxes with zero extent on one or more axes are legal; they arise
/// naturally from flat geometry such as axis-aligned quads.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb<T: BvhScalar> {
    /// Minimum coordinates.
    pub min: Point3<T>,

    /// Maximum coordinates.
    pub max: Point3<T>,
}

impl<T: BvhScalar> Aabb<T> {
    /// Creates a new [`Aabb`] with the given bounds.
    ///
    /// # Examples
    /// ```
    /// use lbvh::aabb::Aabb;
    /// use nalgebra::Point3;
    ///
    /// let aabb = Aabb::with_bounds(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
    /// assert_eq!(aabb.min.x, -1.0);
    /// assert_eq!(aabb.max.x, 1.0);
    /// ```
    pub fn with_bounds(min: Point3<T>, max: Point3<T>) -> Aabb<T> {
        Aabb { min, max }
    }

    /// Creates a new empty [`Aabb`], the identity under [`Aabb::join`]: its
    /// minimum is positive infinity and its maximum is negative infinity on
    /// every axis, so joining any box into it yields that box unchanged.
    pub fn empty() -> Aabb<T> {
        Aabb {
            min: Point3::new(T::infinity(), T::infinity(), T::infinity()),
            max: Point3::new(T::neg_infinity(), T::neg_infinity(), T::neg_infinity()),
        }
    }

    /// Returns `true` if this [`Aabb`] is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Returns the union of this box and `other`, computed component-wise on
    /// the bounds. Joins involve no rounding, so nested joins are exact.
    pub fn join(&self, other: &Aabb<T>) -> Aabb<T> {
        Aabb {
            min: Point3::from(self.min.coords.inf(&other.min.coords)),
            max: Point3::from(self.max.coords.sup(&other.max.coords)),
        }
    }

    /// Joins `other` into this box in place.
    pub fn join_mut(&mut self, other: &Aabb<T>) {
        *self = self.join(other);
    }

    /// Returns the smallest box containing both this box and the point `p`.
    pub fn grow(&self, p: &Point3<T>) -> Aabb<T> {
        Aabb {
            min: Point3::from(self.min.coords.inf(&p.coords)),
            max: Point3::from(self.max.coords.sup(&p.coords)),
        }
    }

    /// Grows this box to contain the point `p`, in place.
    pub fn grow_mut(&mut self, p: &Point3<T>) {
        *self = self.grow(p);
    }

    /// Returns the center of the box.
    pub fn center(&self) -> Point3<T> {
        Point3::from((self.min.coords + self.max.coords) * T::from_f32(0.5).unwrap())
    }

    /// Returns the per-axis extent of the box.
    pub fn size(&self) -> Vector3<T> {
        self.max - self.min
    }

    /// Returns `true` if `p` lies inside the box. The test is inclusive on
    /// all bounds.
    ///
    /// # Examples
    /// ```
    /// use lbvh::aabb::Aabb;
    /// use nalgebra::Point3;
    ///
    /// let aabb = Aabb::with_bounds(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
    /// assert!(aabb.contains(&Point3::new(1.0, 0.5, 0.0)));
    /// assert!(!aabb.contains(&Point3::new(1.1, 0.5, 0.0)));
    /// ```
    pub fn contains(&self, p: &Point3<T>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Returns `true` if `other` lies entirely inside this box, inclusive on
    /// all bounds. Since joins are exact this is an exact test as well.
    pub fn contains_aabb(&self, other: &Aabb<T>) -> bool {
        (0..3).all(|i| other.min[i] >= self.min[i] && other.max[i] <= self.max[i])
    }
}

impl<T: BvhScalar> Default for Aabb<T> {
    fn default() -> Aabb<T> {
        Aabb::empty()
    }
}

impl<T: BvhScalar> fmt::Display for Aabb<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Min bound: {}; Max bound: {}", self.min, self.max)
    }
}
