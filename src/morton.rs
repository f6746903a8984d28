//! Morton encoding of primitive centroids.
//!
//! The builder sorts primitives along a Z-order (Morton) curve before
//! assembling the tree. Each centroid is normalized against the scene bounds,
//! quantized to 21 bits per axis, and bit-interleaved into a 63-bit code.
//! The encoding is pure bit arithmetic on already-quantized integers, so it
//! is deterministic and endian-independent.

use nalgebra::Point3;

use crate::aabb::Aabb;
use crate::BvhScalar;

/// Quantization resolution per axis: 21 bits, so three axes fit a `u64`.
const MORTON_BITS: u32 = 21;

/// Largest quantized coordinate, `2^21 - 1`.
const MORTON_MAX: u64 = (1 << MORTON_BITS) - 1;

/// Spreads the low 21 bits of `v` so that each bit is followed by two zero
/// bits, making room for the two other axes.
#[inline]
fn expand_bits(v: u64) -> u64 {
    let mut x = v & MORTON_MAX;
    x = (x | (x << 32)) & 0x001F_0000_0000_FFFF;
    x = (x | (x << 16)) & 0x001F_0000_FF00_00FF;
    x = (x | (x << 8)) & 0x100F_00F0_0F00_F00F;
    x = (x | (x << 4)) & 0x10C3_0C30_C30C_30C3;
    x = (x | (x << 2)) & 0x1249_2492_4924_9249;
    x
}

/// Interleaves three quantized axis values into a 63-bit Morton code.
/// Inputs are clamped to `2^21 - 1`; bit 63 of the result is always zero.
#[inline]
pub fn morton_code(x: u64, y: u64, z: u64) -> u64 {
    expand_bits(x.min(MORTON_MAX))
        | (expand_bits(y.min(MORTON_MAX)) << 1)
        | (expand_bits(z.min(MORTON_MAX)) << 2)
}

/// Computes the Morton code of a point relative to the scene bounds.
///
/// Each axis is mapped to `[0, 1]` over the scene extent and clamped, so
/// centroids that drift marginally outside the bounds (or lie exactly on
/// them) still quantize into range; a point on the upper boundary quantizes
/// to `2^21 - 1`. Axes along which the scene has no extent map to zero.
pub fn code_for_point<T: BvhScalar>(scene: &Aabb<T>, p: &Point3<T>) -> u64 {
    let extent = scene.size();
    let scale = T::from_u64(1 << MORTON_BITS).unwrap();

    let mut quantized = [0u64; 3];
    for (axis, q) in quantized.iter_mut().enumerate() {
        if extent[axis] > T::zero() {
            let t = (p[axis] - scene.min[axis]) / extent[axis];
            let t = t.max(T::zero()).min(T::one());
            *q = (t * scale).to_u64().unwrap_or(0).min(MORTON_MAX);
        }
    }

    morton_code(quantized[0], quantized[1], quantized[2])
}
