//! Hash-based randomness and curl noise on the CPU.
//!
//! Mirrors the shader-side functions in [`crate::shader_utils`] so the CPU
//! and GPU engines sample the same fields: the integer hash is bit-identical
//! to the WGSL `hash`, and `value_noise3`/`curl3` use the same lattice and
//! finite-difference construction as the kernel. Curl is divergence-free by
//! construction (mixed partials cancel), which keeps the turbulence from
//! compressing or thinning the cloud.

use glam::Vec3;

/// Hash a u32 to a pseudo-random u32.
///
/// Same mixing chain as the WGSL `hash`, so slot-derived draws agree across
/// the CPU and GPU paths.
#[inline]
pub fn hash(n: u32) -> u32 {
    let mut x = n;
    x ^= x >> 17;
    x = x.wrapping_mul(0xed5ad4bb);
    x ^= x >> 11;
    x = x.wrapping_mul(0xac4c1b51);
    x ^= x >> 15;
    x = x.wrapping_mul(0x31848bab);
    x ^= x >> 14;
    x
}

/// Hash a 3D lattice coordinate.
#[inline]
fn hash3(x: u32, y: u32, z: u32) -> u32 {
    hash(x.wrapping_add(hash(y.wrapping_add(hash(z)))))
}

/// Random float in [0, 1) from a seed.
#[inline]
pub fn rand_f32(seed: u32) -> f32 {
    hash(seed) as f32 / 4294967295.0
}

/// Random float in [min, max) from a seed.
#[inline]
pub fn rand_range(seed: u32, min_val: f32, max_val: f32) -> f32 {
    min_val + rand_f32(seed) * (max_val - min_val)
}

/// Random direction vector with components in [-1, 1).
#[inline]
pub fn rand_vec3(seed: u32) -> Vec3 {
    Vec3::new(
        rand_f32(seed) * 2.0 - 1.0,
        rand_f32(seed.wrapping_add(1)) * 2.0 - 1.0,
        rand_f32(seed.wrapping_add(2)) * 2.0 - 1.0,
    )
}

/// Quintic fade, C2-continuous so curl derivatives stay smooth.
#[inline]
fn fade(t: f32) -> f32 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lattice(x: i32, y: i32, z: i32) -> f32 {
    rand_f32(hash3(x as u32, y as u32, z as u32)) * 2.0 - 1.0
}

/// 3D value noise in [-1, 1], trilinear over a unit lattice.
pub fn value_noise3(p: Vec3) -> f32 {
    let base = p.floor();
    let (xi, yi, zi) = (base.x as i32, base.y as i32, base.z as i32);
    let f = p - base;
    let (u, v, w) = (fade(f.x), fade(f.y), fade(f.z));

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

    let x00 = lerp(lattice(xi, yi, zi), lattice(xi + 1, yi, zi), u);
    let x10 = lerp(lattice(xi, yi + 1, zi), lattice(xi + 1, yi + 1, zi), u);
    let x01 = lerp(lattice(xi, yi, zi + 1), lattice(xi + 1, yi, zi + 1), u);
    let x11 = lerp(lattice(xi, yi + 1, zi + 1), lattice(xi + 1, yi + 1, zi + 1), u);

    lerp(lerp(x00, x10, v), lerp(x01, x11, v), w)
}

/// Curl of a noise vector potential via central differences.
///
/// Twelve taps over three offset channels, one channel per potential
/// component. Central differences commute, so the numerical divergence
/// cancels exactly and the turbulence neither compresses nor thins the
/// cloud.
pub fn curl3(p: Vec3, eps: f32) -> Vec3 {
    let dx = Vec3::new(eps, 0.0, 0.0);
    let dy = Vec3::new(0.0, eps, 0.0);
    let dz = Vec3::new(0.0, 0.0, eps);
    let off_x = Vec3::new(100.0, 0.0, 0.0);
    let off_y = Vec3::new(0.0, 100.0, 0.0);
    let off_z = Vec3::new(0.0, 0.0, 100.0);

    // d(pot_z)/dy - d(pot_y)/dz, then cyclic.
    let x = (value_noise3(p + dy + off_z) - value_noise3(p - dy + off_z))
        - (value_noise3(p + dz + off_y) - value_noise3(p - dz + off_y));
    let y = (value_noise3(p + dz + off_x) - value_noise3(p - dz + off_x))
        - (value_noise3(p + dx + off_z) - value_noise3(p - dx + off_z));
    let z = (value_noise3(p + dx + off_y) - value_noise3(p - dx + off_y))
        - (value_noise3(p + dy + off_x) - value_noise3(p - dy + off_x));
    Vec3::new(x, y, z) / (2.0 * eps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash(42), hash(42));
        assert_ne!(hash(42), hash(43));
    }

    #[test]
    fn test_rand_range_bounds() {
        for seed in 0..1000 {
            let r = rand_f32(seed);
            assert!((0.0..1.0).contains(&r));
            let r = rand_range(seed, -5.0, 5.0);
            assert!((-5.0..5.0).contains(&r));
        }
    }

    #[test]
    fn test_noise_bounded_and_deterministic() {
        for i in 0..200 {
            let p = rand_vec3(i * 31) * 40.0;
            let n = value_noise3(p);
            assert!(n.abs() <= 1.0 + 1e-5, "noise out of range at {p:?}: {n}");
            assert_eq!(n.to_bits(), value_noise3(p).to_bits());
        }
    }

    #[test]
    fn test_noise_continuous() {
        // Small steps in position produce small steps in value.
        let p = Vec3::new(3.7, -1.2, 8.9);
        let a = value_noise3(p);
        let b = value_noise3(p + Vec3::splat(1e-3));
        assert!((a - b).abs() < 0.05);
    }

    #[test]
    fn test_curl_divergence_free() {
        // Central differences commute, so the numerical divergence of the
        // curl field (sampled at the same eps) cancels to float precision.
        let eps = 0.25;
        for i in 0..50 {
            let p = rand_vec3(i * 977 + 13) * 30.0;
            let dx = Vec3::new(eps, 0.0, 0.0);
            let dy = Vec3::new(0.0, eps, 0.0);
            let dz = Vec3::new(0.0, 0.0, eps);
            let div = (curl3(p + dx, eps).x - curl3(p - dx, eps).x
                + curl3(p + dy, eps).y - curl3(p - dy, eps).y
                + curl3(p + dz, eps).z - curl3(p - dz, eps).z)
                / (2.0 * eps);
            assert!(div.abs() < 1e-2, "divergence {div} at {p:?}");
        }
    }

    #[test]
    fn test_curl_varies_in_space() {
        let a = curl3(Vec3::ZERO, 0.25);
        let b = curl3(Vec3::new(7.3, 2.1, -4.8), 0.25);
        assert!((a - b).length() > 1e-4);
    }
}
