//! Built-in WGSL functions shared by the compute kernels.
//!
//! Everything here mirrors a CPU-side function exactly: the integer hash is
//! bit-identical to [`crate::noise::hash`], and the noise, curl, and shape
//! formulas are transliterations of [`crate::noise`] and [`crate::shape`].
//! Keeping the two sides in lockstep is what lets the kernel re-derive
//! targets every frame without shimmer, and lets CPU tests stand in for
//! kernel math.
//!
//! # Available Functions
//!
//! ## Random & Hash
//! - `hash(n: u32) -> u32` - Hash a u32 to pseudo-random u32
//! - `hash3(p: vec3<u32>) -> u32` - Hash a 3D coordinate to pseudo-random u32
//! - `rand(seed: u32) -> f32` - Random float in [0, 1)
//! - `rand_range(seed: u32, min_val: f32, max_val: f32) -> f32` - Random float in range
//!
//! ## Noise
//! - `noise3(p: vec3<f32>) -> f32` - 3D value noise in [-1, 1]
//! - `curl3(p: vec3<f32>, eps: f32) -> vec3<f32>` - Divergence-free curl field
//!
//! ## Shapes
//! - `shape_target(shape_id: u32, slot: u32) -> vec3<f32>` - Procedural target position
//! - `singularity_seed(slot: u32) -> vec3<f32>` - Initial big-bang position

/// WGSL code for random/hash functions.
pub const RANDOM_WGSL: &str = r#"
// Hash functions for pseudo-random number generation
fn hash(n: u32) -> u32 {
    var x = n;
    x = x ^ (x >> 17u);
    x = x * 0xed5ad4bbu;
    x = x ^ (x >> 11u);
    x = x * 0xac4c1b51u;
    x = x ^ (x >> 15u);
    x = x * 0x31848babu;
    x = x ^ (x >> 14u);
    return x;
}

fn hash3(p: vec3<u32>) -> u32 {
    return hash(p.x + hash(p.y + hash(p.z)));
}

// Random float in [0, 1)
fn rand(seed: u32) -> f32 {
    return f32(hash(seed)) / 4294967295.0;
}

// Random float in [min, max)
fn rand_range(seed: u32, min_val: f32, max_val: f32) -> f32 {
    return min_val + rand(seed) * (max_val - min_val);
}
"#;

/// WGSL code for value noise and the curl field.
pub const NOISE_WGSL: &str = r#"
// Quintic fade keeps curl derivatives smooth across lattice cells
fn fade(t: f32) -> f32 {
    return t * t * t * (t * (t * 6.0 - 15.0) + 10.0);
}

fn lattice(x: i32, y: i32, z: i32) -> f32 {
    return rand(hash3(vec3<u32>(u32(x), u32(y), u32(z)))) * 2.0 - 1.0;
}

// 3D value noise in [-1, 1], trilinear over a unit lattice
fn noise3(p: vec3<f32>) -> f32 {
    let cell = floor(p);
    let xi = i32(cell.x);
    let yi = i32(cell.y);
    let zi = i32(cell.z);
    let f = p - cell;
    let u = fade(f.x);
    let v = fade(f.y);
    let w = fade(f.z);

    let x00 = mix(lattice(xi, yi, zi), lattice(xi + 1, yi, zi), u);
    let x10 = mix(lattice(xi, yi + 1, zi), lattice(xi + 1, yi + 1, zi), u);
    let x01 = mix(lattice(xi, yi, zi + 1), lattice(xi + 1, yi, zi + 1), u);
    let x11 = mix(lattice(xi, yi + 1, zi + 1), lattice(xi + 1, yi + 1, zi + 1), u);

    return mix(mix(x00, x10, v), mix(x01, x11, v), w);
}

// Curl of a noise vector potential via central differences, one offset
// channel per component. Divergence-free: central differences commute,
// so the mixed partials cancel exactly.
fn curl3(p: vec3<f32>, eps: f32) -> vec3<f32> {
    let dx = vec3<f32>(eps, 0.0, 0.0);
    let dy = vec3<f32>(0.0, eps, 0.0);
    let dz = vec3<f32>(0.0, 0.0, eps);
    let off_x = vec3<f32>(100.0, 0.0, 0.0);
    let off_y = vec3<f32>(0.0, 100.0, 0.0);
    let off_z = vec3<f32>(0.0, 0.0, 100.0);

    let x = (noise3(p + dy + off_z) - noise3(p - dy + off_z))
        - (noise3(p + dz + off_y) - noise3(p - dz + off_y));
    let y = (noise3(p + dz + off_x) - noise3(p - dz + off_x))
        - (noise3(p + dx + off_z) - noise3(p - dx + off_z));
    let z = (noise3(p + dx + off_y) - noise3(p - dx + off_y))
        - (noise3(p + dy + off_x) - noise3(p - dy + off_x));
    return vec3<f32>(x, y, z) / (2.0 * eps);
}
"#;

/// WGSL code for the procedural shape formulas.
///
/// `shape_target` switches on the same ids [`crate::shape::Shape::kernel_id`]
/// reports; unknown ids fall through to the sphere.
pub const SHAPE_WGSL: &str = r#"
const SHAPE_RADIUS: f32 = 20.0;
const SINGULARITY_RADIUS: f32 = 1.5;
const TAU: f32 = 6.28318530718;
const PI: f32 = 3.14159265359;

// Uniformly distributed point on a sphere surface from two draws
fn sphere_point(u: f32, v: f32, radius: f32) -> vec3<f32> {
    let theta = u * TAU;
    let cos_phi = 1.0 - 2.0 * v;
    let sin_phi = sqrt(max(1.0 - cos_phi * cos_phi, 0.0));
    return vec3<f32>(
        radius * sin_phi * cos(theta),
        radius * cos_phi,
        radius * sin_phi * sin(theta)
    );
}

// Burst centers are seeded from the burst index, not the slot
fn burst_center(burst: u32) -> vec3<f32> {
    let base = 1000u + burst * 3u;
    return vec3<f32>(
        rand_range(base, -1.0, 1.0),
        rand_range(base + 1u, -1.0, 1.0),
        rand_range(base + 2u, -1.0, 1.0)
    );
}

fn tilt_x(p: vec3<f32>, angle: f32) -> vec3<f32> {
    let s = sin(angle);
    let c = cos(angle);
    return vec3<f32>(p.x, p.y * c - p.z * s, p.y * s + p.z * c);
}

// Initial big-bang position: a point inside a small ball at the origin
fn singularity_seed(slot: u32) -> vec3<f32> {
    let s = slot * 8u;
    let theta = rand(s + 5u) * TAU;
    let cos_phi = 1.0 - 2.0 * rand(s + 6u);
    let sin_phi = sqrt(max(1.0 - cos_phi * cos_phi, 0.0));
    let radius = SINGULARITY_RADIUS * pow(rand(s + 7u), 1.0 / 3.0);
    return vec3<f32>(
        radius * sin_phi * cos(theta),
        radius * cos_phi,
        radius * sin_phi * sin(theta)
    );
}

// Procedural target position for a slot. Each slot owns eight consecutive
// draw seeds; the first five feed the formulas here.
fn shape_target(shape_id: u32, slot: u32) -> vec3<f32> {
    let s = slot * 8u;
    let u = rand(s);
    let v = rand(s + 1u);
    let d0 = rand(s + 2u);
    let d1 = rand(s + 3u);
    let d2 = rand(s + 4u);
    let r = SHAPE_RADIUS;

    // hearts
    if shape_id == 1u {
        let t = u * TAU;
        let fill = 0.35 + 0.65 * sqrt(v);
        let sn = sin(t);
        let x = 16.0 * sn * sn * sn;
        let y = 13.0 * cos(t) - 5.0 * cos(2.0 * t) - 2.0 * cos(3.0 * t) - cos(4.0 * t);
        let k = r / 16.0;
        return vec3<f32>(k * fill * x, k * fill * (y + 2.5), (d0 - 0.5) * 4.0);
    }
    // flower
    if shape_id == 2u {
        let t = u * TAU;
        let petal = abs(cos(3.0 * t));
        let rho = r * (0.18 + 0.82 * petal) * (0.3 + 0.7 * sqrt(v));
        return vec3<f32>(
            rho * cos(t),
            rho * sin(t),
            (1.0 - rho / r) * 3.0 + (d0 - 0.5) * 2.0
        );
    }
    // saturn
    if shape_id == 3u {
        var p: vec3<f32>;
        if d0 < 0.55 {
            p = sphere_point(u, v, r * 0.55);
        } else {
            let theta = u * TAU;
            let ring_r = r * (1.15 + 0.55 * d1);
            p = vec3<f32>(ring_r * cos(theta), (d2 - 0.5) * 1.2, ring_r * sin(theta));
        }
        return tilt_x(p, 0.25);
    }
    // buddha
    if shape_id == 4u {
        let dir = sphere_point(u, v, 1.0);
        if d0 < 0.18 {
            return vec3<f32>(0.0, 0.62 * r, 0.0) + dir * vec3<f32>(0.20, 0.22, 0.20) * r;
        } else if d0 < 0.62 {
            return vec3<f32>(0.0, 0.10 * r, 0.0) + dir * vec3<f32>(0.40, 0.45, 0.33) * r;
        }
        return vec3<f32>(0.0, -0.42 * r, 0.0) + dir * vec3<f32>(0.60, 0.22, 0.45) * r;
    }
    // fireworks
    if shape_id == 5u {
        let burst = u32(d0 * 6.0) % 6u;
        let center = burst_center(burst) * 0.75 * r;
        let radius = 0.28 * r * (0.3 + 0.7 * pow(d1, 1.0 / 3.0));
        return center + sphere_point(u, v, radius);
    }
    // dna
    if shape_id == 6u {
        var strand = 0.0;
        if d0 >= 0.5 {
            strand = 1.0;
        }
        let ang = v * 2.5 * TAU + strand * PI;
        let helix_r = 0.22 * r;
        return vec3<f32>(
            helix_r * cos(ang) + (d1 - 0.5) * 1.2,
            (v - 0.5) * 1.7 * r,
            helix_r * sin(ang) + (d2 - 0.5) * 1.2
        );
    }
    // galaxy
    if shape_id == 7u {
        let arm = u32(d0 * 4.0) % 4u;
        let t = v;
        let radius = r * (0.10 + 0.90 * t);
        let ang = f32(arm) * (TAU / 4.0) + 2.4 * pow(t, 0.7) + (d1 - 0.5) * 0.5;
        return vec3<f32>(
            radius * cos(ang),
            (d2 - 0.5) * 0.12 * r * (1.2 - t),
            radius * sin(ang)
        );
    }
    // tornado
    if shape_id == 8u {
        let y = (v - 0.5) * 1.8 * r;
        let funnel = r * (0.12 + 0.50 * abs(y) / (0.9 * r)) + (d0 - 0.5) * 0.12 * r;
        let ang = u * TAU + y * 0.25;
        return vec3<f32>(funnel * cos(ang), y, funnel * sin(ang));
    }
    // cube
    if shape_id == 9u {
        let side = 0.72 * r;
        let a = (u * 2.0 - 1.0) * side;
        let b = (v * 2.0 - 1.0) * side;
        let face = u32(d0 * 6.0) % 6u;
        var p: vec3<f32>;
        if face == 0u {
            p = vec3<f32>(side, a, b);
        } else if face == 1u {
            p = vec3<f32>(-side, a, b);
        } else if face == 2u {
            p = vec3<f32>(a, side, b);
        } else if face == 3u {
            p = vec3<f32>(a, -side, b);
        } else if face == 4u {
            p = vec3<f32>(a, b, side);
        } else {
            p = vec3<f32>(a, b, -side);
        }
        return p + vec3<f32>(d1 - 0.5, d2 - 0.5, 0.0) * 0.6;
    }
    // torus
    if shape_id == 10u {
        let major = 0.68 * r;
        let minor = 0.26 * r + (d0 - 0.5) * 0.8;
        let theta = u * TAU;
        let phi = v * TAU;
        return vec3<f32>(
            (major + minor * cos(phi)) * cos(theta),
            minor * sin(phi),
            (major + minor * cos(phi)) * sin(theta)
        );
    }
    // wave
    if shape_id == 11u {
        let x = (u - 0.5) * 2.3 * r;
        let z = (v - 0.5) * 2.3 * r;
        return vec3<f32>(x, 0.28 * r * sin(0.32 * x) * cos(0.32 * z) + (d0 - 0.5), z);
    }
    // sphere, and anything unknown
    return sphere_point(u, v, r * (0.96 + 0.08 * d0));
}
"#;

/// Get all simulation utility functions combined.
pub fn sim_utils_wgsl() -> String {
    format!(
        "// Shared simulation functions\n{}\n{}\n{}\n",
        RANDOM_WGSL, NOISE_WGSL, SHAPE_WGSL
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Validates WGSL code using naga.
    fn validate_wgsl(code: &str) -> Result<(), String> {
        let module = naga::front::wgsl::parse_str(code)
            .map_err(|e| format!("WGSL parse error: {:?}", e))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| format!("WGSL validation error: {:?}", e))?;

        Ok(())
    }

    #[test]
    fn test_utils_are_valid_wgsl() {
        validate_wgsl(&sim_utils_wgsl()).unwrap();
    }

    #[test]
    fn test_utils_cover_every_shape_id() {
        // One branch per procedural shape id, sphere as the fallthrough.
        for id in 1..12u32 {
            assert!(
                SHAPE_WGSL.contains(&format!("shape_id == {id}u")),
                "no branch for shape id {id}"
            );
        }
    }
}
