//! Compute kernel generation and the uniform block that feeds it.
//!
//! The kernel is assembled from the shared WGSL fragments in
//! [`crate::shader_utils`] plus a force section whose constants are
//! interpolated from [`crate::forces`] at generation time, so the two sides
//! cannot drift apart. One kernel variant exists per [`PositionFormat`]:
//! the preferred full-precision layout stores each particle as a
//! `vec4<f32>` (xyz position, w alpha), and the half-precision fallback
//! packs the same four channels into a `vec2<u32>` with `pack2x16float`.
//!
//! The fallback is only eligible after [`validate_f16_roundtrip`] proves
//! the CPU-side codec survives the simulation's dynamic range; the same
//! pack/unpack pair is used to seed and read back half buffers.

use crate::error::EngineError;
use crate::forces::{self, ForceParams};
use crate::input::ControlInputs;
use crate::shape::Shape;
use bytemuck::{Pod, Zeroable};

/// Threads per workgroup; dispatches round particle count up to this.
pub const WORKGROUP_SIZE: u32 = 256;

/// Storage layout of the particle buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFormat {
    /// One `vec4<f32>` per particle. Preferred.
    F32,
    /// Two `pack2x16float` words per particle. Fallback for devices that
    /// cannot afford full-precision buffers.
    F16,
}

impl PositionFormat {
    /// Bytes one particle occupies in a storage buffer.
    pub fn bytes_per_particle(self) -> u64 {
        match self {
            PositionFormat::F32 => 16,
            PositionFormat::F16 => 8,
        }
    }

    /// WGSL element type of the particle arrays.
    pub fn wgsl_element(self) -> &'static str {
        match self {
            PositionFormat::F32 => "vec4<f32>",
            PositionFormat::F16 => "vec2<u32>",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PositionFormat::F32 => "f32",
            PositionFormat::F16 => "f16",
        }
    }
}

/// Per-step uniforms, mirrored field for field by the WGSL `SimUniforms`.
///
/// Hands ride in two vec4s (xyz position, w gesture code, negative when
/// the slot is empty); `hand_meta` carries their pinch and tension pairs.
/// The shockwave vec4 is zero-gain when no blast fired this frame.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct SimUniforms {
    pub hand_a: [f32; 4],
    pub hand_b: [f32; 4],
    pub hand_meta: [f32; 4],
    pub shockwave: [f32; 4],
    pub time: f32,
    pub speed: f32,
    pub spring_k: f32,
    pub turbulence: f32,
    pub shape_id: u32,
    pub baked_mode: u32,
    pub count: u32,
    pub _pad: u32,
}

impl SimUniforms {
    /// Pack one tick's inputs for upload.
    pub fn pack(
        inputs: &ControlInputs,
        shape: &Shape,
        time: f32,
        count: u32,
        params: &ForceParams,
    ) -> Self {
        let mut hands = [[0.0, 0.0, 0.0, -1.0f32]; 2];
        let mut meta = [0.0f32; 4];
        for (slot, hand) in inputs.interactions.iter().take(2).enumerate() {
            hands[slot] = [
                hand.position.x,
                hand.position.y,
                hand.position.z,
                hand.gesture.code() as f32,
            ];
            meta[slot * 2] = if hand.pinch { 1.0 } else { 0.0 };
            meta[slot * 2 + 1] = hand.tension;
        }
        let shockwave = match inputs.shockwave {
            Some(event) => [event.center.x, event.center.y, event.center.z, event.gain],
            None => [0.0; 4],
        };
        Self {
            hand_a: hands[0],
            hand_b: hands[1],
            hand_meta: meta,
            shockwave,
            time,
            speed: inputs.speed,
            spring_k: params.spring_k,
            turbulence: params.turbulence,
            shape_id: shape.kernel_id(),
            baked_mode: shape.is_baked() as u32,
            count,
            _pad: 0,
        }
    }
}

/// Generate the step kernel for a buffer format.
pub fn generate_kernel(format: PositionFormat) -> String {
    let utils = crate::shader_utils::sim_utils_wgsl();
    let force_fns = force_wgsl();
    let element = format.wgsl_element();
    let (load, store) = match format {
        PositionFormat::F32 => (
            "    let data = src[index];\n    \
             var position = data.xyz;\n    \
             let alpha = data.w;",
            "    dst[index] = vec4<f32>(position, alpha);",
        ),
        PositionFormat::F16 => (
            "    let data = src[index];\n    \
             let lo = unpack2x16float(data.x);\n    \
             let hi = unpack2x16float(data.y);\n    \
             var position = vec3<f32>(lo.x, lo.y, hi.x);\n    \
             let alpha = hi.y;",
            "    dst[index] = vec2<u32>(pack2x16float(position.xy), \
             pack2x16float(vec2<f32>(position.z, alpha)));",
        ),
    };

    format!(
        r#"// Particle step kernel, {label} position buffers
{utils}
{force_fns}
struct SimUniforms {{
    hand_a: vec4<f32>,
    hand_b: vec4<f32>,
    hand_meta: vec4<f32>,
    shockwave: vec4<f32>,
    time: f32,
    speed: f32,
    spring_k: f32,
    turbulence: f32,
    shape_id: u32,
    baked_mode: u32,
    count: u32,
    _pad: u32,
}}

@group(0) @binding(0)
var<storage, read> src: array<{element}>;

@group(0) @binding(1)
var<storage, read_write> dst: array<{element}>;

@group(0) @binding(2)
var<uniform> sim: SimUniforms;

@group(0) @binding(3)
var<storage, read> baked_targets: array<vec4<f32>>;

@compute @workgroup_size({workgroup})
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {{
    let index = global_id.x;
    if index >= sim.count {{
        return;
    }}

{load}

    var target_pos: vec3<f32>;
    if sim.baked_mode == 1u {{
        target_pos = baked_targets[index].xyz;
    }} else {{
        target_pos = shape_target(sim.shape_id, index);
    }}

    if length(position) > RUNAWAY_DISTANCE {{
        // Safety clamp: runaway particles snap back onto the shape.
        position = target_pos;
    }} else {{
        var vel = (target_pos - position) * sim.spring_k;
        if sim.turbulence > 0.0 {{
            let drift = position * TURBULENCE_FREQ + vec3<f32>(sim.time * TURBULENCE_DRIFT);
            vel += curl3(drift, CURL_EPS) * sim.turbulence;
        }}
        vel += hand_velocity(position, sim.hand_a, sim.hand_meta.xy);
        vel += hand_velocity(position, sim.hand_b, sim.hand_meta.zw);
        if sim.shockwave.w > 0.0 {{
            vel += impulse_velocity(position, sim.shockwave.xyz) * sim.shockwave.w;
        }}
        position += vel * sim.speed * FIXED_TIMESTEP;
    }}

{store}
}}
"#,
        label = format.label(),
        workgroup = WORKGROUP_SIZE,
    )
}

/// Force rules and tuning constants, interpolated from [`crate::forces`].
fn force_wgsl() -> String {
    format!(
        r#"
const INTERACTION_RADIUS: f32 = {interaction_radius:?};
const GRAB_STRENGTH: f32 = {grab_strength:?};
const GRAB_SWIRL: f32 = {grab_swirl:?};
const REPEL_STRENGTH: f32 = {repel_strength:?};
const SWIRL_RADIUS: f32 = {swirl_radius:?};
const SWIRL_STRENGTH: f32 = {swirl_strength:?};
const PINCH_BOOST: f32 = {pinch_boost:?};
const SHOCKWAVE_RADIUS: f32 = {shockwave_radius:?};
const SHOCKWAVE_STRENGTH: f32 = {shockwave_strength:?};
const MIN_DISTANCE: f32 = {min_distance:?};
const RUNAWAY_DISTANCE: f32 = {runaway_distance:?};
const TURBULENCE_FREQ: f32 = {turbulence_freq:?};
const TURBULENCE_DRIFT: f32 = {turbulence_drift:?};
const CURL_EPS: f32 = {curl_eps:?};
const FIXED_TIMESTEP: f32 = {fixed_timestep:?};

// Per-hand force: w < 0 marks an empty slot, hand_meta is (pinch, tension)
fn hand_velocity(position: vec3<f32>, hand: vec4<f32>, hand_meta: vec2<f32>) -> vec3<f32> {{
    if hand.w < 0.0 {{
        return vec3<f32>(0.0);
    }}
    let radial = position - hand.xyz;
    let dist = length(radial);
    if dist < 1e-3 {{
        return vec3<f32>(0.0);
    }}
    let falloff = 1.0 / max(dist, MIN_DISTANCE);
    let swirl_scale = 1.0 + clamp(hand_meta.y, 0.0, 1.0);
    let code = u32(hand.w);
    var vel = vec3<f32>(0.0);
    if code == 1u {{
        // Fist: attract, with a tangential swirl
        if dist < INTERACTION_RADIUS {{
            var boost = 1.0;
            if hand_meta.x > 0.5 {{
                boost = PINCH_BOOST;
            }}
            let tangent = cross(vec3<f32>(0.0, 1.0, 0.0), radial) / dist;
            vel += -(radial / dist) * GRAB_STRENGTH * boost * falloff;
            vel += tangent * GRAB_SWIRL * swirl_scale * falloff;
        }}
    }} else if code == 3u {{
        // Victory: swirl only, tighter radius
        if dist < SWIRL_RADIUS {{
            let tangent = cross(vec3<f32>(0.0, 1.0, 0.0), radial) / dist;
            vel += tangent * SWIRL_STRENGTH * swirl_scale * falloff;
        }}
    }} else {{
        // Open palm and point: repel
        if dist < INTERACTION_RADIUS {{
            vel += (radial / dist) * REPEL_STRENGTH * falloff;
        }}
    }}
    return vel;
}}

// One-frame outward impulse from a clap or beat pulse
fn impulse_velocity(position: vec3<f32>, center: vec3<f32>) -> vec3<f32> {{
    let radial = position - center;
    let dist = length(radial);
    if dist < 1e-3 || dist > SHOCKWAVE_RADIUS {{
        return vec3<f32>(0.0);
    }}
    return (radial / dist) * SHOCKWAVE_STRENGTH / max(dist, MIN_DISTANCE);
}}
"#,
        interaction_radius = forces::INTERACTION_RADIUS,
        grab_strength = forces::GRAB_STRENGTH,
        grab_swirl = forces::GRAB_SWIRL,
        repel_strength = forces::REPEL_STRENGTH,
        swirl_radius = forces::SWIRL_RADIUS,
        swirl_strength = forces::SWIRL_STRENGTH,
        pinch_boost = forces::PINCH_BOOST,
        shockwave_radius = forces::SHOCKWAVE_RADIUS,
        shockwave_strength = forces::SHOCKWAVE_STRENGTH,
        min_distance = forces::MIN_DISTANCE,
        runaway_distance = forces::RUNAWAY_DISTANCE,
        turbulence_freq = forces::TURBULENCE_FREQ,
        turbulence_drift = forces::TURBULENCE_DRIFT,
        curl_eps = forces::CURL_EPS,
        fixed_timestep = crate::time::FIXED_TIMESTEP,
    )
}

// ========== Half-precision codec ==========
//
// IEEE binary16 conversion, round to nearest even. The ecosystem has
// dedicated crates for this, but the kernel only needs the two scalar
// conversions and their behavior must match WGSL `pack2x16float` exactly.

/// Convert an f32 to binary16 bits.
pub fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp32 = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exp32 == 0xff {
        // Infinity or NaN; keep NaN a NaN.
        let payload = if mantissa != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | payload;
    }

    let exp = exp32 - 127 + 15;
    if exp >= 0x1f {
        return sign | 0x7c00;
    }
    if exp <= 0 {
        if exp < -10 {
            return sign;
        }
        // Subnormal: shift the implicit bit into the mantissa.
        let m = mantissa | 0x0080_0000;
        let shift = (14 - exp) as u32;
        let half = (m >> shift) as u16;
        let round_bit = 1u32 << (shift - 1);
        if (m & round_bit) != 0 && ((m & (round_bit - 1)) != 0 || (half & 1) != 0) {
            return sign | (half + 1);
        }
        return sign | half;
    }

    let mut half = ((exp as u32) << 10 | (mantissa >> 13)) as u16;
    // Round to nearest even; a carry into the exponent is correct.
    let round_bit = 0x1000u32;
    if (mantissa & round_bit) != 0 && ((mantissa & (round_bit - 1)) != 0 || (half & 1) != 0) {
        half += 1;
    }
    sign | half
}

/// Convert binary16 bits to an f32.
pub fn f16_bits_to_f32(bits: u16) -> f32 {
    let sign = ((bits & 0x8000) as u32) << 16;
    let exp = ((bits >> 10) & 0x1f) as u32;
    let mantissa = (bits & 0x3ff) as u32;

    let out = if exp == 0 {
        if mantissa == 0 {
            sign
        } else {
            // Subnormal: renormalize into the f32 exponent range.
            let mut exp32 = 127 - 15 + 1;
            let mut m = mantissa;
            while m & 0x400 == 0 {
                m <<= 1;
                exp32 -= 1;
            }
            sign | ((exp32 as u32) << 23) | ((m & 0x3ff) << 13)
        }
    } else if exp == 0x1f {
        sign | 0x7f80_0000 | (mantissa << 13)
    } else {
        sign | ((exp + 127 - 15) << 23) | (mantissa << 13)
    };
    f32::from_bits(out)
}

/// Prove the half codec holds up across the simulation's dynamic range
/// before the half-precision layout is allowed.
pub fn validate_f16_roundtrip() -> Result<(), EngineError> {
    const PROBES: [f32; 10] = [
        0.0, 0.25, 0.6, 1.0, -1.5, 20.0, -77.7, 149.0, -150.0, 0.875,
    ];
    for &value in &PROBES {
        let back = f16_bits_to_f32(f32_to_f16_bits(value));
        let tolerance = (value.abs() * 1e-3).max(1e-3);
        if (back - value).abs() > tolerance {
            return Err(EngineError::HalfPrecisionRoundTrip);
        }
    }
    Ok(())
}

fn pack2x16(x: f32, y: f32) -> u32 {
    (f32_to_f16_bits(x) as u32) | ((f32_to_f16_bits(y) as u32) << 16)
}

fn unpack2x16(word: u32) -> (f32, f32) {
    (
        f16_bits_to_f32(word as u16),
        f16_bits_to_f32((word >> 16) as u16),
    )
}

/// Encode position+alpha quads into a buffer-ready byte vector.
pub fn encode_positions(format: PositionFormat, positions: &[[f32; 4]]) -> Vec<u8> {
    match format {
        PositionFormat::F32 => bytemuck::cast_slice(positions).to_vec(),
        PositionFormat::F16 => {
            let mut bytes = Vec::with_capacity(positions.len() * 8);
            for p in positions {
                bytes.extend_from_slice(&pack2x16(p[0], p[1]).to_le_bytes());
                bytes.extend_from_slice(&pack2x16(p[2], p[3]).to_le_bytes());
            }
            bytes
        }
    }
}

/// Decode a read-back byte buffer into position+alpha quads. Alignment of
/// the input does not matter; mapped ranges are copied field by field.
pub fn decode_positions(format: PositionFormat, bytes: &[u8]) -> Vec<[f32; 4]> {
    match format {
        PositionFormat::F32 => bytes
            .chunks_exact(16)
            .map(|chunk| {
                let f = |i: usize| {
                    f32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]])
                };
                [f(0), f(4), f(8), f(12)]
            })
            .collect(),
        PositionFormat::F16 => bytes
            .chunks_exact(8)
            .map(|chunk| {
                let w = |i: usize| {
                    u32::from_le_bytes([chunk[i], chunk[i + 1], chunk[i + 2], chunk[i + 3]])
                };
                let (x, y) = unpack2x16(w(0));
                let (z, a) = unpack2x16(w(4));
                [x, y, z, a]
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forces::{Interaction, ShockwaveEvent};
    use crate::input::Gesture;
    use glam::Vec3;

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
    fn test_kernel_valid_for_both_formats() {
        for format in [PositionFormat::F32, PositionFormat::F16] {
            validate_wgsl(&generate_kernel(format))
                .unwrap_or_else(|e| panic!("{} kernel invalid: {e}", format.label()));
        }
    }

    #[test]
    fn test_kernel_layout_markers() {
        let source = generate_kernel(PositionFormat::F32);
        assert!(source.contains("@compute @workgroup_size(256)"));
        assert!(source.contains("fn main("));
        for binding in 0..4 {
            assert!(
                source.contains(&format!("@binding({binding})")),
                "missing binding {binding}"
            );
        }
        assert!(source.contains("var<storage, read> src"));
        assert!(source.contains("var<storage, read_write> dst"));
    }

    #[test]
    fn test_f16_known_values() {
        assert_eq!(f32_to_f16_bits(0.0), 0x0000);
        assert_eq!(f32_to_f16_bits(-0.0), 0x8000);
        assert_eq!(f32_to_f16_bits(1.0), 0x3c00);
        assert_eq!(f32_to_f16_bits(-2.0), 0xc000);
        assert_eq!(f32_to_f16_bits(65504.0), 0x7bff);
        assert_eq!(f32_to_f16_bits(65536.0), 0x7c00);
        assert_eq!(f32_to_f16_bits(f32::INFINITY), 0x7c00);
        assert_eq!(f32_to_f16_bits(f32::NEG_INFINITY), 0xfc00);
        assert!(f16_bits_to_f32(f32_to_f16_bits(f32::NAN)).is_nan());
    }

    #[test]
    fn test_f16_roundtrip_exact_over_all_halves() {
        for bits in 0..=0xffffu16 {
            let value = f16_bits_to_f32(bits);
            if value.is_nan() {
                assert!(f16_bits_to_f32(f32_to_f16_bits(value)).is_nan());
                continue;
            }
            assert_eq!(f32_to_f16_bits(value), bits, "bits {bits:#06x}");
        }
    }

    #[test]
    fn test_f16_rounds_to_nearest_even() {
        // Halfway cases around 1.0: ulp is 2^-10, ties go to the even
        // mantissa.
        assert_eq!(f32_to_f16_bits(1.0 + 0.000488_281_25), 0x3c00);
        assert_eq!(f32_to_f16_bits(1.0 + 3.0 * 0.000488_281_25), 0x3c02);
    }

    #[test]
    fn test_roundtrip_validation_passes() {
        validate_f16_roundtrip().unwrap();
    }

    #[test]
    fn test_encode_decode_f32_exact() {
        let positions = vec![[1.5, -20.25, 88.0, 0.5], [0.0, 149.0, -0.125, 1.0]];
        let bytes = encode_positions(PositionFormat::F32, &positions);
        assert_eq!(bytes.len(), 32);
        assert_eq!(decode_positions(PositionFormat::F32, &bytes), positions);
    }

    #[test]
    fn test_encode_decode_f16_within_tolerance() {
        let positions = vec![[1.5, -20.25, 88.0, 0.5], [0.0, 149.0, -0.125, 1.0]];
        let bytes = encode_positions(PositionFormat::F16, &positions);
        assert_eq!(bytes.len(), 16);
        let back = decode_positions(PositionFormat::F16, &bytes);
        for (a, b) in positions.iter().flatten().zip(back.iter().flatten()) {
            assert!((a - b).abs() <= (a.abs() * 1e-3).max(1e-3), "{a} vs {b}");
        }
    }

    #[test]
    fn test_uniforms_layout() {
        assert_eq!(std::mem::size_of::<SimUniforms>(), 96);
        assert_eq!(std::mem::size_of::<SimUniforms>() % 16, 0);
    }

    #[test]
    fn test_pack_marks_absent_hands() {
        let uniforms = SimUniforms::pack(
            &ControlInputs::default(),
            &Shape::Sphere,
            0.0,
            1024,
            &ForceParams::default(),
        );
        assert_eq!(uniforms.hand_a[3], -1.0);
        assert_eq!(uniforms.hand_b[3], -1.0);
        assert_eq!(uniforms.shockwave, [0.0; 4]);
        assert_eq!(uniforms.baked_mode, 0);
        assert_eq!(uniforms.count, 1024);
    }

    #[test]
    fn test_pack_encodes_hands_and_blast() {
        let inputs = ControlInputs {
            interactions: vec![Interaction {
                position: Vec3::new(1.0, 2.0, 3.0),
                gesture: Gesture::Fist,
                pinch: true,
                tension: 0.7,
            }],
            shockwave: Some(ShockwaveEvent::pulse()),
            ..ControlInputs::default()
        };
        let uniforms = SimUniforms::pack(
            &inputs,
            &Shape::Text("hi".into()),
            2.5,
            64,
            &ForceParams::default(),
        );
        assert_eq!(uniforms.hand_a, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(uniforms.hand_meta[0], 1.0);
        assert_eq!(uniforms.hand_meta[1], 0.7);
        assert_eq!(uniforms.hand_b[3], -1.0);
        assert_eq!(uniforms.shockwave[3], 0.5);
        assert_eq!(uniforms.baked_mode, 1);
        assert_eq!(uniforms.shape_id, 0);
    }
}
