//! # Scripted Gestures
//!
//! Feeds the organism a synthetic performance: a fist circles and stirs
//! the cloud, two hands clap through the center, a text bake is attempted,
//! and the shape morphs along the way. Prints a status line once per
//! simulated second.
//!
//! ## What This Demonstrates
//!
//! - **Producer side of the bus**: hand frames and audio published from
//!   the outside, exactly as a camera tracker would
//! - **Gesture forces**: fist grab, clap shockwave, open-palm release
//! - **Graceful text fallback**: on machines without a usable font the
//!   text command logs a warning and the current shape stays
//!
//! Run with: `RUST_LOG=info cargo run --example gestures`

use etherial::prelude::*;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const TICKS: u32 = 720;

fn main() {
    env_logger::init();

    let mut system = ParticleSystem::new(SystemConfig::new().with_cpu_count(4096));
    let bus = system.bus();
    let mut rng = SmallRng::seed_from_u64(7);

    bus.send(Command::Shape(Shape::Dna));
    for frame in 0..TICKS {
        let t = frame as f32 * FIXED_TIMESTEP;

        match frame {
            300 => bus.send(Command::Text("ETHERIAL".to_string())),
            420 => bus.send(Command::Shape(Shape::Fireworks)),
            600 => bus.send(Command::Color([1.0, 0.6, 0.2])),
            _ => {}
        }

        bus.publish_hands(hands_for(frame, t, &mut rng));
        bus.publish_audio(AudioDescriptor {
            // A slow synthetic beat; volume drives simulation speed.
            volume: 0.6 + 0.6 * (t * 2.1).sin().abs(),
        });

        system.tick();

        if frame % 60 == 0 {
            report(&system, frame);
        }
    }
    report(&system, TICKS);
}

/// The scripted hand track: one circling fist, then a clap, then release.
fn hands_for(frame: u32, t: f32, rng: &mut SmallRng) -> Vec<HandDescriptor> {
    let jitter = |rng: &mut SmallRng| rng.gen_range(-0.01..0.01);
    match frame {
        // Circle a fist through the cloud.
        60..=239 => {
            let angle = t * 1.3;
            vec![HandDescriptor::new(
                Vec2::new(
                    0.5 * angle.cos() + jitter(rng),
                    0.5 * angle.sin() + jitter(rng),
                ),
                Gesture::Fist,
            )]
        }
        // Bring two open palms together; the crossing claps once.
        240..=299 => {
            let gap = 0.4 - (frame - 240) as f32 * 0.007;
            vec![
                HandDescriptor::new(Vec2::new(-gap, 0.0), Gesture::Open),
                HandDescriptor::new(Vec2::new(gap, 0.0), Gesture::Open),
            ]
        }
        // A victory sign stirs without pulling.
        480..=599 => vec![HandDescriptor::new(
            Vec2::new(jitter(rng) * 10.0, 0.3),
            Gesture::Victory,
        )],
        _ => Vec::new(),
    }
}

fn report(system: &ParticleSystem, frame: u32) {
    let positions = match system.positions() {
        Ok(positions) => positions,
        Err(error) => {
            eprintln!("readback failed: {error}");
            return;
        }
    };
    let mean_radius = positions
        .iter()
        .map(|p| Vec3::new(p[0], p[1], p[2]).length())
        .sum::<f32>()
        / positions.len().max(1) as f32;
    println!(
        "t={:>5.1}s state={:?} shape={:?} mean_radius={:.1}",
        frame as f32 * FIXED_TIMESTEP,
        system.state(),
        system.shape(),
        mean_radius,
    );
}
