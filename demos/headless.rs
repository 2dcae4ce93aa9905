//! # Headless Run
//!
//! Drives the particle organism for ten simulated seconds without any
//! window, then saves an orthographic scatter snapshot of the final frame
//! as a PNG.
//!
//! ## What This Demonstrates
//!
//! - **Engine selection**: probes for a GPU and falls back to the CPU
//!   cloud; the run works identically either way
//! - **Shape morphing**: galaxy, then torus, with a beat pulse in between
//! - **Readback**: `positions()` returns xyz plus alpha from whichever
//!   engine is active
//!
//! Run with: `RUST_LOG=info cargo run --example headless`

use etherial::prelude::*;

const TICKS: u32 = 600;
const IMAGE_SIZE: u32 = 512;
/// World half-extent mapped onto the image.
const VIEW_EXTENT: f32 = 30.0;

fn main() {
    env_logger::init();

    let mut system = ParticleSystem::new(SystemConfig::new().with_cpu_count(4096));
    let bus = system.bus();
    let mut clock = TickClock::new();

    bus.send(Command::Shape(Shape::Galaxy));
    for frame in 0..TICKS {
        if frame == 240 {
            bus.send(Command::Shape(Shape::Torus));
        }
        if frame == 420 {
            bus.send(Command::Pulse);
        }
        system.tick();
        clock.tick();
    }

    println!(
        "{} particles, state {:?}, {:.1}s simulated in {:.2?}",
        system.count(),
        system.state(),
        clock.elapsed(),
        clock.wall_elapsed(),
    );

    match system.positions() {
        Ok(positions) => {
            let path = "organism.png";
            save_snapshot(&positions, system.tint(), path);
            println!("snapshot written to {path}");
        }
        Err(error) => eprintln!("readback failed: {error}"),
    }
}

/// Additive XY splat of the cloud, brightness scaled by particle alpha.
fn save_snapshot(positions: &[[f32; 4]], tint: Vec3, path: &str) {
    let mut img =
        image::RgbaImage::from_pixel(IMAGE_SIZE, IMAGE_SIZE, image::Rgba([5, 6, 12, 255]));
    let size = IMAGE_SIZE as f32;

    for p in positions {
        let x = ((p[0] + VIEW_EXTENT) / (2.0 * VIEW_EXTENT) * size) as i32;
        let y = ((VIEW_EXTENT - p[1]) / (2.0 * VIEW_EXTENT) * size) as i32;
        if !(0..IMAGE_SIZE as i32).contains(&x) || !(0..IMAGE_SIZE as i32).contains(&y) {
            continue;
        }
        let glow = tint * p[3].clamp(0.0, 1.0) * 160.0;
        let pixel = img.get_pixel_mut(x as u32, y as u32);
        for (channel, add) in pixel.0.iter_mut().zip([glow.x, glow.y, glow.z]) {
            *channel = channel.saturating_add(add as u8);
        }
    }

    if let Err(error) = img.save(path) {
        eprintln!("could not save {path}: {error}");
    }
}
