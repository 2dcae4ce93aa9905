//! Text rasterization into point targets.
//!
//! Unlike the procedural shapes, glyph outlines cannot be evaluated from a
//! slot index alone, so text targets are baked on the CPU: the string is
//! rendered with [`rusttype`], ink pixels above a coverage threshold become
//! candidate positions, and slots are spread across them modulo the ink
//! count with a little deterministic jitter so stacked points do not
//! collapse into raster rows.
//!
//! Baking is best-effort. An empty or whitespace-only string, a missing
//! system font, or a string whose glyphs leave no ink all yield `None`, and
//! the caller keeps its current targets.

use crate::noise::rand_range;
use crate::shape::SHAPE_RADIUS;
use glam::Vec3;
use rusttype::{Font, Scale};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Raster height of a line of text, in pixels.
const GLYPH_HEIGHT: f32 = 96.0;

/// Minimum glyph coverage for a pixel to count as ink.
const COVERAGE_THRESHOLD: f32 = 0.5;

/// World-space bounds the baked text is scaled to fit.
const TEXT_WIDTH: f32 = SHAPE_RADIUS * 2.4;
const TEXT_HEIGHT: f32 = SHAPE_RADIUS * 1.2;

/// Depth jitter keeps the flat glyph plane from z-fighting with itself.
const DEPTH_JITTER: f32 = 0.8;

/// Well-known font locations, tried in order after `ETHERIAL_FONT`.
const FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Bake `count` targets for a string. Returns `None` when the string has
/// nothing to show or no font is available.
pub fn bake(text: &str, count: usize) -> Option<Vec<Vec3>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let font = match system_font() {
        Some(font) => font,
        None => {
            log::warn!("dropping text {:?}: no usable font found", text);
            return None;
        }
    };
    let ink = rasterize(font, text);
    if ink.is_empty() {
        log::debug!("dropping text {:?}: glyphs left no ink", text);
        return None;
    }
    Some(spread(&ink, count))
}

/// The process-wide text font, loaded once on first use.
fn system_font() -> Option<&'static Font<'static>> {
    static FONT: OnceLock<Option<Font<'static>>> = OnceLock::new();
    FONT.get_or_init(load_font).as_ref()
}

fn load_font() -> Option<Font<'static>> {
    let candidates = std::env::var_os("ETHERIAL_FONT")
        .map(PathBuf::from)
        .into_iter()
        .chain(FONT_PATHS.iter().map(PathBuf::from));
    for path in candidates {
        let Ok(data) = std::fs::read(&path) else {
            continue;
        };
        match Font::try_from_vec(data) {
            Some(font) => {
                log::debug!("text font: {}", path.display());
                return Some(font);
            }
            None => log::warn!("unreadable font file: {}", path.display()),
        }
    }
    None
}

/// Ink pixel centers in raster coordinates (y grows downward).
fn rasterize(font: &Font<'_>, text: &str) -> Vec<[f32; 2]> {
    let scale = Scale::uniform(GLYPH_HEIGHT);
    let ascent = font.v_metrics(scale).ascent;
    let mut ink = Vec::new();
    for glyph in font.layout(text, scale, rusttype::point(0.0, ascent)) {
        if let Some(bb) = glyph.pixel_bounding_box() {
            glyph.draw(|gx, gy, coverage| {
                if coverage > COVERAGE_THRESHOLD {
                    ink.push([
                        (bb.min.x + gx as i32) as f32,
                        (bb.min.y + gy as i32) as f32,
                    ]);
                }
            });
        }
    }
    ink
}

/// Center the ink on the origin, scale it into the world bounds, and hand
/// every slot a jittered pixel. Deterministic for a given ink set.
fn spread(ink: &[[f32; 2]], count: usize) -> Vec<Vec3> {
    let mut min = [f32::MAX; 2];
    let mut max = [f32::MIN; 2];
    for p in ink {
        for axis in 0..2 {
            min[axis] = min[axis].min(p[axis]);
            max[axis] = max[axis].max(p[axis]);
        }
    }
    let center = [(min[0] + max[0]) * 0.5, (min[1] + max[1]) * 0.5];
    let span = [(max[0] - min[0]).max(1.0), (max[1] - min[1]).max(1.0)];
    let scale = (TEXT_WIDTH / span[0]).min(TEXT_HEIGHT / span[1]);

    (0..count)
        .map(|slot| {
            let px = ink[slot % ink.len()];
            let s = (slot as u32).wrapping_mul(8);
            Vec3::new(
                (px[0] - center[0] + rand_range(s, -0.5, 0.5)) * scale,
                (center[1] - px[1] + rand_range(s + 1, -0.5, 0.5)) * scale,
                rand_range(s + 2, -DEPTH_JITTER, DEPTH_JITTER),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A vertical bar of ink, 1 px wide and 100 px tall.
    fn bar() -> Vec<[f32; 2]> {
        (0..100).map(|y| [10.0, y as f32]).collect()
    }

    #[test]
    fn test_empty_text_bakes_nothing() {
        assert_eq!(bake("", 64), None);
        assert_eq!(bake("   \t ", 64), None);
    }

    #[test]
    fn test_spread_fills_every_slot() {
        let targets = spread(&bar(), 500);
        assert_eq!(targets.len(), 500);
    }

    #[test]
    fn test_spread_is_deterministic() {
        assert_eq!(spread(&bar(), 128), spread(&bar(), 128));
    }

    #[test]
    fn test_spread_centers_and_bounds() {
        let targets = spread(&bar(), 400);
        let mean = targets.iter().sum::<Vec3>() / targets.len() as f32;
        assert!(mean.x.abs() < 1.0, "off-center in x: {}", mean.x);
        assert!(mean.y.abs() < 1.0, "off-center in y: {}", mean.y);
        for t in &targets {
            assert!(t.x.abs() <= TEXT_WIDTH * 0.5 + 1.0);
            assert!(t.y.abs() <= TEXT_HEIGHT * 0.5 + 1.0);
            assert!(t.z.abs() <= DEPTH_JITTER);
        }
    }

    #[test]
    fn test_spread_flips_raster_y() {
        // Raster y grows downward, so the first (topmost) pixel lands at
        // positive world y.
        let targets = spread(&[[10.0, 0.0], [10.0, 100.0]], 2);
        assert!(targets[0].y > 0.0);
        assert!(targets[1].y < 0.0);
    }

    #[test]
    fn test_bake_with_system_font() {
        let Some(targets) = bake("HI", 512) else {
            // No font on this machine; nothing to rasterize against.
            return;
        };
        assert_eq!(targets.len(), 512);
        // Two distinct letters spread ink across x.
        let spread_x = targets.iter().map(|t| t.x).fold(f32::MIN, f32::max)
            - targets.iter().map(|t| t.x).fold(f32::MAX, f32::min);
        assert!(spread_x > TEXT_WIDTH * 0.3, "ink too narrow: {}", spread_x);
    }
}
