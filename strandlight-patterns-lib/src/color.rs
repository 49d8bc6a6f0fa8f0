//! Color model shared by every pattern.
//!
//! Patterns always reason in canonical red/green/blue. Strips that expect a
//! different channel order are handled once, at the output boundary, with
//! [`ChannelOrder`].

use rgb::RGB8;
use serde::{Deserialize, Serialize};

/// Convert hue/saturation/value to RGB.
///
/// * `hue` - degrees, wrapped into `[0, 360)`
/// * `saturation` - `[0.0, 1.0]`
/// * `value` - `[0.0, 1.0]`
///
/// Channels are scaled to `0..=255` by truncation, not rounding, so the same
/// floating inputs always give the same bytes.
#[must_use]
pub fn hsv_to_rgb(hue: f32, saturation: f32, value: f32) -> RGB8 {
    let s = saturation.clamp(0.0, 1.0);
    let v = value.clamp(0.0, 1.0);

    if s == 0.0 {
        let gray = to_channel(v);
        return RGB8::new(gray, gray, gray);
    }

    let h = hue.rem_euclid(360.0) / 60.0;
    // h is in [0.0, 6.0), the cast picks the sector
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let sector = (h as u32) % 6;
    #[allow(clippy::cast_precision_loss)]
    let f = h - sector as f32;

    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    RGB8::new(to_channel(r), to_channel(g), to_channel(b))
}

/// Scale a `[0.0, 1.0]` intensity to a channel byte, truncating.
#[inline]
fn to_channel(x: f32) -> u8 {
    // x is clamped to [0.0, 1.0] by the callers, the float-to-int cast saturates anyway
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let byte = (x * 255.0) as u8;
    byte
}

/// Physical channel order of a strip.
///
/// The variant names the canonical channel that ends up in each of the
/// driver's three slots, first to last. `Rgb` passes colors through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
}

impl ChannelOrder {
    /// Reorder a canonical color into the strip's channel order.
    #[must_use]
    pub const fn apply(self, c: RGB8) -> RGB8 {
        match self {
            Self::Rgb => c,
            Self::Rbg => RGB8 { r: c.r, g: c.b, b: c.g },
            Self::Grb => RGB8 { r: c.g, g: c.r, b: c.b },
            Self::Gbr => RGB8 { r: c.g, g: c.b, b: c.r },
            Self::Brg => RGB8 { r: c.b, g: c.r, b: c.g },
            Self::Bgr => RGB8 { r: c.b, g: c.g, b: c.r },
        }
    }
}
