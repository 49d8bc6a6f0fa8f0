//! Old-fashioned discrete bulbs: one lit pixel per `spacing` positions.
//!
//! Bulb `k` (pixel `k * spacing`) shows `PALETTE[(k + t / interval) % 5]`,
//! so neighbouring bulbs always differ and every bulb steps to the next
//! color once per interval.

use rgb::RGB8;
use serde::{Deserialize, Serialize};

use super::{paint, Interrupt, RenderOutcome};
use crate::output::{LedOutput, LedString, OutputError};
use crate::time::Millis;

pub const PALETTE: [RGB8; 5] = [
    RGB8 { r: 255, g: 0, b: 0 },   // red
    RGB8 { r: 0, g: 255, b: 0 },   // green
    RGB8 { r: 0, g: 0, b: 255 },   // blue
    RGB8 { r: 255, g: 96, b: 0 },  // amber
    RGB8 { r: 160, g: 0, b: 255 }, // violet
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulbParams {
    /// Pixels per bulb group; the first pixel of each group is lit.
    pub spacing: usize,
    /// How long each bulb holds a color.
    pub interval_ms: u32,
}

impl Default for BulbParams {
    fn default() -> Self {
        Self {
            spacing: 6,
            interval_ms: 3000,
        }
    }
}

/// Palette index of bulb `bulb` at `time_ms`.
#[must_use]
pub fn palette_index(bulb: usize, time_ms: u32, interval_ms: u32) -> usize {
    let len = PALETTE.len();
    // Both terms reduced first so the sum can't overflow a 32-bit usize
    let steps = (time_ms / interval_ms.max(1)) as usize % len;
    (bulb % len + steps) % len
}

/// Color of `pixel` at `time_ms`.
#[must_use]
pub fn bulb_color(pixel: usize, time_ms: u32, params: &BulbParams) -> RGB8 {
    let spacing = params.spacing.max(1);
    if pixel % spacing == 0 {
        PALETTE[palette_index(pixel / spacing, time_ms, params.interval_ms)]
    } else {
        RGB8::default()
    }
}

pub fn render<O, I>(
    params: &BulbParams,
    strings: &mut [LedString<O>],
    now: Millis,
    interrupt: &I,
) -> Result<RenderOutcome, OutputError>
where
    O: LedOutput,
    I: Interrupt + ?Sized,
{
    let time_ms = now.as_u32();
    paint(strings, interrupt, |_, pixel| bulb_color(pixel, time_ms, params))
}
