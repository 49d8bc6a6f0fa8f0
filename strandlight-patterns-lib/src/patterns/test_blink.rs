//! Wiring check: every pixel of every string blinks half-brightness gray.

use rgb::RGB8;

use super::{paint, Interrupt, RenderOutcome};
use crate::output::{LedOutput, LedString, OutputError};
use crate::time::Millis;

pub const BLINK_MS: u32 = 1000;
pub const GRAY: RGB8 = RGB8 { r: 127, g: 127, b: 127 };

/// Whether the blink is in its lit half at `time_ms`.
#[must_use]
pub const fn is_on(time_ms: u32) -> bool {
    (time_ms / BLINK_MS) % 2 == 0
}

pub fn render<O, I>(
    strings: &mut [LedString<O>],
    now: Millis,
    interrupt: &I,
) -> Result<RenderOutcome, OutputError>
where
    O: LedOutput,
    I: Interrupt + ?Sized,
{
    let color = if is_on(now.as_u32()) { GRAY } else { RGB8::default() };
    paint(strings, interrupt, |_, _| color)
}
