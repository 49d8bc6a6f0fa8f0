//! Pattern library.
//!
//! Every pattern renders a complete frame for the current instant: it writes
//! every pixel of every string and refreshes each string right after writing
//! it. Nothing assumes the strings were left untouched since the previous
//! call, so patterns can be switched at any tick.

use std::fmt;

use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::output::{LedOutput, LedString, OutputError};
use crate::time::Millis;

pub mod bulbs;
pub mod sparkle;
pub mod test_blink;
pub mod wave;

pub use bulbs::BulbParams;
pub use sparkle::{Sparkle, SparkleParams, TwinkleMemory};
pub use wave::WaveParams;

/// The closed set of patterns the engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// Dim traveling rainbow.
    Wave,
    /// Fading random sparkles over a drifting tint.
    Sparkle,
    /// One lit bulb per group, colors cycling through a small palette.
    #[serde(alias = "discrete_bulbs", alias = "bulbs")]
    DiscreteBulbs,
    /// Whole-string gray blink for checking wiring.
    Test,
}

impl PatternKind {
    pub const ALL: [Self; 4] = [Self::Wave, Self::Sparkle, Self::DiscreteBulbs, Self::Test];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Wave => "wave",
            Self::Sparkle => "sparkle",
            Self::DiscreteBulbs => "bulbs",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Advisory stop signal a pattern polls while writing pixels.
pub trait Interrupt {
    fn is_interrupted(&self) -> bool;
}

impl<F: Fn() -> bool> Interrupt for F {
    fn is_interrupted(&self) -> bool {
        self()
    }
}

/// How a render call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Complete,
    /// Stopped early. Strings already written were still refreshed.
    Interrupted,
}

/// Pixels written between interrupt checks inside one string.
pub const INTERRUPT_CHECK_PIXELS: usize = 32;

/// Write `color_at(string_position, pixel)` to every pixel, string by string.
///
/// The interrupt is checked before each string and every
/// [`INTERRUPT_CHECK_PIXELS`] pixels within it. Once it fires no further
/// pixels are written this tick; a partly written string is still refreshed.
pub(crate) fn paint<O, I, F>(
    strings: &mut [LedString<O>],
    interrupt: &I,
    mut color_at: F,
) -> Result<RenderOutcome, OutputError>
where
    O: LedOutput,
    I: Interrupt + ?Sized,
    F: FnMut(usize, usize) -> RGB8,
{
    for (position, string) in strings.iter_mut().enumerate() {
        if interrupt.is_interrupted() {
            return Ok(RenderOutcome::Interrupted);
        }
        for pixel in 0..string.pixel_count() {
            if pixel > 0 && pixel % INTERRUPT_CHECK_PIXELS == 0 && interrupt.is_interrupted() {
                string.refresh()?;
                return Ok(RenderOutcome::Interrupted);
            }
            string.set_pixel(pixel, color_at(position, pixel))?;
        }
        string.refresh()?;
    }
    Ok(RenderOutcome::Complete)
}

/// Owns the persistent state of every pattern and dispatches renders.
#[derive(Debug)]
pub struct PatternSet {
    wave: WaveParams,
    sparkle: Sparkle,
    bulbs: BulbParams,
}

impl PatternSet {
    /// `pixel_counts` holds the true length of each string, in order.
    #[must_use]
    pub fn new(
        wave: WaveParams,
        sparkle: SparkleParams,
        bulbs: BulbParams,
        tick_period_ms: u32,
        pixel_counts: &[usize],
        seed: u64,
    ) -> Self {
        Self {
            wave,
            sparkle: Sparkle::new(sparkle, tick_period_ms, pixel_counts, seed),
            bulbs,
        }
    }

    /// Called when `kind` becomes the active pattern.
    pub fn activate(&mut self, kind: PatternKind) {
        if kind == PatternKind::Sparkle {
            self.sparkle.reset();
        }
    }

    pub fn sparkle(&self) -> &Sparkle {
        &self.sparkle
    }

    /// Render one frame of `kind`.
    pub fn render<O, I>(
        &mut self,
        kind: PatternKind,
        strings: &mut [LedString<O>],
        now: Millis,
        interrupt: &I,
    ) -> Result<RenderOutcome, OutputError>
    where
        O: LedOutput,
        I: Interrupt + ?Sized,
    {
        match kind {
            PatternKind::Wave => wave::render(&self.wave, strings, now, interrupt),
            PatternKind::Sparkle => self.sparkle.render(strings, now, interrupt),
            PatternKind::DiscreteBulbs => bulbs::render(&self.bulbs, strings, now, interrupt),
            PatternKind::Test => test_blink::render(strings, now, interrupt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemoryOutput;

    fn strings(lens: &[usize]) -> Vec<LedString<MemoryOutput>> {
        lens.iter()
            .enumerate()
            .map(|(i, &len)| LedString::new(i, MemoryOutput::new(len)))
            .collect()
    }

    #[test]
    fn test_pattern_kind_names() {
        assert_eq!(PatternKind::DiscreteBulbs.to_string(), "bulbs");
        let kind: PatternKind = serde_json::from_str("\"discretebulbs\"").unwrap();
        assert_eq!(kind, PatternKind::DiscreteBulbs);
        let kind: PatternKind = serde_json::from_str("\"discrete_bulbs\"").unwrap();
        assert_eq!(kind, PatternKind::DiscreteBulbs);
    }

    #[test]
    fn test_paint_refreshes_every_string() {
        let mut strings = strings(&[3, 5]);
        let outcome = paint(&mut strings, &|| false, |s, p| RGB8::new(s as u8, p as u8, 0)).unwrap();

        assert_eq!(outcome, RenderOutcome::Complete);
        assert_eq!(strings[1].output().shown()[4], RGB8::new(1, 4, 0));
        assert!(strings.iter().all(|s| s.output().refresh_count() == 1));
    }

    #[test]
    fn test_paint_stops_when_interrupted() {
        use std::cell::Cell;

        let mut strings = strings(&[2, 2, 2]);
        let checks = Cell::new(0);
        // Fires on the second check, after the first string was written
        let interrupt = || {
            checks.set(checks.get() + 1);
            checks.get() > 1
        };
        let outcome = paint(&mut strings, &interrupt, |_, _| RGB8::new(1, 1, 1)).unwrap();

        assert_eq!(outcome, RenderOutcome::Interrupted);
        assert_eq!(strings[0].output().refresh_count(), 1);
        assert_eq!(strings[1].output().refresh_count(), 0);
        assert_eq!(strings[2].output().pixels()[0], RGB8::default());
    }

    #[test]
    fn test_paint_stops_inside_a_long_string() {
        use std::cell::Cell;

        let mut strings = strings(&[100]);
        let checks = Cell::new(0);
        // Clear before the string, fires at the first in-string check
        let interrupt = || {
            checks.set(checks.get() + 1);
            checks.get() > 1
        };
        let outcome = paint(&mut strings, &interrupt, |_, _| RGB8::new(2, 2, 2)).unwrap();

        assert_eq!(outcome, RenderOutcome::Interrupted);
        let output = strings[0].output();
        assert_eq!(output.refresh_count(), 1);
        assert!(output.shown()[..INTERRUPT_CHECK_PIXELS]
            .iter()
            .all(|&p| p == RGB8::new(2, 2, 2)));
        assert!(output.shown()[INTERRUPT_CHECK_PIXELS..]
            .iter()
            .all(|&p| p == RGB8::default()));
    }
}
