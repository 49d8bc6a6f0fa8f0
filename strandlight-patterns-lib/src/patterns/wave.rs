//! Traveling hue wave.
//!
//! Hue at pixel `j` is `(t / cycle * 360 - phase(j) + 360) mod 360` where
//! `cycle = pixels_per_cycle * ms_per_pixel` and
//! `phase(j) = j * (360 / pixels_per_cycle) mod 360`. Saturation is full and
//! the value is kept low so the pattern works as ambient light.

use serde::{Deserialize, Serialize};

use super::{paint, Interrupt, RenderOutcome};
use crate::color::hsv_to_rgb;
use crate::output::{LedOutput, LedString, OutputError};
use crate::time::Millis;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Pixels spanned by one full trip around the hue circle.
    pub pixels_per_cycle: u32,
    /// How long the wave takes to move one pixel.
    pub ms_per_pixel: u32,
    /// HSV value, `0.0..=1.0`.
    pub value: f32,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            pixels_per_cycle: 30,
            ms_per_pixel: 100,
            value: 0.15,
        }
    }
}

impl WaveParams {
    /// Period of the wave in milliseconds, never zero.
    #[must_use]
    pub fn cycle_ms(&self) -> u32 {
        self.pixels_per_cycle
            .max(1)
            .saturating_mul(self.ms_per_pixel)
            .max(1)
    }
}

/// Hue in degrees at `pixel` at time `time_ms`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn wave_hue(time_ms: u32, pixel: usize, params: &WaveParams) -> f32 {
    let cycle_ms = params.cycle_ms();
    let pixels_per_cycle = params.pixels_per_cycle.max(1);

    // Position within the current period keeps the float math small
    let base = (time_ms % cycle_ms) as f32 / cycle_ms as f32 * 360.0;

    // pixel % pixels_per_cycle fits in u32
    #[allow(clippy::cast_possible_truncation)]
    let steps = (pixel % pixels_per_cycle as usize) as u32;
    let phase = steps as f32 * (360.0 / pixels_per_cycle as f32);

    (base - phase + 360.0) % 360.0
}

pub fn render<O, I>(
    params: &WaveParams,
    strings: &mut [LedString<O>],
    now: Millis,
    interrupt: &I,
) -> Result<RenderOutcome, OutputError>
where
    O: LedOutput,
    I: Interrupt + ?Sized,
{
    let time_ms = now.as_u32();
    paint(strings, interrupt, |_, pixel| {
        hsv_to_rgb(wave_hue(time_ms, pixel, params), 1.0, params.value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemoryOutput;
    use rgb::RGB8;

    const EPS: f32 = 0.01;

    fn circular_diff(a: f32, b: f32) -> f32 {
        let d = (a - b).rem_euclid(360.0);
        d.min(360.0 - d)
    }

    #[test]
    fn test_hue_is_periodic() {
        let params = WaveParams::default();
        let cycle = params.cycle_ms();
        assert_eq!(cycle, 3000);

        for t in [0, 17, 1234, 2999] {
            let a = wave_hue(t, 0, &params);
            let b = wave_hue(t + cycle, 0, &params);
            assert!(circular_diff(a, b) < EPS, "t={t}: {a} vs {b}");
        }
    }

    #[test]
    fn test_hue_rises_within_period() {
        let params = WaveParams::default();
        let mut last = wave_hue(0, 0, &params);
        assert!(last.abs() < EPS);
        for t in (100..3000).step_by(100) {
            let hue = wave_hue(t, 0, &params);
            assert!(hue >= last, "hue fell at t={t}");
            last = hue;
        }
        // Wraps back to zero at the period boundary
        assert!(wave_hue(3000, 0, &params).abs() < EPS);
    }

    #[test]
    fn test_pixel_phase_offset() {
        let params = WaveParams::default();
        let step = 360.0 / params.pixels_per_cycle as f32;
        for t in [0, 450, 2100] {
            let h0 = wave_hue(t, 0, &params);
            for j in [1usize, 5, 29, 30, 47] {
                let expected = (h0 - j as f32 * step).rem_euclid(360.0);
                let hue = wave_hue(t, j, &params);
                assert!(circular_diff(hue, expected) < EPS, "t={t} j={j}: {hue} vs {expected}");
            }
        }
    }

    #[test]
    fn test_hue_stays_in_range() {
        let params = WaveParams {
            pixels_per_cycle: 7,
            ms_per_pixel: 13,
            value: 0.15,
        };
        for t in (0..500).step_by(7) {
            for j in 0..20 {
                let hue = wave_hue(t, j, &params);
                assert!((0.0..360.0).contains(&hue));
            }
        }
    }

    #[test]
    fn test_render_is_dim_and_refreshes() {
        let params = WaveParams::default();
        let mut strings = vec![LedString::new(0, MemoryOutput::new(4))];
        render(&params, &mut strings, Millis(0), &|| false).unwrap();

        let shown = strings[0].output().shown();
        // Pixel 0 at t=0 is red at the configured value
        assert_eq!(shown[0], RGB8::new(38, 0, 0));
        assert!(shown.iter().all(|p| p.r <= 38 && p.g <= 38 && p.b <= 38));
        assert_eq!(strings[0].output().refresh_count(), 1);
    }
}
