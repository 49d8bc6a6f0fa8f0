//! Frost twinkle: independent fading sparkles over a slowly shifting tint.
//!
//! Each string has a [`TwinkleMemory`] holding the current color of every
//! pixel. Every tick all stored channels decay by `(255 - decay_pct) / 255`.
//! Every `sparkle_interval_ms` a percentage of pixels is picked at random and
//! set to full brightness in the current drift color (or white, with
//! probability `white_pct`), and the drift advances: hue moves by
//! `hue_step` degrees and saturation bounces between a floor and 255.

use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use super::{paint, Interrupt, RenderOutcome};
use crate::color::hsv_to_rgb;
use crate::output::{LedOutput, LedString, OutputError};
use crate::time::Millis;

/// Saturation floor when white sparkles are disabled.
pub const SATURATION_FLOOR: u8 = 128;

/// Saturation floor when white sparkles are enabled. Higher so the mix of
/// white sparkles and a washed-out tint doesn't read as all white.
pub const SATURATION_FLOOR_WITH_WHITE: u8 = 192;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparkleParams {
    /// Time for a sparkle to fade out.
    pub fade_ms: u32,
    /// Cadence of new sparkles and of the hue/saturation drift.
    pub sparkle_interval_ms: u32,
    /// Percentage of each string's pixels lit per sparkle round.
    pub sparkle_pct: u8,
    /// Percent chance that a new sparkle is white.
    pub white_pct: u8,
    /// Hue advance per sparkle round, degrees.
    pub hue_step: f32,
    /// Saturation change per sparkle round.
    pub saturation_step: u8,
}

impl Default for SparkleParams {
    fn default() -> Self {
        Self {
            fade_ms: 1500,
            sparkle_interval_ms: 100,
            sparkle_pct: 4,
            white_pct: 20,
            hue_step: 1.0,
            saturation_step: 2,
        }
    }
}

impl SparkleParams {
    #[must_use]
    pub const fn saturation_floor(&self) -> u8 {
        if self.white_pct > 0 {
            SATURATION_FLOOR_WITH_WHITE
        } else {
            SATURATION_FLOOR
        }
    }
}

/// Per-tick decay amount out of 255.
///
/// `255 * tick_ms * 6 / fade_ms`, clamped to `1..=255`. Never zero, so
/// sparkles always fade out eventually.
#[must_use]
pub fn decay_pct(tick_ms: u32, fade_ms: u32) -> u8 {
    if fade_ms == 0 {
        return u8::MAX;
    }
    let raw = 255 * u64::from(tick_ms) * 6 / u64::from(fade_ms);
    // Clamped into u8 range first
    #[allow(clippy::cast_possible_truncation)]
    let pct = raw.clamp(1, 255) as u8;
    pct
}

/// Scale one channel by `(255 - pct) / 255`, truncating.
#[inline]
#[must_use]
pub fn decay_channel(v: u8, pct: u8) -> u8 {
    let scaled = u16::from(v) * u16::from(u8::MAX - pct) / 255;
    // scaled <= v
    #[allow(clippy::cast_possible_truncation)]
    let out = scaled as u8;
    out
}

/// Persistent per-pixel color of one string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwinkleMemory {
    pixels: Vec<RGB8>,
}

impl TwinkleMemory {
    /// Memory for a string of exactly `len` pixels.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            pixels: vec![RGB8::default(); len],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<RGB8> {
        self.pixels.get(index).copied()
    }

    pub fn set(&mut self, index: usize, color: RGB8) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    pub fn decay(&mut self, pct: u8) {
        for pixel in &mut self.pixels {
            pixel.r = decay_channel(pixel.r, pct);
            pixel.g = decay_channel(pixel.g, pct);
            pixel.b = decay_channel(pixel.b, pct);
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(RGB8::default());
    }

    #[must_use]
    pub fn is_dark(&self) -> bool {
        self.pixels.iter().all(|&p| p == RGB8::default())
    }
}

/// Slowly drifting hue and bouncing saturation shared by all strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drift {
    pub hue: f32,
    pub saturation: u8,
    rising: bool,
}

impl Default for Drift {
    fn default() -> Self {
        Self {
            hue: 0.0,
            saturation: u8::MAX,
            rising: false,
        }
    }
}

impl Drift {
    pub fn step(&mut self, hue_step: f32, saturation_step: u8, floor: u8) {
        self.hue = (self.hue + hue_step).rem_euclid(360.0);

        if self.rising {
            self.saturation = self.saturation.saturating_add(saturation_step);
            if self.saturation == u8::MAX {
                self.rising = false;
            }
        } else {
            self.saturation = self.saturation.saturating_sub(saturation_step).max(floor);
            if self.saturation <= floor {
                self.rising = true;
            }
        }
    }
}

/// Sparkle pattern state.
#[derive(Debug)]
pub struct Sparkle {
    params: SparkleParams,
    decay_pct: u8,
    memories: Vec<TwinkleMemory>,
    drift: Drift,
    rng: SmallRng,
    last_round: Option<Millis>,
}

impl Sparkle {
    #[must_use]
    pub fn new(params: SparkleParams, tick_period_ms: u32, pixel_counts: &[usize], seed: u64) -> Self {
        let decay_pct = decay_pct(tick_period_ms, params.fade_ms);
        debug!(
            "Sparkle: fade {}ms at {tick_period_ms}ms ticks -> decay {decay_pct}/255",
            params.fade_ms
        );
        Self {
            params,
            decay_pct,
            memories: pixel_counts.iter().map(|&len| TwinkleMemory::new(len)).collect(),
            drift: Drift::default(),
            rng: SmallRng::seed_from_u64(seed),
            last_round: None,
        }
    }

    /// Forget all sparkles and restart the drift.
    pub fn reset(&mut self) {
        for memory in &mut self.memories {
            memory.clear();
        }
        self.drift = Drift::default();
        self.last_round = None;
    }

    #[must_use]
    pub const fn decay_pct(&self) -> u8 {
        self.decay_pct
    }

    #[must_use]
    pub const fn drift(&self) -> Drift {
        self.drift
    }

    #[must_use]
    pub fn memories(&self) -> &[TwinkleMemory] {
        &self.memories
    }

    /// Resize memories if the strings don't match what we were built for.
    fn match_strings<O: LedOutput>(&mut self, strings: &[LedString<O>]) {
        let matches = self.memories.len() == strings.len()
            && self
                .memories
                .iter()
                .zip(strings)
                .all(|(m, s)| m.len() == s.pixel_count());
        if !matches {
            debug!("Sparkle: resizing memory for {} strings", strings.len());
            self.memories = strings
                .iter()
                .map(|s| TwinkleMemory::new(s.pixel_count()))
                .collect();
        }
    }

    /// Advance one tick: decay, then maybe start a sparkle round.
    pub fn step(&mut self, now: Millis) {
        for memory in &mut self.memories {
            memory.decay(self.decay_pct);
        }

        let due = self
            .last_round
            .map_or(true, |last| now.elapsed_since(last) >= self.params.sparkle_interval_ms);
        if !due {
            return;
        }
        self.last_round = Some(now);

        let tint = hsv_to_rgb(
            self.drift.hue,
            f32::from(self.drift.saturation) / 255.0,
            1.0,
        );
        let white = RGB8::new(u8::MAX, u8::MAX, u8::MAX);

        for memory in &mut self.memories {
            let len = memory.len();
            if len == 0 || self.params.sparkle_pct == 0 {
                continue;
            }
            let count = (len * usize::from(self.params.sparkle_pct) / 100).max(1);
            for _ in 0..count {
                let index = self.rng.gen_range(0..len);
                let is_white = self.rng.gen_range(0..100u8) < self.params.white_pct;
                memory.set(index, if is_white { white } else { tint });
            }
        }

        self.drift.step(
            self.params.hue_step,
            self.params.saturation_step,
            self.params.saturation_floor(),
        );
    }

    pub fn render<O, I>(
        &mut self,
        strings: &mut [LedString<O>],
        now: Millis,
        interrupt: &I,
    ) -> Result<RenderOutcome, OutputError>
    where
        O: LedOutput,
        I: Interrupt + ?Sized,
    {
        self.match_strings(strings);
        self.step(now);

        let memories = &self.memories;
        paint(strings, interrupt, |position, pixel| {
            memories
                .get(position)
                .and_then(|m| m.get(pixel))
                .unwrap_or_default()
        })
    }
}
