//! Monotonic millisecond ticks.
//!
//! The counter is 32 bits wide and wraps after ~49.7 days of uptime. Every
//! timeout in the engine is evaluated with [`Millis::elapsed_since`], which
//! uses wrapping subtraction, so comparisons stay correct across the wrap as
//! long as the interval being measured is shorter than the wrap period.

use std::fmt;

/// A point on the wrapping millisecond counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Millis(pub u32);

impl Millis {
    #[must_use]
    pub const fn new(ms: u32) -> Self {
        Self(ms)
    }

    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Milliseconds from `earlier` to `self`, wraparound-safe.
    #[must_use]
    pub const fn elapsed_since(self, earlier: Self) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    /// `self + ms`, wrapping.
    #[must_use]
    pub const fn wrapping_add(self, ms: u32) -> Self {
        Self(self.0.wrapping_add(ms))
    }
}

impl fmt::Display for Millis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of the current tick.
pub trait Clock {
    fn now(&self) -> Millis;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_simple() {
        assert_eq!(Millis(1500).elapsed_since(Millis(500)), 1000);
        assert_eq!(Millis(7).elapsed_since(Millis(7)), 0);
    }

    #[test]
    fn test_elapsed_across_wrap() {
        let start = Millis(u32::MAX - 99);
        let now = start.wrapping_add(250);
        assert_eq!(now, Millis(150));
        assert_eq!(now.elapsed_since(start), 250);
    }
}
