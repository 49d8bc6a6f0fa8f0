//! Shared control state.
//!
//! [`ControlState`] is the only record both the Frame Driver and the command
//! listener mutate. It lives behind a single mutex in [`SharedControl`],
//! which offers two ways in:
//!
//! - [`SharedControl::apply`] blocks until the lock is free. Operator
//!   commands use it, they must eventually take effect.
//! - [`SharedControl::try_apply`] / [`SharedControl::try_snapshot`] never
//!   wait. The Frame Driver uses them; when the lock is held by a command in
//!   flight it gets `None` and carries on with the selection it saw last
//!   tick. A command therefore takes effect at most one tick late, and the
//!   render cadence never waits on command processing.
//!
//! Critical sections are a read-decide-write of plain data. The lock is
//! never held across a render or any I/O.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::patterns::PatternKind;
use crate::time::Millis;

/// Whole-system state gating the Frame Driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    Startup,
    Day,
    #[default]
    NightOn,
    NightOff,
    /// Wiring check: every string blinks gray.
    Test,
}

impl SystemState {
    /// Whether anything but all-off is rendered in this state.
    #[must_use]
    pub const fn runs_patterns(self) -> bool {
        matches!(self, Self::NightOn | Self::Test)
    }

    /// Whether the auto rotation and manual hold timers run in this state.
    #[must_use]
    pub const fn rotates(self) -> bool {
        matches!(self, Self::NightOn)
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Startup => "startup",
            Self::Day => "day",
            Self::NightOn => "night-on",
            Self::NightOff => "night-off",
            Self::Test => "test",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Auto,
    Manual,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// A manual selection named an index past the enabled patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectError {
    pub requested: u32,
    pub count: usize,
}

impl fmt::Display for SelectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pattern index {} out of range (0..{})",
            self.requested, self.count
        )
    }
}

impl std::error::Error for SelectError {}

/// Which pattern is active and why.
///
/// `current_index` is always a valid index into `enabled_patterns`, which is
/// never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    enabled_patterns: Vec<PatternKind>,
    current_index: usize,
    manual: bool,
    pattern_start: Millis,
    interrupted: bool,
}

impl ControlState {
    /// Auto mode on the first enabled pattern, started at `now`.
    pub fn new(enabled_patterns: Vec<PatternKind>, now: Millis) -> Result<Self, ConfigError> {
        if enabled_patterns.is_empty() {
            return Err(ConfigError::NoPatterns);
        }
        Ok(Self {
            enabled_patterns,
            current_index: 0,
            manual: false,
            pattern_start: now,
            interrupted: false,
        })
    }

    #[must_use]
    pub fn enabled_patterns(&self) -> &[PatternKind] {
        &self.enabled_patterns
    }

    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.enabled_patterns.len()
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn current_kind(&self) -> PatternKind {
        self.enabled_patterns[self.current_index]
    }

    #[must_use]
    pub const fn is_manual(&self) -> bool {
        self.manual
    }

    #[must_use]
    pub const fn selection(&self) -> Selection {
        if self.manual {
            Selection::Manual
        } else {
            Selection::Auto
        }
    }

    #[must_use]
    pub const fn pattern_start(&self) -> Millis {
        self.pattern_start
    }

    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Time the current pattern (or manual hold) has been running.
    #[must_use]
    pub const fn elapsed(&self, now: Millis) -> u32 {
        now.elapsed_since(self.pattern_start)
    }

    /// Operator `n`: next pattern, manual.
    pub fn select_next(&mut self, now: Millis) -> usize {
        let next = (self.current_index + 1) % self.pattern_count();
        self.select(next, now);
        next
    }

    /// Operator `p`: previous pattern, manual.
    pub fn select_previous(&mut self, now: Millis) -> usize {
        let count = self.pattern_count();
        let previous = (self.current_index + count - 1) % count;
        self.select(previous, now);
        previous
    }

    /// Operator digits: jump to `index`, manual. Out of range leaves the
    /// state untouched.
    pub fn select_index(&mut self, index: u32, now: Millis) -> Result<usize, SelectError> {
        let count = self.pattern_count();
        match usize::try_from(index) {
            Ok(i) if i < count => {
                self.select(i, now);
                Ok(i)
            }
            _ => Err(SelectError {
                requested: index,
                count,
            }),
        }
    }

    /// Operator `a`, and the manual-hold timeout: back to auto rotation
    /// from the first pattern.
    pub fn resume_auto(&mut self, now: Millis) {
        self.manual = false;
        self.current_index = 0;
        self.pattern_start = now;
    }

    /// Auto rotation step to the next pattern.
    pub fn advance_auto(&mut self, now: Millis) -> usize {
        self.current_index = (self.current_index + 1) % self.pattern_count();
        self.pattern_start = now;
        self.current_index
    }

    /// Restart the current pattern's (or manual hold's) clock without
    /// changing the selection.
    pub fn restart_timer(&mut self, now: Millis) {
        self.pattern_start = now;
    }

    /// Clear the interrupt flag, returning whether it was set.
    pub fn take_interrupt(&mut self) -> bool {
        std::mem::take(&mut self.interrupted)
    }

    fn select(&mut self, index: usize, now: Millis) {
        self.current_index = index;
        self.manual = true;
        self.pattern_start = now;
        self.interrupted = true;
    }

    #[must_use]
    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            index: self.current_index,
            kind: self.current_kind(),
            manual: self.manual,
            interrupted: self.interrupted,
            pattern_start: self.pattern_start,
            pattern_count: self.pattern_count(),
        }
    }
}

/// Copy of the control state taken under the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub index: usize,
    pub kind: PatternKind,
    pub manual: bool,
    pub interrupted: bool,
    pub pattern_start: Millis,
    pub pattern_count: usize,
}

impl ControlSnapshot {
    #[must_use]
    pub const fn selection(&self) -> Selection {
        if self.manual {
            Selection::Manual
        } else {
            Selection::Auto
        }
    }
}

/// The control state and its lock, shared by reference (usually in an
/// `Arc`) between the Frame Driver and the command listener.
#[derive(Debug)]
pub struct SharedControl {
    state: Mutex<ControlState>,
}

impl SharedControl {
    #[must_use]
    pub fn new(state: ControlState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Blocking read-modify-write.
    pub fn apply<R>(&self, f: impl FnOnce(&mut ControlState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Non-blocking read-modify-write. `None` means the lock was busy and
    /// nothing ran; the caller keeps using its last snapshot.
    pub fn try_apply<R>(&self, f: impl FnOnce(&mut ControlState) -> R) -> Option<R> {
        self.try_lock().map(|mut guard| f(&mut guard))
    }

    /// Blocking snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ControlSnapshot {
        self.lock().snapshot()
    }

    /// Non-blocking snapshot, `None` when the lock is busy.
    #[must_use]
    pub fn try_snapshot(&self) -> Option<ControlSnapshot> {
        self.try_lock().map(|guard| guard.snapshot())
    }

    /// Advisory interrupt check for patterns. A busy lock reads as "not
    /// interrupted"; the next tick will see the flag.
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        self.try_lock().is_some_and(|guard| guard.interrupted)
    }

    // A panic while holding the lock can't leave ControlState half-updated
    // in a way that breaks its invariant, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, ControlState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_lock(&self) -> Option<MutexGuard<'_, ControlState>> {
        match self.state.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PatternKind::{DiscreteBulbs, Sparkle, Wave};

    fn state() -> ControlState {
        ControlState::new(vec![Wave, Sparkle, DiscreteBulbs], Millis(0)).unwrap()
    }

    #[test]
    fn test_empty_patterns_rejected() {
        assert_eq!(
            ControlState::new(Vec::new(), Millis(0)),
            Err(ConfigError::NoPatterns)
        );
    }

    #[test]
    fn test_next_wraps_and_sets_flags() {
        let mut s = state();
        assert_eq!(s.select_next(Millis(10)), 1);
        assert!(s.is_manual());
        assert!(s.is_interrupted());
        assert_eq!(s.pattern_start(), Millis(10));

        assert_eq!(s.select_next(Millis(20)), 2);
        assert_eq!(s.select_next(Millis(30)), 0);
        assert_eq!(s.current_kind(), Wave);
    }

    #[test]
    fn test_previous_wraps() {
        let mut s = state();
        assert_eq!(s.select_previous(Millis(5)), 2);
        assert_eq!(s.current_kind(), DiscreteBulbs);
        assert!(s.is_manual());
        assert_eq!(s.select_previous(Millis(6)), 1);
    }

    #[test]
    fn test_select_index_bounds() {
        let mut s = state();
        assert_eq!(s.select_index(2, Millis(1)), Ok(2));
        assert_eq!(s.current_kind(), DiscreteBulbs);

        let before = s.clone();
        assert_eq!(
            s.select_index(3, Millis(2)),
            Err(SelectError {
                requested: 3,
                count: 3
            })
        );
        assert_eq!(s, before);
    }

    #[test]
    fn test_resume_auto_resets_to_first() {
        let mut s = state();
        s.select_index(2, Millis(1)).unwrap();
        s.resume_auto(Millis(50));
        assert!(!s.is_manual());
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.pattern_start(), Millis(50));
    }

    #[test]
    fn test_take_interrupt_clears_once() {
        let mut s = state();
        s.select_next(Millis(1));
        assert!(s.take_interrupt());
        assert!(!s.take_interrupt());
        assert!(!s.is_interrupted());
    }

    #[test]
    fn test_single_pattern_navigation() {
        let mut s = ControlState::new(vec![Sparkle], Millis(0)).unwrap();
        assert_eq!(s.select_next(Millis(1)), 0);
        assert_eq!(s.select_previous(Millis(2)), 0);
        assert_eq!(s.advance_auto(Millis(3)), 0);
    }

    #[test]
    fn test_try_apply_fails_while_locked() {
        let shared = SharedControl::new(state());
        let guard = shared.lock();
        assert!(shared.try_apply(|s| s.advance_auto(Millis(1))).is_none());
        assert!(shared.try_snapshot().is_none());
        assert!(!shared.is_interrupted());
        drop(guard);

        assert_eq!(shared.try_apply(|s| s.advance_auto(Millis(1))), Some(1));
        assert_eq!(shared.snapshot().index, 1);
    }

    #[test]
    fn test_interrupt_visible_through_shared() {
        let shared = SharedControl::new(state());
        shared.apply(|s| s.select_next(Millis(3)));
        assert!(shared.is_interrupted());
        let snap = shared.try_snapshot().unwrap();
        assert_eq!(snap.selection(), Selection::Manual);
        assert_eq!(snap.kind, Sparkle);
    }

    #[test]
    fn test_system_state_gating() {
        assert!(SystemState::NightOn.runs_patterns());
        assert!(SystemState::Test.runs_patterns());
        assert!(!SystemState::Day.runs_patterns());
        assert!(!SystemState::NightOff.runs_patterns());
        assert!(!SystemState::Startup.runs_patterns());
    }
}
