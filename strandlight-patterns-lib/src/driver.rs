//! Frame Driver: the periodic render step.
//!
//! Each [`FrameDriver::tick`] gates on [`SystemState`], makes the scheduling
//! decision under a non-blocking lock, then renders one frame of whatever
//! pattern is active. The caller owns the cadence.

use std::sync::Arc;

use log::{debug, info};

use crate::config::{ConfigError, EngineConfig};
use crate::control::{ControlSnapshot, SharedControl, SystemState};
use crate::output::{LedOutput, LedString, OutputError};
use crate::patterns::{PatternKind, PatternSet, RenderOutcome};
use crate::time::Millis;

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// System state forces everything off.
    Off,
    /// All-off transition frame after an auto advance or manual timeout.
    Blackout,
    Rendered { kind: PatternKind, interrupted: bool },
    /// The control lock was busy; rendered the selection seen last tick.
    Stale { kind: PatternKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Advance,
    ManualTimeout,
}

pub struct FrameDriver {
    control: Arc<SharedControl>,
    patterns: PatternSet,
    system_state: SystemState,
    pattern_duration_ms: u32,
    manual_timeout_ms: u32,
    last: ControlSnapshot,
    active: Option<PatternKind>,
    /// Set when rotation resumes after an off or test state.
    restart_timer: bool,
}

impl FrameDriver {
    /// `pixel_counts` are the true lengths of the strings that will be
    /// passed to [`tick`](Self::tick), in order.
    pub fn new(
        config: &EngineConfig,
        control: Arc<SharedControl>,
        pixel_counts: &[usize],
        seed: u64,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let patterns = PatternSet::new(
            config.wave,
            config.sparkle,
            config.bulbs,
            config.tick_period_ms,
            pixel_counts,
            seed,
        );
        let last = control.snapshot();
        Ok(Self {
            control,
            patterns,
            system_state: config.system_state,
            pattern_duration_ms: config.pattern_duration_ms,
            manual_timeout_ms: config.manual_timeout_ms,
            last,
            active: None,
            restart_timer: false,
        })
    }

    pub fn control(&self) -> &Arc<SharedControl> {
        &self.control
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub const fn system_state(&self) -> SystemState {
        self.system_state
    }

    /// Time spent in a state without rotation doesn't count towards the
    /// current pattern's duration or the manual hold.
    pub fn set_system_state(&mut self, state: SystemState) {
        if state != self.system_state {
            info!("System state: {} -> {}", self.system_state, state);
            if !self.system_state.rotates() && state.rotates() {
                self.restart_timer = true;
            }
            self.system_state = state;
        }
    }

    /// Selection used by the most recent tick that got the lock.
    pub const fn last_snapshot(&self) -> ControlSnapshot {
        self.last
    }

    pub fn tick<O: LedOutput>(
        &mut self,
        now: Millis,
        strings: &mut [LedString<O>],
    ) -> Result<TickReport, OutputError> {
        if !self.system_state.runs_patterns() {
            for string in strings.iter_mut() {
                string.blank()?;
            }
            self.active = None;
            return Ok(TickReport::Off);
        }

        if self.system_state == SystemState::Test {
            self.activate(PatternKind::Test);
            self.patterns
                .render(PatternKind::Test, strings, now, &|| false)?;
            return Ok(TickReport::Rendered {
                kind: PatternKind::Test,
                interrupted: false,
            });
        }

        let pattern_duration_ms = self.pattern_duration_ms;
        let manual_timeout_ms = self.manual_timeout_ms;
        let restart_timer = self.restart_timer;
        let decision = self.control.try_apply(|state| {
            if restart_timer {
                state.restart_timer(now);
            }
            state.take_interrupt();
            let elapsed = state.elapsed(now);
            let transition = if state.is_manual() {
                (elapsed >= manual_timeout_ms).then(|| {
                    state.resume_auto(now);
                    Transition::ManualTimeout
                })
            } else {
                (elapsed >= pattern_duration_ms).then(|| {
                    state.advance_auto(now);
                    Transition::Advance
                })
            };
            (state.snapshot(), transition)
        });

        let stale = match decision {
            Some((snapshot, transition)) => {
                self.last = snapshot;
                if restart_timer {
                    debug!("Rotation resumed, timer restarted at {now}");
                    self.restart_timer = false;
                }
                if let Some(transition) = transition {
                    match transition {
                        Transition::Advance => {
                            info!("Auto advance to pattern {} ({})", snapshot.index, snapshot.kind);
                        }
                        Transition::ManualTimeout => {
                            info!("Manual hold timed out, auto rotation from {}", snapshot.kind);
                        }
                    }
                    for string in strings.iter_mut() {
                        string.blank()?;
                    }
                    return Ok(TickReport::Blackout);
                }
                false
            }
            None => {
                debug!("Control busy, keeping {}", self.last.kind);
                true
            }
        };

        let kind = self.last.kind;
        self.activate(kind);

        let control = &self.control;
        let interrupt = || control.is_interrupted();
        let outcome = self.patterns.render(kind, strings, now, &interrupt)?;

        Ok(if stale {
            TickReport::Stale { kind }
        } else {
            TickReport::Rendered {
                kind,
                interrupted: outcome == RenderOutcome::Interrupted,
            }
        })
    }

    fn activate(&mut self, kind: PatternKind) {
        if self.active != Some(kind) {
            debug!("Activating {kind}");
            self.patterns.activate(kind);
            self.active = Some(kind);
        }
    }
}
