//! End-to-end behaviour of the engine: operator input through the listener,
//! Frame Driver ticks and the in-memory strings, on a manually stepped clock.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use strandlight_patterns_lib::patterns::sparkle;
use strandlight_patterns_lib::{
    ChannelError, Clock, CommandChannel, ControlState, EngineConfig, FrameDriver, LedString,
    Listener, MemoryOutput, Millis, PatternKind, Reply, SharedControl, TickReport, RGB8,
};

#[derive(Clone, Default)]
struct ManualClock(Rc<Cell<u32>>);

impl ManualClock {
    fn set(&self, ms: u32) {
        self.0.set(ms);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Millis {
        Millis(self.0.get())
    }
}

#[derive(Clone, Default)]
struct LoopbackChannel {
    input: Rc<RefCell<VecDeque<u8>>>,
    output: Rc<RefCell<Vec<String>>>,
}

impl LoopbackChannel {
    fn type_str(&self, s: &str) {
        self.input.borrow_mut().extend(s.bytes());
    }

    fn last_line(&self) -> Option<String> {
        self.output.borrow().last().cloned()
    }
}

impl CommandChannel for LoopbackChannel {
    fn read_byte(&mut self, _timeout: Duration) -> Result<Option<u8>, ChannelError> {
        Ok(self.input.borrow_mut().pop_front())
    }

    fn write_line(&mut self, line: &str) -> Result<(), ChannelError> {
        self.output.borrow_mut().push(line.to_string());
        Ok(())
    }
}

struct Rig {
    clock: ManualClock,
    channel: LoopbackChannel,
    control: Arc<SharedControl>,
    driver: FrameDriver,
    listener: Listener<LoopbackChannel, ManualClock>,
    strings: Vec<LedString<MemoryOutput>>,
}

impl Rig {
    fn new(config: &EngineConfig, lens: &[usize]) -> Self {
        let clock = ManualClock::default();
        let channel = LoopbackChannel::default();
        let control = Arc::new(SharedControl::new(
            ControlState::new(config.enabled_patterns.clone(), clock.now()).unwrap(),
        ));
        let driver = FrameDriver::new(config, Arc::clone(&control), lens, 7).unwrap();
        let listener = Listener::new(channel.clone(), clock.clone(), Arc::clone(&control));
        let strings = lens
            .iter()
            .enumerate()
            .map(|(i, &len)| LedString::new(i, MemoryOutput::new(len)))
            .collect();
        Self {
            clock,
            channel,
            control,
            driver,
            listener,
            strings,
        }
    }

    fn tick(&mut self, ms: u32) -> TickReport {
        self.clock.set(ms);
        self.driver.tick(Millis(ms), &mut self.strings).unwrap()
    }

    /// Service the listener until the typed input is drained.
    fn command(&mut self, ms: u32, input: &str) -> Vec<Reply> {
        self.clock.set(ms);
        self.channel.type_str(input);
        let mut replies = Vec::new();
        while !self.channel.input.borrow().is_empty() {
            replies.extend(self.listener.service().unwrap());
        }
        replies
    }

    fn idle(&mut self, ms: u32) -> Vec<Reply> {
        self.clock.set(ms);
        self.listener.service().unwrap().into_vec()
    }

    fn lit(&self, string: usize) -> usize {
        self.strings[string]
            .output()
            .shown()
            .iter()
            .filter(|&&p| p != RGB8::default())
            .count()
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        pattern_duration_ms: 1000,
        manual_timeout_ms: 5000,
        ..EngineConfig::default()
    }
}

#[test]
fn operator_session() {
    let mut rig = Rig::new(&config(), &[30, 13]);

    for t in (0..100).step_by(20) {
        assert!(matches!(rig.tick(t), TickReport::Rendered { kind: PatternKind::Wave, .. }));
    }

    let replies = rig.command(100, "n");
    assert_eq!(
        replies,
        vec![Reply::Selected {
            index: 1,
            kind: PatternKind::Sparkle
        }]
    );
    assert_eq!(rig.channel.last_line().as_deref(), Some("pattern 1: sparkle (manual)"));
    assert_eq!(
        rig.tick(120),
        TickReport::Rendered {
            kind: PatternKind::Sparkle,
            interrupted: false
        }
    );

    // Manual hold ignores the auto duration
    for t in (140..2100).step_by(20) {
        assert!(matches!(rig.tick(t), TickReport::Rendered { kind: PatternKind::Sparkle, .. }));
    }

    // Single digit, committed by the inactivity timeout
    assert!(rig.command(2100, "2").is_empty());
    assert!(rig.idle(2500).is_empty());
    assert_eq!(
        rig.idle(3100),
        vec![Reply::Selected {
            index: 2,
            kind: PatternKind::DiscreteBulbs
        }]
    );
    assert!(matches!(
        rig.tick(3120),
        TickReport::Rendered {
            kind: PatternKind::DiscreteBulbs,
            ..
        }
    ));
    assert_eq!(rig.lit(0), 5);
    assert_eq!(rig.lit(1), 3);

    let before = rig.control.snapshot();
    let replies = rig.command(3200, "9\n");
    assert_eq!(replies.len(), 1);
    assert!(matches!(replies[0], Reply::Rejected(_)));
    assert_eq!(
        rig.channel.last_line().as_deref(),
        Some("rejected: pattern index 9 out of range (0..3)")
    );
    assert_eq!(rig.control.snapshot(), before);

    // Resume renders the first pattern straight away, then rotates
    assert_eq!(
        rig.command(4000, "a"),
        vec![Reply::AutoResumed {
            kind: PatternKind::Wave
        }]
    );
    assert!(matches!(rig.tick(4020), TickReport::Rendered { kind: PatternKind::Wave, .. }));
    assert!(matches!(rig.tick(4980), TickReport::Rendered { kind: PatternKind::Wave, .. }));
    assert_eq!(rig.tick(5000), TickReport::Blackout);
    assert_eq!(rig.lit(0) + rig.lit(1), 0);
    assert!(matches!(rig.tick(5020), TickReport::Rendered { kind: PatternKind::Sparkle, .. }));
}

#[test]
fn manual_hold_expires_without_input() {
    let mut rig = Rig::new(&config(), &[10]);
    rig.tick(0);
    rig.command(10, "p");
    assert_eq!(rig.control.snapshot().kind, PatternKind::DiscreteBulbs);

    for t in (20..5010).step_by(20) {
        assert!(!matches!(rig.tick(t), TickReport::Blackout), "t={t}");
    }
    assert_eq!(rig.tick(5010), TickReport::Blackout);
    let snap = rig.control.snapshot();
    assert!(!snap.manual);
    assert_eq!(snap.index, 0);
}

#[test]
fn sparkle_memory_follows_string_lengths() {
    let config = EngineConfig {
        enabled_patterns: vec![PatternKind::Sparkle],
        ..EngineConfig::default()
    };
    let mut rig = Rig::new(&config, &[5, 120, 37]);
    for t in (0..2000).step_by(20) {
        rig.tick(t);
    }

    let lens: Vec<usize> = rig
        .driver
        .patterns()
        .sparkle()
        .memories()
        .iter()
        .map(sparkle::TwinkleMemory::len)
        .collect();
    assert_eq!(lens, vec![5, 120, 37]);
    // Something sparkled on the longest string
    assert!(rig.lit(1) > 0);
}

#[test]
fn busy_lock_never_stalls_the_driver() {
    let config = config();
    let control = Arc::new(SharedControl::new(
        ControlState::new(config.enabled_patterns.clone(), Millis(0)).unwrap(),
    ));
    let mut driver = FrameDriver::new(&config, Arc::clone(&control), &[8], 3).unwrap();
    let mut strings = vec![LedString::new(0, MemoryOutput::new(8))];
    driver.tick(Millis(0), &mut strings).unwrap();

    let locked = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let commander = {
        let control = Arc::clone(&control);
        let locked = Arc::clone(&locked);
        let release = Arc::clone(&release);
        thread::spawn(move || {
            control.apply(|s| {
                locked.wait();
                s.select_next(Millis(10));
                release.wait();
            });
        })
    };

    locked.wait();
    // The command holds the lock: this tick must not wait for it
    assert_eq!(
        driver.tick(Millis(20), &mut strings).unwrap(),
        TickReport::Stale {
            kind: PatternKind::Wave
        }
    );
    release.wait();
    commander.join().unwrap();

    assert_eq!(
        driver.tick(Millis(40), &mut strings).unwrap(),
        TickReport::Rendered {
            kind: PatternKind::Sparkle,
            interrupted: false
        }
    );
}

#[test]
fn concurrent_commands_and_ticks() {
    const COMMANDS: usize = 500;

    let config = EngineConfig {
        manual_timeout_ms: u32::MAX,
        pattern_duration_ms: u32::MAX,
        ..EngineConfig::default()
    };
    let control = Arc::new(SharedControl::new(
        ControlState::new(config.enabled_patterns.clone(), Millis(0)).unwrap(),
    ));
    let mut driver = FrameDriver::new(&config, Arc::clone(&control), &[16, 4], 9).unwrap();
    let mut strings = vec![
        LedString::new(0, MemoryOutput::new(16)),
        LedString::new(1, MemoryOutput::new(4)),
    ];

    let commander = {
        let control = Arc::clone(&control);
        thread::spawn(move || {
            for _ in 0..COMMANDS {
                control.apply(|s| s.select_next(Millis(0)));
                thread::yield_now();
            }
        })
    };

    for t in 0..2000 {
        let report = driver.tick(Millis(t), &mut strings).unwrap();
        assert_ne!(report, TickReport::Blackout);
        assert!(driver.last_snapshot().index < 3);
    }
    commander.join().unwrap();

    let snap = control.snapshot();
    assert_eq!(snap.index, COMMANDS % 3);
    assert!(snap.manual);
}
