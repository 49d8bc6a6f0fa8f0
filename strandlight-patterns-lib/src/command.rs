//! Operator command interpreter.
//!
//! Commands are single bytes:
//!
//! | byte      | effect                                                |
//! |-----------|-------------------------------------------------------|
//! | `n`       | next pattern, manual                                  |
//! | `p`       | previous pattern, manual                              |
//! | `0`-`9`   | start a pattern index; more digits extend it          |
//! | `a`       | back to auto rotation from the first pattern          |
//! | `s`       | report status                                         |
//! | `l`       | list enabled patterns                                 |
//! | `h` / `?` | help                                                  |
//!
//! Whitespace is a no-op and anything else is ignored. A digit run ends
//! after [`DIGIT_TIMEOUT_MS`] without input or at the first non-digit; the
//! terminating byte is then handled as a command of its own.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use smallvec::SmallVec;

use crate::control::{ControlSnapshot, SelectError, SharedControl};
use crate::patterns::PatternKind;
use crate::time::{Clock, Millis};

/// Inactivity that ends a digit run.
pub const DIGIT_TIMEOUT_MS: u32 = 1000;

/// How long one listener cycle waits for input.
pub const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Replies produced by a single input byte (at most a committed digit run
/// plus the command that ended it).
pub type Replies = SmallVec<[Reply; 2]>;

/// Outcome of a command, printed back to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Selected { index: usize, kind: PatternKind },
    AutoResumed { kind: PatternKind },
    Status { snapshot: ControlSnapshot, elapsed_ms: u32 },
    List { patterns: Vec<PatternKind>, current: usize },
    Help,
    Rejected(SelectError),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Selected { index, kind } => write!(f, "pattern {index}: {kind} (manual)"),
            Self::AutoResumed { kind } => write!(f, "auto rotation, pattern 0: {kind}"),
            Self::Status {
                snapshot,
                elapsed_ms,
            } => write!(
                f,
                "pattern {}/{}: {}, {}, running {}.{:03}s",
                snapshot.index,
                snapshot.pattern_count,
                snapshot.kind,
                snapshot.selection(),
                elapsed_ms / 1000,
                elapsed_ms % 1000
            ),
            Self::List { patterns, current } => {
                write!(f, "enabled patterns:")?;
                for (i, kind) in patterns.iter().enumerate() {
                    let marker = if i == *current { '*' } else { ' ' };
                    write!(f, "\n{marker} {i}: {kind}")?;
                }
                Ok(())
            }
            Self::Help => f.write_str(
                "commands:\n\
                 \x20 n      next pattern\n\
                 \x20 p      previous pattern\n\
                 \x20 0-9    select pattern by index\n\
                 \x20 a      resume auto rotation\n\
                 \x20 s      show status\n\
                 \x20 l      list patterns\n\
                 \x20 h ?    this help",
            ),
            Self::Rejected(e) => write!(f, "rejected: {e}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingIndex {
    value: u32,
    last_input: Millis,
}

/// Byte-at-a-time command decoder.
#[derive(Debug, Default)]
pub struct CommandInterpreter {
    pending: Option<PendingIndex>,
}

impl CommandInterpreter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Digits collected so far, if a digit run is open.
    #[must_use]
    pub fn pending_index(&self) -> Option<u32> {
        self.pending.map(|p| p.value)
    }

    /// Handle one input byte received at `now`.
    pub fn feed(&mut self, byte: u8, now: Millis, control: &SharedControl) -> Replies {
        let mut replies = Replies::new();

        // A run that went stale before this byte arrived is finished first
        if let Some(reply) = self.poll(now, control) {
            replies.push(reply);
        }

        if byte.is_ascii_digit() {
            let digit = u32::from(byte - b'0');
            let pending = self.pending.get_or_insert(PendingIndex {
                value: 0,
                last_input: now,
            });
            // Saturates, so absurdly long runs become out-of-range rejections
            pending.value = pending.value.saturating_mul(10).saturating_add(digit);
            pending.last_input = now;
            return replies;
        }

        if let Some(pending) = self.pending.take() {
            replies.push(commit_index(pending.value, now, control));
        }
        if let Some(reply) = dispatch(byte, now, control) {
            replies.push(reply);
        }
        replies
    }

    /// Commit a digit run that has been idle for [`DIGIT_TIMEOUT_MS`].
    pub fn poll(&mut self, now: Millis, control: &SharedControl) -> Option<Reply> {
        let pending = self.pending?;
        if now.elapsed_since(pending.last_input) < DIGIT_TIMEOUT_MS {
            return None;
        }
        self.pending = None;
        Some(commit_index(pending.value, now, control))
    }
}

fn commit_index(value: u32, now: Millis, control: &SharedControl) -> Reply {
    match control.apply(|s| s.select_index(value, now).map(|i| (i, s.current_kind()))) {
        Ok((index, kind)) => {
            info!("Command: select {index} -> {kind}");
            Reply::Selected { index, kind }
        }
        Err(e) => {
            warn!("Command: {e}");
            Reply::Rejected(e)
        }
    }
}

fn dispatch(byte: u8, now: Millis, control: &SharedControl) -> Option<Reply> {
    match byte {
        b'n' | b'p' => {
            let (index, kind) = control.apply(|s| {
                let index = if byte == b'n' {
                    s.select_next(now)
                } else {
                    s.select_previous(now)
                };
                (index, s.current_kind())
            });
            info!(
                "Command: {} -> pattern {index} ({kind})",
                if byte == b'n' { "next" } else { "previous" }
            );
            Some(Reply::Selected { index, kind })
        }
        b'a' => {
            let kind = control.apply(|s| {
                s.resume_auto(now);
                s.current_kind()
            });
            info!("Command: auto rotation resumed at {kind}");
            Some(Reply::AutoResumed { kind })
        }
        b's' => {
            let (snapshot, elapsed_ms) = control.apply(|s| (s.snapshot(), s.elapsed(now)));
            Some(Reply::Status {
                snapshot,
                elapsed_ms,
            })
        }
        b'l' => {
            let (patterns, current) =
                control.apply(|s| (s.enabled_patterns().to_vec(), s.current_index()));
            Some(Reply::List { patterns, current })
        }
        b'h' | b'?' => Some(Reply::Help),
        b if b.is_ascii_whitespace() => None,
        other => {
            debug!("Command: ignoring byte 0x{other:02x}");
            None
        }
    }
}

/// Errors from a [`CommandChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The other end went away; no more input will arrive.
    Closed,
    Io(String),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "command channel closed"),
            Self::Io(e) => write!(f, "command channel I/O error: {e}"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Bidirectional byte stream the operator types into.
///
/// `read_byte` waits at most `timeout` and returns `Ok(None)` when nothing
/// arrived. Whether that is a blocking read, a polling loop or a callback
/// queue underneath is up to the platform.
pub trait CommandChannel {
    fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, ChannelError>;

    fn write_line(&mut self, line: &str) -> Result<(), ChannelError>;
}

/// Command listener task body: waits for input, decodes it, applies it to
/// the shared state and answers on the same channel.
pub struct Listener<C, K> {
    channel: C,
    clock: K,
    control: Arc<SharedControl>,
    interpreter: CommandInterpreter,
}

impl<C: CommandChannel, K: Clock> Listener<C, K> {
    pub fn new(channel: C, clock: K, control: Arc<SharedControl>) -> Self {
        Self {
            channel,
            clock,
            control,
            interpreter: CommandInterpreter::new(),
        }
    }

    /// One bounded cycle: wait up to [`POLL_TIMEOUT`] for a byte, then
    /// handle it (or expire a stale digit run).
    pub fn service(&mut self) -> Result<Replies, ChannelError> {
        let byte = self.channel.read_byte(POLL_TIMEOUT)?;
        let now = self.clock.now();
        let replies: Replies = match byte {
            Some(b) => self.interpreter.feed(b, now, &self.control),
            None => self.interpreter.poll(now, &self.control).into_iter().collect(),
        };

        for reply in &replies {
            for line in reply.to_string().lines() {
                self.channel.write_line(line)?;
            }
        }
        Ok(replies)
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }
}
