//! Pattern engine for strings of addressable LEDs
//!
//! This library holds everything that decides what the strings show: the
//! HSV color model, the pattern library, the shared control state, the
//! operator command interpreter and the Frame Driver that ties them
//! together. It is hardware-agnostic; the firmware plugs in RMT-driven
//! WS2812 strings and a UART console, the simulator plugs in a terminal.

pub use rgb::RGB8;

pub mod color;
pub mod command;
pub mod config;
pub mod control;
pub mod driver;
pub mod output;
pub mod patterns;
pub mod time;

pub use color::{hsv_to_rgb, ChannelOrder};
pub use command::{ChannelError, CommandChannel, CommandInterpreter, Listener, Reply};
pub use config::{ConfigError, EngineConfig};
pub use control::{ControlSnapshot, ControlState, Selection, SharedControl, SystemState};
pub use driver::{FrameDriver, TickReport};
pub use output::{LedOutput, LedString, MemoryOutput, OutputError};
pub use patterns::{PatternKind, PatternSet, RenderOutcome};
pub use time::{Clock, Millis};
