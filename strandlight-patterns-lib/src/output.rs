//! The output capability each LED string is driven through.
//!
//! The engine never talks to hardware directly. The firmware implements
//! [`LedOutput`] on top of its transport, the simulator and the tests use
//! [`MemoryOutput`].

use rgb::RGB8;

/// Errors reported by an [`LedOutput`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    /// A pixel index at or past the end of the string.
    IndexOutOfRange { index: usize, len: usize },
    /// The transport failed to take the frame.
    Transport(String),
}

impl std::fmt::Display for OutputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfRange { index, len } => {
                write!(f, "pixel {index} out of range for string of {len}")
            }
            Self::Transport(e) => write!(f, "transport error: {e}"),
        }
    }
}

impl std::error::Error for OutputError {}

/// Per-string output capability.
///
/// `refresh` is synchronous from the caller's point of view: when it
/// returns the frame has been queued or sent.
pub trait LedOutput {
    /// Number of pixels on the string.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn set_pixel(&mut self, index: usize, color: RGB8) -> Result<(), OutputError>;

    /// Set every pixel to black. Does not push.
    fn clear(&mut self) -> Result<(), OutputError>;

    /// Push the pixel buffer to the string.
    fn refresh(&mut self) -> Result<(), OutputError>;
}

/// One physical LED string.
///
/// Created at startup from configuration and never resized.
#[derive(Debug)]
pub struct LedString<O> {
    index: usize,
    pixel_count: usize,
    output: O,
}

impl<O: LedOutput> LedString<O> {
    pub fn new(index: usize, output: O) -> Self {
        let pixel_count = output.len();
        Self {
            index,
            pixel_count,
            output,
        }
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub const fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    pub fn set_pixel(&mut self, index: usize, color: RGB8) -> Result<(), OutputError> {
        self.output.set_pixel(index, color)
    }

    pub fn clear(&mut self) -> Result<(), OutputError> {
        self.output.clear()
    }

    pub fn refresh(&mut self) -> Result<(), OutputError> {
        self.output.refresh()
    }

    /// Clear and push in one go.
    pub fn blank(&mut self) -> Result<(), OutputError> {
        self.output.clear()?;
        self.output.refresh()
    }

    pub const fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}

/// In-memory [`LedOutput`].
///
/// Keeps a working buffer plus a copy of the last refreshed frame, which is
/// what a viewer of the physical string would see.
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    pixels: Vec<RGB8>,
    shown: Vec<RGB8>,
    refresh_count: usize,
}

impl MemoryOutput {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            pixels: vec![RGB8::default(); len],
            shown: vec![RGB8::default(); len],
            refresh_count: 0,
        }
    }

    /// The working buffer, including writes not yet refreshed.
    #[must_use]
    pub fn pixels(&self) -> &[RGB8] {
        &self.pixels
    }

    /// The frame pushed by the most recent refresh.
    #[must_use]
    pub fn shown(&self) -> &[RGB8] {
        &self.shown
    }

    #[must_use]
    pub const fn refresh_count(&self) -> usize {
        self.refresh_count
    }
}

impl LedOutput for MemoryOutput {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel(&mut self, index: usize, color: RGB8) -> Result<(), OutputError> {
        let len = self.pixels.len();
        let pixel = self
            .pixels
            .get_mut(index)
            .ok_or(OutputError::IndexOutOfRange { index, len })?;
        *pixel = color;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), OutputError> {
        self.pixels.fill(RGB8::default());
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), OutputError> {
        self.shown.copy_from_slice(&self.pixels);
        self.refresh_count += 1;
        Ok(())
    }
}
