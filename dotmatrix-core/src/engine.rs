//! The seam between this core and the emulation engine.
//!
//! The engine is an external collaborator: it executes instructions, renders
//! scanlines and synthesizes audio, and this core only ever talks to it
//! through the [`Engine`] trait. Everything the bridge needs is expressible
//! here: stepping with a bounded audio request, complete state capture, and
//! the battery-backed memory regions the host persists on its own schedule.

use anyhow::Result;

/// Engine-side joypad bitmask, latched once per produced video frame.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct JoypadState(pub u8);

impl JoypadState {
    pub const A: u8 = 0x01;
    pub const B: u8 = 0x02;
    pub const SELECT: u8 = 0x04;
    pub const START: u8 = 0x08;
    pub const RIGHT: u8 = 0x10;
    pub const LEFT: u8 = 0x20;
    pub const UP: u8 = 0x40;
    pub const DOWN: u8 = 0x80;

    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Result of one engine step.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    /// The audio request was exhausted before the next frame boundary.
    /// `samples` stereo pairs were produced (possibly more than requested).
    NeedsMore { samples: usize },
    /// A complete video frame is in the video buffer. `samples` stereo pairs
    /// were produced up to the frame boundary.
    FrameReady { samples: usize },
}

/// A cycle-stepped emulation engine.
pub trait Engine {
    /// Load a ROM image. After an error, no emulation state is valid until a
    /// later load succeeds.
    fn load(&mut self, rom: &[u8]) -> Result<()>;

    /// Hard-reset to power-on state, keeping the loaded ROM.
    fn reset(&mut self);

    /// Run until either a video frame completes or `samples` stereo pairs
    /// have been produced.
    ///
    /// `video` is a `stride`-pixel-wide ARGB8888 grid with the 160x144
    /// visible region at the top left. `audio` receives packed stereo pairs
    /// (low half left, high half right, little-endian layout). The engine may
    /// overshoot `samples` while finishing its current chunk, but never
    /// beyond `audio.len()`.
    fn run_for(
        &mut self,
        video: &mut [u32],
        stride: usize,
        audio: &mut [u32],
        samples: usize,
        input: JoypadState,
    ) -> StepOutcome;

    /// Size in bytes of a complete state snapshot. Constant while a given
    /// ROM is loaded.
    fn state_size(&self) -> usize;

    /// Capture the complete mutable state into `out`, which holds exactly
    /// [`state_size`](Engine::state_size) bytes. Two captures with no
    /// intervening execution must produce identical bytes.
    fn save_state(&self, out: &mut [u8]);

    /// Replace the complete mutable state from `state`. Subsequent execution
    /// is indistinguishable from a run that reached that state natively.
    fn load_state(&mut self, state: &[u8]);

    /// Battery-backed save RAM region, if the loaded ROM has one.
    fn save_ram(&mut self) -> Option<&mut [u8]> {
        None
    }

    /// Real-time-clock data region, if the loaded ROM has one.
    fn rtc_data(&mut self) -> Option<&mut [u8]> {
        None
    }
}
