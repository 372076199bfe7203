//! dotmatrix-core: a libretro core bridge for a cycle-stepped Game Boy
//! emulation engine.
//!
//! The engine itself (CPU/PPU/APU internals, ROM and mapper handling) is an
//! external collaborator behind the [`Engine`] trait. This crate owns
//! everything between that seam and the libretro host:
//!
//! - **pacing**: exactly one video frame per `retro_run`, with transparent
//!   duplicate-frame handling when the host's frame cadence outruns the
//!   engine's audio output,
//! - **audio adaptation**: native-rate packed stereo pairs resampled to the
//!   host rate at an exact rational ratio (no long-run drift),
//! - **video adaptation**: ARGB8888 framebuffers converted to XRGB1555,
//! - **state persistence**: deterministic, size-checked save/restore of the
//!   complete engine state mid-stream.
//!
//! Embedders pick an engine and export the C entry points with
//! [`retro_core!`]:
//!
//! ```ignore
//! #[derive(Default)]
//! struct MyEngine { /* ... */ }
//!
//! impl dotmatrix_core::Engine for MyEngine { /* ... */ }
//!
//! dotmatrix_core::retro_core!(MyEngine);
//! ```

pub mod av;
pub mod engine;
pub mod host;
pub mod input;
pub mod libretro;
pub mod savestate;
pub mod session;

pub use engine::{Engine, JoypadState, StepOutcome};
pub use host::{Button, Host, NullHost};
pub use savestate::{StateCodec, StateError};
pub use session::Session;

// Referenced by the `retro_core!` expansion in the embedder's crate.
#[doc(hidden)]
pub use libc;

/// Game Boy master clock in Hz.
pub const CLOCK_RATE: u64 = 4_194_304;

/// Master clock cycles per video frame.
pub const CYCLES_PER_FRAME: u64 = 70_224;

/// Native stereo sample pairs produced per video frame (one pair every
/// other clock cycle).
pub const SAMPLES_PER_FRAME: u64 = CYCLES_PER_FRAME / 2;

/// Native audio rate in Hz.
pub const NATIVE_SAMPLE_RATE: u32 = (CLOCK_RATE / 2) as u32;

/// Host audio rate the resampler targets.
pub const HOST_SAMPLE_RATE: u32 = 32_000;

/// Visible frame width in pixels.
pub const FRAME_WIDTH: usize = 160;

/// Visible frame height in pixels.
pub const FRAME_HEIGHT: usize = 144;

/// Row stride of the engine's framebuffer, in pixels.
pub const FRAME_STRIDE: usize = 256;

/// Stereo sample pairs requested from the engine per step.
pub const STEP_SAMPLES: usize = 2064;

/// Capacity of the native audio buffer in stereo pairs. The engine may
/// overshoot a request while finishing its current chunk, so a full extra
/// request of slack is reserved.
pub const SOUND_BUF_CAPACITY: usize = 2 * STEP_SAMPLES;
