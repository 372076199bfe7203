//! Deterministic save/restore of the complete engine state.
//!
//! The snapshot size is a property of the engine and must not change while a
//! ROM is loaded; it is queried once and cached for the session's lifetime.
//! Save and load are all-or-nothing: a size mismatch is reported without
//! touching the buffer or the engine.

use crate::engine::Engine;

/// Reason a save or load was rejected. Rejections have no partial effect.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StateError {
    /// The caller's buffer does not match the engine's snapshot size.
    SizeMismatch { expected: usize, actual: usize },
}

impl core::fmt::Display for StateError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            StateError::SizeMismatch { expected, actual } => {
                write!(f, "state buffer is {actual} bytes, snapshot needs exactly {expected}")
            }
        }
    }
}

impl std::error::Error for StateError {}

/// Size-checked snapshot codec over an engine.
#[derive(Default)]
pub struct StateCodec {
    cached_size: Option<usize>,
}

impl StateCodec {
    pub fn new() -> Self {
        Self { cached_size: None }
    }

    /// Snapshot size in bytes, cached after the first query.
    pub fn size(&mut self, engine: &impl Engine) -> usize {
        *self.cached_size.get_or_insert_with(|| {
            let size = engine.state_size();
            tracing::debug!(size, "cached engine snapshot size");
            size
        })
    }

    /// Capture the engine state into `out`. On size mismatch nothing is
    /// written.
    pub fn save(&mut self, engine: &impl Engine, out: &mut [u8]) -> Result<(), StateError> {
        let expected = self.size(engine);
        if out.len() != expected {
            return Err(StateError::SizeMismatch {
                expected,
                actual: out.len(),
            });
        }
        engine.save_state(out);
        Ok(())
    }

    /// Replace the engine state from `state`. On size mismatch the engine is
    /// untouched; any other failure mode is the engine's and callers must
    /// treat it as fatal to prior state assumptions.
    pub fn load(&mut self, engine: &mut impl Engine, state: &[u8]) -> Result<(), StateError> {
        let expected = self.size(engine);
        if state.len() != expected {
            return Err(StateError::SizeMismatch {
                expected,
                actual: state.len(),
            });
        }
        engine.load_state(state);
        Ok(())
    }
}
