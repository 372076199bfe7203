//! The run loop: one host frame per invocation.
//!
//! [`Session`] is the explicit context object for the whole bridge: it owns
//! the engine, the resampler, the pacing counters and every staging buffer,
//! and is driven synchronously by the host once per output frame. There is
//! no other mutable state in the pipeline.
//!
//! Pacing model: the engine's audio production and its video frame
//! boundaries are not 1:1 per step, so the session tracks cumulative sample
//! pairs and emitted frames. When a drive pass produces more than one
//! frame's worth of audio, the following invocation re-signals the previous
//! frame instead of stepping the engine, keeping
//! `frames_emitted <= samples_emitted / SAMPLES_PER_FRAME + 1` at all times.

use crate::av::{self, frame, resample::Resampler};
use crate::engine::{Engine, StepOutcome};
use crate::host::Host;
use crate::input;
use crate::savestate::{StateCodec, StateError};
use crate::{
    FRAME_STRIDE, HOST_SAMPLE_RATE, NATIVE_SAMPLE_RATE, SAMPLES_PER_FRAME, SOUND_BUF_CAPACITY,
    STEP_SAMPLES,
};

/// One emulation session: engine, conversion paths, pacing state.
pub struct Session<E> {
    engine: E,
    resampler: Resampler,
    codec: StateCodec,
    can_dupe: bool,
    samples_emitted: u64,
    frames_emitted: u64,
    video_native: Box<[u32]>,
    /// Previous real frame in host format; re-delivered on the dupe path.
    video_host: Box<[u16]>,
    audio_native: Box<[u32]>,
    audio_interleaved: Box<[i16]>,
    audio_host: Box<[i16]>,
}

impl<E: Engine> Session<E> {
    /// `can_dupe` is the host's answer to duplicate-frame negotiation,
    /// queried once at startup and fixed for the session's lifetime.
    pub fn new(engine: E, can_dupe: bool) -> Self {
        let resampler = Resampler::new(NATIVE_SAMPLE_RATE, HOST_SAMPLE_RATE, SOUND_BUF_CAPACITY);
        let (mul, div) = resampler.exact_ratio();
        tracing::debug!(can_dupe, mul, div, "session constructed");

        let max_out = resampler.max_output();
        Self {
            engine,
            resampler,
            codec: StateCodec::new(),
            can_dupe,
            samples_emitted: 0,
            frames_emitted: 0,
            video_native: vec![0; frame::FRAME_BUF_LEN].into_boxed_slice(),
            video_host: vec![0; frame::FRAME_BUF_LEN].into_boxed_slice(),
            audio_native: vec![0; SOUND_BUF_CAPACITY].into_boxed_slice(),
            audio_interleaved: vec![0; SOUND_BUF_CAPACITY * 2].into_boxed_slice(),
            audio_host: vec![0; max_out * 2].into_boxed_slice(),
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Exact resampler ratio, for host timing negotiation.
    pub fn exact_ratio(&self) -> (u64, u64) {
        self.resampler.exact_ratio()
    }

    /// Cumulative (sample pairs, frames) emitted since construction.
    /// Monotonic; never reset.
    pub fn counters(&self) -> (u64, u64) {
        (self.samples_emitted, self.frames_emitted)
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> anyhow::Result<()> {
        self.engine.load(rom)
    }

    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// Snapshot size in bytes; constant while a ROM is loaded.
    pub fn state_size(&mut self) -> usize {
        self.codec.size(&self.engine)
    }

    pub fn save_state(&mut self, out: &mut [u8]) -> Result<(), StateError> {
        self.codec.save(&self.engine, out)
    }

    pub fn load_state(&mut self, state: &[u8]) -> Result<(), StateError> {
        self.codec.load(&mut self.engine, state)
    }

    /// Battery-backed save RAM region, if the loaded ROM has one.
    pub fn save_ram(&mut self) -> Option<&mut [u8]> {
        self.engine.save_ram()
    }

    /// Real-time-clock data region, if the loaded ROM has one.
    pub fn rtc_data(&mut self) -> Option<&mut [u8]> {
        self.engine.rtc_data()
    }

    /// Produce exactly one host frame: poll input, either re-signal the
    /// previous frame (dupe path) or drive the engine to the next frame
    /// boundary, delivering every audio batch along the way.
    pub fn run_frame(&mut self, host: &mut impl Host) {
        let pad = input::poll_joypad(host);

        // Host cadence has outrun engine output; the audio already delivered
        // justifies re-signaling the last real frame without stepping the
        // engine. Both counters start at zero, so this path cannot trigger
        // before the first real frame.
        let expected_frames = self.samples_emitted / SAMPLES_PER_FRAME;
        if self.frames_emitted < expected_frames {
            host.deliver_frame(if self.can_dupe { None } else { Some(&self.video_host) });
            self.frames_emitted += 1;
            return;
        }

        loop {
            let outcome = self.engine.run_for(
                &mut self.video_native,
                FRAME_STRIDE,
                &mut self.audio_native,
                STEP_SAMPLES,
                pad,
            );
            match outcome {
                StepOutcome::NeedsMore { samples } => self.emit_audio(host, samples),
                StepOutcome::FrameReady { samples } => {
                    self.emit_audio(host, samples);
                    break;
                }
            }
        }

        frame::convert_frame(&mut self.video_host, &self.video_native);
        host.deliver_frame(Some(&self.video_host));
        self.frames_emitted += 1;
    }

    /// Resample freshly produced pairs and hand them to the host.
    fn emit_audio(&mut self, host: &mut impl Host, samples: usize) {
        if samples == 0 {
            return;
        }
        assert!(
            samples <= SOUND_BUF_CAPACITY,
            "engine produced {samples} pairs, buffer holds {SOUND_BUF_CAPACITY}"
        );

        av::split_pairs(&self.audio_native[..samples], &mut self.audio_interleaved);
        let produced = self
            .resampler
            .resample(&mut self.audio_host, &self.audio_interleaved, samples);
        self.samples_emitted += samples as u64;

        if produced > 0 {
            host.deliver_audio(&self.audio_host[..produced * 2]);
        }
    }
}
