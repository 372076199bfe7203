//! Drives the exported C entry points end to end with stub host callbacks.
//!
//! The `retro_core!` expansion owns process-global state, so everything runs
//! in a single test body, in the order a frontend would issue the calls.

use std::ffi::CStr;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use dotmatrix_core::libc::{c_uint, c_void, size_t};
use dotmatrix_core::libretro::sys;
use dotmatrix_core::{Engine, JoypadState, SAMPLES_PER_FRAME, StepOutcome, retro_core};

/// Two frames' worth of audio per engine frame, so every second `retro_run`
/// must take the duplicate-frame path.
const PULSE_SPAN: usize = 2 * SAMPLES_PER_FRAME as usize;

const PULSE_STATE_SIZE: usize = 16;

static INPUT_BITS_SEEN: Mutex<Vec<u8>> = Mutex::new(Vec::new());

struct PulseEngine {
    remaining: usize,
    clock: u64,
    frames: u64,
    sram: Vec<u8>,
}

impl Default for PulseEngine {
    fn default() -> Self {
        Self {
            remaining: PULSE_SPAN,
            clock: 0,
            frames: 0,
            sram: vec![0; 128],
        }
    }
}

impl Engine for PulseEngine {
    fn load(&mut self, rom: &[u8]) -> anyhow::Result<()> {
        anyhow::ensure!(!rom.is_empty(), "empty ROM image");
        Ok(())
    }

    fn reset(&mut self) {
        self.remaining = PULSE_SPAN;
        self.clock = 0;
        self.frames = 0;
    }

    fn run_for(
        &mut self,
        video: &mut [u32],
        stride: usize,
        audio: &mut [u32],
        samples: usize,
        input: JoypadState,
    ) -> StepOutcome {
        INPUT_BITS_SEEN.lock().unwrap().push(input.bits());

        let n = self.remaining.min(samples);
        for slot in &mut audio[..n] {
            let v = (self.clock % 2048) as u32;
            *slot = v | (v << 16);
            self.clock += 1;
        }
        self.remaining -= n;

        if self.remaining == 0 {
            self.remaining = PULSE_SPAN;
            self.frames += 1;
            video[..stride].fill(0x00ff_ffff);
            StepOutcome::FrameReady { samples: n }
        } else {
            StepOutcome::NeedsMore { samples: n }
        }
    }

    fn state_size(&self) -> usize {
        PULSE_STATE_SIZE
    }

    fn save_state(&self, out: &mut [u8]) {
        out[0..8].copy_from_slice(&self.clock.to_le_bytes());
        out[8..16].copy_from_slice(&self.frames.to_le_bytes());
    }

    fn load_state(&mut self, state: &[u8]) {
        self.clock = u64::from_le_bytes(state[0..8].try_into().unwrap());
        self.frames = u64::from_le_bytes(state[8..16].try_into().unwrap());
    }

    fn save_ram(&mut self) -> Option<&mut [u8]> {
        Some(&mut self.sram)
    }
}

retro_core!(PulseEngine);

/// Each entry records whether the delivered frame pointer was non-null.
static VIDEO_DELIVERIES: Mutex<Vec<bool>> = Mutex::new(Vec::new());
static AUDIO_PAIRS: AtomicUsize = AtomicUsize::new(0);
static POLLS: AtomicUsize = AtomicUsize::new(0);

unsafe extern "C" fn env_stub(cmd: c_uint, data: *mut c_void) -> bool {
    if cmd == sys::ENVIRONMENT_GET_CAN_DUPE {
        unsafe { *data.cast::<bool>() = true };
        return true;
    }
    false
}

unsafe extern "C" fn video_stub(data: *const c_void, width: c_uint, height: c_uint, pitch: size_t) {
    assert_eq!(width, 160);
    assert_eq!(height, 144);
    assert_eq!(pitch, 512);
    VIDEO_DELIVERIES.lock().unwrap().push(!data.is_null());
}

unsafe extern "C" fn audio_sample_stub(_left: i16, _right: i16) {}

unsafe extern "C" fn audio_batch_stub(data: *const i16, frames: size_t) -> size_t {
    assert!(!data.is_null());
    AUDIO_PAIRS.fetch_add(frames, Ordering::Relaxed);
    frames
}

unsafe extern "C" fn input_poll_stub() {
    POLLS.fetch_add(1, Ordering::Relaxed);
}

unsafe extern "C" fn input_state_stub(port: c_uint, device: c_uint, index: c_uint, id: c_uint) -> i16 {
    assert_eq!(port, 0);
    assert_eq!(device, sys::DEVICE_JOYPAD);
    assert_eq!(index, 0);
    i16::from(id == sys::DEVICE_ID_JOYPAD_A)
}

#[test]
fn full_session_through_the_c_entry_points() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    assert_eq!(__retro_exports::retro_api_version(), sys::API_VERSION);

    __retro_exports::retro_set_environment(Some(env_stub as sys::EnvironmentFn));
    __retro_exports::retro_set_video_refresh(Some(video_stub as sys::VideoRefreshFn));
    __retro_exports::retro_set_audio_sample(Some(audio_sample_stub as sys::AudioSampleFn));
    __retro_exports::retro_set_audio_sample_batch(Some(audio_batch_stub as sys::AudioSampleBatchFn));
    __retro_exports::retro_set_input_poll(Some(input_poll_stub as sys::InputPollFn));
    __retro_exports::retro_set_input_state(Some(input_state_stub as sys::InputStateFn));

    __retro_exports::retro_init();

    // System info is static data, available at any point.
    let info = unsafe {
        let mut info = MaybeUninit::<sys::SystemInfo>::uninit();
        __retro_exports::retro_get_system_info(info.as_mut_ptr());
        info.assume_init()
    };
    assert_eq!(
        unsafe { CStr::from_ptr(info.library_name) }.to_str().unwrap(),
        "dotmatrix"
    );
    assert_eq!(
        unsafe { CStr::from_ptr(info.valid_extensions) }.to_str().unwrap(),
        "gb|gbc|dmg"
    );
    assert!(!info.need_fullpath);

    // Load a ROM through the C surface.
    let rom = vec![0xc3u8; 0x8000];
    let game = sys::GameInfo {
        path: ptr::null(),
        data: rom.as_ptr().cast::<c_void>(),
        size: rom.len(),
        meta: ptr::null(),
    };
    assert!(unsafe { __retro_exports::retro_load_game(&game) });
    assert!(!unsafe { __retro_exports::retro_load_game(ptr::null()) });

    // Timing must report the exact effective rate: 2097152 * 125 / 8192.
    let av = unsafe {
        let mut av = MaybeUninit::<sys::SystemAvInfo>::uninit();
        __retro_exports::retro_get_system_av_info(av.as_mut_ptr());
        av.assume_init()
    };
    assert_eq!(av.geometry.base_width, 160);
    assert_eq!(av.geometry.base_height, 144);
    assert_eq!(av.timing.fps, 4_194_304.0 / 70_224.0);
    assert_eq!(av.timing.sample_rate, 32_000.0);

    // First run is always a real frame; the pulse engine banks two frames of
    // audio, so the second run must dupe with a null frame and no audio.
    __retro_exports::retro_run();
    let pairs_after_real = AUDIO_PAIRS.load(Ordering::Relaxed);
    assert_eq!(pairs_after_real, PULSE_SPAN * 125 / 8192);

    __retro_exports::retro_run();
    assert_eq!(AUDIO_PAIRS.load(Ordering::Relaxed), pairs_after_real);

    assert_eq!(*VIDEO_DELIVERIES.lock().unwrap(), vec![true, false]);
    assert_eq!(POLLS.load(Ordering::Relaxed), 2);

    // The input stub holds A; every engine step saw exactly that mask.
    {
        let seen = INPUT_BITS_SEEN.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&bits| bits == JoypadState::A));
    }

    // Save-state surface: exact size succeeds, anything else is rejected.
    let size = __retro_exports::retro_serialize_size();
    assert_eq!(size, PULSE_STATE_SIZE);

    let mut snapshot = vec![0u8; size];
    assert!(unsafe { __retro_exports::retro_serialize(snapshot.as_mut_ptr().cast(), size) });
    assert!(!unsafe { __retro_exports::retro_serialize(snapshot.as_mut_ptr().cast(), size - 1) });
    assert!(unsafe { __retro_exports::retro_unserialize(snapshot.as_ptr().cast(), size) });

    let oversized = vec![0u8; size + 1];
    assert!(!unsafe { __retro_exports::retro_unserialize(oversized.as_ptr().cast(), size + 1) });

    // Memory regions: save RAM is exposed, RTC is absent for this engine.
    assert_eq!(
        __retro_exports::retro_get_memory_size(sys::MEMORY_SAVE_RAM),
        128
    );
    assert!(!__retro_exports::retro_get_memory_data(sys::MEMORY_SAVE_RAM).is_null());
    assert_eq!(__retro_exports::retro_get_memory_size(sys::MEMORY_RTC), 0);
    assert!(__retro_exports::retro_get_memory_data(sys::MEMORY_RTC).is_null());

    // Reset zeroes the engine-visible counters.
    __retro_exports::retro_reset();
    let mut after_reset = vec![0u8; size];
    assert!(unsafe { __retro_exports::retro_serialize(after_reset.as_mut_ptr().cast(), size) });
    assert_eq!(after_reset, vec![0u8; size]);

    assert_eq!(__retro_exports::retro_get_region(), sys::Region::NTSC as c_uint);

    __retro_exports::retro_deinit();
    assert_eq!(__retro_exports::retro_serialize_size(), 0);
}
