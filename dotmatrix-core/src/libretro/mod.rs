//! The libretro FFI boundary.
//!
//! Responsibilities:
//! - Store the callbacks the frontend registers before `retro_init`.
//! - Implement [`Host`] over those callbacks ([`CallbackHost`]).
//! - Provide one safe shim per `retro_*` operation, generic over the engine.
//! - Export the C entry points for a concrete engine via [`retro_core!`].
//!
//! All globals sit behind mutexes like any FFI-reachable state; the libretro
//! contract guarantees the calls themselves are serialized, so the locks are
//! never contended.

use std::ptr;
use std::slice;
use std::sync::Mutex;

use lazy_static::lazy_static;
use libc::{c_char, c_uint, c_void, size_t};

use crate::av::resample::Resampler;
use crate::engine::Engine;
use crate::host::{Button, Host};
use crate::session::Session;
use crate::{
    CLOCK_RATE, CYCLES_PER_FRAME, FRAME_HEIGHT, FRAME_STRIDE, FRAME_WIDTH, HOST_SAMPLE_RATE,
    NATIVE_SAMPLE_RATE, SAMPLES_PER_FRAME, SOUND_BUF_CAPACITY,
};

// Referenced by the `retro_core!` expansion in the embedder's crate.
#[doc(hidden)]
pub use libretro_sys as sys;

/// The single joypad port this core reads.
const JOYPAD_PORT: c_uint = 0;

/// Row pitch of delivered frames, in bytes (XRGB1555 on a 256-pixel stride).
const PITCH_BYTES: usize = FRAME_STRIDE * size_of::<u16>();

/// Callbacks registered by the frontend. All are set before `retro_init`
/// and stay valid until `retro_deinit` (libretro contract).
#[derive(Clone, Copy, Default)]
pub struct HostCallbacks {
    pub environment: Option<sys::EnvironmentFn>,
    pub video_refresh: Option<sys::VideoRefreshFn>,
    pub audio_sample: Option<sys::AudioSampleFn>,
    pub audio_sample_batch: Option<sys::AudioSampleBatchFn>,
    pub input_poll: Option<sys::InputPollFn>,
    pub input_state: Option<sys::InputStateFn>,
}

lazy_static! {
    static ref CALLBACKS: Mutex<HostCallbacks> = Mutex::new(HostCallbacks::default());
}

pub fn set_environment(cb: Option<sys::EnvironmentFn>) {
    CALLBACKS.lock().unwrap().environment = cb;
}

pub fn set_video_refresh(cb: Option<sys::VideoRefreshFn>) {
    CALLBACKS.lock().unwrap().video_refresh = cb;
}

pub fn set_audio_sample(cb: Option<sys::AudioSampleFn>) {
    // Single-sample delivery is never used; batches only.
    CALLBACKS.lock().unwrap().audio_sample = cb;
}

pub fn set_audio_sample_batch(cb: Option<sys::AudioSampleBatchFn>) {
    CALLBACKS.lock().unwrap().audio_sample_batch = cb;
}

pub fn set_input_poll(cb: Option<sys::InputPollFn>) {
    CALLBACKS.lock().unwrap().input_poll = cb;
}

pub fn set_input_state(cb: Option<sys::InputStateFn>) {
    CALLBACKS.lock().unwrap().input_state = cb;
}

/// [`Host`] implementation over the frontend's registered callbacks.
pub struct CallbackHost {
    cbs: HostCallbacks,
}

impl CallbackHost {
    /// Snapshot the currently registered callbacks for one frame.
    pub fn current() -> Self {
        Self {
            cbs: *CALLBACKS.lock().unwrap(),
        }
    }
}

fn joypad_device_id(button: Button) -> c_uint {
    match button {
        Button::A => sys::DEVICE_ID_JOYPAD_A,
        Button::B => sys::DEVICE_ID_JOYPAD_B,
        Button::Select => sys::DEVICE_ID_JOYPAD_SELECT,
        Button::Start => sys::DEVICE_ID_JOYPAD_START,
        Button::Right => sys::DEVICE_ID_JOYPAD_RIGHT,
        Button::Left => sys::DEVICE_ID_JOYPAD_LEFT,
        Button::Up => sys::DEVICE_ID_JOYPAD_UP,
        Button::Down => sys::DEVICE_ID_JOYPAD_DOWN,
    }
}

impl Host for CallbackHost {
    fn poll_input(&mut self) {
        if let Some(poll) = self.cbs.input_poll {
            // SAFETY: registered by the frontend, valid until deinit.
            unsafe { poll() }
        }
    }

    fn button_pressed(&mut self, button: Button) -> bool {
        let Some(state) = self.cbs.input_state else {
            return false;
        };
        // SAFETY: as above; fixed port/device/index per the joypad contract.
        unsafe { state(JOYPAD_PORT, sys::DEVICE_JOYPAD, 0, joypad_device_id(button)) != 0 }
    }

    fn deliver_frame(&mut self, frame: Option<&[u16]>) {
        let Some(refresh) = self.cbs.video_refresh else {
            return;
        };
        let data = frame.map_or(ptr::null(), |px| px.as_ptr().cast::<c_void>());
        // SAFETY: the buffer outlives the call; null signals a duplicate
        // frame, which the frontend accepted during negotiation.
        unsafe {
            refresh(
                data,
                FRAME_WIDTH as c_uint,
                FRAME_HEIGHT as c_uint,
                PITCH_BYTES as size_t,
            )
        }
    }

    fn deliver_audio(&mut self, samples: &[i16]) {
        let Some(batch) = self.cbs.audio_sample_batch else {
            return;
        };
        // SAFETY: interleaved stereo, frame count is the pair count.
        unsafe {
            batch(samples.as_ptr(), (samples.len() / 2) as size_t);
        }
    }
}

/// Process-wide session cell; one per `retro_core!` expansion.
pub struct CoreCell<E: Engine> {
    session: Mutex<Option<Session<E>>>,
}

impl<E: Engine> CoreCell<E> {
    pub const fn new() -> Self {
        Self {
            session: Mutex::new(None),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Session<E>) -> R) -> Option<R> {
        self.session.lock().unwrap().as_mut().map(f)
    }
}

impl<E: Engine> Default for CoreCell<E> {
    fn default() -> Self {
        Self::new()
    }
}

fn query_can_dupe() -> bool {
    let env = CALLBACKS.lock().unwrap().environment;
    let Some(env) = env else {
        return false;
    };
    let mut flag = false;
    // SAFETY: GET_CAN_DUPE takes a bool out-parameter.
    unsafe { env(sys::ENVIRONMENT_GET_CAN_DUPE, (&mut flag as *mut bool).cast::<c_void>()) && flag }
}

pub fn api_version() -> c_uint {
    sys::API_VERSION
}

pub fn init<E: Engine + Default>(cell: &CoreCell<E>) {
    let can_dupe = query_can_dupe();
    if can_dupe {
        tracing::info!("frontend accepts null frames for duplicates");
    }
    *cell.session.lock().unwrap() = Some(Session::new(E::default(), can_dupe));
}

pub fn deinit<E: Engine>(cell: &CoreCell<E>) {
    *cell.session.lock().unwrap() = None;
}

fn c_str(bytes: &'static [u8]) -> *const c_char {
    debug_assert_eq!(bytes.last(), Some(&0));
    bytes.as_ptr().cast::<c_char>()
}

/// # Safety
/// `info` must point to a writable `SystemInfo` (frontend contract).
pub unsafe fn get_system_info(info: *mut sys::SystemInfo) {
    let info = unsafe { &mut *info };
    info.library_name = c_str(b"dotmatrix\0");
    info.library_version = c_str(concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes());
    info.valid_extensions = c_str(b"gb|gbc|dmg\0");
    info.need_fullpath = false;
    info.block_extract = false;
}

/// # Safety
/// `info` must point to a writable `SystemAvInfo` (frontend contract).
pub unsafe fn get_system_av_info<E: Engine>(cell: &CoreCell<E>, info: *mut sys::SystemAvInfo) {
    // The exact ratio comes from the live session; fall back to an identical
    // throwaway path if the frontend asks before init.
    let (mul, div) = cell.with(|s| s.exact_ratio()).unwrap_or_else(|| {
        Resampler::new(NATIVE_SAMPLE_RATE, HOST_SAMPLE_RATE, SOUND_BUF_CAPACITY).exact_ratio()
    });

    let fps = CLOCK_RATE as f64 / CYCLES_PER_FRAME as f64;
    let native_rate = fps * SAMPLES_PER_FRAME as f64;

    let info = unsafe { &mut *info };
    info.geometry = sys::GameGeometry {
        base_width: FRAME_WIDTH as c_uint,
        base_height: FRAME_HEIGHT as c_uint,
        max_width: FRAME_WIDTH as c_uint,
        max_height: FRAME_HEIGHT as c_uint,
        aspect_ratio: 0.0,
    };
    // The frontend needs the exact effective rate, not the nominal target;
    // an approximation here would drift over a long session.
    info.timing = sys::SystemTiming {
        fps,
        sample_rate: native_rate * mul as f64 / div as f64,
    };
}

/// # Safety
/// `info`, when non-null, must point to a valid `GameInfo` whose ROM data
/// stays alive for the duration of the call.
pub unsafe fn load_game<E: Engine>(cell: &CoreCell<E>, info: *const sys::GameInfo) -> bool {
    let Some(info) = (unsafe { info.as_ref() }) else {
        return false;
    };
    if info.data.is_null() || info.size == 0 {
        return false;
    }
    // SAFETY: frontend owns the ROM image for the duration of the call.
    let rom = unsafe { slice::from_raw_parts(info.data.cast::<u8>(), info.size) };

    cell.with(|s| match s.load_rom(rom) {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%err, "ROM rejected by engine");
            false
        }
    })
    .unwrap_or(false)
}

pub fn run<E: Engine>(cell: &CoreCell<E>) {
    let mut host = CallbackHost::current();
    cell.with(|s| s.run_frame(&mut host));
}

pub fn reset<E: Engine>(cell: &CoreCell<E>) {
    cell.with(|s| s.reset());
}

pub fn serialize_size<E: Engine>(cell: &CoreCell<E>) -> size_t {
    cell.with(|s| s.state_size()).unwrap_or(0)
}

/// # Safety
/// `data`, when non-null, must be writable for `size` bytes.
pub unsafe fn serialize<E: Engine>(cell: &CoreCell<E>, data: *mut c_void, size: size_t) -> bool {
    if data.is_null() {
        return false;
    }
    // SAFETY: caller guarantees the region.
    let out = unsafe { slice::from_raw_parts_mut(data.cast::<u8>(), size) };
    cell.with(|s| s.save_state(out).is_ok()).unwrap_or(false)
}

/// # Safety
/// `data`, when non-null, must be readable for `size` bytes.
pub unsafe fn unserialize<E: Engine>(cell: &CoreCell<E>, data: *const c_void, size: size_t) -> bool {
    if data.is_null() {
        return false;
    }
    // SAFETY: caller guarantees the region.
    let state = unsafe { slice::from_raw_parts(data.cast::<u8>(), size) };
    cell.with(|s| s.load_state(state).is_ok()).unwrap_or(false)
}

pub fn get_memory_data<E: Engine>(cell: &CoreCell<E>, id: c_uint) -> *mut c_void {
    cell.with(|s| {
        let region = match id {
            sys::MEMORY_SAVE_RAM => s.save_ram(),
            sys::MEMORY_RTC => s.rtc_data(),
            _ => None,
        };
        region.map_or(ptr::null_mut(), |r| r.as_mut_ptr().cast::<c_void>())
    })
    .unwrap_or(ptr::null_mut())
}

pub fn get_memory_size<E: Engine>(cell: &CoreCell<E>, id: c_uint) -> size_t {
    cell.with(|s| {
        let region = match id {
            sys::MEMORY_SAVE_RAM => s.save_ram(),
            sys::MEMORY_RTC => s.rtc_data(),
            _ => None,
        };
        region.map_or(0, |r| r.len())
    })
    .unwrap_or(0)
}

/// Export the libretro C entry points for `$engine`.
///
/// ```ignore
/// #[derive(Default)]
/// struct MyEngine { /* ... */ }
///
/// impl dotmatrix_core::Engine for MyEngine { /* ... */ }
///
/// dotmatrix_core::retro_core!(MyEngine);
/// ```
#[macro_export]
macro_rules! retro_core {
    ($engine:ty) => {
        #[doc(hidden)]
        mod __retro_exports {
            use super::*;

            use $crate::libc::{c_char, c_uint, c_void, size_t};
            use $crate::libretro as rt;
            use $crate::libretro::sys;

            static CORE: rt::CoreCell<$engine> = rt::CoreCell::new();

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_api_version() -> c_uint {
                rt::api_version()
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_init() {
                rt::init(&CORE)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_deinit() {
                rt::deinit(&CORE)
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn retro_get_system_info(info: *mut sys::SystemInfo) {
                unsafe { rt::get_system_info(info) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn retro_get_system_av_info(info: *mut sys::SystemAvInfo) {
                unsafe { rt::get_system_av_info(&CORE, info) }
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_set_environment(cb: Option<sys::EnvironmentFn>) {
                rt::set_environment(cb)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_set_video_refresh(cb: Option<sys::VideoRefreshFn>) {
                rt::set_video_refresh(cb)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_set_audio_sample(cb: Option<sys::AudioSampleFn>) {
                rt::set_audio_sample(cb)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_set_audio_sample_batch(cb: Option<sys::AudioSampleBatchFn>) {
                rt::set_audio_sample_batch(cb)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_set_input_poll(cb: Option<sys::InputPollFn>) {
                rt::set_input_poll(cb)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_set_input_state(cb: Option<sys::InputStateFn>) {
                rt::set_input_state(cb)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_set_controller_port_device(_port: c_uint, _device: c_uint) {}

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_reset() {
                rt::reset(&CORE)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_run() {
                rt::run(&CORE)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_serialize_size() -> size_t {
                rt::serialize_size(&CORE)
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn retro_serialize(data: *mut c_void, size: size_t) -> bool {
                unsafe { rt::serialize(&CORE, data, size) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn retro_unserialize(data: *const c_void, size: size_t) -> bool {
                unsafe { rt::unserialize(&CORE, data, size) }
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_cheat_reset() {}

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn retro_cheat_set(
                _index: c_uint,
                _enabled: bool,
                _code: *const c_char,
            ) {
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn retro_load_game(info: *const sys::GameInfo) -> bool {
                unsafe { rt::load_game(&CORE, info) }
            }

            #[unsafe(no_mangle)]
            pub unsafe extern "C" fn retro_load_game_special(
                _kind: c_uint,
                _info: *const sys::GameInfo,
                _count: size_t,
            ) -> bool {
                false
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_unload_game() {}

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_get_region() -> c_uint {
                sys::Region::NTSC as c_uint
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_get_memory_data(id: c_uint) -> *mut c_void {
                rt::get_memory_data(&CORE, id)
            }

            #[unsafe(no_mangle)]
            pub extern "C" fn retro_get_memory_size(id: c_uint) -> size_t {
                rt::get_memory_size(&CORE, id)
            }
        }
    };
}
