//! Video frame encoding: engine-native ARGB8888 to host XRGB1555.

use crate::{FRAME_HEIGHT, FRAME_STRIDE, FRAME_WIDTH};

/// Pixels in one frame buffer (stride times height, visible or not).
pub const FRAME_BUF_LEN: usize = FRAME_STRIDE * FRAME_HEIGHT;

/// Convert the visible 160x144 region of `src` into `dst`.
///
/// Both buffers keep the 256-pixel stride; pixels outside the visible
/// region are not written. Pure function, no state.
pub fn convert_frame(dst: &mut [u16], src: &[u32]) {
    assert!(src.len() >= FRAME_BUF_LEN, "source frame too small");
    assert!(dst.len() >= FRAME_BUF_LEN, "destination frame too small");

    for y in 0..FRAME_HEIGHT {
        let row = y * FRAME_STRIDE;
        let src_row = &src[row..row + FRAME_WIDTH];
        let dst_row = &mut dst[row..row + FRAME_WIDTH];
        for (out, &color) in dst_row.iter_mut().zip(src_row) {
            *out = pack_xrgb1555(color);
        }
    }
}

/// ARGB8888 -> XRGB1555: the top five bits of each channel, alpha dropped.
#[inline]
fn pack_xrgb1555(color: u32) -> u16 {
    let r = (color & 0x00f8_0000) >> 9;
    let g = (color & 0x0000_f800) >> 6;
    let b = (color & 0x0000_00f8) >> 3;
    (r | g | b) as u16
}
