//! Wire format of the iPixel LED panels.

mod animation;
mod still;

pub use animation::{
    build_animation_packet, build_windows, crc32_hex, frame_size_hex, switch_endian, Window,
    ANIMATION_HEADER_LEN, DEFAULT_WINDOW_CHUNK, DEFAULT_WINDOW_SIZE,
};
pub use still::{build_still_frame, StillHeader, STILL_COMMAND, STILL_FLAGS, STILL_HEADER_LEN};

pub const SCREEN_ON: [u8; 5] = [0x05, 0x00, 0x07, 0x01, 0x01];
pub const SCREEN_OFF: [u8; 5] = [0x05, 0x00, 0x07, 0x01, 0x00];
pub const CLEAR_SCREEN: [u8; 5] = [0x05, 0x00, 0x08, 0x01, 0x01];

/// Stops any running drawing so the panel accepts an image upload
pub const PREPARE_IMAGE: [u8; 5] = [0x05, 0x00, 0x04, 0x01, 0x00];
