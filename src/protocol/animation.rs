//! Animation upload packets. The hex helpers mirror the vendor's endian-swapped
//! hex notation for sizes and checksums.

use crate::error::EncodeError;

/// Default window size for large animations
pub const DEFAULT_WINDOW_SIZE: usize = 12 * 1024;

pub const DEFAULT_WINDOW_CHUNK: usize = 244;

/// `03 00 <option> <size:4> <crc:4> 02 <serial>`
pub const ANIMATION_HEADER_LEN: usize = 13;

const FIRST_WINDOW: (u8, u8) = (0x00, 0x01);
const NEXT_WINDOW: (u8, u8) = (0x02, 0x65);

/// Reverse the order of the byte pairs in a hex string.
pub fn switch_endian(hex: &str) -> Result<String, EncodeError> {
    if hex.len() % 2 != 0 {
        return Err(EncodeError::OddHexLength(hex.len()));
    }
    if !hex.is_ascii() {
        return Err(EncodeError::invalid("hex string contains non-ASCII characters"));
    }

    let mut swapped = String::with_capacity(hex.len());
    for pair in hex.as_bytes().chunks(2).rev() {
        swapped.push(pair[0] as char);
        swapped.push(pair[1] as char);
    }
    Ok(swapped)
}

fn decode_hex(hex: &str) -> Result<Vec<u8>, EncodeError> {
    if hex.len() % 2 != 0 {
        return Err(EncodeError::OddHexLength(hex.len()));
    }
    hex::decode(hex).map_err(|e| EncodeError::invalid(format!("bad hex data: {e}")))
}

/// CRC-32 of the bytes encoded by `hex_payload`, as 8 endian-swapped hex digits.
pub fn crc32_hex(hex_payload: &str) -> Result<String, EncodeError> {
    let bytes = decode_hex(hex_payload)?;
    switch_endian(&format!("{:08x}", crc32fast::hash(&bytes)))
}

/// Byte length of `hex_blob` as `width` endian-swapped hex digits.
pub fn frame_size_hex(hex_blob: &str, width: usize) -> Result<String, EncodeError> {
    let byte_len = hex_blob.len() / 2;
    let digits = format!("{:0width$x}", byte_len, width = width);
    if digits.len() > width {
        return Err(EncodeError::invalid(format!(
            "length {byte_len} does not fit in {width} hex digits"
        )));
    }
    switch_endian(&digits)
}

/// LE u16 of `frame_len + 2`, else a 4-byte BE fallback
fn length_prefix(frame_len: usize) -> Result<Vec<u8>, EncodeError> {
    let total = frame_len + 2;
    if let Ok(n) = u16::try_from(total) {
        return Ok(n.to_le_bytes().to_vec());
    }
    let n = u32::try_from(total)
        .map_err(|_| EncodeError::invalid(format!("frame of {frame_len} bytes too large")))?;
    Ok(n.to_be_bytes().to_vec())
}

fn size_and_crc(animation: &[u8]) -> Result<(u32, u32), EncodeError> {
    if animation.is_empty() {
        return Err(EncodeError::invalid("animation is empty"));
    }
    let size = u32::try_from(animation.len())
        .map_err(|_| EncodeError::invalid("animation exceeds 4 GiB"))?;
    Ok((size, crc32fast::hash(animation)))
}

fn push_header(frame: &mut Vec<u8>, option: u8, serial: u8, size: u32, crc: u32) {
    frame.extend_from_slice(&[0x03, 0x00, option]);
    frame.extend_from_slice(&size.to_le_bytes());
    frame.extend_from_slice(&crc.to_le_bytes());
    frame.extend_from_slice(&[0x02, serial]);
}

/// Build the single-transfer animation packet.
///
/// Packets above 64 KiB get the same 4-byte big-endian prefix as oversized
/// windows; callers normally window such animations instead.
pub fn build_animation_packet(animation: &[u8]) -> Result<Vec<u8>, EncodeError> {
    let (size, crc) = size_and_crc(animation)?;

    let mut frame = Vec::with_capacity(ANIMATION_HEADER_LEN + animation.len());
    let (option, serial) = FIRST_WINDOW;
    push_header(&mut frame, option, serial, size, crc);
    frame.extend_from_slice(animation);

    let mut packet = length_prefix(frame.len())?;
    packet.extend_from_slice(&frame);
    Ok(packet)
}

/// One window of a large animation transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub index: usize,
    pub option: u8,
    pub serial: u8,
    message: Vec<u8>,
    payload_offset: usize,
}

impl Window {
    /// Complete message: length prefix, header and this window's slice.
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// The slice of the animation carried by this window.
    pub fn payload(&self) -> &[u8] {
        &self.message[self.payload_offset..]
    }
}

/// Split an animation into windows of at most `window_size` bytes.
///
/// Every window header repeats the size and CRC of the whole animation.
pub fn build_windows(animation: &[u8], window_size: usize) -> Result<Vec<Window>, EncodeError> {
    if window_size == 0 {
        return Err(EncodeError::invalid("window size must be positive"));
    }
    let (size, crc) = size_and_crc(animation)?;

    animation
        .chunks(window_size)
        .enumerate()
        .map(|(index, chunk)| {
            let (option, serial) = if index == 0 { FIRST_WINDOW } else { NEXT_WINDOW };

            let mut frame = Vec::with_capacity(ANIMATION_HEADER_LEN + chunk.len());
            push_header(&mut frame, option, serial, size, crc);
            frame.extend_from_slice(chunk);

            let mut message = length_prefix(frame.len())?;
            let payload_offset = message.len() + ANIMATION_HEADER_LEN;
            message.extend_from_slice(&frame);

            Ok(Window { index, option, serial, message, payload_offset })
        })
        .collect()
}
