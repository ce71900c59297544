use crate::error::EncodeError;

/// Header length of a still-image frame
pub const STILL_HEADER_LEN: usize = 15;

/// Command word for image upload
pub const STILL_COMMAND: u16 = 0x0002;

/// Flags observed in captures of the vendor app (bytes `00 2F` on the wire)
pub const STILL_FLAGS: u16 = 0x2F00;

/// Decoded still-image frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StillHeader {
    pub total_length: u16,
    pub command: u16,
    pub reserved: u8,
    pub payload_length: u32,
    pub checksum: u32,
    pub flags: u16,
}

impl StillHeader {
    /// Header describing `payload`.
    ///
    /// `total_length` keeps only the low 16 bits; payloads above 65520 bytes
    /// wrap it while `payload_length` carries the full size.
    pub fn for_payload(payload: &[u8]) -> Result<Self, EncodeError> {
        let payload_length = u32::try_from(payload.len())
            .map_err(|_| EncodeError::invalid(format!("{} byte payload exceeds 4 GiB", payload.len())))?;
        let [lo, hi, _, _] = payload_length.wrapping_add(STILL_HEADER_LEN as u32).to_le_bytes();
        Ok(StillHeader {
            total_length: u16::from_le_bytes([lo, hi]),
            command: STILL_COMMAND,
            reserved: 0x00,
            payload_length,
            checksum: crc32fast::hash(payload),
            flags: STILL_FLAGS,
        })
    }

    pub fn to_bytes(&self) -> [u8; STILL_HEADER_LEN] {
        let mut header = [0u8; STILL_HEADER_LEN];
        header[0..2].copy_from_slice(&self.total_length.to_le_bytes());
        header[2..4].copy_from_slice(&self.command.to_le_bytes());
        header[4] = self.reserved;
        header[5..9].copy_from_slice(&self.payload_length.to_le_bytes());
        header[9..13].copy_from_slice(&self.checksum.to_le_bytes());
        header[13..15].copy_from_slice(&self.flags.to_le_bytes());
        header
    }

    /// Decode the first 15 bytes of a frame.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < STILL_HEADER_LEN {
            return None;
        }
        let u16_at = |i: usize| u16::from_le_bytes([frame[i], frame[i + 1]]);
        let u32_at =
            |i: usize| u32::from_le_bytes([frame[i], frame[i + 1], frame[i + 2], frame[i + 3]]);

        Some(StillHeader {
            total_length: u16_at(0),
            command: u16_at(2),
            reserved: frame[4],
            payload_length: u32_at(5),
            checksum: u32_at(9),
            flags: u16_at(13),
        })
    }
}

/// Build a still-image frame: 15-byte header followed by the compressed image.
pub fn build_still_frame(payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    if payload.is_empty() {
        return Err(EncodeError::EmptyPayload);
    }

    let header = StillHeader::for_payload(payload)?;

    let mut frame = Vec::with_capacity(STILL_HEADER_LEN + payload.len());
    frame.extend_from_slice(&header.to_bytes());
    frame.extend_from_slice(payload);

    Ok(frame)
}
