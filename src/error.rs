//! Error types for panel encoding, transport and upload.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::mode::ModeKind;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("payload is empty")]
    EmptyPayload,

    #[error("hex string has odd length {0}")]
    OddHexLength(usize),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl EncodeError {
    pub(crate) fn invalid(details: impl Into<String>) -> Self {
        EncodeError::InvalidPayload(details.into())
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("write to panel {panel} failed after {sent} of {total} bytes")]
    Write {
        panel: usize,
        sent: usize,
        total: usize,
        #[source]
        source: io::Error,
    },

    #[error("panel {panel} link is closed")]
    Closed { panel: usize },

    #[error("upload to panel {panel} exceeded its {timeout:?} deadline")]
    DeadlineExceeded { panel: usize, timeout: Duration },

    #[error("send worker for panel {panel} panicked")]
    WorkerPanicked { panel: usize },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressError {
    #[error("panel index {index} out of range (0-{})", .count.saturating_sub(1))]
    IndexOutOfRange { index: usize, count: usize },
}

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("not connected to display")]
    NotConnected,

    #[error("no panels configured")]
    NoPanels,

    #[error("failed to open panel {panel} on {port}")]
    Open {
        panel: usize,
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to initialize panels")]
    Init(#[source] TransportError),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
}

impl UploadError {
    /// True when the upload was abandoned because its deadline ran out.
    pub fn is_deadline(&self) -> bool {
        matches!(self, UploadError::Transport(TransportError::DeadlineExceeded { .. }))
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("no display modes configured")]
    EmptyCycle,

    #[error("display mode {0:?} configured more than once")]
    DuplicateMode(ModeKind),
}
