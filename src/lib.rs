//! Driver for chains of serial LED matrix panels showing rotating content.

pub mod adapter;
pub mod bitmap;
pub mod config;
pub mod error;
pub mod logging;
pub mod mode;
pub mod panel;
pub mod protocol;
pub mod render;
pub mod scheduler;
pub mod source;
pub mod transport;

#[cfg(test)]
mod test_utils;
