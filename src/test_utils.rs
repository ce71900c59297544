//! Recording links shared by the unit tests.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::adapter::LinkOpener;
use crate::config::{DisplayConfig, PacingConfig, PanelConfig};
use crate::transport::Link;

/// Every write a link received, in order
#[derive(Clone, Default)]
pub struct WireLog {
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl WireLog {
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.writes().concat()
    }

    pub fn clear(&self) {
        self.writes.lock().unwrap().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct RecordingLink {
    log: WireLog,
    max_transfer: Option<usize>,
    fail_after: Option<usize>,
    written: usize,
}

impl RecordingLink {
    pub fn new(log: WireLog) -> Self {
        RecordingLink { log, max_transfer: None, fail_after: None, written: 0 }
    }

    pub fn with_max_transfer(mut self, max_transfer: Option<usize>) -> Self {
        self.max_transfer = max_transfer;
        self
    }

    /// Accept `writes` writes, then fail every following one
    pub fn failing_after(mut self, writes: usize) -> Self {
        self.fail_after = Some(writes);
        self
    }
}

impl Link for RecordingLink {
    fn write(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.log.is_closed() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }
        if self.fail_after.is_some_and(|limit| self.written >= limit) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "link dropped"));
        }
        self.log.writes.lock().unwrap().push(chunk.to_vec());
        self.written += 1;
        Ok(())
    }

    fn max_transfer_size(&self) -> io::Result<usize> {
        self.max_transfer
            .ok_or_else(|| io::Error::new(io::ErrorKind::Unsupported, "no transfer size"))
    }

    fn close(&mut self) {
        self.log.closed.store(true, Ordering::SeqCst);
    }
}

/// Opens recording links; one log per panel
pub struct MockOpener {
    pub logs: Vec<WireLog>,
    pub fail_panel: Option<usize>,
    pub fail_writes_after: Option<usize>,
}

impl MockOpener {
    pub fn new(panels: usize) -> Self {
        MockOpener {
            logs: (0..panels).map(|_| WireLog::default()).collect(),
            fail_panel: None,
            fail_writes_after: None,
        }
    }
}

impl LinkOpener for MockOpener {
    fn open(&self, panel: usize, _config: &PanelConfig) -> io::Result<Box<dyn Link>> {
        if self.fail_panel == Some(panel) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such device"));
        }
        self.logs[panel].closed.store(false, Ordering::SeqCst);
        let mut link = RecordingLink::new(self.logs[panel].clone()).with_max_transfer(Some(512));
        if let Some(writes) = self.fail_writes_after {
            link = link.failing_after(writes);
        }
        Ok(Box::new(link))
    }
}

/// Display of `panels` stacked 64x20 panels with every delay set to zero
pub fn display_config(panels: usize) -> DisplayConfig {
    let json = serde_json::json!({
        "panels": (0..panels)
            .map(|i| serde_json::json!({ "port": format!("/dev/ttyTEST{i}") }))
            .collect::<Vec<_>>(),
    });
    let mut config: DisplayConfig = serde_json::from_value(json).unwrap();
    config.pacing = PacingConfig {
        chunk_ms: 0,
        prepare_ms: 0,
        panel_ms: 0,
        upload_clear_ms: 0,
        clear_ms: 0,
        power_ms: 0,
        window_chunk_ms: 0,
    };
    config
}
