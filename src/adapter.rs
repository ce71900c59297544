use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::io;
use tracing::{info, warn};

use crate::bitmap::prepare_animation;
use crate::config::{DisplayConfig, PanelConfig};
use crate::error::{ConnectionError, UploadError};
use crate::panel::{Pacing, PanelGroup, PanelSelector};
use crate::protocol;
use crate::transport::{Link, SerialLink, TransportChannel};

/// Panel hardware the display is built from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterKind {
    /// Any number of stacked iPixel panels, geometry from config
    #[default]
    Ipixel,
    /// Fixed 64x20 iPixel panels
    Ipixel20x64,
}

impl AdapterKind {
    pub fn name(&self) -> &'static str {
        match self {
            AdapterKind::Ipixel => "ipixel",
            AdapterKind::Ipixel20x64 => "ipixel20x64",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Static description of an adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterInfo {
    pub adapter_type: String,
    pub device_count: usize,
    pub panel_width: u32,
    pub panel_height: u32,
    pub total_width: u32,
    pub total_height: u32,
    pub protocol: String,
    pub firmware_version: Option<String>,
    pub features: Vec<String>,
}

/// A display made of one or more panels
pub trait DisplayAdapter {
    fn connect(&mut self) -> Result<(), ConnectionError>;

    /// Close every link. Safe to call in any state.
    fn disconnect(&mut self);

    fn upload_image(
        &mut self,
        image: &RgbImage,
        clear_first: bool,
        panels: &PanelSelector,
    ) -> Result<(), UploadError>;

    /// Upload a GIF, keeping at most `max_frames` frames (adapter default when `None`)
    fn upload_gif(
        &mut self,
        data: &[u8],
        clear_first: bool,
        max_frames: Option<u32>,
        panels: &PanelSelector,
    ) -> Result<(), UploadError>;

    fn clear_screen(&mut self) -> Result<(), UploadError>;

    fn power_on(&mut self) -> Result<(), UploadError>;

    fn power_off(&mut self) -> Result<(), UploadError>;

    fn display_width(&self) -> u32;

    fn display_height(&self) -> u32;

    fn is_connected(&self) -> bool;

    fn get_info(&self) -> AdapterInfo;
}

/// Opens the raw link of one panel
pub trait LinkOpener: Send {
    fn open(&self, panel: usize, config: &PanelConfig) -> io::Result<Box<dyn Link>>;
}

pub struct SerialOpener;

impl LinkOpener for SerialOpener {
    fn open(&self, _panel: usize, config: &PanelConfig) -> io::Result<Box<dyn Link>> {
        Ok(Box::new(SerialLink::open(config)?))
    }
}

/// iPixel panels driven through one link each
pub struct PanelAdapter {
    kind: AdapterKind,
    config: DisplayConfig,
    opener: Box<dyn LinkOpener>,
    group: Option<PanelGroup>,
    state: ConnectionState,
}

impl PanelAdapter {
    pub fn new(kind: AdapterKind, mut config: DisplayConfig, opener: Box<dyn LinkOpener>) -> Self {
        if kind == AdapterKind::Ipixel20x64
            && (config.panel_width, config.panel_height) != (64, 20)
        {
            warn!(
                "{} panels are 64x20, ignoring configured {}x{}",
                kind.name(),
                config.panel_width,
                config.panel_height
            );
            config.panel_width = 64;
            config.panel_height = 20;
        }

        PanelAdapter { kind, config, opener, group: None, state: ConnectionState::Disconnected }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn pacing(&self) -> Pacing {
        Pacing::from(&self.config.pacing)
    }

    fn group(&mut self) -> Result<&mut PanelGroup, ConnectionError> {
        match (self.state, self.group.as_mut()) {
            (ConnectionState::Connected, Some(group)) => Ok(group),
            _ => Err(ConnectionError::NotConnected),
        }
    }
}

impl DisplayAdapter for PanelAdapter {
    fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }
        if self.config.panels.is_empty() {
            return Err(ConnectionError::NoPanels);
        }

        self.state = ConnectionState::Connecting;
        let pacing = self.pacing();
        let count = self.config.panels.len();
        info!("Connecting to {} LED panel(s)...", count);

        let mut channels = Vec::with_capacity(count);
        for (panel, panel_config) in self.config.panels.iter().enumerate() {
            match self.opener.open(panel, panel_config) {
                Ok(link) => {
                    channels.push(TransportChannel::new(panel, link, pacing.chunk));
                    info!("Connected to panel {}/{} ({})", panel + 1, count, panel_config.port);
                }
                Err(source) => {
                    for channel in &mut channels {
                        channel.close();
                    }
                    self.state = ConnectionState::Disconnected;
                    return Err(ConnectionError::Open {
                        panel,
                        port: panel_config.port.clone(),
                        source,
                    });
                }
            }
        }

        let mut group =
            PanelGroup::new(self.config.panel_width, self.config.panel_height, channels, pacing)
                .with_windows(self.config.window_size, self.config.window_chunk)
                .with_upload_timeout(self.config.upload_timeout());

        if let Err(e) = group.broadcast_all(&protocol::SCREEN_ON, pacing.power) {
            group.close_all();
            self.state = ConnectionState::Disconnected;
            return Err(ConnectionError::Init(e));
        }

        info!("Initialized {} panel(s)", count);
        self.group = Some(group);
        self.state = ConnectionState::Connected;
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(mut group) = self.group.take() {
            group.close_all();
            info!("Disconnected from panels");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn upload_image(
        &mut self,
        image: &RgbImage,
        clear_first: bool,
        panels: &PanelSelector,
    ) -> Result<(), UploadError> {
        self.group()?.upload_still(image, clear_first, panels)
    }

    fn upload_gif(
        &mut self,
        data: &[u8],
        clear_first: bool,
        max_frames: Option<u32>,
        panels: &PanelSelector,
    ) -> Result<(), UploadError> {
        let (width, height) = (self.config.panel_width, self.config.panel_height);
        let max_frames = max_frames.unwrap_or(self.config.max_gif_frames) as usize;
        let group = self.group()?;

        let animation = prepare_animation(data, width, height, max_frames)?;
        group.upload_animation(&animation, clear_first, panels)
    }

    fn clear_screen(&mut self) -> Result<(), UploadError> {
        let settle = self.pacing().clear;
        self.group()?.broadcast_all(&protocol::CLEAR_SCREEN, settle)?;
        info!("Panels cleared");
        Ok(())
    }

    fn power_on(&mut self) -> Result<(), UploadError> {
        let settle = self.pacing().power;
        self.group()?.broadcast_all(&protocol::SCREEN_ON, settle)?;
        info!("Display is ON");
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), UploadError> {
        let settle = self.pacing().power;
        self.group()?.broadcast_all(&protocol::SCREEN_OFF, settle)?;
        info!("Display is OFF");
        Ok(())
    }

    fn display_width(&self) -> u32 {
        self.config.panel_width
    }

    fn display_height(&self) -> u32 {
        self.config.panel_height * self.config.panels.len() as u32
    }

    fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    fn get_info(&self) -> AdapterInfo {
        let mut features = vec!["png_upload".to_string(), "gif_upload".to_string()];
        if self.config.panels.len() > 1 {
            features.push("multi_panel".to_string());
        }
        features.push("fast_refresh".to_string());

        AdapterInfo {
            adapter_type: self.kind.name().to_string(),
            device_count: self.config.panels.len(),
            panel_width: self.config.panel_width,
            panel_height: self.config.panel_height,
            total_width: self.display_width(),
            total_height: self.display_height(),
            protocol: "iPixel serial".to_string(),
            firmware_version: None,
            features,
        }
    }
}

impl Drop for PanelAdapter {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Adapter for the configured hardware, talking over serial ports
pub fn build_adapter(config: &DisplayConfig) -> Box<dyn DisplayAdapter> {
    Box::new(PanelAdapter::new(config.adapter, config.clone(), Box::new(SerialOpener)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::test_utils::{display_config, MockOpener, WireLog};
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, Rgba, RgbaImage};

    fn adapter(panels: usize) -> (PanelAdapter, Vec<WireLog>) {
        let opener = MockOpener::new(panels);
        let logs = opener.logs.clone();
        (PanelAdapter::new(AdapterKind::Ipixel, display_config(panels), Box::new(opener)), logs)
    }

    #[test]
    fn test_connect_powers_on_every_panel() {
        let (mut adapter, logs) = adapter(2);
        assert_eq!(adapter.state(), ConnectionState::Disconnected);

        adapter.connect().unwrap();

        assert!(adapter.is_connected());
        for log in &logs {
            assert_eq!(log.bytes(), protocol::SCREEN_ON.to_vec());
        }
    }

    #[test]
    fn test_failed_open_closes_opened_links() {
        let mut opener = MockOpener::new(3);
        opener.fail_panel = Some(2);
        let logs = opener.logs.clone();
        let mut adapter = PanelAdapter::new(AdapterKind::Ipixel, display_config(3), Box::new(opener));

        let err = adapter.connect().unwrap_err();

        assert!(matches!(err, ConnectionError::Open { panel: 2, .. }));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
        assert!(logs[0].is_closed());
        assert!(logs[1].is_closed());
    }

    #[test]
    fn test_failed_init_disconnects() {
        let mut opener = MockOpener::new(2);
        opener.fail_writes_after = Some(0);
        let logs = opener.logs.clone();
        let mut adapter = PanelAdapter::new(AdapterKind::Ipixel, display_config(2), Box::new(opener));

        let err = adapter.connect().unwrap_err();

        assert!(matches!(err, ConnectionError::Init(TransportError::Write { .. })));
        assert!(!adapter.is_connected());
        assert!(logs.iter().all(WireLog::is_closed));
    }

    #[test]
    fn test_operations_require_connection() {
        let (mut adapter, logs) = adapter(1);
        let image = RgbImage::new(64, 20);

        let err = adapter.upload_image(&image, false, &PanelSelector::All).unwrap_err();
        assert!(matches!(err, UploadError::Connection(ConnectionError::NotConnected)));
        assert!(adapter.clear_screen().is_err());
        assert!(adapter.power_off().is_err());
        assert!(logs[0].writes().is_empty());
    }

    #[test]
    fn test_disconnect_is_idempotent_and_reconnect_works() {
        let (mut adapter, logs) = adapter(1);
        adapter.disconnect();
        adapter.connect().unwrap();
        adapter.disconnect();
        adapter.disconnect();

        assert!(logs[0].is_closed());
        assert!(!adapter.is_connected());

        adapter.connect().unwrap();
        adapter.clear_screen().unwrap();
        let mut expected = protocol::SCREEN_ON.to_vec();
        expected.extend(protocol::SCREEN_ON);
        expected.extend(protocol::CLEAR_SCREEN);
        assert_eq!(logs[0].bytes(), expected);
    }

    #[test]
    fn test_power_commands_broadcast() {
        let (mut adapter, logs) = adapter(2);
        adapter.connect().unwrap();
        for log in &logs {
            log.clear();
        }

        adapter.power_off().unwrap();
        adapter.power_on().unwrap();

        let mut expected = protocol::SCREEN_OFF.to_vec();
        expected.extend(protocol::SCREEN_ON);
        for log in &logs {
            assert_eq!(log.bytes(), expected);
        }
    }

    #[test]
    fn test_upload_gif_sends_animation_packet() {
        let mut gif = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut gif);
            for shade in [0u8, 128, 255] {
                let buffer = RgbaImage::from_pixel(8, 8, Rgba([shade, shade, 0, 255]));
                encoder
                    .encode_frame(Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(50, 1)))
                    .unwrap();
            }
        }

        let (mut adapter, logs) = adapter(1);
        adapter.connect().unwrap();
        logs[0].clear();

        adapter.upload_gif(&gif, false, Some(2), &PanelSelector::All).unwrap();

        let bytes = logs[0].bytes();
        assert_eq!(&bytes[..5], &protocol::PREPARE_IMAGE);
        let packet = &bytes[5..];
        assert_eq!(u16::from_le_bytes([packet[0], packet[1]]) as usize, packet.len());
        assert_eq!(&packet[2..5], &[0x03, 0x00, 0x00]);
        assert_eq!(&packet[15..21], b"GIF89a");
    }

    #[test]
    fn test_info_and_dimensions() {
        let (adapter, _) = adapter(2);
        let info = adapter.get_info();

        assert_eq!((adapter.display_width(), adapter.display_height()), (64, 40));
        assert_eq!(info.adapter_type, "ipixel");
        assert_eq!(info.device_count, 2);
        assert_eq!((info.total_width, info.total_height), (64, 40));
        assert!(info.features.contains(&"multi_panel".to_string()));
    }

    #[test]
    fn test_fixed_geometry_kind() {
        let mut config = display_config(1);
        config.panel_width = 32;
        config.panel_height = 16;
        let adapter =
            PanelAdapter::new(AdapterKind::Ipixel20x64, config, Box::new(MockOpener::new(1)));

        assert_eq!((adapter.display_width(), adapter.display_height()), (64, 20));
        assert_eq!(adapter.get_info().adapter_type, "ipixel20x64");
    }
}
