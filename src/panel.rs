use image::RgbImage;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use crate::bitmap::{crop_band, encode_png};
use crate::config::PacingConfig;
use crate::error::{AddressError, TransportError, UploadError};
use crate::protocol::{self, build_animation_packet, build_still_frame, build_windows};
use crate::transport::{pause, TransportChannel};

/// Which panels an operation addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PanelSelector {
    #[default]
    All,
    Only(Vec<usize>),
}

impl PanelSelector {
    /// Validate against a group of `count` panels and list the targets in order.
    ///
    /// Repeated indices are addressed once.
    pub fn resolve(&self, count: usize) -> Result<Vec<usize>, AddressError> {
        match self {
            PanelSelector::All => Ok((0..count).collect()),
            PanelSelector::Only(indices) if indices.is_empty() => Ok((0..count).collect()),
            PanelSelector::Only(indices) => {
                let mut targets = Vec::with_capacity(indices.len());
                for &index in indices {
                    if index >= count {
                        return Err(AddressError::IndexOutOfRange { index, count });
                    }
                    if !targets.contains(&index) {
                        targets.push(index);
                    }
                }
                Ok(targets)
            }
        }
    }
}

impl From<Vec<usize>> for PanelSelector {
    fn from(indices: Vec<usize>) -> Self {
        if indices.is_empty() {
            PanelSelector::All
        } else {
            PanelSelector::Only(indices)
        }
    }
}

/// Delays between protocol steps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub chunk: Duration,
    pub prepare: Duration,
    pub after_panel: Duration,
    pub upload_clear: Duration,
    pub clear: Duration,
    pub power: Duration,
    pub window_chunk: Duration,
}

impl From<&PacingConfig> for Pacing {
    fn from(config: &PacingConfig) -> Self {
        Pacing {
            chunk: Duration::from_millis(config.chunk_ms),
            prepare: Duration::from_millis(config.prepare_ms),
            after_panel: Duration::from_millis(config.panel_ms),
            upload_clear: Duration::from_millis(config.upload_clear_ms),
            clear: Duration::from_millis(config.clear_ms),
            power: Duration::from_millis(config.power_ms),
            window_chunk: Duration::from_millis(config.window_chunk_ms),
        }
    }
}

impl Pacing {
    /// No delays at all
    pub fn immediate() -> Self {
        Pacing {
            chunk: Duration::ZERO,
            prepare: Duration::ZERO,
            after_panel: Duration::ZERO,
            upload_clear: Duration::ZERO,
            clear: Duration::ZERO,
            power: Duration::ZERO,
            window_chunk: Duration::ZERO,
        }
    }
}

/// Identical panels stacked top to bottom
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelGeometry {
    pub width: u32,
    pub height: u32,
    pub count: usize,
}

impl PanelGeometry {
    pub fn canvas_height(&self) -> u32 {
        self.height * self.count as u32
    }

    /// Plan which bitmap goes to which panel.
    ///
    /// A canvas-height image on a multi-panel group is split into one band per
    /// target; anything else is replicated to every target.
    pub fn route(&self, image: &RgbImage, targets: &[usize]) -> Vec<(usize, RgbImage)> {
        if self.count > 1 && image.height() == self.canvas_height() {
            targets
                .iter()
                .map(|&panel| (panel, crop_band(image, panel as u32, self.height)))
                .collect()
        } else {
            targets.iter().map(|&panel| (panel, image.clone())).collect()
        }
    }
}

/// The transport channels of all panels of one display
pub struct PanelGroup {
    geometry: PanelGeometry,
    channels: Vec<TransportChannel>,
    pacing: Pacing,
    window_size: usize,
    window_chunk: usize,
    upload_timeout: Option<Duration>,
}

impl PanelGroup {
    /// `channels` are indexed by panel, top panel first
    pub fn new(width: u32, height: u32, channels: Vec<TransportChannel>, pacing: Pacing) -> Self {
        let geometry = PanelGeometry { width, height, count: channels.len() };
        PanelGroup {
            geometry,
            channels,
            pacing,
            window_size: protocol::DEFAULT_WINDOW_SIZE,
            window_chunk: protocol::DEFAULT_WINDOW_CHUNK,
            upload_timeout: None,
        }
    }

    pub fn with_windows(mut self, window_size: usize, window_chunk: usize) -> Self {
        self.window_size = window_size.max(1);
        self.window_chunk = window_chunk.max(1);
        self
    }

    /// Overall deadline applied to every panel of each operation
    pub fn with_upload_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.upload_timeout = timeout;
        self
    }

    pub fn geometry(&self) -> PanelGeometry {
        self.geometry
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Send the same command to every selected panel, then wait `settle`.
    pub fn broadcast(
        &mut self,
        command: &[u8],
        selector: &PanelSelector,
        settle: Duration,
    ) -> Result<(), UploadError> {
        let targets = selector.resolve(self.len())?;
        self.send_command(&targets, command, settle)?;
        Ok(())
    }

    pub fn broadcast_all(&mut self, command: &[u8], settle: Duration) -> Result<(), TransportError> {
        let targets: Vec<usize> = (0..self.len()).collect();
        self.send_command(&targets, command, settle)
    }

    fn send_command(
        &mut self,
        targets: &[usize],
        command: &[u8],
        settle: Duration,
    ) -> Result<(), TransportError> {
        debug!(?targets, "Broadcasting {}", hex::encode(command));
        self.dispatch(targets.iter().map(|&panel| (panel, ())).collect(), |channel, ()| {
            channel.send(command)
        })?;
        pause(settle);
        Ok(())
    }

    /// Encode `image` as PNG still frames and send them, split or replicated.
    pub fn upload_still(
        &mut self,
        image: &RgbImage,
        clear_first: bool,
        selector: &PanelSelector,
    ) -> Result<(), UploadError> {
        let targets = selector.resolve(self.len())?;
        debug!(?targets, "Uploading {}x{} image", image.width(), image.height());

        let mut frames = Vec::with_capacity(targets.len());
        for (panel, bitmap) in self.geometry.route(image, &targets) {
            let frame = build_still_frame(&encode_png(&bitmap)?)?;
            debug!(panel, "Still frame is {} bytes", frame.len());
            frames.push((panel, frame));
        }

        if clear_first {
            self.broadcast(&protocol::CLEAR_SCREEN, selector, self.pacing.upload_clear)?;
        }

        let pacing = self.pacing;
        self.dispatch(frames, |channel, frame| {
            channel.send(&protocol::PREPARE_IMAGE)?;
            pause(pacing.prepare);
            channel.send(&frame)?;
            info!(panel = channel.panel(), "Sent image");
            pause(pacing.after_panel);
            Ok(())
        })?;
        Ok(())
    }

    /// Send an encoded animation to every selected panel.
    ///
    /// Animations larger than one window go out window by window; every window
    /// is streamed in `window_chunk` pieces.
    pub fn upload_animation(
        &mut self,
        animation: &[u8],
        clear_first: bool,
        selector: &PanelSelector,
    ) -> Result<(), UploadError> {
        let targets = selector.resolve(self.len())?;

        let messages: Vec<Vec<u8>> = if animation.len() <= self.window_size {
            vec![build_animation_packet(animation)?]
        } else {
            build_windows(animation, self.window_size)?
                .into_iter()
                .map(|window| window.message().to_vec())
                .collect()
        };
        debug!(?targets, windows = messages.len(), "Uploading {} byte animation", animation.len());

        if clear_first {
            self.broadcast(&protocol::CLEAR_SCREEN, selector, self.pacing.upload_clear)?;
        }

        let pacing = self.pacing;
        let piece = self.window_chunk;
        let messages = &messages;
        self.dispatch(targets.into_iter().map(|panel| (panel, ())).collect(), |channel, ()| {
            channel.send(&protocol::PREPARE_IMAGE)?;
            pause(pacing.prepare);
            for message in messages {
                channel.send_windowed(message, piece, pacing.window_chunk)?;
            }
            info!(panel = channel.panel(), "Sent animation");
            pause(pacing.after_panel);
            Ok(())
        })?;
        Ok(())
    }

    pub fn close_all(&mut self) {
        for channel in &mut self.channels {
            channel.close();
        }
    }

    /// First failure in panel order wins, after every job finished
    fn dispatch<T, F>(&mut self, jobs: Vec<(usize, T)>, send: F) -> Result<(), TransportError>
    where
        T: Send,
        F: Fn(&mut TransportChannel, T) -> Result<(), TransportError> + Sync,
    {
        let timeout = self.upload_timeout;
        let mut slots: Vec<Option<&mut TransportChannel>> =
            self.channels.iter_mut().map(Some).collect();

        let mut work = Vec::with_capacity(jobs.len());
        for (panel, payload) in jobs {
            if let Some(channel) = slots.get_mut(panel).and_then(Option::take) {
                channel.set_deadline(timeout);
                work.push((panel, channel, payload));
            }
        }

        let send = &send;
        let results: Vec<Result<(), TransportError>> = if work.len() <= 1 {
            work.into_iter().map(|(_, channel, payload)| send(channel, payload)).collect()
        } else {
            thread::scope(|scope| {
                let handles: Vec<_> = work
                    .into_iter()
                    .map(|(panel, channel, payload)| {
                        (panel, scope.spawn(move || send(channel, payload)))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|(panel, handle)| {
                        handle.join().unwrap_or(Err(TransportError::WorkerPanicked { panel }))
                    })
                    .collect()
            })
        };

        results.into_iter().collect()
    }
}
