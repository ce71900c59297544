use image::RgbImage;
use std::time::Duration;
use tracing::error;

use super::{Fetcher, Mode, ModeKind, Renderer, Timing, Weather};
use crate::config::ClockConfig;

/// Everything a clock face needs; the time itself is read while drawing
#[derive(Debug, Clone, PartialEq)]
pub struct ClockFace {
    pub weather: Weather,
    pub theme: String,
    pub hour24: bool,
}

/// Clock with a weather strip. Re-rendered on every refresh interval.
pub struct ClockMode {
    fetcher: Box<dyn Fetcher<Weather>>,
    renderer: Box<dyn Renderer<ClockFace>>,
    fetch_interval: Duration,
    refresh_interval: Duration,
    theme: String,
    hour24: bool,
    weather: Option<Weather>,
    timing: Timing,
}

impl ClockMode {
    pub fn new(
        config: &ClockConfig,
        fetcher: Box<dyn Fetcher<Weather>>,
        renderer: Box<dyn Renderer<ClockFace>>,
    ) -> Self {
        ClockMode {
            fetcher,
            renderer,
            fetch_interval: Duration::from_secs(config.check_interval_secs),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            theme: config.theme.clone(),
            hour24: config.hour24,
            weather: None,
            timing: Timing::default(),
        }
    }
}

impl Mode for ClockMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Clock
    }

    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn timing_mut(&mut self) -> &mut Timing {
        &mut self.timing
    }

    fn fetch_interval(&self) -> Duration {
        self.fetch_interval
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn fetch_data(&mut self) -> bool {
        match self.fetcher.fetch() {
            Ok(weather) => {
                self.weather = Some(weather);
                true
            }
            Err(e) => {
                error!("Error fetching weather for clock: {:#}", e);
                false
            }
        }
    }

    fn has_data(&self) -> bool {
        self.weather.is_some()
    }

    fn render(&mut self, width: u32, height: u32) -> Option<RgbImage> {
        let face = ClockFace {
            weather: self.weather.clone()?,
            theme: self.theme.clone(),
            hour24: self.hour24,
        };
        Some(self.renderer.render(&face, width, height))
    }
}
