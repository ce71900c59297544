use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use super::{Fetcher, Mode, ModeKind, Renderer, Snapshot, Timing};
use crate::config::WeatherConfig;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Conditions {
    pub temperature: f32,
    pub description: String,
    #[serde(default)]
    pub feels_like: Option<f32>,
    #[serde(default)]
    pub humidity: Option<u8>,
}

/// One forecast slot, daily or hourly
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Forecast {
    pub label: String,
    pub high: f32,
    pub low: f32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Weather {
    pub current: Conditions,
    #[serde(default)]
    pub forecasts: Vec<Forecast>,
}

/// Current conditions and forecast
pub struct WeatherMode {
    fetcher: Box<dyn Fetcher<Weather>>,
    renderer: Box<dyn Renderer<Weather>>,
    fetch_interval: Duration,
    refresh_interval: Duration,
    weather: Option<Weather>,
    snapshot: Snapshot<Weather>,
    timing: Timing,
}

impl WeatherMode {
    pub fn new(
        config: &WeatherConfig,
        fetcher: Box<dyn Fetcher<Weather>>,
        renderer: Box<dyn Renderer<Weather>>,
    ) -> Self {
        WeatherMode {
            fetcher,
            renderer,
            fetch_interval: Duration::from_secs(config.check_interval_secs),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            weather: None,
            snapshot: Snapshot::default(),
            timing: Timing::default(),
        }
    }
}

impl Mode for WeatherMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Weather
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
                info!("Fetched weather: {} forecasts", weather.forecasts.len());
                self.weather = Some(weather);
                true
            }
            Err(e) => {
                error!("Error fetching weather: {:#}", e);
                false
            }
        }
    }

    fn has_data(&self) -> bool {
        self.weather.is_some()
    }

    fn render(&mut self, width: u32, height: u32) -> Option<RgbImage> {
        let weather = self.weather.as_ref()?;
        Some(self.renderer.render(weather, width, height))
    }

    fn data_changed(&self) -> bool {
        self.weather.as_ref().is_some_and(|w| self.snapshot.changed(w))
    }

    fn commit_render(&mut self) {
        if let Some(weather) = &self.weather {
            self.snapshot.commit(weather);
        }
    }

    fn forget_render(&mut self) {
        self.snapshot.clear();
    }
}
