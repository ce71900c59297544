//! Display modes with their own fetch and render cadence.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::ModesConfig;
use crate::render::TextRenderer;
use crate::source::JsonFileFetcher;

mod clock;
mod sports;
mod stocks;
mod ticker;
mod weather;

pub use clock::{ClockFace, ClockMode};
pub use sports::{Game, SportsBoard, SportsMode};
pub use stocks::{Quote, StocksMode};
pub use ticker::{StripRenderer, TickerMode, TickerSegment};
pub use weather::{Conditions, Forecast, Weather, WeatherMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    Sports,
    Clock,
    Weather,
    Stocks,
    Ticker,
}

impl ModeKind {
    pub fn name(&self) -> &'static str {
        match self {
            ModeKind::Sports => "sports",
            ModeKind::Clock => "clock",
            ModeKind::Weather => "weather",
            ModeKind::Stocks => "stocks",
            ModeKind::Ticker => "ticker",
        }
    }
}

impl fmt::Display for ModeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SportsView {
    Live,
    Upcoming,
}

/// Content that can appear in a ticker row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Sports,
    Stocks,
    Weather,
}

/// Outcome of one `Mode::update`
#[derive(Debug, Default)]
pub struct ModeResult {
    pub image: Option<RgbImage>,
    /// No displayable data; the scheduler moves on
    pub should_skip: bool,
    pub priority: bool,
    pub state_changed: bool,
}

impl ModeResult {
    pub fn skip() -> Self {
        ModeResult { should_skip: true, ..Default::default() }
    }
}

/// True when `interval` has passed since `since`, or nothing happened yet
pub fn elapsed(since: Option<Instant>, now: Instant, interval: Duration) -> bool {
    since.map_or(true, |at| now.saturating_duration_since(at) >= interval)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    pub last_fetch: Option<Instant>,
    /// Last fetch attempt, successful or not
    pub last_poll: Option<Instant>,
    pub last_render: Option<Instant>,
}

/// The copy of the data used for the last render
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
    rendered: Option<T>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Snapshot { rendered: None }
    }
}

impl<T: Clone + PartialEq> Snapshot<T> {
    pub fn changed(&self, current: &T) -> bool {
        self.rendered.as_ref() != Some(current)
    }

    pub fn commit(&mut self, current: &T) {
        self.rendered = Some(current.clone());
    }

    pub fn clear(&mut self) {
        self.rendered = None;
    }
}

/// Source of a mode's domain data
pub trait Fetcher<T> {
    fn fetch(&mut self) -> anyhow::Result<T>;
}

impl<T, F> Fetcher<T> for F
where
    F: FnMut() -> anyhow::Result<T>,
{
    fn fetch(&mut self) -> anyhow::Result<T> {
        self()
    }
}

/// Draws a mode's data into a bitmap of the requested size
pub trait Renderer<T> {
    fn render(&self, data: &T, width: u32, height: u32) -> RgbImage;
}

impl<T, F> Renderer<T> for F
where
    F: Fn(&T, u32, u32) -> RgbImage,
{
    fn render(&self, data: &T, width: u32, height: u32) -> RgbImage {
        self(data, width, height)
    }
}

pub trait Mode {
    fn kind(&self) -> ModeKind;

    fn timing(&self) -> &Timing;

    fn timing_mut(&mut self) -> &mut Timing;

    fn fetch_interval(&self) -> Duration;

    fn refresh_interval(&self) -> Duration;

    /// Refresh the cached data. On failure the previous data stays.
    fn fetch_data(&mut self) -> bool;

    fn has_data(&self) -> bool;

    fn render(&mut self, width: u32, height: u32) -> Option<RgbImage>;

    fn has_priority(&self) -> bool {
        false
    }

    /// Cached data differs from what was last rendered
    fn data_changed(&self) -> bool {
        false
    }

    fn commit_render(&mut self) {}

    fn forget_render(&mut self) {}

    /// Recompute derived state for the tick at `now`
    fn prepare(&mut self, _now: Instant) {}

    /// Modes that can claim priority are polled every tick, even in the background
    fn watches_priority(&self) -> bool {
        false
    }

    /// At most one attempt per tick
    fn should_fetch(&self, now: Instant) -> bool {
        let timing = self.timing();
        timing.last_poll != Some(now) && elapsed(timing.last_fetch, now, self.fetch_interval())
    }

    fn should_render(&self, now: Instant) -> bool {
        self.data_changed() || elapsed(self.timing().last_render, now, self.refresh_interval())
    }

    /// Called when the mode takes over the display. Cached data is kept.
    fn reset_state(&mut self) {
        self.timing_mut().last_render = None;
        self.forget_render();
    }

    /// Fetch if due; returns whether a fetch succeeded
    fn poll(&mut self, now: Instant) -> bool {
        if !self.should_fetch(now) {
            return false;
        }
        self.timing_mut().last_poll = Some(now);
        if self.fetch_data() {
            self.timing_mut().last_fetch = Some(now);
            true
        } else {
            warn!(mode = %self.kind(), "Fetch failed, keeping cached data");
            false
        }
    }

    fn update(&mut self, width: u32, height: u32, now: Instant) -> ModeResult {
        self.poll(now);
        self.prepare(now);

        if !self.has_data() {
            debug!(mode = %self.kind(), "No data to display");
            return ModeResult::skip();
        }
        if !self.should_render(now) {
            return ModeResult::default();
        }

        let state_changed = self.data_changed();
        let image = self.render(width, height);
        self.commit_render();
        self.timing_mut().last_render = Some(now);

        ModeResult { image, should_skip: false, priority: self.has_priority(), state_changed }
    }
}

/// Mode reading its configured JSON snapshots, drawn by the text renderer
pub fn build_mode(kind: ModeKind, config: &ModesConfig) -> Box<dyn Mode> {
    let renderer = TextRenderer::default();
    match kind {
        ModeKind::Sports => Box::new(SportsMode::new(
            &config.sports,
            Box::new(JsonFileFetcher::<Vec<Game>>::new(&config.sports.data_file)),
            Box::new(renderer),
        )),
        ModeKind::Clock => Box::new(ClockMode::new(
            &config.clock,
            Box::new(JsonFileFetcher::<Weather>::new(&config.weather.data_file)),
            Box::new(renderer),
        )),
        ModeKind::Weather => Box::new(WeatherMode::new(
            &config.weather,
            Box::new(JsonFileFetcher::<Weather>::new(&config.weather.data_file)),
            Box::new(renderer),
        )),
        ModeKind::Stocks => Box::new(StocksMode::new(
            &config.stocks,
            Box::new(JsonFileFetcher::<Vec<Quote>>::new(&config.stocks.data_file)),
            Box::new(renderer),
        )),
        ModeKind::Ticker => Box::new(
            TickerMode::new(&config.ticker, Box::new(renderer))
                .with_sports(Box::new(JsonFileFetcher::<Vec<Game>>::new(&config.sports.data_file)))
                .with_stocks(Box::new(JsonFileFetcher::<Vec<Quote>>::new(&config.stocks.data_file)))
                .with_weather(Box::new(JsonFileFetcher::<Weather>::new(&config.weather.data_file))),
        ),
    }
}
