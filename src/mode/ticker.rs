use image::imageops;
use image::RgbImage;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Fetcher, Forecast, Game, Mode, ModeKind, Quote, SegmentKind, Timing, Weather};
use crate::config::TickerConfig;

/// Blank columns after the last segment so it scrolls fully out
const TAIL: u32 = 20;

/// Content of one ticker segment
#[derive(Debug, Clone, PartialEq)]
pub enum TickerSegment {
    Sports(Vec<Game>),
    Stocks(Vec<Quote>),
    Weather(Vec<Forecast>),
}

/// Draws a segment at its natural width
pub trait StripRenderer {
    fn render_segment(&self, segment: &TickerSegment, height: u32) -> RgbImage;
}

impl<F> StripRenderer for F
where
    F: Fn(&TickerSegment, u32) -> RgbImage,
{
    fn render_segment(&self, segment: &TickerSegment, height: u32) -> RgbImage {
        self(segment, height)
    }
}

/// Slide a `width`-wide window over the segments, `speed` pixels per frame.
///
/// The strip starts one window off-screen, so the first frame is blank.
pub fn scroll_frames(segments: &[RgbImage], width: u32, height: u32, speed: u32) -> Vec<RgbImage> {
    let content: u32 = segments.iter().map(RgbImage::width).sum();
    let mut strip = RgbImage::new(width + content + TAIL, height);

    let mut x = width;
    for segment in segments {
        imageops::replace(&mut strip, segment, i64::from(x), 0);
        x += segment.width();
    }

    (0..content + TAIL)
        .step_by(speed.max(1) as usize)
        .map(|offset| imageops::crop_imm(&strip, offset, 0, width, height).to_image())
        .collect()
}

/// Scrolling strip of sports, stocks and forecast segments, one strip per row
pub struct TickerMode {
    renderer: Box<dyn StripRenderer>,
    sports: Option<Box<dyn Fetcher<Vec<Game>>>>,
    stocks: Option<Box<dyn Fetcher<Vec<Quote>>>>,
    weather: Option<Box<dyn Fetcher<Weather>>>,
    layout: Vec<Vec<SegmentKind>>,
    scroll_speed: u32,
    fetch_interval: Duration,
    frame_interval: Duration,
    max_games: usize,
    max_quotes: usize,
    games: Option<Vec<Game>>,
    quotes: Option<Vec<Quote>>,
    forecasts: Option<Vec<Forecast>>,
    rows: Vec<Vec<TickerSegment>>,
    frames: Vec<RgbImage>,
    built_for: Option<(u32, u32)>,
    dirty: bool,
    cursor: usize,
    timing: Timing,
}

impl TickerMode {
    pub fn new(config: &TickerConfig, renderer: Box<dyn StripRenderer>) -> Self {
        TickerMode {
            renderer,
            sports: None,
            stocks: None,
            weather: None,
            layout: config.rows.clone(),
            scroll_speed: config.scroll_speed.max(1),
            fetch_interval: Duration::from_secs(config.check_interval_secs),
            frame_interval: Duration::from_secs(config.frame_interval_secs),
            max_games: config.max_games,
            max_quotes: config.max_quotes,
            games: None,
            quotes: None,
            forecasts: None,
            rows: Vec::new(),
            frames: Vec::new(),
            built_for: None,
            dirty: false,
            cursor: 0,
            timing: Timing::default(),
        }
    }

    pub fn with_sports(mut self, fetcher: Box<dyn Fetcher<Vec<Game>>>) -> Self {
        self.sports = Some(fetcher);
        self
    }

    pub fn with_stocks(mut self, fetcher: Box<dyn Fetcher<Vec<Quote>>>) -> Self {
        self.stocks = Some(fetcher);
        self
    }

    pub fn with_weather(mut self, fetcher: Box<dyn Fetcher<Weather>>) -> Self {
        self.weather = Some(fetcher);
        self
    }

    /// Frames of the current strip, in scroll order
    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    fn wants(&self, kind: SegmentKind) -> bool {
        self.layout.iter().any(|row| row.contains(&kind))
    }

    fn segment(&self, kind: SegmentKind) -> Option<TickerSegment> {
        match kind {
            SegmentKind::Sports => self
                .games
                .as_ref()
                .filter(|games| !games.is_empty())
                .map(|games| TickerSegment::Sports(games.iter().take(self.max_games).cloned().collect())),
            SegmentKind::Stocks => self
                .quotes
                .as_ref()
                .filter(|quotes| !quotes.is_empty())
                .map(|quotes| TickerSegment::Stocks(quotes.iter().take(self.max_quotes).cloned().collect())),
            SegmentKind::Weather => self
                .forecasts
                .as_ref()
                .filter(|forecasts| !forecasts.is_empty())
                .map(|forecasts| TickerSegment::Weather(forecasts.clone())),
        }
    }

    fn build_frames(&self, width: u32, height: u32) -> Vec<RgbImage> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        let row_height = (height / self.rows.len() as u32).max(1);

        let row_frames: Vec<Vec<RgbImage>> = self
            .rows
            .iter()
            .map(|segments| {
                if segments.is_empty() {
                    return vec![RgbImage::new(width, row_height)];
                }
                let images: Vec<RgbImage> = segments
                    .iter()
                    .map(|segment| self.renderer.render_segment(segment, row_height))
                    .collect();
                scroll_frames(&images, width, row_height, self.scroll_speed)
            })
            .collect();

        let count = row_frames.iter().map(Vec::len).max().unwrap_or(0);
        let frames: Vec<RgbImage> = (0..count)
            .map(|i| {
                let mut frame = RgbImage::new(width, height);
                for (row, frames) in row_frames.iter().enumerate() {
                    let y = i64::from(row as u32 * row_height);
                    imageops::replace(&mut frame, &frames[i % frames.len()], 0, y);
                }
                frame
            })
            .collect();

        info!("Created {} ticker frames for {} row(s)", frames.len(), self.rows.len());
        frames
    }
}

impl Mode for TickerMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Ticker
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

    /// One scroll step per refresh
    fn refresh_interval(&self) -> Duration {
        self.frame_interval
    }

    fn fetch_data(&mut self) -> bool {
        let mut fetched = false;

        if self.wants(SegmentKind::Sports) {
            if let Some(fetcher) = self.sports.as_mut() {
                match fetcher.fetch() {
                    Ok(games) => {
                        self.games = Some(games);
                        fetched = true;
                    }
                    Err(e) => warn!("Ticker sports segment unavailable: {:#}", e),
                }
            }
        }
        if self.wants(SegmentKind::Stocks) {
            if let Some(fetcher) = self.stocks.as_mut() {
                match fetcher.fetch() {
                    Ok(quotes) => {
                        self.quotes = Some(quotes);
                        fetched = true;
                    }
                    Err(e) => warn!("Ticker stocks segment unavailable: {:#}", e),
                }
            }
        }
        if self.wants(SegmentKind::Weather) {
            if let Some(fetcher) = self.weather.as_mut() {
                match fetcher.fetch() {
                    Ok(weather) => {
                        self.forecasts = Some(weather.forecasts);
                        fetched = true;
                    }
                    Err(e) => warn!("Ticker weather segment unavailable: {:#}", e),
                }
            }
        }

        if !fetched {
            return false;
        }

        let rows: Vec<Vec<TickerSegment>> = self
            .layout
            .iter()
            .map(|row| row.iter().filter_map(|&kind| self.segment(kind)).collect())
            .collect();
        if rows != self.rows {
            debug!("Ticker segments changed");
            self.rows = rows;
            self.dirty = true;
        }
        true
    }

    fn has_data(&self) -> bool {
        self.rows.iter().any(|row| !row.is_empty())
    }

    /// Next scroll frame; the strip is rebuilt when the segments changed.
    fn render(&mut self, width: u32, height: u32) -> Option<RgbImage> {
        if self.dirty || self.built_for != Some((width, height)) {
            self.frames = self.build_frames(width, height);
            self.built_for = Some((width, height));
            self.dirty = false;
            self.cursor = 0;
        }
        if self.frames.is_empty() {
            return None;
        }

        let frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Some(frame)
    }

    fn data_changed(&self) -> bool {
        self.dirty
    }

    fn forget_render(&mut self) {
        self.dirty = true;
        self.cursor = 0;
    }
}
