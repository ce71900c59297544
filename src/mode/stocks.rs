use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use super::{Fetcher, Mode, ModeKind, Renderer, Snapshot, Timing};
use crate::config::StocksConfig;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub change_percent: f64,
    #[serde(default)]
    pub change: Option<f64>,
}

pub struct StocksMode {
    fetcher: Box<dyn Fetcher<Vec<Quote>>>,
    renderer: Box<dyn Renderer<Vec<Quote>>>,
    fetch_interval: Duration,
    refresh_interval: Duration,
    quotes: Vec<Quote>,
    snapshot: Snapshot<Vec<Quote>>,
    timing: Timing,
}

impl StocksMode {
    pub fn new(
        config: &StocksConfig,
        fetcher: Box<dyn Fetcher<Vec<Quote>>>,
        renderer: Box<dyn Renderer<Vec<Quote>>>,
    ) -> Self {
        StocksMode {
            fetcher,
            renderer,
            fetch_interval: Duration::from_secs(config.check_interval_secs),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            quotes: Vec::new(),
            snapshot: Snapshot::default(),
            timing: Timing::default(),
        }
    }
}

impl Mode for StocksMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Stocks
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
            Ok(quotes) => {
                info!("Fetched {} stock quotes", quotes.len());
                self.quotes = quotes;
                true
            }
            Err(e) => {
                error!("Error fetching stocks: {:#}", e);
                false
            }
        }
    }

    fn has_data(&self) -> bool {
        !self.quotes.is_empty()
    }

    fn render(&mut self, width: u32, height: u32) -> Option<RgbImage> {
        Some(self.renderer.render(&self.quotes, width, height))
    }

    fn data_changed(&self) -> bool {
        self.snapshot.changed(&self.quotes)
    }

    fn commit_render(&mut self) {
        self.snapshot.commit(&self.quotes);
    }

    fn forget_render(&mut self) {
        self.snapshot.clear();
    }
}
