use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapter::AdapterKind;
use crate::mode::{ModeKind, SegmentKind, SportsView};
use crate::scheduler::PowerSchedule;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub display: DisplayConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub modes: ModesConfig,
    /// Quiet hours during which the panels are switched off
    pub power: Option<PowerConfig>,
}

impl Config {
    /// Read and validate a JSON configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.display.panels.is_empty() {
            anyhow::bail!("display.panels must list at least one panel");
        }
        if self.display.panel_width == 0 || self.display.panel_height == 0 {
            anyhow::bail!(
                "Panel size must be positive, got {}x{}",
                self.display.panel_width,
                self.display.panel_height
            );
        }
        if self.scheduler.cycle_modes.is_empty() {
            anyhow::bail!("scheduler.cycle_modes must name at least one mode");
        }
        if self.display.window_size == 0 || self.display.window_chunk == 0 {
            anyhow::bail!("display.window_size and display.window_chunk must be positive");
        }
        if let Some(power) = &self.power {
            power.schedule().context("Invalid power schedule")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub adapter: AdapterKind,
    #[serde(default = "default_panel_width")]
    pub panel_width: u32,
    #[serde(default = "default_panel_height")]
    pub panel_height: u32,
    /// One entry per physical panel, top to bottom
    pub panels: Vec<PanelConfig>,
    #[serde(default)]
    pub pacing: PacingConfig,
    /// Overall deadline for a single upload
    pub upload_timeout_ms: Option<u64>,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_window_chunk")]
    pub window_chunk: usize,
    /// Frame cap applied to GIF uploads without an explicit limit
    #[serde(default = "default_max_frames")]
    pub max_gif_frames: u32,
}

impl DisplayConfig {
    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PanelConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Largest single write the link accepts; unset means "ask the link"
    pub max_transfer: Option<usize>,
}

/// Delays between protocol steps, in milliseconds
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PacingConfig {
    pub chunk_ms: u64,
    pub prepare_ms: u64,
    pub panel_ms: u64,
    /// Settle time after the clear that may precede an upload
    pub upload_clear_ms: u64,
    pub clear_ms: u64,
    pub power_ms: u64,
    pub window_chunk_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig {
            chunk_ms: 10,
            prepare_ms: 50,
            panel_ms: 200,
            upload_clear_ms: 100,
            clear_ms: 300,
            power_ms: 200,
            window_chunk_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub cycle_modes: Vec<ModeKind>,
    pub cycle_seconds: u64,
    pub tick_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            cycle_modes: vec![ModeKind::Clock, ModeKind::Weather],
            cycle_seconds: 300,
            tick_seconds: 2,
        }
    }
}

impl SchedulerConfig {
    pub fn cycle_duration(&self) -> Duration {
        Duration::from_secs(self.cycle_seconds)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_seconds)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ModesConfig {
    pub sports: SportsConfig,
    pub weather: WeatherConfig,
    pub clock: ClockConfig,
    pub stocks: StocksConfig,
    pub ticker: TickerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SportsConfig {
    pub data_file: PathBuf,
    pub check_interval_secs: u64,
    pub refresh_interval_secs: u64,
    /// Live games take over the display
    pub priority: bool,
    pub show: Vec<SportsView>,
}

impl Default for SportsConfig {
    fn default() -> Self {
        SportsConfig {
            data_file: PathBuf::from("data/sports.json"),
            check_interval_secs: 10,
            refresh_interval_secs: 2,
            priority: true,
            show: vec![SportsView::Live, SportsView::Upcoming],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub data_file: PathBuf,
    pub check_interval_secs: u64,
    pub refresh_interval_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            data_file: PathBuf::from("data/weather.json"),
            check_interval_secs: 1800,
            refresh_interval_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClockConfig {
    pub theme: String,
    pub hour24: bool,
    /// How often the weather strip is re-read
    pub check_interval_secs: u64,
    pub refresh_interval_secs: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        ClockConfig {
            theme: "classic".to_string(),
            hour24: false,
            check_interval_secs: 300,
            refresh_interval_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StocksConfig {
    pub data_file: PathBuf,
    pub check_interval_secs: u64,
    pub refresh_interval_secs: u64,
}

impl Default for StocksConfig {
    fn default() -> Self {
        StocksConfig {
            data_file: PathBuf::from("data/stocks.json"),
            check_interval_secs: 300,
            refresh_interval_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TickerConfig {
    /// Segments per row; one row spans the canvas, several rows split it per panel
    pub rows: Vec<Vec<SegmentKind>>,
    /// Pixels advanced per frame
    pub scroll_speed: u32,
    pub check_interval_secs: u64,
    /// Time between two scroll frames
    pub frame_interval_secs: u64,
    pub max_games: usize,
    pub max_quotes: usize,
}

impl Default for TickerConfig {
    fn default() -> Self {
        TickerConfig {
            rows: vec![vec![SegmentKind::Sports, SegmentKind::Stocks]],
            scroll_speed: 3,
            check_interval_secs: 30,
            frame_interval_secs: 2,
            max_games: 10,
            max_quotes: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PowerConfig {
    /// "HH:MM"; "24:00" means midnight
    pub off_at: String,
    pub on_at: String,
}

impl PowerConfig {
    pub fn schedule(&self) -> Result<PowerSchedule> {
        PowerSchedule::parse(&self.off_at, &self.on_at)
    }
}

fn default_panel_width() -> u32 {
    64
}

fn default_panel_height() -> u32 {
    20
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_window_size() -> usize {
    crate::protocol::DEFAULT_WINDOW_SIZE
}

fn default_window_chunk() -> usize {
    crate::protocol::DEFAULT_WINDOW_CHUNK
}

fn default_max_frames() -> u32 {
    100
}
