use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{info, warn};

use led_panel::adapter::{build_adapter, DisplayAdapter};
use led_panel::bitmap;
use led_panel::config::Config;
use led_panel::logging;
use led_panel::panel::PanelSelector;
use led_panel::scheduler::Scheduler;

#[derive(Parser)]
#[command(name = "led_panel")]
#[command(about = "LED panel display driver\n\nCycles sports, clock, weather, stocks and ticker views on serial LED matrix panels.", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    config: PathBuf,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Enable detailed debug (every packet)
    #[arg(long, global = true)]
    ddebug: bool,

    /// Only address this panel (repeatable; default is every panel)
    #[arg(long = "panel", value_name = "N", global = true)]
    panels: Vec<usize>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the display scheduler until Ctrl-C (default)
    Run,
    /// Show a PNG image
    Show { image: PathBuf },
    /// Play a GIF animation
    Gif {
        file: PathBuf,
        /// Keep at most this many frames
        #[arg(long)]
        max_frames: Option<u32>,
    },
    /// Clear the screen
    Clear,
    /// Turn the panels on
    On,
    /// Turn the panels off
    Off,
    /// Print adapter information as JSON
    Info,
}

fn selector(panels: &[usize]) -> PanelSelector {
    if panels.is_empty() {
        PanelSelector::All
    } else {
        PanelSelector::Only(panels.to_vec())
    }
}

fn run_scheduler(config: &Config, adapter: Box<dyn DisplayAdapter>) -> Result<()> {
    let mut scheduler = Scheduler::from_config(config, adapter)?;

    // Set up Ctrl-C handler with graceful shutdown
    let running = scheduler.get_running_flag();
    let result = ctrlc::set_handler(move || {
        info!("Shutting down...");
        running.store(false, Ordering::Relaxed);
    });
    if let Err(e) = result {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    // Run scheduler (blocks until shutdown)
    let result = scheduler.run();

    // Graceful shutdown - blank the panels before closing the ports
    scheduler.shutdown();
    result
}

fn show_image(adapter: &mut dyn DisplayAdapter, path: &Path, panels: &PanelSelector) -> Result<()> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open image {}", path.display()))?
        .to_rgb8();

    // Whole canvas when every panel is addressed, otherwise one panel's worth
    let (width, height) = match panels {
        PanelSelector::All => (adapter.display_width(), adapter.display_height()),
        PanelSelector::Only(_) => {
            let info = adapter.get_info();
            (info.panel_width, info.panel_height)
        }
    };
    let image = bitmap::fit(image, width, height);
    adapter.upload_image(&image, true, panels)?;
    info!("Displayed {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug, cli.ddebug);

    let config = Config::load(&cli.config)?;
    let panels = selector(&cli.panels);

    let mut adapter = build_adapter(&config.display);
    adapter.connect().context("Failed to connect to display")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run_scheduler(&config, adapter)?,
        Command::Show { image } => show_image(adapter.as_mut(), &image, &panels)?,
        Command::Gif { file, max_frames } => {
            let data = fs::read(&file).with_context(|| format!("Failed to read {}", file.display()))?;
            adapter.upload_gif(&data, true, max_frames, &panels)?;
            info!("Playing {}", file.display());
        }
        Command::Clear => adapter.clear_screen()?,
        Command::On => adapter.power_on()?,
        Command::Off => adapter.power_off()?,
        Command::Info => println!("{}", serde_json::to_string_pretty(&adapter.get_info())?),
    }

    Ok(())
}
