use tracing::level_filters::LevelFilter;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default level for the CLI flags; `--ddebug` implies `--debug`
pub fn level(debug: bool, ddebug: bool) -> LevelFilter {
    if ddebug {
        LevelFilter::TRACE
    } else if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Console logging on stderr. `RUST_LOG` takes precedence over the flags.
pub fn init(debug: bool, ddebug: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(level(debug, ddebug).into())
        .from_env_lossy();

    let result = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(ddebug))
        .with(filter)
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: Could not initialize logging: {}", e);
    }
}
