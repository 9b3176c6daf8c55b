//! Markup Overlay - headless host for the overlay engine.
//!
//! Opens a file, lets the engine settle (revalidation plus any renders)
//! and prints the resulting regions.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use markup_overlay_core::{
    discover_config, load_config, Document, OverlayConfig, Position, RegionSnapshot, RenderState,
};

/// Default time to wait for renders to finish.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Parser, Debug)]
#[command(name = "markup-overlay")]
#[command(about = "Show how a document looks with its markup overlaid")]
#[command(version)]
/// Command-line arguments.
struct Options {
    /// Document to open
    file: PathBuf,

    /// Configuration file (discovered from the document's directory if omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print regions as JSON
    #[arg(long)]
    json: bool,

    /// Hide math without starting the renderer
    #[arg(long)]
    no_render: bool,

    /// 0-based cursor position
    #[arg(long, value_name = "LINE:COL", value_parser = parse_position)]
    cursor: Option<Position>,

    /// Time to wait for renders to finish
    #[arg(long = "timeout-ms", value_name = "N", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,
}

impl Options {
    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_position(value: &str) -> Result<Position, String> {
    let (line, col) = value
        .split_once(':')
        .ok_or_else(|| format!("invalid position '{}' (expected LINE:COL)", value))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|_| format!("invalid position '{}' (expected LINE:COL)", value))
    };
    Ok(Position::new(parse(line)?, parse(col)?))
}

fn load(options: &Options) -> markup_overlay_core::Result<OverlayConfig> {
    match &options.config {
        Some(path) => load_config(path),
        None => {
            let start = options
                .file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            discover_config(start).map(|(config, _)| config)
        }
    }
}

fn describe(region: &RegionSnapshot) -> String {
    let state = if region.active {
        "active"
    } else {
        match region.render {
            RenderState::Idle => "hidden",
            RenderState::Running => "rendering",
            RenderState::Succeeded => "rendered",
            RenderState::Failed => "failed",
        }
    };
    format!(
        "{}-{} {} {} {:?}",
        region.start, region.end, region.validator, state, region.text
    )
}

fn run(options: &Options) -> markup_overlay_core::Result<()> {
    let mut config = load(options)?;
    if options.no_render {
        config.render.enabled = false;
    }

    let mut document = Document::open_file(&options.file, config.build_validators()?)?;
    if let Some(cursor) = options.cursor {
        document.set_cursor(cursor);
    }

    if !document.settle(options.timeout()) {
        log::warn!("Renders still running after {} ms", options.timeout_ms);
    }

    let regions = document.snapshot();
    if options.json {
        match serde_json::to_string_pretty(&regions) {
            Ok(json) => println!("{}", json),
            Err(e) => log::error!("Failed to serialize regions: {}", e),
        }
    } else {
        for region in &regions {
            println!("{}", describe(region));
        }
    }

    let stats = document.validation().stats();
    log::info!(
        "{} regions, {} passes (avg {:.3} ms), {} renders succeeded, {} failed",
        regions.len(),
        stats.passes,
        stats.pass_time.average_ms(),
        stats.renders.succeeded,
        stats.renders.failed
    );
    Ok(())
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Usage errors exit with status 2
    let options = Options::parse();

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
