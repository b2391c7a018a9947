mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use cli::{Cli, OutputFormat};
use subwave::config::{self, Config};
use subwave::waveform::terminal::render_ascii;
use subwave::{AudioSource, Bar, EngineEvent, RenderRegion, WaveformEngine, WaveformFrame};

#[derive(Serialize)]
struct JsonOutput<'a> {
    source: &'a AudioSource,
    start: f64,
    end: f64,
    region: RenderRegion,
    frame: &'a WaveformFrame,
    bars: Vec<Bar>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    let mut config = Config::default();
    if let Some(path) = config::find_config_path(cli.config.as_deref()) {
        if let Some(cfg) = config::load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            config = cfg;
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }
    // Merge: config values apply only when CLI is at its default
    if cli.width == config::default_width() { cli.width = config.display.width; }
    if cli.height == config::default_height() { cli.height = config.display.height; }
    if cli.ffmpeg == config::default_ffmpeg() { cli.ffmpeg = config.codec.ffmpeg.clone(); }
    if cli.temp_dir.is_none() { cli.temp_dir = config.temp.dir.clone(); }
    config.display.width = cli.width;
    config.display.height = cli.height;
    config.codec.ffmpeg = cli.ffmpeg.clone();
    config.temp.dir = cli.temp_dir.clone();

    log::info!("subwave - audio waveform renderer");
    log::info!("Input: {}", cli.input.display());
    log::info!("Width: {} px, ffmpeg: {}", cli.width, cli.ffmpeg.display());

    let region = RenderRegion::new(cli.width as f32, cli.height as f32);
    let engine = WaveformEngine::from_config(&config);
    let source = load_with_progress(&engine, &cli.input, region.pixel_width())?;

    let end = cli.end.unwrap_or(source.duration);
    let frame = if cli.overview {
        engine.overview()?
    } else {
        engine.render(cli.start, end)?
    };

    match cli.format {
        OutputFormat::Text => {
            println!(
                "{} [{}] {:.2}s, window {:.2}s-{:.2}s",
                source.path.display(),
                source.format,
                source.duration,
                if cli.overview { 0.0 } else { cli.start },
                if cli.overview { source.duration } else { end }
            );
            for line in render_ascii(&frame, cli.rows) {
                println!("{}", line);
            }
        }
        OutputFormat::Json => {
            let output = JsonOutput {
                source: &source,
                start: if cli.overview { 0.0 } else { cli.start },
                end: if cli.overview { source.duration } else { end },
                region,
                frame: &frame,
                bars: region.bars(&frame),
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

/// Run the load off-thread, driving a progress bar from engine events.
fn load_with_progress(engine: &WaveformEngine, input: &Path, width: usize) -> Result<AudioSource> {
    let events = engine.subscribe();
    let handle = engine
        .load(input, width)
        .with_context(|| format!("Cannot load {}", input.display()))?;

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {percent}% decoding")?
            .progress_chars("=>-"),
    );

    loop {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(EngineEvent::Progress { permille }) => pb.set_position(u64::from(permille)),
            Ok(EngineEvent::Loaded { .. }) => {
                pb.finish_with_message("Decoding complete");
                break;
            }
            Ok(EngineEvent::Failed { .. }) | Ok(EngineEvent::Cancelled { .. }) => {
                pb.abandon();
                break;
            }
            Ok(EngineEvent::Started { .. }) => {}
            Err(_) if handle.is_finished() => {
                pb.abandon();
                break;
            }
            Err(_) => {}
        }
    }

    let outcome = handle.wait();
    if let Some(diagnostic) = outcome.diagnostic() {
        anyhow::bail!("{}", diagnostic);
    }
    Ok(outcome.result?)
}
