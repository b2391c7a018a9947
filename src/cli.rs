use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "subwave", about = "Render a time window of an audio file as a waveform")]
pub struct Cli {
    /// Input audio file (anything ffmpeg can decode)
    pub input: PathBuf,

    /// Frame width in pixels (one value per pixel)
    #[arg(long, default_value_t = 800)]
    pub width: usize,

    /// Drawing height in pixels, used for the JSON bar layout
    #[arg(long, default_value_t = 120)]
    pub height: usize,

    /// Text rows for the ASCII rendering
    #[arg(long, default_value_t = 12)]
    pub rows: usize,

    /// Window start in seconds
    #[arg(long, default_value_t = 0.0)]
    pub start: f64,

    /// Window end in seconds (defaults to the end of the track)
    #[arg(long)]
    pub end: Option<f64>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Render the whole-track overview instead of a window
    #[arg(long)]
    pub overview: bool,

    /// Config file (default: subwave.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,

    /// Directory for temporary decoded audio
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,
}
