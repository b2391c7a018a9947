use serde::Serialize;
use std::path::{Path, PathBuf};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, WaveformError};

/// What is known about a source before it has been decoded.
#[derive(Clone, Debug)]
pub struct SourceProbe {
    /// Absolute path to the caller's file
    pub path: PathBuf,
    /// Codec short name ("mp3", "flac", ...) or the file extension
    pub format: String,
    /// Duration from container metadata, used for progress only
    pub duration_hint: Option<f64>,
}

/// A loaded audio source. Immutable once the engine publishes it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AudioSource {
    pub path: PathBuf,
    pub format: String,
    /// Duration in seconds, measured on the decoded PCM
    pub duration: f64,
}

impl SourceProbe {
    pub fn into_source(self, duration: f64) -> AudioSource {
        AudioSource {
            path: self.path,
            format: self.format,
            duration,
        }
    }
}

/// Resolve and inspect a source file.
///
/// Fails only when the file is missing or its path cannot be resolved. A file
/// symphonia cannot read is still accepted: the external codec may handle it,
/// so the format falls back to the extension and no duration hint is given.
pub fn probe_source(path: &Path) -> Result<SourceProbe> {
    if !path.is_file() {
        return Err(WaveformError::SourceNotFound(path.to_path_buf()));
    }

    let path = std::fs::canonicalize(path)
        .map_err(|e| WaveformError::io(format!("Failed to resolve {}", path.display()), e))?;

    let probe = match probe_stream(&path) {
        Ok((format, duration_hint)) => SourceProbe {
            format: format.unwrap_or_else(|| extension_tag(&path)),
            path,
            duration_hint,
        },
        Err(err) => {
            log::debug!("symphonia could not probe {}: {}", path.display(), err);
            SourceProbe {
                format: extension_tag(&path),
                path,
                duration_hint: None,
            }
        }
    };

    log::info!(
        "Probed source: {} (format={}, duration={})",
        probe.path.display(),
        probe.format,
        probe
            .duration_hint
            .map_or_else(|| "unknown".to_string(), |d| format!("{:.1}s", d))
    );

    Ok(probe)
}

fn probe_stream(
    path: &Path,
) -> std::result::Result<(Option<String>, Option<f64>), symphonia::core::errors::Error> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let Some(track) = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
    else {
        return Ok((None, None));
    };

    let format = symphonia::default::get_codecs()
        .get_codec(track.codec_params.codec)
        .map(|d| d.short_name.to_string());

    let duration = match (track.codec_params.n_frames, track.codec_params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => Some(frames as f64 / rate as f64),
        _ => None,
    };

    Ok((format, duration))
}

fn extension_tag(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}
