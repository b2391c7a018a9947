use std::path::PathBuf;
use thiserror::Error;

/// Messages a codec or the OS emits when the temp volume fills up.
const DISK_FULL_MARKERS: &[&str] = &[
    "no space left on device",
    "not enough space on the disk",
    "not enough disk space",
];

#[derive(Error, Debug)]
pub enum WaveformError {
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error("unsupported audio format: {0}")]
    UnsupportedAudioFormat(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("amplitude summary unavailable: {0}")]
    SummaryUnavailable(String),

    #[error("no audio loaded")]
    NotLoaded,

    #[error("load already in progress")]
    LoadInProgress,

    #[error("load cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("not enough disk space: {0}")]
    DiskFull(String),

    #[error("codec failed: {0}")]
    Codec(String),

    #[error("codec unavailable: {0}")]
    CodecUnavailable(String),

    #[error("transcode cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, WaveformError>;

impl TranscodeError {
    /// Classify a codec's diagnostic output.
    pub fn from_codec_message(message: &str) -> Self {
        let message = message.trim();
        if is_disk_full(message) {
            TranscodeError::DiskFull(message.to_string())
        } else {
            TranscodeError::Codec(message.to_string())
        }
    }
}

impl WaveformError {
    /// Wrap an I/O error, promoting disk exhaustion to `TranscodeError::DiskFull`.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        let context = context.into();
        if is_disk_full(&source.to_string()) {
            return WaveformError::Transcode(TranscodeError::DiskFull(format!(
                "{}: {}",
                context, source
            )));
        }
        WaveformError::Io { context, source }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WaveformError::Cancelled | WaveformError::Transcode(TranscodeError::Cancelled)
        )
    }
}

pub fn is_disk_full(message: &str) -> bool {
    let lower = message.to_lowercase();
    DISK_FULL_MARKERS.iter().any(|m| lower.contains(m))
}
