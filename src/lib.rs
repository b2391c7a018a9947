//! Audio waveform engine.
//!
//! Any audio file is decoded once to canonical PCM, reduced to a fixed-size
//! amplitude summary, and cached. Arbitrary time windows are then projected
//! onto a pixel width as normalized amplitudes without touching the codec
//! again.

pub mod audio;
pub mod cancel;
pub mod config;
pub mod engine;
pub mod error;
pub mod transcode;
pub mod waveform;

pub use audio::{AmplitudeSummary, AudioSource, Availability, MAX_SUMMARY_LEN};
pub use cancel::CancelToken;
pub use config::Config;
pub use engine::{EngineEvent, EngineStatus, LoadHandle, LoadOutcome, LoadedTrack, WaveformEngine};
pub use error::{Result, TranscodeError, WaveformError};
pub use transcode::{Codec, CodecJob, FfmpegCodec, Transcoder};
pub use waveform::{Bar, RenderRegion, WaveformFrame, WindowRequest};
