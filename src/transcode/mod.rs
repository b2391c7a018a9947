//! Conversion of arbitrary audio files into canonical PCM.
//!
//! The transcoder never touches the caller's file: it copies the source into
//! the temp directory, hands the copy to a [`Codec`], and returns the decoded
//! WAV as a [`CanonicalPcm`] handle. Both temp files are [`TempPath`]s, so they
//! are removed when dropped on every exit path, including errors and
//! cancellation.

pub mod ffmpeg;

pub use ffmpeg::FfmpegCodec;

use rand::Rng;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

use crate::audio::probe::SourceProbe;
use crate::cancel::CancelToken;
use crate::error::{Result, TranscodeError, WaveformError};

/// Target PCM layout requested from the codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    pub codec: &'static str,
    pub container: &'static str,
    pub bits_per_sample: u16,
    pub channels: u16,
    pub sample_rate: u32,
}

/// Signed 16-bit little-endian, stereo, 44.1 kHz WAV.
pub const CANONICAL_PCM: PcmFormat = PcmFormat {
    codec: "pcm_s16le",
    container: "wav",
    bits_per_sample: 16,
    channels: 2,
    sample_rate: 44100,
};

/// Upper bound of codec progress values (permille).
pub const PROGRESS_MAX: u32 = 1000;

/// One decode request handed to a codec.
#[derive(Debug)]
pub struct CodecJob<'a> {
    pub source: &'a Path,
    pub destination: &'a Path,
    pub target: PcmFormat,
    /// Expected source duration, if known, for progress reporting
    pub duration_hint: Option<f64>,
}

/// External decode/encode facility.
///
/// Implementations write `job.destination` in `job.target` format, report
/// progress in permille through `progress`, and abort promptly once `cancel`
/// is set.
pub trait Codec: Send + Sync {
    fn transcode(
        &self,
        job: &CodecJob<'_>,
        progress: &mut dyn FnMut(u32),
        cancel: &CancelToken,
    ) -> std::result::Result<(), TranscodeError>;
}

/// Handle to a decoded canonical PCM file. The file is deleted on drop.
#[derive(Debug)]
pub struct CanonicalPcm {
    path: TempPath,
    format: PcmFormat,
}

impl CanonicalPcm {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> PcmFormat {
        self.format
    }
}

pub struct Transcoder<C> {
    codec: C,
    temp_dir: PathBuf,
}

impl<C: Codec> Transcoder<C> {
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Place temp artifacts in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Decode `source` into a temporary canonical PCM WAV.
    pub fn to_canonical_pcm(
        &self,
        source: &SourceProbe,
        progress: &mut dyn FnMut(u32),
        cancel: &CancelToken,
    ) -> Result<CanonicalPcm> {
        if !source.path.is_file() {
            return Err(WaveformError::SourceNotFound(source.path.clone()));
        }

        let tag: u32 = rand::thread_rng().gen_range(0..99_999);
        let extension = source
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(source.format.as_str());

        let decoded = self.temp_path(&format!("decoded_{}", tag), CANONICAL_PCM.container)?;
        let copied = self.temp_path(&format!("original_{}", tag), extension)?;

        std::fs::copy(&source.path, &copied).map_err(|e| {
            WaveformError::io(
                format!(
                    "Failed to copy {} to {}",
                    source.path.display(),
                    copied.display()
                ),
                e,
            )
        })?;

        if cancel.is_cancelled() {
            return Err(WaveformError::Cancelled);
        }

        log::info!(
            "Transcoding {} -> {} ({}, {} ch, {} Hz)",
            source.path.display(),
            decoded.display(),
            CANONICAL_PCM.codec,
            CANONICAL_PCM.channels,
            CANONICAL_PCM.sample_rate
        );

        let job = CodecJob {
            source: &copied,
            destination: &decoded,
            target: CANONICAL_PCM,
            duration_hint: source.duration_hint,
        };
        self.codec.transcode(&job, progress, cancel)?;
        drop(copied);

        let written = std::fs::metadata(&decoded)
            .map_err(|e| {
                WaveformError::io(format!("Failed to inspect decoded file {}", decoded.display()), e)
            })?
            .len();
        if written == 0 {
            return Err(TranscodeError::Codec(format!(
                "codec reported success but wrote no output to {}",
                decoded.display()
            ))
            .into());
        }

        log::info!("Transcode complete: {}", decoded.display());
        Ok(CanonicalPcm {
            path: decoded,
            format: CANONICAL_PCM,
        })
    }

    fn temp_path(&self, prefix: &str, extension: &str) -> Result<TempPath> {
        tempfile::Builder::new()
            .prefix(prefix)
            .suffix(&format!(".{}", extension))
            .tempfile_in(&self.temp_dir)
            .map(|file| file.into_temp_path())
            .map_err(|e| {
                WaveformError::io(
                    format!("Failed to create temp file in {}", self.temp_dir.display()),
                    e,
                )
            })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Codec double that converts mono or stereo WAV sources with hound.

    use super::*;
    use crossbeam_channel::{Receiver, RecvTimeoutError};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    pub struct MockCodec {
        pub calls: Arc<AtomicUsize>,
        /// (source, destination) of every job
        pub jobs: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
        pub fail_with: Option<String>,
        /// Write bytes that are not a WAV file
        pub write_garbage: bool,
        /// Block until a message arrives (or the sender drops) or the job is cancelled
        pub gate: Option<Receiver<()>>,
        /// Report success after deleting the destination
        pub remove_output: bool,
        pub panics: bool,
    }

    impl MockCodec {
        pub fn failing(message: &str) -> Self {
            Self {
                fail_with: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Codec for MockCodec {
        fn transcode(
            &self,
            job: &CodecJob<'_>,
            progress: &mut dyn FnMut(u32),
            cancel: &CancelToken,
        ) -> std::result::Result<(), TranscodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.jobs
                .lock()
                .push((job.source.to_path_buf(), job.destination.to_path_buf()));

            if let Some(ref gate) = self.gate {
                while !cancel.is_cancelled() {
                    match gate.recv_timeout(Duration::from_millis(10)) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
            }
            if cancel.is_cancelled() {
                return Err(TranscodeError::Cancelled);
            }
            if self.panics {
                panic!("codec crashed");
            }
            if self.remove_output {
                std::fs::remove_file(job.destination)
                    .map_err(|e| TranscodeError::Codec(e.to_string()))?;
                return Ok(());
            }
            if let Some(ref message) = self.fail_with {
                return Err(TranscodeError::from_codec_message(message));
            }
            if self.write_garbage {
                std::fs::write(job.destination, b"not a wav")
                    .map_err(|e| TranscodeError::Codec(e.to_string()))?;
                return Ok(());
            }

            let mut reader = hound::WavReader::open(job.source)
                .map_err(|e| TranscodeError::Codec(e.to_string()))?;
            let channels = reader.spec().channels;
            let spec = hound::WavSpec {
                channels: job.target.channels,
                sample_rate: job.target.sample_rate,
                bits_per_sample: job.target.bits_per_sample,
                sample_format: hound::SampleFormat::Int,
            };
            let mut writer = hound::WavWriter::create(job.destination, spec)
                .map_err(|e| TranscodeError::Codec(e.to_string()))?;
            for sample in reader.samples::<i16>() {
                let sample = sample.map_err(|e| TranscodeError::Codec(e.to_string()))?;
                let copies = if channels == 1 { job.target.channels } else { 1 };
                for _ in 0..copies {
                    writer
                        .write_sample(sample)
                        .map_err(|e| TranscodeError::Codec(e.to_string()))?;
                }
            }
            writer
                .finalize()
                .map_err(|e| TranscodeError::Codec(e.to_string()))?;
            progress(PROGRESS_MAX);
            Ok(())
        }
    }

    /// Write a 44.1 kHz 16-bit WAV.
    pub fn write_source_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    pub fn probe_for(path: &Path) -> SourceProbe {
        SourceProbe {
            path: path.to_path_buf(),
            format: "pcm_s16le".into(),
            duration_hint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn dir_entries(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn decodes_into_named_temp_file() {
        let src_dir = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("speech.wav");
        write_source_wav(&source, 1, &vec![1000; 44100]);

        let transcoder = Transcoder::new(MockCodec::default()).with_temp_dir(tmp.path());
        let mut last_progress = 0;
        let pcm = transcoder
            .to_canonical_pcm(&probe_for(&source), &mut |p| last_progress = p, &CancelToken::new())
            .unwrap();

        assert_eq!(last_progress, PROGRESS_MAX);
        assert_eq!(pcm.format(), CANONICAL_PCM);
        let name = pcm.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("decoded_"), "{}", name);
        assert!(name.ends_with(".wav"), "{}", name);

        let reader = hound::WavReader::open(pcm.path()).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.duration(), 44100);

        // The copied original is already gone; only the decoded file remains
        assert_eq!(dir_entries(tmp.path()), vec![name]);

        drop(pcm);
        assert!(dir_entries(tmp.path()).is_empty());
        assert!(source.exists());
    }

    #[test]
    fn codec_sees_a_copy_not_the_original() {
        let src_dir = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("speech.wav");
        write_source_wav(&source, 2, &[0; 8]);

        let codec = MockCodec::default();
        let jobs = codec.jobs.clone();
        let transcoder = Transcoder::new(codec).with_temp_dir(tmp.path());
        let _pcm = transcoder
            .to_canonical_pcm(&probe_for(&source), &mut |_| {}, &CancelToken::new())
            .unwrap();

        let jobs = jobs.lock();
        let (copied, _) = &jobs[0];
        assert_ne!(copied, &source);
        assert!(copied.starts_with(tmp.path()));
        let name = copied.file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("original_") && name.ends_with(".wav"), "{}", name);
    }

    #[test]
    fn failure_removes_both_temp_files() {
        let src_dir = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("broken.mp3");
        std::fs::write(&source, b"junk").unwrap();

        let transcoder =
            Transcoder::new(MockCodec::failing("Invalid data found when processing input"))
                .with_temp_dir(tmp.path());
        let err = transcoder
            .to_canonical_pcm(&probe_for(&source), &mut |_| {}, &CancelToken::new())
            .unwrap_err();

        match err {
            WaveformError::Transcode(TranscodeError::Codec(msg)) => {
                assert!(msg.contains("Invalid data"))
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(dir_entries(tmp.path()).is_empty());
    }

    #[test]
    fn disk_full_is_reported_distinctly() {
        let src_dir = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("long.mp3");
        std::fs::write(&source, b"junk").unwrap();

        let transcoder = Transcoder::new(MockCodec::failing(
            "av_interleaved_write_frame(): No space left on device",
        ))
        .with_temp_dir(tmp.path());
        let err = transcoder
            .to_canonical_pcm(&probe_for(&source), &mut |_| {}, &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, WaveformError::Transcode(TranscodeError::DiskFull(_))));
        assert!(dir_entries(tmp.path()).is_empty());
    }

    #[test]
    fn vanished_output_is_an_io_error() {
        let src_dir = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("speech.wav");
        write_source_wav(&source, 2, &[0; 8]);

        let codec = MockCodec {
            remove_output: true,
            ..MockCodec::default()
        };
        let transcoder = Transcoder::new(codec).with_temp_dir(tmp.path());
        let err = transcoder
            .to_canonical_pcm(&probe_for(&source), &mut |_| {}, &CancelToken::new())
            .unwrap_err();

        match err {
            WaveformError::Io { context, source } => {
                assert!(context.starts_with("Failed to inspect decoded file"), "{}", context);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(dir_entries(tmp.path()).is_empty());
    }

    #[test]
    fn missing_source_creates_nothing() {
        let src_dir = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let codec = MockCodec::default();
        let calls = codec.calls.clone();
        let transcoder = Transcoder::new(codec).with_temp_dir(tmp.path());

        let missing = src_dir.path().join("gone.mp3");
        let err = transcoder
            .to_canonical_pcm(&probe_for(&missing), &mut |_| {}, &CancelToken::new())
            .unwrap_err();

        assert!(matches!(err, WaveformError::SourceNotFound(_)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(dir_entries(tmp.path()).is_empty());
    }

    #[test]
    fn cancellation_before_decode_cleans_up() {
        let src_dir = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let source = src_dir.path().join("speech.wav");
        write_source_wav(&source, 2, &[0; 8]);

        let token = CancelToken::new();
        token.cancel();
        let transcoder = Transcoder::new(MockCodec::default()).with_temp_dir(tmp.path());
        let err = transcoder
            .to_canonical_pcm(&probe_for(&source), &mut |_| {}, &token)
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(dir_entries(tmp.path()).is_empty());
    }
}
