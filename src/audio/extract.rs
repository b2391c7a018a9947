use hound::{SampleFormat, WavReader};
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use super::summary::{AmplitudeSummary, MAX_SUMMARY_LEN};
use crate::cancel::CancelToken;
use crate::error::{Result, WaveformError};
use crate::transcode::CANONICAL_PCM;

/// Bytes read from the PCM stream per iteration.
const CHUNK_SIZE: usize = 4096;
const BYTES_PER_SAMPLE: usize = 2;

/// Reduce a canonical PCM WAV stream to a fixed-size amplitude summary.
///
/// The bucket size is `data_bytes / MAX_SUMMARY_LEN` raw samples. Each bucket
/// average is written to two consecutive slots so bucket boundaries stay
/// aligned with the stereo interleaving; with two bytes per sample this makes
/// long tracks fill the array exactly. Tracks shorter than `MAX_SUMMARY_LEN`
/// bytes have a bucket size of zero and produce an all-zero summary.
pub fn summarize<R: Read>(reader: R, cancel: &CancelToken) -> Result<AmplitudeSummary> {
    let wav = WavReader::new(reader)
        .map_err(|e| WaveformError::UnsupportedAudioFormat(format!("not a PCM WAV stream: {}", e)))?;

    let spec = wav.spec();
    if spec.sample_format != SampleFormat::Int
        || spec.bits_per_sample != CANONICAL_PCM.bits_per_sample
        || spec.channels != CANONICAL_PCM.channels
    {
        return Err(WaveformError::UnsupportedAudioFormat(format!(
            "expected {}-bit integer PCM with {} channels, got {}-bit {:?} with {} channels",
            CANONICAL_PCM.bits_per_sample,
            CANONICAL_PCM.channels,
            spec.bits_per_sample,
            spec.sample_format,
            spec.channels
        )));
    }

    let duration = if spec.sample_rate > 0 {
        wav.duration() as f64 / spec.sample_rate as f64
    } else {
        0.0
    };
    let total_bytes = wav.len() as usize * BYTES_PER_SAMPLE;
    let samples_per_bucket = total_bytes / MAX_SUMMARY_LEN;

    if samples_per_bucket == 0 {
        log::warn!(
            "PCM stream too short to summarize ({} bytes); using a silent summary",
            total_bytes
        );
        return Ok(AmplitudeSummary::silent(duration));
    }

    log::debug!(
        "Summarizing {} bytes of PCM ({:.1}s), {} samples per bucket",
        total_bytes,
        duration,
        samples_per_bucket
    );

    let mut data = wav.into_inner().take(total_bytes as u64);
    let mut buckets = BucketAccumulator::new(samples_per_bucket);
    let mut buffer = [0u8; CHUNK_SIZE];
    // Low byte left over when a read ends mid-sample
    let mut carry: Option<u8> = None;

    while !buckets.is_full() {
        if cancel.is_cancelled() {
            return Err(WaveformError::Cancelled);
        }

        let read = match data.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(WaveformError::io("Failed to read PCM data", e)),
        };

        let mut bytes = &buffer[..read];
        if let Some(low) = carry.take() {
            buckets.push(i16::from_le_bytes([low, bytes[0]]));
            bytes = &bytes[1..];
        }

        let mut pairs = bytes.chunks_exact(BYTES_PER_SAMPLE);
        for pair in &mut pairs {
            buckets.push(i16::from_le_bytes([pair[0], pair[1]]));
        }
        carry = pairs.remainder().first().copied();
    }

    let summary = buckets.finish(duration);
    log::info!(
        "Amplitude summary: {} slots, peak={}, {:.1}s of audio",
        summary.len(),
        summary.peak(),
        summary.duration()
    );
    Ok(summary)
}

/// Summarize a canonical PCM file on disk.
pub fn summarize_file(path: &Path, cancel: &CancelToken) -> Result<AmplitudeSummary> {
    let file = std::fs::File::open(path)
        .map_err(|e| WaveformError::io(format!("Failed to open PCM file {}", path.display()), e))?;
    summarize(BufReader::new(file), cancel)
}

/// Like [`summarize_file`], but reports extraction failures as an
/// unavailable summary instead of an error. Cancellation still errors.
pub fn summarize_or_unavailable(path: &Path, cancel: &CancelToken) -> Result<AmplitudeSummary> {
    match summarize_file(path, cancel) {
        Ok(summary) => Ok(summary),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            log::warn!("Amplitude extraction failed for {}: {}", path.display(), e);
            Ok(AmplitudeSummary::unavailable(e.to_string()))
        }
    }
}

struct BucketAccumulator {
    values: Vec<u16>,
    samples_per_bucket: usize,
    count: usize,
    sum: u64,
    position: usize,
}

impl BucketAccumulator {
    fn new(samples_per_bucket: usize) -> Self {
        Self {
            values: vec![0; MAX_SUMMARY_LEN],
            samples_per_bucket,
            count: 0,
            sum: 0,
            position: 0,
        }
    }

    fn push(&mut self, sample: i16) {
        self.sum += u64::from(sample.unsigned_abs());
        self.count += 1;

        if self.count == self.samples_per_bucket {
            let average = (self.sum / self.samples_per_bucket as u64) as u16;
            if self.position + 1 < self.values.len() {
                self.values[self.position] = average;
                self.values[self.position + 1] = average;
            }
            self.position += 2;
            self.count = 0;
            self.sum = 0;
        }
    }

    fn is_full(&self) -> bool {
        self.position + 1 >= self.values.len()
    }

    fn finish(self, duration: f64) -> AmplitudeSummary {
        AmplitudeSummary::new(self.values, self.samples_per_bucket, duration)
    }
}
