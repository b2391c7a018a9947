use crossbeam_channel::RecvTimeoutError;
use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use super::{Codec, CodecJob, PROGRESS_MAX};
use crate::cancel::CancelToken;
use crate::error::TranscodeError;

/// How often the child is checked for cancellation while it is silent.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Codec backed by an `ffmpeg` executable.
#[derive(Clone, Debug)]
pub struct FfmpegCodec {
    program: PathBuf,
}

impl Default for FfmpegCodec {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegCodec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

/// Command line for one job. Progress goes to stdout as `key=value` lines,
/// errors to stderr.
pub fn build_args(job: &CodecJob<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-loglevel".into(), "error".into(),
        "-y".into(),
        "-i".into(), job.source.into(),
        "-vn".into(),
        "-acodec".into(), job.target.codec.into(),
        "-ac".into(), job.target.channels.to_string().into(),
        "-ar".into(), job.target.sample_rate.to_string().into(),
        "-f".into(), job.target.container.into(),
        "-progress".into(), "pipe:1".into(),
        "-nostats".into(),
    ];
    args.push(job.destination.into());
    args
}

/// Convert one `-progress` line into permille of `duration`.
pub fn parse_progress_line(line: &str, duration: Option<f64>) -> Option<u32> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        // Both keys carry microseconds
        "out_time_us" | "out_time_ms" => {
            let micros: i64 = value.trim().parse().ok()?;
            let duration = duration.filter(|d| *d > 0.0)?;
            let fraction = micros.max(0) as f64 / 1_000_000.0 / duration;
            Some((fraction * PROGRESS_MAX as f64).min(PROGRESS_MAX as f64) as u32)
        }
        "progress" if value.trim() == "end" => Some(PROGRESS_MAX),
        _ => None,
    }
}

impl Codec for FfmpegCodec {
    fn transcode(
        &self,
        job: &CodecJob<'_>,
        progress: &mut dyn FnMut(u32),
        cancel: &CancelToken,
    ) -> Result<(), TranscodeError> {
        let mut child = Command::new(&self.program)
            .args(build_args(job))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                TranscodeError::CodecUnavailable(format!(
                    "failed to spawn {}: {}. Is ffmpeg installed?",
                    self.program.display(),
                    e
                ))
            })?;

        log::debug!("ffmpeg started (pid {}) for {}", child.id(), job.source.display());

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TranscodeError::Codec("ffmpeg stdout not available".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TranscodeError::Codec("ffmpeg stderr not available".into()))?;

        let (tx, rx) = crossbeam_channel::unbounded::<String>();
        let progress_reader = thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        let stderr_reader = thread::spawn(move || {
            let mut text = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut text);
            text
        });

        let mut last_reported = None;
        loop {
            if cancel.is_cancelled() {
                log::info!("Cancelling ffmpeg (pid {})", child.id());
                let _ = child.kill();
                let _ = child.wait();
                let _ = progress_reader.join();
                let _ = stderr_reader.join();
                return Err(TranscodeError::Cancelled);
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    if let Some(permille) = parse_progress_line(&line, job.duration_hint) {
                        if last_reported != Some(permille) {
                            log::debug!("ffmpeg progress: {}/{}", permille, PROGRESS_MAX);
                            last_reported = Some(permille);
                            progress(permille);
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = child
            .wait()
            .map_err(|e| TranscodeError::Codec(format!("failed to wait for ffmpeg: {}", e)))?;
        let _ = progress_reader.join();
        let stderr = stderr_reader.join().unwrap_or_default();

        if !status.success() {
            let message = stderr.trim();
            if message.is_empty() {
                return Err(TranscodeError::Codec(format!("ffmpeg exited with {}", status)));
            }
            return Err(TranscodeError::from_codec_message(message));
        }

        if last_reported != Some(PROGRESS_MAX) {
            progress(PROGRESS_MAX);
        }
        Ok(())
    }
}
