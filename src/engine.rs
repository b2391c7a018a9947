//! Waveform engine: owns the load pipeline and the cached amplitude summary.
//!
//! `load` runs probe → transcode → extract on a worker thread and publishes
//! the result as one immutable [`LoadedTrack`]. Renders take a snapshot of the
//! published track under a read lock and project it without touching the
//! codec again. Starting a load drops the previous track, so a render never
//! sees data from an older source.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::audio::{probe_source, summarize_or_unavailable, AmplitudeSummary, AudioSource, Availability};
use crate::cancel::CancelToken;
use crate::config::Config;
use crate::error::{Result, WaveformError};
use crate::transcode::{Codec, FfmpegCodec, Transcoder};
use crate::waveform::{project, project_overview, WaveformFrame, WindowRequest};

/// A published load: the source and its summary.
#[derive(Debug)]
pub struct LoadedTrack {
    pub source: AudioSource,
    pub summary: AmplitudeSummary,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EngineStatus {
    Unloaded,
    Loading(PathBuf),
    Loaded(AudioSource),
    Failed(String),
}

/// Notifications delivered to subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    Started { path: PathBuf },
    /// Codec progress, 0..=1000
    Progress { permille: u32 },
    Loaded { source: AudioSource },
    Failed { diagnostic: String },
    Cancelled { path: PathBuf },
}

/// Result of one load.
#[derive(Debug)]
pub struct LoadOutcome {
    pub path: PathBuf,
    pub result: Result<AudioSource>,
}

impl LoadOutcome {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    /// User-facing failure message, `None` on success.
    pub fn diagnostic(&self) -> Option<String> {
        self.result.as_ref().err().map(diagnostic)
    }
}

fn diagnostic(err: &WaveformError) -> String {
    format!("could not process audio: {}", err)
}

/// Handle to a load running on a worker thread.
pub struct LoadHandle {
    path: PathBuf,
    cancel: CancelToken,
    outcome: Receiver<LoadOutcome>,
    /// Outcome already pulled off the channel by `try_outcome`
    received: Option<LoadOutcome>,
    thread: Option<JoinHandle<()>>,
}

impl LoadHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ask the worker to stop; the outcome becomes `Err(Cancelled)`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Non-blocking poll for the outcome. Once it has arrived it stays
    /// available, and `wait` returns the same outcome.
    pub fn try_outcome(&mut self) -> Option<&LoadOutcome> {
        if self.received.is_none() {
            self.received = self.outcome.try_recv().ok();
        }
        self.received.as_ref()
    }

    /// Block until the load finishes.
    pub fn wait(mut self) -> LoadOutcome {
        let outcome = match self.received.take() {
            Some(outcome) => Ok(outcome),
            None => self.outcome.recv(),
        };
        let joined = self.thread.take().map(|thread| thread.join());
        match (outcome, joined) {
            (Ok(outcome), _) => outcome,
            (Err(_), Some(Err(payload))) => LoadOutcome {
                path: self.path.clone(),
                result: Err(WaveformError::Internal(panic_message(payload.as_ref()))),
            },
            (Err(_), _) => LoadOutcome {
                path: self.path.clone(),
                result: Err(WaveformError::Internal("load worker exited without a result".into())),
            },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".into());
    format!("load worker panicked: {}", detail)
}

enum EngineState {
    Unloaded,
    Loading(PathBuf),
    Loaded(Arc<LoadedTrack>),
    Failed(String),
}

struct Shared<C> {
    transcoder: Transcoder<C>,
    state: RwLock<EngineState>,
    width: AtomicUsize,
    loading: AtomicBool,
    subscribers: Mutex<Vec<Sender<EngineEvent>>>,
}

/// Clears the in-flight flag when the load ends, however it ends. A load
/// that never reached a final state is marked failed.
struct LoadSlot<C: Codec + 'static> {
    shared: Arc<Shared<C>>,
}

impl<C: Codec + 'static> Drop for LoadSlot<C> {
    fn drop(&mut self) {
        let stuck = match &*self.shared.state.read() {
            EngineState::Loading(path) => Some(path.clone()),
            _ => None,
        };
        if let Some(path) = stuck {
            let err = WaveformError::Internal("load stopped before completing".into());
            self.shared.fail(&path, &err);
        }
        self.shared.loading.store(false, Ordering::SeqCst);
    }
}

pub struct WaveformEngine<C: Codec + 'static = FfmpegCodec> {
    shared: Arc<Shared<C>>,
}

impl<C: Codec + 'static> Clone for WaveformEngine<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl WaveformEngine<FfmpegCodec> {
    /// Engine using the ffmpeg executable and temp directory from `config`.
    pub fn from_config(config: &Config) -> Self {
        let mut transcoder = Transcoder::new(FfmpegCodec::new(&config.codec.ffmpeg));
        if let Some(ref dir) = config.temp.dir {
            transcoder = transcoder.with_temp_dir(dir);
        }
        Self::with_transcoder(transcoder, config.display.width)
    }
}

impl<C: Codec + 'static> WaveformEngine<C> {
    pub fn new(codec: C, width: usize) -> Self {
        Self::with_transcoder(Transcoder::new(codec), width)
    }

    pub fn with_transcoder(transcoder: Transcoder<C>, width: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                transcoder,
                state: RwLock::new(EngineState::Unloaded),
                width: AtomicUsize::new(width),
                loading: AtomicBool::new(false),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn transcoder(&self) -> &Transcoder<C> {
        &self.shared.transcoder
    }

    /// Receive engine events from now on.
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.shared.subscribers.lock().push(tx);
        rx
    }

    pub fn status(&self) -> EngineStatus {
        match &*self.shared.state.read() {
            EngineState::Unloaded => EngineStatus::Unloaded,
            EngineState::Loading(path) => EngineStatus::Loading(path.clone()),
            EngineState::Loaded(track) => EngineStatus::Loaded(track.source.clone()),
            EngineState::Failed(diagnostic) => EngineStatus::Failed(diagnostic.clone()),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.shared.loading.load(Ordering::SeqCst)
    }

    /// The published track, if any.
    pub fn track(&self) -> Option<Arc<LoadedTrack>> {
        match &*self.shared.state.read() {
            EngineState::Loaded(track) => Some(Arc::clone(track)),
            _ => None,
        }
    }

    pub fn width(&self) -> usize {
        self.shared.width.load(Ordering::SeqCst)
    }

    /// Change the default pixel width. Takes effect on the next render.
    pub fn set_width(&self, width: usize) {
        self.shared.width.store(width, Ordering::SeqCst);
    }

    /// Start loading `path` on a worker thread.
    ///
    /// Missing files and a load already in flight are rejected before any
    /// thread or temp file is created.
    pub fn load(&self, path: impl AsRef<Path>, width: usize) -> Result<LoadHandle> {
        let path = path.as_ref().to_path_buf();
        let slot = self.begin_load(&path, width)?;

        let cancel = CancelToken::new();
        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker_cancel = cancel.clone();
        let worker_path = path.clone();

        let thread = thread::Builder::new()
            .name("waveform-load".into())
            .spawn(move || {
                let shared = Arc::clone(&slot.shared);
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    shared.run_load(&worker_path, &worker_cancel)
                }))
                .unwrap_or_else(|payload| {
                    let err = WaveformError::Internal(panic_message(payload.as_ref()));
                    shared.fail(&worker_path, &err);
                    Err(err)
                });
                drop(slot);
                let _ = tx.send(LoadOutcome {
                    path: worker_path,
                    result,
                });
            })
            .map_err(|e| WaveformError::io("Failed to spawn load thread", e))?;

        Ok(LoadHandle {
            path,
            cancel,
            outcome: rx,
            received: None,
            thread: Some(thread),
        })
    }

    /// Run the whole load on the calling thread.
    pub fn load_blocking(
        &self,
        path: impl AsRef<Path>,
        width: usize,
        cancel: &CancelToken,
    ) -> Result<AudioSource> {
        let path = path.as_ref();
        let _slot = self.begin_load(path, width)?;
        self.shared.run_load(path, cancel)
    }

    /// Render `[start, end)` seconds of the loaded track at the current width.
    pub fn render(&self, start: f64, end: f64) -> Result<WaveformFrame> {
        let track = self.loaded()?;
        let request = WindowRequest::new(start, end, track.source.duration, self.width());
        Ok(project(track.summary.values(), &request))
    }

    /// Render with an explicit request, e.g. against a caller-side timeline
    /// whose total duration differs from the audio's.
    pub fn render_window(&self, request: &WindowRequest) -> Result<WaveformFrame> {
        let track = self.loaded()?;
        Ok(project(track.summary.values(), request))
    }

    /// Whole-track overview at the current width.
    pub fn overview(&self) -> Result<WaveformFrame> {
        let track = self.loaded()?;
        Ok(project_overview(track.summary.values(), self.width()))
    }

    fn loaded(&self) -> Result<Arc<LoadedTrack>> {
        match &*self.shared.state.read() {
            EngineState::Loaded(track) => Ok(Arc::clone(track)),
            EngineState::Loading(_) => Err(WaveformError::LoadInProgress),
            EngineState::Unloaded | EngineState::Failed(_) => Err(WaveformError::NotLoaded),
        }
    }

    fn begin_load(&self, path: &Path, width: usize) -> Result<LoadSlot<C>> {
        if !path.is_file() {
            log::warn!("Cannot load {}: file not found", path.display());
            return Err(WaveformError::SourceNotFound(path.to_path_buf()));
        }

        if self
            .shared
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WaveformError::LoadInProgress);
        }
        let slot = LoadSlot {
            shared: Arc::clone(&self.shared),
        };

        self.set_width(width);
        *self.shared.state.write() = EngineState::Loading(path.to_path_buf());
        self.shared.emit(EngineEvent::Started {
            path: path.to_path_buf(),
        });
        log::info!("Loading {} at width {}", path.display(), width);

        Ok(slot)
    }
}

impl<C: Codec> Shared<C> {
    fn emit(&self, event: EngineEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn run_load(&self, path: &Path, cancel: &CancelToken) -> Result<AudioSource> {
        match self.run_pipeline(path, cancel) {
            Ok(track) => {
                let source = track.source.clone();
                *self.state.write() = EngineState::Loaded(Arc::new(track));
                log::info!(
                    "Loaded {} ({}, {:.1}s)",
                    source.path.display(),
                    source.format,
                    source.duration
                );
                self.emit(EngineEvent::Loaded {
                    source: source.clone(),
                });
                Ok(source)
            }
            Err(e) if e.is_cancelled() => {
                *self.state.write() = EngineState::Unloaded;
                log::info!("Load of {} cancelled", path.display());
                self.emit(EngineEvent::Cancelled {
                    path: path.to_path_buf(),
                });
                Err(WaveformError::Cancelled)
            }
            Err(e) => {
                self.fail(path, &e);
                Err(e)
            }
        }
    }

    fn fail(&self, path: &Path, err: &WaveformError) {
        let diagnostic = diagnostic(err);
        log::error!("{} ({})", diagnostic, path.display());
        *self.state.write() = EngineState::Failed(diagnostic.clone());
        self.emit(EngineEvent::Failed { diagnostic });
    }

    fn run_pipeline(&self, path: &Path, cancel: &CancelToken) -> Result<LoadedTrack> {
        let probe = probe_source(path)?;

        let pcm = self.transcoder.to_canonical_pcm(
            &probe,
            &mut |permille| self.emit(EngineEvent::Progress { permille }),
            cancel,
        )?;
        let summary = summarize_or_unavailable(pcm.path(), cancel)?;
        drop(pcm);

        if let Availability::Unavailable(reason) = summary.availability() {
            return Err(WaveformError::SummaryUnavailable(reason.clone()));
        }

        Ok(LoadedTrack {
            source: probe.into_source(summary.duration()),
            summary,
        })
    }
}
