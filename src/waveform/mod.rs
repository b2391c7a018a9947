pub mod project;
pub mod region;
pub mod terminal;

pub use project::{project, project_overview};
pub use region::{Bar, RenderRegion};

use serde::Serialize;

/// A time window to render, in seconds, at a given pixel width.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowRequest {
    pub start: f64,
    pub end: f64,
    pub total_duration: f64,
    pub width: usize,
}

impl WindowRequest {
    pub fn new(start: f64, end: f64, total_duration: f64, width: usize) -> Self {
        Self {
            start,
            end,
            total_duration,
            width,
        }
    }

    /// The whole track.
    pub fn full(total_duration: f64, width: usize) -> Self {
        Self::new(0.0, total_duration, total_duration, width)
    }
}

/// Normalized amplitudes, one per pixel column, each in [0, 1].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WaveformFrame {
    values: Vec<f32>,
}

impl WaveformFrame {
    pub(crate) fn from_values(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn zeros(width: usize) -> Self {
        Self {
            values: vec![0.0; width],
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_silent(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}
