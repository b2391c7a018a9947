use serde::{Deserialize, Serialize};

use super::WaveformFrame;

/// Drawable area a host UI renders the waveform into.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderRegion {
    pub width: f32,
    pub height: f32,
}

/// One bottom-anchored column, in region coordinates (y grows downward).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Bar {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RenderRegion {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel width to request from the engine for this region.
    pub fn pixel_width(&self) -> usize {
        self.width.max(0.0).round() as usize
    }

    /// Lay out one bar per frame value across the region.
    pub fn bars(&self, frame: &WaveformFrame) -> Vec<Bar> {
        if frame.is_empty() {
            return Vec::new();
        }
        let step = self.width / frame.len() as f32;
        frame
            .values()
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                let height = self.height * v.clamp(0.0, 1.0);
                Bar {
                    x: i as f32 * step,
                    y: self.height - height,
                    width: step,
                    height,
                }
            })
            .collect()
    }
}
