//! Projection of an amplitude summary onto a pixel grid.

use super::{WaveformFrame, WindowRequest};

/// Magnitude of a full-scale 16-bit sample.
const FULL_SCALE: f64 = 32768.0;

/// Project the summary slice covered by a time window onto `request.width`
/// pixels, normalized against the loudest entry inside the window.
///
/// The window maps linearly onto summary indices `[start, stop)`. Pixels that
/// cover several entries take their maximum so short transients survive;
/// when the window holds fewer entries than pixels, entries repeat. Empty,
/// inverted or all-zero windows give an all-zero frame.
pub fn project(values: &[u16], request: &WindowRequest) -> WaveformFrame {
    let width = request.width;
    let Some((start, stop)) = window_range(values.len(), request) else {
        return WaveformFrame::zeros(width);
    };

    let window = &values[start..stop];
    let local_max = window.iter().copied().max().unwrap_or(0);
    if local_max == 0 {
        return WaveformFrame::zeros(width);
    }

    let span = window.len();
    let local_max = local_max as f32;
    let frame = (0..width)
        .map(|px| {
            let lo = px * span / width;
            let hi = ((px + 1) * span / width).max(lo + 1);
            let peak = window[lo..hi].iter().copied().max().unwrap_or(0);
            peak as f32 / local_max
        })
        .collect();

    WaveformFrame::from_values(frame)
}

/// Whole-track overview: the mean magnitude of each pixel's share of the
/// summary, relative to full scale rather than the local peak.
pub fn project_overview(values: &[u16], width: usize) -> WaveformFrame {
    if width == 0 {
        return WaveformFrame::zeros(0);
    }
    let per_pixel = values.len() / width;
    if per_pixel == 0 {
        return WaveformFrame::zeros(width);
    }

    let frame = values
        .chunks_exact(per_pixel)
        .take(width)
        .map(|chunk| {
            let sum: u64 = chunk.iter().map(|&v| u64::from(v)).sum();
            (sum as f64 / per_pixel as f64 / FULL_SCALE).min(1.0) as f32
        })
        .collect();

    WaveformFrame::from_values(frame)
}

fn window_range(len: usize, request: &WindowRequest) -> Option<(usize, usize)> {
    let valid = len > 0
        && request.width > 0
        && request.total_duration > 0.0
        && request.start.is_finite()
        && request.end.is_finite()
        && request.end > request.start;
    if !valid {
        return None;
    }

    let to_index = |t: f64| (len as f64 * t / request.total_duration).clamp(0.0, len as f64);
    let start = to_index(request.start).floor() as usize;
    let stop = to_index(request.end).ceil() as usize;
    (start < stop).then_some((start, stop))
}
