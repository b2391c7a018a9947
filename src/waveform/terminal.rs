use super::WaveformFrame;

/// Draw a frame as bottom-anchored text columns, one column per value.
pub fn render_ascii(frame: &WaveformFrame, rows: usize) -> Vec<String> {
    let h = rows.max(1);
    let mut lines = vec![vec![' '; frame.len()]; h];
    for (x, &v) in frame.values().iter().enumerate() {
        let filled = (v.clamp(0.0, 1.0) * h as f32).round() as usize;
        for row in lines.iter_mut().skip(h - filled) {
            row[x] = '█';
        }
    }
    lines.into_iter().map(|row| row.into_iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_fill_from_the_bottom() {
        let frame = WaveformFrame::from_values(vec![1.0, 0.5, 0.0]);
        let lines = render_ascii(&frame, 4);
        assert_eq!(lines, vec!["█  ", "█  ", "██ ", "██ "]);
    }

    #[test]
    fn zero_rows_still_draws_one_line() {
        let lines = render_ascii(&WaveformFrame::zeros(2), 0);
        assert_eq!(lines, vec!["  "]);
    }
}
