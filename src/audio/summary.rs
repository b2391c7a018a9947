/// Fixed length of every amplitude summary, independent of track length.
pub const MAX_SUMMARY_LEN: usize = 100_000;

/// Whether a summary holds real envelope data.
#[derive(Clone, Debug, PartialEq)]
pub enum Availability {
    Ready,
    /// Extraction failed; the values are placeholders and must not be drawn
    Unavailable(String),
}

/// Bounded envelope of a whole track: `MAX_SUMMARY_LEN` average absolute
/// sample magnitudes. Built once per load and never mutated.
#[derive(Clone, Debug)]
pub struct AmplitudeSummary {
    values: Vec<u16>,
    samples_per_bucket: usize,
    duration: f64,
    availability: Availability,
}

impl AmplitudeSummary {
    /// Wrap extracted values, zero-padding or truncating to `MAX_SUMMARY_LEN`.
    pub fn new(mut values: Vec<u16>, samples_per_bucket: usize, duration: f64) -> Self {
        values.resize(MAX_SUMMARY_LEN, 0);
        Self {
            values,
            samples_per_bucket,
            duration,
            availability: Availability::Ready,
        }
    }

    /// A valid all-zero summary, used for tracks too short to fill one bucket.
    pub fn silent(duration: f64) -> Self {
        Self::new(Vec::new(), 0, duration)
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            values: vec![0; MAX_SUMMARY_LEN],
            samples_per_bucket: 0,
            duration: 0.0,
            availability: Availability::Unavailable(reason.into()),
        }
    }

    pub fn values(&self) -> &[u16] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn samples_per_bucket(&self) -> usize {
        self.samples_per_bucket
    }

    /// Duration of the decoded PCM in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn is_ready(&self) -> bool {
        self.availability == Availability::Ready
    }

    pub fn peak(&self) -> u16 {
        self.values.iter().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pads_to_fixed_length() {
        let summary = AmplitudeSummary::new(vec![7, 7, 9, 9], 3, 1.5);
        assert_eq!(summary.len(), MAX_SUMMARY_LEN);
        assert_eq!(&summary.values()[..5], &[7, 7, 9, 9, 0]);
        assert_eq!(summary.peak(), 9);
        assert_eq!(summary.samples_per_bucket(), 3);
        assert!(summary.is_ready());
    }

    #[test]
    fn new_truncates_overlong_input() {
        let summary = AmplitudeSummary::new(vec![1; MAX_SUMMARY_LEN + 10], 1, 1.0);
        assert_eq!(summary.len(), MAX_SUMMARY_LEN);
    }

    #[test]
    fn unavailable_is_flagged() {
        let summary = AmplitudeSummary::unavailable("bad header");
        assert_eq!(summary.len(), MAX_SUMMARY_LEN);
        assert!(!summary.is_ready());
        assert_eq!(
            summary.availability(),
            &Availability::Unavailable("bad header".into())
        );
    }

    #[test]
    fn silent_is_ready_and_zero() {
        let summary = AmplitudeSummary::silent(0.2);
        assert!(summary.is_ready());
        assert_eq!(summary.peak(), 0);
        assert_eq!(summary.duration(), 0.2);
    }
}
