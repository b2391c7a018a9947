pub mod extract;
pub mod probe;
pub mod summary;

pub use extract::{summarize, summarize_file, summarize_or_unavailable};
pub use probe::{probe_source, AudioSource, SourceProbe};
pub use summary::{AmplitudeSummary, Availability, MAX_SUMMARY_LEN};
