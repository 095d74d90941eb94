//! Remote Photoplethysmography (rPPG) module
//!
//! Turns per-frame facial ROI colour samples into a single pulse waveform.
//!
//! - `RoiSample` - one frame's skin colour measurement
//! - `PulseBuffer` - bounded, append-only colour history of a scan
//! - `PulseExtractor` - detrend, project (CHROM or POS) and bandpass
//! - `ProjectionMethod` - projection selection

mod buffer;
mod extractor;
mod projection;
mod roi;

pub use buffer::PulseBuffer;
pub use extractor::{ExtractorConfig, PulseExtractor, PulseWaveform};
pub use projection::{chrom_projection, pos_projection, ProjectionMethod};
pub use roi::RoiSample;
