//! FK attribute extraction: azimuth and slowness estimates from a spectrum
//!
//! Extractors locate the peak of one grid (power or F-statistic), convert
//! the peak cell to a slowness vector and derive uncertainties from the
//! grid spacing and the peak F-statistic.

mod peak;

pub use peak::{MaxFstatAttributes, MaxPowerAttributes};

use tracing::debug;

use crate::error::FkResult;
use crate::types::{FkAttributes, FkSpectraDefinition, FkSpectrum};

/// Grid description handed to extractors alongside each spectrum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FkSpectraInfo {
    pub low_frequency_hz: f64,
    pub high_frequency_hz: f64,
    pub east_slow_start: f64,
    pub east_slow_delta: f64,
    pub north_slow_start: f64,
    pub north_slow_delta: f64,
    pub north_slow_count: usize,
}

impl FkSpectraInfo {
    pub fn from_definition(definition: &FkSpectraDefinition) -> Self {
        Self {
            low_frequency_hz: definition.low_frequency_hz(),
            high_frequency_hz: definition.high_frequency_hz(),
            east_slow_start: definition.slow_start_x(),
            east_slow_delta: definition.slow_delta_x(),
            north_slow_start: definition.slow_start_y(),
            north_slow_delta: definition.slow_delta_y(),
            north_slow_count: definition.slow_count_y(),
        }
    }

    /// East slowness (s/km) of column `col`.
    pub fn east_slowness(&self, col: usize) -> f64 {
        self.east_slow_start + col as f64 * self.east_slow_delta
    }

    /// North slowness (s/km) of row `row`; row 0 is the northern edge.
    pub fn north_slowness(&self, row: usize) -> f64 {
        let index = self.north_slow_count.saturating_sub(1).saturating_sub(row);
        self.north_slow_start + index as f64 * self.north_slow_delta
    }
}

/// Derives attributes from a single spectrum.
pub trait FkAttributeExtractor: Send + Sync {
    /// Configured plugin name; also the key under which results are stored.
    fn name(&self) -> &str;

    /// `None` when the grid holds no usable peak (all cells NaN).
    fn extract(&self, info: &FkSpectraInfo, spectrum: &FkSpectrum) -> FkResult<Option<FkAttributes>>;
}

/// Run every extractor over `spectrum`, merging results by extractor name.
/// Extractors that find no peak leave their entry out.
pub fn apply_extractors(
    extractors: &[Box<dyn FkAttributeExtractor>],
    info: &FkSpectraInfo,
    mut spectrum: FkSpectrum,
) -> FkResult<FkSpectrum> {
    for extractor in extractors {
        match extractor.extract(info, &spectrum)? {
            Some(attributes) => {
                spectrum
                    .attributes
                    .insert(extractor.name().to_string(), attributes);
            }
            None => debug!(extractor = extractor.name(), "No finite peak, attributes omitted"),
        }
    }
    Ok(spectrum)
}
