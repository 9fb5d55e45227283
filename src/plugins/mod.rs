//! Plugin registry: configured plugin names resolved to closed enums
//!
//! Spectrum plugins map to a [`BeamformerKind`]; attribute plugins map to
//! an [`AttributesPluginKind`] that builds the extractor.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::attributes::{FkAttributeExtractor, MaxFstatAttributes, MaxPowerAttributes};
use crate::beamforming::BeamformerKind;

/// Historical name of the platform's FK plugin. Resolves to the
/// delay-and-sum estimator, which reproduces its numerics.
pub const CAPON_FK_SPECTRUM: &str = "caponFkSpectrum";
pub const CONVENTIONAL_FK_SPECTRUM: &str = "conventionalFkSpectrum";
pub const MINIMUM_VARIANCE_FK_SPECTRUM: &str = "minimumVarianceFkSpectrum";

/// Errors raised by plugin lookup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    #[error("Unknown FK spectrum plugin '{name}' (registered: {registered})")]
    UnknownSpectrumPlugin { name: String, registered: String },

    #[error("Unknown FK attributes plugin '{name}' (registered: {registered})")]
    UnknownAttributesPlugin { name: String, registered: String },
}

/// Built-in attribute extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributesPluginKind {
    MaxPower,
    MaxFstat,
}

impl AttributesPluginKind {
    pub fn extractor(self) -> Box<dyn FkAttributeExtractor> {
        match self {
            AttributesPluginKind::MaxPower => Box::new(MaxPowerAttributes),
            AttributesPluginKind::MaxFstat => Box::new(MaxFstatAttributes),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PluginRegistry {
    spectrum: BTreeMap<String, BeamformerKind>,
    attributes: BTreeMap<String, AttributesPluginKind>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_spectrum_plugin(CAPON_FK_SPECTRUM, BeamformerKind::Conventional);
        registry.register_spectrum_plugin(CONVENTIONAL_FK_SPECTRUM, BeamformerKind::Conventional);
        registry.register_spectrum_plugin(MINIMUM_VARIANCE_FK_SPECTRUM, BeamformerKind::MinimumVariance);
        registry.register_attributes_plugin(MaxPowerAttributes::NAME, AttributesPluginKind::MaxPower);
        registry.register_attributes_plugin(MaxFstatAttributes::NAME, AttributesPluginKind::MaxFstat);
        registry
    }
}

impl PluginRegistry {
    /// Registry with no plugins.
    pub fn empty() -> Self {
        Self {
            spectrum: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn register_spectrum_plugin(&mut self, name: impl Into<String>, kind: BeamformerKind) {
        self.spectrum.insert(name.into(), kind);
    }

    pub fn register_attributes_plugin(&mut self, name: impl Into<String>, kind: AttributesPluginKind) {
        self.attributes.insert(name.into(), kind);
    }

    pub fn spectrum_plugin(&self, name: &str) -> Result<BeamformerKind, PluginError> {
        self.spectrum
            .get(name)
            .copied()
            .ok_or_else(|| PluginError::UnknownSpectrumPlugin {
                name: name.to_string(),
                registered: join_names(self.spectrum.keys()),
            })
    }

    pub fn attributes_plugin(&self, name: &str) -> Result<Box<dyn FkAttributeExtractor>, PluginError> {
        self.attributes
            .get(name)
            .map(|kind| kind.extractor())
            .ok_or_else(|| PluginError::UnknownAttributesPlugin {
                name: name.to_string(),
                registered: join_names(self.attributes.keys()),
            })
    }

    pub fn spectrum_plugin_names(&self) -> impl Iterator<Item = &str> {
        self.spectrum.keys().map(String::as_str)
    }

    pub fn attributes_plugin_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a String>) -> String {
    names.map(String::as_str).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_resolves_builtins() {
        let registry = PluginRegistry::default();
        assert_eq!(
            registry.spectrum_plugin(CAPON_FK_SPECTRUM),
            Ok(BeamformerKind::Conventional)
        );
        assert_eq!(
            registry.spectrum_plugin(MINIMUM_VARIANCE_FK_SPECTRUM),
            Ok(BeamformerKind::MinimumVariance)
        );
        let extractor = registry
            .attributes_plugin("maxFstatFkAttributes")
            .expect("registered");
        assert_eq!(extractor.name(), "maxFstatFkAttributes");
    }

    #[test]
    fn test_unknown_plugin_lists_registered_names() {
        let registry = PluginRegistry::default();
        let err = registry.spectrum_plugin("beamz").expect_err("unknown");
        let msg = err.to_string();
        assert!(msg.contains("beamz"));
        assert!(msg.contains(CAPON_FK_SPECTRUM), "got: {msg}");
        assert!(registry.attributes_plugin("peakiness").is_err());
    }

    #[test]
    fn test_empty_registry() {
        let registry = PluginRegistry::empty();
        assert_eq!(registry.spectrum_plugin_names().count(), 0);
        assert!(registry.spectrum_plugin(CAPON_FK_SPECTRUM).is_err());
    }
}
