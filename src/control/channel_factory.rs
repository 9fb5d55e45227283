//! Derived FK channel synthesis

use std::collections::BTreeMap;

use crate::error::{FkError, FkResult};
use crate::types::{Channel, FkSpectraDefinition, Orientation, Station, Units};

/// Processing-metadata key naming the channel group.
pub const CHANNEL_GROUP: &str = "CHANNEL_GROUP";
/// Processing-metadata key naming the beam type.
pub const BEAM_TYPE: &str = "BEAM_TYPE";
pub const FK_CHANNEL_GROUP: &str = "fk";

/// Build the derived channel that carries a station's FK spectra.
///
/// Named `{station}.fk.{code}` after the first input's channel code, with
/// the canonical angles for the first input's orientation type.
/// Effective from the latest input start until the earliest input end.
pub fn create_fk_channel(
    station: &Station,
    inputs: &[Channel],
    definition: &FkSpectraDefinition,
) -> FkResult<Channel> {
    let first = inputs.first().ok_or_else(|| {
        FkError::InvalidArgument("FK channel requires at least one input channel".to_string())
    })?;
    let effective_at = inputs
        .iter()
        .map(|c| c.effective_at)
        .max()
        .unwrap_or(first.effective_at);
    let effective_until = inputs.iter().filter_map(|c| c.effective_until).min();

    let mut processing_metadata = BTreeMap::new();
    processing_metadata.insert(CHANNEL_GROUP.to_string(), FK_CHANNEL_GROUP.to_string());
    processing_metadata.insert(BEAM_TYPE.to_string(), "FK".to_string());

    Ok(Channel {
        name: format!("{}.fk.{}", station.name, first.channel_code()),
        station_name: station.name.clone(),
        nominal_sample_rate_hz: definition.sample_rate_hz(),
        orientation_type: first.orientation_type,
        orientation: Orientation::for_type(first.orientation_type),
        units: Units::NanometersSquaredPerSecond,
        location: station.location,
        effective_at,
        effective_until,
        configured_inputs: inputs.iter().map(|c| c.name.clone()).collect(),
        processing_metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{reference_params, ChannelOrientationType};
    use chrono::{DateTime, Duration, Utc};
    use std::collections::HashMap;

    fn station() -> Station {
        Station {
            name: "ASAR".to_string(),
            location: Default::default(),
            channels: Vec::new(),
            relative_positions_by_channel: HashMap::new(),
        }
    }

    #[test]
    fn test_fk_channel_naming_and_metadata() {
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        let mut a = Channel::raw("ASAR.AS01.SHZ", "ASAR", 40.0, t0);
        a.effective_until = Some(t0 + Duration::days(30));
        a.orientation_type = ChannelOrientationType::NorthSouth;
        a.orientation = Orientation::for_type(ChannelOrientationType::NorthSouth);
        let mut b = Channel::raw("ASAR.AS02.SHZ", "ASAR", 40.0, t0 + Duration::days(2));
        b.effective_until = Some(t0 + Duration::days(10));
        let c = Channel::raw("ASAR.AS03.SHZ", "ASAR", 40.0, t0 + Duration::days(1));

        let definition = FkSpectraDefinition::new(reference_params()).expect("valid");
        let fk = create_fk_channel(&station(), &[a, b, c], &definition).expect("channel");

        assert_eq!(fk.name, "ASAR.fk.SHZ");
        assert_eq!(fk.station_name, "ASAR");
        assert_eq!(fk.units, Units::NanometersSquaredPerSecond);
        assert_eq!(fk.nominal_sample_rate_hz, 1.0);
        assert_eq!(fk.orientation_type, ChannelOrientationType::NorthSouth);
        assert_eq!(fk.effective_at, t0 + Duration::days(2));
        assert_eq!(fk.effective_until, Some(t0 + Duration::days(10)));
        assert_eq!(
            fk.configured_inputs,
            vec!["ASAR.AS01.SHZ", "ASAR.AS02.SHZ", "ASAR.AS03.SHZ"]
        );
        assert_eq!(fk.processing_metadata[CHANNEL_GROUP], "fk");
    }

    #[test]
    fn test_open_ended_inputs_stay_open() {
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        let definition = FkSpectraDefinition::new(reference_params()).expect("valid");
        let fk = create_fk_channel(
            &station(),
            &[Channel::raw("ASAR.AS01.BHZ", "ASAR", 40.0, t0)],
            &definition,
        )
        .expect("channel");
        assert_eq!(fk.name, "ASAR.fk.BHZ");
        assert!(fk.effective_until.is_none());
    }

    #[test]
    fn test_orientation_angles_follow_type() {
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        let definition = FkSpectraDefinition::new(reference_params()).expect("valid");
        let cases = [
            (ChannelOrientationType::NorthSouth, Some(0.0), Some(90.0)),
            (ChannelOrientationType::EastWest, Some(90.0), Some(90.0)),
            (ChannelOrientationType::Vertical, None, Some(0.0)),
            (ChannelOrientationType::Unknown, None, None),
        ];
        for (orientation_type, horizontal, vertical) in cases {
            let mut input = Channel::raw("ASAR.AS01.SHZ", "ASAR", 40.0, t0);
            input.orientation_type = orientation_type;
            input.orientation = Orientation {
                horizontal_angle_deg: 12.5,
                vertical_angle_deg: 33.0,
            };
            let fk = create_fk_channel(&station(), &[input], &definition).expect("channel");
            let angle = |v: f64| (!v.is_nan()).then_some(v);
            assert_eq!(angle(fk.orientation.horizontal_angle_deg), horizontal, "{orientation_type:?}");
            assert_eq!(angle(fk.orientation.vertical_angle_deg), vertical, "{orientation_type:?}");
        }
    }

    #[test]
    fn test_no_inputs_is_error() {
        let definition = FkSpectraDefinition::new(reference_params()).expect("valid");
        assert!(create_fk_channel(&station(), &[], &definition).is_err());
    }
}
