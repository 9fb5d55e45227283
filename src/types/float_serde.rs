//! JSON has no NaN or infinity: non-finite floats travel as `null` and
//! come back as NaN.

use serde::{Deserialize, Deserializer, Serializer};

fn finite(v: f64) -> Option<f64> {
    v.is_finite().then_some(v)
}

pub mod nan_as_null {
    use super::*;

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        match finite(*v) {
            Some(v) => s.serialize_f64(v),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

/// Same mapping for row-major grids.
pub mod grid_nan_as_null {
    use super::*;

    pub fn serialize<S: Serializer>(grid: &[Vec<f64>], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(
            grid.iter()
                .map(|row| row.iter().map(|&v| finite(v)).collect::<Vec<_>>()),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let rows = Vec::<Vec<Option<f64>>>::deserialize(d)?;
        Ok(rows
            .into_iter()
            .map(|row| row.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
            .collect())
    }
}
