//! Fixed-precision decimal encoding for stored metric documents.
//!
//! Prices and levels are written as 2-decimal strings (`"105.00"`). Readers accept either
//! a string or a JSON number so documents written by older producers still load.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};

pub fn format_fixed(v: f64) -> String {
    format!("{v:.2}")
}

/// Round to the stored precision.
pub fn round_fixed(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrString {
    Num(f64),
    Str(String),
}

fn parse_raw<E: de::Error>(raw: NumOrString) -> Result<Option<f64>, E> {
    match raw {
        NumOrString::Num(n) => Ok(Some(n)),
        NumOrString::Str(s) => {
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case("n/a") {
                return Ok(None);
            }
            t.parse::<f64>()
                .map(Some)
                .map_err(|_| E::custom(format!("invalid decimal: {s:?}")))
        }
    }
}

pub mod fixed2 {
    use super::*;

    pub fn serialize<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_fixed(*v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        let raw = NumOrString::deserialize(d)?;
        parse_raw::<D::Error>(raw)?.ok_or_else(|| de::Error::custom("missing decimal value"))
    }
}

/// Like [`fixed2`], but `None` is written as `null` (indicator not available). Used for
/// moving averages only: older documents wrote `"0.00"` for an average that had too little
/// history, so a zero reads back as `None`.
pub mod fixed2_opt {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_str(&format_fixed(*v)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Option::<NumOrString>::deserialize(d)? {
            Some(raw) => Ok(parse_raw::<D::Error>(raw)?.filter(|v| *v != 0.0)),
            None => Ok(None),
        }
    }
}

/// Fundamentals: a plain number, or the literal `"N/A"` when unknown.
pub mod not_available {
    use super::*;

    pub fn serialize<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_f64(*v),
            None => s.serialize_str("N/A"),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        match Option::<NumOrString>::deserialize(d)? {
            Some(raw) => parse_raw::<D::Error>(raw),
            None => Ok(None),
        }
    }
}
