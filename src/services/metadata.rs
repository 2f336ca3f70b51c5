//! Scalar extraction from the "Station information and sounding indices" block.
//!
//! The block is a list of `label: value` lines with arbitrary left padding.
//! Station identity is always present, the derived indices often are not, so a
//! missing label is expected and falls back to that field's default.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::Scalar;

/// Default for a missing observation time.
pub const LAUNCH_TIME_SENTINEL: &str = "000000/0000";

/// Format of the observation time token, e.g. `190916/1200`.
pub const LAUNCH_TIME_FORMAT: &str = "%y%m%d/%H%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    StationNumber,
    LaunchTime,
    StationLatitude,
    StationLongitude,
    StationElevation,
    LclTemperature,
    LclPressure,
    PrecipitableWater,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Int(i32),
    Float(f64),
    Text(String),
}

struct FieldDecoder {
    key: MetadataKey,
    pattern: &'static str,
    convert: fn(&str) -> Option<MetaValue>,
    default: fn() -> MetaValue,
}

fn to_int(s: &str) -> Option<MetaValue> {
    s.parse().ok().map(MetaValue::Int)
}

fn to_float(s: &str) -> Option<MetaValue> {
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(MetaValue::Float)
}

fn to_text(s: &str) -> Option<MetaValue> {
    Some(MetaValue::Text(s.to_string()))
}

fn zero_int() -> MetaValue {
    MetaValue::Int(0)
}

fn zero_float() -> MetaValue {
    MetaValue::Float(0.0)
}

fn time_sentinel() -> MetaValue {
    MetaValue::Text(LAUNCH_TIME_SENTINEL.to_string())
}

/// Label pattern, converter and default for every extracted field.
/// The first capture group holds the value.
static DECODERS: [FieldDecoder; 8] = [
    FieldDecoder {
        key: MetadataKey::StationNumber,
        pattern: r"Station number:[ \t]*(\d+)",
        convert: to_int,
        default: zero_int,
    },
    FieldDecoder {
        key: MetadataKey::LaunchTime,
        pattern: r"Observation time:[ \t]*(\d{6}/\d{4})",
        convert: to_text,
        default: time_sentinel,
    },
    FieldDecoder {
        key: MetadataKey::StationLatitude,
        pattern: r"Station latitude:[ \t]*(-?\d+(?:\.\d+)?)",
        convert: to_float,
        default: zero_float,
    },
    FieldDecoder {
        key: MetadataKey::StationLongitude,
        pattern: r"Station longitude:[ \t]*(-?\d+(?:\.\d+)?)",
        convert: to_float,
        default: zero_float,
    },
    FieldDecoder {
        key: MetadataKey::StationElevation,
        pattern: r"Station elevation:[ \t]*(-?\d+(?:\.\d+)?)",
        convert: to_float,
        default: zero_float,
    },
    FieldDecoder {
        key: MetadataKey::LclTemperature,
        pattern: r"Temp \[K\] of the Lifted Condensation Level:[ \t]*(-?\d+(?:\.\d+)?)",
        convert: to_float,
        default: zero_float,
    },
    FieldDecoder {
        key: MetadataKey::LclPressure,
        pattern: r"Pres \[hPa\] of the Lifted Condensation Level:[ \t]*(-?\d+(?:\.\d+)?)",
        convert: to_float,
        default: zero_float,
    },
    FieldDecoder {
        key: MetadataKey::PrecipitableWater,
        pattern: r"Precipitable water \[mm\] for entire sounding:[ \t]*(-?\d+(?:\.\d+)?)",
        convert: to_float,
        default: zero_float,
    },
];

lazy_static! {
    static ref COMPILED: Vec<(&'static FieldDecoder, Regex)> = DECODERS
        .iter()
        .map(|d| (d, Regex::new(d.pattern).expect("metadata pattern is valid")))
        .collect();
}

/// All scalar fields of one metadata block, each tagged parsed or defaulted.
#[derive(Debug, Clone)]
pub struct SoundingMetadata {
    fields: HashMap<MetadataKey, (MetaValue, bool)>,
}

impl SoundingMetadata {
    fn float(&self, key: MetadataKey) -> Scalar<f64> {
        match self.fields.get(&key) {
            Some((MetaValue::Float(v), true)) => Scalar::Parsed(*v),
            Some((MetaValue::Float(v), false)) => Scalar::Defaulted(*v),
            _ => Scalar::Defaulted(0.0),
        }
    }

    pub fn station_number(&self) -> Scalar<i32> {
        match self.fields.get(&MetadataKey::StationNumber) {
            Some((MetaValue::Int(v), true)) => Scalar::Parsed(*v),
            Some((MetaValue::Int(v), false)) => Scalar::Defaulted(*v),
            _ => Scalar::Defaulted(0),
        }
    }

    /// Raw observation time token, `000000/0000` when absent.
    pub fn launch_time_token(&self) -> &str {
        match self.fields.get(&MetadataKey::LaunchTime) {
            Some((MetaValue::Text(s), _)) => s,
            _ => LAUNCH_TIME_SENTINEL,
        }
    }

    /// Observation time as UTC; `None` for the sentinel or an impossible date.
    pub fn launch_time(&self) -> Option<DateTime<Utc>> {
        parse_launch_time(self.launch_time_token())
    }

    pub fn station_latitude(&self) -> Scalar<f64> {
        self.float(MetadataKey::StationLatitude)
    }

    pub fn station_longitude(&self) -> Scalar<f64> {
        self.float(MetadataKey::StationLongitude)
    }

    pub fn station_elevation(&self) -> Scalar<f64> {
        self.float(MetadataKey::StationElevation)
    }

    pub fn lcl_temperature(&self) -> Scalar<f64> {
        self.float(MetadataKey::LclTemperature)
    }

    pub fn lcl_pressure(&self) -> Scalar<f64> {
        self.float(MetadataKey::LclPressure)
    }

    pub fn precipitable_water(&self) -> Scalar<f64> {
        self.float(MetadataKey::PrecipitableWater)
    }
}

/// Parse a `YYMMDD/HHMM` token.
pub fn parse_launch_time(token: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(token, LAUNCH_TIME_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Extract every known field from a metadata block. Never fails.
pub fn extract(text: &str) -> SoundingMetadata {
    let mut fields = HashMap::with_capacity(COMPILED.len());

    for (decoder, regex) in COMPILED.iter() {
        let raw = regex
            .captures(text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str());

        let entry = match raw.and_then(decoder.convert) {
            Some(value) => (value, true),
            None => {
                tracing::warn!("Metadata field {:?} not found, using default", decoder.key);
                ((decoder.default)(), false)
            }
        };
        fields.insert(decoder.key, entry);
    }

    SoundingMetadata { fields }
}
