use chrono::{DateTime, Utc};

/// A physical quantity carried by one row of the sounding table.
///
/// The order matches the column order of the upstream `TEXT:LIST` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantity {
    Pressure,
    Height,
    Temperature,
    Dewpoint,
    RelativeHumidity,
    MixingRatio,
    WindDirection,
    WindSpeed,
    ThetaA,
    ThetaE,
    ThetaV,
}

impl Quantity {
    pub const ALL: [Quantity; 11] = [
        Quantity::Pressure,
        Quantity::Height,
        Quantity::Temperature,
        Quantity::Dewpoint,
        Quantity::RelativeHumidity,
        Quantity::MixingRatio,
        Quantity::WindDirection,
        Quantity::WindSpeed,
        Quantity::ThetaA,
        Quantity::ThetaE,
        Quantity::ThetaV,
    ];

    /// Record field name used by the output schema (`source` in the metadata config).
    pub fn field_name(self) -> &'static str {
        match self {
            Quantity::Pressure => "pressure",
            Quantity::Height => "altitude",
            Quantity::Temperature => "temperature",
            Quantity::Dewpoint => "dewpoint",
            Quantity::RelativeHumidity => "relative_humidity",
            Quantity::MixingRatio => "water_vapor_mixing_ratio",
            Quantity::WindDirection => "wind_direction",
            Quantity::WindSpeed => "wind_speed",
            Quantity::ThetaA => "theta_a",
            Quantity::ThetaE => "theta_e",
            Quantity::ThetaV => "theta_v",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Quantity> {
        Quantity::ALL.into_iter().find(|q| q.field_name() == name)
    }
}

/// One atmospheric level. `None` means the fixed-width slot was blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelRecord {
    /// Pressure (hPa)
    pub pressure: Option<f64>,
    /// Geopotential height (m)
    pub height: Option<f64>,
    /// Temperature (°C)
    pub temperature: Option<f64>,
    /// Dewpoint (°C)
    pub dewpoint: Option<f64>,
    /// Relative humidity (%)
    pub relative_humidity: Option<f64>,
    /// Water-vapor mixing ratio (g/kg)
    pub mixing_ratio: Option<f64>,
    /// Wind direction (deg)
    pub wind_direction: Option<f64>,
    /// Wind speed (knot)
    pub wind_speed: Option<f64>,
    /// Potential temperature (K)
    pub theta_a: Option<f64>,
    /// Equivalent potential temperature (K)
    pub theta_e: Option<f64>,
    /// Virtual potential temperature (K)
    pub theta_v: Option<f64>,
}

impl LevelRecord {
    pub fn get(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Pressure => self.pressure,
            Quantity::Height => self.height,
            Quantity::Temperature => self.temperature,
            Quantity::Dewpoint => self.dewpoint,
            Quantity::RelativeHumidity => self.relative_humidity,
            Quantity::MixingRatio => self.mixing_ratio,
            Quantity::WindDirection => self.wind_direction,
            Quantity::WindSpeed => self.wind_speed,
            Quantity::ThetaA => self.theta_a,
            Quantity::ThetaE => self.theta_e,
            Quantity::ThetaV => self.theta_v,
        }
    }

    pub fn set(&mut self, quantity: Quantity, value: Option<f64>) {
        let slot = match quantity {
            Quantity::Pressure => &mut self.pressure,
            Quantity::Height => &mut self.height,
            Quantity::Temperature => &mut self.temperature,
            Quantity::Dewpoint => &mut self.dewpoint,
            Quantity::RelativeHumidity => &mut self.relative_humidity,
            Quantity::MixingRatio => &mut self.mixing_ratio,
            Quantity::WindDirection => &mut self.wind_direction,
            Quantity::WindSpeed => &mut self.wind_speed,
            Quantity::ThetaA => &mut self.theta_a,
            Quantity::ThetaE => &mut self.theta_e,
            Quantity::ThetaV => &mut self.theta_v,
        };
        *slot = value;
    }
}

/// A scalar taken from the metadata block, remembering whether the label was
/// actually present or the default had to be substituted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar<T> {
    Parsed(T),
    Defaulted(T),
}

impl<T: Copy> Scalar<T> {
    pub fn value(&self) -> T {
        match *self {
            Scalar::Parsed(v) | Scalar::Defaulted(v) => v,
        }
    }

    /// The value only if it was read from the text.
    pub fn parsed(&self) -> Option<T> {
        match *self {
            Scalar::Parsed(v) => Some(v),
            Scalar::Defaulted(_) => None,
        }
    }

    pub fn is_default(&self) -> bool {
        matches!(self, Scalar::Defaulted(_))
    }
}

/// One entry of the radiosonde station list.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRecord {
    /// WMO station number embedded in the list's ID token.
    pub id: i32,
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in metres above sea level
    pub elevation: f64,
    /// Two-letter state/province code, blank for most stations.
    pub state: Option<String>,
    pub name: String,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub observation_count: Option<u32>,
}

/// One radiosonde launch, assembled from a single (data, metadata) block pair.
///
/// Fields are private: the record is built once by the fetcher and handed to
/// the archiver by value.
#[derive(Debug)]
pub struct SoundingRecord {
    levels: Vec<LevelRecord>,
    lcl_temperature: Scalar<f64>,
    lcl_pressure: Scalar<f64>,
    precipitable_water: Scalar<f64>,
    launch_time: Option<DateTime<Utc>>,
    station_number: i32,
    station_name: Option<String>,
    station_latitude: Scalar<f64>,
    station_longitude: Scalar<f64>,
    station_elevation: Scalar<f64>,
}

/// Values of one output variable taken from a record, `None` marking a missing entry.
pub type FieldValues = Vec<Option<f64>>;

impl SoundingRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        levels: Vec<LevelRecord>,
        lcl_temperature: Scalar<f64>,
        lcl_pressure: Scalar<f64>,
        precipitable_water: Scalar<f64>,
        launch_time: Option<DateTime<Utc>>,
        station_number: i32,
        station_name: Option<String>,
        station_latitude: Scalar<f64>,
        station_longitude: Scalar<f64>,
        station_elevation: Scalar<f64>,
    ) -> Self {
        Self {
            levels,
            lcl_temperature,
            lcl_pressure,
            precipitable_water,
            launch_time,
            station_number,
            station_name,
            station_latitude,
            station_longitude,
            station_elevation,
        }
    }

    pub fn levels(&self) -> &[LevelRecord] {
        &self.levels
    }

    pub fn lcl_temperature(&self) -> Scalar<f64> {
        self.lcl_temperature
    }

    pub fn lcl_pressure(&self) -> Scalar<f64> {
        self.lcl_pressure
    }

    pub fn precipitable_water(&self) -> Scalar<f64> {
        self.precipitable_water
    }

    pub fn launch_time(&self) -> Option<DateTime<Utc>> {
        self.launch_time
    }

    pub fn station_number(&self) -> i32 {
        self.station_number
    }

    pub fn station_name(&self) -> Option<&str> {
        self.station_name.as_deref()
    }

    pub fn station_latitude(&self) -> Scalar<f64> {
        self.station_latitude
    }

    pub fn station_longitude(&self) -> Scalar<f64> {
        self.station_longitude
    }

    pub fn station_elevation(&self) -> Scalar<f64> {
        self.station_elevation
    }

    /// Look up the values behind an output variable by record field name.
    ///
    /// Profile fields yield one entry per level; scalar fields yield a single
    /// entry, missing when the metadata label was absent. Unknown names give `None`.
    pub fn field(&self, name: &str) -> Option<FieldValues> {
        if let Some(quantity) = Quantity::from_field_name(name) {
            return Some(self.levels.iter().map(|l| l.get(quantity)).collect());
        }

        let scalar = match name {
            "temperature_LCL" => self.lcl_temperature().parsed(),
            "pres_LCL" => self.lcl_pressure().parsed(),
            "precipitable_water" => self.precipitable_water().parsed(),
            "launch_time" => self.launch_time.map(|t| t.timestamp() as f64),
            "station_latitude" => self.station_latitude.parsed(),
            "station_longitude" => self.station_longitude.parsed(),
            "station_elevation" => self.station_elevation.parsed(),
            _ => return None,
        };
        Some(vec![scalar])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> SoundingRecord {
        let levels = vec![
            LevelRecord {
                pressure: Some(1000.0),
                height: Some(111.0),
                ..Default::default()
            },
            LevelRecord {
                pressure: Some(925.0),
                height: None,
                ..Default::default()
            },
        ];
        SoundingRecord::new(
            levels,
            Scalar::Parsed(289.53),
            Scalar::Defaulted(0.0),
            Scalar::Parsed(27.3),
            Utc.with_ymd_and_hms(2019, 9, 16, 12, 0, 0).single(),
            57494,
            Some("WUHAN".to_string()),
            Scalar::Parsed(30.61),
            Scalar::Parsed(114.13),
            Scalar::Parsed(23.0),
        )
    }

    #[test]
    fn test_quantity_field_names_round_trip() {
        for q in Quantity::ALL {
            assert_eq!(Quantity::from_field_name(q.field_name()), Some(q));
        }
        assert_eq!(Quantity::from_field_name("nope"), None);
    }

    #[test]
    fn test_level_get_set() {
        let mut level = LevelRecord::default();
        level.set(Quantity::WindSpeed, Some(12.0));
        assert_eq!(level.get(Quantity::WindSpeed), Some(12.0));
        assert_eq!(level.get(Quantity::WindDirection), None);
    }

    #[test]
    fn test_scalar_provenance() {
        let parsed = Scalar::Parsed(0.0);
        let defaulted = Scalar::Defaulted(0.0);
        assert_eq!(parsed.value(), defaulted.value());
        assert_eq!(parsed.parsed(), Some(0.0));
        assert_eq!(defaulted.parsed(), None);
        assert!(defaulted.is_default());
    }

    #[test]
    fn test_field_profile_values() {
        let record = sample_record();
        assert_eq!(record.field("altitude"), Some(vec![Some(111.0), None]));
        assert_eq!(record.field("pressure"), Some(vec![Some(1000.0), Some(925.0)]));
    }

    #[test]
    fn test_field_scalar_values() {
        let record = sample_record();
        assert_eq!(record.field("temperature_LCL"), Some(vec![Some(289.53)]));
        // Defaulted scalars surface as missing
        assert_eq!(record.field("pres_LCL"), Some(vec![None]));
        assert_eq!(record.field("launch_time"), Some(vec![Some(1_568_635_200.0)]));
        assert_eq!(record.field("unknown_variable"), None);
    }
}
