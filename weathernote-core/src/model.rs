use std::fmt;

use chrono::{DateTime, Datelike, TimeZone, Timelike};

use crate::config::UnitSystem;

/// Raw values of one observation, as reported by the provider.
///
/// Nothing here is rounded or converted yet; [`WeatherSnapshot::derive`] does that.
#[derive(Debug, Clone, PartialEq)]
pub struct RawObservation {
    pub description: String,
    pub icon_url: String,
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub sea_level: Option<f64>,
    pub ground_level: Option<f64>,
    pub visibility: Option<f64>,
    pub wind_speed: f64,
    pub wind_deg: f64,
    pub wind_gust: Option<f64>,
    pub observed_at: i64,
    pub sunrise: i64,
    pub sunset: i64,
    pub location_name: String,
}

/// Eight-point compass direction the wind blows from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindDirection {
    North,
    Northeast,
    East,
    Southeast,
    South,
    Southwest,
    West,
    Northwest,
}

impl WindDirection {
    const COMPASS: [WindDirection; 8] = [
        WindDirection::North,
        WindDirection::Northeast,
        WindDirection::East,
        WindDirection::Southeast,
        WindDirection::South,
        WindDirection::Southwest,
        WindDirection::West,
        WindDirection::Northwest,
    ];

    /// Maps a meteorological bearing onto the compass: `round(deg / 45) mod 8`.
    pub fn from_degrees(degrees: f64) -> Self {
        let sector = round_half_up(degrees / 45.0).rem_euclid(8);
        Self::COMPASS[sector as usize]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindDirection::North => "North",
            WindDirection::Northeast => "Northeast",
            WindDirection::East => "East",
            WindDirection::Southeast => "Southeast",
            WindDirection::South => "South",
            WindDirection::Southwest => "Southwest",
            WindDirection::West => "West",
            WindDirection::Northwest => "Northwest",
        }
    }
}

impl fmt::Display for WindDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wind gust reading. Rendered as `N/A` when the provider reported none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindGust {
    Measured(i64),
    Unavailable,
}

impl WindGust {
    pub fn is_available(&self) -> bool {
        matches!(self, WindGust::Measured(_))
    }
}

impl fmt::Display for WindGust {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindGust::Measured(value) => write!(f, "{value}"),
            WindGust::Unavailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

pub const NOT_AVAILABLE: &str = "N/A";

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Wall-clock decomposition of the observation timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservedAt {
    pub year: i32,
    /// 1-based.
    pub month: u32,
    pub day: u32,
    /// 0..=23.
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl ObservedAt {
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
        }
    }

    /// Last two digits of the year, without padding (2005 gives `5`).
    pub fn year_short(&self) -> i32 {
        self.year.rem_euclid(100)
    }

    pub fn month_padded(&self) -> String {
        format!("{:02}", self.month)
    }

    pub fn month_abbreviation(&self) -> &'static str {
        MONTH_ABBREVIATIONS[self.month_index()]
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[self.month_index()]
    }

    pub fn day_padded(&self) -> String {
        format!("{:02}", self.day)
    }

    /// Hour of day on the 24-hour clock, except midnight which shows as 12.
    pub fn display_hour(&self) -> u32 {
        if self.hour == 0 { 12 } else { self.hour }
    }

    /// Hour on the 12-hour clock.
    pub fn hour12(&self) -> u32 {
        match self.hour {
            0 => 12,
            h if h > 12 => h - 12,
            h => h,
        }
    }

    pub fn minute_padded(&self) -> String {
        format!("{:02}", self.minute)
    }

    pub fn second_padded(&self) -> String {
        format!("{:02}", self.second)
    }

    pub fn is_pm(&self) -> bool {
        self.hour >= 12
    }

    pub fn meridiem_upper(&self) -> &'static str {
        if self.is_pm() { "PM" } else { "AM" }
    }

    pub fn meridiem_lower(&self) -> &'static str {
        if self.is_pm() { "pm" } else { "am" }
    }

    fn month_index(&self) -> usize {
        (self.month.clamp(1, 12) - 1) as usize
    }
}

/// One normalized weather reading.
///
/// Built once per fetch and discarded after rendering; every field is a pure
/// function of the raw payload, the unit system and the display time zone.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    pub condition: String,
    pub icon_url: String,
    pub temp: i64,
    pub feels_like: i64,
    pub temp_min: i64,
    pub temp_max: i64,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub sea_level_pressure: Option<f64>,
    pub ground_level_pressure: Option<f64>,
    pub visibility: Option<f64>,
    pub wind_speed: i64,
    pub wind_direction: WindDirection,
    pub wind_gust: WindGust,
    pub observed: ObservedAt,
    /// `HH:MM:SS`
    pub sunrise: String,
    /// `HH:MM:SS`
    pub sunset: String,
    pub location_name: String,
}

impl WeatherSnapshot {
    /// Derive a snapshot from raw provider values.
    ///
    /// Returns `None` if one of the timestamps is outside chrono's range.
    pub fn derive<Tz>(raw: &RawObservation, units: UnitSystem, tz: &Tz) -> Option<Self>
    where
        Tz: TimeZone,
        Tz::Offset: fmt::Display,
    {
        let observed = tz.timestamp_opt(raw.observed_at, 0).single()?;
        let sunrise = tz.timestamp_opt(raw.sunrise, 0).single()?;
        let sunset = tz.timestamp_opt(raw.sunset, 0).single()?;

        Some(Self {
            condition: title_case(&raw.description),
            icon_url: raw.icon_url.clone(),
            temp: round_half_up(raw.temp),
            feels_like: round_half_up(raw.feels_like),
            temp_min: round_half_up(raw.temp_min),
            temp_max: round_half_up(raw.temp_max),
            pressure: raw.pressure,
            humidity: raw.humidity,
            sea_level_pressure: raw.sea_level,
            ground_level_pressure: raw.ground_level,
            visibility: raw.visibility,
            wind_speed: convert_wind(raw.wind_speed, units),
            wind_direction: WindDirection::from_degrees(raw.wind_deg),
            wind_gust: raw
                .wind_gust
                .map_or(WindGust::Unavailable, |gust| WindGust::Measured(convert_wind(gust, units))),
            observed: ObservedAt::from_datetime(&observed),
            sunrise: sunrise.format("%H:%M:%S").to_string(),
            sunset: sunset.format("%H:%M:%S").to_string(),
            location_name: raw.location_name.clone(),
        })
    }
}

/// Rounds half-way cases toward positive infinity (`-2.5` gives `-2`).
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Metric speeds arrive in m/s and are shown in km/h; other systems pass through.
pub fn convert_wind(speed: f64, units: UnitSystem) -> i64 {
    match units {
        UnitSystem::Metric => round_half_up(speed * 3.6),
        UnitSystem::Standard | UnitSystem::Imperial => round_half_up(speed),
    }
}

/// Upper-cases the first letter of the text and of every word after a whitespace.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = c.is_whitespace();
    }
    out
}
