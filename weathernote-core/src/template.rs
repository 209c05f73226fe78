//! Placeholder expansion for weather templates.
//!
//! A template is free text with `%name%` placeholders and optional
//! `^...^` spans that only survive when wind gust data is available.
//! Rendering is total: unknown placeholders and unpaired carets pass through.

use crate::{
    error::FetchError,
    model::{NOT_AVAILABLE, WeatherSnapshot},
};

/// Rendered in place of a template when no snapshot could be fetched.
pub const UNAVAILABLE_MESSAGE: &str =
    "Weather: Error encountered getting weather, check your settings...";

/// Recognized placeholder names, matched case-sensitively between `%` signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Description,
    Icon,
    Temp,
    FeelsLike,
    TempMin,
    TempMax,
    Pressure,
    Humidity,
    SeaLevelPressure,
    GroundLevelPressure,
    Visibility,
    WindSpeed,
    WindDirection,
    WindGust,
    Year,
    YearShort,
    Month,
    MonthPadded,
    MonthAbbreviation,
    MonthName,
    Day,
    DayPadded,
    MeridiemUpper,
    MeridiemLower,
    DisplayHour,
    Hour12,
    Minute,
    Second,
    Sunrise,
    Sunset,
    LocationName,
}

impl Placeholder {
    pub const ALL: [Placeholder; 31] = [
        Placeholder::Description,
        Placeholder::Icon,
        Placeholder::Temp,
        Placeholder::FeelsLike,
        Placeholder::TempMin,
        Placeholder::TempMax,
        Placeholder::Pressure,
        Placeholder::Humidity,
        Placeholder::SeaLevelPressure,
        Placeholder::GroundLevelPressure,
        Placeholder::Visibility,
        Placeholder::WindSpeed,
        Placeholder::WindDirection,
        Placeholder::WindGust,
        Placeholder::Year,
        Placeholder::YearShort,
        Placeholder::Month,
        Placeholder::MonthPadded,
        Placeholder::MonthAbbreviation,
        Placeholder::MonthName,
        Placeholder::Day,
        Placeholder::DayPadded,
        Placeholder::MeridiemUpper,
        Placeholder::MeridiemLower,
        Placeholder::DisplayHour,
        Placeholder::Hour12,
        Placeholder::Minute,
        Placeholder::Second,
        Placeholder::Sunrise,
        Placeholder::Sunset,
        Placeholder::LocationName,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::Description => "desc",
            Placeholder::Icon => "icon",
            Placeholder::Temp => "temp",
            Placeholder::FeelsLike => "feels",
            Placeholder::TempMin => "tempmin",
            Placeholder::TempMax => "tempmax",
            Placeholder::Pressure => "pressure",
            Placeholder::Humidity => "humidity",
            Placeholder::SeaLevelPressure => "pressure-sl",
            Placeholder::GroundLevelPressure => "pressure-gl",
            Placeholder::Visibility => "visibility",
            Placeholder::WindSpeed => "wind-speed",
            Placeholder::WindDirection => "wind-dir",
            Placeholder::WindGust => "wind-gust",
            Placeholder::Year => "dateYear1",
            Placeholder::YearShort => "dateYear2",
            Placeholder::Month => "dateMonth1",
            Placeholder::MonthPadded => "dateMonth2",
            Placeholder::MonthAbbreviation => "dateMonth3",
            Placeholder::MonthName => "dateMonth4",
            Placeholder::Day => "dateDay1",
            Placeholder::DayPadded => "dateDay2",
            Placeholder::MeridiemUpper => "ampm1",
            Placeholder::MeridiemLower => "ampm2",
            Placeholder::DisplayHour => "timeH1",
            Placeholder::Hour12 => "timeH2",
            Placeholder::Minute => "timeM",
            Placeholder::Second => "timeS",
            Placeholder::Sunrise => "sunrise",
            Placeholder::Sunset => "sunset",
            Placeholder::LocationName => "name",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// `%name%` as it appears in a template.
    pub fn token(&self) -> String {
        format!("%{}%", self.name())
    }

    fn value(&self, s: &WeatherSnapshot) -> String {
        let at = &s.observed;
        match self {
            Placeholder::Description => s.condition.clone(),
            Placeholder::Icon => format!("<img src={} />", s.icon_url),
            Placeholder::Temp => s.temp.to_string(),
            Placeholder::FeelsLike => s.feels_like.to_string(),
            Placeholder::TempMin => s.temp_min.to_string(),
            Placeholder::TempMax => s.temp_max.to_string(),
            Placeholder::Pressure => optional(s.pressure),
            Placeholder::Humidity => optional(s.humidity),
            Placeholder::SeaLevelPressure => optional(s.sea_level_pressure),
            Placeholder::GroundLevelPressure => optional(s.ground_level_pressure),
            Placeholder::Visibility => optional(s.visibility),
            Placeholder::WindSpeed => s.wind_speed.to_string(),
            Placeholder::WindDirection => s.wind_direction.to_string(),
            Placeholder::WindGust => s.wind_gust.to_string(),
            Placeholder::Year => at.year.to_string(),
            Placeholder::YearShort => at.year_short().to_string(),
            Placeholder::Month => at.month.to_string(),
            Placeholder::MonthPadded => at.month_padded(),
            Placeholder::MonthAbbreviation => at.month_abbreviation().to_string(),
            Placeholder::MonthName => at.month_name().to_string(),
            Placeholder::Day => at.day.to_string(),
            Placeholder::DayPadded => at.day_padded(),
            Placeholder::MeridiemUpper => at.meridiem_upper().to_string(),
            Placeholder::MeridiemLower => at.meridiem_lower().to_string(),
            Placeholder::DisplayHour => at.display_hour().to_string(),
            Placeholder::Hour12 => at.hour12().to_string(),
            Placeholder::Minute => at.minute_padded(),
            Placeholder::Second => at.second_padded(),
            Placeholder::Sunrise => s.sunrise.clone(),
            Placeholder::Sunset => s.sunset.clone(),
            Placeholder::LocationName => s.location_name.clone(),
        }
    }
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Render a fetch outcome, short-circuiting to [`UNAVAILABLE_MESSAGE`] on failure.
pub fn render_outcome(outcome: &Result<WeatherSnapshot, FetchError>, template: &str) -> String {
    match outcome {
        Ok(snapshot) => render(snapshot, template),
        Err(_) => UNAVAILABLE_MESSAGE.to_string(),
    }
}

/// Expand every placeholder and gust span of `template` against `snapshot`.
pub fn render(snapshot: &WeatherSnapshot, template: &str) -> String {
    let resolved = resolve_gust_spans(template, snapshot.wind_gust.is_available());
    substitute(snapshot, &resolved)
}

/// Single left-to-right pass, so substituted values are never re-expanded.
fn substitute(snapshot: &WeatherSnapshot, template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(open) = rest.find('%') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let known = after
            .find('%')
            .and_then(|close| Placeholder::from_name(&after[..close]).map(|p| (p, close)));

        match known {
            Some((placeholder, close)) => {
                out.push_str(&placeholder.value(snapshot));
                rest = &after[close + 1..];
            }
            None => {
                out.push('%');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Keep (without carets) or drop every `^...^` span.
///
/// Spans pair up lazily, hold at least one character and never cross a line
/// break; a caret without a partner is left as is.
fn resolve_gust_spans(template: &str, keep: bool) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('^') {
        let after = &rest[open + 1..];
        match closing_caret(after) {
            Some(close) => {
                out.push_str(&rest[..open]);
                if keep {
                    out.push_str(&after[..close]);
                }
                rest = &after[close + 1..];
            }
            None => {
                out.push_str(&rest[..=open]);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn closing_caret(text: &str) -> Option<usize> {
    let first = text.chars().next()?;
    if is_line_break(first) {
        return None;
    }

    let start = first.len_utf8();
    for (i, c) in text[start..].char_indices() {
        if c == '^' {
            return Some(start + i);
        }
        if is_line_break(c) {
            return None;
        }
    }
    None
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::UnitSystem,
        model::{RawObservation, WindGust, tests::raw_observation},
    };
    use chrono::Utc;

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot::derive(&raw_observation(), UnitSystem::Metric, &Utc).expect("in range")
    }

    fn snapshot_without_gust() -> WeatherSnapshot {
        let raw = RawObservation { wind_gust: None, ..raw_observation() };
        WeatherSnapshot::derive(&raw, UnitSystem::Metric, &Utc).expect("in range")
    }

    #[test]
    fn end_to_end_description_and_temperatures() {
        let snapshot = WeatherSnapshot { temp: 15, feels_like: 14, ..snapshot() };
        assert_eq!(
            render(&snapshot, "%desc% - %temp%C feels %feels%C"),
            "Light Rain - 15C feels 14C"
        );
    }

    #[test]
    fn every_occurrence_is_replaced() {
        assert_eq!(render(&snapshot(), "%temp%/%temp%/%temp%"), "15/15/15");
    }

    #[test]
    fn all_recognized_placeholders_are_consumed() {
        let tokens: Vec<String> = Placeholder::ALL.iter().map(Placeholder::token).collect();
        let template = tokens.join(" ");
        let rendered = render(&snapshot(), &template);

        for placeholder in Placeholder::ALL {
            assert!(
                !rendered.contains(&placeholder.token()),
                "{} left in {rendered}",
                placeholder.token()
            );
        }
    }

    #[test]
    fn unknown_tokens_pass_through() {
        assert_eq!(
            render(&snapshot(), "%weather1% %Temp% 100% %temp%"),
            "%weather1% %Temp% 100% 15"
        );
        assert_eq!(render(&snapshot(), "50%% %foo %name%"), "50%% %foo Zocca");
    }

    #[test]
    fn icon_renders_as_image_markup() {
        assert_eq!(
            render(&snapshot(), "%icon%"),
            "<img src=https://openweathermap.org/img/w/10d.png />"
        );
    }

    #[test]
    fn date_and_time_fields() {
        let rendered = render(
            &snapshot(),
            "%dateYear1%-%dateYear2% %dateMonth1%/%dateMonth2%/%dateMonth3%/%dateMonth4% \
             %dateDay1%/%dateDay2% %timeH1%|%timeH2%:%timeM%:%timeS% %ampm1% %ampm2% \
             %sunrise%-%sunset%",
        );
        assert_eq!(
            rendered,
            "2022-22 8/08/Aug/August 30/30 14|2:43:12 PM pm 04:36:27-17:57:28"
        );
    }

    #[test]
    fn optional_values_render_or_fall_back() {
        assert_eq!(
            render(&snapshot(), "%pressure% %humidity% %pressure-sl% %pressure-gl% %visibility%"),
            "1015 64 1015 N/A 10000"
        );
    }

    #[test]
    fn gust_span_kept_without_carets() {
        let rendered = render(
            &snapshot(),
            "Wind: %wind-speed% from the %wind-dir%^ with gusts up to %wind-gust%^.",
        );
        assert_eq!(rendered, "Wind: 36 from the North with gusts up to 18.");
    }

    #[test]
    fn gust_span_dropped_when_unavailable() {
        let snapshot = snapshot_without_gust();
        assert_eq!(snapshot.wind_gust, WindGust::Unavailable);

        let rendered = render(
            &snapshot,
            "Wind: %wind-speed% from the %wind-dir%^ with gusts up to %wind-gust%^.",
        );
        assert_eq!(rendered, "Wind: 36 from the North.");
    }

    #[test]
    fn multiple_spans_resolve_independently() {
        let template = "a^ g=%wind-gust%^ b ^[%wind-gust%]^ c";
        assert_eq!(render(&snapshot(), template), "a g=18 b [18] c");
        assert_eq!(render(&snapshot_without_gust(), template), "a b  c");
    }

    #[test]
    fn spans_do_not_cross_lines_and_unpaired_carets_survive() {
        let template = "x^ one\ntwo^ y";
        assert_eq!(render(&snapshot_without_gust(), template), template);
        assert_eq!(render(&snapshot_without_gust(), "a ^lone"), "a ^lone");
        assert_eq!(render(&snapshot_without_gust(), "^^"), "^^");
        assert_eq!(render(&snapshot_without_gust(), "^^x^"), "");
    }

    #[test]
    fn failed_fetch_short_circuits() {
        let outcome = Err(FetchError::MissingCredentials);
        assert_eq!(render_outcome(&outcome, "%temp%"), UNAVAILABLE_MESSAGE);
        assert_eq!(render_outcome(&Ok(snapshot()), "%temp%"), "15");
    }
}
