use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::Path, path::PathBuf, time::Duration};

use crate::{error::CommandError, slots::SlotId};

/// Unit system passed through to the provider's `units` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnitSystem {
    Standard,
    #[default]
    Metric,
    Imperial,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Standard => "standard",
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [UnitSystem] {
        &[UnitSystem::Standard, UnitSystem::Metric, UnitSystem::Imperial]
    }
}

impl fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for UnitSystem {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "standard" => Ok(UnitSystem::Standard),
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            _ => Err(anyhow!(
                "Unknown unit system '{value}'. Supported: standard, metric, imperial."
            )),
        }
    }
}

impl TryFrom<String> for UnitSystem {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        UnitSystem::try_from(value.as_str())
    }
}

impl From<UnitSystem> for String {
    fn from(value: UnitSystem) -> Self {
        value.as_str().to_string()
    }
}

/// How often the status strip (and mounted previews) refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum RefreshInterval {
    EveryMinute,
    Every5Minutes,
    Every10Minutes,
    #[default]
    Every15Minutes,
    Every20Minutes,
    Every30Minutes,
    Hourly,
}

impl RefreshInterval {
    pub const fn all() -> &'static [RefreshInterval] {
        &[
            RefreshInterval::EveryMinute,
            RefreshInterval::Every5Minutes,
            RefreshInterval::Every10Minutes,
            RefreshInterval::Every15Minutes,
            RefreshInterval::Every20Minutes,
            RefreshInterval::Every30Minutes,
            RefreshInterval::Hourly,
        ]
    }

    pub fn minutes(&self) -> u32 {
        match self {
            RefreshInterval::EveryMinute => 1,
            RefreshInterval::Every5Minutes => 5,
            RefreshInterval::Every10Minutes => 10,
            RefreshInterval::Every15Minutes => 15,
            RefreshInterval::Every20Minutes => 20,
            RefreshInterval::Every30Minutes => 30,
            RefreshInterval::Hourly => 60,
        }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.minutes()) * 60)
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshInterval::EveryMinute => f.write_str("Every Minute"),
            RefreshInterval::Hourly => f.write_str("Every Hour"),
            other => write!(f, "Every {} Minutes", other.minutes()),
        }
    }
}

impl TryFrom<u32> for RefreshInterval {
    type Error = anyhow::Error;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        RefreshInterval::all()
            .iter()
            .copied()
            .find(|interval| interval.minutes() == minutes)
            .ok_or_else(|| {
                anyhow!("Unsupported update frequency {minutes}. Choose 1, 5, 10, 15, 20, 30 or 60.")
            })
    }
}

impl From<RefreshInterval> for u32 {
    fn from(value: RefreshInterval) -> Self {
        value.minutes()
    }
}

/// Everything needed for one provider round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub location: String,
    pub api_key: String,
    pub units: UnitSystem,
}

pub const DEFAULT_FORMAT_1: &str = "%desc% • Current Temp: %temp%°C • Feels Like: %feels%°C\n";
pub const DEFAULT_FORMAT_2: &str = "%name%: %dateMonth4% %dateDay2% - %timeH2%:%timeM% %ampm1%\nCurrent Temp: %temp%°C • Feels Like: %feels%°C\nWind: %wind-speed% Km/h from the %wind-dir%^ with gusts up to %wind-gust% Km/h^\nSunrise: %sunrise% • Sunset: %sunset%\n";
pub const DEFAULT_FORMAT_3: &str = "%icon%&nbsp;%dateMonth4% %dateDay2% %dateYear1% • %timeH2%:%timeM% %ampm1% • %desc%<br>&nbsp;Recorded Temp: %temp% • Felt like: %feels%<br>&nbsp;Wind: %wind-speed% Km/h from the %wind-dir%^ with gusts up to %wind-gust% Km/h^<br>&nbsp;Sunrise: %sunrise% • Sunset: %sunset%";
pub const DEFAULT_FORMAT_4: &str = "%icon%&nbsp;%dateMonth4% %dateDay2% %dateYear1% • %timeH2%:%timeM% %ampm1% • %desc%<br>&nbsp;Current Temp: %temp% • Feels like: %feels%<br>&nbsp;Wind: %wind-speed% Km/h from the %wind-dir%^ with gusts up to %wind-gust% Km/h^<br>&nbsp;Sunrise: %sunrise% • Sunset: %sunset%";
pub const DEFAULT_STATUSBAR_FORMAT: &str =
    " | %desc% | Current Temp: %temp%°C | Feels Like: %feels%°C | ";

/// User settings stored on disk.
///
/// Example TOML:
/// ```toml
/// location = "edmonton"
/// api_key = "..."
/// units = "metric"
/// update_frequency = 15
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub location: String,
    pub api_key: String,
    pub units: UnitSystem,
    pub format1: String,
    pub format2: String,
    pub format3: String,
    pub format4: String,
    pub statusbar_active: bool,
    pub statusbar_format: String,
    pub update_frequency: RefreshInterval,
    /// Documents directly inside this folder are templates and never get substituted.
    pub template_folder: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            location: String::new(),
            api_key: String::new(),
            units: UnitSystem::default(),
            format1: DEFAULT_FORMAT_1.to_string(),
            format2: DEFAULT_FORMAT_2.to_string(),
            format3: DEFAULT_FORMAT_3.to_string(),
            format4: DEFAULT_FORMAT_4.to_string(),
            statusbar_active: true,
            statusbar_format: DEFAULT_STATUSBAR_FORMAT.to_string(),
            update_frequency: RefreshInterval::default(),
            template_folder: "Templates".to_string(),
        }
    }
}

impl Settings {
    /// Both location and API key are set.
    pub fn has_credentials(&self) -> bool {
        !self.location.trim().is_empty() && !self.api_key.trim().is_empty()
    }

    pub fn fetch_request(&self) -> Result<FetchRequest, CommandError> {
        if !self.has_credentials() {
            return Err(CommandError::ConfigMissing);
        }

        Ok(FetchRequest {
            location: self.location.trim().to_string(),
            api_key: self.api_key.trim().to_string(),
            units: self.units,
        })
    }

    /// Template text configured for a slot.
    pub fn format(&self, slot: SlotId) -> &str {
        match slot {
            SlotId::Format1 => &self.format1,
            SlotId::Format2 => &self.format2,
            SlotId::Format3 => &self.format3,
            SlotId::Format4 => &self.format4,
            SlotId::StatusBar => &self.statusbar_format,
        }
    }

    pub fn set_format(&mut self, slot: SlotId, template: String) {
        match slot {
            SlotId::Format1 => self.format1 = template,
            SlotId::Format2 => self.format2 = template,
            SlotId::Format3 => self.format3 = template,
            SlotId::Format4 => self.format4 = template,
            SlotId::StatusBar => self.statusbar_format = template,
        }
    }

    /// Document slots whose template is not empty, in slot order.
    pub fn configured_slots(&self) -> impl Iterator<Item = SlotId> + '_ {
        SlotId::DOCUMENT
            .iter()
            .copied()
            .filter(|slot| !self.format(*slot).is_empty())
    }

    /// Load settings from the platform config file, or defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Save settings to the platform config file, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weathernote", "weathernote")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
