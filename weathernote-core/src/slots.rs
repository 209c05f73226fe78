use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a configured template.
///
/// The four document slots each own a `%weatherN%` document placeholder and a
/// `weather_current_N` preview marker; the status bar slot owns neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SlotId {
    Format1,
    Format2,
    Format3,
    Format4,
    StatusBar,
}

impl SlotId {
    pub const DOCUMENT: [SlotId; 4] =
        [SlotId::Format1, SlotId::Format2, SlotId::Format3, SlotId::Format4];

    /// Document slot for a 1-based format number.
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(SlotId::Format1),
            2 => Some(SlotId::Format2),
            3 => Some(SlotId::Format3),
            4 => Some(SlotId::Format4),
            _ => None,
        }
    }

    pub fn number(&self) -> Option<u8> {
        match self {
            SlotId::Format1 => Some(1),
            SlotId::Format2 => Some(2),
            SlotId::Format3 => Some(3),
            SlotId::Format4 => Some(4),
            SlotId::StatusBar => None,
        }
    }

    pub fn placeholder(&self) -> Option<&'static str> {
        match self {
            SlotId::Format1 => Some("%weather1%"),
            SlotId::Format2 => Some("%weather2%"),
            SlotId::Format3 => Some("%weather3%"),
            SlotId::Format4 => Some("%weather4%"),
            SlotId::StatusBar => None,
        }
    }

    pub fn marker_class(&self) -> Option<&'static str> {
        match self {
            SlotId::Format1 => Some("weather_current_1"),
            SlotId::Format2 => Some("weather_current_2"),
            SlotId::Format3 => Some("weather_current_3"),
            SlotId::Format4 => Some("weather_current_4"),
            SlotId::StatusBar => None,
        }
    }

    pub fn from_marker_class(class: &str) -> Option<Self> {
        SlotId::DOCUMENT
            .into_iter()
            .find(|slot| slot.marker_class() == Some(class))
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number() {
            Some(n) => write!(f, "Format {n}"),
            None => f.write_str("Statusbar"),
        }
    }
}
