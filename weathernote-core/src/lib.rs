//! Core library for the `weathernote` CLI.
//!
//! This crate defines:
//! - Settings persistence and the fetch request derived from them
//! - A fetcher abstraction over the OpenWeather current-conditions API
//! - Weather snapshots and the `%placeholder%` template renderer
//! - Refresh orchestration across the status strip, documents and previews
//!
//! Hosts plug in through the [`DocumentHost`] and [`StatusSurface`] traits.

pub mod config;
pub mod debounce;
pub mod error;
pub mod host;
pub mod model;
pub mod orchestrator;
pub mod provider;
pub mod slots;
pub mod template;

pub use config::{FetchRequest, RefreshInterval, Settings, UnitSystem};
pub use error::{CommandError, FetchError};
pub use host::{ActiveDocument, DocumentHost, StatusSurface, ViewMode};
pub use model::{ObservedAt, WeatherSnapshot};
pub use orchestrator::{
    LifecycleEvent, Picker, PickerAction, PickerEntry, RefreshOrchestrator, StatusRefresh,
};
pub use provider::{DisplayZone, FetcherConfig, OpenWeatherFetcher, WeatherFetcher};
pub use slots::SlotId;
pub use template::{UNAVAILABLE_MESSAGE, render, render_outcome};
