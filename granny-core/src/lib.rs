//! Core library for the `granny` weather advisor.
//!
//! This crate defines:
//! - Day-over-day temperature comparison and the baseline update policy
//! - Granny's advice generator
//! - Daily notification scheduling
//! - Settings and temperature memory persistence
//! - Abstraction over weather providers, plus provider credentials
//!
//! It is used by `granny-cli`, but can also be reused by other front ends.

pub mod advice;
pub mod advisor;
pub mod comparison;
pub mod config;
pub mod model;
pub mod provider;
pub mod schedule;
pub mod store;

pub use advice::{AdviceGenerator, TonePools};
pub use advisor::{Advisor, AdvisorState, RefreshOutcome};
pub use config::{Config, ProviderConfig};
pub use model::{
    AdviceTone, LocationQuery, TemperatureComparison, TemperatureUnit, UserSettings,
    WeatherCondition, WeatherSnapshot,
};
pub use provider::{ProviderId, WeatherProvider};
pub use schedule::{NotificationScheduler, NotificationTime, ScheduleState};
pub use store::{SettingsStore, StoreError, TemperatureMemory};
