//! The refresh unit of work: fetch, compare, advise, conditionally persist.

use parking_lot::{Mutex, RwLock};
use rand::{SeedableRng, rngs::StdRng};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::{
    advice::AdviceGenerator,
    comparison::{compare, should_persist},
    model::{LocationQuery, TemperatureComparison, UserSettings, WeatherSnapshot},
    provider::WeatherProvider,
    schedule::{DAILY_IDENTITY, InvalidTime, NotificationScheduler, NotificationTime},
    store::{SettingsStore, StoreError, TemperatureMemory},
};

pub const LOADING_MESSAGE: &str = "Loading weather advice...";

/// What a presentation layer renders. Replaced as a whole after each change.
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorState {
    pub snapshot: Option<WeatherSnapshot>,
    pub message: String,
    pub settings: UserSettings,
    pub loading: bool,
    pub error: Option<String>,
}

impl AdvisorState {
    fn initial(settings: UserSettings) -> Self {
        Self {
            snapshot: None,
            message: LOADING_MESSAGE.to_string(),
            settings,
            loading: true,
            error: None,
        }
    }
}

/// Result of one refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshOutcome {
    pub snapshot: WeatherSnapshot,
    /// Celsius comparison against the baseline read before this refresh.
    pub comparison: Option<TemperatureComparison>,
    pub message: String,
    /// Whether today's reading replaced the stored baseline.
    pub persisted: bool,
    /// Whether the provider failed and mock data was used instead.
    pub fallback: bool,
}

pub struct Advisor {
    provider: Box<dyn WeatherProvider>,
    settings: Arc<dyn SettingsStore>,
    memory: Arc<dyn TemperatureMemory>,
    generator: AdviceGenerator,
    rng: Mutex<StdRng>,
    state: RwLock<AdvisorState>,
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("provider", &self.provider)
            .field("settings", &self.settings)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

impl Advisor {
    pub fn new(
        provider: Box<dyn WeatherProvider>,
        settings: Arc<dyn SettingsStore>,
        memory: Arc<dyn TemperatureMemory>,
    ) -> Self {
        let state = AdvisorState::initial(settings.load());
        Self {
            provider,
            settings,
            memory,
            generator: AdviceGenerator::default(),
            rng: Mutex::new(StdRng::from_entropy()),
            state: RwLock::new(state),
        }
    }

    pub fn with_generator(mut self, generator: AdviceGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Pin the random draw, e.g. `StdRng::seed_from_u64(42)` in tests.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn state(&self) -> AdvisorState {
        self.state.read().clone()
    }

    /// Refresh for the location configured in settings.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refresh_for(None).await
    }

    /// Refresh, optionally overriding the configured location for this run only.
    ///
    /// An overridden run reads the stored baseline but never replaces it; the
    /// single "yesterday" slot belongs to the configured location.
    pub async fn refresh_for(&self, location: Option<LocationQuery>) -> RefreshOutcome {
        {
            let mut state = self.state.write();
            state.loading = true;
            state.error = None;
        }

        let settings = self.settings.load();
        let one_off = location.is_some();
        let query = location.unwrap_or_else(|| settings.location_query());

        let (snapshot, mut error) = match self.provider.current(&query).await {
            Ok(snapshot) => (snapshot, None),
            Err(err) => {
                warn!(location = %query, error = %format!("{err:#}"), "weather provider failed, using mock data");
                let place = match &query {
                    LocationQuery::Manual(name) if one_off => name.clone(),
                    _ => settings.manual_location.clone(),
                };
                (
                    WeatherSnapshot::fallback(place),
                    Some(format!("Weather provider unavailable: {err:#}")),
                )
            }
        };
        let fallback = error.is_some();

        let comparison = compare(snapshot.temperature_celsius, self.memory.load());
        let displayed = comparison.map(|c| c.in_unit(settings.temperature_unit));
        let message = self.generator.generate(
            snapshot.condition,
            displayed.as_ref(),
            settings.advice_tone,
            settings.temperature_unit,
            &mut *self.rng.lock(),
        );

        let persisted = if one_off {
            false
        } else if should_persist(comparison.as_ref(), settings.threshold_delta) {
            match self.memory.save(snapshot.temperature_celsius) {
                Ok(()) => true,
                Err(err) => {
                    warn!(error = %err, "failed to persist today's temperature");
                    error = Some(err.to_string());
                    false
                }
            }
        } else {
            false
        };

        info!(
            location = %snapshot.location,
            temperature_c = snapshot.temperature_celsius,
            condition = %snapshot.condition,
            delta = comparison.map(|c| c.delta),
            persisted,
            fallback,
            "weather refreshed"
        );

        *self.state.write() = AdvisorState {
            snapshot: Some(snapshot.clone()),
            message: message.clone(),
            settings,
            loading: false,
            error,
        };

        RefreshOutcome { snapshot, comparison, message, persisted, fallback }
    }

    /// Replace all settings at once.
    pub fn save_settings(&self, settings: UserSettings) -> Result<(), StoreError> {
        self.settings.save(&settings)?;
        self.state.write().settings = settings;
        Ok(())
    }

    /// Arm the daily reminder with the current message at the configured time,
    /// replacing any reminder already armed.
    pub fn schedule_daily(&self, scheduler: &NotificationScheduler) -> Result<Duration, InvalidTime> {
        let state = self.state();
        let time = NotificationTime::new(
            state.settings.notification_hour,
            state.settings.notification_minute,
        )?;
        Ok(scheduler.schedule(DAILY_IDENTITY, time, state.message))
    }
}
