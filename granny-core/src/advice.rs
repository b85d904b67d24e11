//! Granny's advice: a delta summary, a condition line and one tone line.

use rand::Rng;
use std::collections::HashMap;
use thiserror::Error;

use crate::model::{AdviceTone, TemperatureComparison, TemperatureUnit, WeatherCondition};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("Tone {0} has no advice lines")]
    Empty(AdviceTone),
    #[error("Tone {0} is missing from the advice pools")]
    Missing(AdviceTone),
}

/// Fixed advice line for each weather condition.
pub fn condition_line(condition: WeatherCondition) -> &'static str {
    match condition {
        WeatherCondition::Snowy => "Wrap up warm, sweetie!",
        WeatherCondition::Sunny => "No need for a heavy coat today, dear!",
        WeatherCondition::Windy => "Hold onto your hat, love!",
        WeatherCondition::Rainy => "Take an umbrella, or you'll catch a cold!",
        WeatherCondition::Cloudy => "It is a bit gloomy, bring a light layer.",
        WeatherCondition::Unknown => "Check the sky once more before leaving.",
    }
}

/// Summary of the comparison, in whatever unit the comparison is expressed.
pub fn delta_line(comparison: Option<&TemperatureComparison>, unit: TemperatureUnit) -> String {
    let Some(c) = comparison else {
        return "No comparison with yesterday yet.".to_string();
    };

    let rounded = c.delta.abs().round() as i64;
    let symbol = unit.symbol();

    if c.delta > 0.0 {
        format!("{rounded}{symbol} warmer than yesterday.")
    } else if c.delta < 0.0 {
        format!("{rounded}{symbol} colder than yesterday.")
    } else {
        "same as yesterday.".to_string()
    }
}

/// Lines granny picks from, one ordered list per tone.
///
/// Every tone is guaranteed to own at least one line.
#[derive(Debug, Clone)]
pub struct TonePools {
    pools: HashMap<AdviceTone, Vec<String>>,
}

impl TonePools {
    pub fn new(pools: HashMap<AdviceTone, Vec<String>>) -> Result<Self, PoolError> {
        for tone in AdviceTone::all() {
            match pools.get(tone) {
                None => return Err(PoolError::Missing(*tone)),
                Some(lines) if lines.is_empty() => return Err(PoolError::Empty(*tone)),
                Some(_) => {}
            }
        }
        Ok(Self { pools })
    }

    pub fn lines(&self, tone: AdviceTone) -> &[String] {
        self.pools.get(&tone).map(Vec::as_slice).unwrap_or_default()
    }

    fn pick<R: Rng + ?Sized>(&self, tone: AdviceTone, rng: &mut R) -> &str {
        let lines = self.lines(tone);
        // non-empty by construction
        match lines.len() {
            0 => "",
            n => lines[rng.gen_range(0..n)].as_str(),
        }
    }
}

impl Default for TonePools {
    fn default() -> Self {
        let owned = |lines: &[&str]| lines.iter().map(|l| l.to_string()).collect::<Vec<_>>();

        let pools = HashMap::from([
            (
                AdviceTone::Playful,
                owned(&[
                    "And do not skip breakfast, your tummy will protest!",
                    "Pack a snack, you always forget and then get grumpy.",
                    "Take sunglasses, dramatic squinting is not a style.",
                ]),
            ),
            (
                AdviceTone::Concerned,
                owned(&[
                    "Please keep water with you and text when you arrive.",
                    "Do not stay outside too long if weather gets rough.",
                    "Take care of your throat; cold winds sneak up quickly.",
                ]),
            ),
            (
                AdviceTone::Caring,
                owned(&[
                    "And don't forget your tea, it keeps you warm.",
                    "A small scarf in your bag can save the day.",
                    "Remember to rest a little this evening, dear.",
                ]),
            ),
        ]);

        Self { pools }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdviceGenerator {
    pools: TonePools,
}

impl AdviceGenerator {
    pub fn new(pools: TonePools) -> Self {
        Self { pools }
    }

    pub fn pools(&self) -> &TonePools {
        &self.pools
    }

    /// Build the advice message.
    ///
    /// `comparison` must already be expressed in `unit`; see
    /// [`TemperatureComparison::in_unit`].
    pub fn generate<R: Rng + ?Sized>(
        &self,
        condition: WeatherCondition,
        comparison: Option<&TemperatureComparison>,
        tone: AdviceTone,
        unit: TemperatureUnit,
        rng: &mut R,
    ) -> String {
        let parts = [
            delta_line(comparison, unit),
            condition_line(condition).to_string(),
            self.pools.pick(tone, rng).to_string(),
        ];

        parts.join(" ").trim().to_string()
    }
}
