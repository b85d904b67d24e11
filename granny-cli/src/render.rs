use granny_core::{AdvisorState, TemperatureUnit, UserSettings, schedule::Notification};
use std::{fmt::Write, time::Duration};

pub fn advice(state: &AdvisorState) -> String {
    let mut out = String::new();
    let unit = state.settings.temperature_unit;

    if let Some(snapshot) = &state.snapshot {
        let _ = writeln!(
            out,
            "{}: {:.1}{} ({})",
            snapshot.location,
            unit.convert_celsius(snapshot.temperature_celsius),
            unit.symbol(),
            snapshot.description,
        );
    }
    let _ = writeln!(out, "\n  \"{}\"\n", state.message);
    if let Some(error) = &state.error {
        let _ = writeln!(out, "note: {error}");
    }
    out
}

pub fn settings(settings: &UserSettings) -> String {
    let location = if settings.automatic_location {
        format!("automatic (fallback: {})", settings.manual_location)
    } else {
        settings.manual_location.clone()
    };

    let rows = [
        ("language", settings.language.clone()),
        (
            "reminder",
            format!("{:02}:{:02}", settings.notification_hour, settings.notification_minute),
        ),
        ("tone", settings.advice_tone.to_string().to_lowercase()),
        ("unit", settings.temperature_unit.to_string().to_lowercase()),
        ("threshold", format!("{}°C", settings.threshold_delta)),
        ("voice", settings.voice_notifications.to_string()),
        ("avatar", settings.granny_avatar.clone()),
        ("theme", settings.background_theme.clone()),
        ("location", location),
    ];

    rows.iter().fold(String::new(), |mut out, (k, v)| {
        let _ = writeln!(out, "{k:<10} {v}");
        out
    })
}

/// The remembered baseline, stored in Celsius, shown in `unit`.
pub fn memory(yesterday_celsius: Option<f64>, unit: TemperatureUnit) -> String {
    match yesterday_celsius {
        Some(t) => format!("Yesterday's temperature: {:.1}{}", unit.convert_celsius(t), unit.symbol()),
        None => "No temperature remembered yet.".to_string(),
    }
}

pub fn next_reminder(delay: Duration) -> String {
    let mins = delay.as_secs().div_ceil(60);
    format!("Next reminder in {}h {:02}m. Press Ctrl-C to stop.", mins / 60, mins % 60)
}

pub fn notification(n: &Notification) -> String {
    format!("[{}] Granny Weather: {}", n.fired_at.format("%Y-%m-%d %H:%M"), n.message)
}
