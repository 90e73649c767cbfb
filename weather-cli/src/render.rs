use chrono::{DateTime, Local, Utc};
use std::fmt::Write as _;
use weather_core::{City, ForecastView, Metric, Notice, Severity};

const BAR_WIDTH: usize = 24;

pub fn notice(notice: &Notice) -> String {
    match notice.severity {
        Severity::Success => format!("✔ {}", notice.message),
        Severity::Error => format!("✖ {}", notice.message),
    }
}

pub fn card(city: &City) -> String {
    let mut out = String::new();
    let country = city
        .snapshot
        .as_ref()
        .map(|s| s.country.as_str())
        .filter(|c| !c.is_empty())
        .unwrap_or("-");
    let _ = writeln!(out, "{} ({})", city.display_name, country);

    if city.is_loading {
        let _ = write!(out, "  Loading...");
        return out;
    }
    if let Some(err) = &city.error {
        let _ = write!(out, "  {err}");
        return out;
    }

    match &city.snapshot {
        Some(s) => {
            let _ = writeln!(out, "  {}°C  {}  {}", s.temperature_c(), s.condition, s.icon_url());
        }
        None => {
            let _ = writeln!(out, "  There is no data");
        }
    }
    let _ = write!(out, "  Updated: {}", last_updated(city.last_updated));
    out
}

pub fn dashboard(cities: &[City]) -> String {
    if cities.is_empty() {
        return "No cities yet. Add one with `weather-dashboard add <name>`.".to_string();
    }
    cities.iter().map(card).collect::<Vec<_>>().join("\n\n")
}

fn last_updated(at: Option<DateTime<Utc>>) -> String {
    match at {
        Some(at) => at.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "Never".to_string(),
    }
}

pub fn forecast(view: &ForecastView) -> String {
    let snapshot = view.snapshot();
    let mut out = String::new();

    let _ = writeln!(out, "Hourly weather for {}, {}", snapshot.city_name, snapshot.country);

    if view.total_days() == 0 {
        let _ = write!(out, "No hourly forecast data...");
        return out;
    }

    for metric in Metric::charted() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", metric.label());
        out.push_str(&chart(&view.series(*metric)));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Weather every 3 hours");
    for group in view.visible_groups() {
        let _ = writeln!(out, "\n{}", group.label());
        for e in &group.entries {
            let _ = writeln!(
                out,
                "  {:>5}  {:>4}  {:<18} 💨 {} m/s  💧 {}%  📈 {} hPa",
                e.time_label,
                format!("{}°C", e.temp_c),
                e.description,
                e.wind_speed,
                e.humidity,
                e.pressure
            );
        }
    }

    if let Some(next) = view.next_day_label() {
        let _ = write!(
            out,
            "\nMore days available ({} of {} shown). Next: {next}. Use --days {} to see it.",
            view.days_to_show(),
            view.total_days(),
            view.days_to_show() + 1
        );
    }
    out
}

/// One horizontal bar per point, scaled between the series minimum and maximum.
fn chart(series: &[(String, f64)]) -> String {
    let min = series.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let max = series.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;

    let mut out = String::new();
    for (label, value) in series {
        let filled = if span > 0.0 {
            1 + ((value - min) / span * (BAR_WIDTH - 1) as f64).round() as usize
        } else {
            BAR_WIDTH / 2
        };
        let _ = writeln!(out, "  {label:>5} {} {value}", "█".repeat(filled));
    }
    out
}
