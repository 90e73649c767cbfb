use chrono::{Datelike, Local, NaiveDate, TimeZone, Timelike};
use std::collections::HashMap;

use crate::model::{ForecastSample, HourlyForecast, WeatherSnapshot, icon_url};

const KELVIN_OFFSET: f64 = 273.15;

/// `round(kelvin - 273.15)`, halves rounded up.
pub fn kelvin_to_celsius(kelvin: f64) -> i32 {
    (kelvin - KELVIN_OFFSET + 0.5).floor() as i32
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntry {
    pub temp_c: i32,
    pub feels_like_c: i32,
    pub wind_speed: f64,
    pub humidity: u8,
    pub pressure: u32,
    pub icon: String,
    pub description: String,
    pub time_label: String,
    pub day: NaiveDate,
}

impl ForecastEntry {
    pub fn from_sample<Tz: TimeZone>(sample: &ForecastSample, tz: &Tz) -> Self {
        let local = sample.timestamp.with_timezone(tz).fixed_offset();

        Self {
            temp_c: kelvin_to_celsius(sample.temperature_k),
            feels_like_c: kelvin_to_celsius(sample.feels_like_k),
            wind_speed: sample.wind_speed,
            humidity: sample.humidity,
            pressure: sample.pressure,
            icon: sample.icon.clone(),
            description: sample.description.clone(),
            time_label: format!("{}:00", local.hour()),
            day: local.date_naive(),
        }
    }

    pub fn icon_url(&self) -> String {
        icon_url(&self.icon)
    }

    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature => f64::from(self.temp_c),
            Metric::FeelsLike => f64::from(self.feels_like_c),
            Metric::WindSpeed => self.wind_speed,
            Metric::Humidity => f64::from(self.humidity),
            Metric::Pressure => f64::from(self.pressure),
        }
    }
}

/// Entries sharing one local calendar date, in chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub day: NaiveDate,
    pub entries: Vec<ForecastEntry>,
}

impl DayGroup {
    /// "1st of January"
    pub fn label(&self) -> String {
        format!("{} of {}", ordinal(self.day.day()), self.day.format("%B"))
    }

    /// "January 1st"
    pub fn short_label(&self) -> String {
        format!("{} {}", self.day.format("%B"), ordinal(self.day.day()))
    }
}

fn ordinal(day: u32) -> String {
    let suffix = match day {
        4..=20 => "th",
        _ => match day % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    };
    format!("{day}{suffix}")
}

/// Convert samples and bucket them by local date in `tz`, keeping input order.
pub fn group<Tz: TimeZone>(samples: &[ForecastSample], tz: &Tz) -> Vec<DayGroup> {
    let mut groups: Vec<DayGroup> = Vec::new();
    let mut index: HashMap<NaiveDate, usize> = HashMap::new();

    for sample in samples {
        let entry = ForecastEntry::from_sample(sample, tz);
        match index.get(&entry.day) {
            Some(&i) => groups[i].entries.push(entry),
            None => {
                index.insert(entry.day, groups.len());
                groups.push(DayGroup {
                    day: entry.day,
                    entries: vec![entry],
                });
            }
        }
    }

    groups
}

/// Chartable series of the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Temperature,
    FeelsLike,
    WindSpeed,
    Humidity,
    Pressure,
}

impl Metric {
    pub const fn charted() -> &'static [Metric] {
        &[
            Metric::Temperature,
            Metric::FeelsLike,
            Metric::WindSpeed,
            Metric::Humidity,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Temperature => "Temperature (°C)",
            Metric::FeelsLike => "Feels Like (°C)",
            Metric::WindSpeed => "Wind speed (m/s)",
            Metric::Humidity => "Humidity (%)",
            Metric::Pressure => "Pressure (hPa)",
        }
    }
}

/// Grouped forecast plus the paging cursor of the detail view.
///
/// `days_to_show` starts at one (or zero when there is nothing to show), only
/// grows, and never exceeds the number of day groups.
#[derive(Debug, Clone)]
pub struct ForecastView {
    snapshot: WeatherSnapshot,
    groups: Vec<DayGroup>,
    days_to_show: usize,
}

impl ForecastView {
    pub fn new(snapshot: WeatherSnapshot, samples: &[ForecastSample]) -> Self {
        Self::with_timezone(snapshot, samples, &Local)
    }

    pub fn with_timezone<Tz: TimeZone>(
        snapshot: WeatherSnapshot,
        samples: &[ForecastSample],
        tz: &Tz,
    ) -> Self {
        let groups = group(samples, tz);
        let days_to_show = groups.len().min(1);
        Self {
            snapshot,
            groups,
            days_to_show,
        }
    }

    pub fn from_hourly(hourly: &HourlyForecast) -> Self {
        Self::new(hourly.snapshot.clone(), &hourly.samples)
    }

    pub fn snapshot(&self) -> &WeatherSnapshot {
        &self.snapshot
    }

    pub fn groups(&self) -> &[DayGroup] {
        &self.groups
    }

    pub fn total_days(&self) -> usize {
        self.groups.len()
    }

    pub fn days_to_show(&self) -> usize {
        self.days_to_show
    }

    pub fn can_load_more(&self) -> bool {
        self.days_to_show < self.groups.len()
    }

    /// Reveal one more day. Returns `false` once every day is visible.
    pub fn load_more(&mut self) -> bool {
        if !self.can_load_more() {
            return false;
        }
        self.days_to_show += 1;
        true
    }

    /// Reveal up to `days` days in total; never shrinks the view.
    pub fn show_days(&mut self, days: usize) {
        while self.days_to_show < days && self.load_more() {}
    }

    pub fn visible_groups(&self) -> &[DayGroup] {
        &self.groups[..self.days_to_show]
    }

    /// Flattened entries of the visible days, as plotted on the charts.
    pub fn visible_entries(&self) -> impl Iterator<Item = &ForecastEntry> {
        self.visible_groups().iter().flat_map(|g| g.entries.iter())
    }

    pub fn series(&self, metric: Metric) -> Vec<(String, f64)> {
        self.visible_entries()
            .map(|e| (e.time_label.clone(), e.value(metric)))
            .collect()
    }

    /// Label of the day the "load more" affordance would reveal.
    pub fn next_day_label(&self) -> Option<String> {
        self.groups.get(self.days_to_show).map(DayGroup::short_label)
    }
}
