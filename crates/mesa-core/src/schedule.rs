//! # Service Schedule
//!
//! The fixed set of bookable times, grouped into lunch and dinner service.
//!
//! ```text
//! comida: 13:00 13:30 14:00 14:30 15:00 15:30
//! cena:   20:00 20:30 21:00 21:30 22:00 22:30   (closed on Sundays)
//! ```

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use ts_rs::TS;

use crate::error::{ConfigError, ConfigResult};
use crate::types::parse_time;

/// Service period a slot belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ServicePeriod {
    #[serde(rename = "comida")]
    Lunch,
    #[serde(rename = "cena")]
    Dinner,
}

impl ServicePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServicePeriod::Lunch => "comida",
            ServicePeriod::Dinner => "cena",
        }
    }
}

/// Schedule as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub lunch: Vec<String>,
    pub dinner: Vec<String>,
    /// Weekday with no dinner service (`"sun"`, `"monday"`, ...).
    ///
    /// Omitting the key keeps the default, Sunday. Set it to `""` to serve
    /// dinner every day.
    pub closed_dinner_weekday: Option<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let to_strings = |v: &[&str]| -> Vec<String> { v.iter().map(|s| s.to_string()).collect() };
        ScheduleConfig {
            lunch: to_strings(&["13:00", "13:30", "14:00", "14:30", "15:00", "15:30"]),
            dinner: to_strings(&["20:00", "20:30", "21:00", "21:30", "22:00", "22:30"]),
            closed_dinner_weekday: Some("sun".to_string()),
        }
    }
}

impl ScheduleConfig {
    /// Parses and validates the schedule.
    pub fn build(&self) -> ConfigResult<ServiceSchedule> {
        let lunch = parse_block("lunch", &self.lunch)?;
        let dinner = parse_block("dinner", &self.dinner)?;

        if lunch.iter().any(|t| dinner.contains(t)) {
            return Err(ConfigError::InvalidSchedule(
                "a time cannot belong to both lunch and dinner".to_string(),
            ));
        }

        let closed_dinner_weekday = match self.closed_dinner_weekday.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Weekday>().map_err(|_| {
                ConfigError::InvalidSchedule(format!("unknown weekday '{}'", raw))
            })?),
        };

        Ok(ServiceSchedule {
            lunch,
            dinner,
            closed_dinner_weekday,
        })
    }
}

fn parse_block(name: &str, raw: &[String]) -> ConfigResult<Vec<NaiveTime>> {
    let mut seen = HashSet::new();
    let mut times = Vec::with_capacity(raw.len());
    for entry in raw {
        let time = parse_time(entry).ok_or_else(|| {
            ConfigError::InvalidSchedule(format!("{} time '{}' is not HH:MM", name, entry))
        })?;
        if !seen.insert(time) {
            return Err(ConfigError::InvalidSchedule(format!(
                "{} time '{}' listed twice",
                name, entry
            )));
        }
        times.push(time);
    }
    times.sort();
    Ok(times)
}

/// Parsed, immutable schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSchedule {
    lunch: Vec<NaiveTime>,
    dinner: Vec<NaiveTime>,
    closed_dinner_weekday: Option<Weekday>,
}

impl Default for ServiceSchedule {
    fn default() -> Self {
        // Parsing the built-in lists cannot fail; fall back to empty blocks
        ScheduleConfig::default()
            .build()
            .unwrap_or(ServiceSchedule {
                lunch: Vec::new(),
                dinner: Vec::new(),
                closed_dinner_weekday: Some(Weekday::Sun),
            })
    }
}

impl ServiceSchedule {
    /// Every slot in service order, with its period.
    pub fn slots(&self) -> impl Iterator<Item = (NaiveTime, ServicePeriod)> + '_ {
        self.lunch
            .iter()
            .map(|t| (*t, ServicePeriod::Lunch))
            .chain(self.dinner.iter().map(|t| (*t, ServicePeriod::Dinner)))
    }

    /// The period a time belongs to, if it is a bookable slot at all.
    pub fn period_of(&self, time: NaiveTime) -> Option<ServicePeriod> {
        if self.lunch.contains(&time) {
            Some(ServicePeriod::Lunch)
        } else if self.dinner.contains(&time) {
            Some(ServicePeriod::Dinner)
        } else {
            None
        }
    }

    pub fn closed_dinner_weekday(&self) -> Option<Weekday> {
        self.closed_dinner_weekday
    }

    /// True when dinner is not served on `date`.
    pub fn is_dinner_closed(&self, date: NaiveDate) -> bool {
        self.closed_dinner_weekday == Some(date.weekday())
    }

    /// True when `time` is a slot that is actually served on `date`.
    pub fn is_open(&self, date: NaiveDate, time: NaiveTime) -> bool {
        match self.period_of(time) {
            Some(ServicePeriod::Lunch) => true,
            Some(ServicePeriod::Dinner) => !self.is_dinner_closed(date),
            None => false,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
