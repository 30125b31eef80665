//! # Engine Configuration
//!
//! Everything the coordinator needs at startup: database location, booking
//! limits, service schedule and the table inventory.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MESA_DB_PATH=/var/lib/mesa/reservations.db                         │
//! │     MESA_SEAT_LIMIT=50                                                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $MESA_CONFIG, or                                                   │
//! │     ~/.config/mesa/reservations.toml (Linux)                           │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     House floor plan, lunch 13:00-15:30, dinner 20:00-22:30            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # reservations.toml
//! [database]
//! path = "/var/lib/mesa/reservations.db"
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [booking]
//! max_party_online = 10
//! max_advance_days = 30
//! seat_limit = 50
//! default_probe_party_size = 1
//!
//! [schedule]
//! lunch = ["13:00", "13:30", "14:00", "14:30", "15:00", "15:30"]
//! dinner = ["20:00", "20:30", "21:00", "21:30", "22:00", "22:30"]
//! closed_dinner_weekday = "sun"
//!
//! [[tables]]
//! id = "m1"
//! capacity = 2
//! location = "interior"
//!
//! [[combinations]]
//! id = "c1"
//! components = ["m1", "m2"]
//! capacity = 4
//! location = "interior"
//! ```
//!
//! An invalid inventory or schedule is fatal: `load` fails and the process
//! must not serve.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use mesa_core::inventory::house_inventory;
use mesa_core::validation::BookingLimits;
use mesa_core::{
    Combination, PhysicalTable, ScheduleConfig, ServiceSchedule, TableInventory,
    DEFAULT_PROBE_PARTY_SIZE, DEFAULT_SEAT_LIMIT, MAX_ADVANCE_DAYS, MAX_PARTY_ONLINE,
};
use mesa_db::pool::DEFAULT_BUSY_TIMEOUT;
use mesa_db::DbConfig;

/// File name looked up in the platform config directory.
pub const CONFIG_FILE_NAME: &str = "reservations.toml";

// =============================================================================
// Error
// =============================================================================

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    /// The inventory or schedule breaks a construction rule.
    #[error(transparent)]
    Invalid(#[from] mesa_core::ConfigError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Sections
// =============================================================================

/// `[database]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file. Defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a booking waits for another booking's commit.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT.as_millis() as u64
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: None,
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// `[booking]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSettings {
    /// Largest party accepted online.
    #[serde(default = "default_max_party_online")]
    pub max_party_online: u32,

    /// How far ahead a date may be booked.
    #[serde(default = "default_max_advance_days")]
    pub max_advance_days: u32,

    /// Maximum covers seated in one slot.
    #[serde(default = "default_seat_limit")]
    pub seat_limit: u32,

    /// Party size probed when the availability grid is asked without one.
    #[serde(default = "default_probe_party_size")]
    pub default_probe_party_size: u32,
}

fn default_max_party_online() -> u32 {
    MAX_PARTY_ONLINE
}

fn default_max_advance_days() -> u32 {
    MAX_ADVANCE_DAYS
}

fn default_seat_limit() -> u32 {
    DEFAULT_SEAT_LIMIT
}

fn default_probe_party_size() -> u32 {
    DEFAULT_PROBE_PARTY_SIZE
}

impl Default for BookingSettings {
    fn default() -> Self {
        BookingSettings {
            max_party_online: default_max_party_online(),
            max_advance_days: default_max_advance_days(),
            seat_limit: default_seat_limit(),
            default_probe_party_size: default_probe_party_size(),
        }
    }
}

impl BookingSettings {
    pub fn limits(&self) -> BookingLimits {
        BookingLimits {
            max_party_online: self.max_party_online,
            max_advance_days: self.max_advance_days,
        }
    }
}

// =============================================================================
// Engine Config
// =============================================================================

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub booking: BookingSettings,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Physical tables. Empty means the built-in house floor plan.
    #[serde(default)]
    pub tables: Vec<PhysicalTable>,

    #[serde(default)]
    pub combinations: Vec<Combination>,
}

impl EngineConfig {
    /// Loads configuration from file and environment.
    ///
    /// ## Loading Order
    /// 1. Start with defaults
    /// 2. Load from TOML file (`config_path`, `$MESA_CONFIG`, or the platform
    ///    config dir) if it exists
    /// 3. Apply environment overrides
    /// 4. Validate, including building the inventory and schedule
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var("MESA_CONFIG").ok().map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading engine config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Missing sections fall back to defaults.
    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Checks limits and builds the inventory and schedule once so that a
    /// bad floor plan is rejected before anything is served.
    pub fn validate(&self) -> ConfigResult<()> {
        let positive = [
            ("booking.max_party_online", self.booking.max_party_online),
            ("booking.seat_limit", self.booking.seat_limit),
            ("booking.default_probe_party_size", self.booking.default_probe_party_size),
            ("database.max_connections", self.database.max_connections),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        if self.tables.is_empty() && !self.combinations.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "combinations".to_string(),
                value: "combinations need [[tables]] to join".to_string(),
            });
        }

        self.build_inventory()?;
        self.build_schedule()?;
        Ok(())
    }

    /// Builds the immutable inventory with the configured seat limit.
    pub fn build_inventory(&self) -> ConfigResult<TableInventory> {
        let inventory = if self.tables.is_empty() {
            house_inventory()
        } else {
            TableInventory::new(self.tables.clone(), self.combinations.clone())?
        };
        Ok(inventory.with_seat_limit(self.booking.seat_limit)?)
    }

    pub fn build_schedule(&self) -> ConfigResult<ServiceSchedule> {
        Ok(self.schedule.build()?)
    }

    /// Database file: configured path, else `reservations.db` in the
    /// platform data directory, else the working directory.
    pub fn database_path(&self) -> PathBuf {
        if let Some(ref path) = self.database.path {
            return path.clone();
        }
        directories::ProjectDirs::from("com", "mesa", "reservations")
            .map(|dirs| dirs.data_dir().join("reservations.db"))
            .unwrap_or_else(|| PathBuf::from("reservations.db"))
    }

    /// Pool settings for the store at [`database_path`](Self::database_path).
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path())
            .max_connections(self.database.max_connections)
            .busy_timeout(Duration::from_millis(self.database.busy_timeout_ms))
    }

    fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup (the environment in production).
    fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MESA_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = Some(PathBuf::from(path));
        }

        let numeric = [
            ("MESA_SEAT_LIMIT", &mut self.booking.seat_limit),
            ("MESA_MAX_PARTY_ONLINE", &mut self.booking.max_party_online),
            ("MESA_MAX_ADVANCE_DAYS", &mut self.booking.max_advance_days),
        ];
        for (key, slot) in numeric {
            if let Some(raw) = lookup(key) {
                *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw.clone(),
                })?;
                debug!(key, value = *slot, "Overriding booking setting from environment");
            }
        }

        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "mesa", "reservations")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use mesa_core::{Location, UnitKind};
    use std::collections::HashMap;

    #[test]
    fn test_defaults_use_house_plan() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());

        let inventory = config.build_inventory().unwrap();
        assert_eq!(inventory.tables().len(), 13);
        assert_eq!(inventory.combinations().len(), 5);
        assert_eq!(inventory.seat_limit(), Some(50));

        let schedule = config.build_schedule().unwrap();
        assert_eq!(schedule.slots().count(), 12);
    }

    #[test]
    fn test_parse_full_file() {
        let config = EngineConfig::from_toml(
            r#"
            [database]
            path = "/tmp/mesa.db"

            [booking]
            seat_limit = 20
            max_party_online = 8

            [schedule]
            lunch = ["13:00", "14:00"]
            dinner = ["21:00"]
            closed_dinner_weekday = "mon"

            [[tables]]
            id = "t1"
            capacity = 2
            location = "interior"

            [[tables]]
            id = "t2"
            capacity = 2
            location = "terraza"

            [[combinations]]
            id = "j1"
            components = ["t1", "t2"]
            capacity = 4
            location = "interior"
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.database_path(), PathBuf::from("/tmp/mesa.db"));
        assert_eq!(config.booking.seat_limit, 20);
        assert_eq!(config.booking.max_party_online, 8);
        // Unset keys keep their defaults
        assert_eq!(config.booking.max_advance_days, 30);
        assert_eq!(config.booking.default_probe_party_size, 1);

        let inventory = config.build_inventory().unwrap();
        assert_eq!(inventory.physical_table("t2").unwrap().location, Location::Terraza);
        assert_eq!(inventory.unit("j1").unwrap().kind(), UnitKind::Combination);
        assert_eq!(inventory.seat_limit(), Some(20));

        let schedule = config.build_schedule().unwrap();
        assert_eq!(schedule.slots().count(), 3);
        assert_eq!(schedule.closed_dinner_weekday(), Some(chrono::Weekday::Mon));
    }

    #[test]
    fn test_database_section_feeds_pool() {
        let config = EngineConfig::from_toml(
            r#"
            [database]
            path = "/tmp/mesa.db"
            max_connections = 8
            busy_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());

        let db = config.db_config();
        assert_eq!(db.database_path, PathBuf::from("/tmp/mesa.db"));
        assert_eq!(db.max_connections, 8);
        assert_eq!(db.busy_timeout, Duration::from_millis(250));

        let defaults = EngineConfig::default().db_config();
        assert_eq!(defaults.max_connections, 5);
        assert_eq!(defaults.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn test_zero_connections_rejected() {
        let config = EngineConfig::from_toml("[database]\nmax_connections = 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "database.max_connections"
        ));
    }

    #[test]
    fn test_closed_dinner_day_default_and_opt_out() {
        let omitted = EngineConfig::from_toml("[schedule]\ndinner = [\"21:00\"]\n").unwrap();
        assert_eq!(
            omitted.build_schedule().unwrap().closed_dinner_weekday(),
            Some(chrono::Weekday::Sun)
        );

        let open_daily =
            EngineConfig::from_toml("[schedule]\nclosed_dinner_weekday = \"\"\n").unwrap();
        assert_eq!(open_daily.build_schedule().unwrap().closed_dinner_weekday(), None);
    }

    #[test]
    fn test_unknown_component_is_fatal() {
        let config = EngineConfig::from_toml(
            r#"
            [[tables]]
            id = "t1"
            capacity = 2
            location = "interior"

            [[combinations]]
            id = "j1"
            components = ["t1", "t9"]
            capacity = 4
            location = "interior"
            "#,
        )
        .unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid(mesa_core::ConfigError::UnknownComponent { .. })
        ));
    }

    #[test]
    fn test_zero_capacity_is_fatal() {
        let config = EngineConfig::from_toml(
            r#"
            [[tables]]
            id = "t1"
            capacity = 0
            location = "interior"
            "#,
        )
        .unwrap();

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(mesa_core::ConfigError::NonPositiveCapacity { .. }))
        ));
    }

    #[test]
    fn test_combinations_without_tables_rejected() {
        let config = EngineConfig::from_toml(
            r#"
            [[combinations]]
            id = "j1"
            components = ["m1", "m2"]
            capacity = 4
            location = "interior"
            "#,
        )
        .unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_bad_schedule_is_fatal() {
        let config = EngineConfig::from_toml(
            r#"
            [schedule]
            lunch = ["13:00", "1pm"]
            "#,
        )
        .unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("MESA_DB_PATH", "/data/mesa.db"),
            ("MESA_SEAT_LIMIT", "32"),
            ("MESA_MAX_ADVANCE_DAYS", " 60 "),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/data/mesa.db"));
        assert_eq!(config.booking.seat_limit, 32);
        assert_eq!(config.booking.max_advance_days, 60);
        assert_eq!(config.booking.max_party_online, 10);
    }

    #[test]
    fn test_bad_numeric_override() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|key| (key == "MESA_SEAT_LIMIT").then(|| "many".to_string()))
            .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MESA_SEAT_LIMIT"));
    }

    #[test]
    fn test_zero_seat_limit_rejected() {
        let mut config = EngineConfig::default();
        config.booking.seat_limit = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }
}
