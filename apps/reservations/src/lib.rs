//! # Mesa Reservations
//!
//! Booking coordinator for the restaurant: wires the configured table
//! inventory and service schedule to the reservations store.
//!
//! ## Module Organization
//! ```text
//! mesa_reservations/
//! ├── config.rs   ← EngineConfig: defaults → TOML → env → validate
//! ├── error.rs    ← ApiError { code, message } for every operation
//! ├── locks.rs    ← Per-(date, time) write locks
//! └── service.rs  ← BookingService: availability, create, cancel, update
//! ```
//!
//! ## Startup
//! ```text
//! init_tracing()
//!      │
//!      ▼
//! EngineConfig::load() ── ConfigError ──► exit (never serve a bad floor plan)
//!      │
//!      ▼
//! Database::new(config.db_config())  ← migrations run here
//!      │
//!      ▼
//! BookingService::from_config(db, &config)
//! ```

pub mod config;
pub mod error;
pub mod locks;
pub mod service;

pub use config::{ConfigError, EngineConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use locks::SlotLocks;
pub use service::{BookingService, Confirmation, DayStats};

use tracing_subscriber::EnvFilter;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,mesa=debug,sqlx=warn";

/// Initializes the tracing subscriber.
///
/// Log level is controlled by `RUST_LOG`:
/// - `RUST_LOG=debug` - Verbose logging
/// - `RUST_LOG=mesa_core=trace` - Trace the resolver only
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
