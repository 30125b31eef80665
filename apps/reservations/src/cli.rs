//! Command-line arguments for the `mesa` binary.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};

use mesa_core::types::{parse_date, parse_time};
use mesa_core::{Contact, LocationPreference, NewReservation, ReservationUpdate};
use mesa_db::ReservationFilter;

#[derive(Parser, Debug)]
#[command(name = "mesa")]
#[command(about = "Table reservations: availability, bookings and cancellations")]
#[command(version)]
pub struct Cli {
    /// Config file (default: $MESA_CONFIG, then the platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Availability of every service slot on a date
    Slots {
        #[arg(value_parser = date_arg)]
        date: NaiveDate,

        /// Party size to seat (default: is anything free at all)
        party: Option<u32>,

        #[arg(long, value_parser = location_arg, default_value = "indiferente")]
        location: LocationPreference,
    },

    /// Whether one slot can seat a party
    Check {
        #[arg(value_parser = date_arg)]
        date: NaiveDate,

        #[arg(value_parser = time_arg)]
        time: NaiveTime,

        party: u32,

        #[arg(long, value_parser = location_arg, default_value = "indiferente")]
        location: LocationPreference,
    },

    /// Book a table
    Book(BookArgs),

    /// Show a reservation
    Get { code: String },

    /// Change guest details or party size
    Update {
        code: String,

        #[command(flatten)]
        changes: UpdateArgs,
    },

    /// Cancel a reservation and release its tables
    Cancel {
        code: String,

        #[arg(long)]
        reason: Option<String>,
    },

    /// List active reservations
    List {
        #[arg(long, value_parser = date_arg)]
        date: Option<NaiveDate>,

        /// Matches code, names, email and phone
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 50)]
        per_page: u32,
    },

    /// Bookings and covers for a date
    Stats {
        #[arg(value_parser = date_arg)]
        date: NaiveDate,
    },

    /// Report tables booked twice at the same time
    Verify {
        #[arg(value_parser = date_arg)]
        date: NaiveDate,
    },
}

#[derive(Args, Debug)]
pub struct BookArgs {
    #[arg(value_parser = date_arg)]
    pub date: NaiveDate,

    #[arg(value_parser = time_arg)]
    pub time: NaiveTime,

    pub party: u32,

    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,

    #[arg(long, value_parser = location_arg, default_value = "indiferente")]
    pub location: LocationPreference,

    /// cumpleanos, aniversario, negocios, familia, romantica or otra
    #[arg(long)]
    pub occasion: Option<String>,

    #[arg(long)]
    pub allergies: Option<String>,

    #[arg(long)]
    pub comments: Option<String>,
}

impl From<BookArgs> for NewReservation {
    fn from(args: BookArgs) -> Self {
        NewReservation {
            contact: Contact {
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
                phone: args.phone,
            },
            date: args.date,
            time: args.time,
            party_size: args.party,
            preference: args.location,
            occasion: args.occasion,
            allergies: args.allergies,
            comments: args.comments,
        }
    }
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[arg(long)]
    pub first_name: Option<String>,

    #[arg(long)]
    pub last_name: Option<String>,

    #[arg(long)]
    pub email: Option<String>,

    #[arg(long)]
    pub phone: Option<String>,

    /// New party size; the reservation may move to another table
    #[arg(long)]
    pub party: Option<u32>,

    #[arg(long, value_parser = location_arg)]
    pub location: Option<LocationPreference>,

    #[arg(long)]
    pub occasion: Option<String>,

    #[arg(long)]
    pub allergies: Option<String>,

    #[arg(long)]
    pub comments: Option<String>,
}

impl From<UpdateArgs> for ReservationUpdate {
    fn from(args: UpdateArgs) -> Self {
        ReservationUpdate {
            first_name: args.first_name,
            last_name: args.last_name,
            email: args.email,
            phone: args.phone,
            party_size: args.party,
            preference: args.location,
            occasion: args.occasion,
            allergies: args.allergies,
            comments: args.comments,
        }
    }
}

pub fn list_filter(
    date: Option<NaiveDate>,
    search: Option<String>,
    page: u32,
    per_page: u32,
) -> ReservationFilter {
    ReservationFilter {
        date,
        search,
        page,
        per_page,
        ..Default::default()
    }
}

fn date_arg(raw: &str) -> Result<NaiveDate, String> {
    parse_date(raw).ok_or_else(|| format!("'{}' is not YYYY-MM-DD", raw))
}

fn time_arg(raw: &str) -> Result<NaiveTime, String> {
    parse_time(raw).ok_or_else(|| format!("'{}' is not HH:MM", raw))
}

fn location_arg(raw: &str) -> Result<LocationPreference, String> {
    raw.parse::<LocationPreference>().map_err(|e| e.to_string())
}
