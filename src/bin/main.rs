// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use chrono::NaiveDate;
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use stay_booking_rs::{
    BookingError, BookingRequest, Clock, Completion, Engine, EngineConfig, FixedClock, ListingId,
    NewListing, NewReview, ReservationId, ReservationStatus, SystemClock, UserId,
};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Stay Booking - Replay booking command CSV files
///
/// Reads listing, booking, lifecycle and review commands from a CSV file and
/// writes the resulting reservations to stdout.
#[derive(Parser, Debug)]
#[command(name = "stay-booking-rs")]
#[command(about = "Replays booking commands and prints the resulting reservations", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: type,actor,id,check_in,check_out,guests,amount,rating
    /// Example: cargo run -- commands.csv > reservations.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// TOML file with engine settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Pin "today" instead of using the system date
    #[arg(long, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Error loading config '{}': {}", path.display(), e);
                process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };
    let clock: Arc<dyn Clock> = match args.today {
        Some(today) => Arc::new(FixedClock::new(today)),
        None => Arc::new(SystemClock),
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            error!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let engine = Engine::with_config(config, clock);
    if let Err(e) = process_commands(&engine, BufReader::new(file)) {
        error!("Error processing commands: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_reservations(&engine, std::io::stdout()) {
        error!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `type, actor, id, check_in, check_out, guests, amount, rating`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "type")]
    command: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    actor: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    id: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    check_in: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    check_out: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    guests: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    rating: Option<u8>,
}

/// A fully-shaped command, ready for the engine.
#[derive(Debug)]
enum Command {
    CreateListing(NewListing),
    Book(BookingRequest),
    Confirm {
        reservation_id: ReservationId,
        actor: UserId,
    },
    Cancel {
        reservation_id: ReservationId,
        actor: UserId,
    },
    Complete {
        reservation_id: ReservationId,
        actor: UserId,
        completion: Completion,
    },
    Review {
        reservation_id: ReservationId,
        guest_id: UserId,
        review: NewReview,
    },
}

impl CsvRecord {
    /// Converts CSV record to a command.
    ///
    /// Returns `None` for unknown command types or missing required fields.
    fn into_command(self) -> Option<Command> {
        match self.command.to_lowercase().as_str() {
            kind @ ("listing" | "instant_listing") => {
                let owner = UserId(self.actor?);
                let listing = NewListing::new(owner, self.amount?, self.guests?)
                    .instant_book(kind == "instant_listing");
                Some(Command::CreateListing(listing))
            }
            "book" => Some(Command::Book(BookingRequest {
                listing_id: ListingId(u32::try_from(self.id?).ok()?),
                guest_id: UserId(self.actor?),
                check_in: self.check_in?,
                check_out: self.check_out?,
                guest_count: self.guests?,
            })),
            "confirm" => Some(Command::Confirm {
                reservation_id: ReservationId(self.id?),
                actor: UserId(self.actor?),
            }),
            "cancel" => Some(Command::Cancel {
                reservation_id: ReservationId(self.id?),
                actor: UserId(self.actor?),
            }),
            kind @ ("complete" | "force_complete") => Some(Command::Complete {
                reservation_id: ReservationId(self.id?),
                actor: UserId(self.actor?),
                completion: if kind == "force_complete" {
                    Completion::OperatorOverride
                } else {
                    Completion::Checkout
                },
            }),
            "review" => Some(Command::Review {
                reservation_id: ReservationId(self.id?),
                guest_id: UserId(self.actor?),
                review: NewReview::new(self.rating?, ""),
            }),
            _ => None,
        }
    }
}

fn apply(engine: &Engine, command: Command) -> Result<(), BookingError> {
    match command {
        Command::CreateListing(listing) => engine.create_listing(listing).map(drop),
        Command::Book(request) => engine.request_booking(request).map(drop),
        Command::Confirm {
            reservation_id,
            actor,
        } => engine.confirm(reservation_id, actor).map(drop),
        Command::Cancel {
            reservation_id,
            actor,
        } => engine.cancel(reservation_id, actor).map(drop),
        Command::Complete {
            reservation_id,
            actor,
            completion,
        } => engine
            .mark_completed(reservation_id, actor, completion)
            .map(drop),
        Command::Review {
            reservation_id,
            guest_id,
            review,
        } => engine.submit_review(guest_id, reservation_id, review).map(drop),
    }
}

/// Replays commands from a CSV reader against `engine`.
///
/// Rows are streamed, so input size is not bounded by memory. Malformed rows
/// and rejected commands are logged and skipped.
///
/// # CSV Format
///
/// Expected columns: `type, actor, id, check_in, check_out, guests, amount, rating`
/// - `listing` / `instant_listing`: `actor` owner, `guests` capacity, `amount` nightly price
/// - `book`: `actor` guest, `id` listing, dates and `guests`
/// - `confirm` / `cancel`: `actor`, `id` reservation
/// - `complete`: `actor`, `id` reservation; waits for checkout to pass
/// - `force_complete`: `actor` host or configured operator, `id` reservation
/// - `review`: `actor` guest, `id` reservation, `rating`
///
/// # Example
///
/// ```csv
/// type,actor,id,check_in,check_out,guests,amount,rating
/// listing,1,,,,4,100.00,
/// book,2,1,2024-07-01,2024-07-05,2,,
/// confirm,1,1,,,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails.
pub fn process_commands<R: Read>(engine: &Engine, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    let mut applied = 0usize;
    for (line, result) in rdr.deserialize::<CsvRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!(line, "skipping malformed row: {}", e);
                continue;
            }
        };
        let Some(command) = record.into_command() else {
            debug!(line, "skipping incomplete command");
            continue;
        };
        match apply(engine, command) {
            Ok(()) => applied += 1,
            Err(e) => debug!(line, code = e.code(), "command rejected: {}", e),
        }
    }

    info!(applied, "replay finished");
    Ok(())
}

/// Output row for a reservation.
#[derive(Debug, Serialize)]
struct ReservationRow {
    reservation: ReservationId,
    listing: ListingId,
    guest: UserId,
    check_in: NaiveDate,
    check_out: NaiveDate,
    guests: u32,
    nights: u32,
    total: Decimal,
    status: ReservationStatus,
}

/// Writes all reservations to a CSV writer, ordered by ID.
///
/// # CSV Format
///
/// Columns: `reservation, listing, guest, check_in, check_out, guests, nights, total, status`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_reservations<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for reservation in engine.reservations() {
        wtr.serialize(ReservationRow {
            reservation: reservation.id,
            listing: reservation.listing_id,
            guest: reservation.guest_id,
            check_in: reservation.dates.check_in(),
            check_out: reservation.dates.check_out(),
            guests: reservation.guest_count,
            nights: reservation.nights(),
            total: reservation.total_price,
            status: reservation.status,
        })?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    const HEADER: &str = "type,actor,id,check_in,check_out,guests,amount,rating\n";

    fn engine_at(y: i32, m: u32, d: u32) -> Engine {
        let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(y, m, d).unwrap()));
        Engine::with_clock(clock)
    }

    fn replay(engine: &Engine, rows: &str) {
        let csv = format!("{HEADER}{rows}");
        process_commands(engine, Cursor::new(csv)).unwrap();
    }

    #[test]
    fn parse_listing_and_booking() {
        let engine = engine_at(2024, 6, 1);
        replay(
            &engine,
            "listing,1,,,,4,100.00,\n\
             book,2,1,2024-07-01,2024-07-05,2,,\n",
        );

        let reservations = engine.reservations();
        assert_eq!(reservations.len(), 1);
        assert_eq!(reservations[0].total_price, dec!(400.00));
        assert_eq!(reservations[0].status, ReservationStatus::Pending);
    }

    #[test]
    fn instant_listing_confirms_immediately() {
        let engine = engine_at(2024, 6, 1);
        replay(
            &engine,
            "instant_listing,1,,,,2,80,\n\
             book,2,1,2024-07-01,2024-07-03,1,,\n",
        );
        assert_eq!(engine.reservations()[0].status, ReservationStatus::Confirmed);
    }

    #[test]
    fn conflicting_booking_is_skipped() {
        let engine = engine_at(2024, 6, 1);
        replay(
            &engine,
            "listing,1,,,,4,100,\n\
             book,2,1,2024-07-01,2024-07-05,2,,\n\
             book,3,1,2024-07-04,2024-07-06,1,,\n\
             book,3,1,2024-07-05,2024-07-06,1,,\n",
        );

        let reservations = engine.reservations();
        assert_eq!(reservations.len(), 2);
        assert_eq!(reservations[1].guest_id, UserId(3));
        assert_eq!(
            reservations[1].dates.check_in(),
            NaiveDate::from_ymd_opt(2024, 7, 5).unwrap()
        );
    }

    #[test]
    fn lifecycle_and_review_rows() {
        let engine = engine_at(2024, 6, 1);
        replay(
            &engine,
            "listing,1,,,,4,100,\n\
             book,2,1,2024-07-01,2024-07-05,2,,\n\
             confirm,1,1,,,,,\n\
             force_complete,1,1,,,,,\n\
             review,2,1,,,,,5\n",
        );

        assert_eq!(engine.reservations()[0].status, ReservationStatus::Completed);
        assert_eq!(engine.average_rating(ListingId(1)), Some(dec!(5)));
    }

    #[test]
    fn complete_waits_for_checkout() {
        let engine = engine_at(2024, 6, 1);
        replay(
            &engine,
            "listing,1,,,,4,100,\n\
             book,2,1,2024-07-01,2024-07-05,2,,\n\
             confirm,1,1,,,,,\n\
             complete,2,1,,,,,\n",
        );
        assert_eq!(engine.reservations()[0].status, ReservationStatus::Confirmed);
    }

    #[test]
    fn guest_cannot_force_complete() {
        let engine = engine_at(2024, 6, 1);
        replay(
            &engine,
            "listing,1,,,,4,100,\n\
             book,2,1,2024-07-01,2024-07-05,2,,\n\
             confirm,1,1,,,,,\n\
             force_complete,2,1,,,,,\n\
             review,2,1,,,,,5\n",
        );
        assert_eq!(engine.reservations()[0].status, ReservationStatus::Confirmed);
        assert_eq!(engine.average_rating(ListingId(1)), None);
    }

    #[test]
    fn skip_malformed_rows() {
        let engine = engine_at(2024, 6, 1);
        replay(
            &engine,
            "listing,1,,,,4,100,\n\
             teleport,row,data,here,,,,\n\
             book,2,1,not-a-date,2024-07-05,2,,\n\
             book,2,1,2024-07-01,2024-07-05,2,,\n",
        );
        assert_eq!(engine.reservations().len(), 1);
    }

    #[test]
    fn parse_with_whitespace() {
        let engine = engine_at(2024, 6, 1);
        replay(
            &engine,
            " listing , 1 , , , , 4 , 100 , \n\
             book , 2 , 1 , 2024-07-01 , 2024-07-02 , 1 , , \n",
        );
        assert_eq!(engine.reservations().len(), 1);
    }

    #[test]
    fn write_reservations_to_csv() {
        let engine = engine_at(2024, 6, 1);
        replay(
            &engine,
            "listing,1,,,,4,100.00,\n\
             book,2,1,2024-07-01,2024-07-05,2,,\n",
        );

        let mut output = Vec::new();
        write_reservations(&engine, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some("reservation,listing,guest,check_in,check_out,guests,nights,total,status")
        );
        assert_eq!(
            lines.next(),
            Some("1,1,2,2024-07-01,2024-07-05,2,4,400.00,pending")
        );
    }
}
