//! Seat inventory for every (theater, movie) showing.
//!
//! The catalog structure (which movies and theaters exist, and which showings
//! link them) sits behind a single `RwLock`. Each showing keeps its seats
//! behind its own `Mutex`, heap-allocated and shared through an `Arc`, so the
//! catalog maps can grow while another caller still holds a showing's lock.
//!
//! Seat operations hold the catalog lock only long enough to find the showing
//! and lock it. The availability check and the commit then run under the
//! showing lock alone, so bookings on different showings never wait on each
//! other and overlapping bookings on the same showing have exactly one winner.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::debug;

/// Every showing has this many seats, numbered from 1.
pub const SEATS_PER_SHOWING: u32 = 20;

/// 1-based seat number within a showing.
pub type SeatId = u32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("movie title must not be empty")]
    EmptyTitle,
    #[error("theater name must not be empty")]
    EmptyTheater,
    #[error("at least one theater is required")]
    NoTheaters,
    #[error("no seats requested")]
    NoSeats,
    #[error("seat {0} is outside 1-20")]
    SeatOutOfRange(SeatId),
    #[error("seat {0} requested more than once")]
    DuplicateSeat(SeatId),
    #[error("'{movie}' is not showing at '{theater}'")]
    UnknownShowing { theater: String, movie: String },
    #[error("seat {0} is already booked")]
    SeatTaken(SeatId),
}

/// Catalog queries and seat booking.
///
/// Implementations must be safe to call from many threads at once. The
/// connection handler only ever talks to this trait, so tests can swap in a
/// scripted double.
pub trait MovieBooker: Send + Sync {
    /// Registers `title` and every theater in `theaters`, creating a showing
    /// with all seats free for each pair that does not exist yet. Existing
    /// showings keep their bookings.
    fn add_movie(&self, title: &str, theaters: &[&str]) -> Result<(), BookingError>;

    /// All known movie titles.
    fn movies(&self) -> Vec<String>;

    /// Theaters with a showing of `title`; empty if the movie is unknown.
    fn theaters_for_movie(&self, title: &str) -> Vec<String>;

    fn is_theater(&self, name: &str) -> bool;

    /// Unbooked seats of the showing in ascending order; empty if there is no
    /// such showing.
    fn free_seats(&self, theater: &str, movie: &str) -> Vec<SeatId>;

    /// Books every seat in `seats` or none of them.
    fn book_seats(&self, theater: &str, movie: &str, seats: &[SeatId])
    -> Result<(), BookingError>;
}

/// Booked/free bitmap for one showing. Bit `n - 1` is seat `n`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SeatMap {
    booked: u32,
}

impl SeatMap {
    fn mask(seat: SeatId) -> u32 {
        1 << (seat - 1)
    }

    fn is_booked(&self, seat: SeatId) -> bool {
        self.booked & Self::mask(seat) != 0
    }

    fn free(&self) -> Vec<SeatId> {
        (1..=SEATS_PER_SHOWING)
            .filter(|seat| !self.is_booked(*seat))
            .collect()
    }

    /// Seats must already be validated.
    fn book_all(&mut self, seats: &[SeatId]) -> Result<(), BookingError> {
        if let Some(&taken) = seats.iter().find(|seat| self.is_booked(**seat)) {
            return Err(BookingError::SeatTaken(taken));
        }
        for &seat in seats {
            self.booked |= Self::mask(seat);
        }
        Ok(())
    }
}

/// Rejects empty requests, seats outside the showing, and repeated seats.
pub fn validate_seats(seats: &[SeatId]) -> Result<(), BookingError> {
    if seats.is_empty() {
        return Err(BookingError::NoSeats);
    }

    let mut seen = SeatMap::default();
    for &seat in seats {
        if seat == 0 || seat > SEATS_PER_SHOWING {
            return Err(BookingError::SeatOutOfRange(seat));
        }
        if seen.is_booked(seat) {
            return Err(BookingError::DuplicateSeat(seat));
        }
        seen.booked |= SeatMap::mask(seat);
    }
    Ok(())
}

type Showing = Arc<Mutex<SeatMap>>;

#[derive(Default)]
struct Catalog {
    movies: BTreeSet<String>,
    // theater -> movie -> showing
    theaters: BTreeMap<String, BTreeMap<String, Showing>>,
}

/// In-memory [`MovieBooker`] guarded by the two-tier locking scheme described
/// in the module docs.
#[derive(Default)]
pub struct Inventory {
    catalog: RwLock<Catalog>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` on the showing's seats with the showing locked and the catalog
    /// released. Returns `None` if the showing does not exist.
    fn with_showing<T>(
        &self,
        theater: &str,
        movie: &str,
        f: impl FnOnce(&mut SeatMap) -> T,
    ) -> Option<T> {
        let catalog = self.catalog.read();
        let showing = Arc::clone(catalog.theaters.get(theater)?.get(movie)?);
        let mut seats = showing.lock();
        drop(catalog);

        Some(f(&mut *seats))
    }
}

impl MovieBooker for Inventory {
    fn add_movie(&self, title: &str, theaters: &[&str]) -> Result<(), BookingError> {
        if title.is_empty() {
            return Err(BookingError::EmptyTitle);
        }
        if theaters.is_empty() {
            return Err(BookingError::NoTheaters);
        }
        if theaters.iter().any(|theater| theater.is_empty()) {
            return Err(BookingError::EmptyTheater);
        }

        let mut catalog = self.catalog.write();
        catalog.movies.insert(title.to_string());
        for &theater in theaters {
            catalog
                .theaters
                .entry(theater.to_string())
                .or_default()
                .entry(title.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(SeatMap::default())));
        }

        debug!(movie = title, theaters = theaters.len(), "movie registered");
        Ok(())
    }

    fn movies(&self) -> Vec<String> {
        self.catalog.read().movies.iter().cloned().collect()
    }

    fn theaters_for_movie(&self, title: &str) -> Vec<String> {
        self.catalog
            .read()
            .theaters
            .iter()
            .filter(|(_, showings)| showings.contains_key(title))
            .map(|(theater, _)| theater.clone())
            .collect()
    }

    fn is_theater(&self, name: &str) -> bool {
        self.catalog.read().theaters.contains_key(name)
    }

    fn free_seats(&self, theater: &str, movie: &str) -> Vec<SeatId> {
        self.with_showing(theater, movie, |seats| seats.free())
            .unwrap_or_default()
    }

    fn book_seats(
        &self,
        theater: &str,
        movie: &str,
        seats: &[SeatId],
    ) -> Result<(), BookingError> {
        if theater.is_empty() {
            return Err(BookingError::EmptyTheater);
        }
        if movie.is_empty() {
            return Err(BookingError::EmptyTitle);
        }
        validate_seats(seats)?;

        self.with_showing(theater, movie, |showing| showing.book_all(seats))
            .unwrap_or_else(|| {
                Err(BookingError::UnknownShowing {
                    theater: theater.to_string(),
                    movie: movie.to_string(),
                })
            })
    }
}
