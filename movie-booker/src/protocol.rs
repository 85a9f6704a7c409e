//! Line protocol: one command per line in, one response line out.
//!
//! The verb is the first whitespace-delimited token and is matched without
//! regard to case. Whatever follows it, minus leading whitespace and trailing
//! spaces, is the argument.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::inventory::{SEATS_PER_SHOWING, SeatId};

const LINE_ENDINGS: &[u8] = b"\n\r";
const ARGUMENT_TRAILERS: &[char] = &[' ', '\r'];

pub const GREETING: &str = "Hello! Input command(\"list_movies\", \"select_movie <name>\", \"list_theaters\", \"select_theater <name>\", \"get_free_seats\", \"book_seats <s1,s2,..>\")";
pub const NO_MOVIES: &str = "No movies running";
pub const NOT_RUNNING: &str = "Movie is not running in any theater";
pub const INVALID_MOVIE: &str = "Error! Select a valid movie";
pub const INVALID_THEATER: &str = "Error! Select a valid theater";
pub const NO_MOVIE_SELECTED: &str = "Error! No valid movie selected";
pub const NO_THEATER_SELECTED: &str = "Error! No valid theater selected";
pub const SEATS_OUT_OF_RANGE: &str = "Error! Seats not in range 1-20";
pub const NO_VALID_SEATS: &str = "Error! No valid seats specified";
pub const DUPLICATE_SEATS: &str = "Error! Duplicate seat ids requested";
pub const BOOKED: &str = "Seats booked successfully";
pub const BOOKING_FAILED: &str = "Error! Could not book seats";
pub const INVALID_COMMAND: &str = "Error! Enter a valid command";

/// Every error response starts with this.
pub const ERROR_MARKER: &str = "Error!";

pub fn movie_selected(movie: &str) -> String {
    format!("Movie {movie} selected")
}

pub fn theater_selected(theater: &str) -> String {
    format!("Theater {theater} selected")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    ListMovies,
    SelectMovie(&'a str),
    ListTheaters,
    SelectTheater(&'a str),
    GetFreeSeats,
    /// Raw seat list; parsed only once the session is known to be ready.
    BookSeats(&'a str),
    Unknown,
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_start();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));
        let argument = rest.trim_start().trim_end_matches(ARGUMENT_TRAILERS);

        match verb.to_ascii_lowercase().as_str() {
            "list_movies" => Command::ListMovies,
            "select_movie" => Command::SelectMovie(argument),
            "list_theaters" => Command::ListTheaters,
            "select_theater" => Command::SelectTheater(argument),
            "get_free_seats" => Command::GetFreeSeats,
            "book_seats" => Command::BookSeats(argument),
            _ => Command::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeatListError {
    #[error("no seats given")]
    Empty,
    #[error("'{0}' is not a seat number")]
    Malformed(String),
    #[error("seat {0} is outside 1-20")]
    OutOfRange(i64),
    #[error("seat {0} requested more than once")]
    Duplicate(SeatId),
}

impl SeatListError {
    pub fn response(&self) -> &'static str {
        match self {
            SeatListError::Empty | SeatListError::Malformed(_) => NO_VALID_SEATS,
            SeatListError::OutOfRange(_) => SEATS_OUT_OF_RANGE,
            SeatListError::Duplicate(_) => DUPLICATE_SEATS,
        }
    }
}

/// Parses `"5,6, 7"` into seat ids. Ids are checked left to right and the
/// first bad one stops parsing.
pub fn parse_seat_list(input: &str) -> Result<Vec<SeatId>, SeatListError> {
    if input.trim().is_empty() {
        return Err(SeatListError::Empty);
    }

    let mut seen = [false; SEATS_PER_SHOWING as usize + 1];
    let mut seats = Vec::new();
    for token in input.split(',').map(str::trim) {
        let seat: i64 = token
            .parse()
            .map_err(|_| SeatListError::Malformed(token.to_string()))?;
        if !(1..=i64::from(SEATS_PER_SHOWING)).contains(&seat) {
            return Err(SeatListError::OutOfRange(seat));
        }
        let seat = seat as SeatId;
        if std::mem::replace(&mut seen[seat as usize], true) {
            return Err(SeatListError::Duplicate(seat));
        }
        seats.push(seat);
    }
    Ok(seats)
}

/// Joins list items the way every list response is rendered.
pub fn join_list<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: ToString,
{
    items
        .into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Longest request line the server accepts, line ending excluded.
pub const MAX_LINE_LEN: usize = 4096;

/// One framed line from a [`LineReader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Line ending stripped; bytes that are not UTF-8 become U+FFFD.
    Text(String),
    /// The line ran past the reader's limit and was dropped whole.
    TooLong,
}

/// Newline framing with a bounded buffer.
///
/// Partial input stays in the reader between calls, so [`LineReader::next_line`]
/// can sit in a `select!` branch without losing bytes when another branch
/// wins. An over-long line is skipped chunk by chunk, so at most `limit + 1`
/// bytes are ever buffered.
#[derive(Debug)]
pub struct LineReader {
    buf: Vec<u8>,
    limit: usize,
    skipping: bool,
}

impl LineReader {
    pub fn new(limit: usize) -> Self {
        Self {
            buf: Vec::new(),
            limit,
            skipping: false,
        }
    }

    /// `None` means the peer closed the stream. Empty lines are returned as-is;
    /// a final line without a newline is returned when the stream ends.
    pub async fn next_line<R>(&mut self, reader: &mut R) -> io::Result<Option<Line>>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            let room = self.limit.saturating_add(1).saturating_sub(self.buf.len());
            let read = (&mut *reader)
                .take(room as u64)
                .read_until(b'\n', &mut self.buf)
                .await?;
            let terminated = self.buf.last() == Some(&b'\n');

            if self.skipping {
                self.buf.clear();
                if terminated || read == 0 {
                    self.skipping = false;
                    return Ok(Some(Line::TooLong));
                }
                continue;
            }

            if !terminated && self.buf.len() > self.limit {
                self.buf.clear();
                self.skipping = true;
                continue;
            }

            if read == 0 && self.buf.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Line::Text(self.take_text())));
        }
    }

    fn take_text(&mut self) -> String {
        let end = self
            .buf
            .iter()
            .rposition(|byte| !LINE_ENDINGS.contains(byte))
            .map_or(0, |last| last + 1);
        let text = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.clear();
        text
    }
}

/// Reads a single line with no length limit. Not for `select!`: a cancelled
/// call drops whatever it had read.
pub async fn read_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    match LineReader::new(usize::MAX).next_line(reader).await? {
        Some(Line::Text(text)) => Ok(Some(text)),
        Some(Line::TooLong) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "line exceeds buffer limit",
        )),
        None => Ok(None),
    }
}

pub async fn write_line<W>(writer: &mut W, line: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = Vec::with_capacity(line.len() + 1);
    encoded.extend_from_slice(line.as_bytes());
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
