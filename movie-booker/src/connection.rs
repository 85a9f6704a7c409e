//! Per-connection command handling.
//!
//! [`dispatch`] turns one request line into one response line and is free of
//! I/O; [`serve`] drives it over any buffered reader/writer pair until the
//! peer hangs up.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncBufRead, AsyncWrite, BufReader},
    net::TcpStream,
};
use tracing::debug;

use crate::{
    inventory::MovieBooker,
    protocol::{
        self, BOOKED, BOOKING_FAILED, Command, GREETING, INVALID_COMMAND, INVALID_MOVIE,
        INVALID_THEATER, Line, LineReader, MAX_LINE_LEN, NO_MOVIE_SELECTED, NO_MOVIES,
        NO_THEATER_SELECTED, NOT_RUNNING, join_list, parse_seat_list, write_line,
    },
    session::Session,
};

pub async fn handle_connection(stream: TcpStream, booker: Arc<dyn MovieBooker>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    serve(&mut reader, &mut writer, booker.as_ref())
        .await
        .context("connection i/o failed")
}

/// Greets the peer, then answers each line until end of stream. Lines longer
/// than [`MAX_LINE_LEN`] are answered as invalid commands.
pub async fn serve<R, W>(
    reader: &mut R,
    writer: &mut W,
    booker: &dyn MovieBooker,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = Session::new();
    write_line(writer, GREETING).await?;

    let mut lines = LineReader::new(MAX_LINE_LEN);
    while let Some(line) = lines.next_line(reader).await? {
        let response = match line {
            Line::Text(line) => dispatch(booker, &mut session, &line),
            Line::TooLong => {
                debug!(limit = MAX_LINE_LEN, "dropped over-long request line");
                INVALID_COMMAND.to_string()
            }
        };
        write_line(writer, &response).await?;
    }

    Ok(())
}

pub fn dispatch(booker: &dyn MovieBooker, session: &mut Session, line: &str) -> String {
    let command = Command::parse(line);
    debug!(?command, "dispatching command");

    match command {
        Command::ListMovies => list_movies(booker),
        Command::SelectMovie(movie) => select_movie(booker, session, movie),
        Command::ListTheaters => list_theaters(booker, session),
        Command::SelectTheater(theater) => select_theater(booker, session, theater),
        Command::GetFreeSeats => get_free_seats(booker, session),
        Command::BookSeats(seats) => book_seats(booker, session, seats),
        Command::Unknown => INVALID_COMMAND.to_string(),
    }
}

fn list_movies(booker: &dyn MovieBooker) -> String {
    let movies = booker.movies();
    if movies.is_empty() {
        return NO_MOVIES.to_string();
    }
    join_list(movies)
}

fn select_movie(booker: &dyn MovieBooker, session: &mut Session, movie: &str) -> String {
    if booker.theaters_for_movie(movie).is_empty() {
        session.clear_movie();
        return INVALID_MOVIE.to_string();
    }
    session.select_movie(movie);
    protocol::movie_selected(movie)
}

fn list_theaters(booker: &dyn MovieBooker, session: &Session) -> String {
    let Some(movie) = session.movie() else {
        return NO_MOVIE_SELECTED.to_string();
    };
    let theaters = booker.theaters_for_movie(movie);
    if theaters.is_empty() {
        return NOT_RUNNING.to_string();
    }
    join_list(theaters)
}

fn select_theater(booker: &dyn MovieBooker, session: &mut Session, theater: &str) -> String {
    if !booker.is_theater(theater) {
        session.clear_theater();
        return INVALID_THEATER.to_string();
    }
    session.select_theater(theater);
    protocol::theater_selected(theater)
}

fn get_free_seats(booker: &dyn MovieBooker, session: &Session) -> String {
    let Some(movie) = session.movie() else {
        return NO_MOVIE_SELECTED.to_string();
    };
    let Some(theater) = session.theater() else {
        return NO_THEATER_SELECTED.to_string();
    };
    join_list(booker.free_seats(theater, movie))
}

fn book_seats(booker: &dyn MovieBooker, session: &Session, seats: &str) -> String {
    let Some(theater) = session.theater() else {
        return NO_THEATER_SELECTED.to_string();
    };
    let Some(movie) = session.movie() else {
        return NO_MOVIE_SELECTED.to_string();
    };
    let seats = match parse_seat_list(seats) {
        Ok(seats) => seats,
        Err(err) => {
            debug!(error = %err, "rejected seat list");
            return err.response().to_string();
        }
    };

    match booker.book_seats(theater, movie, &seats) {
        Ok(()) => BOOKED.to_string(),
        Err(err) => {
            debug!(theater, movie, error = %err, "booking failed");
            BOOKING_FAILED.to_string()
        }
    }
}
