/// Per-connection selection state.
///
/// Names are only remembered, never trusted: the inventory re-checks them on
/// every use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    movie: Option<String>,
    theater: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn movie(&self) -> Option<&str> {
        self.movie.as_deref()
    }

    pub fn theater(&self) -> Option<&str> {
        self.theater.as_deref()
    }

    /// A theater only means something relative to a movie, so picking a new
    /// movie drops the theater.
    pub fn select_movie(&mut self, movie: impl Into<String>) {
        self.movie = Some(movie.into());
        self.theater = None;
    }

    pub fn clear_movie(&mut self) {
        self.movie = None;
    }

    pub fn select_theater(&mut self, theater: impl Into<String>) {
        self.theater = Some(theater.into());
    }

    pub fn clear_theater(&mut self) {
        self.theater = None;
    }
}
