//! The reader's single source of truth for what should be on screen.
//!
//! Intents are applied one at a time through `&mut self`; whatever resolve
//! completes last is what the snapshot shows.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

use crate::address::{AddressHistory, comic_path, parse_comic_id};
use crate::calendar::{CalendarPage, CalendarWindow};
use crate::comic::{Comic, ComicRef, SENTINEL_ID};
use crate::history::{ReadHistoryStore, ReadRecord};
use crate::source::{ComicSource, SourceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    GoToId(i64),
    GoLatest,
    GoNext,
    GoPrev,
    GoRandomUnread,
    UrlChanged(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Viewing,
    /// The last resolve failed. Any previously shown comic stays underneath.
    Error(String),
}

/// Read state of the shown comic, as it was when the comic was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    NotRead,
    JustRead,
    PreviouslyRead(ReadRecord),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The intent was rejected before any I/O.
    Ignored,
    Shown(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("comic {0} does not exist")]
    NotFound(u32),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Everything a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub phase: Phase,
    pub comic: Option<Comic>,
    pub read_status: ReadStatus,
    pub can_go_prev: bool,
    pub can_go_next: bool,
    pub latest_known: Option<u32>,
    pub incognito: bool,
    pub show_alt_text: bool,
    pub address: String,
}

pub struct NavigationController {
    source: Arc<ComicSource>,
    history: ReadHistoryStore,
    phase: Phase,
    current: Option<Comic>,
    read_status: ReadStatus,
    latest_known: Option<u32>,
    forward_blocked: bool,
    address: AddressHistory,
    calendar: CalendarWindow,
    rng: StdRng,
}

impl NavigationController {
    pub fn new(source: Arc<ComicSource>, history: ReadHistoryStore) -> Self {
        Self {
            source,
            history,
            phase: Phase::Loading,
            current: None,
            read_status: ReadStatus::NotRead,
            latest_known: None,
            forward_blocked: false,
            address: AddressHistory::new("/"),
            calendar: CalendarWindow::default(),
            rng: StdRng::from_entropy(),
        }
    }

    #[must_use]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    #[must_use]
    pub fn with_comics_per_page(mut self, comics_per_page: u32) -> Self {
        self.calendar = CalendarWindow::new(comics_per_page);
        self
    }

    /// Derives the initial view from the address the session was opened with.
    pub async fn start(&mut self, address: &str) -> Result<Outcome, NavigationError> {
        self.dispatch(Intent::UrlChanged(address.to_owned())).await
    }

    pub async fn dispatch(&mut self, intent: Intent) -> Result<Outcome, NavigationError> {
        tracing::debug!(?intent, "dispatch");
        match intent {
            Intent::GoToId(id) => self.go_to(id).await,
            Intent::GoLatest => self.go_latest().await,
            Intent::GoNext => match self.current_id() {
                Some(id) => self.go_to(i64::from(id) + 1).await,
                None => Ok(Outcome::Ignored),
            },
            Intent::GoPrev => match self.current_id() {
                Some(id) => self.go_to(i64::from(id) - 1).await,
                None => Ok(Outcome::Ignored),
            },
            Intent::GoRandomUnread => self.go_random_unread().await,
            Intent::UrlChanged(address) => match parse_comic_id(&address) {
                Some(id) => self.go_to(id).await,
                None => self.go_latest().await,
            },
        }
    }

    /// Steps back through visited addresses without reloading the session.
    pub async fn back(&mut self) -> Result<Outcome, NavigationError> {
        match self.address.back().map(str::to_owned) {
            Some(address) => self.dispatch(Intent::UrlChanged(address)).await,
            None => Ok(Outcome::Ignored),
        }
    }

    pub async fn forward(&mut self) -> Result<Outcome, NavigationError> {
        match self.address.forward().map(str::to_owned) {
            Some(address) => self.dispatch(Intent::UrlChanged(address)).await,
            None => Ok(Outcome::Ignored),
        }
    }

    pub fn mark_current_unread(&mut self) -> bool {
        let Some(id) = self.current_id() else {
            return false;
        };
        self.history.mark_unread(id);
        self.read_status = ReadStatus::NotRead;
        true
    }

    /// Only affects future navigations; the shown read status is left alone.
    pub fn toggle_incognito(&mut self) -> bool {
        let enabled = !self.history.incognito();
        self.history.set_incognito(enabled);
        tracing::info!(enabled, "incognito toggled");
        enabled
    }

    pub fn toggle_alt_text(&mut self) -> bool {
        let show = !self.history.show_alt_text();
        self.history.set_show_alt_text(show);
        show
    }

    #[must_use]
    pub fn current(&self) -> Option<&Comic> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn latest_known(&self) -> Option<u32> {
        self.latest_known
    }

    #[must_use]
    pub fn can_go_prev(&self) -> bool {
        self.current.as_ref().is_some_and(|comic| comic.id > 1)
    }

    #[must_use]
    pub fn can_go_next(&self) -> bool {
        self.current.as_ref().is_some_and(|comic| {
            !self.forward_blocked && self.latest_known.is_none_or(|latest| comic.id < latest)
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let session = self.history.session();
        Snapshot {
            phase: self.phase.clone(),
            comic: self.current.clone(),
            read_status: self.read_status,
            can_go_prev: self.can_go_prev(),
            can_go_next: self.can_go_next(),
            latest_known: self.latest_known,
            incognito: session.incognito,
            show_alt_text: session.show_alt_text,
            address: self.address.current().to_owned(),
        }
    }

    /// Opens the calendar on the page holding the latest comic.
    pub async fn open_calendar(&mut self) -> Result<CalendarPage, NavigationError> {
        let latest = self.ensure_latest().await?;
        self.calendar.jump_to_latest(latest);
        Ok(self.calendar.page(latest, &self.history.get_all()))
    }

    pub async fn open_calendar_at(&mut self, page: u32) -> Result<CalendarPage, NavigationError> {
        let latest = self.ensure_latest().await?;
        self.calendar.go_to_page(page, latest);
        Ok(self.calendar.page(latest, &self.history.get_all()))
    }

    pub fn calendar_next_page(&mut self) -> Option<CalendarPage> {
        let latest = self.latest_known?;
        self.calendar.next_page(latest);
        Some(self.calendar.page(latest, &self.history.get_all()))
    }

    pub fn calendar_prev_page(&mut self) -> Option<CalendarPage> {
        let latest = self.latest_known?;
        self.calendar.prev_page();
        Some(self.calendar.page(latest, &self.history.get_all()))
    }

    fn current_id(&self) -> Option<u32> {
        self.current.as_ref().map(|comic| comic.id)
    }

    fn accepts(&self, id: i64) -> bool {
        if id == i64::from(SENTINEL_ID) {
            return true;
        }
        if id < 1 {
            return false;
        }
        self.latest_known.is_none_or(|latest| id <= i64::from(latest))
    }

    async fn go_to(&mut self, id: i64) -> Result<Outcome, NavigationError> {
        if !self.accepts(id) {
            tracing::debug!(id, latest = ?self.latest_known, "ignoring out-of-range comic id");
            return Ok(Outcome::Ignored);
        }
        let Ok(id) = u32::try_from(id) else {
            return Ok(Outcome::Ignored);
        };

        self.phase = Phase::Loading;
        let resolved = self.source.resolve(ComicRef::Id(id)).await;
        match resolved {
            Ok(comic) => {
                self.address.push(comic_path(comic.id));
                self.show(comic);
                Ok(Outcome::Shown(id))
            }
            Err(SourceError::NotFound(_)) if id != SENTINEL_ID => {
                // Treat as "beyond the newest comic".
                if self.latest_known.is_none() {
                    self.latest_known = Some(id - 1);
                }
                self.forward_blocked = true;
                self.phase = if self.current.is_some() {
                    Phase::Viewing
                } else {
                    Phase::Error(format!("comic {id} does not exist"))
                };
                tracing::info!(id, latest = ?self.latest_known, "comic not found; forward navigation disabled");
                Err(NavigationError::NotFound(id))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn go_latest(&mut self) -> Result<Outcome, NavigationError> {
        self.phase = Phase::Loading;
        let resolved = self.source.resolve(ComicRef::Latest).await;
        match resolved {
            Ok(comic) => {
                let id = comic.id;
                self.latest_known = Some(id);
                // A bare "/" becomes the id it resolved to.
                if parse_comic_id(self.address.current()).is_none() {
                    self.address.replace(comic_path(id));
                } else {
                    self.address.push(comic_path(id));
                }
                self.show(comic);
                Ok(Outcome::Shown(id))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    async fn go_random_unread(&mut self) -> Result<Outcome, NavigationError> {
        let latest = self.ensure_latest().await?;
        if latest == 0 {
            return Ok(Outcome::Ignored);
        }

        let read = self.history.get_all();
        let read_in_range = read.range(1..=latest).count();
        let unread = latest - u32::try_from(read_in_range).unwrap_or(latest);
        let pick = if unread == 0 {
            self.rng.gen_range(1..=latest)
        } else {
            let n = self.rng.gen_range(0..unread);
            nth_unread(read.range(1..=latest).map(|(id, _)| *id), n)
        };
        tracing::debug!(pick, unread, "random comic");
        self.go_to(i64::from(pick)).await
    }

    async fn ensure_latest(&mut self) -> Result<u32, NavigationError> {
        if let Some(latest) = self.latest_known {
            return Ok(latest);
        }
        let comic = self
            .source
            .resolve(ComicRef::Latest)
            .await
            .map_err(|err| self.fail(err))?;
        self.latest_known = Some(comic.id);
        Ok(comic.id)
    }

    fn show(&mut self, comic: Comic) {
        let incognito = self.history.incognito();
        self.read_status = match self.history.get(comic.id) {
            Some(record) => ReadStatus::PreviouslyRead(record),
            None if incognito => ReadStatus::NotRead,
            None => ReadStatus::JustRead,
        };
        if !incognito {
            self.history.mark_read(comic.id);
        }

        tracing::info!(id = comic.id, trust = ?comic.trust, "showing comic");
        self.current = Some(comic);
        self.phase = Phase::Viewing;
        self.forward_blocked = false;
    }

    fn fail(&mut self, err: SourceError) -> NavigationError {
        tracing::warn!(%err, "navigation failed");
        self.phase = Phase::Error(err.to_string());
        NavigationError::Source(err)
    }
}

/// The `n`th (zero-based) id in `1..` that is not in `read`, which must be
/// ascending.
fn nth_unread(read: impl IntoIterator<Item = u32>, n: u32) -> u32 {
    let mut candidate = n + 1;
    for id in read {
        if id > candidate {
            break;
        }
        candidate += 1;
    }
    candidate
}
