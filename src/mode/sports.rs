use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::{elapsed, Fetcher, Mode, ModeKind, Renderer, Snapshot, SportsView, Timing};
use crate::config::SportsConfig;

/// Time between live/upcoming switches when live games do not take priority
const VIEW_ALTERNATION: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Game {
    pub home: String,
    pub away: String,
    /// `inProgress`/`in` while live, `pre`/`STATUS_SCHEDULED` before kickoff
    pub state: String,
    #[serde(default)]
    pub home_score: Option<u32>,
    #[serde(default)]
    pub away_score: Option<u32>,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub clock: Option<String>,
    /// Start time as shown to viewers
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub league: Option<String>,
}

impl Game {
    pub fn is_live(&self) -> bool {
        matches!(self.state.as_str(), "inProgress" | "in")
    }

    pub fn is_upcoming(&self) -> bool {
        matches!(self.state.as_str(), "pre" | "STATUS_SCHEDULED")
    }
}

/// The games chosen for display and how to present them
#[derive(Debug, Clone, PartialEq)]
pub struct SportsBoard {
    pub view: SportsView,
    pub games: Vec<Game>,
}

/// Live scores, falling back to upcoming games
pub struct SportsMode {
    fetcher: Box<dyn Fetcher<Vec<Game>>>,
    renderer: Box<dyn Renderer<SportsBoard>>,
    fetch_interval: Duration,
    refresh_interval: Duration,
    priority: bool,
    show: Vec<SportsView>,
    games: Vec<Game>,
    board: Option<SportsBoard>,
    snapshot: Snapshot<SportsBoard>,
    timing: Timing,
    alternation: usize,
    last_alternation: Option<Instant>,
}

impl SportsMode {
    pub fn new(
        config: &SportsConfig,
        fetcher: Box<dyn Fetcher<Vec<Game>>>,
        renderer: Box<dyn Renderer<SportsBoard>>,
    ) -> Self {
        SportsMode {
            fetcher,
            renderer,
            fetch_interval: Duration::from_secs(config.check_interval_secs),
            refresh_interval: Duration::from_secs(config.refresh_interval_secs),
            priority: config.priority,
            show: config.show.clone(),
            games: Vec::new(),
            board: None,
            snapshot: Snapshot::default(),
            timing: Timing::default(),
            alternation: 0,
            last_alternation: None,
        }
    }

    pub fn board(&self) -> Option<&SportsBoard> {
        self.board.as_ref()
    }

    fn games_in(&self, view: SportsView) -> Vec<Game> {
        if !self.show.contains(&view) {
            return Vec::new();
        }
        let wanted = match view {
            SportsView::Live => Game::is_live,
            SportsView::Upcoming => Game::is_upcoming,
        };
        self.games.iter().filter(|g| wanted(g)).cloned().collect()
    }
}

impl Mode for SportsMode {
    fn kind(&self) -> ModeKind {
        ModeKind::Sports
    }

    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn timing_mut(&mut self) -> &mut Timing {
        &mut self.timing
    }

    fn fetch_interval(&self) -> Duration {
        self.fetch_interval
    }

    fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn fetch_data(&mut self) -> bool {
        match self.fetcher.fetch() {
            Ok(games) => {
                info!("Fetched {} games", games.len());
                self.games = games;
                true
            }
            Err(e) => {
                error!("Error fetching sports data: {:#}", e);
                false
            }
        }
    }

    fn has_data(&self) -> bool {
        self.board.as_ref().is_some_and(|b| !b.games.is_empty())
    }

    fn render(&mut self, width: u32, height: u32) -> Option<RgbImage> {
        let board = self.board.as_ref().filter(|b| !b.games.is_empty())?;
        info!("Rendering {:?} sports ({} games)", board.view, board.games.len());
        Some(self.renderer.render(board, width, height))
    }

    fn has_priority(&self) -> bool {
        self.priority && self.show.contains(&SportsView::Live) && self.games.iter().any(Game::is_live)
    }

    fn data_changed(&self) -> bool {
        self.board.as_ref().is_some_and(|b| self.snapshot.changed(b))
    }

    fn commit_render(&mut self) {
        if let Some(board) = &self.board {
            self.snapshot.commit(board);
        }
    }

    fn forget_render(&mut self) {
        self.snapshot.clear();
    }

    fn watches_priority(&self) -> bool {
        self.priority
    }

    fn prepare(&mut self, now: Instant) {
        let live = self.games_in(SportsView::Live);
        let upcoming = self.games_in(SportsView::Upcoming);

        let mut available = Vec::with_capacity(2);
        if !live.is_empty() {
            available.push(SportsBoard { view: SportsView::Live, games: live });
        }
        if !upcoming.is_empty() {
            available.push(SportsBoard { view: SportsView::Upcoming, games: upcoming });
        }

        if self.priority || available.len() < 2 {
            // Live first when it has priority, otherwise whichever exists
            self.board = available.into_iter().next();
            return;
        }

        let since = *self.last_alternation.get_or_insert(now);
        if elapsed(Some(since), now, VIEW_ALTERNATION) {
            self.alternation = (self.alternation + 1) % available.len();
            self.last_alternation = Some(now);
            info!("Cycling sports view");
        }
        self.board = Some(available.swap_remove(self.alternation % available.len()));
    }
}
