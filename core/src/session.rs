use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    NotStarted,
    InProgress,
    GameOver,
}

impl SessionState {
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::NotStarted)
    }

    pub const fn is_finished(self) -> bool {
        matches!(self, Self::GameOver)
    }
}

/// One player's game: the seed, the revealed tiles and the camera, with their persisted copies kept in step.
///
/// Reveals must come from a single owner. Readers of the store (a viewport on another thread) may run alongside and
/// see a flood half-way, the [`RevealCounter`] tells them when to look again.
#[derive(Debug)]
pub struct GameSession<S, C> {
    engine: FloodRevealEngine,
    store: S,
    config_store: C,
    config: SessionConfig,
    counter: RevealCounter,
    rng: SmallRng,
}

impl<S: RevealStore, C: ConfigStore> GameSession<S, C> {
    /// Loads the persisted session, or starts a fresh one when nothing is stored.
    pub fn open(store: S, config_store: C) -> Result<Self> {
        Self::with_engine(store, config_store, FloodRevealEngine::default())
    }

    pub fn with_engine(store: S, config_store: C, engine: FloodRevealEngine) -> Result<Self> {
        let config = SessionConfig::load(&config_store)?;
        Ok(Self {
            engine,
            store,
            config_store,
            config,
            counter: RevealCounter::new(),
            rng: SmallRng::from_rng(&mut rand::rng()),
        })
    }

    /// Replaces the randomness used for picking seeds, for reproducible games.
    pub fn with_rng_seed(mut self, rng_seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(rng_seed);
        self
    }

    pub fn state(&self) -> SessionState {
        if self.config.game_over {
            SessionState::GameOver
        } else if self.config.first_click {
            SessionState::NotStarted
        } else {
            SessionState::InProgress
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.config.game_over
    }

    pub fn seed(&self) -> Option<Seed> {
        self.config.seed
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn oracle(&self) -> &FieldOracle {
        self.engine.oracle()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config_store(&self) -> &C {
        &self.config_store
    }

    /// Number of tile writes so far, a change means the revealed region grew.
    pub fn reveal_count(&self) -> u64 {
        self.counter.get()
    }

    pub fn reveal_counter(&self) -> RevealCounter {
        self.counter.clone()
    }

    /// Mine count of `coords` in the current game, `None` before the seed is chosen.
    pub fn mine_count(&self, coords: Coord2) -> Option<MineCount> {
        self.config
            .seed
            .map(|seed| self.engine.oracle().mine_count(coords, seed))
    }

    /// Reveals `coords` and everything the flood reaches from it. The first reveal of a game picks the seed so that
    /// `coords` is a zero opening. Once the game is over this does nothing until [`reset`](Self::reset).
    pub fn reveal(&mut self, coords: Coord2) -> Result<RevealReport> {
        if self.config.game_over {
            log::debug!("Game already ended, ignoring reveal at {coords:?}");
            return Ok(RevealReport::no_change());
        }

        if self.config.first_click {
            self.start(coords)?;
        }
        let Some(seed) = self.config.seed else {
            unreachable!("seed is assigned before the first reveal");
        };

        let report = self
            .engine
            .reveal(coords, seed, &self.store, &self.counter)?;
        if report.outcome == RevealOutcome::HitMine {
            log::info!("Stepped on a mine at {coords:?}");
            SessionConfig::save_game_over(&self.config_store, true)?;
            self.config.game_over = true;
        }
        Ok(report)
    }

    fn start(&mut self, coords: Coord2) -> Result<()> {
        let choice = self.engine.oracle().generate_seed(coords, &mut self.rng);
        SessionConfig::save_seed(&self.config_store, Some(choice.seed))?;
        SessionConfig::save_first_click(&self.config_store, false)?;

        self.config.seed = Some(choice.seed);
        self.config.first_click = false;
        log::info!("New game at {coords:?} with seed {}", choice.seed);
        Ok(())
    }

    /// Forgets the game: revealed tiles, seed and camera, on disk and in memory.
    pub fn reset(&mut self) -> Result<()> {
        self.store.clear()?;
        SessionConfig::clear(&self.config_store)?;

        self.config = SessionConfig::default();
        log::info!("Session reset");
        Ok(())
    }

    pub fn camera_offset(&self) -> CameraOffset {
        self.config.camera_offset
    }

    /// Moves the camera. Non-finite offsets are dropped, they would poison every later viewport query.
    pub fn set_camera_offset(&mut self, offset: CameraOffset) -> Result<()> {
        if !offset.x.is_finite() || !offset.y.is_finite() {
            log::warn!("Ignoring non-finite camera offset {offset:?}");
            return Ok(());
        }
        if offset == self.config.camera_offset {
            return Ok(());
        }
        SessionConfig::save_camera_offset(&self.config_store, offset)?;
        self.config.camera_offset = offset;
        Ok(())
    }

    pub fn pan(&mut self, dx: f64, dy: f64) -> Result<()> {
        let CameraOffset { x, y } = self.config.camera_offset;
        self.set_camera_offset(CameraOffset::new(x + dx, y + dy))
    }

    /// Picks up a game started, lost or reset by another process sharing the same storage. Returns whether anything changed.
    pub fn sync_external(&mut self) -> Result<bool> {
        let stored = SessionConfig::load(&self.config_store)?;
        if stored.seed == self.config.seed
            && stored.first_click == self.config.first_click
            && stored.game_over == self.config.game_over
        {
            return Ok(false);
        }

        log::info!(
            "Session changed outside this process: seed {:?} -> {:?}",
            self.config.seed,
            stored.seed
        );
        self.config.seed = stored.seed;
        self.config.first_click = stored.first_click;
        self.config.game_over = stored.game_over;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> GameSession<MemoryRevealStore, MemoryConfigStore> {
        GameSession::open(MemoryRevealStore::new(), MemoryConfigStore::new())
            .unwrap()
            .with_rng_seed(0)
    }

    #[test]
    fn first_reveal_starts_with_an_opening() {
        let mut session = session();
        assert_eq!(session.state(), SessionState::NotStarted);

        let report = session.reveal((10, -4)).unwrap();

        let seed = session.seed().unwrap();
        assert_eq!(report.outcome, RevealOutcome::Revealed);
        assert_eq!(session.oracle().mine_count((10, -4), seed), 0);
        assert!(report.revealed >= 9);
        assert_eq!(session.state(), SessionState::InProgress);
        assert_eq!(
            session.config_store().get::<Seed>(SessionConfig::SEED_KEY).unwrap(),
            Some(seed)
        );
        assert_eq!(
            session.config_store().get::<bool>(SessionConfig::FIRST_CLICK_KEY).unwrap(),
            Some(false)
        );
    }

    #[test]
    fn stored_seed_is_reused() {
        let config = MemoryConfigStore::new();
        SessionConfig::save_seed(&config, Some(7)).unwrap();
        SessionConfig::save_first_click(&config, false).unwrap();
        let mut session = GameSession::open(MemoryRevealStore::new(), config).unwrap();

        assert_eq!(session.state(), SessionState::InProgress);
        let report = session.reveal((0, 0)).unwrap();

        assert_eq!(session.seed(), Some(7));
        assert_eq!(report.outcome, RevealOutcome::HitMine);
        assert_eq!(session.state(), SessionState::GameOver);
        assert!(session.store().is_empty().unwrap());
    }

    #[test]
    fn game_over_ignores_reveals() {
        let config = MemoryConfigStore::new();
        SessionConfig::save_seed(&config, Some(7)).unwrap();
        SessionConfig::save_first_click(&config, false).unwrap();
        let mut session = GameSession::open(MemoryRevealStore::new(), config).unwrap();
        session.reveal((0, 0)).unwrap();

        let report = session.reveal((5, 5)).unwrap();

        assert_eq!(report, RevealReport::no_change());
        assert!(session.store().is_empty().unwrap());
        assert_eq!(session.reveal_count(), 0);
    }

    #[test]
    fn reset_returns_to_not_started() {
        let mut session = session();
        session.reveal((0, 0)).unwrap();
        session.pan(40.0, -12.0).unwrap();

        session.reset().unwrap();

        assert_eq!(session.state(), SessionState::NotStarted);
        assert_eq!(session.seed(), None);
        assert_eq!(session.camera_offset(), CameraOffset::default());
        assert!(session.store().get_all().unwrap().is_empty());
        assert_eq!(
            SessionConfig::load(session.config_store()).unwrap(),
            SessionConfig::default()
        );
    }

    #[test]
    fn camera_rejects_non_finite_offsets() {
        let mut session = session();
        session.set_camera_offset(CameraOffset::new(16.0, 32.0)).unwrap();

        session.set_camera_offset(CameraOffset::new(f64::NAN, 0.0)).unwrap();
        session.pan(f64::INFINITY, 0.0).unwrap();

        assert_eq!(session.camera_offset(), CameraOffset::new(16.0, 32.0));
    }

    #[test]
    fn sync_adopts_external_seed() {
        let config = std::sync::Arc::new(MemoryConfigStore::new());
        let mut session = GameSession::open(MemoryRevealStore::new(), config.clone()).unwrap();
        assert!(!session.sync_external().unwrap());

        SessionConfig::save_seed(&config, Some(42)).unwrap();
        SessionConfig::save_first_click(&config, false).unwrap();

        assert!(session.sync_external().unwrap());
        assert_eq!(session.seed(), Some(42));
        assert_eq!(session.state(), SessionState::InProgress);
        assert!(!session.sync_external().unwrap());
    }

    #[test]
    fn game_over_survives_reopen() {
        let config = std::sync::Arc::new(MemoryConfigStore::new());
        SessionConfig::save_seed(&config, Some(7)).unwrap();
        SessionConfig::save_first_click(&config, false).unwrap();
        let mut lost = GameSession::open(MemoryRevealStore::new(), config.clone()).unwrap();
        lost.reveal((0, 0)).unwrap();

        let mut reopened = GameSession::open(MemoryRevealStore::new(), config.clone()).unwrap();

        assert_eq!(reopened.state(), SessionState::GameOver);
        assert_eq!(reopened.reveal((1, 0)).unwrap(), RevealReport::no_change());
        assert!(reopened.store().is_empty().unwrap());

        reopened.reset().unwrap();
        assert!(lost.sync_external().unwrap());
        assert_eq!(lost.state(), SessionState::NotStarted);
    }

    #[test]
    fn sync_adopts_external_game_over() {
        let config = std::sync::Arc::new(MemoryConfigStore::new());
        SessionConfig::save_seed(&config, Some(7)).unwrap();
        SessionConfig::save_first_click(&config, false).unwrap();
        let mut ours = GameSession::open(MemoryRevealStore::new(), config.clone()).unwrap();
        let mut theirs = GameSession::open(MemoryRevealStore::new(), config.clone()).unwrap();

        theirs.reveal((0, 0)).unwrap();

        assert!(ours.sync_external().unwrap());
        assert!(ours.is_game_over());
    }
}
